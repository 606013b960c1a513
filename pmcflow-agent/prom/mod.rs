pub mod exporter;

pub use exporter::ResultExporter;
