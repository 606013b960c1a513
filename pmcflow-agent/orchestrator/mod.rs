pub mod controller;
pub mod sink;

pub use controller::{Hardware, MonitorController};
pub use sink::{FanoutSink, JsonLinesSink, LogSink, ResultSink};
