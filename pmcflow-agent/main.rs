use axum::{extract::State, response::IntoResponse, routing::get, Router};
use clap::Parser;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use pmcflow::common::{CpuArchitecture, MonotonicClock, MsrPort, Topology, CPU_ARCH};
use pmcflow::config::parse_range_list;
use pmcflow::orchestrator::{FanoutSink, JsonLinesSink, LogSink};
use pmcflow::{
    configs, Hardware, MonitorConfig, MonitorController, MonitoringDomain, PmcError,
    ResultExporter, Result,
};

#[derive(Parser, Debug)]
#[command(name = "pmcflow")]
#[command(about = "Performance counter sampling for AMD Zen and Intel CPUs")]
struct Args {
    #[arg(long, value_name = "CONFIG_ID", help = "Core configuration to activate")]
    core: Option<String>,

    #[arg(long, value_name = "CONFIG_ID", help = "L3 configuration to activate")]
    l3: Option<String>,

    #[arg(long, value_name = "CONFIG_ID", help = "Data fabric configuration to activate")]
    df: Option<String>,

    #[arg(long, help = "List the configurations available on this CPU and exit")]
    list: bool,

    #[arg(
        long = "threads",
        help = "Hardware threads to monitor (ranges and comma-separated lists: --threads 0-3,8 or --threads 0-3 --threads 8)",
        action = clap::ArgAction::Append
    )]
    threads: Vec<String>,

    #[arg(
        long,
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Sampling period in milliseconds"
    )]
    interval_ms: u64,

    #[arg(long, default_value = "0.0.0.0:8080", help = "Address serving /metrics")]
    listen: SocketAddr,

    #[arg(long, value_name = "PATH", help = "Append every tick as JSON lines to PATH")]
    log_file: Option<PathBuf>,

    #[arg(
        short,
        long,
        help = "Enable verbose logging (shows every register read and write)"
    )]
    verbose: bool,
}

async fn metrics_handler(State(exporter): State<Arc<ResultExporter>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&exporter.registry().gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }

    let content_type = encoder.format_type().to_string();
    (
        [("Content-Type", content_type)],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

fn check_permissions() {
    let msr_path = "/dev/cpu/0/msr";
    if std::fs::metadata(msr_path).is_err() {
        eprintln!("\nERROR: Cannot access {msr_path}\n\nThe MSR kernel module may not be loaded.\nRun: sudo modprobe msr\n");
        std::process::exit(1);
    }

    if let Err(e) = std::fs::File::open(msr_path) {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            eprintln!("\nERROR: Permission denied accessing {msr_path}\n\nRun as root or grant CAP_SYS_RAWIO.\n");
            std::process::exit(1);
        }
    }
}

fn print_catalog(arch: CpuArchitecture) {
    println!("Configurations available on {}:", arch.name());
    for domain in MonitoringDomain::all() {
        let sets = configs::available(arch, domain);
        if sets.is_empty() {
            continue;
        }
        println!("\n[{}]", domain);
        for set in sets {
            println!("  {:<12} {}", set.id, set.name);
            println!("  {:<12} columns: {}", "", set.columns[1..].join(", "));
        }
    }
}

/// Domains named on the command line, or the first core configuration
fn requested(args: &Args, arch: CpuArchitecture) -> Vec<(MonitoringDomain, String)> {
    let requested: Vec<(MonitoringDomain, String)> = [
        (MonitoringDomain::Core, &args.core),
        (MonitoringDomain::L3, &args.l3),
        (MonitoringDomain::DataFabric, &args.df),
    ]
    .into_iter()
    .filter_map(|(domain, id)| id.clone().map(|id| (domain, id)))
    .collect();

    if !requested.is_empty() {
        return requested;
    }

    match configs::available(arch, MonitoringDomain::Core).first() {
        Some(set) => {
            tracing::info!("No configuration specified, using core '{}'", set.id);
            vec![(MonitoringDomain::Core, set.id.to_string())]
        }
        None => Vec::new(),
    }
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::warn!("Shutdown triggered by Ctrl+C"),
        _ = terminate => tracing::warn!("Shutdown triggered by SIGTERM"),
    }

    cancel_token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let arch = *CPU_ARCH;
    tracing::info!("Detected CPU architecture: {}", arch.name());

    if args.list {
        print_catalog(arch);
        return Ok(());
    }

    check_permissions();

    let config = if args.threads.is_empty() {
        let mut config = MonitorConfig::auto_detect();
        config.period = Duration::from_millis(args.interval_ms);
        config
    } else {
        MonitorConfig::new(
            parse_range_list(&args.threads)?,
            Duration::from_millis(args.interval_ms),
        )
    };
    tracing::info!(
        "Monitoring {} hardware threads every {:?}",
        config.threads.len(),
        config.period
    );

    let topology = Topology::detect(&config.threads);
    let exporter = Arc::new(ResultExporter::new()?);

    let mut sink = FanoutSink::new()
        .with(Arc::new(LogSink))
        .with(exporter.clone());
    if let Some(path) = &args.log_file {
        sink = sink.with(Arc::new(JsonLinesSink::create(path)?));
    }

    let hardware = Hardware::new(Arc::new(MsrPort::new()?), Arc::new(MonotonicClock::new()));
    let mut controller = MonitorController::new(hardware, topology, arch, Arc::new(sink))
        .with_period(config.period);

    let mut active = 0;
    for (domain, id) in requested(&args, arch) {
        match controller.activate(domain, &id).await {
            Ok(_) => active += 1,
            Err(e) => tracing::error!("Cannot activate {} '{}': {}", domain, id, e),
        }
    }
    if active == 0 {
        return Err(PmcError::ConfigError(format!(
            "No configuration could be activated on {}",
            arch.name()
        )));
    }

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(exporter);

    tracing::warn!("Starting HTTP server on {}", args.listen);
    let listener = tokio::net::TcpListener::bind(args.listen).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel_token.cancelled_owned())
        .await?;

    tracing::info!("Server shutdown complete, releasing counters...");
    controller.shutdown().await;
    tracing::info!("All domains released, exiting");

    Ok(())
}
