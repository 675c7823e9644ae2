//! hoptrace - sequential ICMP traceroute.
//!
//! This is the command-line interface for the hoptrace library.

use clap::error::ErrorKind;
use clap::Parser;
use hoptrace::dns::resolver::resolve_destination;
use hoptrace::signal::spawn_interrupt_watcher;
use hoptrace::{
    DeadlinePolicy, HickoryResolver, HostResolver, TraceOutcome, Traceroute, TracerouteConfig,
    TracerouteError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Get the version string for hoptrace
fn get_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(env!("CARGO_PKG_VERSION"), "-UNRELEASED")
    } else {
        env!("CARGO_PKG_VERSION")
    }
}

/// Command-line arguments for the traceroute tool.
#[derive(Parser, Debug)]
#[clap(author, version = get_version(), about = "Sequential ICMP traceroute", long_about = None)]
struct Args {
    /// Destination hostname or IPv4 address
    host: String,

    /// Maximum number of hops
    #[clap(short = 'm', long, default_value_t = hoptrace::traceroute::DEFAULT_MAX_HOPS)]
    max_hops: u8,

    /// Receive deadline in milliseconds
    #[clap(short = 'w', long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Re-arm the receive deadline before every probe instead of once per run
    #[clap(long)]
    per_hop_deadline: bool,

    /// Enable verbose logging on stderr (use -vv for trace output)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn to_config(&self) -> Result<TracerouteConfig, TracerouteError> {
        let policy = if self.per_hop_deadline {
            DeadlinePolicy::PerProbe
        } else {
            DeadlinePolicy::Shared
        };
        TracerouteConfig::builder()
            .max_hops(self.max_hops)
            .timeout(Duration::from_millis(self.timeout_ms))
            .deadline_policy(policy)
            .build()
    }
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                e.exit();
            }
            let _ = e.print();
            std::process::exit(1);
        }
    };

    init_logging(args.verbose);

    // Single-threaded runtime; the blocking receive runs on the blocking pool
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create Tokio runtime");

    if let Err(e) = runtime.block_on(async_main(args)) {
        report_error(&e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,hoptrace={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn async_main(args: Args) -> Result<TraceOutcome, TracerouteError> {
    let config = args.to_config()?;
    let max_hops = config.max_hops;

    let resolver: Arc<dyn HostResolver> = Arc::new(HickoryResolver::new());
    let destination = resolve_destination(resolver.as_ref(), &args.host).await?;

    let interrupt = CancellationToken::new();
    let traceroute = Traceroute::new(config, destination.clone(), resolver, interrupt.clone())?;

    if let Err(e) = spawn_interrupt_watcher(interrupt.clone()) {
        warn!("could not install signal handlers: {}", e);
    }

    println!("traceroute to {}, {} hops max", destination, max_hops);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = traceroute.run(&mut out).await;

    // Stops the watcher task
    interrupt.cancel();
    outcome
}

/// Print a fatal error with a hint where one helps
fn report_error(err: &TracerouteError) {
    match err {
        TracerouteError::InsufficientPermissions {
            required,
            suggestion,
        } => {
            eprintln!("Error: Insufficient permissions");
            eprintln!("Required: {}", required);
            eprintln!("Suggestion: {}", suggestion);
        }
        TracerouteError::Ipv6NotSupported => {
            eprintln!("Error: {}", err);
            eprintln!("Please use an IPv4 address or hostname that resolves to IPv4.");
        }
        TracerouteError::ResolutionError(_) => {
            eprintln!("Error: {}", err);
            eprintln!("Please check the hostname and your network connection.");
        }
        TracerouteError::ConfigError(_) => {
            eprintln!("Error: {}", err);
            eprintln!("Run 'hoptrace --help' for usage information.");
        }
        _ => eprintln!("Error: {}", err),
    }
}
