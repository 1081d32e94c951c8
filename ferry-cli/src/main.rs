//! ferry binary

use std::process::ExitCode;
use std::time::Duration;

use ferry_bridge::Bridge;
use ferry_cli::{init_tracing, interfaces_report, BridgeArgs, Cli, Commands};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Interfaces { all } => {
            println!("{}", interfaces_report(all));
            Ok(())
        }
        Commands::Bridge(args) => run_bridge(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "ferry failed");
            ExitCode::FAILURE
        }
    }
}

async fn run_bridge(args: BridgeArgs) -> ferry_core::Result<()> {
    let config = args.config()?;
    match config.selector() {
        Some(selector) => info!(%selector, "Selector configured"),
        None => warn!("No --match-* flag given, every frame will be dropped"),
    }
    if config.mangle().is_none() {
        warn!("No --rewrite-* flag given, matched frames will be dropped");
    }

    let mut bridge = Bridge::pcap(config);
    bridge.start()?;
    info!(bridge = %bridge.id(), "Bridge running, press Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    warn!(error = %e, "Could not listen for Ctrl-C");
                }
                info!("Interrupted");
                break;
            }
            _ = poll.tick() => {
                if !bridge.is_running() {
                    break;
                }
            }
        }
    }

    let result = tokio::task::block_in_place(|| bridge.stop_and_join());
    println!("{}", bridge.stats());
    result
}
