//! Subcommand helpers

use ferry_capture::{list_bridge_interfaces, list_interfaces, InterfaceInfo};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Max log level for a `-v` count
pub fn verbosity_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the fmt subscriber. `RUST_LOG` takes precedence over `-v`.
pub fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity_level(verbose).to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Render the interface list, bridge-capable interfaces only unless `all`
pub fn interfaces_report(all: bool) -> String {
    let interfaces = if all {
        list_interfaces()
    } else {
        list_bridge_interfaces()
    };
    render_interfaces(interfaces, all)
}

fn render_interfaces(interfaces: Vec<InterfaceInfo>, all: bool) -> String {
    let lines: Vec<String> = interfaces
        .iter()
        .filter(|iface| all || iface.is_bridge_capable())
        .map(|iface| format!("  {}", iface))
        .collect();

    if lines.is_empty() {
        return "No usable interfaces found (try --all, or run with capture privileges)".to_string();
    }
    format!("Interfaces:\n{}", lines.join("\n"))
}
