//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use ferry_bridge::{BridgeConfig, Rewrite, Selector};
use ferry_capture::filters;
use ferry_core::{MacAddr, Result};
use ferry_packet::{ChainBuilder, Ethernet, Ipv4, Udp};
use std::net::Ipv4Addr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(version, about = "Capture, mangle and forward raw frames between interfaces", long_about = None)]
pub struct Cli {
    /// Verbose output (-v, -vv for increasing verbosity)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available network interfaces
    Interfaces {
        /// Include interfaces that are down or loopback
        #[arg(short, long)]
        all: bool,
    },

    /// Forward matching frames from one interface to another, rewriting them
    Bridge(BridgeArgs),
}

#[derive(Args, Debug)]
pub struct BridgeArgs {
    /// Interface to capture from
    #[arg(short, long)]
    pub input: String,

    /// Interface to send rewritten frames on
    #[arg(short, long)]
    pub output: String,

    /// Capture filter for the input side (BPF syntax)
    #[arg(long, default_value = "ip", conflicts_with = "no_filter")]
    pub filter: String,

    /// Capture every frame on the input side
    #[arg(long)]
    pub no_filter: bool,

    /// Seconds to wait before retrying an interface that cannot be opened
    #[arg(long, value_name = "SECONDS", default_value = "3")]
    pub retry_backoff: u64,

    /// Longest a single receive may block, in milliseconds
    #[arg(long, value_name = "MS", default_value = "250")]
    pub receive_timeout: u64,

    /// Match every captured frame
    #[arg(long)]
    pub match_any: bool,

    /// Match frames from this source MAC
    #[arg(long, value_name = "MAC")]
    pub match_eth_src: Option<MacAddr>,

    /// Match frames to this destination MAC
    #[arg(long, value_name = "MAC")]
    pub match_eth_dst: Option<MacAddr>,

    /// Match packets from this IPv4 address
    #[arg(long, value_name = "ADDR")]
    pub match_ip_src: Option<Ipv4Addr>,

    /// Match packets to this IPv4 address
    #[arg(long, value_name = "ADDR")]
    pub match_ip_dst: Option<Ipv4Addr>,

    /// Match datagrams from this UDP port
    #[arg(long, value_name = "PORT")]
    pub match_udp_src: Option<u16>,

    /// Match datagrams to this UDP port
    #[arg(long, value_name = "PORT")]
    pub match_udp_dst: Option<u16>,

    /// Rewrite the source MAC
    #[arg(long, value_name = "MAC")]
    pub rewrite_eth_src: Option<MacAddr>,

    /// Rewrite the destination MAC
    #[arg(long, value_name = "MAC")]
    pub rewrite_eth_dst: Option<MacAddr>,

    /// Rewrite the IPv4 source address
    #[arg(long, value_name = "ADDR")]
    pub rewrite_ip_src: Option<Ipv4Addr>,

    /// Rewrite the IPv4 destination address
    #[arg(long, value_name = "ADDR")]
    pub rewrite_ip_dst: Option<Ipv4Addr>,

    /// Rewrite the IPv4 TTL
    #[arg(long, value_name = "TTL")]
    pub rewrite_ttl: Option<u8>,

    /// Rewrite the UDP source port
    #[arg(long, value_name = "PORT")]
    pub rewrite_udp_src: Option<u16>,

    /// Rewrite the UDP destination port
    #[arg(long, value_name = "PORT")]
    pub rewrite_udp_dst: Option<u16>,
}

impl BridgeArgs {
    /// Selector built from the `--match-*` flags
    pub fn selector(&self) -> Result<Option<Selector>> {
        if self.match_any {
            return Ok(Some(Selector::any()));
        }

        let wants_udp = self.match_udp_src.is_some() || self.match_udp_dst.is_some();
        let wants_ip = wants_udp || self.match_ip_src.is_some() || self.match_ip_dst.is_some();
        let wants_eth = wants_ip || self.match_eth_src.is_some() || self.match_eth_dst.is_some();
        if !wants_eth {
            return Ok(None);
        }

        let mut eth = Ethernet::new();
        eth.src = self.match_eth_src;
        eth.dst = self.match_eth_dst;
        let mut builder = ChainBuilder::new().ethernet(eth);

        if wants_ip {
            let mut ip = Ipv4::new();
            ip.src = self.match_ip_src;
            ip.dst = self.match_ip_dst;
            builder = builder.ipv4(ip);
        }
        if wants_udp {
            let mut udp = Udp::new();
            udp.src = self.match_udp_src;
            udp.dst = self.match_udp_dst;
            builder = builder.udp(udp);
        }

        Ok(Some(Selector::layer(builder.build()?)))
    }

    /// Stock rewrite built from the `--rewrite-*` flags
    pub fn rewrite(&self) -> Option<Rewrite> {
        let rewrite = Rewrite {
            eth_src: self.rewrite_eth_src,
            eth_dst: self.rewrite_eth_dst,
            ip_src: self.rewrite_ip_src,
            ip_dst: self.rewrite_ip_dst,
            ttl: self.rewrite_ttl,
            udp_src: self.rewrite_udp_src,
            udp_dst: self.rewrite_udp_dst,
        };
        (!rewrite.is_empty()).then_some(rewrite)
    }

    /// Input capture filter: `--filter` narrowed by the `--match-*` flags
    pub fn capture_filter(&self) -> Option<String> {
        if self.no_filter {
            return None;
        }

        let mut parts = Vec::new();
        if let Some(mac) = self.match_eth_src {
            parts.push(filters::ether_src_filter(mac));
        }
        if let Some(mac) = self.match_eth_dst {
            parts.push(filters::ether_dst_filter(mac));
        }
        if let Some(addr) = self.match_ip_src {
            parts.push(filters::src_host_filter(addr));
        }
        if let Some(addr) = self.match_ip_dst {
            parts.push(filters::dst_host_filter(addr));
        }
        // No source-only port primitive; "udp port" is a superset
        if let Some(port) = self.match_udp_src {
            parts.push(filters::udp_port_filter(port));
        }
        if let Some(port) = self.match_udp_dst {
            parts.push(filters::udp_dst_port_filter(port));
        }

        if self.match_any || parts.is_empty() {
            return Some(self.filter.clone());
        }

        let mut all = vec![self.filter.as_str()];
        all.extend(parts.iter().map(String::as_str));
        Some(filters::combine_filters(&all))
    }

    /// Full bridge configuration
    pub fn config(&self) -> Result<BridgeConfig> {
        let filter = self.capture_filter();
        let mut builder = BridgeConfig::builder(self.input.as_str(), self.output.as_str())
            .capture_filter(filter)
            .retry_backoff(Duration::from_secs(self.retry_backoff))
            .receive_timeout(Duration::from_millis(self.receive_timeout));

        if let Some(selector) = self.selector()? {
            builder = builder.selector(selector);
        }
        if let Some(rewrite) = self.rewrite() {
            builder = builder.mangle(rewrite);
        }
        builder.build()
    }
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge_args(args: &[&str]) -> BridgeArgs {
        let mut argv = vec!["ferry", "bridge", "-i", "eth0", "-o", "eth1"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Bridge(args) => args,
            other => panic!("Expected bridge command, got {:?}", other),
        }
    }

    #[test]
    fn test_interfaces_command() {
        let cli = Cli::try_parse_from(["ferry", "-vv", "interfaces", "--all"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Interfaces { all: true }));
    }

    #[test]
    fn test_bridge_defaults() {
        let args = bridge_args(&[]);
        assert_eq!(args.input, "eth0");
        assert_eq!(args.output, "eth1");
        assert!(args.selector().unwrap().is_none());
        assert!(args.rewrite().is_none());

        let config = args.config().unwrap();
        assert_eq!(config.capture_filter(), Some("ip"));
        assert_eq!(config.retry_backoff(), Duration::from_secs(3));
        assert_eq!(config.receive_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_no_filter() {
        let config = bridge_args(&["--no-filter"]).config().unwrap();
        assert!(config.capture_filter().is_none());
        assert!(Cli::try_parse_from([
            "ferry", "bridge", "-i", "a", "-o", "b", "--no-filter", "--filter", "udp"
        ])
        .is_err());
    }

    #[test]
    fn test_match_flags_build_chain() {
        let args = bridge_args(&["--match-ip-dst", "123.1.1.2", "--match-udp-dst", "1234"]);
        let selector = args.selector().unwrap().unwrap();
        assert_eq!(
            selector.to_string(),
            "Ethernet() / IPv4(dst=123.1.1.2) / UDP(dst=1234)"
        );
    }

    #[test]
    fn test_capture_filter_follows_match_flags() {
        let args = bridge_args(&["--match-udp-dst", "1234"]);
        assert_eq!(
            args.capture_filter().as_deref(),
            Some("(ip) and (udp dst port 1234)")
        );

        let args = bridge_args(&[
            "--match-eth-src",
            "a0:bb:cc:dd:ee:f0",
            "--match-ip-src",
            "10.0.0.1",
            "--match-ip-dst",
            "123.1.1.2",
            "--match-udp-src",
            "53",
        ]);
        assert_eq!(
            args.config().unwrap().capture_filter(),
            Some(
                "(ip) and (ether src a0:bb:cc:dd:ee:f0) and (src host 10.0.0.1) \
                 and (dst host 123.1.1.2) and (udp port 53)"
            )
        );
    }

    #[test]
    fn test_capture_filter_without_match_flags() {
        assert_eq!(bridge_args(&[]).capture_filter().as_deref(), Some("ip"));
        assert_eq!(
            bridge_args(&["--filter", "udp", "--match-any"]).capture_filter().as_deref(),
            Some("udp")
        );
        assert_eq!(
            bridge_args(&["--no-filter", "--match-udp-dst", "53"]).capture_filter(),
            None
        );
        // Empty base filter is skipped
        assert_eq!(
            bridge_args(&["--filter", "", "--match-ip-dst", "10.0.0.2"])
                .capture_filter()
                .as_deref(),
            Some("(dst host 10.0.0.2)")
        );
    }

    #[test]
    fn test_match_mac() {
        let args = bridge_args(&["--match-eth-src", "a0:bb:cc:dd:ee:f0"]);
        assert_eq!(
            args.selector().unwrap().unwrap().to_string(),
            "Ethernet(src=a0:bb:cc:dd:ee:f0)"
        );
        assert!(Cli::try_parse_from([
            "ferry", "bridge", "-i", "a", "-o", "b", "--match-eth-src", "not-a-mac"
        ])
        .is_err());
    }

    #[test]
    fn test_rewrite_flags() {
        let args = bridge_args(&["--rewrite-ip-src", "10.0.0.1", "--rewrite-ttl", "7"]);
        let rewrite = args.rewrite().unwrap();
        assert_eq!(rewrite.ip_src, Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(rewrite.ttl, Some(7));

        let config = bridge_args(&["--match-any", "--rewrite-ttl", "7"]).config().unwrap();
        assert!(config.selector().is_some());
        assert!(config.mangle().is_some());
    }

    #[test]
    fn test_zero_receive_timeout_rejected() {
        assert!(bridge_args(&["--receive-timeout", "0"]).config().is_err());
    }
}
