//! BPF (Berkeley Packet Filter) filter builders for bridged traffic

use ferry_core::MacAddr;
use std::net::Ipv4Addr;

/// IPv4 filter
pub fn ipv4_filter() -> String {
    "ip".to_string()
}

/// Filter for specific UDP port (source or destination)
pub fn udp_port_filter(port: u16) -> String {
    format!("udp port {}", port)
}

/// Filter for specific UDP destination port
pub fn udp_dst_port_filter(port: u16) -> String {
    format!("udp dst port {}", port)
}

/// Filter for specific source IP
pub fn src_host_filter(ip: Ipv4Addr) -> String {
    format!("src host {}", ip)
}

/// Filter for specific destination IP
pub fn dst_host_filter(ip: Ipv4Addr) -> String {
    format!("dst host {}", ip)
}

/// Filter for specific source MAC address
pub fn ether_src_filter(mac: MacAddr) -> String {
    format!("ether src {}", mac)
}

/// Filter for specific destination MAC address
pub fn ether_dst_filter(mac: MacAddr) -> String {
    format!("ether dst {}", mac)
}

/// Combine multiple filters with AND logic
pub fn combine_filters(filters: &[&str]) -> String {
    filters
        .iter()
        .filter(|f| !f.is_empty())
        .map(|f| format!("({})", f))
        .collect::<Vec<_>>()
        .join(" and ")
}
