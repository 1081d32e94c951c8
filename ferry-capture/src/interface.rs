//! Network interface enumeration and information

use ferry_core::{Error, MacAddr, Result};
use pnet_datalink::{self, NetworkInterface};
use std::fmt;
use std::net::IpAddr;

/// Information about a network interface
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    /// Interface name (e.g., "eth0", "wlan0")
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Interface index
    pub index: u32,
    /// MAC address if available
    pub mac: Option<MacAddr>,
    /// List of IP addresses assigned to this interface
    pub ips: Vec<IpAddr>,
    /// Whether the interface is up
    pub is_up: bool,
    /// Whether the interface is a loopback
    pub is_loopback: bool,
    /// Whether the interface supports multicast
    pub is_multicast: bool,
}

impl From<&NetworkInterface> for InterfaceInfo {
    fn from(iface: &NetworkInterface) -> Self {
        let mac = iface
            .mac
            .map(|mac| MacAddr([mac.0, mac.1, mac.2, mac.3, mac.4, mac.5]));

        InterfaceInfo {
            name: iface.name.clone(),
            description: iface.description.clone(),
            index: iface.index,
            mac,
            ips: iface.ips.iter().map(|network| network.ip()).collect(),
            is_up: iface.is_up(),
            is_loopback: iface.is_loopback(),
            is_multicast: iface.is_multicast(),
        }
    }
}

impl InterfaceInfo {
    /// Check if the interface can carry bridged traffic
    pub fn is_bridge_capable(&self) -> bool {
        self.is_up && !self.is_loopback
    }

    /// Get the primary IPv4 address if available
    pub fn primary_ipv4(&self) -> Option<IpAddr> {
        self.ips.iter().find(|ip| ip.is_ipv4()).copied()
    }
}

impl fmt::Display for InterfaceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(mac) = self.mac {
            write!(f, " [{}]", mac)?;
        }
        for ip in &self.ips {
            write!(f, " {}", ip)?;
        }

        let mut flags = Vec::new();
        if self.is_up {
            flags.push("UP");
        }
        if self.is_loopback {
            flags.push("LOOPBACK");
        }
        if self.is_multicast {
            flags.push("MULTICAST");
        }
        if !flags.is_empty() {
            write!(f, " <{}>", flags.join(","))?;
        }
        Ok(())
    }
}

/// List all available network interfaces
pub fn list_interfaces() -> Vec<InterfaceInfo> {
    pnet_datalink::interfaces()
        .iter()
        .map(InterfaceInfo::from)
        .collect()
}

/// Get information about a specific interface by name
pub fn get_interface(name: &str) -> Result<InterfaceInfo> {
    pnet_datalink::interfaces()
        .iter()
        .find(|iface| iface.name == name)
        .map(InterfaceInfo::from)
        .ok_or_else(|| Error::unavailable(name, "no such interface"))
}

/// List all interfaces that can carry bridged traffic
pub fn list_bridge_interfaces() -> Vec<InterfaceInfo> {
    list_interfaces()
        .into_iter()
        .filter(InterfaceInfo::is_bridge_capable)
        .collect()
}
