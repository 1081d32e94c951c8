//! Example: Building a UDP packet
//!
//! Composes an Ethernet / IPv4 / UDP chain carrying a DNS query header and
//! prints the resulting frame.

use std::net::Ipv4Addr;
use ferry_core::MacAddr;
use ferry_packet::{ChainBuilder, Ethernet, Ipv4, Layer, Udp};

fn main() -> ferry_core::Result<()> {
    let src_mac = MacAddr([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    let dst_mac = MacAddr([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    let src_ip = Ipv4Addr::new(192, 168, 1, 100);
    let dst_ip = Ipv4Addr::new(192, 168, 1, 1);

    let dns_query = vec![
        0x12, 0x34, // Transaction ID
        0x01, 0x00, // Flags: standard query
        0x00, 0x01, // Questions: 1
        0x00, 0x00, // Answer RRs: 0
        0x00, 0x00, // Authority RRs: 0
        0x00, 0x00, // Additional RRs: 0
    ];

    let mut chain = ChainBuilder::new()
        .ethernet(Ethernet::new().with_src(src_mac).with_dst(dst_mac))
        .ipv4(Ipv4::new().with_src(src_ip).with_dst(dst_ip).with_ttl(64))
        .udp(Udp::new().with_src(54321).with_dst(53))
        .payload(dns_query)
        .build()?;

    let packet = chain.serialize()?;

    println!("Built: {}", chain);
    println!("Total size: {} bytes", packet.len());
    println!("Ethernet header: {:02X?}", &packet[..14]);

    let parsed = Layer::dissect(&packet)?;
    if let (Some(ip), Some(udp)) = (parsed.as_ipv4(), parsed.as_udp()) {
        println!("IP checksum valid: {}", ip.verify_checksum());
        println!("UDP checksum valid: {}", udp.verify_checksum(ip.pseudo_context()));
    }
    Ok(())
}
