//! 解码结果的文本输出

use std::fmt::Write;

use chrono::{Local, TimeZone};

use super::common::*;
use super::decode::DecodedFrame;
use crate::capture::CaptureMeta;

const HEX_DUMP_WIDTH: usize = 16;

/// 本地时间 `HH:MM:SS.ffffff`
pub fn format_timestamp(meta: &CaptureMeta) -> String {
    let usec = meta.ts_usec.min(999_999);
    match Local.timestamp_opt(meta.ts_sec, usec * 1_000).earliest() {
        Some(ts) => ts.format("%H:%M:%S%.6f").to_string(),
        None => format!("00:00:00.{:06}", usec),
    }
}

/// 单行摘要：时间戳、按解码顺序排列的各层，最后是帧长度
pub fn summary_line(frame: &DecodedFrame) -> String {
    let mut parts: Vec<String> = frame.layers.iter().map(describe_layer).collect();
    parts.push(format!("length {} bytes", frame.length()));
    format!("{} {}", format_timestamp(&frame.meta), parts.join(", "))
}

fn describe_layer(layer: &DecodedLayer) -> String {
    match layer {
        DecodedLayer::Ethernet(eth) => match eth.vlan {
            Some(vlan) => format!("{} > {} vlan {}", eth.source, eth.destination, vlan),
            None => format!("{} > {}", eth.source, eth.destination),
        },
        DecodedLayer::Loopback(lo) => format!("loopback family {}", lo.family),
        DecodedLayer::LinuxSll(sll) => {
            let address: Vec<String> = sll.address.iter().map(|b| format!("{:02x}", b)).collect();
            format!("SLL {}", address.join(":"))
        }
        DecodedLayer::Ipv4(ip) => format!("IPv4 {} > {}", ip.source, ip.destination),
        DecodedLayer::Ipv6(ip) => format!("IPv6 {} > {}", ip.source, ip.destination),
        DecodedLayer::Tcp(tcp) => format!(
            "TCP {} > {} [{}] Seq={} Ack={} Win={}",
            tcp.source_port,
            tcp.destination_port,
            tcp.flags.letters(),
            tcp.sequence,
            tcp.acknowledgement,
            tcp.window
        ),
        DecodedLayer::Udp(udp) => format!(
            "UDP {} > {} Len={}",
            udp.source_port, udp.destination_port, udp.length
        ),
        DecodedLayer::Icmp(icmp) => format!("ICMP Type={} Code={}", icmp.icmp_type, icmp.code),
        DecodedLayer::Icmpv6(icmp) => {
            format!("ICMPv6 Type={} Code={}", icmp.icmp_type, icmp.code)
        }
        DecodedLayer::Dns(dns) => {
            let mut label = dns.label().to_string();
            for name in &dns.names {
                label.push(' ');
                label.push_str(name);
            }
            label
        }
        DecodedLayer::Unknown(unknown) => match unknown.parent {
            LayerKind::Ethernet | LayerKind::LinuxSll => {
                format!("ethertype 0x{:04x}", unknown.protocol)
            }
            LayerKind::Loopback => format!("family {}", unknown.protocol),
            _ => format!("ip proto {}", unknown.protocol),
        },
    }
}

/// 负载的 ASCII 预览；不可打印字节超过 30% 时改为小写十六进制。
/// `\r`、`\n`、`\t` 视为可打印的空格
pub fn payload_preview(payload: &[u8]) -> String {
    let mut ascii = String::with_capacity(payload.len());
    let mut unprintable = 0usize;

    for &b in payload {
        match b {
            0x20..=0x7E => ascii.push(b as char),
            b'\r' | b'\n' | b'\t' => ascii.push(' '),
            _ => {
                unprintable += 1;
                ascii.push('.');
            }
        }
    }

    if unprintable * 10 > payload.len() * 3 {
        to_hex(payload)
    } else {
        ascii.trim().to_string()
    }
}

pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

/// 详细模式下的 `hexdump -C` 风格转储，每行 16 字节
pub fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(HEX_DUMP_WIDTH).enumerate() {
        let _ = write!(out, "  {:08x}  ", row * HEX_DUMP_WIDTH);
        for i in 0..HEX_DUMP_WIDTH {
            match chunk.get(i) {
                Some(b) => {
                    let _ = write!(out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
            if i == 7 {
                out.push(' ');
            }
        }
        out.push_str(" |");
        for &b in chunk {
            out.push(if (0x20..=0x7E).contains(&b) { b as char } else { '.' });
        }
        out.push_str("|\n");
    }
    out
}

/// 控制台和文本日志写出的内容：摘要、负载行，
/// 以及详细模式下的十六进制转储
pub fn frame_block(frame: &DecodedFrame, raw: &[u8], verbose: bool) -> String {
    let mut out = frame.summary();
    out.push('\n');
    if let Some(preview) = &frame.payload_preview {
        let _ = writeln!(out, "  Payload: {}", preview);
    }
    if verbose {
        out.push_str(&hex_dump(raw));
    }
    out
}
