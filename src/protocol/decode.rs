//! 逐层帧解码
//!
//! 每一层接收上一层剩下的字节，要么压入一层，要么停止。
//! 截断或畸形的头部只会结束解码链，
//! 不会让整帧失败。

use std::convert::TryFrom;
use std::net::IpAddr;

use log::trace;
use pnet::packet::ethernet::EthernetPacket;
use pnet::packet::icmp::IcmpPacket;
use pnet::packet::icmpv6::Icmpv6Packet;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;

use super::common::*;
use super::dns::DnsMessage;
use super::render;
use crate::capture::{CaptureMeta, LinkType, RawFrame};

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERNET_HEADER_LEN: usize = 14;
const LOOPBACK_HEADER_LEN: usize = 4;
const SLL_HEADER_LEN: usize = 16;
const IPV6_HEADER_LEN: usize = 40;
const UDP_HEADER_LEN: usize = 8;
const ICMP_HEADER_LEN: usize = 8;
const ICMPV6_HEADER_LEN: usize = 4;
const DNS_PORT: u16 = 53;
const MDNS_PORT: u16 = 5353;
/// 放弃解析传输层之前最多遍历的 IPv6 扩展头数量
const MAX_IPV6_EXTENSIONS: usize = 8;

/// 已尽可能逐层识别的帧
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub meta: CaptureMeta,
    pub layers: Vec<DecodedLayer>,
    /// 应用层负载的预览文本
    pub payload_preview: Option<String>,
}

impl DecodedFrame {
    /// 帧在链路上的原始长度
    pub fn length(&self) -> u32 {
        self.meta.len
    }

    pub fn has_layer(&self, kind: LayerKind) -> bool {
        self.layers.iter().any(|l| l.kind() == Some(kind))
    }

    /// 成功解码的层数
    pub fn decoded_layers(&self) -> usize {
        self.layers.iter().filter(|l| l.kind().is_some()).count()
    }

    pub fn link(&self) -> Option<&DecodedLayer> {
        self.layers.iter().find(|l| {
            matches!(
                l,
                DecodedLayer::Ethernet(_) | DecodedLayer::Loopback(_) | DecodedLayer::LinuxSll(_)
            )
        })
    }

    pub fn network(&self) -> Option<&IpLayer> {
        self.layers.iter().find_map(|l| match l {
            DecodedLayer::Ipv4(ip) | DecodedLayer::Ipv6(ip) => Some(ip),
            _ => None,
        })
    }

    pub fn transport(&self) -> Option<&DecodedLayer> {
        self.layers.iter().find(|l| {
            matches!(
                l,
                DecodedLayer::Tcp(_)
                    | DecodedLayer::Udp(_)
                    | DecodedLayer::Icmp(_)
                    | DecodedLayer::Icmpv6(_)
            )
        })
    }

    /// TCP 或 UDP 层的源端口和目的端口
    pub fn ports(&self) -> Option<(u16, u16)> {
        match self.transport()? {
            DecodedLayer::Tcp(tcp) => Some((tcp.source_port, tcp.destination_port)),
            DecodedLayer::Udp(udp) => Some((udp.source_port, udp.destination_port)),
            _ => None,
        }
    }

    pub fn application(&self) -> Option<&DnsLayer> {
        self.layers.iter().find_map(|l| match l {
            DecodedLayer::Dns(dns) => Some(dns),
            _ => None,
        })
    }

    pub fn summary(&self) -> String {
        render::summary_line(self)
    }
}

/// 按链路类型解码帧
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    link_type: LinkType,
    preview_len: usize,
}

impl Decoder {
    pub fn new(link_type: LinkType, preview_len: usize) -> Self {
        Self {
            link_type,
            preview_len,
        }
    }

    pub fn decode(&self, frame: &RawFrame) -> DecodedFrame {
        let mut layers = Vec::new();
        let payload = self.decode_link(&frame.data, &mut layers);

        let payload_preview = match payload {
            Some(bytes) if self.preview_len > 0 && !bytes.is_empty() => {
                let end = bytes.len().min(self.preview_len);
                Some(render::payload_preview(&bytes[..end]))
            }
            _ => None,
        };

        DecodedFrame {
            meta: frame.meta,
            layers,
            payload_preview,
        }
    }

    /// 解码到应用层时返回其负载
    fn decode_link<'a>(&self, data: &'a [u8], layers: &mut Vec<DecodedLayer>) -> Option<&'a [u8]> {
        match self.link_type {
            LinkType::ETHERNET => decode_ethernet(data, layers),
            LinkType::NULL | LinkType::LOOP => decode_loopback(data, layers),
            LinkType::LINUX_SLL => decode_linux_sll(data, layers),
            LinkType::RAW | LinkType::RAW_BSD | LinkType::RAW_OPENBSD => decode_raw_ip(data, layers),
            other => {
                trace!("unsupported link type {}", other.0);
                None
            }
        }
    }
}

fn decode_ethernet<'a>(data: &'a [u8], layers: &mut Vec<DecodedLayer>) -> Option<&'a [u8]> {
    let ethernet = EthernetPacket::new(data)?;
    let mut ethertype = ethernet.get_ethertype().0;
    let mut offset = ETHERNET_HEADER_LEN;
    let mut vlan = None;

    if ethertype == ETHERTYPE_VLAN {
        if let Some(tag) = data.get(offset..offset + 4) {
            vlan = Some(u16::from_be_bytes([tag[0], tag[1]]) & 0x0FFF);
            ethertype = u16::from_be_bytes([tag[2], tag[3]]);
            offset += 4;
        }
    }

    layers.push(DecodedLayer::Ethernet(EthernetLayer {
        source: ethernet.get_source(),
        destination: ethernet.get_destination(),
        ethertype,
        vlan,
    }));

    decode_ethertype(LayerKind::Ethernet, ethertype, data.get(offset..)?, layers)
}

fn decode_loopback<'a>(data: &'a [u8], layers: &mut Vec<DecodedLayer>) -> Option<&'a [u8]> {
    let header = data.get(..LOOPBACK_HEADER_LEN)?;
    // DLT_NULL 以主机字节序存放协议族，DLT_LOOP 以网络字节序存放。
    // 协议族取值很小，能放进 16 位的那种读法就是正确的。
    let le = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let be = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let family = if le <= 0xFFFF { le } else { be };

    layers.push(DecodedLayer::Loopback(LoopbackLayer { family }));

    let rest = &data[LOOPBACK_HEADER_LEN..];
    match family {
        2 => decode_ipv4(rest, layers),
        // 各 BSD、Darwin 与 Linux 的 AF_INET6 取值不同
        10 | 24 | 28 | 30 => decode_ipv6(rest, layers),
        other => {
            layers.push(DecodedLayer::Unknown(UnknownLayer {
                parent: LayerKind::Loopback,
                protocol: other,
            }));
            None
        }
    }
}

fn decode_linux_sll<'a>(data: &'a [u8], layers: &mut Vec<DecodedLayer>) -> Option<&'a [u8]> {
    let header = data.get(..SLL_HEADER_LEN)?;
    let addr_len = (u16::from_be_bytes([header[4], header[5]]) as usize).min(8);
    let protocol = u16::from_be_bytes([header[14], header[15]]);

    layers.push(DecodedLayer::LinuxSll(LinuxSllLayer {
        packet_type: u16::from_be_bytes([header[0], header[1]]),
        address: header[6..6 + addr_len].to_vec(),
        protocol,
    }));

    decode_ethertype(LayerKind::LinuxSll, protocol, &data[SLL_HEADER_LEN..], layers)
}

fn decode_raw_ip<'a>(data: &'a [u8], layers: &mut Vec<DecodedLayer>) -> Option<&'a [u8]> {
    match data.first()? >> 4 {
        4 => decode_ipv4(data, layers),
        6 => decode_ipv6(data, layers),
        _ => None,
    }
}

fn decode_ethertype<'a>(
    parent: LayerKind,
    ethertype: u16,
    rest: &'a [u8],
    layers: &mut Vec<DecodedLayer>,
) -> Option<&'a [u8]> {
    match ethertype {
        ETHERTYPE_IPV4 => decode_ipv4(rest, layers),
        ETHERTYPE_IPV6 => decode_ipv6(rest, layers),
        other => {
            layers.push(DecodedLayer::Unknown(UnknownLayer {
                parent,
                protocol: other as u32,
            }));
            None
        }
    }
}

fn decode_ipv4<'a>(data: &'a [u8], layers: &mut Vec<DecodedLayer>) -> Option<&'a [u8]> {
    let ip = Ipv4Packet::new(data)?;
    if ip.get_version() != 4 {
        trace!("IPv4 header with version {}", ip.get_version());
        return None;
    }

    let protocol = ip.get_next_level_protocol().0;
    layers.push(DecodedLayer::Ipv4(IpLayer {
        source: IpAddr::V4(ip.get_source()),
        destination: IpAddr::V4(ip.get_destination()),
        protocol,
        ttl: ip.get_ttl(),
    }));

    // 后续分片不含传输层头部
    if ip.get_fragment_offset() != 0 {
        return None;
    }

    let header_len = ip.get_header_length() as usize * 4;
    if header_len < 20 || header_len > data.len() {
        trace!("IPv4 header length {} out of range", header_len);
        return None;
    }
    // 总长度为 0（分段卸载）或超出抓包长度时，
    // 按实际抓到的全部字节处理
    let total_len = ip.get_total_length() as usize;
    let end = if total_len >= header_len && total_len <= data.len() {
        total_len
    } else {
        data.len()
    };

    decode_transport(LayerKind::Ipv4, protocol, &data[header_len..end], layers)
}

fn decode_ipv6<'a>(data: &'a [u8], layers: &mut Vec<DecodedLayer>) -> Option<&'a [u8]> {
    let ip = Ipv6Packet::new(data)?;
    if ip.get_version() != 6 {
        trace!("IPv6 header with version {}", ip.get_version());
        return None;
    }

    let payload_len = ip.get_payload_length() as usize;
    let end = if payload_len > 0 {
        (IPV6_HEADER_LEN + payload_len).min(data.len())
    } else {
        data.len()
    };
    let (next_header, offset) = skip_ipv6_extensions(ip.get_next_header().0, data, end);

    layers.push(DecodedLayer::Ipv6(IpLayer {
        source: IpAddr::V6(ip.get_source()),
        destination: IpAddr::V6(ip.get_destination()),
        protocol: next_header,
        ttl: ip.get_hop_limit(),
    }));

    decode_transport(LayerKind::Ipv6, next_header, &data[offset..end], layers)
}

/// 遍历逐跳选项、路由、分片和目的选项扩展头
/// 返回上层协议号及其在 `data` 中的偏移
fn skip_ipv6_extensions(mut next: u8, data: &[u8], end: usize) -> (u8, usize) {
    let mut offset = IPV6_HEADER_LEN;
    for _ in 0..MAX_IPV6_EXTENSIONS {
        if !matches!(next, 0 | 43 | 44 | 60) {
            break;
        }
        let header = match data.get(offset..offset + 4) {
            Some(header) => header,
            None => return (next, end),
        };
        // 非首个分片：上层头部在别的帧里
        if next == 44 && u16::from_be_bytes([header[2], header[3]]) >> 3 != 0 {
            return (header[0], end);
        }
        let len = if next == 44 {
            8
        } else {
            (header[1] as usize + 1) * 8
        };
        next = header[0];
        offset += len;
    }
    (next, offset.min(end))
}

fn decode_transport<'a>(
    parent: LayerKind,
    protocol: u8,
    data: &'a [u8],
    layers: &mut Vec<DecodedLayer>,
) -> Option<&'a [u8]> {
    match LayerKind::try_from(protocol) {
        Ok(LayerKind::Tcp) => decode_tcp(data, layers),
        Ok(LayerKind::Udp) => decode_udp(data, layers),
        Ok(LayerKind::Icmp) => {
            let icmp = IcmpPacket::new(data)?;
            layers.push(DecodedLayer::Icmp(IcmpLayer {
                icmp_type: icmp.get_icmp_type().0,
                code: icmp.get_icmp_code().0,
            }));
            data.get(ICMP_HEADER_LEN..)
        }
        Ok(LayerKind::Icmpv6) => {
            let icmp = Icmpv6Packet::new(data)?;
            layers.push(DecodedLayer::Icmpv6(IcmpLayer {
                icmp_type: icmp.get_icmpv6_type().0,
                code: icmp.get_icmpv6_code().0,
            }));
            data.get(ICMPV6_HEADER_LEN..)
        }
        _ => {
            layers.push(DecodedLayer::Unknown(UnknownLayer {
                parent,
                protocol: protocol as u32,
            }));
            None
        }
    }
}

fn decode_tcp<'a>(data: &'a [u8], layers: &mut Vec<DecodedLayer>) -> Option<&'a [u8]> {
    let tcp = TcpPacket::new(data)?;
    let source_port = tcp.get_source();
    let destination_port = tcp.get_destination();

    layers.push(DecodedLayer::Tcp(TcpLayer {
        source_port,
        destination_port,
        sequence: tcp.get_sequence(),
        acknowledgement: tcp.get_acknowledgement(),
        window: tcp.get_window(),
        flags: TcpFlags(tcp.packet()[13]),
    }));

    let header_len = tcp.get_data_offset() as usize * 4;
    if header_len < 20 || header_len > data.len() {
        trace!("TCP data offset {} out of range", header_len);
        return Some(&[]);
    }
    let payload = &data[header_len..];

    if is_dns_port(source_port, destination_port) {
        // TCP 上的 DNS 报文带两字节长度前缀
        if let Some(message) = payload.get(2..) {
            decode_dns(message, layers);
        }
    }
    Some(payload)
}

fn decode_udp<'a>(data: &'a [u8], layers: &mut Vec<DecodedLayer>) -> Option<&'a [u8]> {
    let udp = UdpPacket::new(data)?;
    let source_port = udp.get_source();
    let destination_port = udp.get_destination();
    let length = udp.get_length();

    layers.push(DecodedLayer::Udp(UdpLayer {
        source_port,
        destination_port,
        length,
    }));

    let end = if (length as usize) >= UDP_HEADER_LEN && (length as usize) <= data.len() {
        length as usize
    } else {
        data.len()
    };
    let payload = &data[UDP_HEADER_LEN..end];

    if is_dns_port(source_port, destination_port) {
        decode_dns(payload, layers);
    } else if let Some(dns) = probe_dns(payload) {
        layers.push(DecodedLayer::Dns(dns));
    }
    Some(payload)
}

fn is_dns_port(source: u16, destination: u16) -> bool {
    [source, destination]
        .iter()
        .any(|p| *p == DNS_PORT || *p == MDNS_PORT)
}

fn decode_dns(payload: &[u8], layers: &mut Vec<DecodedLayer>) {
    match DnsMessage::parse(payload) {
        Ok(message) => layers.push(DecodedLayer::Dns(dns_layer(&message))),
        Err(e) => trace!("not decoding DNS: {}", e),
    }
}

/// 非 DNS 端口上的 UDP 只按内容识别 DNS，
/// 仅接受只含一个问题的完整标准报文
fn probe_dns(payload: &[u8]) -> Option<DnsLayer> {
    let message = DnsMessage::parse(payload).ok()?;
    let header = &message.header;
    let plausible = header.opcode() == 0
        && !header.z()
        && header.qdcount == 1
        && message.consumed == payload.len();
    if plausible {
        Some(dns_layer(&message))
    } else {
        None
    }
}

fn dns_layer(message: &DnsMessage) -> DnsLayer {
    let (kind, mut names): (DnsKind, Vec<String>) = if message.header.is_response() {
        (
            DnsKind::Response,
            message.answers.iter().map(|a| a.name.clone()).collect(),
        )
    } else {
        (
            DnsKind::Query,
            message.questions.iter().map(|q| q.name.clone()).collect(),
        )
    };
    if names.is_empty() {
        names = message.questions.iter().map(|q| q.name.clone()).collect();
    }
    names.dedup();

    DnsLayer {
        kind,
        id: message.header.id,
        names,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::dns::tests::{build_query, build_response};
    use etherparse::PacketBuilder;
    use std::net::Ipv4Addr;

    const MAC_A: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
    const MAC_B: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];

    fn udp_frame(src_port: u16, dst_port: u16, payload: &[u8]) -> RawFrame {
        let builder = PacketBuilder::ethernet2(MAC_A, MAC_B)
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .udp(src_port, dst_port);
        let mut buf = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut buf, payload).unwrap();
        RawFrame::whole(buf, 0)
    }

    fn tcp_syn_frame(payload: &[u8]) -> RawFrame {
        let builder = PacketBuilder::ethernet2(MAC_A, MAC_B)
            .ipv4([192, 168, 0, 1], [192, 168, 0, 2], 64)
            .tcp(40000, 80, 1000, 65535)
            .syn();
        let mut buf = Vec::new();
        builder.write(&mut buf, payload).unwrap();
        RawFrame::whole(buf, 0)
    }

    fn decoder() -> Decoder {
        Decoder::new(LinkType::ETHERNET, 64)
    }

    #[test]
    fn test_decode_tcp_syn() {
        let frame = decoder().decode(&tcp_syn_frame(b""));

        assert_eq!(frame.layers.len(), 3);
        assert!(frame.has_layer(LayerKind::Ethernet));
        let ip = frame.network().unwrap();
        assert_eq!(ip.source, IpAddr::V4(Ipv4Addr::new(192, 168, 0, 1)));
        match frame.transport().unwrap() {
            DecodedLayer::Tcp(tcp) => {
                assert_eq!(tcp.destination_port, 80);
                assert_eq!(tcp.sequence, 1000);
                assert!(tcp.flags.contains(TcpFlags::SYN));
                assert_eq!(tcp.flags.letters(), "S");
            }
            other => panic!("expected TCP, got {:?}", other),
        }
        assert_eq!(frame.payload_preview, None);
        assert!(frame.application().is_none());
    }

    #[test]
    fn test_decode_dns_query_on_port_53() {
        let frame = decoder().decode(&udp_frame(33000, 53, &build_query(0xbeef, "example.com")));

        let dns = frame.application().expect("DNS layer");
        assert_eq!(dns.label(), "DNS query");
        assert_eq!(dns.names, vec!["example.com".to_string()]);
        assert_eq!(frame.ports(), Some((33000, 53)));
        assert!(frame.summary().contains("DNS query example.com"));
    }

    #[test]
    fn test_decode_dns_response_names_answers() {
        let payload = build_response(1, "example.net", [1, 2, 3, 4]);
        let frame = decoder().decode(&udp_frame(53, 33000, &payload));

        let dns = frame.application().unwrap();
        assert_eq!(dns.kind, DnsKind::Response);
        assert_eq!(dns.names, vec!["example.net".to_string()]);
    }

    #[test]
    fn test_dns_heuristic_on_other_udp_port() {
        let frame = decoder().decode(&udp_frame(40000, 9999, &build_query(2, "probe.test")));
        assert_eq!(frame.application().unwrap().names, vec!["probe.test".to_string()]);

        // 尾部多余字节使按内容识别失败
        let mut payload = build_query(2, "probe.test");
        payload.extend_from_slice(b"xx");
        let frame = decoder().decode(&udp_frame(40000, 9999, &payload));
        assert!(frame.application().is_none());
    }

    #[test]
    fn test_non_dns_payload_on_dns_port_keeps_udp() {
        let frame = decoder().decode(&udp_frame(1000, 53, b"hello"));
        assert!(frame.has_layer(LayerKind::Udp));
        assert!(!frame.has_layer(LayerKind::Dns));
        assert_eq!(frame.payload_preview.as_deref(), Some("hello"));
    }

    #[test]
    fn test_payload_preview_is_truncated() {
        let decoder = Decoder::new(LinkType::ETHERNET, 4);
        let frame = decoder.decode(&udp_frame(1000, 2000, b"GET /index.html"));
        assert_eq!(frame.payload_preview.as_deref(), Some("GET"));

        let decoder = Decoder::new(LinkType::ETHERNET, 0);
        let frame = decoder.decode(&udp_frame(1000, 2000, b"GET /index.html"));
        assert_eq!(frame.payload_preview, None);
    }

    #[test]
    fn test_decode_ipv6_udp() {
        let builder = PacketBuilder::ethernet2(MAC_A, MAC_B)
            .ipv6([0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1], [0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2], 64)
            .udp(546, 547);
        let mut buf = Vec::new();
        builder.write(&mut buf, &[1, 2, 3, 4]).unwrap();
        let frame = decoder().decode(&RawFrame::whole(buf, 0));

        assert!(frame.has_layer(LayerKind::Ipv6));
        assert!(!frame.has_layer(LayerKind::Ipv4));
        assert_eq!(frame.ports(), Some((546, 547)));
        assert_eq!(frame.decoded_layers(), 3);
    }

    #[test]
    fn test_decode_icmp_echo() {
        let mut data = vec![0u8; 14];
        data[..6].copy_from_slice(&MAC_B);
        data[6..12].copy_from_slice(&MAC_A);
        data[12] = 0x08;
        data.extend_from_slice(&[
            0x45, 0, 0, 28, 0, 0, 0, 0, 64, 1, 0, 0, 10, 0, 0, 1, 10, 0, 0, 2,
        ]);
        data.extend_from_slice(&[8, 0, 0, 0, 0, 1, 0, 1]);
        let frame = decoder().decode(&RawFrame::whole(data, 0));

        assert_eq!(
            frame.transport(),
            Some(&DecodedLayer::Icmp(IcmpLayer { icmp_type: 8, code: 0 }))
        );
        assert!(frame.summary().contains("ICMP Type=8 Code=0"));
    }

    #[test]
    fn test_decode_loopback_null_header() {
        let builder = PacketBuilder::ipv4([127, 0, 0, 1], [127, 0, 0, 1], 64)
            .tcp(5000, 6000, 1, 1024)
            .syn();
        let mut data = vec![2, 0, 0, 0];
        builder.write(&mut data, &[]).unwrap();
        let frame = Decoder::new(LinkType::NULL, 0).decode(&RawFrame::whole(data, 0));

        assert_eq!(
            frame.link(),
            Some(&DecodedLayer::Loopback(LoopbackLayer { family: 2 }))
        );
        assert!(frame.has_layer(LayerKind::Tcp));
    }

    #[test]
    fn test_unknown_ethertype_is_marked() {
        let mut data = vec![0u8; 42];
        data[12] = 0x08;
        data[13] = 0x06;
        let frame = decoder().decode(&RawFrame::whole(data, 0));

        assert_eq!(frame.decoded_layers(), 1);
        assert_eq!(
            frame.layers[1],
            DecodedLayer::Unknown(UnknownLayer {
                parent: LayerKind::Ethernet,
                protocol: 0x0806
            })
        );
        assert!(frame.summary().contains("ethertype 0x0806"));
    }

    #[test]
    fn test_empty_and_garbage_frames() {
        let frame = decoder().decode(&RawFrame::whole(Vec::new(), 0));
        assert!(frame.layers.is_empty());
        assert!(frame.summary().ends_with("length 0 bytes"));

        let frame = decoder().decode(&RawFrame::whole(vec![0xff; 5], 0));
        assert!(frame.layers.is_empty());
        assert!(frame.summary().contains("length 5 bytes"));
    }

    #[test]
    fn test_every_truncation_decodes_without_panic() {
        let full = udp_frame(5353, 53, &build_response(9, "a.b.c", [8, 8, 8, 8]));
        for cut in 0..=full.data.len() {
            let frame = RawFrame::whole(full.data.slice(..cut), 0);
            let decoded = decoder().decode(&frame);
            assert!(decoded.summary().contains(&format!("length {} bytes", cut)));
        }

        let syn = tcp_syn_frame(b"payload");
        for cut in 0..=syn.data.len() {
            decoder().decode(&RawFrame::whole(syn.data.slice(..cut), 0));
        }
    }

    #[test]
    fn test_corrupted_headers_decode_without_panic() {
        let base = tcp_syn_frame(b"abcdef");
        for index in 0..base.data.len() {
            for value in [0x00u8, 0x0f, 0x45, 0x60, 0xff] {
                let mut data = base.data.to_vec();
                data[index] = value;
                Decoder::new(LinkType::ETHERNET, 16).decode(&RawFrame::whole(data.clone(), 0));
                Decoder::new(LinkType::RAW, 16).decode(&RawFrame::whole(data.clone(), 0));
                Decoder::new(LinkType::LINUX_SLL, 16).decode(&RawFrame::whole(data, 0));
            }
        }
    }

    fn ipv6_header(next_header: u8, payload_len: u16) -> Vec<u8> {
        let mut data = vec![0x60, 0, 0, 0];
        data.extend_from_slice(&payload_len.to_be_bytes());
        data.extend_from_slice(&[next_header, 64]);
        data.extend_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        data.extend_from_slice(&[0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2]);
        data
    }

    // 源端口 1000，目的端口 2000，负载 "hi"
    const UDP_HI: [u8; 10] = [0x03, 0xe8, 0x07, 0xd0, 0x00, 0x0a, 0x00, 0x00, b'h', b'i'];

    fn ipv4_udp(payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ipv4([1, 1, 1, 1], [2, 2, 2, 2], 64).udp(1, 2);
        let mut data = Vec::new();
        builder.write(&mut data, payload).unwrap();
        data
    }

    #[test]
    fn test_decode_icmpv6_echo_request() {
        let mut data = ipv6_header(58, 8);
        data.extend_from_slice(&[128, 0, 0, 0, 0, 1, 0, 1]);
        let frame = Decoder::new(LinkType::RAW, 0).decode(&RawFrame::whole(data, 0));

        assert_eq!(frame.network().unwrap().protocol, 58);
        assert_eq!(
            frame.transport(),
            Some(&DecodedLayer::Icmpv6(IcmpLayer {
                icmp_type: 128,
                code: 0
            }))
        );
        assert!(frame.summary().contains("ICMPv6 Type=128 Code=0"));
    }

    #[test]
    fn test_decode_ipv6_hop_by_hop_then_udp() {
        let mut data = ipv6_header(0, 8 + UDP_HI.len() as u16);
        // 逐跳选项头：下一头部 UDP，长度 8 字节，PadN 填充
        data.extend_from_slice(&[17, 0, 1, 4, 0, 0, 0, 0]);
        data.extend_from_slice(&UDP_HI);
        let frame = Decoder::new(LinkType::RAW, 64).decode(&RawFrame::whole(data, 0));

        assert_eq!(frame.network().unwrap().protocol, 17);
        assert_eq!(frame.ports(), Some((1000, 2000)));
        assert_eq!(frame.payload_preview.as_deref(), Some("hi"));
    }

    #[test]
    fn test_decode_ipv6_fragments() {
        // 首个分片（偏移 0，M 标志置位）仍带有 UDP 头
        let mut first = ipv6_header(44, 8 + UDP_HI.len() as u16);
        first.extend_from_slice(&[17, 0, 0x00, 0x01, 0, 0, 0, 9]);
        first.extend_from_slice(&UDP_HI);
        let frame = Decoder::new(LinkType::RAW, 0).decode(&RawFrame::whole(first, 0));
        assert_eq!(frame.ports(), Some((1000, 2000)));

        // 后续分片（偏移 1）没有传输层头部
        let mut later = ipv6_header(44, 16);
        later.extend_from_slice(&[17, 0, 0x00, 0x08, 0, 0, 0, 9]);
        later.extend_from_slice(&[0xaa; 8]);
        let frame = Decoder::new(LinkType::RAW, 64).decode(&RawFrame::whole(later, 0));

        assert_eq!(frame.layers.len(), 1);
        assert_eq!(frame.network().unwrap().protocol, 17);
        assert!(frame.transport().is_none());
        assert_eq!(frame.payload_preview, None);
    }

    #[test]
    fn test_decode_dns_over_tcp() {
        let query = build_query(7, "example.com");
        let mut payload = (query.len() as u16).to_be_bytes().to_vec();
        payload.extend_from_slice(&query);

        let builder = PacketBuilder::ethernet2(MAC_A, MAC_B)
            .ipv4([10, 0, 0, 1], [10, 0, 0, 53], 64)
            .tcp(4000, 53, 1, 1024)
            .psh()
            .ack(1);
        let mut buf = Vec::new();
        builder.write(&mut buf, &payload).unwrap();
        let frame = decoder().decode(&RawFrame::whole(buf, 0));

        let dns = frame.application().expect("DNS layer");
        assert_eq!(dns.kind, DnsKind::Query);
        assert_eq!(dns.id, 7);
        assert_eq!(dns.names, vec!["example.com".to_string()]);
        let summary = frame.summary();
        assert!(summary.contains("TCP 4000 > 53 [AP]"));
        assert!(summary.contains("DNS query example.com"));
        // 预览包含两字节长度前缀
        let preview = frame.payload_preview.unwrap();
        assert!(preview.starts_with(&format!("{:04x}", query.len())));
    }

    #[test]
    fn test_dns_content_on_other_tcp_port_is_not_probed() {
        let query = build_query(7, "example.com");
        let mut payload = (query.len() as u16).to_be_bytes().to_vec();
        payload.extend_from_slice(&query);

        let builder = PacketBuilder::ethernet2(MAC_A, MAC_B)
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(4000, 8053, 1, 1024)
            .psh()
            .ack(1);
        let mut buf = Vec::new();
        builder.write(&mut buf, &payload).unwrap();
        let frame = decoder().decode(&RawFrame::whole(buf, 0));

        assert!(frame.has_layer(LayerKind::Tcp));
        assert!(frame.application().is_none());
    }

    #[test]
    fn test_decode_vlan_tagged_ethernet() {
        let mut data = Vec::new();
        data.extend_from_slice(&MAC_B);
        data.extend_from_slice(&MAC_A);
        data.extend_from_slice(&[0x81, 0x00, 0x00, 0x07, 0x08, 0x00]);
        data.extend_from_slice(&ipv4_udp(b"ab"));
        let frame = decoder().decode(&RawFrame::whole(data, 0));

        match frame.link().unwrap() {
            DecodedLayer::Ethernet(eth) => {
                assert_eq!(eth.vlan, Some(7));
                assert_eq!(eth.ethertype, 0x0800);
            }
            other => panic!("expected Ethernet, got {:?}", other),
        }
        assert!(frame
            .summary()
            .contains("vlan 7, IPv4 1.1.1.1 > 2.2.2.2, UDP 1 > 2 Len=10"));
    }

    #[test]
    fn test_decode_linux_sll() {
        let mut data = vec![0, 0, 0, 1, 0, 6];
        data.extend_from_slice(&MAC_A);
        data.extend_from_slice(&[0, 0, 0x08, 0x00]);
        data.extend_from_slice(&ipv4_udp(b"ab"));
        let frame = Decoder::new(LinkType::LINUX_SLL, 0).decode(&RawFrame::whole(data, 0));

        assert_eq!(
            frame.link(),
            Some(&DecodedLayer::LinuxSll(LinuxSllLayer {
                packet_type: 0,
                address: MAC_A.to_vec(),
                protocol: 0x0800,
            }))
        );
        assert_eq!(frame.ports(), Some((1, 2)));
        assert!(frame.summary().contains("SLL 02:00:00:00:00:01, IPv4 1.1.1.1 > 2.2.2.2"));
    }
}
