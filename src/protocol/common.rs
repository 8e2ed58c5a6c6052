use std::convert::TryFrom;
use std::fmt;
use std::net::IpAddr;

use pnet::util::MacAddr;

/// 协议层类型，用于摘要和统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    Ethernet,
    Loopback,
    LinuxSll,
    Ipv4,
    Ipv6,
    Tcp,
    Udp,
    Icmp,
    Icmpv6,
    Dns,
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Ethernet => "Ethernet",
            LayerKind::Loopback => "Loopback",
            LayerKind::LinuxSll => "LinuxSLL",
            LayerKind::Ipv4 => "IPv4",
            LayerKind::Ipv6 => "IPv6",
            LayerKind::Tcp => "TCP",
            LayerKind::Udp => "UDP",
            LayerKind::Icmp => "ICMPv4",
            LayerKind::Icmpv6 => "ICMPv6",
            LayerKind::Dns => "DNS",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 根据 IP 协议号 / 下一头部号选择传输层
impl TryFrom<u8> for LayerKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            IP_PROTO_ICMP => Ok(LayerKind::Icmp),
            IP_PROTO_TCP => Ok(LayerKind::Tcp),
            IP_PROTO_UDP => Ok(LayerKind::Udp),
            IP_PROTO_ICMPV6 => Ok(LayerKind::Icmpv6),
            other => Err(other),
        }
    }
}

pub const IP_PROTO_ICMP: u8 = 1;
pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;
pub const IP_PROTO_ICMPV6: u8 = 58;

/// TCP 控制位，取自头部第 13 字节
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TcpFlags(pub u8);

impl TcpFlags {
    pub const FIN: u8 = 0x01;
    pub const SYN: u8 = 0x02;
    pub const RST: u8 = 0x04;
    pub const PSH: u8 = 0x08;
    pub const ACK: u8 = 0x10;
    pub const URG: u8 = 0x20;

    pub fn contains(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    /// 按显示顺序 S A F R P U 输出标志字母
    pub fn letters(&self) -> String {
        [
            (Self::SYN, 'S'),
            (Self::ACK, 'A'),
            (Self::FIN, 'F'),
            (Self::RST, 'R'),
            (Self::PSH, 'P'),
            (Self::URG, 'U'),
        ]
        .iter()
        .filter(|(bit, _)| self.contains(*bit))
        .map(|(_, letter)| *letter)
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EthernetLayer {
    pub source: MacAddr,
    pub destination: MacAddr,
    pub ethertype: u16,
    pub vlan: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopbackLayer {
    /// 4 字节 NULL/LOOP 头中的协议族
    pub family: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinuxSllLayer {
    pub packet_type: u16,
    pub address: Vec<u8>,
    pub protocol: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IpLayer {
    pub source: IpAddr,
    pub destination: IpAddr,
    /// 负载的协议号 / 下一头部号
    pub protocol: u8,
    pub ttl: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TcpLayer {
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub acknowledgement: u32,
    pub window: u16,
    pub flags: TcpFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UdpLayer {
    pub source_port: u16,
    pub destination_port: u16,
    pub length: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IcmpLayer {
    pub icmp_type: u8,
    pub code: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsKind {
    Query,
    Response,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DnsLayer {
    pub kind: DnsKind,
    pub id: u16,
    /// 查询报文为问题中的域名，应答报文为回答中的域名
    pub names: Vec<String>,
}

impl DnsLayer {
    pub fn label(&self) -> &'static str {
        match self.kind {
            DnsKind::Query => "DNS query",
            DnsKind::Response => "DNS response",
        }
    }
}

/// `parent` 之后的一层无法识别
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownLayer {
    pub parent: LayerKind,
    pub protocol: u32,
}

/// 一个已解码的协议层
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedLayer {
    Ethernet(EthernetLayer),
    Loopback(LoopbackLayer),
    LinuxSll(LinuxSllLayer),
    Ipv4(IpLayer),
    Ipv6(IpLayer),
    Tcp(TcpLayer),
    Udp(UdpLayer),
    Icmp(IcmpLayer),
    Icmpv6(IcmpLayer),
    Dns(DnsLayer),
    Unknown(UnknownLayer),
}

impl DecodedLayer {
    /// `Unknown` 标记不算已解码的层，返回 `None`
    pub fn kind(&self) -> Option<LayerKind> {
        match self {
            DecodedLayer::Ethernet(_) => Some(LayerKind::Ethernet),
            DecodedLayer::Loopback(_) => Some(LayerKind::Loopback),
            DecodedLayer::LinuxSll(_) => Some(LayerKind::LinuxSll),
            DecodedLayer::Ipv4(_) => Some(LayerKind::Ipv4),
            DecodedLayer::Ipv6(_) => Some(LayerKind::Ipv6),
            DecodedLayer::Tcp(_) => Some(LayerKind::Tcp),
            DecodedLayer::Udp(_) => Some(LayerKind::Udp),
            DecodedLayer::Icmp(_) => Some(LayerKind::Icmp),
            DecodedLayer::Icmpv6(_) => Some(LayerKind::Icmpv6),
            DecodedLayer::Dns(_) => Some(LayerKind::Dns),
            DecodedLayer::Unknown(_) => None,
        }
    }
}
