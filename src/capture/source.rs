use bytes::Bytes;
use log::{debug, info};
use pcap::{Active, Capture};

use super::interface::find_device;
use super::CaptureConfig;
use crate::error::{Result, SnifferError};

/// 抓包句柄的数据链路类型（DLT）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkType(pub u32);

impl LinkType {
    pub const NULL: LinkType = LinkType(0);
    pub const ETHERNET: LinkType = LinkType(1);
    pub const RAW: LinkType = LinkType(101);
    pub const LOOP: LinkType = LinkType(108);
    pub const LINUX_SLL: LinkType = LinkType(113);
    /// 部分 BSD 上 DLT_RAW 的编号
    pub const RAW_BSD: LinkType = LinkType(12);
    pub const RAW_OPENBSD: LinkType = LinkType(14);
}

/// libpcap 记录的单帧元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureMeta {
    pub ts_sec: i64,
    pub ts_usec: u32,
    /// 实际抓到的字节数
    pub caplen: u32,
    /// 帧在链路上的长度
    pub len: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub data: Bytes,
    pub meta: CaptureMeta,
}

impl RawFrame {
    pub fn new(data: impl Into<Bytes>, meta: CaptureMeta) -> Self {
        Self {
            data: data.into(),
            meta,
        }
    }

    /// 完整抓取、时间戳为 `ts_sec` 的帧
    pub fn whole(data: impl Into<Bytes>, ts_sec: i64) -> Self {
        let data = data.into();
        let len = data.len() as u32;
        Self::new(
            data,
            CaptureMeta {
                ts_sec,
                ts_usec: 0,
                caplen: len,
                len,
            },
        )
    }

    fn from_packet(packet: &pcap::Packet<'_>) -> Self {
        Self {
            data: Bytes::copy_from_slice(packet.data),
            meta: CaptureMeta {
                ts_sec: packet.header.ts.tv_sec as i64,
                ts_usec: packet.header.ts.tv_usec as u32,
                caplen: packet.header.caplen,
                len: packet.header.len,
            },
        }
    }
}

/// 一次有超时的读取结果
#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    Frame(RawFrame),
    /// 一个读超时周期内没有收到帧
    Timeout,
    /// 设备已关闭，不会再有帧
    Closed,
}

/// 惰性的、可能无限的帧序列
pub trait FrameSource: Send {
    fn link_type(&self) -> LinkType;

    /// 最多等待一个读超时周期
    fn next_frame(&mut self) -> Result<FrameEvent>;

    /// 释放底层句柄，可重复调用
    fn close(&mut self);
}

/// 基于 libpcap 实时句柄的帧来源
pub struct PcapSource {
    cap: Option<Capture<Active>>,
    link_type: LinkType,
    interface_name: String,
}

impl PcapSource {
    /// 打开接口并安装过滤器，出错时不留下任何打开的句柄
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        let device = find_device(&config.interface)?
            .ok_or_else(|| SnifferError::InterfaceNotFound(config.interface.clone()))?;

        let mut cap = Capture::from_device(device)?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen.min(i32::MAX as u32) as i32)
            .timeout(config.read_timeout.as_pcap_millis())
            .open()?;

        if let Some(filter) = config.filter_expr() {
            cap.filter(filter, true)
                .map_err(|e| SnifferError::FilterInvalid {
                    filter: filter.to_string(),
                    reason: e.to_string(),
                })?;
            debug!("Installed capture filter: {}", filter);
        }

        let link_type = LinkType(cap.get_datalink().0 as u32);
        info!(
            "Opened {} (link type {}, snaplen {}, promiscuous {})",
            config.interface, link_type.0, config.snaplen, config.promiscuous
        );

        Ok(Self {
            cap: Some(cap),
            link_type,
            interface_name: config.interface.clone(),
        })
    }

    pub fn interface_name(&self) -> &str {
        &self.interface_name
    }
}

impl FrameSource for PcapSource {
    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn next_frame(&mut self) -> Result<FrameEvent> {
        let cap = match self.cap.as_mut() {
            Some(cap) => cap,
            None => return Ok(FrameEvent::Closed),
        };

        match cap.next_packet() {
            Ok(packet) => Ok(FrameEvent::Frame(RawFrame::from_packet(&packet))),
            Err(pcap::Error::TimeoutExpired) => Ok(FrameEvent::Timeout),
            Err(pcap::Error::NoMorePackets) => Ok(FrameEvent::Closed),
            Err(e) => Err(SnifferError::Capture(e.to_string())),
        }
    }

    fn close(&mut self) {
        if let Some(mut cap) = self.cap.take() {
            if let Ok(stats) = cap.stats() {
                info!(
                    "{}: {} received, {} dropped, {} dropped by interface",
                    self.interface_name, stats.received, stats.dropped, stats.if_dropped
                );
            }
            debug!("Closed capture handle on {}", self.interface_name);
        }
    }
}

impl Drop for PcapSource {
    fn drop(&mut self) {
        self.close();
    }
}
