//! 经典 libpcap 文件格式写入
//!
//! 布局（小端）：24 字节全局头，之后每帧一个 16 字节记录头
//! 加上抓到的原始字节

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use log::debug;

use super::base::{PacketSink, SinkKind};
use crate::capture::{CaptureMeta, LinkType, RawFrame};
use crate::error::{Result, SnifferError};
use crate::protocol::DecodedFrame;

pub const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
pub const PCAP_VERSION_MAJOR: u16 = 2;
pub const PCAP_VERSION_MINOR: u16 = 4;
pub const GLOBAL_HEADER_LEN: usize = 24;
pub const RECORD_HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcapGlobalHeader {
    pub snaplen: u32,
    pub link_type: LinkType,
}

impl PcapGlobalHeader {
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u32_le(PCAP_MAGIC);
        buf.put_u16_le(PCAP_VERSION_MAJOR);
        buf.put_u16_le(PCAP_VERSION_MINOR);
        // thiszone, sigfigs
        buf.put_i32_le(0);
        buf.put_u32_le(0);
        buf.put_u32_le(self.snaplen);
        buf.put_u32_le(self.link_type.0);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcapRecordHeader {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub incl_len: u32,
    pub orig_len: u32,
}

impl PcapRecordHeader {
    pub fn new(meta: &CaptureMeta, captured: usize) -> Self {
        Self {
            ts_sec: meta.ts_sec.clamp(0, u32::MAX as i64) as u32,
            ts_usec: meta.ts_usec,
            incl_len: captured as u32,
            orig_len: meta.len.max(captured as u32),
        }
    }

    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.ts_sec);
        buf.put_u32_le(self.ts_usec);
        buf.put_u32_le(self.incl_len);
        buf.put_u32_le(self.orig_len);
    }
}

/// 向任意 `Write` 写入 pcap 流
pub struct PcapWriter<W: Write> {
    inner: W,
    buf: BytesMut,
}

impl<W: Write> PcapWriter<W> {
    /// 创建时立即写入全局头
    pub fn new(mut inner: W, header: PcapGlobalHeader) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(GLOBAL_HEADER_LEN);
        header.write_to(&mut buf);
        inner.write_all(&buf)?;
        buf.clear();
        Ok(Self { inner, buf })
    }

    /// 按帧的抓包元数据写入一条记录
    pub fn write_frame(&mut self, frame: &RawFrame) -> std::io::Result<()> {
        self.buf.clear();
        PcapRecordHeader::new(&frame.meta, frame.data.len()).write_to(&mut self.buf);
        self.buf.extend_from_slice(&frame.data);
        self.inner.write_all(&self.buf)
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// 磁盘上的 pcap 文件
pub struct PcapFileSink {
    writer: Option<PcapWriter<BufWriter<File>>>,
    path: PathBuf,
}

impl PcapFileSink {
    pub fn create(path: &Path, snaplen: u32, link_type: LinkType) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            SnifferError::Config(format!("cannot create {}: {}", path.display(), e))
        })?;
        let writer = PcapWriter::new(BufWriter::new(file), PcapGlobalHeader { snaplen, link_type })?;
        debug!(
            "Writing pcap to {} (snaplen {}, link type {})",
            path.display(),
            snaplen,
            link_type.0
        );
        Ok(Self {
            writer: Some(writer),
            path: path.to_path_buf(),
        })
    }

    fn sink_error(e: std::io::Error) -> SnifferError {
        SnifferError::Sink {
            sink: SinkKind::Pcap.as_str(),
            reason: e.to_string(),
        }
    }
}

impl PacketSink for PcapFileSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Pcap
    }

    fn write_frame(&mut self, _frame: &DecodedFrame, raw: &RawFrame) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| SnifferError::Sink {
            sink: SinkKind::Pcap.as_str(),
            reason: "already closed".to_string(),
        })?;
        writer.write_frame(raw).map_err(Self::sink_error)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(Self::sink_error)?;
            debug!("Closed pcap file {}", self.path.display());
        }
        Ok(())
    }
}
