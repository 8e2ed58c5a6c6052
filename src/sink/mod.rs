//! 输出目标及分发器

pub mod base;
pub mod console;
pub mod pcap_file;
pub mod text;

pub use base::{PacketSink, SinkKind};
pub use console::ConsoleSink;
pub use pcap_file::{PcapFileSink, PcapWriter};
pub use text::TextFileSink;

use log::{debug, warn};

use crate::capture::{CaptureConfig, LinkType, RawFrame};
use crate::error::Result;
use crate::protocol::DecodedFrame;

/// 把每帧分发给所有输出目标。写入失败只记录日志，
/// 不会中断抓包
pub struct SinkMultiplexer {
    sinks: Vec<Box<dyn PacketSink>>,
    write_errors: u64,
    closed: bool,
}

impl SinkMultiplexer {
    pub fn new(sinks: Vec<Box<dyn PacketSink>>) -> Self {
        Self {
            sinks,
            write_errors: 0,
            closed: false,
        }
    }

    /// 依次打开控制台、文本日志和 pcap 文件（如有配置）。
    /// 文件创建失败时关闭已打开的输出
    pub fn open(config: &CaptureConfig, link_type: LinkType) -> Result<Self> {
        let mut mux = Self::new(vec![Box::new(ConsoleSink::stdout(config.verbose))]);

        if let Some(path) = &config.sinks.text {
            match TextFileSink::create(path, config.verbose) {
                Ok(sink) => mux.sinks.push(Box::new(sink)),
                Err(e) => {
                    mux.close();
                    return Err(e);
                }
            }
        }

        if let Some(path) = &config.sinks.pcap {
            match PcapFileSink::create(path, config.snaplen, link_type) {
                Ok(sink) => mux.sinks.push(Box::new(sink)),
                Err(e) => {
                    mux.close();
                    return Err(e);
                }
            }
        }

        Ok(mux)
    }

    pub fn kinds(&self) -> Vec<SinkKind> {
        self.sinks.iter().map(|s| s.kind()).collect()
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    pub fn emit(&mut self, frame: &DecodedFrame, raw: &RawFrame) {
        if self.closed {
            return;
        }
        for sink in self.sinks.iter_mut() {
            if let Err(e) = sink.write_frame(frame, raw) {
                self.write_errors += 1;
                warn!("Failed to write frame to {} sink: {}", sink.kind(), e);
            }
        }
    }

    /// 按打开的逆序刷新并释放每个输出，只执行一次
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for sink in self.sinks.iter_mut().rev() {
            match sink.close() {
                Ok(()) => debug!("Closed {} sink", sink.kind()),
                Err(e) => warn!("Failed to close {} sink: {}", sink.kind(), e),
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for SinkMultiplexer {
    fn drop(&mut self) {
        self.close();
    }
}
