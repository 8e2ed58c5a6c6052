use std::fmt;

#[cfg(test)]
use mockall::automock;

use crate::capture::RawFrame;
use crate::error::Result;
use crate::protocol::DecodedFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Console,
    Text,
    Pcap,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Console => "console",
            SinkKind::Text => "text",
            SinkKind::Pcap => "pcap",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 抓包输出目标，只由抓包循环写入
#[cfg_attr(test, automock)]
pub trait PacketSink: Send {
    fn kind(&self) -> SinkKind;

    fn write_frame(&mut self, frame: &DecodedFrame, raw: &RawFrame) -> Result<()>;

    /// 刷新缓冲并释放输出目标
    fn close(&mut self) -> Result<()>;
}
