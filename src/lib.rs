//! 实时抓包与协议解码引擎
//!
//! 从网络接口读取帧，逐层解码，输出到控制台、文本日志和 pcap 文件，并统计流量。

pub mod capture;
pub mod cli;
pub mod error;
pub mod monitor;
pub mod protocol;
pub mod sink;

pub use capture::{CaptureConfig, CaptureSession, SessionReport, StopReason, StopSignal};
pub use error::{Result, SnifferError};
