//! 实时抓包：配置、libpcap 帧来源，
//! 以及驱动解码、输出和统计的会话

pub mod interface;
pub mod session;
pub mod source;
pub mod stop;

pub use interface::{list_interfaces, InterfaceInfo};
pub use session::{CaptureSession, SessionReport, SessionState, StopReason};
pub use source::{CaptureMeta, FrameEvent, FrameSource, LinkType, PcapSource, RawFrame};
pub use stop::{spawn_interrupt_listener, StopSignal};

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SnifferError};

pub const DEFAULT_SNAPLEN: u32 = 1600;
pub const DEFAULT_PAYLOAD_PREVIEW: usize = 64;

/// 单次读取等待帧的时长
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTimeout {
    /// 一直等到有帧或会话被中断
    Blocking,
    Bounded(Duration),
}

impl ReadTimeout {
    /// 阻塞模式下传给 libpcap 的超时，
    /// 循环按此间隔检查停止信号
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// 0 或负数秒表示阻塞直到中断
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            ReadTimeout::Bounded(Duration::from_secs_f64(secs))
        } else {
            ReadTimeout::Blocking
        }
    }

    pub fn poll_interval(&self) -> Duration {
        match self {
            ReadTimeout::Blocking => Self::POLL_INTERVAL,
            ReadTimeout::Bounded(d) => (*d).max(Duration::from_millis(1)),
        }
    }

    /// libpcap 超时（毫秒）
    pub fn as_pcap_millis(&self) -> i32 {
        self.poll_interval().as_millis().min(i32::MAX as u128) as i32
    }
}

impl Default for ReadTimeout {
    fn default() -> Self {
        ReadTimeout::Blocking
    }
}

/// 可选的文件输出
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SinkTargets {
    pub text: Option<PathBuf>,
    pub pcap: Option<PathBuf>,
}

/// 抓包配置，会话期间不变
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub interface: String,
    /// libpcap 过滤表达式
    pub filter: Option<String>,
    pub promiscuous: bool,
    /// 每帧最多抓取的字节数
    pub snaplen: u32,
    /// 抓到这么多帧后停止，0 表示不限
    pub packet_budget: u64,
    pub read_timeout: ReadTimeout,
    /// 每帧预览的负载字节数，0 表示不预览
    pub payload_preview: usize,
    pub sinks: SinkTargets,
    pub verbose: bool,
    pub statistics: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: String::new(),
            filter: None,
            promiscuous: true,
            snaplen: DEFAULT_SNAPLEN,
            packet_budget: 0,
            read_timeout: ReadTimeout::Blocking,
            payload_preview: DEFAULT_PAYLOAD_PREVIEW,
            sinks: SinkTargets::default(),
            verbose: false,
            statistics: true,
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() {
            return Err(SnifferError::Config(
                "an interface name is required".to_string(),
            ));
        }
        if self.snaplen == 0 {
            return Err(SnifferError::Config(
                "snapshot length must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// 非空的过滤表达式
    pub fn filter_expr(&self) -> Option<&str> {
        self.filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
    }
}
