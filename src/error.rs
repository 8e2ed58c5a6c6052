use std::io;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum SnifferError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Invalid filter '{filter}': {reason}")]
    FilterInvalid {
        filter: String,
        reason: String,
    },

    #[error("Packet capture error: {0}")]
    Capture(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error {0}")]
    Io(io::ErrorKind),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Sink '{sink}' failed: {reason}")]
    Sink {
        sink: &'static str,
        reason: String,
    },

    #[error("Invalid session state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("JoinError: {0}")]
    Join(JoinError),
}

impl SnifferError {
    /// 在抓到任何帧之前就终止会话的错误
    pub fn is_resource(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::InterfaceNotFound(_)
                | Self::FilterInvalid { .. }
                | Self::Capture(_)
                | Self::Config(_)
                | Self::Io(_)
        )
    }
}

impl From<pcap::Error> for SnifferError {
    fn from(err: pcap::Error) -> Self {
        match err {
            pcap::Error::IoError(kind) => Self::Io(kind),
            pcap::Error::PcapError(msg) => classify_pcap_message(msg),
            _ => Self::Capture(err.to_string()),
        }
    }
}

/// libpcap 的打开错误只有文本描述，按内容归类
fn classify_pcap_message(msg: String) -> SnifferError {
    let lower = msg.to_lowercase();
    if lower.contains("permission") || lower.contains("operation not permitted") {
        SnifferError::PermissionDenied(msg)
    } else if lower.contains("no such device") || lower.contains("doesn't exist") {
        SnifferError::InterfaceNotFound(msg)
    } else {
        SnifferError::Capture(msg)
    }
}

impl From<io::Error> for SnifferError {
    fn from(err: io::Error) -> Self {
        SnifferError::Io(err.kind())
    }
}

impl From<JoinError> for SnifferError {
    fn from(err: JoinError) -> Self {
        SnifferError::Join(err)
    }
}

impl From<serde_yaml::Error> for SnifferError {
    fn from(err: serde_yaml::Error) -> Self {
        SnifferError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SnifferError>;
