//! 抓包会话的流量统计

pub mod stats;

pub use stats::{ProtocolStats, StatsReport, StatsSnapshot, DEFAULT_TOP_N};
