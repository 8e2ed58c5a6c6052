use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::protocol::{DecodedFrame, LayerKind};

/// 报告中每个排行列出的条目数
pub const DEFAULT_TOP_N: usize = 5;

/// 原始计数，由 `snapshot` 从 `ProtocolStats` 复制出来
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub packets: u64,
    pub bytes: u64,
    pub layers: HashMap<LayerKind, u64>,
    pub source_ips: HashMap<IpAddr, u64>,
    pub destination_ips: HashMap<IpAddr, u64>,
    pub source_ports: HashMap<u16, u64>,
    pub destination_ports: HashMap<u16, u64>,
}

/// 会话流量统计，由一把互斥锁保护
#[derive(Debug)]
pub struct ProtocolStats {
    started: Instant,
    inner: Mutex<StatsSnapshot>,
}

impl Default for ProtocolStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            inner: Mutex::new(StatsSnapshot::default()),
        }
    }

    /// 统计一帧。每个已解码的层计数一次，
    /// `Unknown` 标记不计数
    pub fn record(&self, frame: &DecodedFrame, total_bytes: u64) {
        let mut stats = self.inner.lock();
        stats.packets += 1;
        stats.bytes += total_bytes;

        for kind in frame.layers.iter().filter_map(|layer| layer.kind()) {
            *stats.layers.entry(kind).or_insert(0) += 1;
        }

        if let Some(ip) = frame.network() {
            *stats.source_ips.entry(ip.source).or_insert(0) += 1;
            *stats.destination_ips.entry(ip.destination).or_insert(0) += 1;
        }

        if let Some((source, destination)) = frame.ports() {
            *stats.source_ports.entry(source).or_insert(0) += 1;
            *stats.destination_ports.entry(destination).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn report(&self, top_n: usize) -> StatsReport {
        let stats = self.inner.lock();
        StatsReport {
            duration: self.elapsed(),
            packets: stats.packets,
            bytes: stats.bytes,
            layers: rank(&stats.layers, usize::MAX),
            top_source_ips: rank(&stats.source_ips, top_n),
            top_destination_ips: rank(&stats.destination_ips, top_n),
            top_source_ports: rank(&stats.source_ports, top_n),
            top_destination_ports: rank(&stats.destination_ports, top_n),
        }
    }
}

/// 出现次数最多的 `n` 个键，按次数降序、键升序排列
pub fn rank<K: Ord + Hash + Copy>(counts: &HashMap<K, u64>, n: usize) -> Vec<(K, u64)> {
    let mut entries: Vec<(K, u64)> = counts.iter().map(|(k, v)| (*k, *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}

/// 最终统计结果
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub duration: Duration,
    pub packets: u64,
    pub bytes: u64,
    pub layers: Vec<(LayerKind, u64)>,
    pub top_source_ips: Vec<(IpAddr, u64)>,
    pub top_destination_ips: Vec<(IpAddr, u64)>,
    pub top_source_ports: Vec<(u16, u64)>,
    pub top_destination_ports: Vec<(u16, u64)>,
}

impl StatsReport {
    pub fn layer_count(&self, kind: LayerKind) -> u64 {
        self.layers
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

fn write_ranking<K: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    items: &[(K, u64)],
) -> fmt::Result {
    writeln!(f, "\n{}:", title)?;
    if items.is_empty() {
        writeln!(f, "  (none)")?;
    }
    for (key, count) in items {
        writeln!(f, "  {}: {}", key, count)?;
    }
    Ok(())
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duration = Duration::from_millis(self.duration.as_millis() as u64);
        writeln!(f, "\n==== Capture statistics ====")?;
        writeln!(f, "Duration: {:?}", duration)?;
        writeln!(f, "Packets: {}", self.packets)?;
        writeln!(f, "Bytes: {}", self.bytes)?;
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            writeln!(
                f,
                "Average rate: {:.2} packets/s, {:.2} bytes/s",
                self.packets as f64 / secs,
                self.bytes as f64 / secs
            )?;
        }

        writeln!(f, "\nProtocol distribution:")?;
        for (kind, count) in &self.layers {
            let share = if self.packets > 0 {
                *count as f64 * 100.0 / self.packets as f64
            } else {
                0.0
            };
            writeln!(f, "  {}: {} ({:.1}%)", kind, count, share)?;
        }

        write_ranking(f, "Top source IPs", &self.top_source_ips)?;
        write_ranking(f, "Top destination IPs", &self.top_destination_ips)?;
        write_ranking(f, "Top source ports", &self.top_source_ports)?;
        write_ranking(f, "Top destination ports", &self.top_destination_ports)
    }
}
