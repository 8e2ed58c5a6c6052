use std::fmt;

use log::{debug, error, info};

use super::source::{FrameEvent, FrameSource, PcapSource, RawFrame};
use super::stop::StopSignal;
use super::CaptureConfig;
use crate::error::{Result, SnifferError};
use crate::monitor::{ProtocolStats, StatsReport, DEFAULT_TOP_N};
use crate::protocol::Decoder;
use crate::sink::SinkMultiplexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opened,
    Capturing,
    Stopping,
    Closed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Opened => "opened",
            SessionState::Capturing => "capturing",
            SessionState::Stopping => "stopping",
            SessionState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 外部请求停止，通常是 Ctrl+C
    Interrupted,
    BudgetReached,
    /// 设备不再提供帧
    StreamEnded,
    ReadError,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Interrupted => "interrupted",
            StopReason::BudgetReached => "packet count reached",
            StopReason::StreamEnded => "capture stream ended",
            StopReason::ReadError => "read error",
        };
        f.write_str(text)
    }
}

/// 会话结束后的结果
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub frames: u64,
    pub stop_reason: StopReason,
    pub sink_errors: u64,
    pub stats: Option<StatsReport>,
}

/// 一次抓包的会话，持有帧来源和输出目标。
///
/// `open` 即进入 Opened 状态，`run` 之后为 Closed。无论 `run` 正常结束
/// 还是提前 drop，句柄都只释放一次，先输出后来源。
pub struct CaptureSession<S: FrameSource = PcapSource> {
    config: CaptureConfig,
    state: SessionState,
    source: S,
    sinks: SinkMultiplexer,
    decoder: Decoder,
    stats: Option<ProtocolStats>,
    frames: u64,
}

impl CaptureSession<PcapSource> {
    /// 打开接口、安装过滤器并创建文件输出
    pub fn open(config: CaptureConfig) -> Result<Self> {
        config.validate()?;
        let source = PcapSource::open(&config)?;
        // 出错时 `source` 在此处 drop，句柄随之关闭
        let sinks = SinkMultiplexer::open(&config, source.link_type())?;
        Ok(Self::from_parts(config, source, sinks))
    }
}

impl<S: FrameSource> CaptureSession<S> {
    /// 用已获取的来源和输出构造一个 Opened 状态的会话
    pub fn from_parts(config: CaptureConfig, source: S, sinks: SinkMultiplexer) -> Self {
        let decoder = Decoder::new(source.link_type(), config.payload_preview);
        let stats = if config.statistics {
            Some(ProtocolStats::new())
        } else {
            None
        };
        debug!("Session opened on {}", config.interface);

        Self {
            config,
            state: SessionState::Opened,
            source,
            sinks,
            decoder,
            stats,
            frames: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// 在 tokio 的阻塞线程池中运行会话。
    /// 抓包线程 panic 时返回 `SnifferError::Join`
    pub async fn run_blocking(mut self, stop: StopSignal) -> Result<SessionReport>
    where
        S: 'static,
    {
        tokio::task::spawn_blocking(move || self.run(&stop)).await?
    }

    /// 抓包直到计数耗尽、流结束或收到停止请求，
    /// 然后关闭所有句柄。只能运行一次
    pub fn run(&mut self, stop: &StopSignal) -> Result<SessionReport> {
        if self.state != SessionState::Opened {
            return Err(SnifferError::InvalidState {
                expected: SessionState::Opened.name(),
                actual: self.state.name(),
            });
        }

        self.state = SessionState::Capturing;
        info!(
            "Capturing on {}, filter: {}",
            self.config.interface,
            self.config.filter_expr().unwrap_or("(none)")
        );

        let stop_reason = self.capture_loop(stop);
        self.state = SessionState::Stopping;
        info!("Stopping capture after {} frames: {}", self.frames, stop_reason);

        self.release();

        Ok(SessionReport {
            frames: self.frames,
            stop_reason,
            sink_errors: self.sinks.write_errors(),
            stats: self.stats.as_ref().map(|s| s.report(DEFAULT_TOP_N)),
        })
    }

    fn capture_loop(&mut self, stop: &StopSignal) -> StopReason {
        loop {
            if stop.is_requested() {
                return StopReason::Interrupted;
            }

            match self.source.next_frame() {
                Ok(FrameEvent::Frame(raw)) => {
                    self.process(&raw);
                    let budget = self.config.packet_budget;
                    if budget > 0 && self.frames >= budget {
                        return StopReason::BudgetReached;
                    }
                }
                Ok(FrameEvent::Timeout) => continue,
                Ok(FrameEvent::Closed) => return StopReason::StreamEnded,
                Err(e) => {
                    error!("Packet capture error: {}", e);
                    return StopReason::ReadError;
                }
            }
        }
    }

    fn process(&mut self, raw: &RawFrame) {
        let frame = self.decoder.decode(raw);
        self.sinks.emit(&frame, raw);
        if let Some(stats) = &self.stats {
            stats.record(&frame, frame.length() as u64);
        }
        self.frames += 1;
    }

    fn release(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.sinks.close();
        self.source.close();
        self.state = SessionState::Closed;
        debug!("Session closed");
    }
}

impl<S: FrameSource> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.release();
    }
}
