use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use tokio::task::JoinHandle;

/// 抓包循环与中断监听共享的停止请求，
/// 只生效一次，可重复调用
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// 只有第一次请求返回 `true`
    pub fn request(&self) -> bool {
        !self.requested.swap(true, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// 等待 Ctrl+C（unix 上还有 SIGTERM），每次收到都转为停止请求。
/// 一直运行到被 abort
pub fn spawn_interrupt_listener(stop: StopSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = wait_for_interrupt().await {
                warn!("Cannot listen for interrupt signals: {}", e);
                return;
            }
            if stop.request() {
                info!("Interrupt received, stopping capture...");
            } else {
                info!("Capture is already stopping");
            }
        }
    })
}

#[cfg(unix)]
async fn wait_for_interrupt() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
