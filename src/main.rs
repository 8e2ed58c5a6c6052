use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info, warn};
use pktsniff::capture::{list_interfaces, spawn_interrupt_listener};
use pktsniff::cli::Args;
use pktsniff::{CaptureConfig, CaptureSession, StopSignal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志
    env_logger::Builder::new()
        .filter_level(args.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    if args.list_interfaces {
        return print_interfaces();
    }

    let config = args.capture_config()?;
    if config.interface.is_empty() {
        bail!("no interface given; use -l to list available interfaces");
    }

    print_banner(&config);

    let session = match CaptureSession::open(config.clone()) {
        Ok(session) => session,
        Err(e) => {
            if e.is_resource() {
                error!("Cannot acquire capture resources: {}", e);
            }
            return Err(e).with_context(|| format!("cannot start capture on {}", config.interface));
        }
    };

    let stop = StopSignal::new();
    let listener = spawn_interrupt_listener(stop.clone());

    // 抓包循环在阻塞线程中运行，直到计数耗尽、流结束或收到中断
    let report = session.run_blocking(stop).await?;
    listener.abort();

    println!("\nCaptured {} packets ({})", report.frames, report.stop_reason);
    if report.sink_errors > 0 {
        warn!("{} sink writes failed", report.sink_errors);
    }
    if let Some(stats) = &report.stats {
        println!("{}", stats);
    }
    if let Some(path) = &config.sinks.text {
        println!("Text output saved to {}", path.display());
    }
    if let Some(path) = &config.sinks.pcap {
        println!("Packets saved to {}", path.display());
    }

    info!("Capture finished");
    Ok(())
}

fn print_interfaces() -> anyhow::Result<()> {
    let interfaces = list_interfaces().context("cannot enumerate interfaces")?;
    println!("Available network interfaces:");
    for (i, interface) in interfaces.iter().enumerate() {
        println!("{}. {}", i + 1, interface);
    }
    Ok(())
}

fn print_banner(config: &CaptureConfig) {
    println!("Starting packet capture on interface: {}", config.interface);
    if let Some(filter) = config.filter_expr() {
        println!("Using filter: {}", filter);
    }
    if config.packet_budget > 0 {
        println!("Capturing {} packets", config.packet_budget);
    }
    println!("Press Ctrl+C to stop...\n");
}
