use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::capture::{CaptureConfig, ReadTimeout, SinkTargets, DEFAULT_PAYLOAD_PREVIEW, DEFAULT_SNAPLEN};
use crate::error::Result;

#[derive(Parser, Debug)]
#[command(author, version, about = "从网络接口抓取并解码数据包")]
pub struct Args {
    /// 要监听的网络接口名称
    pub interface: Option<String>,

    /// BPF 过滤表达式（如 "tcp port 80"）
    #[arg(short, long)]
    pub filter: Option<String>,

    /// 将数据包摘要写入文本文件
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 将原始数据包写入 pcap 文件
    #[arg(short = 'w', long)]
    pub pcap: Option<PathBuf>,

    /// 抓取指定数量的数据包后停止（0 为不限）
    #[arg(short = 'c', long)]
    pub count: Option<u64>,

    /// 打印每个数据包的十六进制转储
    #[arg(short, long)]
    pub verbose: bool,

    /// 不开启混杂模式
    #[arg(long)]
    pub no_promiscuous: bool,

    /// 退出时不打印协议统计
    #[arg(long)]
    pub no_stats: bool,

    /// 列出可用接口后退出
    #[arg(short, long)]
    pub list_interfaces: bool,

    /// 抓包长度（字节）
    #[arg(long)]
    pub snaplen: Option<u32>,

    /// 每个数据包预览的负载字节数（0 为不预览）
    #[arg(long)]
    pub payload: Option<usize>,

    /// 读超时秒数（<= 0 表示阻塞直到中断）
    #[arg(short, long, allow_negative_numbers = true)]
    pub timeout: Option<f64>,

    /// 配置文件路径（YAML）
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 日志级别
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// 从 YAML 读取的抓包默认值，所有字段可选
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub interface: Option<String>,
    pub filter: Option<String>,
    pub promiscuous: Option<bool>,
    pub snaplen: Option<u32>,
    pub count: Option<u64>,
    pub timeout: Option<f64>,
    pub payload: Option<usize>,
    pub output: Option<PathBuf>,
    pub pcap: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub statistics: Option<bool>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: FileConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

impl Args {
    /// 加载配置文件（如有），命令行参数优先
    pub fn capture_config(&self) -> Result<CaptureConfig> {
        let file = match &self.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        };
        Ok(self.merge(file))
    }

    fn merge(&self, file: FileConfig) -> CaptureConfig {
        let timeout = self.timeout.or(file.timeout).unwrap_or(0.0);

        CaptureConfig {
            interface: self
                .interface
                .clone()
                .or(file.interface)
                .unwrap_or_default(),
            filter: self.filter.clone().or(file.filter),
            promiscuous: !self.no_promiscuous && file.promiscuous.unwrap_or(true),
            snaplen: self.snaplen.or(file.snaplen).unwrap_or(DEFAULT_SNAPLEN),
            packet_budget: self.count.or(file.count).unwrap_or(0),
            read_timeout: ReadTimeout::from_secs_f64(timeout),
            payload_preview: self
                .payload
                .or(file.payload)
                .unwrap_or(DEFAULT_PAYLOAD_PREVIEW),
            sinks: SinkTargets {
                text: self.output.clone().or(file.output),
                pcap: self.pcap.clone().or(file.pcap),
            },
            verbose: self.verbose || file.verbose.unwrap_or(false),
            statistics: !self.no_stats && file.statistics.unwrap_or(true),
        }
    }
}
