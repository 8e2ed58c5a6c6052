use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::debug;

use super::base::{PacketSink, SinkKind};
use crate::capture::RawFrame;
use crate::error::{Result, SnifferError};
use crate::protocol::render::frame_block;
use crate::protocol::DecodedFrame;

/// 文本日志，按到达顺序每帧写一段
pub struct TextFileSink {
    writer: Option<BufWriter<File>>,
    path: PathBuf,
    verbose: bool,
}

impl TextFileSink {
    pub fn create(path: &Path, verbose: bool) -> Result<Self> {
        let file = File::create(path).map_err(|e| {
            SnifferError::Config(format!("cannot create {}: {}", path.display(), e))
        })?;
        debug!("Writing text log to {}", path.display());
        Ok(Self {
            writer: Some(BufWriter::new(file)),
            path: path.to_path_buf(),
            verbose,
        })
    }

    fn sink_error(e: std::io::Error) -> SnifferError {
        SnifferError::Sink {
            sink: SinkKind::Text.as_str(),
            reason: e.to_string(),
        }
    }
}

impl PacketSink for TextFileSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Text
    }

    fn write_frame(&mut self, frame: &DecodedFrame, raw: &RawFrame) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| SnifferError::Sink {
            sink: SinkKind::Text.as_str(),
            reason: "already closed".to_string(),
        })?;
        writer
            .write_all(frame_block(frame, &raw.data, self.verbose).as_bytes())
            .map_err(Self::sink_error)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(Self::sink_error)?;
            debug!("Closed text log {}", self.path.display());
        }
        Ok(())
    }
}
