use std::io::{self, Stdout, Write};

use super::base::{PacketSink, SinkKind};
use crate::capture::RawFrame;
use crate::error::{Result, SnifferError};
use crate::protocol::render::frame_block;
use crate::protocol::DecodedFrame;

/// 控制台输出，每个会话都有
pub struct ConsoleSink<W: Write + Send = Stdout> {
    out: W,
    verbose: bool,
}

impl ConsoleSink<Stdout> {
    pub fn stdout(verbose: bool) -> Self {
        Self::new(io::stdout(), verbose)
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self { out, verbose }
    }
}

impl<W: Write + Send> PacketSink for ConsoleSink<W> {
    fn kind(&self) -> SinkKind {
        SinkKind::Console
    }

    fn write_frame(&mut self, frame: &DecodedFrame, raw: &RawFrame) -> Result<()> {
        let block = frame_block(frame, &raw.data, self.verbose);
        self.out
            .write_all(block.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|e| SnifferError::Sink {
                sink: SinkKind::Console.as_str(),
                reason: e.to_string(),
            })
    }

    fn close(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
