//! Fast engine on `flate2` with the zlib-rs backend

use std::time::Instant;

use flate2::{Compress, Compression, FlushCompress, Status};

use super::{DeflateEngine, EngineStats, MAX_FAST_LEVEL};
use crate::error::{XlsxError, XlsxResult};

/// Raw DEFLATE through zlib-rs, levels 0..=12. zlib stops at 9; levels
/// 10..=12 compress as 9.
pub struct FastEngine {
    level: u8,
    inner: Compress,
    stream_in: u64,
    stats: EngineStats,
}

impl FastEngine {
    pub fn new(level: u8) -> XlsxResult<Self> {
        if level > MAX_FAST_LEVEL {
            return Err(XlsxError::InvalidArgument(format!(
                "fast compression level {} is outside 0..={}",
                level, MAX_FAST_LEVEL
            )));
        }
        Ok(Self {
            level,
            inner: Compress::new(Compression::new(u32::from(level.min(9))), false),
            stream_in: 0,
            stats: EngineStats::default(),
        })
    }
}

impl DeflateEngine for FastEngine {
    fn name(&self) -> &'static str {
        "fast"
    }

    fn level(&self) -> u8 {
        self.level
    }

    fn compress_chunk(&mut self, input: &[u8], out: &mut Vec<u8>, finish: bool) -> XlsxResult<()> {
        let started = Instant::now();
        let flush = if finish {
            FlushCompress::Finish
        } else {
            FlushCompress::None
        };
        let out_before = out.len();
        let mut rest = input;
        loop {
            if out.capacity() - out.len() < 1024 {
                out.reserve((rest.len() / 2).max(8 * 1024));
            }
            let in_before = self.inner.total_in();
            let status = self
                .inner
                .compress_vec(rest, out, flush)
                .map_err(|e| XlsxError::Compression(format!("zlib-rs deflate failed: {}", e)))?;
            let consumed = (self.inner.total_in() - in_before) as usize;
            rest = &rest[consumed..];
            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    if !finish && rest.is_empty() && out.len() < out.capacity() {
                        break;
                    }
                }
            }
        }

        let produced = (out.len() - out_before) as u64;
        self.stream_in += input.len() as u64;
        self.stats.bytes_in += input.len() as u64;
        self.stats.bytes_out += produced;
        self.stats.elapsed += started.elapsed();
        if finish {
            self.stats.calls += 1;
            log::trace!("fast deflate: stream of {} bytes finished", self.stream_in);
            self.reset();
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.stream_in = 0;
    }

    fn stats(&self) -> EngineStats {
        self.stats
    }
}
