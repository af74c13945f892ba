//! Portable engine on `miniz_oxide`

use std::time::Instant;

use miniz_oxide::deflate::core::{
    compress, create_comp_flags_from_zip_params, CompressorOxide, TDEFLFlush, TDEFLStatus,
};

use super::{DeflateEngine, EngineStats, MAX_PORTABLE_LEVEL};
use crate::error::{XlsxError, XlsxResult};

const CHUNK: usize = 32 * 1024;

/// Raw DEFLATE through `miniz_oxide`'s core compressor, levels 0..=9.
/// Level 0 emits stored blocks.
pub struct PortableEngine {
    level: u8,
    inner: Box<CompressorOxide>,
    scratch: Vec<u8>,
    stream_in: u64,
    stats: EngineStats,
}

impl PortableEngine {
    pub fn new(level: u8) -> XlsxResult<Self> {
        if level > MAX_PORTABLE_LEVEL {
            return Err(XlsxError::InvalidArgument(format!(
                "portable compression level {} is outside 0..={}",
                level, MAX_PORTABLE_LEVEL
            )));
        }
        // Negative window bits: raw stream without zlib header
        let flags = create_comp_flags_from_zip_params(i32::from(level), -15, 0);
        Ok(Self {
            level,
            inner: Box::new(CompressorOxide::new(flags)),
            scratch: vec![0; CHUNK],
            stream_in: 0,
            stats: EngineStats::default(),
        })
    }
}

impl DeflateEngine for PortableEngine {
    fn name(&self) -> &'static str {
        "portable"
    }

    fn level(&self) -> u8 {
        self.level
    }

    fn compress_chunk(&mut self, input: &[u8], out: &mut Vec<u8>, finish: bool) -> XlsxResult<()> {
        let started = Instant::now();
        let flush = if finish {
            TDEFLFlush::Finish
        } else {
            TDEFLFlush::None
        };
        let mut pos = 0usize;
        let mut produced = 0u64;
        loop {
            let (status, consumed, written) =
                compress(&mut self.inner, &input[pos..], &mut self.scratch, flush);
            pos += consumed;
            produced += written as u64;
            out.extend_from_slice(&self.scratch[..written]);
            match status {
                TDEFLStatus::Done => break,
                TDEFLStatus::Okay => {
                    // Not finishing: stop once the input is taken and the
                    // scratch buffer was not filled
                    if !finish && pos >= input.len() && written < self.scratch.len() {
                        break;
                    }
                }
                TDEFLStatus::BadParam | TDEFLStatus::PutBufFailed => {
                    self.reset();
                    return Err(XlsxError::Compression(format!(
                        "miniz_oxide deflate failed with {:?}",
                        status
                    )));
                }
            }
        }

        self.stream_in += input.len() as u64;
        self.stats.bytes_in += input.len() as u64;
        self.stats.bytes_out += produced;
        self.stats.elapsed += started.elapsed();
        if finish {
            self.stats.calls += 1;
            log::trace!(
                "portable deflate: stream of {} bytes finished",
                self.stream_in
            );
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
