//! DEFLATE engines.
//!
//! Every engine produces raw DEFLATE (no zlib or gzip framing), which is what
//! ZIP entries carry. The portable engine is always compiled; the fast one
//! only with the `fast-deflate` feature.

mod portable;

#[cfg(feature = "fast-deflate")]
mod fast;

use std::io::Read;
use std::time::Duration;

use brisk_sheets_core::CompressionBackend;
use flate2::read::DeflateDecoder;

use crate::error::{XlsxError, XlsxResult};

pub use portable::PortableEngine;

#[cfg(feature = "fast-deflate")]
pub use fast::FastEngine;

/// Whether the fast engine was compiled in
pub const FAST_AVAILABLE: bool = cfg!(feature = "fast-deflate");

/// Highest level the portable engine accepts
pub const MAX_PORTABLE_LEVEL: u8 = 9;

/// Highest level the fast engine accepts
pub const MAX_FAST_LEVEL: u8 = 12;

/// Inputs above this size go to the fast engine under `Auto`
pub const FAST_THRESHOLD: usize = 64 * 1024;

/// Counters accumulated by an engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Completed compress calls (one per entry)
    pub calls: u64,
    pub elapsed: Duration,
}

impl EngineStats {
    /// Output size as a fraction of input size
    pub fn ratio(&self) -> f64 {
        if self.bytes_in == 0 {
            1.0
        } else {
            self.bytes_out as f64 / self.bytes_in as f64
        }
    }

    pub(crate) fn merge(&mut self, other: &EngineStats) {
        self.bytes_in += other.bytes_in;
        self.bytes_out += other.bytes_out;
        self.calls += other.calls;
        self.elapsed += other.elapsed;
    }
}

/// A reusable raw-DEFLATE compressor.
///
/// An engine holds one stream at a time. `compress_chunk` with
/// `finish = false` may be called any number of times; the call with
/// `finish = true` terminates the stream and resets the engine for the next
/// one.
pub trait DeflateEngine: Send {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Configured level
    fn level(&self) -> u8;

    /// Feed `input`, appending whatever compressed bytes are ready to `out`
    fn compress_chunk(&mut self, input: &[u8], out: &mut Vec<u8>, finish: bool) -> XlsxResult<()>;

    /// Drop any partial stream
    fn reset(&mut self);

    fn stats(&self) -> EngineStats;

    /// Compress all of `input` as one stream; returns the number of bytes
    /// appended to `out`
    fn compress(&mut self, input: &[u8], out: &mut Vec<u8>) -> XlsxResult<usize> {
        let before = out.len();
        out.reserve(max_compressed_bound(input.len()));
        self.compress_chunk(input, out, true)?;
        Ok(out.len() - before)
    }
}

/// Upper bound of the raw DEFLATE size of `n` input bytes
pub fn max_compressed_bound(n: usize) -> usize {
    n + (n >> 12) + (n >> 14) + (n >> 25) + 13
}

fn check_level(backend: CompressionBackend, level: u8) -> XlsxResult<()> {
    let max = match backend {
        CompressionBackend::Portable => MAX_PORTABLE_LEVEL,
        CompressionBackend::Fast | CompressionBackend::Auto => MAX_FAST_LEVEL,
    };
    if level > max {
        return Err(XlsxError::InvalidArgument(format!(
            "compression level {} is outside 0..={} for the {:?} backend",
            level, max, backend
        )));
    }
    if backend == CompressionBackend::Fast && !FAST_AVAILABLE {
        return Err(XlsxError::InvalidArgument(
            "the fast DEFLATE engine was not compiled in (feature `fast-deflate`)".into(),
        ));
    }
    Ok(())
}

/// Which engine `backend` picks for an input of `size_hint` bytes
/// (`None` = unknown, treated as large)
pub fn prefers_fast(backend: CompressionBackend, level: u8, size_hint: Option<usize>) -> bool {
    match backend {
        CompressionBackend::Portable => false,
        CompressionBackend::Fast => FAST_AVAILABLE,
        CompressionBackend::Auto => {
            FAST_AVAILABLE && (size_hint.map_or(true, |n| n > FAST_THRESHOLD) || level <= 3)
        }
    }
}

/// Build one engine for the given backend, level and input size
pub fn select_engine(
    backend: CompressionBackend,
    level: u8,
    size_hint: Option<usize>,
) -> XlsxResult<Box<dyn DeflateEngine>> {
    check_level(backend, level)?;
    if prefers_fast(backend, level, size_hint) {
        #[cfg(feature = "fast-deflate")]
        return Ok(Box::new(FastEngine::new(level)?));
    }
    Ok(Box::new(PortableEngine::new(level.min(MAX_PORTABLE_LEVEL))?))
}

/// The engines an archive writer draws from, created lazily and reused
/// across entries
pub struct Deflater {
    backend: CompressionBackend,
    level: u8,
    portable: Option<PortableEngine>,
    #[cfg(feature = "fast-deflate")]
    fast: Option<FastEngine>,
}

impl Deflater {
    pub fn new(backend: CompressionBackend, level: u8) -> XlsxResult<Self> {
        check_level(backend, level)?;
        Ok(Self {
            backend,
            level,
            portable: None,
            #[cfg(feature = "fast-deflate")]
            fast: None,
        })
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn backend(&self) -> CompressionBackend {
        self.backend
    }

    /// Engine for an entry of `size_hint` bytes
    pub fn engine_for(&mut self, size_hint: Option<usize>) -> XlsxResult<&mut dyn DeflateEngine> {
        #[cfg(feature = "fast-deflate")]
        if prefers_fast(self.backend, self.level, size_hint) {
            if self.fast.is_none() {
                log::debug!("compression: fast engine at level {}", self.level);
                self.fast = Some(FastEngine::new(self.level)?);
            }
            if let Some(engine) = self.fast.as_mut() {
                return Ok(engine);
            }
        }
        #[cfg(not(feature = "fast-deflate"))]
        let _ = size_hint;

        if self.portable.is_none() {
            let level = self.level.min(MAX_PORTABLE_LEVEL);
            log::debug!("compression: portable engine at level {}", level);
            self.portable = Some(PortableEngine::new(level)?);
        }
        match self.portable.as_mut() {
            Some(engine) => Ok(engine),
            None => Err(XlsxError::Core(brisk_sheets_core::Error::internal(
                "portable engine missing after creation",
            ))),
        }
    }

    /// Counters of every engine used so far
    pub fn stats(&self) -> EngineStats {
        let mut total = EngineStats::default();
        if let Some(p) = &self.portable {
            total.merge(&p.stats());
        }
        #[cfg(feature = "fast-deflate")]
        if let Some(f) = &self.fast {
            total.merge(&f.stats());
        }
        total
    }
}

/// Decompress a raw DEFLATE stream. `expected` sizes the output buffer; the
/// caller checks the final length.
pub fn inflate(data: &[u8], expected: usize) -> XlsxResult<Vec<u8>> {
    let mut out = Vec::with_capacity(expected);
    DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| XlsxError::Compression(format!("inflate failed: {}", e)))?;
    Ok(out)
}
