//! Workbook and reader options

/// Which DEFLATE engine compresses package parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionBackend {
    /// Fast engine for large parts or low levels when compiled in,
    /// portable engine otherwise
    #[default]
    Auto,
    /// Always the portable engine (levels 0..=9)
    Portable,
    /// Always the fast engine (levels 0..=12); requires the `fast-deflate`
    /// feature of the xlsx crate
    Fast,
}

/// Options carried by a writable workbook
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookOptions {
    /// DEFLATE level (default: 6)
    pub compression_level: u8,
    /// Engine choice (default: auto)
    pub backend: CompressionBackend,
    /// Rows serialized between flushes to the archive when streaming
    /// (default: 1000)
    pub row_buffer_size: usize,
    /// Stream worksheet parts through data-descriptor ZIP entries instead of
    /// buffering each part (default: false)
    pub streaming: bool,
}

impl Default for WorkbookOptions {
    fn default() -> Self {
        Self {
            compression_level: 6,
            backend: CompressionBackend::Auto,
            row_buffer_size: 1000,
            streaming: false,
        }
    }
}

impl WorkbookOptions {
    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_backend(mut self, backend: CompressionBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_row_buffer_size(mut self, rows: usize) -> Self {
        self.row_buffer_size = rows.max(1);
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

/// Options for loading a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Columns to materialize in read-only mode; `None` keeps all
    pub projection: Option<Vec<u16>>,
    /// Stop reading each sheet after this many rows
    pub row_cap: Option<u32>,
    /// Parse worksheet parts on a worker pool (default: true)
    pub parallel_sheets: bool,
    /// Worker count; 0 uses the global pool (default: 0)
    pub parse_threads: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            projection: None,
            row_cap: None,
            parallel_sheets: true,
            parse_threads: 0,
        }
    }
}

impl ReadOptions {
    pub fn with_projection<I: IntoIterator<Item = u16>>(mut self, columns: I) -> Self {
        let mut cols: Vec<u16> = columns.into_iter().collect();
        cols.sort_unstable();
        cols.dedup();
        self.projection = Some(cols);
        self
    }

    pub fn with_row_cap(mut self, rows: u32) -> Self {
        self.row_cap = Some(rows);
        self
    }

    pub fn with_parallel_sheets(mut self, parallel: bool) -> Self {
        self.parallel_sheets = parallel;
        self
    }

    pub fn with_parse_threads(mut self, threads: usize) -> Self {
        self.parse_threads = threads;
        self
    }
}
