//! Open and save configuration.

/// Maximum inflated size of a single part.
pub const DEFAULT_MAX_PART_BYTES: u64 = 256 * 1024 * 1024;

/// Maximum inflated size of the whole package.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 1024 * 1024 * 1024;

/// Options for opening a package.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Check at open time that every declared worksheet has a data part
    pub verify_worksheet_parts: bool,

    /// Reject any part that inflates beyond this many bytes
    pub max_part_bytes: u64,

    /// Reject packages that inflate beyond this many bytes in total
    pub max_total_bytes: u64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            verify_worksheet_parts: true,
            max_part_bytes: DEFAULT_MAX_PART_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

impl OpenOptions {
    /// Create default open options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether worksheet parts are checked for existence at open.
    ///
    /// When disabled, a missing part only fails the first access to that sheet.
    pub fn with_verify_worksheet_parts(mut self, verify: bool) -> Self {
        self.verify_worksheet_parts = verify;
        self
    }

    /// Set the per-part inflate limit.
    pub fn with_max_part_bytes(mut self, limit: u64) -> Self {
        self.max_part_bytes = limit;
        self
    }

    /// Set the whole-package inflate limit.
    pub fn with_max_total_bytes(mut self, limit: u64) -> Self {
        self.max_total_bytes = limit;
        self
    }
}

/// Compression applied to parts written on save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// Deflate every part (what Excel writes)
    #[default]
    Deflated,
    /// Store parts uncompressed
    Stored,
}

impl Compression {
    pub(crate) fn method(self) -> zip::CompressionMethod {
        match self {
            Compression::Deflated => zip::CompressionMethod::Deflated,
            Compression::Stored => zip::CompressionMethod::Stored,
        }
    }
}

/// Options for saving a package.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// Compression method for every part
    pub compression: Compression,

    /// Compression level (deflate: 0-9); `None` uses the zip default
    pub compression_level: Option<i64>,
}

impl SaveOptions {
    /// Create default save options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression method.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the compression level.
    pub fn with_compression_level(mut self, level: i64) -> Self {
        self.compression_level = Some(level);
        self
    }
}
