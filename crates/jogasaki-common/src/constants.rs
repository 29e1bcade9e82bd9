//! System-wide constants for Jogasaki.

// =============================================================================
// Memory
// =============================================================================

/// Default page size of the paged memory resource (2 MB).
pub const DEFAULT_PAGE_SIZE: usize = 2 * 1024 * 1024;

/// Minimum page size accepted by the memory resources (256 bytes).
pub const MIN_PAGE_SIZE: usize = 256;

/// Default page size of the per-statement LIFO arena (64 KB).
pub const DEFAULT_LIFO_PAGE_SIZE: usize = 64 * 1024;

// =============================================================================
// Key and Value Limits
// =============================================================================

/// Maximum encoded key size accepted by `put` (32 KB).
pub const MAX_KEY_SIZE: usize = 32 * 1024;

/// Maximum encoded value size accepted by `put` (2 GB - 1).
pub const MAX_VALUE_SIZE: usize = i32::MAX as usize;

// =============================================================================
// Decimal
// =============================================================================

/// Maximum decimal precision (number of significant digits).
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// Minimum decimal precision.
pub const MIN_DECIMAL_PRECISION: u8 = 1;

// =============================================================================
// Catalog
// =============================================================================

/// Name of the storage that keeps serialized table/index metadata.
pub const SYSTEM_STORAGE_NAME: &str = "__system_tables";

/// Name of the storage that keeps the sequence-id to definition mapping.
pub const SYSTEM_SEQUENCES_NAME: &str = "__system_sequences";

/// Format version written at the head of every primary-index value.
pub const VALUE_FORMAT_VERSION: u8 = 1;

/// Format version of serialized metadata records.
pub const METADATA_FORMAT_VERSION: u8 = 1;
