//! Shared configuration constants for hexcrawl
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Upper bound for the default worker pool size
///
/// The default pool is `min(12, max(1, cpus))`. Provider calls are network
/// bound, so more workers than this mostly sit waiting on throttles.
pub const DEFAULT_WORKER_POOL_CAP: usize = 12;

/// Default event bus capacity: 1000 buffered events
pub const DEFAULT_EVENT_BUS_CAPACITY: usize = 1000;

/// Pending client commands before `send` waits
pub const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Decimal digits kept when keying mesh edges
///
/// Neighbouring hexes compute shared vertices from different centers, so
/// their coordinates differ in the last few bits. Six digits (~0.1m) is
/// enough to make shared edges collide without merging distinct vertices.
pub const EDGE_KEY_PRECISION: u32 = 6;

/// Target hex count when the cell size is auto-derived (cell size 0)
pub const AUTO_CELL_TARGET_COUNT: usize = 100;

/// Smallest cell radius (km) the auto-sizer will produce
pub const MIN_AUTO_CELL_SIZE_KM: f64 = 0.05;

/// Provider page count above which an active window is bisected
pub const DEFAULT_SPLIT_PAGE_THRESHOLD: u32 = 4;

/// Items requested per provider page
pub const DEFAULT_PER_PAGE: u32 = 250;

/// Burst guard: a single-author full page spanning less than this many
/// seconds is treated as a bulk upload
pub const BURST_WINDOW_SECS: i64 = 60 * 60;

/// Burst guard: spans shorter than this use the short skip
pub const BURST_SHORT_SPAN_SECS: i64 = 5;

/// Burst guard: skip applied to very dense bursts (0.1 hours)
pub const BURST_SHORT_SKIP_SECS: i64 = 360;

/// Burst guard: skip applied to ordinary bursts (12 hours)
pub const BURST_LONG_SKIP_SECS: i64 = 12 * 60 * 60;

/// Default provider retry attempts (including the first call)
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 4;

/// Base backoff delay between provider retries
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Backoff ceiling between provider retries
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

/// Default per-provider throttle: concurrent calls
pub const DEFAULT_THROTTLE_MAX_CONCURRENT: usize = 2;

/// Default per-provider throttle: minimum spacing between call starts
pub const DEFAULT_THROTTLE_MIN_SPACING_MS: u64 = 500;

/// Default HTTP timeout for provider requests
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 25;

/// User agent sent by the bundled HTTP providers
pub const HEXCRAWL_USER_AGENT: &str = concat!("kodegen-hexcrawl/", env!("CARGO_PKG_VERSION"));

/// Upper bound on hexes a single mesh build may produce
pub const MAX_MESH_CELLS: usize = 20_000;

/// Places text search: rough number of places one query can surface per hex
/// (three pages of twenty)
pub const PLACES_EXPECTED_PER_HEX: u64 = 60;

/// Places text search: wait before a `next_page_token` becomes valid
pub const PLACES_PAGE_TOKEN_DELAY_MS: u64 = 2200;

/// Places text search: hard page limit per query
pub const PLACES_MAX_PAGES: u32 = 3;

/// Places text search: largest accepted search radius in meters
pub const PLACES_MAX_RADIUS_M: u32 = 50_000;
