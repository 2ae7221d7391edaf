//! System-wide tuning constants. Values come directly from spec.

// --- Liveness monitor (§4.F) ---
pub const STALE_AGENT_THRESHOLD_SECS: u64 = 90;
pub const LIVENESS_SWEEP_INTERVAL_SECS: u64 = 60;

// --- Shell executor (§4.I) ---
pub const SHELL_FAST_TIMEOUT_SECS: u64 = 30;
pub const SHELL_SLOW_TIMEOUT_SECS: u64 = 15 * 60;
pub const SHELL_BACKGROUND_TIMEOUT_SECS: u64 = 24 * 60 * 60;
pub const SHELL_WAIT_DELAY_SECS: u64 = 15;
pub const SHELL_OUTPUT_SPILL_THRESHOLD_BYTES: usize = 50 * 1024;
pub const SHELL_SUMMARY_HEAD_LINES: usize = 2;
pub const SHELL_SUMMARY_TAIL_LINES: usize = 5;
pub const SHELL_SUMMARY_LINE_MAX_CHARS: usize = 200;

// --- File reader tool (§4.J) ---
pub const READ_FILE_DEFAULT_OFFSET: usize = 1;
pub const READ_FILE_DEFAULT_LIMIT: usize = 1000;
pub const READ_FILE_MAX_LIMIT: usize = 10_000;
pub const READ_FILE_BINARY_SNIFF_BYTES: usize = 512;

// --- Language server manager (§4.K) ---
pub const LSP_SHUTDOWN_TIMEOUT_SECS: u64 = 3;

// --- Monitoring (§4.O) ---
pub const METRICS_LOG_INTERVAL_SECS: u64 = 60;
