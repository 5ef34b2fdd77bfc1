//! Structured logging schema and field name constants for lunara.
//!
//! All crates use these constants for consistent structured logging fields.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Operation aborted, caller receives an error |
//! | WARN  | Entry skipped or flagged, retry scheduled |
//! | INFO  | Share, publish and register completions |
//! | DEBUG | Decision points, cache hits, config choices |
//! | TRACE | Per-entry iteration |
//!
//! Key material, signatures and plaintext are never logged.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "crypto", "store", "share", "publish", "registry", "resolve"
pub const SUBSYSTEM: &str = "subsystem";

/// Logical operation name.
/// Examples: "put", "get_all", "share_data", "open"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Record identifier in the local store.
pub const RECORD_ID: &str = "record_id";

/// Sequential entry id inside a share package.
pub const ENTRY_ID: &str = "entry_id";

/// Content identifier in content-addressed storage.
pub const CONTENT_ID: &str = "content_id";

/// Share relationship ("partner", "family", "doctor").
pub const SHARE_TYPE: &str = "share_type";

/// Logical local store name.
pub const STORE: &str = "store";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Retry attempt number (1-based).
pub const ATTEMPT: &str = "attempt";

/// Number of entries that succeeded in a batch.
pub const SUCCEEDED: &str = "succeeded";

/// Number of entries that failed in a batch.
pub const FAILED: &str = "failed";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter`. Set `LUNARA_LOG_FORMAT=json` for
/// JSON lines. Returns false if a subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json = std::env::var("LUNARA_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    }
}
