//! Centralized default constants for lunara.
//!
//! **This module is the single source of truth** for shared default values.
//! Several of these are part of the published wire format and must not change
//! without a new envelope version.

// =============================================================================
// ENVELOPE FORMAT
// =============================================================================

/// Envelope version tag written by this build.
pub const ENVELOPE_VERSION: &str = "v1";

/// Random salt length for self-scheme envelopes, in bytes.
pub const SALT_LENGTH: usize = 16;

/// AES-GCM nonce length, in bytes (96-bit).
pub const NONCE_LENGTH: usize = 12;

/// AES-GCM authentication tag length, in bytes (128-bit).
pub const TAG_LENGTH: usize = 16;

/// Derived symmetric key length, in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

// =============================================================================
// KEY DERIVATION
// =============================================================================

/// PBKDF2-SHA256 iteration count. Previously written envelopes were derived
/// with exactly this count.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Lowest iteration count accepted by configuration validation.
pub const KDF_MIN_ITERATIONS: u32 = 100_000;

/// Protocol-constant salt for recipient-keyed envelopes.
pub const RECIPIENT_SALT: &str = "privycycle-sharing-v1";

/// Prefix of the message the wallet signs to unlock the self key.
pub const SIGNING_MESSAGE_PREFIX: &str = "PrivyCycle";

// =============================================================================
// CONTENT-ADDRESSED STORAGE
// =============================================================================

/// Default public gateway host.
pub const GATEWAY_HOST: &str = "gateway.pinata.cloud";

/// Default pinning API base URL.
pub const PINNING_API_URL: &str = "https://api.pinata.cloud";

/// Default application origin used in shareable links.
pub const APP_BASE_URL: &str = "http://localhost:5173";

/// Path segment that introduces a shareable link.
pub const SHARE_LINK_SEGMENT: &str = "shared";

/// Prefix for published package names.
pub const PACKAGE_NAME_PREFIX: &str = "cycle-share";

/// Default HTTP timeout for gateway and pinning requests in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// RETRY
// =============================================================================

/// Attempts for wallet signature requests (transient failures only).
pub const WALLET_MAX_ATTEMPTS: u32 = 3;

/// Linear backoff step between wallet signature attempts in milliseconds.
pub const WALLET_BACKOFF_MS: u64 = 500;

/// Attempts for publish/fetch/registry calls.
pub const NETWORK_MAX_ATTEMPTS: u32 = 4;

/// Base delay for exponential network backoff in milliseconds.
pub const NETWORK_BACKOFF_MS: u64 = 250;

/// Ceiling on a single backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 10_000;

// =============================================================================
// RECORDS
// =============================================================================

/// Lowest valid energy level.
pub const ENERGY_LEVEL_MIN: u8 = 1;

/// Highest valid energy level.
pub const ENERGY_LEVEL_MAX: u8 = 5;

/// Key of the key-material canary in the meta store.
pub const CANARY_KEY: &str = "key-canary";

/// Plaintext sealed in the canary.
pub const CANARY_PLAINTEXT: &str = "lunara-canary-v1";
