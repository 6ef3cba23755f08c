//! Domain constants
//!
//! Defaults shared by the dispatcher and the infrastructure adapters.

// Token refresh
/// A refresh whose credentials were issued less than this many seconds ago
/// counts as recent; expired-token failures inside the window are re-sent
/// instead of starting another refresh.
pub const RECENT_REFRESH_WINDOW_SECS: u64 = 15;

// HTTP
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("walletkit/", env!("CARGO_PKG_VERSION"));

// API endpoints
pub const DEFAULT_API_BASE_URL: &str = "https://wallet.paysera.com/rest/v1";
pub const DEFAULT_PUBLIC_BASE_URL: &str = "https://wallet.paysera.com/rest/v1";
pub const DEFAULT_OAUTH_BASE_URL: &str = "https://wallet.paysera.com/oauth/v1";
pub const SERVER_INFORMATION_PATH: &str = "/server";
pub const TOKEN_PATH: &str = "/token";

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";
