//! Static configuration shared across the CLI.

/// Directory name used for session storage under the platform config dir.
pub const SERVICE_NAME: &str = "farewatch";

/// Environment variable that overrides the API base URL.
pub const API_ENV: &str = "FAREWATCH_API";

/// Environment variable that overrides the config directory (used by tests).
pub const CONFIG_OVERRIDE_ENV: &str = "FAREWATCH_CONFIG_DIR";

/// Default API base URL.
pub const DEFAULT_API: &str = "http://localhost:8000";

/// HTTP client timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// User agent reported on every request.
pub const USER_AGENT: &str = "FarewatchCLI/0.1";

/// CLI version string surfaced by `--version`.
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum number of characters before an airport lookup hits the API.
pub const AUTOCOMPLETE_MIN_CHARS: usize = 2;

/// Seconds before access-token expiry at which a refresh is suggested.
pub const SESSION_EXPIRY_BUFFER_SECS: u64 = 60;

/// Resolve the API base URL at call time.
///
/// A function rather than a static so tests can point the CLI at a mock
/// server by setting the environment variable at runtime.
pub fn api_url() -> String {
    std::env::var(API_ENV).unwrap_or_else(|_| DEFAULT_API.to_string())
}
