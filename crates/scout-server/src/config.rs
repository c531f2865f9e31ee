use std::path::PathBuf;

use scout_core::AppError;

/// Process-level settings for the server binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Bearer token for admin endpoints. `None` disables them.
    pub admin_token: Option<String>,
    /// JSON site registry; `None` uses the built-in sites.
    pub sites_file: Option<PathBuf>,
    pub allow_private_urls: bool,
}

impl ServerConfig {
    /// Read configuration from environment variables.
    ///
    /// - `SCOUT_SERVER_PORT` (optional, defaults to 3000)
    /// - `SCOUT_ADMIN_TOKEN` (optional; empty counts as unset)
    /// - `SCOUT_SITES_FILE` (optional)
    /// - `SCOUT_ALLOW_PRIVATE_URLS` (optional, `true`/`1` to disable the SSRF guard)
    pub fn from_env() -> Result<Self, AppError> {
        let port = match std::env::var("SCOUT_SERVER_PORT") {
            Err(_) => 3000,
            Ok(raw) => raw.trim().parse().map_err(|_| {
                AppError::ConfigError(format!("Invalid SCOUT_SERVER_PORT '{raw}'"))
            })?,
        };

        let admin_token = std::env::var("SCOUT_ADMIN_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let sites_file = std::env::var("SCOUT_SITES_FILE")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let allow_private_urls = std::env::var("SCOUT_ALLOW_PRIVATE_URLS")
            .map(|raw| parse_flag(&raw))
            .unwrap_or(Ok(false))?;

        Ok(Self {
            port,
            admin_token,
            sites_file,
            allow_private_urls,
        })
    }
}

fn parse_flag(raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "" | "0" | "false" | "no" => Ok(false),
        _ => Err(AppError::ConfigError(format!(
            "Invalid SCOUT_ALLOW_PRIVATE_URLS '{raw}': expected true or false"
        ))),
    }
}
