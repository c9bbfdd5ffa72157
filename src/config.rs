use std::net::IpAddr;

use ipnet::IpNet;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub timestamp_key: Option<String>,
    pub host: IpAddr,
    pub port: u16,
    pub max_body_size: usize,
    pub trusted_proxies: Vec<IpNet>,
    pub log_level: String,
    pub failure_backoff: Option<u64>,
    pub failure_window_secs: u64,
    pub flagged_fields: Vec<(String, u64)>,
    pub page_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let jwt_secret = env_required("HONEYPOT_JWT_SECRET")?;
        let database_url = env_optional("DATABASE_URL");
        let timestamp_key = env_optional("HONEYPOT_TIMESTAMP_KEY");

        let host: IpAddr = env_or("HONEYPOT_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid HONEYPOT_HOST: {e}"))?;

        let port: u16 = env_or("HONEYPOT_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid HONEYPOT_PORT: {e}"))?;

        let max_body_size: usize = env_or("HONEYPOT_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid HONEYPOT_MAX_BODY_SIZE: {e}"))?;

        let trusted_proxies: Vec<IpNet> = env_or("HONEYPOT_TRUSTED_PROXIES", "")
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim()
                    .parse()
                    .map_err(|e| format!("Invalid HONEYPOT_TRUSTED_PROXIES entry '{s}': {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let log_level = env_or("HONEYPOT_LOG_LEVEL", "info");

        let failure_backoff = env_optional("HONEYPOT_FAILURE_BACKOFF")
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|e| format!("Invalid HONEYPOT_FAILURE_BACKOFF: {e}"))
            })
            .transpose()?;

        let failure_window_secs: u64 = env_or("HONEYPOT_FAILURE_WINDOW_SECS", "86400")
            .parse()
            .map_err(|e| format!("Invalid HONEYPOT_FAILURE_WINDOW_SECS: {e}"))?;

        let flagged_fields = parse_flagged_fields(&env_or("HONEYPOT_FLAGGED_FIELDS", ""))?;

        let page_cache_ttl_secs: u64 = env_or("HONEYPOT_PAGE_CACHE_TTL_SECS", "300")
            .parse()
            .map_err(|e| format!("Invalid HONEYPOT_PAGE_CACHE_TTL_SECS: {e}"))?;

        Ok(Config {
            database_url,
            jwt_secret,
            timestamp_key,
            host,
            port,
            max_body_size,
            trusted_proxies,
            log_level,
            failure_backoff,
            failure_window_secs,
            flagged_fields,
            page_cache_ttl_secs,
        })
    }
}

/// Parse `field=seconds` pairs separated by commas.
pub fn parse_flagged_fields(raw: &str) -> Result<Vec<(String, u64)>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| -> Result<(String, u64), String> {
            let (field, secs) = pair
                .split_once('=')
                .ok_or_else(|| format!("Invalid HONEYPOT_FLAGGED_FIELDS entry '{pair}'"))?;
            let secs = secs
                .trim()
                .parse()
                .map_err(|e| format!("Invalid HONEYPOT_FLAGGED_FIELDS entry '{pair}': {e}"))?;
            Ok((field.trim().to_string(), secs))
        })
        .collect()
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
