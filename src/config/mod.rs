//! Configuration module for the SkillForge backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Secret used when `SKILLFORGE_SECRET_KEY` is not set. Only fit for development.
pub const DEFAULT_SECRET_KEY: &str = "change-me";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy search index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// HMAC secret for signing access tokens
    pub secret_key: String,
    /// Access token lifetime in minutes
    pub token_expire_minutes: i64,
    /// Origins allowed by CORS; `*` allows any
    pub allowed_origins: Vec<String>,
    /// Root directory for uploaded files, served under `/uploads`
    pub upload_dir: PathBuf,
    /// Public base URL used to build links to uploaded files
    pub base_url: String,
    /// JSearch (RapidAPI) settings
    pub job_feed: JobFeedConfig,
    /// Outbound mail settings
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct JobFeedConfig {
    pub api_key: Option<String>,
    pub api_host: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// SendGrid API key; mail is only logged when absent
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_url: String,
    pub sender: String,
}

/// A configuration value that could not be parsed.
#[derive(Debug)]
pub struct ConfigError {
    pub variable: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.variable, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let db_path = var_or("SKILLFORGE_DB_PATH", "./data/skillforge.sqlite").into();
        let index_path = var_or("SKILLFORGE_INDEX_PATH", "./data/index").into();

        let bind_addr = var_or("SKILLFORGE_BIND_ADDR", "127.0.0.1:8000")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError {
                variable: "SKILLFORGE_BIND_ADDR",
                message: e.to_string(),
            })?;

        let log_level = var_or("SKILLFORGE_LOG_LEVEL", "info");
        let secret_key = var_or("SKILLFORGE_SECRET_KEY", DEFAULT_SECRET_KEY);

        let token_expire_minutes = var_or("SKILLFORGE_TOKEN_EXPIRE_MINUTES", "30")
            .parse::<i64>()
            .ok()
            .filter(|m| *m > 0)
            .ok_or_else(|| ConfigError {
                variable: "SKILLFORGE_TOKEN_EXPIRE_MINUTES",
                message: "expected a positive number of minutes".to_string(),
            })?;

        let allowed_origins = parse_list(&var_or(
            "SKILLFORGE_ALLOWED_ORIGINS",
            "http://localhost:4200,http://localhost:3000",
        ));

        let upload_dir = var_or("SKILLFORGE_UPLOAD_DIR", "./uploads").into();
        let base_url = var_or("SKILLFORGE_BASE_URL", "http://localhost:8000")
            .trim_end_matches('/')
            .to_string();

        let job_feed = JobFeedConfig {
            api_key: non_empty_var("RAPIDAPI_KEY"),
            api_host: var_or("RAPIDAPI_HOST", "jsearch.p.rapidapi.com"),
            api_url: var_or("RAPIDAPI_URL", "https://jsearch.p.rapidapi.com")
                .trim_end_matches('/')
                .to_string(),
        };

        let mail = MailConfig {
            sendgrid_api_key: non_empty_var("SENDGRID_API_KEY"),
            sendgrid_url: var_or("SENDGRID_URL", "https://api.sendgrid.com")
                .trim_end_matches('/')
                .to_string(),
            sender: var_or("SKILLFORGE_MAIL_SENDER", "no-reply@skillforge.local"),
        };

        Ok(Self {
            db_path,
            index_path,
            bind_addr,
            log_level,
            secret_key,
            token_expire_minutes,
            allowed_origins,
            upload_dir,
            base_url,
            job_feed,
            mail,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for name in [
            "SKILLFORGE_DB_PATH",
            "SKILLFORGE_INDEX_PATH",
            "SKILLFORGE_BIND_ADDR",
            "SKILLFORGE_LOG_LEVEL",
            "SKILLFORGE_SECRET_KEY",
            "SKILLFORGE_TOKEN_EXPIRE_MINUTES",
            "SKILLFORGE_ALLOWED_ORIGINS",
            "SKILLFORGE_UPLOAD_DIR",
            "SKILLFORGE_BASE_URL",
            "RAPIDAPI_KEY",
            "RAPIDAPI_HOST",
            "RAPIDAPI_URL",
            "SENDGRID_API_KEY",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/skillforge.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.secret_key, DEFAULT_SECRET_KEY);
        assert_eq!(config.token_expire_minutes, 30);
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:4200", "http://localhost:3000"]
        );
        assert_eq!(config.base_url, "http://localhost:8000");
        assert!(config.job_feed.api_key.is_none());
        assert_eq!(config.job_feed.api_host, "jsearch.p.rapidapi.com");
        assert!(config.mail.sendgrid_api_key.is_none());
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            parse_list(" https://a.example , ,https://b.example,"),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(parse_list("").is_empty());
    }
}
