//! Runtime configuration.
//!
//! Every setting can come from a flag or from the environment; a `.env` file
//! in the working directory is loaded first when present.

use std::net::SocketAddr;

use clap::Parser;
use thiserror::Error;

use strongbox_auth::Hs256TokenService;
use strongbox_observability::LogFormat;

/// Signing secret used when `JWT_SECRET` is not configured.
pub const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("token TTL must be at least one hour (got {0})")]
    InvalidTokenTtl(i64),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "strongbox-api", version, about = "Bank account and transfer API", long_about = None)]
pub struct Settings {
    /// Address the HTTP server listens on
    #[arg(long = "listen", env = "LISTEN_ADDR", default_value = "0.0.0.0:5555")]
    pub listen_addr: SocketAddr,

    /// HMAC secret for signing bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Postgres connection string; accounts are kept in memory when absent
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Lifetime of issued tokens, in hours
    #[arg(long, env = "TOKEN_TTL_HOURS", default_value_t = Hs256TokenService::DEFAULT_TTL_HOURS)]
    pub token_ttl_hours: i64,

    /// Log output: json or pretty
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: LogFormat,

    /// Create one regular and one admin account at startup
    #[arg(long)]
    pub seed: bool,
}

impl Settings {
    /// Parse flags and environment, after loading `.env` if present.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::parse()
    }

    /// Settings for tests and embedding: in-memory store, fixed secret.
    pub fn for_secret(secret: impl Into<String>) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: Some(secret.into()),
            database_url: None,
            token_ttl_hours: Hs256TokenService::DEFAULT_TTL_HOURS,
            log_format: LogFormat::Json,
            seed: false,
        }
    }

    pub fn jwt_secret(&self) -> String {
        match &self.jwt_secret {
            Some(secret) if !secret.is_empty() => secret.clone(),
            _ => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        }
    }

    pub fn token_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        if self.token_ttl_hours < 1 {
            return Err(ConfigError::InvalidTokenTtl(self.token_ttl_hours));
        }
        chrono::Duration::try_hours(self.token_ttl_hours)
            .ok_or(ConfigError::InvalidTokenTtl(self.token_ttl_hours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Settings {
        let mut argv = vec!["strongbox-api"];
        argv.extend_from_slice(args);
        Settings::try_parse_from(argv).unwrap()
    }

    #[test]
    fn explicit_flags_are_honoured() {
        let s = parse(&[
            "--listen",
            "127.0.0.1:9000",
            "--jwt-secret",
            "s3cret",
            "--token-ttl-hours",
            "2",
            "--log-format",
            "pretty",
            "--seed",
        ]);
        assert_eq!(s.listen_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(s.jwt_secret(), "s3cret");
        assert_eq!(s.token_ttl().unwrap(), chrono::Duration::hours(2));
        assert_eq!(s.log_format, LogFormat::Pretty);
        assert!(s.seed);
    }

    #[test]
    fn empty_secret_falls_back_to_dev_default() {
        let mut s = Settings::for_secret("");
        assert_eq!(s.jwt_secret(), DEV_JWT_SECRET);
        s.jwt_secret = None;
        assert_eq!(s.jwt_secret(), DEV_JWT_SECRET);
    }

    #[test]
    fn rejects_non_positive_ttl() {
        let mut s = Settings::for_secret("x");
        s.token_ttl_hours = 0;
        assert_eq!(s.token_ttl(), Err(ConfigError::InvalidTokenTtl(0)));
    }

    #[test]
    fn rejects_bad_listen_address() {
        assert!(Settings::try_parse_from(["strongbox-api", "--listen", "nowhere"]).is_err());
    }
}
