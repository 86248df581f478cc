use std::{env, path::PathBuf};

use bytesize::ByteSize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be a positive number, got {1:?}")]
    NotANumber(&'static str, String),
    #[error("{0} must be a size such as \"10MiB\", got {1:?}")]
    NotASize(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub max_upload: ByteSize,
    /// Session lifetime in seconds.
    pub session_ttl: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(x) => x.parse().map_err(|_| ConfigError::NotANumber("PORT", x))?,
            None => 8080,
        };

        let max_upload = match lookup("MAX_UPLOAD") {
            Some(x) => x.parse().map_err(|_| ConfigError::NotASize("MAX_UPLOAD", x))?,
            None => ByteSize::mib(10),
        };

        // u32 days always fit the seconds value in an i64
        let ttl_days: u32 = match lookup("SESSION_TTL_DAYS") {
            Some(x) => match x.parse() {
                Ok(days) if days > 0 => days,
                _ => return Err(ConfigError::NotANumber("SESSION_TTL_DAYS", x)),
            },
            None => 7,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://db.sqlite?mode=rwc".to_string()),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            upload_dir: lookup("UPLOAD_DIR")
                .unwrap_or_else(|| "uploads".to_string())
                .into(),
            max_upload,
            session_ttl: i64::from(ttl_days) * 60 * 60 * 24,
        })
    }
}

#[test]
fn config_defaults() {
    let config = Config::from_lookup(|_| None).unwrap();

    assert_eq!(config.database_url, "sqlite://db.sqlite?mode=rwc");
    assert_eq!(config.bind_addr, "0.0.0.0");
    assert_eq!(config.port, 8080);
    assert_eq!(config.upload_dir, PathBuf::from("uploads"));
    assert_eq!(config.max_upload, ByteSize::mib(10));
    assert_eq!(config.session_ttl, 60 * 60 * 24 * 7);
}

#[test]
fn config_overrides() {
    let config = Config::from_lookup(|key| match key {
        "PORT" => Some("3000".into()),
        "MAX_UPLOAD" => Some("512KiB".into()),
        "SESSION_TTL_DAYS" => Some("1".into()),
        "UPLOAD_DIR" => Some("/srv/media".into()),
        _ => None,
    })
    .unwrap();

    assert_eq!(config.port, 3000);
    assert_eq!(config.max_upload, ByteSize::kib(512));
    assert_eq!(config.session_ttl, 60 * 60 * 24);
    assert_eq!(config.upload_dir, PathBuf::from("/srv/media"));
}

#[test]
fn config_rejects_garbage() {
    let err = Config::from_lookup(|key| (key == "PORT").then(|| "eighty".to_string()));
    assert!(matches!(err, Err(ConfigError::NotANumber("PORT", _))));

    let err = Config::from_lookup(|key| (key == "MAX_UPLOAD").then(|| "lots".to_string()));
    assert!(matches!(err, Err(ConfigError::NotASize("MAX_UPLOAD", _))));

    for ttl in ["-3", "0", "9223372036854775807", "week"] {
        let err = Config::from_lookup(|key| (key == "SESSION_TTL_DAYS").then(|| ttl.to_string()));
        assert!(matches!(err, Err(ConfigError::NotANumber("SESSION_TTL_DAYS", _))), "{ttl}");
    }

    let config = Config::from_lookup(|key| (key == "SESSION_TTL_DAYS").then(|| u32::MAX.to_string())).unwrap();
    assert_eq!(config.session_ttl, i64::from(u32::MAX) * 60 * 60 * 24);
}
