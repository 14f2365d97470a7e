//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, private keys) are referenced by env-var name in
//! the config and resolved at runtime via `std::env::var`. A missing
//! config file yields the built-in defaults.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::types::{Platform, PlatformCredentials};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub platforms: PlatformsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PlatformsConfig {
    pub solana: SolanaConfig,
    pub polymarket: PolymarketConfig,
    pub kalshi: KalshiConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SolanaConfig {
    pub enabled: bool,
    pub rpc_url: Option<String>,
    pub private_key_env: Option<String>,
    pub wallet_address_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PolymarketConfig {
    pub enabled: bool,
    pub api_key_env: Option<String>,
    pub secret_env: Option<String>,
    pub passphrase_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KalshiConfig {
    pub enabled: bool,
    pub api_key_env: Option<String>,
    pub private_key_env: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file; defaults when absent.
    pub fn load(path: &str) -> Result<Self> {
        if !Path::new(path).exists() {
            info!(path, "No config file found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Credentials for every enabled platform, assembled from whatever
    /// env-referenced secrets actually resolve. Used to pre-register
    /// platforms at startup; callers may also register over the API.
    pub fn startup_credentials(&self) -> Vec<PlatformCredentials> {
        let mut all = Vec::new();

        if self.platforms.solana.enabled {
            let cfg = &self.platforms.solana;
            let mut creds = PlatformCredentials::for_platform(Platform::Solana);
            creds.rpc_url = cfg.rpc_url.clone();
            creds.private_key = resolve_secret(cfg.private_key_env.as_deref());
            creds.wallet_address = resolve_plain(cfg.wallet_address_env.as_deref());
            all.push(creds);
        }

        if self.platforms.polymarket.enabled {
            let cfg = &self.platforms.polymarket;
            let mut creds = PlatformCredentials::for_platform(Platform::Polymarket);
            creds.api_key = resolve_plain(cfg.api_key_env.as_deref());
            creds.secret = resolve_secret(cfg.secret_env.as_deref());
            creds.passphrase = resolve_secret(cfg.passphrase_env.as_deref());
            all.push(creds);
        }

        if self.platforms.kalshi.enabled {
            let cfg = &self.platforms.kalshi;
            let mut creds = PlatformCredentials::for_platform(Platform::Kalshi);
            creds.api_key = resolve_plain(cfg.api_key_env.as_deref());
            creds.private_key = resolve_secret(cfg.private_key_env.as_deref());
            all.push(creds);
        }

        all
    }
}

fn resolve_plain(env_name: Option<&str>) -> Option<String> {
    env_name.and_then(|name| std::env::var(name).ok())
}

fn resolve_secret(env_name: Option<&str>) -> Option<SecretString> {
    resolve_plain(env_name).map(SecretString::new)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
