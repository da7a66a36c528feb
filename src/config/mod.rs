//! Configuration module for the Scribe Gateway
//!
//! This module handles server configuration from .env files, environment
//! variables, and an optional YAML file. Priority: YAML > ENV vars > .env
//! values > defaults.
//!
//! # Example
//! ```rust,no_run
//! use scribe_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config = ServerConfig::from_file(&PathBuf::from("config.yaml"))?;
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod yaml;

pub use yaml::YamlConfig;

use crate::core::recognizer::RecognizerConfig;
use crate::core::relay::{OverflowPolicy, PendingAudioSettings};

/// Default cap on a single audio fragment; the browser sends small chunks,
/// so anything near this size indicates a misbehaving client.
pub const DEFAULT_MAX_AUDIO_FRAGMENT_BYTES: usize = 10 * 1024 * 1024;

/// TLS configuration for HTTPS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains everything needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Speech-recognizer connection settings (Deepgram-compatible)
/// - Text-generation settings for note drafting (OpenAI-compatible)
/// - Authentication settings
/// - Security settings (CORS, rate limiting, payload caps)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Speech recognizer settings
    /// Deepgram API key. When absent the relay runs with transcription
    /// disabled: audio submissions succeed but are dropped.
    pub deepgram_api_key: Option<String>,
    /// Recognizer WebSocket endpoint; overridable for self-hosted
    /// deployments and tests.
    pub deepgram_url: String,
    pub recognizer_model: String,
    pub recognizer_encoding: String,
    pub recognizer_sample_rate: u32,
    pub recognizer_channels: u16,
    pub recognizer_smart_format: bool,
    /// Interval between KeepAlive frames sent to the recognizer.
    pub recognizer_keep_alive_secs: u64,
    /// Cap on audio fragments buffered while the recognizer socket is
    /// still connecting.
    pub pending_audio_capacity: usize,
    /// What to do with a fragment that would exceed the pending cap.
    pub pending_audio_overflow: OverflowPolicy,

    // Note drafting (OpenAI-compatible chat completions)
    pub openai_api_key: Option<String>,
    pub openai_api_url: String,
    pub openai_model: String,

    // Authentication configuration
    pub auth_jwt_secret: Option<String>,
    pub auth_required: bool,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: u32,
    /// Cap on a single inbound audio fragment body
    pub max_audio_fragment_bytes: usize,
}

/// Implement Drop to zeroize secret fields when ServerConfig is dropped so
/// sensitive data is cleared from memory after use.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.deepgram_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut secret) = self.auth_jwt_secret {
            secret.zeroize();
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match env_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("Invalid value for {name}: {raw}")),
        None => Ok(default),
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let tls = match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: PathBuf::from(cert),
                key_path: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => {
                return Err(
                    "TLS_CERT_PATH and TLS_KEY_PATH must both be set to enable TLS".into(),
                );
            }
        };

        let auth_jwt_secret = env_var("JWT_SECRET");
        // Auth defaults to on whenever a signing secret is configured.
        let auth_required = match env_var("AUTH_REQUIRED") {
            Some(raw) => raw
                .parse()
                .map_err(|_| format!("Invalid value for AUTH_REQUIRED: {raw}"))?,
            None => auth_jwt_secret.is_some(),
        };

        let overflow = match env_var("PENDING_AUDIO_OVERFLOW") {
            Some(raw) => raw.parse::<OverflowPolicy>()?,
            None => OverflowPolicy::DropOldest,
        };

        let config = Self {
            host: env_var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env_parse("PORT", 5000)?,
            tls,
            deepgram_api_key: env_var("DEEPGRAM_API_KEY"),
            deepgram_url: env_var("DEEPGRAM_URL")
                .unwrap_or_else(|| "wss://api.deepgram.com/v1/listen".to_string()),
            recognizer_model: env_var("RECOGNIZER_MODEL")
                .unwrap_or_else(|| "nova-2-general".to_string()),
            recognizer_encoding: env_var("RECOGNIZER_ENCODING")
                .unwrap_or_else(|| "opus".to_string()),
            recognizer_sample_rate: env_parse("RECOGNIZER_SAMPLE_RATE", 48000)?,
            recognizer_channels: env_parse("RECOGNIZER_CHANNELS", 1)?,
            recognizer_smart_format: env_parse("RECOGNIZER_SMART_FORMAT", true)?,
            recognizer_keep_alive_secs: env_parse("RECOGNIZER_KEEP_ALIVE_SECS", 4)?,
            pending_audio_capacity: env_parse("PENDING_AUDIO_CAPACITY", 256)?,
            pending_audio_overflow: overflow,
            openai_api_key: env_var("OPEN_AI_KEY"),
            openai_api_url: env_var("OPENAI_API_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string()),
            openai_model: env_var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            auth_jwt_secret,
            auth_required,
            cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
            rate_limit_requests_per_second: env_parse("RATE_LIMIT_RPS", 60)?,
            rate_limit_burst_size: env_parse("RATE_LIMIT_BURST", 10)?,
            max_audio_fragment_bytes: env_parse(
                "MAX_AUDIO_FRAGMENT_BYTES",
                DEFAULT_MAX_AUDIO_FRAGMENT_BYTES,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml = YamlConfig::from_file(path)?;
        let mut config = Self::from_env()?;

        if let Some(server) = yaml.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            match (server.tls_cert_path, server.tls_key_path) {
                (Some(cert_path), Some(key_path)) => {
                    config.tls = Some(TlsConfig {
                        cert_path,
                        key_path,
                    });
                }
                (None, None) => {}
                _ => {
                    return Err(
                        "tls_cert_path and tls_key_path must both be set to enable TLS".into(),
                    );
                }
            }
        }

        if let Some(recognizer) = yaml.recognizer {
            if let Some(api_key) = recognizer.api_key {
                config.deepgram_api_key = Some(api_key);
            }
            if let Some(url) = recognizer.url {
                config.deepgram_url = url;
            }
            if let Some(model) = recognizer.model {
                config.recognizer_model = model;
            }
            if let Some(encoding) = recognizer.encoding {
                config.recognizer_encoding = encoding;
            }
            if let Some(sample_rate) = recognizer.sample_rate {
                config.recognizer_sample_rate = sample_rate;
            }
            if let Some(channels) = recognizer.channels {
                config.recognizer_channels = channels;
            }
            if let Some(smart_format) = recognizer.smart_format {
                config.recognizer_smart_format = smart_format;
            }
            if let Some(keep_alive) = recognizer.keep_alive_secs {
                config.recognizer_keep_alive_secs = keep_alive;
            }
            if let Some(capacity) = recognizer.pending_audio_capacity {
                config.pending_audio_capacity = capacity;
            }
            if let Some(overflow) = recognizer.pending_audio_overflow {
                config.pending_audio_overflow = overflow.parse()?;
            }
        }

        if let Some(drafting) = yaml.drafting {
            if let Some(api_key) = drafting.api_key {
                config.openai_api_key = Some(api_key);
            }
            if let Some(api_url) = drafting.api_url {
                config.openai_api_url = api_url;
            }
            if let Some(model) = drafting.model {
                config.openai_model = model;
            }
        }

        if let Some(auth) = yaml.auth {
            if let Some(secret) = auth.jwt_secret {
                config.auth_jwt_secret = Some(secret);
            }
            if let Some(required) = auth.required {
                config.auth_required = required;
            }
        }

        if let Some(security) = yaml.security {
            if let Some(origins) = security.cors_allowed_origins {
                config.cors_allowed_origins = Some(origins);
            }
            if let Some(rps) = security.rate_limit_requests_per_second {
                config.rate_limit_requests_per_second = rps;
            }
            if let Some(burst) = security.rate_limit_burst_size {
                config.rate_limit_burst_size = burst;
            }
            if let Some(max_bytes) = security.max_audio_fragment_bytes {
                config.max_audio_fragment_bytes = max_bytes;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.auth_required && self.auth_jwt_secret.is_none() {
            return Err(
                "Authentication is required but JWT_SECRET is not configured".to_string(),
            );
        }
        if !(crate::core::recognizer::MIN_SAMPLE_RATE..=crate::core::recognizer::MAX_SAMPLE_RATE)
            .contains(&self.recognizer_sample_rate)
        {
            return Err(format!(
                "Sample rate {} Hz is outside supported range ({}-{} Hz)",
                self.recognizer_sample_rate,
                crate::core::recognizer::MIN_SAMPLE_RATE,
                crate::core::recognizer::MAX_SAMPLE_RATE
            ));
        }
        if self.pending_audio_capacity == 0 {
            return Err("pending_audio_capacity must be at least 1".to_string());
        }
        if self.recognizer_keep_alive_secs == 0 {
            return Err("recognizer_keep_alive_secs must be at least 1".to_string());
        }
        if self.max_audio_fragment_bytes == 0 {
            return Err("max_audio_fragment_bytes must be at least 1".to_string());
        }
        Ok(())
    }

    /// Get the server address as a string in the format "host:port".
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Recognizer connection settings, or `None` when no API key is
    /// configured and the relay should run with transcription disabled.
    pub fn recognizer_config(&self) -> Option<RecognizerConfig> {
        let api_key = self.deepgram_api_key.clone()?;
        Some(RecognizerConfig {
            api_key,
            url: self.deepgram_url.clone(),
            model: self.recognizer_model.clone(),
            encoding: self.recognizer_encoding.clone(),
            sample_rate: self.recognizer_sample_rate,
            channels: self.recognizer_channels,
            smart_format: self.recognizer_smart_format,
            keep_alive_interval: Duration::from_secs(self.recognizer_keep_alive_secs),
        })
    }

    /// Buffering settings for audio awaiting a connecting recognizer socket.
    pub fn pending_audio_settings(&self) -> PendingAudioSettings {
        PendingAudioSettings {
            capacity: self.pending_audio_capacity,
            overflow: self.pending_audio_overflow,
        }
    }
}
