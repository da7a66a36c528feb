//! YAML configuration file loading
//!
//! Every field is optional; values present in the file override the
//! environment-derived base configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlConfig {
    pub server: Option<YamlServer>,
    pub recognizer: Option<YamlRecognizer>,
    pub drafting: Option<YamlDrafting>,
    pub auth: Option<YamlAuth>,
    pub security: Option<YamlSecurity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlServer {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlRecognizer {
    pub api_key: Option<String>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub encoding: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub smart_format: Option<bool>,
    pub keep_alive_secs: Option<u64>,
    pub pending_audio_capacity: Option<usize>,
    /// "drop-oldest" or "reject-new"
    pub pending_audio_overflow: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlDrafting {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlAuth {
    pub jwt_secret: Option<String>,
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YamlSecurity {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_audio_fragment_bytes: Option<usize>,
}

impl YamlConfig {
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Invalid YAML in {}: {e}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_partial_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "server:\n  port: 8443\nrecognizer:\n  model: nova-2-general\n  pending_audio_capacity: 64\n"
        )
        .unwrap();

        let config = YamlConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.as_ref().unwrap().port, Some(8443));
        assert_eq!(
            config.recognizer.as_ref().unwrap().model.as_deref(),
            Some("nova-2-general")
        );
        assert_eq!(
            config.recognizer.as_ref().unwrap().pending_audio_capacity,
            Some(64)
        );
        assert!(config.auth.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  listen: nope\n").unwrap();

        assert!(YamlConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_errors() {
        let result = YamlConfig::from_file(Path::new("/nonexistent/config.yaml"));
        assert!(result.is_err());
    }
}
