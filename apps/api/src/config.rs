use std::time::Duration;

use anyhow::{Context, Result};

use crate::analysis::pipeline::AnalysisMode;
use crate::llm_client::DEFAULT_MAX_RETRIES;
use crate::reports::Retention;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_REPORT_TTL_SECS: u64 = 60 * 60;
const DEFAULT_MAX_STORED_REPORTS: usize = 100;

/// Application configuration loaded from environment variables.
/// Every variable is optional; malformed values fail startup.
/// The Groq API key is supplied per request and never read from here.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Default mode for runs that don't ask for one.
    pub analysis_mode: AnalysisMode,
    pub typst_bin: String,
    pub max_upload_bytes: usize,
    /// Rate-limit retry ceiling per LLM call.
    pub llm_max_retries: u32,
    pub report_ttl: Duration,
    pub max_stored_reports: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            analysis_mode: AnalysisMode::Full,
            typst_bin: "typst".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            llm_max_retries: DEFAULT_MAX_RETRIES,
            report_ttl: Duration::from_secs(DEFAULT_REPORT_TTL_SECS),
            max_stored_reports: DEFAULT_MAX_STORED_REPORTS,
        }
    }
}

impl Config {
    pub fn retention(&self) -> Retention {
        Retention {
            ttl: self.report_ttl,
            max_reports: self.max_stored_reports,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        Ok(Config {
            port: match lookup("PORT") {
                Some(v) => v
                    .parse::<u16>()
                    .context("PORT must be a valid port number")?,
                None => defaults.port,
            },
            rust_log: lookup("RUST_LOG").unwrap_or(defaults.rust_log),
            analysis_mode: match lookup("ANALYSIS_MODE") {
                Some(v) => v
                    .parse::<AnalysisMode>()
                    .map_err(anyhow::Error::msg)
                    .context("ANALYSIS_MODE is invalid")?,
                None => defaults.analysis_mode,
            },
            typst_bin: lookup("TYPST_BIN").unwrap_or(defaults.typst_bin),
            max_upload_bytes: match lookup("MAX_UPLOAD_BYTES") {
                Some(v) => v
                    .parse::<usize>()
                    .context("MAX_UPLOAD_BYTES must be a byte count")?,
                None => defaults.max_upload_bytes,
            },
            llm_max_retries: match lookup("LLM_MAX_RETRIES") {
                Some(v) => v
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .context("LLM_MAX_RETRIES must be a positive integer")?,
                None => defaults.llm_max_retries,
            },
            report_ttl: match lookup("REPORT_TTL_SECS") {
                Some(v) => Duration::from_secs(
                    v.parse::<u64>()
                        .context("REPORT_TTL_SECS must be a number of seconds")?,
                ),
                None => defaults.report_ttl,
            },
            max_stored_reports: match lookup("MAX_STORED_REPORTS") {
                Some(v) => v
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .context("MAX_STORED_REPORTS must be a positive integer")?,
                None => defaults.max_stored_reports,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.analysis_mode, AnalysisMode::Full);
        assert_eq!(config.typst_bin, "typst");
        assert_eq!(config.max_upload_bytes, 10_485_760);
        assert_eq!(config.llm_max_retries, 5);
        assert_eq!(config.report_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_stored_reports, 100);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = config_from(&[
            ("PORT", "3000"),
            ("ANALYSIS_MODE", "simplified"),
            ("TYPST_BIN", "/opt/typst/bin/typst"),
            ("MAX_UPLOAD_BYTES", "1024"),
            ("LLM_MAX_RETRIES", "3"),
            ("REPORT_TTL_SECS", "600"),
            ("MAX_STORED_REPORTS", "20"),
        ])
        .unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.analysis_mode, AnalysisMode::Simplified);
        assert_eq!(config.typst_bin, "/opt/typst/bin/typst");
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.llm_max_retries, 3);
        assert_eq!(config.retention().ttl, Duration::from_secs(600));
        assert_eq!(config.retention().max_reports, 20);
    }

    #[test]
    fn test_bad_values_fail() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
        assert!(config_from(&[("ANALYSIS_MODE", "turbo")]).is_err());
        assert!(config_from(&[("LLM_MAX_RETRIES", "0")]).is_err());
        assert!(config_from(&[("MAX_STORED_REPORTS", "0")]).is_err());
    }
}
