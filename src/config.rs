use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::util::{is_local_endpoint_url, parse_bool_flag, parse_name_list};

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api/chat";
pub const DEFAULT_CONFIRMATION_TOOL: &str = "getWeatherInformationTool";
pub const DEFAULT_SCROLL_TOLERANCE: f64 = 8.0;

const API_URL_ENV: &str = "AGENTCHAT_API_URL";
const API_KEY_ENV: &str = "AGENTCHAT_API_KEY";
const CONFIRM_TOOLS_ENV: &str = "AGENTCHAT_CONFIRM_TOOLS";
const STRICT_TOOL_RESULTS_ENV: &str = "AGENTCHAT_STRICT_TOOL_RESULTS";
const AUTO_RESUBMIT_ENV: &str = "AGENTCHAT_AUTO_RESUBMIT";
const SCROLL_TOLERANCE_ENV: &str = "AGENTCHAT_SCROLL_TOLERANCE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_url: String,
    /// Tools whose calls lock the input until a human answers them.
    pub confirmation_required: BTreeSet<String>,
    /// Reject `add_tool_result` for unknown or resolved calls instead of ignoring it.
    pub strict_tool_results: bool,
    /// Reopen a stream once every tool call of the last assistant turn has a result.
    pub auto_resubmit_tool_results: bool,
    pub scroll_tolerance: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            confirmation_required: BTreeSet::from([DEFAULT_CONFIRMATION_TOOL.to_string()]),
            strict_tool_results: cfg!(debug_assertions),
            auto_resubmit_tool_results: false,
            scroll_tolerance: DEFAULT_SCROLL_TOLERANCE,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let api_url = std::env::var(API_URL_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.api_url);
        let api_key = std::env::var(API_KEY_ENV).ok().and_then(|v| {
            if v.trim().is_empty() {
                None
            } else {
                Some(v)
            }
        });
        let confirmation_required = match std::env::var(CONFIRM_TOOLS_ENV) {
            Ok(value) => parse_name_list(&value).into_iter().collect(),
            Err(_) => defaults.confirmation_required,
        };
        let strict_tool_results = std::env::var(STRICT_TOOL_RESULTS_ENV)
            .ok()
            .and_then(parse_bool_flag)
            .unwrap_or(defaults.strict_tool_results);
        let auto_resubmit_tool_results = std::env::var(AUTO_RESUBMIT_ENV)
            .ok()
            .and_then(parse_bool_flag)
            .unwrap_or(defaults.auto_resubmit_tool_results);
        let scroll_tolerance = match std::env::var(SCROLL_TOLERANCE_ENV) {
            Ok(value) => value
                .trim()
                .parse::<f64>()
                .with_context(|| format!("{SCROLL_TOLERANCE_ENV} must be a number, got '{value}'"))?,
            Err(_) => defaults.scroll_tolerance,
        };

        Ok(Self {
            api_key,
            api_url,
            confirmation_required,
            strict_tool_results,
            auto_resubmit_tool_results,
            scroll_tolerance,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            bail!(
                "Invalid {API_URL_ENV} '{}': expected http:// or https:// URL",
                self.api_url
            );
        }

        if !self.is_local_endpoint() && self.api_key.is_none() {
            bail!(
                "{API_KEY_ENV} must be set for non-local endpoints (url: '{}')",
                self.api_url
            );
        }

        if !self.scroll_tolerance.is_finite() || self.scroll_tolerance < 0.0 {
            bail!(
                "{SCROLL_TOLERANCE_ENV} must be a non-negative number, got {}",
                self.scroll_tolerance
            );
        }

        Ok(())
    }

    pub fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.api_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for key in [
            API_URL_ENV,
            API_KEY_ENV,
            CONFIRM_TOOLS_ENV,
            STRICT_TOOL_RESULTS_ENV,
            AUTO_RESUBMIT_ENV,
            SCROLL_TOLERANCE_ENV,
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_load_uses_defaults_without_env() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        clear_env();

        let config = Config::load().expect("defaults load");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.api_key.is_none());
        assert!(config.confirmation_required.contains(DEFAULT_CONFIRMATION_TOOL));
        assert!(!config.auto_resubmit_tool_results);
        assert_eq!(config.scroll_tolerance, DEFAULT_SCROLL_TOLERANCE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_reads_overrides() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        clear_env();
        std::env::set_var(API_URL_ENV, "https://chat.example.com/api/chat");
        std::env::set_var(API_KEY_ENV, "  ");
        std::env::set_var(CONFIRM_TOOLS_ENV, "sendEmail, deleteFile");
        std::env::set_var(STRICT_TOOL_RESULTS_ENV, "off");
        std::env::set_var(AUTO_RESUBMIT_ENV, "1");
        std::env::set_var(SCROLL_TOLERANCE_ENV, "12");

        let config = Config::load().expect("overrides load");
        assert_eq!(config.api_url, "https://chat.example.com/api/chat");
        assert!(config.api_key.is_none(), "blank key must be treated as unset");
        assert_eq!(
            config.confirmation_required.iter().cloned().collect::<Vec<_>>(),
            vec!["deleteFile".to_string(), "sendEmail".to_string()]
        );
        assert!(!config.strict_tool_results);
        assert!(config.auto_resubmit_tool_results);
        assert_eq!(config.scroll_tolerance, 12.0);
        assert!(config.validate().is_err(), "remote endpoint needs a key");

        clear_env();
    }

    #[test]
    fn test_load_rejects_non_numeric_tolerance() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        clear_env();
        std::env::set_var(SCROLL_TOLERANCE_ENV, "lots");

        assert!(Config::load().is_err());

        clear_env();
    }

    #[test]
    fn test_validate_rejects_negative_tolerance() {
        let config = Config {
            scroll_tolerance: -1.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_key_for_lookalike_local_hosts() {
        for api_url in [
            "http://localhost.evil.example/api/chat",
            "http://localhost@evil.com/api/chat",
        ] {
            let config = Config {
                api_key: None,
                api_url: api_url.to_string(),
                ..Config::default()
            };
            assert!(!config.is_local_endpoint(), "{api_url}");
            assert!(config.validate().is_err(), "{api_url}");
        }
    }
}
