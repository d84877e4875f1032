use serde_json::Value;
use tracing_subscriber::EnvFilter;

const DEBUG_PAYLOAD_ENV: &str = "AGENTCHAT_DEBUG_PAYLOAD";
const LOG_FILTER_ENV: &str = "AGENTCHAT_LOG";
const DEFAULT_LOG_FILTER: &str = "agentchat=info";

/// Installs a fmt subscriber filtered by `AGENTCHAT_LOG`.
///
/// Hosts that already own a subscriber can skip this; a second install is ignored.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    tracing::debug!(url = request_url, payload = %formatted_payload, "outgoing chat payload");
}

pub fn emit_stream_parse_error(code: char, json_data: &str, parse_error: &serde_json::Error) {
    tracing::warn!(
        code = %code,
        data = json_data,
        error = %parse_error,
        "stream line could not be decoded"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_payload_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(DEBUG_PAYLOAD_ENV, "1");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "TRUE");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "no");
        assert!(!debug_payload_enabled());
        std::env::remove_var(DEBUG_PAYLOAD_ENV);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init();
        init();
    }
}
