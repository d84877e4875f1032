use reqwest::Url;
use std::net::IpAddr;

pub fn parse_bool_flag(value: String) -> Option<bool> {
    parse_bool_str(value.as_str())
}

pub fn parse_bool_str(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Splits a comma separated env value, dropping blanks.
pub fn parse_name_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Localhost, loopback IPv4/IPv6 and 0.0.0.0, matched on the parsed host.
pub fn is_local_endpoint_url(url: &str) -> bool {
    let parsed = match Url::parse(url.trim()) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    match host.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback() || ip.is_unspecified(),
        Err(_) => host.eq_ignore_ascii_case("localhost"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_helpers() {
        assert_eq!(parse_bool_str("true"), Some(true));
        assert_eq!(parse_bool_str("0"), Some(false));
        assert_eq!(parse_bool_flag("YES".to_string()), Some(true));
        assert_eq!(parse_bool_flag("off".to_string()), Some(false));
        assert_eq!(parse_bool_str("maybe"), None);
    }

    #[test]
    fn test_parse_name_list_trims_and_skips_blanks() {
        assert_eq!(
            parse_name_list(" getWeatherInformationTool, ,sendEmail "),
            vec!["getWeatherInformationTool", "sendEmail"]
        );
        assert!(parse_name_list("").is_empty());
    }

    #[test]
    fn test_is_local_endpoint_url_normalizes_case_and_space() {
        assert!(is_local_endpoint_url(" HTTP://LOCALHOST:3000/api/chat "));
        assert!(is_local_endpoint_url("https://127.0.0.1/api/chat"));
        assert!(is_local_endpoint_url("http://[::1]:3000/api/chat"));
        assert!(!is_local_endpoint_url("https://chat.example.com/api/chat"));
    }

    #[test]
    fn test_is_local_endpoint_url_rejects_lookalike_hosts() {
        assert!(!is_local_endpoint_url("https://evil-localhost.com/api/chat"));
        assert!(!is_local_endpoint_url("http://localhost.evil.example/api/chat"));
        assert!(!is_local_endpoint_url("http://localhost@evil.com/api/chat"));
        assert!(!is_local_endpoint_url("http://127.0.0.1.evil.example/api/chat"));
        assert!(!is_local_endpoint_url("not a url"));
    }
}
