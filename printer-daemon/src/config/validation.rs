//! Setting value validation.

use regex::Regex;
use std::sync::LazyLock;

static RE_MAC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9A-Fa-f]{2}[:\-]){5}([0-9A-Fa-f]{2})$").unwrap());

/// `XX:XX:XX:XX:XX:XX` or `XX-XX-XX-XX-XX-XX`.
pub fn is_valid_mac(value: &str) -> bool {
    RE_MAC.is_match(value)
}

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "PRINTER_CSV" => {
            if value.len() > 4096 {
                return Err("path too long".into());
            }
        }
        "RECONNECT_DELAY_MS" => validate_int_range(value, 100, 10_000)?,
        "HANDSHAKE_TIMEOUT_SECS" => validate_int_range(value, 10, 30)?,
        "STATUS_TIMEOUT_MS" => validate_int_range(value, 100, 5000)?,
        "STATUS_POLL_INTERVAL_SECS" => validate_int_range(value, 0, 3600)?,
        "RFCOMM_CHANNEL" => validate_int_range(value, 1, 30)?,
        k if is_boolean_setting(k) => {
            if value != "true" && value != "false" {
                return Err("must be 'true' or 'false'".into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn validate_int_range(value: &str, min: i64, max: i64) -> Result<(), String> {
    let v: i64 = value.parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}

fn is_boolean_setting(key: &str) -> bool {
    matches!(key, "SECURE_RFCOMM" | "AUTO_STATUS_BACK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_formats() {
        assert!(is_valid_mac("1C:B8:57:50:01:D9"));
        assert!(is_valid_mac("1c-b8-57-50-01-d9"));
        assert!(!is_valid_mac("1C:B8:57:50:01"));
        assert!(!is_valid_mac("1C:B8:57:50:01:D9:00"));
        assert!(!is_valid_mac("GG:B8:57:50:01:D9"));
        assert!(!is_valid_mac(""));
    }

    #[test]
    fn ranges() {
        assert!(validate_setting("HANDSHAKE_TIMEOUT_SECS", "20").is_ok());
        assert_eq!(
            validate_setting("HANDSHAKE_TIMEOUT_SECS", "5"),
            Err("must be between 10 and 30".to_string())
        );
        assert_eq!(
            validate_setting("RECONNECT_DELAY_MS", "soon"),
            Err("must be an integer".to_string())
        );
        assert!(validate_setting("STATUS_POLL_INTERVAL_SECS", "0").is_ok());
        assert!(validate_setting("RFCOMM_CHANNEL", "31").is_err());
    }

    #[test]
    fn booleans() {
        assert!(validate_setting("SECURE_RFCOMM", "true").is_ok());
        assert!(validate_setting("AUTO_STATUS_BACK", "yes").is_err());
    }

    #[test]
    fn unknown_keys_pass() {
        assert!(validate_setting("SOMETHING_ELSE", "anything").is_ok());
    }
}
