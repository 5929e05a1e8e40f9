//! All setting definitions with their default values.

use std::collections::HashMap;
use std::sync::LazyLock;

/// A single setting definition.
#[derive(Debug, Clone)]
pub struct SettingDef {
    pub key: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

type DefTuple = (&'static str, &'static str, &'static str);

const DEFS: &[DefTuple] = &[
    (
        "PRINTER_CSV",
        "",
        "Path of printer.csv (empty: <data dir>/printer.csv)",
    ),
    (
        "RECONNECT_DELAY_MS",
        "1000",
        "Pause between disconnect and reconnect",
    ),
    (
        "HANDSHAKE_TIMEOUT_SECS",
        "20",
        "Time allowed for the RFCOMM handshake",
    ),
    ("STATUS_TIMEOUT_MS", "500", "Time to wait for a status reply"),
    (
        "STATUS_POLL_INTERVAL_SECS",
        "5",
        "Status poll interval while connected (0 disables)",
    ),
    ("SECURE_RFCOMM", "false", "Request an authenticated link"),
    ("RFCOMM_CHANNEL", "1", "RFCOMM channel of the printer's SPP service"),
    (
        "AUTO_STATUS_BACK",
        "false",
        "Enable automatic status back after connecting",
    ),
];

/// Global setting definitions indexed by key.
pub static DEFAULT_SETTINGS: LazyLock<HashMap<&'static str, SettingDef>> = LazyLock::new(|| {
    DEFS.iter()
        .map(|&(key, default, description)| {
            (
                key,
                SettingDef {
                    key,
                    default,
                    description,
                },
            )
        })
        .collect()
});

/// Get the default value for a setting key, or `None` if not defined.
pub fn get_default(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS.get(key).map(|d| d.default)
}

/// Every known key, in definition order.
pub fn setting_keys() -> impl Iterator<Item = &'static str> {
    DEFS.iter().map(|&(key, _, _)| key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::validate_setting;

    #[test]
    fn every_default_passes_validation() {
        for key in setting_keys() {
            let default = get_default(key).unwrap();
            assert!(
                validate_setting(key, default).is_ok(),
                "{key}={default} should be valid"
            );
        }
    }

    #[test]
    fn unknown_key_has_no_default() {
        assert_eq!(get_default("SERVER_PORT"), None);
    }
}
