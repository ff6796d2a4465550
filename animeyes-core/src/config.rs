use serde::{Deserialize, Serialize};

pub const WIFI_MAX_NETWORKS: usize = 2;

pub const DEFAULT_WIFI_GRACE_S: u32 = 3;
pub const DEFAULT_WIFI_RETRIES: u32 = 3;
pub const DEFAULT_WIFI_RETRY_DELAY_S: u32 = 10;
pub const DEFAULT_WIFI_AP_SCAN_MIN: u32 = 5;
pub const DEFAULT_KEEP_AP: bool = true;

pub const DEFAULT_AP_SSID_PREFIX: &str = "LookIntoMyEyes";
pub const MIN_AP_PASSWORD_LEN: usize = 8;

pub const DEFAULT_LED_ENABLED: bool = true;
pub const DEFAULT_LED_PIN: u8 = 2;
pub const DEFAULT_LED_BRIGHTNESS: u8 = 255;

pub const DEFAULT_MDNS_ENABLED: bool = true;
pub const DEFAULT_MDNS_HOSTNAME: &str = "animatronic-eyes";
pub const MAX_HOSTNAME_LEN: usize = 63;

pub const DEFAULT_MODE: &str = "follow";
pub const DEFAULT_AUTO_BLINK: bool = true;
pub const DEFAULT_BLINK_INTERVAL_MIN_MS: u32 = 2000;
pub const DEFAULT_BLINK_INTERVAL_MAX_MS: u32 = 6000;
pub const DEFAULT_REMEMBER_LAST_MODE: bool = false;
pub const DEFAULT_MIRROR_PREVIEW: bool = false;

pub const DEFAULT_AUTO_IMPULSE: bool = true;
pub const DEFAULT_IMPULSE_INTERVAL_MIN_MS: u32 = 30_000;
pub const DEFAULT_IMPULSE_INTERVAL_MAX_MS: u32 = 120_000;
pub const DEFAULT_IMPULSE_SELECTION: &str = "startle,distraction";

/// Answer to `getConfig`. Every section is optional and every field inside a
/// section is optional: absent values take the documented defaults above.
///
/// Passwords are never echoed back; `ap.hasPassword` only reports whether one
/// is stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceConfig {
    pub networks: Vec<NetworkSlot>,
    pub wifi_timing: Option<WifiTimingConfig>,
    pub ap: Option<ApConfig>,
    pub led: Option<LedConfig>,
    pub mdns: Option<MdnsConfig>,
    pub mode: Option<ModeConfig>,
    pub impulse: Option<ImpulseConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkSlot {
    pub index: u8,
    pub ssid: String,
    pub configured: bool,
}

/// Durations are in the units the device reports them in: seconds for
/// `grace` and `retryDelay`, minutes for `apScan`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WifiTimingConfig {
    pub grace: Option<u32>,
    pub retries: Option<u32>,
    pub retry_delay: Option<u32>,
    pub ap_scan: Option<u32>,
    #[serde(rename = "keepAP")]
    pub keep_ap: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApConfig {
    pub ssid_prefix: Option<String>,
    pub has_password: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedConfig {
    pub enabled: Option<bool>,
    pub pin: Option<u8>,
    pub brightness: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MdnsConfig {
    pub enabled: Option<bool>,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModeConfig {
    pub default_mode: Option<String>,
    pub auto_blink: Option<bool>,
    pub blink_interval_min: Option<u32>,
    pub blink_interval_max: Option<u32>,
    pub remember_last_mode: Option<bool>,
    pub mirror_preview: Option<bool>,
}

/// Impulse intervals travel in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImpulseConfig {
    pub auto_impulse: Option<bool>,
    pub impulse_interval_min: Option<u32>,
    pub impulse_interval_max: Option<u32>,
    pub impulse_selection: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_leaves_absent_sections_empty() {
        let config: DeviceConfig = serde_json::from_str(
            r#"{
                "networks":[{"index":0,"ssid":"home","configured":true},{"index":1,"ssid":"","configured":false}],
                "wifiTiming":{"grace":5,"keepAP":false},
                "mdns":{"hostname":"eyes"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.networks.len(), 2);
        assert!(config.networks[0].configured);
        let timing = config.wifi_timing.unwrap();
        assert_eq!(timing.grace, Some(5));
        assert_eq!(timing.retries, None);
        assert_eq!(timing.keep_ap, Some(false));
        assert_eq!(config.mdns.unwrap().enabled, None);
        assert!(config.led.is_none());
        assert!(config.impulse.is_none());
    }
}
