use serde::{Deserialize, Serialize};

/// Full runtime snapshot pushed by the device on every broadcast.
///
/// The client never merges two snapshots: each `state` message replaces the
/// previous value wholesale. Sub-records absent from a payload decode to
/// their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeState {
    pub servos: Vec<ServoStatus>,
    pub wifi: WifiStatus,
    pub system: SystemStatus,
    pub eye: EyePose,
    pub mode: ModeStatus,
    pub impulse: ImpulseStatus,
    pub update: UpdateStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServoStatus {
    pub name: String,
    pub pos: i32,
    pub pin: u8,
    pub min: u8,
    pub center: u8,
    pub max: u8,
    pub invert: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WifiStatus {
    /// One of `AP`, `STA` or `AP+STA`.
    pub mode: String,
    pub ssid: String,
    pub ip: String,
    pub ap_ip: String,
    pub ap_name: String,
    pub ap_active: bool,
    pub connected: bool,
    pub reconnecting: bool,
    pub reconnect_attempt: u32,
    pub mdns_active: bool,
    pub mdns_hostname: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiStatus {
    Ok,
    MinorMismatch,
    MajorMismatch,
    FwTooOld,
    UiTooOld,
    #[default]
    #[serde(other)]
    Missing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemStatus {
    pub device_id: String,
    pub uptime: Option<u64>,
    pub reboot_required: bool,
    pub ui_version: String,
    pub ui_status: UiStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EyePose {
    pub gaze_x: f64,
    pub gaze_y: f64,
    pub gaze_z: f64,
    pub lid_left: f64,
    pub lid_right: f64,
    pub coupling: f64,
    pub max_vergence: f64,
    pub mirror_preview: bool,
    pub auto_blink_active: bool,
    pub is_auto: bool,
}

impl Default for EyePose {
    fn default() -> Self {
        Self {
            gaze_x: 0.0,
            gaze_y: 0.0,
            gaze_z: 0.0,
            lid_left: 0.0,
            lid_right: 0.0,
            coupling: 1.0,
            max_vergence: 100.0,
            mirror_preview: false,
            auto_blink_active: false,
            is_auto: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModeStatus {
    pub current: String,
    pub is_auto: bool,
    pub auto_blink: bool,
    pub auto_blink_active: bool,
    pub auto_blink_paused: bool,
    pub blink_interval_min: u32,
    pub blink_interval_max: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImpulseStatus {
    pub playing: bool,
    pub pending: bool,
    pub current: String,
    pub preloaded: String,
    pub auto_impulse: bool,
    pub auto_impulse_active: bool,
    pub impulse_interval_min: u32,
    pub impulse_interval_max: u32,
    pub impulse_selection: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateStatus {
    pub available: bool,
    pub version: String,
    pub last_check: u64,
    pub checking: bool,
    pub enabled: bool,
    /// 0 = boot only, 1 = daily, 2 = weekly.
    pub interval: u8,
}

impl Default for UpdateStatus {
    fn default() -> Self {
        Self {
            available: false,
            version: String::new(),
            last_check: 0,
            checking: false,
            enabled: true,
            interval: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let state: RuntimeState = serde_json::from_str(r#"{"eye":{"gazeX":12.5}}"#).unwrap();
        assert_eq!(state.eye.gaze_x, 12.5);
        assert_eq!(state.eye.coupling, 1.0);
        assert_eq!(state.eye.max_vergence, 100.0);
        assert!(state.servos.is_empty());
        assert!(state.update.enabled);
        assert_eq!(state.system.ui_status, UiStatus::Missing);
    }

    #[test]
    fn unknown_ui_status_decodes_as_missing() {
        let system: SystemStatus =
            serde_json::from_str(r#"{"uiStatus":"something_new","deviceId":"A1B2C3"}"#).unwrap();
        assert_eq!(system.ui_status, UiStatus::Missing);
        assert_eq!(system.device_id, "A1B2C3");

        let system: SystemStatus = serde_json::from_str(r#"{"uiStatus":"fw_too_old"}"#).unwrap();
        assert_eq!(system.ui_status, UiStatus::FwTooOld);
    }

    #[test]
    fn wifi_status_uses_device_field_names() {
        let wifi: WifiStatus = serde_json::from_str(
            r#"{"mode":"AP+STA","apIp":"192.168.4.1","apActive":true,"reconnectAttempt":2,"mdnsHostname":"eyes-A1B2C3"}"#,
        )
        .unwrap();
        assert_eq!(wifi.mode, "AP+STA");
        assert_eq!(wifi.ap_ip, "192.168.4.1");
        assert!(wifi.ap_active);
        assert_eq!(wifi.reconnect_attempt, 2);
        assert_eq!(wifi.mdns_hostname.as_deref(), Some("eyes-A1B2C3"));
    }
}
