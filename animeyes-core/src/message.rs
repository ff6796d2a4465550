use serde::{Deserialize, Serialize};

use crate::{config::DeviceConfig, state::RuntimeState};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminStatus {
    pub locked: bool,
    #[serde(rename = "isAPClient")]
    pub is_ap_client: bool,
    pub pin_configured: bool,
    pub remaining_seconds: u32,
    pub lockout_seconds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanResult {
    pub ssid: String,
    pub rssi: i32,
    pub secure: bool,
}

/// Entry of an `availableModes` list. Older firmware sends bare names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModeEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(rename = "displayName", default)]
        display_name: Option<String>,
    },
}

impl ModeEntry {
    pub fn name(&self) -> &str {
        match self {
            ModeEntry::Name(name) => name,
            ModeEntry::Detailed { name, .. } => name,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ModeEntry::Name(name) => name,
            ModeEntry::Detailed {
                name, display_name, ..
            } => display_name.as_deref().unwrap_or(name),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoCalibration {
    pub index: u8,
    pub pin: u8,
    pub min: u8,
    pub center: u8,
    pub max: u8,
    pub invert: bool,
}

/// Messages pushed by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Inbound {
    State(RuntimeState),
    Config(DeviceConfig),
    NetworkList {
        #[serde(default)]
        networks: Vec<ScanResult>,
    },
    Log {
        line: String,
    },
    LogHistory {
        #[serde(default)]
        lines: Vec<String>,
    },
    AvailableModes {
        #[serde(default)]
        modes: Vec<ModeEntry>,
    },
    AvailableImpulses {
        #[serde(default)]
        impulses: Vec<String>,
    },
    AdminState(AdminStatus),
    AdminBlocked {
        #[serde(default)]
        command: Option<String>,
    },
}

/// Commands sent to the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Outbound {
    GetConfig,
    SetWifiNetwork {
        index: u8,
        ssid: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    ClearWifiNetwork {
        index: u8,
    },
    SetApConfig {
        ssid_prefix: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    #[serde(rename = "setKeepAP")]
    SetKeepAp {
        enabled: bool,
    },
    SetWifiTiming {
        grace: u32,
        retries: u32,
        retry_delay: u32,
        ap_scan: u32,
        #[serde(rename = "keepAP")]
        keep_ap: bool,
    },
    SetMdns {
        enabled: bool,
        hostname: String,
    },
    SetLed {
        enabled: bool,
        pin: u8,
        brightness: u8,
    },
    SetDefaultMode {
        mode: String,
    },
    SetAutoBlink {
        enabled: bool,
    },
    SetRememberLastMode {
        enabled: bool,
    },
    SetMirrorPreview {
        enabled: bool,
    },
    SetBlinkInterval {
        min: u32,
        max: u32,
    },
    SetAutoImpulse {
        enabled: bool,
    },
    SetImpulseInterval {
        min: u32,
        max: u32,
    },
    SetImpulseSelection {
        selection: String,
    },
    SetGaze {
        x: f64,
        y: f64,
        z: f64,
    },
    SetLids {
        left: f64,
        right: f64,
    },
    SetCoupling {
        value: f64,
    },
    SetInvert {
        index: u8,
        invert: bool,
    },
    PreviewCalibration {
        index: u8,
        position: u8,
    },
    SaveAllCalibration {
        servos: Vec<ServoCalibration>,
    },
    CenterAll,
    AdminAuth {
        pin: String,
    },
    AdminLock,
    SetAdminPin {
        pin: String,
    },
    ClearAdminPin,
    GetAdminState,
    ScanNetworks,
    GetLogHistory,
    CheckForUpdate,
    SetUpdateCheckEnabled {
        enabled: bool,
    },
    SetUpdateCheckInterval {
        interval: u8,
    },
    ResetConnection,
    Reboot,
    FactoryReset,
    CenterEyes,
    Blink {
        duration: u32,
    },
    BlinkLeft {
        duration: u32,
    },
    BlinkRight {
        duration: u32,
    },
    SetMode {
        mode: String,
    },
    TriggerImpulse,
    SetAutoBlinkOverride {
        enabled: bool,
    },
    SetAutoImpulseOverride {
        enabled: bool,
    },
    PauseAutoBlink {
        paused: bool,
    },
    PauseModePlayer {
        paused: bool,
    },
    ReapplyEyeState,
}

impl Outbound {
    /// Commands the device refuses from a locked session.
    pub fn requires_admin(&self) -> bool {
        matches!(
            self,
            Outbound::SetWifiNetwork { .. }
                | Outbound::ClearWifiNetwork { .. }
                | Outbound::SetApConfig { .. }
                | Outbound::SetKeepAp { .. }
                | Outbound::SetWifiTiming { .. }
                | Outbound::SetMdns { .. }
                | Outbound::SetLed { .. }
                | Outbound::SetInvert { .. }
                | Outbound::SaveAllCalibration { .. }
                | Outbound::FactoryReset
                | Outbound::SetUpdateCheckEnabled { .. }
                | Outbound::SetUpdateCheckInterval { .. }
        )
    }

    /// Wire discriminant, as sent in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Outbound::GetConfig => "getConfig",
            Outbound::SetWifiNetwork { .. } => "setWifiNetwork",
            Outbound::ClearWifiNetwork { .. } => "clearWifiNetwork",
            Outbound::SetApConfig { .. } => "setApConfig",
            Outbound::SetKeepAp { .. } => "setKeepAP",
            Outbound::SetWifiTiming { .. } => "setWifiTiming",
            Outbound::SetMdns { .. } => "setMdns",
            Outbound::SetLed { .. } => "setLed",
            Outbound::SetDefaultMode { .. } => "setDefaultMode",
            Outbound::SetAutoBlink { .. } => "setAutoBlink",
            Outbound::SetRememberLastMode { .. } => "setRememberLastMode",
            Outbound::SetMirrorPreview { .. } => "setMirrorPreview",
            Outbound::SetBlinkInterval { .. } => "setBlinkInterval",
            Outbound::SetAutoImpulse { .. } => "setAutoImpulse",
            Outbound::SetImpulseInterval { .. } => "setImpulseInterval",
            Outbound::SetImpulseSelection { .. } => "setImpulseSelection",
            Outbound::SetGaze { .. } => "setGaze",
            Outbound::SetLids { .. } => "setLids",
            Outbound::SetCoupling { .. } => "setCoupling",
            Outbound::SetInvert { .. } => "setInvert",
            Outbound::PreviewCalibration { .. } => "previewCalibration",
            Outbound::SaveAllCalibration { .. } => "saveAllCalibration",
            Outbound::CenterAll => "centerAll",
            Outbound::AdminAuth { .. } => "adminAuth",
            Outbound::AdminLock => "adminLock",
            Outbound::SetAdminPin { .. } => "setAdminPin",
            Outbound::ClearAdminPin => "clearAdminPin",
            Outbound::GetAdminState => "getAdminState",
            Outbound::ScanNetworks => "scanNetworks",
            Outbound::GetLogHistory => "getLogHistory",
            Outbound::CheckForUpdate => "checkForUpdate",
            Outbound::SetUpdateCheckEnabled { .. } => "setUpdateCheckEnabled",
            Outbound::SetUpdateCheckInterval { .. } => "setUpdateCheckInterval",
            Outbound::ResetConnection => "resetConnection",
            Outbound::Reboot => "reboot",
            Outbound::FactoryReset => "factoryReset",
            Outbound::CenterEyes => "centerEyes",
            Outbound::Blink { .. } => "blink",
            Outbound::BlinkLeft { .. } => "blinkLeft",
            Outbound::BlinkRight { .. } => "blinkRight",
            Outbound::SetMode { .. } => "setMode",
            Outbound::TriggerImpulse => "triggerImpulse",
            Outbound::SetAutoBlinkOverride { .. } => "setAutoBlinkOverride",
            Outbound::SetAutoImpulseOverride { .. } => "setAutoImpulseOverride",
            Outbound::PauseAutoBlink { .. } => "pauseAutoBlink",
            Outbound::PauseModePlayer { .. } => "pauseModePlayer",
            Outbound::ReapplyEyeState => "reapplyEyeState",
        }
    }
}
