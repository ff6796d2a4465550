use std::{collections::BTreeSet, fmt, str::FromStr};

use animeyes_core::{
    DEFAULT_AP_SSID_PREFIX, DEFAULT_AUTO_BLINK, DEFAULT_AUTO_IMPULSE,
    DEFAULT_BLINK_INTERVAL_MAX_MS, DEFAULT_BLINK_INTERVAL_MIN_MS, DEFAULT_IMPULSE_INTERVAL_MAX_MS,
    DEFAULT_IMPULSE_INTERVAL_MIN_MS, DEFAULT_IMPULSE_SELECTION, DEFAULT_KEEP_AP,
    DEFAULT_LED_BRIGHTNESS, DEFAULT_LED_ENABLED, DEFAULT_LED_PIN, DEFAULT_MDNS_ENABLED,
    DEFAULT_MDNS_HOSTNAME, DEFAULT_MIRROR_PREVIEW, DEFAULT_MODE, DEFAULT_REMEMBER_LAST_MODE,
    DEFAULT_WIFI_AP_SCAN_MIN, DEFAULT_WIFI_GRACE_S, DEFAULT_WIFI_RETRIES,
    DEFAULT_WIFI_RETRY_DELAY_S, DeviceConfig, MIN_AP_PASSWORD_LEN, Outbound, WIFI_MAX_NETWORKS,
    join_selection, sanitize_hostname, selection_set,
};
use tracing::{debug, info};

use crate::{admin::AdminGuard, error::ActionError};

const DEVICE_ID_PLACEHOLDER: &str = "XXXXXX";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    WifiPrimary,
    WifiSecondary,
    Ap,
    WifiTiming,
    Mdns,
    Led,
    ModeSettings,
    ImpulseSettings,
}

impl Section {
    pub const ALL: [Section; 8] = [
        Section::WifiPrimary,
        Section::WifiSecondary,
        Section::Ap,
        Section::WifiTiming,
        Section::Mdns,
        Section::Led,
        Section::ModeSettings,
        Section::ImpulseSettings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Section::WifiPrimary => "wifiPrimary",
            Section::WifiSecondary => "wifiSecondary",
            Section::Ap => "ap",
            Section::WifiTiming => "wifiTiming",
            Section::Mdns => "mdns",
            Section::Led => "led",
            Section::ModeSettings => "modeSettings",
            Section::ImpulseSettings => "impulseSettings",
        }
    }

    fn network_slot(self) -> Option<usize> {
        match self {
            Section::WifiPrimary => Some(0),
            Section::WifiSecondary => Some(1),
            _ => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown config section {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WifiNetworkForm {
    pub ssid: String,
    /// Never echoed by the device; non-empty means "change it".
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApForm {
    pub ssid_prefix: String,
    pub password: String,
    pub keep_ap: bool,
}

/// Grace and retry delay in seconds, AP scan in minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiTimingForm {
    pub grace: String,
    pub retries: String,
    pub retry_delay: String,
    pub ap_scan: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdnsForm {
    pub enabled: bool,
    pub hostname: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedForm {
    pub enabled: bool,
    pub pin: String,
    pub brightness: String,
}

/// Blink intervals in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeForm {
    pub default_mode: String,
    pub auto_blink: bool,
    pub remember_last_mode: bool,
    pub mirror_preview: bool,
    pub blink_interval_min: String,
    pub blink_interval_max: String,
}

/// Impulse intervals are edited in seconds and sent in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpulseForm {
    pub auto_impulse: bool,
    pub interval_min_secs: String,
    pub interval_max_secs: String,
    pub selection: BTreeSet<String>,
}

/// One value bag covering every section, as bound to the input controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigForms {
    pub networks: [WifiNetworkForm; WIFI_MAX_NETWORKS],
    pub ap: ApForm,
    pub wifi_timing: WifiTimingForm,
    pub mdns: MdnsForm,
    pub led: LedForm,
    pub mode: ModeForm,
    pub impulse: ImpulseForm,
}

impl Default for ConfigForms {
    fn default() -> Self {
        Self::from_device(&DeviceConfig::default())
    }
}

fn or_default_number(value: Option<u32>, default: u32) -> String {
    value.filter(|v| *v != 0).unwrap_or(default).to_string()
}

fn or_default_text(value: Option<&str>, default: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_owned()
}

impl ConfigForms {
    /// Fills every field from a device answer, substituting the documented
    /// default for anything absent (or zero, as the device UI always has).
    pub fn from_device(config: &DeviceConfig) -> Self {
        let mut networks: [WifiNetworkForm; WIFI_MAX_NETWORKS] = Default::default();
        for slot in &config.networks {
            if let Some(form) = networks.get_mut(usize::from(slot.index)) {
                form.ssid = slot.ssid.clone();
            }
        }

        let timing = config.wifi_timing.clone().unwrap_or_default();
        let ap = config.ap.clone().unwrap_or_default();
        let mdns = config.mdns.clone().unwrap_or_default();
        let led = config.led.clone().unwrap_or_default();
        let mode = config.mode.clone().unwrap_or_default();
        let impulse = config.impulse.clone().unwrap_or_default();

        Self {
            networks,
            ap: ApForm {
                ssid_prefix: or_default_text(ap.ssid_prefix.as_deref(), DEFAULT_AP_SSID_PREFIX),
                password: String::new(),
                keep_ap: timing.keep_ap.unwrap_or(DEFAULT_KEEP_AP),
            },
            wifi_timing: WifiTimingForm {
                grace: or_default_number(timing.grace, DEFAULT_WIFI_GRACE_S),
                retries: or_default_number(timing.retries, DEFAULT_WIFI_RETRIES),
                retry_delay: or_default_number(timing.retry_delay, DEFAULT_WIFI_RETRY_DELAY_S),
                ap_scan: or_default_number(timing.ap_scan, DEFAULT_WIFI_AP_SCAN_MIN),
            },
            mdns: MdnsForm {
                enabled: mdns.enabled.unwrap_or(DEFAULT_MDNS_ENABLED),
                hostname: or_default_text(mdns.hostname.as_deref(), DEFAULT_MDNS_HOSTNAME),
            },
            led: LedForm {
                enabled: led.enabled.unwrap_or(DEFAULT_LED_ENABLED),
                pin: or_default_number(led.pin.map(u32::from), u32::from(DEFAULT_LED_PIN)),
                brightness: or_default_number(
                    led.brightness.map(u32::from),
                    u32::from(DEFAULT_LED_BRIGHTNESS),
                ),
            },
            mode: ModeForm {
                default_mode: or_default_text(mode.default_mode.as_deref(), DEFAULT_MODE),
                auto_blink: mode.auto_blink.unwrap_or(DEFAULT_AUTO_BLINK),
                remember_last_mode: mode.remember_last_mode.unwrap_or(DEFAULT_REMEMBER_LAST_MODE),
                mirror_preview: mode.mirror_preview.unwrap_or(DEFAULT_MIRROR_PREVIEW),
                blink_interval_min: or_default_number(
                    mode.blink_interval_min,
                    DEFAULT_BLINK_INTERVAL_MIN_MS,
                ),
                blink_interval_max: or_default_number(
                    mode.blink_interval_max,
                    DEFAULT_BLINK_INTERVAL_MAX_MS,
                ),
            },
            impulse: ImpulseForm {
                auto_impulse: impulse.auto_impulse.unwrap_or(DEFAULT_AUTO_IMPULSE),
                interval_min_secs: or_default_number(
                    impulse.impulse_interval_min.map(|ms| ms / 1000),
                    DEFAULT_IMPULSE_INTERVAL_MIN_MS / 1000,
                ),
                interval_max_secs: or_default_number(
                    impulse.impulse_interval_max.map(|ms| ms / 1000),
                    DEFAULT_IMPULSE_INTERVAL_MAX_MS / 1000,
                ),
                selection: selection_set(
                    impulse
                        .impulse_selection
                        .as_deref()
                        .unwrap_or(DEFAULT_IMPULSE_SELECTION),
                ),
            },
        }
    }

    fn text_mut(&mut self, section: Section, key: &str) -> Option<&mut String> {
        if let Some(slot) = section.network_slot() {
            let form = &mut self.networks[slot];
            return match key {
                "ssid" => Some(&mut form.ssid),
                "password" => Some(&mut form.password),
                _ => None,
            };
        }
        match (section, key) {
            (Section::Ap, "ssidPrefix") => Some(&mut self.ap.ssid_prefix),
            (Section::Ap, "password") => Some(&mut self.ap.password),
            (Section::WifiTiming, "grace") => Some(&mut self.wifi_timing.grace),
            (Section::WifiTiming, "retries") => Some(&mut self.wifi_timing.retries),
            (Section::WifiTiming, "retryDelay") => Some(&mut self.wifi_timing.retry_delay),
            (Section::WifiTiming, "apScan") => Some(&mut self.wifi_timing.ap_scan),
            (Section::Mdns, "hostname") => Some(&mut self.mdns.hostname),
            (Section::Led, "pin") => Some(&mut self.led.pin),
            (Section::Led, "brightness") => Some(&mut self.led.brightness),
            (Section::ModeSettings, "defaultMode") => Some(&mut self.mode.default_mode),
            (Section::ModeSettings, "blinkIntervalMin") => Some(&mut self.mode.blink_interval_min),
            (Section::ModeSettings, "blinkIntervalMax") => Some(&mut self.mode.blink_interval_max),
            (Section::ImpulseSettings, "impulseIntervalMin") => {
                Some(&mut self.impulse.interval_min_secs)
            }
            (Section::ImpulseSettings, "impulseIntervalMax") => {
                Some(&mut self.impulse.interval_max_secs)
            }
            _ => None,
        }
    }

    fn flag_mut(&mut self, section: Section, key: &str) -> Option<&mut bool> {
        match (section, key) {
            (Section::Ap, "keepAP") => Some(&mut self.ap.keep_ap),
            (Section::Mdns, "enabled") => Some(&mut self.mdns.enabled),
            (Section::Led, "enabled") => Some(&mut self.led.enabled),
            (Section::ModeSettings, "autoBlink") => Some(&mut self.mode.auto_blink),
            (Section::ModeSettings, "rememberLastMode") => Some(&mut self.mode.remember_last_mode),
            (Section::ModeSettings, "mirrorPreview") => Some(&mut self.mode.mirror_preview),
            (Section::ImpulseSettings, "autoImpulse") => Some(&mut self.impulse.auto_impulse),
            _ => None,
        }
    }

    fn copy_section(&mut self, from: &ConfigForms, section: Section) {
        match section {
            Section::WifiPrimary | Section::WifiSecondary => {
                if let Some(slot) = section.network_slot() {
                    self.networks[slot] = from.networks[slot].clone();
                }
            }
            Section::Ap => self.ap = from.ap.clone(),
            Section::WifiTiming => self.wifi_timing = from.wifi_timing.clone(),
            Section::Mdns => self.mdns = from.mdns.clone(),
            Section::Led => self.led = from.led.clone(),
            Section::ModeSettings => self.mode = from.mode.clone(),
            Section::ImpulseSettings => self.impulse = from.impulse.clone(),
        }
    }
}

/// Numeric fields compare as integers; text that does not parse is a change.
fn number_differs(working: &str, saved: &str) -> bool {
    match (working.trim().parse::<u32>(), saved.trim().parse::<u32>()) {
        (Ok(a), Ok(b)) => a != b,
        _ => true,
    }
}

/// Empty or zero falls back to the default; anything else must parse.
fn parse_number(field: &'static str, text: &str, default: u32) -> Result<u32, ActionError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(default);
    }
    match text.parse::<u32>() {
        Ok(0) => Ok(default),
        Ok(value) => Ok(value),
        Err(_) => Err(ActionError::InvalidNumber { field }),
    }
}

fn parse_u8(field: &'static str, text: &str, default: u8) -> Result<u8, ActionError> {
    let value = parse_number(field, text, u32::from(default))?;
    u8::try_from(value).map_err(|_| ActionError::InvalidNumber { field })
}

/// Working and saved copies of the device configuration.
///
/// `working` follows the input controls, `saved` is the last state the
/// device is believed to hold. A save sends the section and then commits
/// `saved <- working` right away without waiting for an acknowledgement.
#[derive(Debug, Default)]
pub struct ConfigStore {
    working: ConfigForms,
    saved: ConfigForms,
    configured: [bool; WIFI_MAX_NETWORKS],
    ap_has_password: bool,
    loaded: bool,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn working(&self) -> &ConfigForms {
        &self.working
    }

    pub fn saved(&self) -> &ConfigForms {
        &self.saved
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_network_configured(&self, index: usize) -> bool {
        self.configured.get(index).copied().unwrap_or(false)
    }

    pub fn ap_has_password(&self) -> bool {
        self.ap_has_password
    }

    pub fn mirror_preview(&self) -> bool {
        self.saved.mode.mirror_preview
    }

    pub fn fetch(&self) -> Outbound {
        Outbound::GetConfig
    }

    /// Device answer to `getConfig`: both copies become the answer.
    pub fn apply_fetched(&mut self, config: &DeviceConfig) {
        let forms = ConfigForms::from_device(config);
        self.working = forms.clone();
        self.saved = forms;
        self.configured = [false; WIFI_MAX_NETWORKS];
        for slot in &config.networks {
            if let Some(flag) = self.configured.get_mut(usize::from(slot.index)) {
                *flag = slot.configured;
            }
        }
        self.ap_has_password = config.ap.as_ref().is_some_and(|ap| ap.has_password);
        self.loaded = true;
        info!("configuration loaded");
    }

    pub fn set_field(
        &mut self,
        section: Section,
        key: &str,
        value: FieldValue,
    ) -> Result<(), ActionError> {
        if section == Section::ImpulseSettings && key == "impulseSelection" {
            let FieldValue::Text(text) = value else {
                return Err(ActionError::FieldType {
                    key: key.to_owned(),
                    expected: "text",
                });
            };
            self.working.impulse.selection = selection_set(&text);
            return Ok(());
        }

        match value {
            FieldValue::Text(text) => {
                if let Some(field) = self.working.text_mut(section, key) {
                    *field = text;
                    return Ok(());
                }
                if self.working.flag_mut(section, key).is_some() {
                    return Err(ActionError::FieldType {
                        key: key.to_owned(),
                        expected: "flag",
                    });
                }
            }
            FieldValue::Flag(flag) => {
                if let Some(field) = self.working.flag_mut(section, key) {
                    *field = flag;
                    return Ok(());
                }
                if self.working.text_mut(section, key).is_some() {
                    return Err(ActionError::FieldType {
                        key: key.to_owned(),
                        expected: "text",
                    });
                }
            }
        }
        Err(ActionError::UnknownField {
            section: section.name(),
            key: key.to_owned(),
        })
    }

    pub fn toggle_impulse(&mut self, name: &str, selected: bool) {
        if selected {
            self.working.impulse.selection.insert(name.to_owned());
        } else {
            self.working.impulse.selection.remove(name);
        }
    }

    /// Copies a scan result into a network slot.
    pub fn pick_network(&mut self, index: usize, ssid: &str) -> Result<(), ActionError> {
        let form = self
            .working
            .networks
            .get_mut(index)
            .ok_or(ActionError::UnknownNetworkSlot(index))?;
        form.ssid = ssid.to_owned();
        form.password.clear();
        Ok(())
    }

    pub fn is_dirty(&self, section: Section) -> bool {
        let (w, s) = (&self.working, &self.saved);
        match section {
            Section::WifiPrimary | Section::WifiSecondary => {
                let slot = section.network_slot().unwrap_or_default();
                let (w, s) = (&w.networks[slot], &s.networks[slot]);
                w.ssid != s.ssid || !w.password.is_empty()
            }
            Section::Ap => {
                w.ap.ssid_prefix != s.ap.ssid_prefix
                    || !w.ap.password.is_empty()
                    || w.ap.keep_ap != s.ap.keep_ap
            }
            Section::WifiTiming => {
                let (w, s) = (&w.wifi_timing, &s.wifi_timing);
                number_differs(&w.grace, &s.grace)
                    || number_differs(&w.retries, &s.retries)
                    || number_differs(&w.retry_delay, &s.retry_delay)
                    || number_differs(&w.ap_scan, &s.ap_scan)
            }
            Section::Mdns => w.mdns != s.mdns,
            Section::Led => {
                w.led.enabled != s.led.enabled
                    || number_differs(&w.led.pin, &s.led.pin)
                    || number_differs(&w.led.brightness, &s.led.brightness)
            }
            Section::ModeSettings => {
                let (w, s) = (&w.mode, &s.mode);
                w.default_mode != s.default_mode
                    || w.auto_blink != s.auto_blink
                    || w.remember_last_mode != s.remember_last_mode
                    || w.mirror_preview != s.mirror_preview
                    || number_differs(&w.blink_interval_min, &s.blink_interval_min)
                    || number_differs(&w.blink_interval_max, &s.blink_interval_max)
            }
            Section::ImpulseSettings => {
                let (w, s) = (&w.impulse, &s.impulse);
                w.auto_impulse != s.auto_impulse
                    || number_differs(&w.interval_min_secs, &s.interval_min_secs)
                    || number_differs(&w.interval_max_secs, &s.interval_max_secs)
                    || w.selection != s.selection
            }
        }
    }

    pub fn dirty_sections(&self) -> Vec<Section> {
        Section::ALL
            .into_iter()
            .filter(|section| self.is_dirty(*section))
            .collect()
    }

    pub fn revert(&mut self, section: Section) {
        self.working.copy_section(&self.saved, section);
    }

    /// Validates the section, returns the commands that persist it and
    /// commits `saved <- working`. Nothing changes on error.
    pub fn save(
        &mut self,
        section: Section,
        admin: &AdminGuard,
    ) -> Result<Vec<Outbound>, ActionError> {
        admin.check_save()?;

        let commands = match section {
            Section::WifiPrimary | Section::WifiSecondary => {
                let slot = section.network_slot().unwrap_or_default();
                let form = &self.working.networks[slot];
                let ssid = form.ssid.trim().to_owned();
                if ssid.is_empty() {
                    return Err(ActionError::SsidRequired);
                }
                let password = (!form.password.is_empty()).then(|| form.password.clone());
                self.working.networks[slot] = WifiNetworkForm {
                    ssid: ssid.clone(),
                    password: String::new(),
                };
                self.configured[slot] = true;
                vec![Outbound::SetWifiNetwork {
                    index: slot as u8,
                    ssid,
                    password,
                }]
            }
            Section::Ap => {
                let form = &self.working.ap;
                let prefix = or_default_text(Some(form.ssid_prefix.trim()), DEFAULT_AP_SSID_PREFIX);
                let password = form.password.clone();
                if !password.is_empty() && password.chars().count() < MIN_AP_PASSWORD_LEN {
                    return Err(ActionError::ApPasswordTooShort);
                }
                let keep_ap = form.keep_ap;
                if !password.is_empty() {
                    self.ap_has_password = true;
                }
                self.working.ap = ApForm {
                    ssid_prefix: prefix.clone(),
                    password: String::new(),
                    keep_ap,
                };
                vec![
                    Outbound::SetApConfig {
                        ssid_prefix: prefix,
                        password: (!password.is_empty()).then_some(password),
                    },
                    Outbound::SetKeepAp { enabled: keep_ap },
                ]
            }
            Section::WifiTiming => {
                let form = &self.working.wifi_timing;
                let grace = parse_number("grace", &form.grace, DEFAULT_WIFI_GRACE_S)?;
                let retries = parse_number("retries", &form.retries, DEFAULT_WIFI_RETRIES)?;
                let retry_delay =
                    parse_number("retryDelay", &form.retry_delay, DEFAULT_WIFI_RETRY_DELAY_S)?;
                let ap_scan = parse_number("apScan", &form.ap_scan, DEFAULT_WIFI_AP_SCAN_MIN)?;
                self.working.wifi_timing = WifiTimingForm {
                    grace: grace.to_string(),
                    retries: retries.to_string(),
                    retry_delay: retry_delay.to_string(),
                    ap_scan: ap_scan.to_string(),
                };
                vec![Outbound::SetWifiTiming {
                    grace,
                    retries,
                    retry_delay,
                    ap_scan,
                    keep_ap: self.saved.ap.keep_ap,
                }]
            }
            Section::Mdns => {
                let enabled = self.working.mdns.enabled;
                let hostname = sanitize_hostname(&self.working.mdns.hostname);
                self.working.mdns.hostname = hostname.clone();
                vec![Outbound::SetMdns { enabled, hostname }]
            }
            Section::Led => {
                let form = &self.working.led;
                let enabled = form.enabled;
                let pin = parse_u8("pin", &form.pin, DEFAULT_LED_PIN)?;
                let brightness = parse_u8("brightness", &form.brightness, DEFAULT_LED_BRIGHTNESS)?;
                self.working.led.pin = pin.to_string();
                self.working.led.brightness = brightness.to_string();
                vec![Outbound::SetLed {
                    enabled,
                    pin,
                    brightness,
                }]
            }
            Section::ModeSettings => {
                let form = &self.working.mode;
                let min = parse_number(
                    "blinkIntervalMin",
                    &form.blink_interval_min,
                    DEFAULT_BLINK_INTERVAL_MIN_MS,
                )?;
                let max = parse_number(
                    "blinkIntervalMax",
                    &form.blink_interval_max,
                    DEFAULT_BLINK_INTERVAL_MAX_MS,
                )?;
                if min > max {
                    return Err(ActionError::IntervalOrder);
                }
                let mode = or_default_text(Some(form.default_mode.trim()), DEFAULT_MODE);
                let commands = vec![
                    Outbound::SetDefaultMode { mode: mode.clone() },
                    Outbound::SetAutoBlink {
                        enabled: form.auto_blink,
                    },
                    Outbound::SetRememberLastMode {
                        enabled: form.remember_last_mode,
                    },
                    Outbound::SetMirrorPreview {
                        enabled: form.mirror_preview,
                    },
                    Outbound::SetBlinkInterval { min, max },
                ];
                self.working.mode.default_mode = mode;
                self.working.mode.blink_interval_min = min.to_string();
                self.working.mode.blink_interval_max = max.to_string();
                commands
            }
            Section::ImpulseSettings => {
                let form = &self.working.impulse;
                let min = parse_number(
                    "impulseIntervalMin",
                    &form.interval_min_secs,
                    DEFAULT_IMPULSE_INTERVAL_MIN_MS / 1000,
                )?
                .saturating_mul(1000);
                let max = parse_number(
                    "impulseIntervalMax",
                    &form.interval_max_secs,
                    DEFAULT_IMPULSE_INTERVAL_MAX_MS / 1000,
                )?
                .saturating_mul(1000);
                if min > max {
                    return Err(ActionError::IntervalOrder);
                }
                let commands = vec![
                    Outbound::SetAutoImpulse {
                        enabled: form.auto_impulse,
                    },
                    Outbound::SetImpulseInterval { min, max },
                    Outbound::SetImpulseSelection {
                        selection: join_selection(&form.selection),
                    },
                ];
                self.working.impulse.interval_min_secs = (min / 1000).to_string();
                self.working.impulse.interval_max_secs = (max / 1000).to_string();
                commands
            }
        };

        self.saved.copy_section(&self.working, section);
        debug!(%section, count = commands.len(), "section saved");
        Ok(commands)
    }

    /// Forgets a stored network; both copies of the slot are cleared.
    pub fn forget_network(
        &mut self,
        index: usize,
        admin: &AdminGuard,
    ) -> Result<Outbound, ActionError> {
        admin.check_save()?;
        if index >= WIFI_MAX_NETWORKS {
            return Err(ActionError::UnknownNetworkSlot(index));
        }
        self.working.networks[index] = WifiNetworkForm::default();
        self.saved.networks[index] = WifiNetworkForm::default();
        self.configured[index] = false;
        Ok(Outbound::ClearWifiNetwork { index: index as u8 })
    }

    /// With remember-last-mode checked, device-driven mode changes become the
    /// default in both copies so the section does not go dirty.
    pub fn follow_current_mode(&mut self, current: &str) {
        if !self.working.mode.remember_last_mode || current.is_empty() {
            return;
        }
        self.working.mode.default_mode = current.to_owned();
        self.saved.mode.default_mode = current.to_owned();
    }

    pub fn ap_name_hint(&self, device_id: &str) -> String {
        let prefix = or_default_text(
            Some(self.working.ap.ssid_prefix.trim()),
            DEFAULT_AP_SSID_PREFIX,
        );
        format!("{prefix}-{}", device_id_or_placeholder(device_id))
    }

    pub fn mdns_name_hint(&self, device_id: &str) -> String {
        format!(
            "{}-{}.local",
            sanitize_hostname(&self.working.mdns.hostname),
            device_id_or_placeholder(device_id)
        )
    }
}

fn device_id_or_placeholder(device_id: &str) -> &str {
    if device_id.is_empty() {
        DEVICE_ID_PLACEHOLDER
    } else {
        device_id
    }
}
