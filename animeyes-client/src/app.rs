use std::{fmt, str::FromStr, time::Instant};

use animeyes_core::{
    Inbound, ModeEntry, NUM_SERVOS, Outbound, RuntimeState, ScanResult, decode_inbound,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    admin::{AccessMode, AdminGuard, PinOutcome},
    calibration::CalibrationStore,
    config_store::{ConfigStore, FieldValue, Section},
    console::Console,
    dispatcher::Dispatcher,
    error::ActionError,
    locks::{BLINK_PREVIEW_DURATION, Gesture, InteractionLocks, LockState},
    projection::{ControlValues, project},
    settings::ClientSettings,
    upload::{UploadOutcome, UploadTracker},
};

const GAZE_RANGE: (i32, i32) = (-100, 100);
const DEPTH_RANGE: (i32, i32) = (0, 100);
const LID_RANGE: (i32, i32) = (-100, 100);
const COUPLING_RANGE: (i32, i32) = (-100, 100);
/// 0 boot only, 1 daily, 2 weekly.
const MAX_UPDATE_INTERVAL: u8 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Control,
    Calibration,
    Configuration,
    Console,
    System,
}

impl Tab {
    pub fn name(self) -> &'static str {
        match self {
            Tab::Control => "control",
            Tab::Calibration => "calibration",
            Tab::Configuration => "configuration",
            Tab::Console => "console",
            Tab::System => "system",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Tab::Control,
            Tab::Calibration,
            Tab::Configuration,
            Tab::Console,
            Tab::System,
        ]
        .into_iter()
        .find(|tab| tab.name().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| format!("unknown tab {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LidSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkTarget {
    Both,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A toast-style message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Everything a user can ask the controller to do.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    EnterTab(Tab),
    BeginGesture(Gesture),
    EndGesture(Gesture),
    Gaze { x: i32, y: i32 },
    Depth(i32),
    Lid { side: LidSide, value: i32 },
    Coupling(i32),
    SetLidLink(bool),
    Blink(BlinkTarget),
    SelectMode(String),
    CenterEyes,
    TriggerImpulse,
    AutoBlinkOverride(bool),
    AutoImpulseOverride(bool),

    SetField {
        section: Section,
        key: String,
        value: FieldValue,
    },
    ToggleImpulse { name: String, selected: bool },
    SaveSection(Section),
    RevertSection(Section),
    ForgetNetwork(usize),
    ScanNetworks,
    PickNetwork { index: usize, ssid: String },

    AdjustMin { index: usize, delta: i32 },
    AdjustMax { index: usize, delta: i32 },
    SetCenter { index: usize, value: i32 },
    TestPosition { index: usize, value: i32 },
    SetInvert { index: usize, invert: bool },
    SetServoPin { index: usize, pin: i32 },
    ResetCalibration,
    SaveCalibration,
    CenterAll,

    Unlock(String),
    LockAdmin,
    SetAdminPin(String),
    ClearAdminPin,
    RefreshAdmin,

    Reboot,
    FactoryReset,
    ResetConnection,
    CheckForUpdate,
    SetUpdateCheckEnabled(bool),
    SetUpdateCheckInterval(u8),

    UploadStarted,
    UploadProgress { sent: u64, total: u64 },
    UploadResponse { status: u16, body: String },
    UploadTransportError,
}

pub fn inbound_kind(message: &Inbound) -> &'static str {
    match message {
        Inbound::State(_) => "state",
        Inbound::Config(_) => "config",
        Inbound::NetworkList { .. } => "networkList",
        Inbound::Log { .. } => "log",
        Inbound::LogHistory { .. } => "logHistory",
        Inbound::AvailableModes { .. } => "availableModes",
        Inbound::AvailableImpulses { .. } => "availableImpulses",
        Inbound::AdminState(_) => "adminState",
        Inbound::AdminBlocked { .. } => "adminBlocked",
    }
}

/// The controller's single owner of state.
///
/// Every component lives here and is only reached through `&mut self`, so a
/// broadcast's projection and a gesture's lock update can never interleave.
/// Outbound commands accumulate in the dispatcher until the driver takes them.
#[derive(Debug)]
pub struct AppContext {
    state: Option<RuntimeState>,
    config: ConfigStore,
    calibration: CalibrationStore,
    locks: InteractionLocks,
    admin: AdminGuard,
    dispatcher: Dispatcher,
    console: Console,
    upload: UploadTracker,
    controls: ControlValues,
    last_locks: LockState,
    notices: Vec<Notice>,
    modes: Vec<ModeEntry>,
    impulses: Vec<String>,
    networks: Vec<ScanResult>,
    lid_link: bool,
    tab: Tab,
    connected: bool,
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new(&ClientSettings::default())
    }
}

impl AppContext {
    pub fn new(settings: &ClientSettings) -> Self {
        Self {
            state: None,
            config: ConfigStore::new(),
            calibration: CalibrationStore::new(),
            locks: InteractionLocks::new(),
            admin: AdminGuard::new(),
            dispatcher: Dispatcher::default(),
            console: Console::default(),
            upload: UploadTracker::new(),
            controls: ControlValues::default(),
            last_locks: LockState::default(),
            notices: Vec::new(),
            modes: Vec::new(),
            impulses: Vec::new(),
            networks: Vec::new(),
            lid_link: settings.lid_link,
            tab: settings.active_tab,
            connected: false,
        }
    }

    pub fn state(&self) -> Option<&RuntimeState> {
        self.state.as_ref()
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    pub fn admin(&self) -> &AdminGuard {
        &self.admin
    }

    pub fn access_mode(&self) -> AccessMode {
        self.admin.mode()
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn upload(&self) -> &UploadTracker {
        &self.upload
    }

    pub fn controls(&self) -> &ControlValues {
        &self.controls
    }

    pub fn lock_state(&self, now: Instant) -> LockState {
        self.locks.snapshot(now)
    }

    pub fn modes(&self) -> &[ModeEntry] {
        &self.modes
    }

    pub fn impulses(&self) -> &[String] {
        &self.impulses
    }

    pub fn networks(&self) -> &[ScanResult] {
        &self.networks
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn lid_link(&self) -> bool {
        self.lid_link
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Settings worth keeping across runs.
    pub fn settings(&self, device_url: &str) -> ClientSettings {
        ClientSettings {
            device_url: Some(device_url.to_owned()),
            active_tab: self.tab,
            lid_link: self.lid_link,
        }
    }

    /// Display hints for the configuration forms.
    pub fn ap_name_hint(&self) -> String {
        self.config.ap_name_hint(self.device_id())
    }

    pub fn mdns_name_hint(&self) -> String {
        self.config.mdns_name_hint(self.device_id())
    }

    fn device_id(&self) -> &str {
        self.state
            .as_ref()
            .map(|state| state.system.device_id.as_str())
            .unwrap_or_default()
    }

    /// Nothing is queued across a reconnect, so forms are refreshed on every
    /// open and any pause the device held is forgotten.
    pub fn on_connected(&mut self, now: Instant) {
        self.connected = true;
        self.locks.reset_player_hold();
        self.dispatcher.send(self.config.fetch());
        if self.tab == Tab::Calibration {
            self.dispatcher.send(Outbound::PauseAutoBlink { paused: true });
        }
        self.reproject(now);
    }

    pub fn on_disconnected(&mut self) {
        self.connected = false;
    }

    /// Decodes and applies one text frame. Malformed frames are logged and
    /// dropped; the returned kind is `None` for them.
    pub fn handle_text(&mut self, text: &str, now: Instant) -> Option<&'static str> {
        match decode_inbound(text) {
            Ok(message) => {
                let kind = inbound_kind(&message);
                self.handle_inbound(message, now);
                Some(kind)
            }
            Err(err) => {
                warn!(len = text.len(), "dropping malformed message: {err}");
                None
            }
        }
    }

    pub fn handle_inbound(&mut self, message: Inbound, now: Instant) {
        match message {
            Inbound::State(state) => {
                self.calibration.seed_from(&state.servos);
                self.config.follow_current_mode(&state.mode.current);
                self.state = Some(state);
                self.reproject(now);
            }
            Inbound::Config(config) => self.config.apply_fetched(&config),
            Inbound::NetworkList { mut networks } => {
                networks.sort_by(|a, b| b.rssi.cmp(&a.rssi));
                debug!(count = networks.len(), "scan results");
                self.networks = networks;
            }
            Inbound::Log { line } => self.console.push(line),
            Inbound::LogHistory { lines } => self.console.replace(lines),
            Inbound::AvailableModes { modes } => self.modes = modes,
            Inbound::AvailableImpulses { impulses } => self.impulses = impulses,
            Inbound::AdminState(status) => {
                match self.admin.apply_server_state(status, now) {
                    Some(PinOutcome::Unlocked) => {
                        self.notices.push(Notice::success("Admin unlocked"))
                    }
                    Some(PinOutcome::RateLimited { seconds }) => self.notices.push(Notice::error(
                        ActionError::RateLimited { seconds }.to_string(),
                    )),
                    Some(PinOutcome::Incorrect) => self.notices.push(Notice::error("Incorrect PIN")),
                    None => {}
                }
            }
            Inbound::AdminBlocked { command } => {
                warn!(command = command.as_deref().unwrap_or("unknown"), "device refused command");
                let message = match command {
                    Some(command) => format!("{} ({command})", ActionError::ActionLocked),
                    None => ActionError::ActionLocked.to_string(),
                };
                self.notices.push(Notice::error(message));
            }
        }
    }

    fn reproject(&mut self, now: Instant) {
        let locks = self.locks.snapshot(now);
        self.last_locks = locks;
        if let Some(state) = &self.state {
            self.controls = project(state, &locks, &self.controls, self.config.mirror_preview());
        }
    }

    /// Applies a user intent. A refusal is also recorded as a notice.
    pub fn apply(&mut self, command: ClientCommand, now: Instant) -> Result<(), ActionError> {
        let result = self.dispatch_command(command, now);
        if let Err(err) = &result {
            info!("action refused: {err}");
            self.notices.push(Notice::error(err.to_string()));
        }
        result
    }

    fn dispatch_command(&mut self, command: ClientCommand, now: Instant) -> Result<(), ActionError> {
        match command {
            ClientCommand::EnterTab(tab) => self.enter_tab(tab),
            ClientCommand::BeginGesture(gesture) => self.begin_gesture(gesture, now),
            ClientCommand::EndGesture(gesture) => self.end_gesture(gesture, now),
            ClientCommand::Gaze { x, y } => self.move_gaze(x, y, now),
            ClientCommand::Depth(z) => self.set_depth(z, now),
            ClientCommand::Lid { side, value } => self.move_lid(side, value, now),
            ClientCommand::Coupling(value) => self.set_coupling(value, now),
            ClientCommand::SetLidLink(enabled) => self.lid_link = enabled,
            ClientCommand::Blink(target) => self.blink(target, now),
            ClientCommand::SelectMode(mode) => self.select_mode(mode, now),
            ClientCommand::CenterEyes => self.dispatcher.send(Outbound::CenterEyes),
            ClientCommand::TriggerImpulse => return self.trigger_impulse(),
            ClientCommand::AutoBlinkOverride(enabled) => {
                self.ensure_manual_mode()?;
                self.dispatcher
                    .send(Outbound::SetAutoBlinkOverride { enabled });
            }
            ClientCommand::AutoImpulseOverride(enabled) => {
                self.ensure_manual_mode()?;
                self.dispatcher
                    .send(Outbound::SetAutoImpulseOverride { enabled });
            }

            ClientCommand::SetField {
                section,
                key,
                value,
            } => return self.config.set_field(section, &key, value),
            ClientCommand::ToggleImpulse { name, selected } => {
                self.config.toggle_impulse(&name, selected)
            }
            ClientCommand::SaveSection(section) => return self.save_section(section),
            ClientCommand::RevertSection(section) => self.config.revert(section),
            ClientCommand::ForgetNetwork(index) => {
                let command = self.config.forget_network(index, &self.admin)?;
                self.dispatcher.send(command);
            }
            ClientCommand::ScanNetworks => self.dispatcher.send(Outbound::ScanNetworks),
            ClientCommand::PickNetwork { index, ssid } => {
                return self.config.pick_network(index, &ssid);
            }

            ClientCommand::AdjustMin { index, delta } => {
                let preview = self.calibration.adjust_min(index, delta)?;
                self.dispatcher.send(preview);
            }
            ClientCommand::AdjustMax { index, delta } => {
                let preview = self.calibration.adjust_max(index, delta)?;
                self.dispatcher.send(preview);
            }
            ClientCommand::SetCenter { index, value } => {
                let position = self.calibration.set_center(index, value)?;
                self.dispatcher.preview(index as u8, position, now);
            }
            ClientCommand::TestPosition { index, value } => {
                let position = self.calibration.test_position(index, value)?;
                self.dispatcher.preview(index as u8, position, now);
            }
            ClientCommand::SetInvert { index, invert } => {
                if index >= NUM_SERVOS {
                    return Err(ActionError::UnknownServo(index));
                }
                self.admin.check_command(&Outbound::SetInvert {
                    index: index as u8,
                    invert,
                })?;
                let command = self.calibration.set_invert(index, invert)?;
                self.dispatcher.send(command);
            }
            ClientCommand::SetServoPin { index, pin } => {
                return self.calibration.set_pin(index, pin);
            }
            ClientCommand::ResetCalibration => {
                self.calibration.reset_to_factory_defaults()?;
                self.notices.push(Notice::info(
                    "Calibration reset to factory defaults, save to apply",
                ));
            }
            ClientCommand::SaveCalibration => {
                let command = self.calibration.save_all(&self.admin)?;
                self.dispatcher.send(command);
                self.notices.push(Notice::success("Calibration saved"));
            }
            ClientCommand::CenterAll => self.dispatcher.send(Outbound::CenterAll),

            ClientCommand::Unlock(pin) => {
                let command = self.admin.request_unlock(&pin)?;
                self.dispatcher.send(command);
            }
            ClientCommand::LockAdmin => {
                let command = self.admin.lock()?;
                self.dispatcher.send(command);
            }
            ClientCommand::SetAdminPin(pin) => {
                let command = self.admin.set_pin(&pin)?;
                self.dispatcher.send(command);
            }
            ClientCommand::ClearAdminPin => {
                let command = self.admin.clear_pin()?;
                self.dispatcher.send(command);
            }
            ClientCommand::RefreshAdmin => self.dispatcher.send(self.admin.refresh()),

            ClientCommand::Reboot => {
                self.admin.check_reboot()?;
                self.dispatcher.send(Outbound::Reboot);
            }
            ClientCommand::FactoryReset => return self.send_guarded(Outbound::FactoryReset),
            ClientCommand::ResetConnection => self.dispatcher.send(Outbound::ResetConnection),
            ClientCommand::CheckForUpdate => self.dispatcher.send(Outbound::CheckForUpdate),
            ClientCommand::SetUpdateCheckEnabled(enabled) => {
                return self.send_guarded(Outbound::SetUpdateCheckEnabled { enabled });
            }
            ClientCommand::SetUpdateCheckInterval(interval) => {
                if interval > MAX_UPDATE_INTERVAL {
                    return Err(ActionError::InvalidNumber { field: "interval" });
                }
                return self.send_guarded(Outbound::SetUpdateCheckInterval { interval });
            }

            ClientCommand::UploadStarted => self.upload.start(),
            ClientCommand::UploadProgress { sent, total } => self.upload.progress(sent, total, now),
            ClientCommand::UploadResponse { status, body } => {
                let outcome = self.upload.response(status, &body, now);
                self.report_upload(outcome);
            }
            ClientCommand::UploadTransportError => {
                let outcome = self.upload.transport_error(now);
                self.report_upload(outcome);
            }
        }
        Ok(())
    }

    fn send_guarded(&mut self, command: Outbound) -> Result<(), ActionError> {
        self.admin.check_command(&command)?;
        self.dispatcher.send(command);
        Ok(())
    }

    fn report_upload(&mut self, outcome: Option<UploadOutcome>) {
        match outcome {
            Some(UploadOutcome::Success) => self
                .notices
                .push(Notice::success("Upload complete, device is rebooting")),
            Some(UploadOutcome::Failure(message)) => {
                self.notices
                    .push(Notice::error(format!("Upload failed: {message}")))
            }
            None => {}
        }
    }

    fn enter_tab(&mut self, tab: Tab) {
        let previous = self.tab;
        if previous == tab {
            return;
        }
        if previous == Tab::Calibration {
            self.dispatcher
                .send(Outbound::PauseAutoBlink { paused: false });
            if tab == Tab::Control {
                self.dispatcher.send(Outbound::ReapplyEyeState);
            }
        }
        match tab {
            Tab::Calibration => self.dispatcher.send(Outbound::PauseAutoBlink { paused: true }),
            Tab::Configuration => self.dispatcher.send(self.config.fetch()),
            Tab::Console => self.dispatcher.send(Outbound::GetLogHistory),
            Tab::Control | Tab::System => {}
        }
        debug!(from = %previous, to = %tab, "tab changed");
        self.tab = tab;
    }

    fn begin_gesture(&mut self, gesture: Gesture, now: Instant) {
        if let Some(pause) = self.locks.gesture_start(gesture, now) {
            self.dispatcher.send(pause);
        }
    }

    fn end_gesture(&mut self, gesture: Gesture, now: Instant) {
        self.locks.gesture_end(gesture, now);
    }

    fn move_gaze(&mut self, x: i32, y: i32, now: Instant) {
        self.controls.gaze_x = x.clamp(GAZE_RANGE.0, GAZE_RANGE.1);
        self.controls.gaze_y = y.clamp(GAZE_RANGE.0, GAZE_RANGE.1);
        self.send_gaze(now);
    }

    fn set_depth(&mut self, z: i32, now: Instant) {
        self.controls.gaze_z = z.clamp(DEPTH_RANGE.0, DEPTH_RANGE.1);
        self.send_gaze(now);
    }

    fn send_gaze(&mut self, now: Instant) {
        self.locks.gesture_tick(now);
        let ControlValues {
            gaze_x,
            gaze_y,
            gaze_z,
            ..
        } = self.controls;
        self.dispatcher
            .gaze(f64::from(gaze_x), f64::from(gaze_y), f64::from(gaze_z), now);
    }

    fn move_lid(&mut self, side: LidSide, value: i32, now: Instant) {
        let value = value.clamp(LID_RANGE.0, LID_RANGE.1);
        if self.lid_link {
            self.controls.lid_left = value;
            self.controls.lid_right = value;
        } else {
            match side {
                LidSide::Left => self.controls.lid_left = value,
                LidSide::Right => self.controls.lid_right = value,
            }
        }
        self.locks.gesture_tick(now);
        self.dispatcher.lids(
            f64::from(self.controls.lid_left),
            f64::from(self.controls.lid_right),
            now,
        );
    }

    fn set_coupling(&mut self, value: i32, now: Instant) {
        self.controls.coupling = value.clamp(COUPLING_RANGE.0, COUPLING_RANGE.1);
        self.locks.gesture_tick(now);
        self.dispatcher.send(Outbound::SetCoupling {
            value: f64::from(self.controls.coupling) / 100.0,
        });
    }

    /// Sends the blink and closes the preview lids locally; broadcasts may
    /// not reopen them until the animation window has passed.
    fn blink(&mut self, target: BlinkTarget, now: Instant) {
        let duration = BLINK_PREVIEW_DURATION.as_millis() as u32;
        let command = match target {
            BlinkTarget::Both => Outbound::Blink { duration },
            BlinkTarget::Left => Outbound::BlinkLeft { duration },
            BlinkTarget::Right => Outbound::BlinkRight { duration },
        };
        self.dispatcher.send(command);
        self.locks.start_blink_animation(BLINK_PREVIEW_DURATION, now);
        let preview = &mut self.controls.preview;
        if target != BlinkTarget::Right {
            preview.left_lid_scale = 1.0;
        }
        if target != BlinkTarget::Left {
            preview.right_lid_scale = 1.0;
        }
    }

    fn select_mode(&mut self, mode: String, now: Instant) {
        self.locks.lock_mode_selector(now);
        self.controls.mode = mode.clone();
        self.dispatcher.send(Outbound::SetMode { mode });
    }

    fn ensure_manual_mode(&self) -> Result<(), ActionError> {
        if self.state.as_ref().is_some_and(|state| state.mode.is_auto) {
            return Err(ActionError::AutoModeActive);
        }
        Ok(())
    }

    fn trigger_impulse(&mut self) -> Result<(), ActionError> {
        let (selection_empty, playing) = match &self.state {
            Some(state) => (
                state.impulse.impulse_selection.trim().is_empty(),
                state.impulse.playing,
            ),
            None => (self.config.saved().impulse.selection.is_empty(), false),
        };
        if selection_empty {
            return Err(ActionError::NoImpulseSelected);
        }
        if playing {
            return Err(ActionError::ImpulsePlaying);
        }
        self.dispatcher.send(Outbound::TriggerImpulse);
        Ok(())
    }

    fn save_section(&mut self, section: Section) -> Result<(), ActionError> {
        let commands = self.config.save(section, &self.admin)?;
        self.dispatcher.send_all(commands);
        self.notices.push(Notice::success(format!("Saved {section}")));
        Ok(())
    }

    /// Runs every timer that is due and re-projects when a lock changed.
    pub fn tick(&mut self, now: Instant) {
        self.dispatcher.poll(now);
        if let Some(resume) = self.locks.poll(now) {
            self.dispatcher.send(resume);
        }
        if let Some(requery) = self.admin.poll(now) {
            self.dispatcher.send(requery);
        }
        let outcome = self.upload.poll(now);
        self.report_upload(outcome);

        if self.locks.snapshot(now) != self.last_locks {
            self.reproject(now);
        }
    }

    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        [
            self.dispatcher.next_deadline(),
            self.locks.next_deadline(now),
            self.admin.next_deadline(),
            self.upload.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn take_outbound(&mut self) -> Vec<Outbound> {
        self.dispatcher.take_outbound()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use animeyes_core::encode_inbound;

    use super::*;

    #[test]
    fn malformed_frames_are_dropped() {
        let mut app = AppContext::default();
        let now = Instant::now();
        assert_eq!(app.handle_text("{not json", now), None);
        assert_eq!(app.handle_text(r#"{"type":"mystery"}"#, now), None);
        let log = encode_inbound(&Inbound::Log {
            line: "[1] [WS] hi".to_owned(),
        })
        .unwrap();
        assert_eq!(app.handle_text(&log, now), Some("log"));
        assert_eq!(app.console().len(), 1);
    }

    #[test]
    fn connect_refreshes_config() {
        let mut app = AppContext::default();
        app.on_connected(Instant::now());
        assert_eq!(app.take_outbound(), vec![Outbound::GetConfig]);
    }

    #[test]
    fn device_refusal_names_the_command() {
        let mut app = AppContext::default();
        let now = Instant::now();
        app.handle_inbound(
            Inbound::AdminBlocked {
                command: Some("factoryReset".to_owned()),
            },
            now,
        );
        app.handle_inbound(Inbound::AdminBlocked { command: None }, now);
        let notices = app.take_notices();
        assert_eq!(notices.len(), 2);
        assert_eq!(
            notices[0].message,
            "Action blocked: Admin lock is active (factoryReset)"
        );
        assert_eq!(notices[1].message, "Action blocked: Admin lock is active");
        assert!(app.take_outbound().is_empty());
    }

    #[test]
    fn tab_transitions() {
        let mut app = AppContext::default();
        let now = Instant::now();
        app.apply(ClientCommand::EnterTab(Tab::Calibration), now).unwrap();
        assert_eq!(
            app.take_outbound(),
            vec![Outbound::PauseAutoBlink { paused: true }]
        );
        app.apply(ClientCommand::EnterTab(Tab::Control), now).unwrap();
        assert_eq!(
            app.take_outbound(),
            vec![
                Outbound::PauseAutoBlink { paused: false },
                Outbound::ReapplyEyeState
            ]
        );
        app.apply(ClientCommand::EnterTab(Tab::Console), now).unwrap();
        app.apply(ClientCommand::EnterTab(Tab::Configuration), now).unwrap();
        assert_eq!(
            app.take_outbound(),
            vec![Outbound::GetLogHistory, Outbound::GetConfig]
        );
    }

    #[test]
    fn linked_lids_move_together() {
        let mut app = AppContext::default();
        let now = Instant::now();
        app.apply(ClientCommand::SetLidLink(true), now).unwrap();
        app.apply(ClientCommand::BeginGesture(Gesture::LidSliders), now).unwrap();
        app.apply(
            ClientCommand::Lid {
                side: LidSide::Right,
                value: -40,
            },
            now,
        )
        .unwrap();
        assert_eq!(
            app.take_outbound(),
            vec![
                Outbound::PauseModePlayer { paused: true },
                Outbound::SetLids {
                    left: -40.0,
                    right: -40.0
                },
            ]
        );
    }

    #[test]
    fn mode_player_resumes_after_idle() {
        let mut app = AppContext::default();
        let t0 = Instant::now();
        app.apply(ClientCommand::BeginGesture(Gesture::Coupling), t0).unwrap();
        app.apply(ClientCommand::Coupling(-50), t0).unwrap();
        app.apply(ClientCommand::EndGesture(Gesture::Coupling), t0).unwrap();
        assert_eq!(
            app.take_outbound(),
            vec![
                Outbound::PauseModePlayer { paused: true },
                Outbound::SetCoupling { value: -0.5 },
            ]
        );
        let due = app.next_deadline(t0).unwrap();
        assert!(due <= t0 + Duration::from_millis(500));
        app.tick(t0 + Duration::from_millis(500));
        assert_eq!(
            app.take_outbound(),
            vec![Outbound::PauseModePlayer { paused: false }]
        );
    }

    #[test]
    fn overrides_refused_in_auto_mode() {
        let mut app = AppContext::default();
        let now = Instant::now();
        let mut state = RuntimeState::default();
        state.mode.is_auto = true;
        state.impulse.impulse_selection = String::new();
        app.handle_inbound(Inbound::State(state), now);

        assert_eq!(
            app.apply(ClientCommand::AutoBlinkOverride(false), now),
            Err(ActionError::AutoModeActive)
        );
        assert_eq!(
            app.apply(ClientCommand::TriggerImpulse, now),
            Err(ActionError::NoImpulseSelected)
        );
        assert!(app.take_outbound().is_empty());
        assert_eq!(app.take_notices().len(), 2);
    }

    #[test]
    fn blink_closes_preview_lids_until_window_passes() {
        let mut app = AppContext::default();
        let t0 = Instant::now();
        app.handle_inbound(Inbound::State(RuntimeState::default()), t0);
        app.apply(ClientCommand::Blink(BlinkTarget::Left), t0).unwrap();
        assert_eq!(app.take_outbound(), vec![Outbound::BlinkLeft { duration: 200 }]);

        app.handle_inbound(Inbound::State(RuntimeState::default()), t0 + Duration::from_millis(100));
        assert_eq!(app.controls().preview.left_lid_scale, 1.0);

        app.tick(t0 + Duration::from_millis(250));
        assert_eq!(app.controls().preview.left_lid_scale, 0.5);
    }

    #[test]
    fn scan_results_sorted_strongest_first() {
        let mut app = AppContext::default();
        let networks = vec![
            ScanResult {
                ssid: "weak".to_owned(),
                rssi: -90,
                secure: true,
            },
            ScanResult {
                ssid: "strong".to_owned(),
                rssi: -40,
                secure: false,
            },
        ];
        app.handle_inbound(Inbound::NetworkList { networks }, Instant::now());
        assert_eq!(app.networks()[0].ssid, "strong");
    }

    #[test]
    fn tab_names_parse() {
        assert_eq!("Console".parse::<Tab>(), Ok(Tab::Console));
        assert!("nope".parse::<Tab>().is_err());
    }
}
