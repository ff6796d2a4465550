use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};

use animeyes_core::{
    ADMIN_LOCKOUT_SECS, ADMIN_MAX_FAILED_ATTEMPTS, ADMIN_UNLOCK_SECS, AdminStatus, ApConfig,
    DEFAULT_AP_SSID_PREFIX, DEFAULT_AUTO_BLINK, DEFAULT_AUTO_IMPULSE,
    DEFAULT_BLINK_INTERVAL_MAX_MS, DEFAULT_BLINK_INTERVAL_MIN_MS, DEFAULT_IMPULSE_INTERVAL_MAX_MS,
    DEFAULT_IMPULSE_INTERVAL_MIN_MS, DEFAULT_IMPULSE_SELECTION, DEFAULT_KEEP_AP,
    DEFAULT_LED_BRIGHTNESS, DEFAULT_LED_ENABLED, DEFAULT_LED_PIN, DEFAULT_MDNS_ENABLED,
    DEFAULT_MDNS_HOSTNAME, DEFAULT_MIRROR_PREVIEW, DEFAULT_MODE, DEFAULT_REMEMBER_LAST_MODE,
    DEFAULT_SERVO_PINS, DEFAULT_WIFI_AP_SCAN_MIN, DEFAULT_WIFI_GRACE_S, DEFAULT_WIFI_RETRIES,
    DEFAULT_WIFI_RETRY_DELAY_S, DeviceConfig, FACTORY_SERVO_CENTER, FACTORY_SERVO_MAX,
    FACTORY_SERVO_MIN, ImpulseConfig, Inbound, LedConfig, MAX_MESSAGE_BYTES, MdnsConfig,
    ModeConfig, ModeEntry, NUM_SERVOS, NetworkSlot, Outbound, RuntimeState, SERVO_NAMES,
    ScanResult, ServoStatus, UiStatus, WIFI_MAX_NETWORKS, WifiTimingConfig, decode_outbound,
    encode_inbound, is_valid_admin_pin,
};
use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade, ws::Message},
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::{
    net::TcpListener,
    sync::{RwLock, mpsc},
};
use tracing::{debug, error, info, warn};

pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_millis(100);
pub const SIM_DEVICE_ID: &str = "SIM001";

const MAX_LOG_HISTORY: usize = 100;
const MAX_APPLIED_COMMANDS: usize = 1000;
const MODES: [(&str, &str); 4] = [
    ("follow", "Follow"),
    ("natural", "Natural"),
    ("sleepy", "Sleepy"),
    ("curious", "Curious"),
];
const IMPULSES: [&str; 3] = ["startle", "distraction", "blink"];

#[derive(Debug, Clone)]
pub struct SimOptions {
    pub admin_pin: Option<String>,
    pub broadcast_interval: Duration,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            admin_pin: None,
            broadcast_interval: DEFAULT_BROADCAST_INTERVAL,
        }
    }
}

#[derive(Debug)]
struct Client {
    tx: mpsc::UnboundedSender<Message>,
    unlocked_until: Option<Instant>,
}

#[derive(Debug)]
struct Device {
    started: Instant,
    state: RuntimeState,
    config: DeviceConfig,
    admin_pin: Option<String>,
    failed_attempts: u32,
    lockout_until: Option<Instant>,
    clients: HashMap<u64, Client>,
    next_client_id: u64,
    log: VecDeque<String>,
    applied: VecDeque<Outbound>,
}

fn default_config() -> DeviceConfig {
    DeviceConfig {
        networks: (0..WIFI_MAX_NETWORKS)
            .map(|index| NetworkSlot {
                index: index as u8,
                ssid: String::new(),
                configured: false,
            })
            .collect(),
        wifi_timing: Some(WifiTimingConfig {
            grace: Some(DEFAULT_WIFI_GRACE_S),
            retries: Some(DEFAULT_WIFI_RETRIES),
            retry_delay: Some(DEFAULT_WIFI_RETRY_DELAY_S),
            ap_scan: Some(DEFAULT_WIFI_AP_SCAN_MIN),
            keep_ap: Some(DEFAULT_KEEP_AP),
        }),
        ap: Some(ApConfig {
            ssid_prefix: Some(DEFAULT_AP_SSID_PREFIX.to_owned()),
            has_password: false,
        }),
        led: Some(LedConfig {
            enabled: Some(DEFAULT_LED_ENABLED),
            pin: Some(DEFAULT_LED_PIN),
            brightness: Some(DEFAULT_LED_BRIGHTNESS),
        }),
        mdns: Some(MdnsConfig {
            enabled: Some(DEFAULT_MDNS_ENABLED),
            hostname: Some(DEFAULT_MDNS_HOSTNAME.to_owned()),
        }),
        mode: Some(ModeConfig {
            default_mode: Some(DEFAULT_MODE.to_owned()),
            auto_blink: Some(DEFAULT_AUTO_BLINK),
            blink_interval_min: Some(DEFAULT_BLINK_INTERVAL_MIN_MS),
            blink_interval_max: Some(DEFAULT_BLINK_INTERVAL_MAX_MS),
            remember_last_mode: Some(DEFAULT_REMEMBER_LAST_MODE),
            mirror_preview: Some(DEFAULT_MIRROR_PREVIEW),
        }),
        impulse: Some(ImpulseConfig {
            auto_impulse: Some(DEFAULT_AUTO_IMPULSE),
            impulse_interval_min: Some(DEFAULT_IMPULSE_INTERVAL_MIN_MS),
            impulse_interval_max: Some(DEFAULT_IMPULSE_INTERVAL_MAX_MS),
            impulse_selection: Some(DEFAULT_IMPULSE_SELECTION.to_owned()),
        }),
    }
}

fn default_state() -> RuntimeState {
    let mut state = RuntimeState::default();
    state.servos = (0..NUM_SERVOS)
        .map(|index| ServoStatus {
            name: SERVO_NAMES[index].to_owned(),
            pos: i32::from(FACTORY_SERVO_CENTER),
            pin: DEFAULT_SERVO_PINS[index],
            min: 60,
            center: FACTORY_SERVO_CENTER,
            max: 120,
            invert: false,
        })
        .collect();
    state.wifi.mode = "AP".to_owned();
    state.wifi.ap_active = true;
    state.wifi.ap_ip = "192.168.4.1".to_owned();
    state.wifi.ap_name = format!("{DEFAULT_AP_SSID_PREFIX}-{SIM_DEVICE_ID}");
    state.system.device_id = SIM_DEVICE_ID.to_owned();
    state.system.ui_version = env!("CARGO_PKG_VERSION").to_owned();
    state.system.ui_status = UiStatus::Ok;
    state.mode.current = DEFAULT_MODE.to_owned();
    state.mode.auto_blink = DEFAULT_AUTO_BLINK;
    state.mode.auto_blink_active = DEFAULT_AUTO_BLINK;
    state.mode.blink_interval_min = DEFAULT_BLINK_INTERVAL_MIN_MS;
    state.mode.blink_interval_max = DEFAULT_BLINK_INTERVAL_MAX_MS;
    state.impulse.auto_impulse = DEFAULT_AUTO_IMPULSE;
    state.impulse.auto_impulse_active = DEFAULT_AUTO_IMPULSE;
    state.impulse.impulse_interval_min = DEFAULT_IMPULSE_INTERVAL_MIN_MS;
    state.impulse.impulse_interval_max = DEFAULT_IMPULSE_INTERVAL_MAX_MS;
    state.impulse.impulse_selection = DEFAULT_IMPULSE_SELECTION.to_owned();
    state
}

impl Device {
    fn new(admin_pin: Option<String>) -> Self {
        Self {
            started: Instant::now(),
            state: default_state(),
            config: default_config(),
            admin_pin,
            failed_attempts: 0,
            lockout_until: None,
            clients: HashMap::new(),
            next_client_id: 1,
            log: VecDeque::new(),
            applied: VecDeque::new(),
        }
    }

    fn snapshot(&self, now: Instant) -> RuntimeState {
        let mut state = self.state.clone();
        state.system.uptime = Some(now.saturating_duration_since(self.started).as_secs());
        state
    }

    fn is_locked(&self, client_id: u64, now: Instant) -> bool {
        if self.admin_pin.is_none() {
            return false;
        }
        !self
            .clients
            .get(&client_id)
            .and_then(|client| client.unlocked_until)
            .is_some_and(|until| now < until)
    }

    fn admin_status(&self, client_id: u64, now: Instant) -> AdminStatus {
        let remaining = self
            .clients
            .get(&client_id)
            .and_then(|client| client.unlocked_until)
            .map(|until| until.saturating_duration_since(now).as_secs() as u32)
            .unwrap_or_default();
        let lockout = self
            .lockout_until
            .map(|until| until.saturating_duration_since(now).as_secs() as u32)
            .unwrap_or_default();
        let locked = self.is_locked(client_id, now);
        AdminStatus {
            locked,
            is_ap_client: false,
            pin_configured: self.admin_pin.is_some(),
            remaining_seconds: if locked { 0 } else { remaining },
            lockout_seconds: lockout,
        }
    }

    fn unlock(&mut self, client_id: u64, now: Instant) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.unlocked_until = Some(now + Duration::from_secs(u64::from(ADMIN_UNLOCK_SECS)));
        }
    }

    fn push_log(&mut self, tag: &str, text: &str, now: Instant) -> String {
        let secs = now.saturating_duration_since(self.started).as_secs();
        let line = format!(
            "[{:02}:{:02}:{:02}] [{tag}] {text}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        if self.log.len() == MAX_LOG_HISTORY {
            self.log.pop_front();
        }
        self.log.push_back(line.clone());
        line
    }

    fn servo_mut(&mut self, index: u8) -> Option<&mut ServoStatus> {
        self.state.servos.get_mut(usize::from(index))
    }

    /// Applies one command from `client_id`. Returns the direct replies and,
    /// when the command changed something, a log line for every client.
    fn handle(&mut self, client_id: u64, command: Outbound, now: Instant) -> Handled {
        let kind = command.kind();
        if self.lockout_until.is_some_and(|until| now >= until) {
            self.lockout_until = None;
        }

        if command.requires_admin() && self.is_locked(client_id, now) {
            warn!(client_id, %kind, "blocked protected command from locked session");
            return Handled::reply(Inbound::AdminBlocked {
                command: Some(kind.to_owned()),
            });
        }

        let mut replies = Vec::new();
        let mut log_tag = "CONTROL";
        match &command {
            Outbound::GetConfig => replies.push(Inbound::Config(self.config.clone())),
            Outbound::GetAdminState => {
                replies.push(Inbound::AdminState(self.admin_status(client_id, now)))
            }
            Outbound::GetLogHistory => replies.push(Inbound::LogHistory {
                lines: self.log.iter().cloned().collect(),
            }),
            Outbound::ScanNetworks => replies.push(Inbound::NetworkList {
                networks: vec![
                    scan("Guest", -71, false),
                    scan("Workshop", -48, true),
                    scan("Neighbour", -85, true),
                ],
            }),

            Outbound::AdminAuth { pin } => {
                if self.lockout_until.is_some() {
                    debug!(client_id, "pin attempt during lockout");
                } else if self.admin_pin.as_deref() == Some(pin.as_str()) {
                    self.failed_attempts = 0;
                    self.unlock(client_id, now);
                    info!(client_id, "admin unlocked");
                } else {
                    self.failed_attempts += 1;
                    warn!(client_id, attempts = self.failed_attempts, "wrong admin pin");
                    if self.failed_attempts >= ADMIN_MAX_FAILED_ATTEMPTS {
                        self.failed_attempts = 0;
                        self.lockout_until =
                            Some(now + Duration::from_secs(u64::from(ADMIN_LOCKOUT_SECS)));
                    }
                }
                replies.push(Inbound::AdminState(self.admin_status(client_id, now)));
            }
            Outbound::AdminLock => {
                if let Some(client) = self.clients.get_mut(&client_id) {
                    client.unlocked_until = None;
                }
                replies.push(Inbound::AdminState(self.admin_status(client_id, now)));
            }
            Outbound::SetAdminPin { pin } => {
                if self.is_locked(client_id, now) || !is_valid_admin_pin(pin) {
                    replies.push(Inbound::AdminBlocked {
                        command: Some(kind.to_owned()),
                    });
                } else {
                    self.admin_pin = Some(pin.clone());
                    self.unlock(client_id, now);
                    replies.push(Inbound::AdminState(self.admin_status(client_id, now)));
                }
            }
            Outbound::ClearAdminPin => {
                if self.is_locked(client_id, now) {
                    replies.push(Inbound::AdminBlocked {
                        command: Some(kind.to_owned()),
                    });
                } else {
                    self.admin_pin = None;
                    replies.push(Inbound::AdminState(self.admin_status(client_id, now)));
                }
            }

            Outbound::SetWifiNetwork { index, ssid, .. } => {
                log_tag = "WIFI";
                if let Some(slot) = self.config.networks.get_mut(usize::from(*index)) {
                    slot.ssid = ssid.clone();
                    slot.configured = true;
                }
            }
            Outbound::ClearWifiNetwork { index } => {
                log_tag = "WIFI";
                if let Some(slot) = self.config.networks.get_mut(usize::from(*index)) {
                    slot.ssid.clear();
                    slot.configured = false;
                }
            }
            Outbound::SetApConfig {
                ssid_prefix,
                password,
            } => {
                log_tag = "WIFI";
                let ap = self.config.ap.get_or_insert_with(ApConfig::default);
                ap.ssid_prefix = Some(ssid_prefix.clone());
                ap.has_password |= password.is_some();
                self.state.wifi.ap_name = format!("{ssid_prefix}-{SIM_DEVICE_ID}");
            }
            Outbound::SetKeepAp { enabled } => {
                log_tag = "WIFI";
                self.config
                    .wifi_timing
                    .get_or_insert_with(WifiTimingConfig::default)
                    .keep_ap = Some(*enabled);
            }
            Outbound::SetWifiTiming {
                grace,
                retries,
                retry_delay,
                ap_scan,
                keep_ap,
            } => {
                log_tag = "WIFI";
                self.config.wifi_timing = Some(WifiTimingConfig {
                    grace: Some(*grace),
                    retries: Some(*retries),
                    retry_delay: Some(*retry_delay),
                    ap_scan: Some(*ap_scan),
                    keep_ap: Some(*keep_ap),
                });
            }
            Outbound::SetMdns { enabled, hostname } => {
                log_tag = "WIFI";
                self.config.mdns = Some(MdnsConfig {
                    enabled: Some(*enabled),
                    hostname: Some(hostname.clone()),
                });
                self.state.wifi.mdns_active = *enabled;
                self.state.wifi.mdns_hostname =
                    enabled.then(|| format!("{hostname}-{SIM_DEVICE_ID}"));
            }
            Outbound::SetLed {
                enabled,
                pin,
                brightness,
            } => {
                self.config.led = Some(LedConfig {
                    enabled: Some(*enabled),
                    pin: Some(*pin),
                    brightness: Some(*brightness),
                });
            }
            Outbound::SetDefaultMode { mode } => {
                self.mode_config().default_mode = Some(mode.clone());
            }
            Outbound::SetAutoBlink { enabled } => {
                self.mode_config().auto_blink = Some(*enabled);
                self.state.mode.auto_blink = *enabled;
                self.state.mode.auto_blink_active = *enabled;
            }
            Outbound::SetRememberLastMode { enabled } => {
                self.mode_config().remember_last_mode = Some(*enabled);
            }
            Outbound::SetMirrorPreview { enabled } => {
                self.mode_config().mirror_preview = Some(*enabled);
                self.state.eye.mirror_preview = *enabled;
            }
            Outbound::SetBlinkInterval { min, max } => {
                let mode = self.mode_config();
                mode.blink_interval_min = Some(*min);
                mode.blink_interval_max = Some(*max);
                self.state.mode.blink_interval_min = *min;
                self.state.mode.blink_interval_max = *max;
            }
            Outbound::SetAutoImpulse { enabled } => {
                self.impulse_config().auto_impulse = Some(*enabled);
                self.state.impulse.auto_impulse = *enabled;
                self.state.impulse.auto_impulse_active = *enabled;
            }
            Outbound::SetImpulseInterval { min, max } => {
                let impulse = self.impulse_config();
                impulse.impulse_interval_min = Some(*min);
                impulse.impulse_interval_max = Some(*max);
                self.state.impulse.impulse_interval_min = *min;
                self.state.impulse.impulse_interval_max = *max;
            }
            Outbound::SetImpulseSelection { selection } => {
                self.impulse_config().impulse_selection = Some(selection.clone());
                self.state.impulse.impulse_selection = selection.clone();
            }

            Outbound::SetGaze { x, y, z } => {
                self.state.eye.gaze_x = *x;
                self.state.eye.gaze_y = *y;
                self.state.eye.gaze_z = *z;
            }
            Outbound::SetLids { left, right } => {
                self.state.eye.lid_left = *left;
                self.state.eye.lid_right = *right;
            }
            Outbound::SetCoupling { value } => self.state.eye.coupling = *value,
            Outbound::CenterEyes => {
                self.state.eye.gaze_x = 0.0;
                self.state.eye.gaze_y = 0.0;
            }
            Outbound::SetMode { mode } => {
                self.state.mode.current = mode.clone();
                self.state.mode.is_auto = mode != DEFAULT_MODE;
                self.state.eye.is_auto = self.state.mode.is_auto;
                let remember = self
                    .config
                    .mode
                    .as_ref()
                    .and_then(|mode| mode.remember_last_mode)
                    .unwrap_or(false);
                if remember {
                    self.mode_config().default_mode = Some(mode.clone());
                }
            }
            Outbound::SetAutoBlinkOverride { enabled } => {
                self.state.mode.auto_blink_active = *enabled;
                self.state.eye.auto_blink_active = *enabled;
            }
            Outbound::SetAutoImpulseOverride { enabled } => {
                self.state.impulse.auto_impulse_active = *enabled;
            }
            Outbound::PauseAutoBlink { paused } => self.state.mode.auto_blink_paused = *paused,
            Outbound::Blink { .. }
            | Outbound::BlinkLeft { .. }
            | Outbound::BlinkRight { .. }
            | Outbound::TriggerImpulse
            | Outbound::PauseModePlayer { .. }
            | Outbound::ReapplyEyeState => {}

            Outbound::SetInvert { index, invert } => {
                log_tag = "CALIBRATION";
                if let Some(servo) = self.servo_mut(*index) {
                    servo.invert = *invert;
                }
            }
            Outbound::PreviewCalibration { index, position } => {
                log_tag = "CALIBRATION";
                if let Some(servo) = self.servo_mut(*index) {
                    servo.pos = i32::from(*position);
                }
            }
            Outbound::SaveAllCalibration { servos } => {
                log_tag = "CALIBRATION";
                for record in servos {
                    if let Some(servo) = self.servo_mut(record.index) {
                        servo.pin = record.pin;
                        servo.min = record.min;
                        servo.center = record.center;
                        servo.max = record.max;
                        servo.invert = record.invert;
                    }
                }
            }
            Outbound::CenterAll => {
                log_tag = "CALIBRATION";
                for servo in &mut self.state.servos {
                    servo.pos = i32::from(servo.center);
                }
            }

            Outbound::CheckForUpdate => {
                log_tag = "OTA";
                self.state.update.last_check = now.saturating_duration_since(self.started).as_secs();
            }
            Outbound::SetUpdateCheckEnabled { enabled } => {
                log_tag = "OTA";
                self.state.update.enabled = *enabled;
            }
            Outbound::SetUpdateCheckInterval { interval } => {
                log_tag = "OTA";
                self.state.update.interval = *interval;
            }
            Outbound::ResetConnection => log_tag = "WIFI",
            Outbound::Reboot => self.state.system.reboot_required = false,
            Outbound::FactoryReset => {
                self.config = default_config();
                for servo in &mut self.state.servos {
                    servo.min = FACTORY_SERVO_MIN;
                    servo.center = FACTORY_SERVO_CENTER;
                    servo.max = FACTORY_SERVO_MAX;
                    servo.invert = false;
                }
            }
        }

        if self.applied.len() == MAX_APPLIED_COMMANDS {
            self.applied.pop_front();
        }
        self.applied.push_back(command);

        let log_line = (!kind.starts_with("get")).then(|| self.push_log(log_tag, kind, now));
        Handled { replies, log_line }
    }

    fn mode_config(&mut self) -> &mut ModeConfig {
        self.config.mode.get_or_insert_with(ModeConfig::default)
    }

    fn impulse_config(&mut self) -> &mut ImpulseConfig {
        self.config.impulse.get_or_insert_with(ImpulseConfig::default)
    }
}

fn scan(ssid: &str, rssi: i32, secure: bool) -> ScanResult {
    ScanResult {
        ssid: ssid.to_owned(),
        rssi,
        secure,
    }
}

struct Handled {
    replies: Vec<Inbound>,
    log_line: Option<String>,
}

impl Handled {
    fn reply(message: Inbound) -> Self {
        Self {
            replies: vec![message],
            log_line: None,
        }
    }
}

/// Shared simulated device. Cloning shares the same device.
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<RwLock<Device>>,
    broadcast_interval: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(options: SimOptions) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Device::new(options.admin_pin))),
            broadcast_interval: options.broadcast_interval,
        }
    }

    pub async fn config(&self) -> DeviceConfig {
        self.inner.read().await.config.clone()
    }

    pub async fn runtime_state(&self) -> RuntimeState {
        self.inner.read().await.snapshot(Instant::now())
    }

    /// Every command the device accepted, oldest first.
    pub async fn applied_commands(&self) -> Vec<Outbound> {
        self.inner.read().await.applied.iter().cloned().collect()
    }

    pub async fn connected_clients(&self) -> usize {
        self.inner.read().await.clients.len()
    }

    /// Drops every live connection, as a device reboot would.
    pub async fn disconnect_all(&self) {
        let mut device = self.inner.write().await;
        for client in device.clients.values() {
            let _ = client.tx.send(Message::Close(None));
        }
        device.clients.clear();
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(SimOptions::default())
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), String> {
    info!(
        "simulated device listening on {}",
        listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_owned())
    );
    axum::serve(listener, build_router(state))
        .await
        .map_err(|err| err.to_string())
}

async fn healthz_handler() -> impl IntoResponse {
    Json(serde_json::json!({"ok": true}))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.max_frame_size(MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| async move {
            if let Err(err) = handle_socket(state, socket).await {
                warn!("socket session ended with error: {}", err);
            }
        })
}

fn text_frame(message: &Inbound) -> Option<Message> {
    match encode_inbound(message) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(err) => {
            error!("failed to serialize device message: {}", err);
            None
        }
    }
}

fn greeting(device: &Device, client_id: u64, now: Instant) -> Vec<Inbound> {
    vec![
        Inbound::AvailableModes {
            modes: MODES
                .iter()
                .map(|(name, label)| ModeEntry::Detailed {
                    name: (*name).to_owned(),
                    display_name: Some((*label).to_owned()),
                })
                .collect(),
        },
        Inbound::AvailableImpulses {
            impulses: IMPULSES.iter().map(|name| (*name).to_owned()).collect(),
        },
        Inbound::AdminState(device.admin_status(client_id, now)),
    ]
}

async fn handle_socket(
    state: AppState,
    socket: axum::extract::ws::WebSocket,
) -> Result<(), String> {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let client_id = {
        let mut device = state.inner.write().await;
        let client_id = device.next_client_id;
        device.next_client_id += 1;
        device.clients.insert(
            client_id,
            Client {
                tx: outbound_tx.clone(),
                unlocked_until: None,
            },
        );
        for message in greeting(&device, client_id, Instant::now()) {
            if let Some(frame) = text_frame(&message) {
                let _ = outbound_tx.send(frame);
            }
        }
        client_id
    };
    info!(client_id, "client connected");

    let broadcast_state = state.clone();
    let send_task = tokio::spawn(async move {
        let mut broadcast = tokio::time::interval(broadcast_state.broadcast_interval);
        loop {
            tokio::select! {
                msg = outbound_rx.recv() => {
                    match msg {
                        Some(message) => {
                            let closing = matches!(message, Message::Close(_));
                            if ws_sender.send(message).await.is_err() || closing {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = broadcast.tick() => {
                    let snapshot = broadcast_state.inner.read().await.snapshot(Instant::now());
                    let Some(frame) = text_frame(&Inbound::State(snapshot)) else {
                        continue;
                    };
                    if ws_sender.send(frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(next_message) = ws_receiver.next().await {
        let message = match next_message {
            Ok(message) => message,
            Err(err) => {
                warn!(client_id, "websocket receive error: {}", err);
                break;
            }
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => continue,
        };

        let command = match decode_outbound(text.as_str()) {
            Ok(command) => command,
            Err(err) => {
                warn!(client_id, "dropping malformed command: {}", err);
                continue;
            }
        };
        debug!(client_id, kind = %command.kind(), "command");

        let (handled, recipients) = {
            let mut device = state.inner.write().await;
            if !device.clients.contains_key(&client_id) {
                break;
            }
            let handled = device.handle(client_id, command, Instant::now());
            let recipients = device
                .clients
                .values()
                .map(|client| client.tx.clone())
                .collect::<Vec<_>>();
            (handled, recipients)
        };

        for reply in &handled.replies {
            if let Some(frame) = text_frame(reply) {
                let _ = outbound_tx.send(frame);
            }
        }
        if let Some(line) = handled.log_line {
            if let Some(frame) = text_frame(&Inbound::Log { line }) {
                for tx in recipients {
                    let _ = tx.send(frame.clone());
                }
            }
        }
    }

    state.inner.write().await.clients.remove(&client_id);
    send_task.abort();
    info!(client_id, "client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_with_client(pin: Option<&str>) -> (Device, u64) {
        let mut device = Device::new(pin.map(str::to_owned));
        let (tx, _rx) = mpsc::unbounded_channel();
        device.clients.insert(
            1,
            Client {
                tx,
                unlocked_until: None,
            },
        );
        (device, 1)
    }

    #[test]
    fn protected_commands_blocked_while_locked() {
        let (mut device, id) = device_with_client(Some("1234"));
        let handled = device.handle(id, Outbound::FactoryReset, Instant::now());
        assert_eq!(
            handled.replies,
            vec![Inbound::AdminBlocked {
                command: Some("factoryReset".to_owned())
            }]
        );
        assert!(device.applied.is_empty());

        let handled = device.handle(id, Outbound::CenterEyes, Instant::now());
        assert!(handled.replies.is_empty());
        assert!(handled.log_line.is_some());
    }

    #[test]
    fn three_wrong_pins_lock_out() {
        let now = Instant::now();
        let (mut device, id) = device_with_client(Some("1234"));
        for _ in 0..ADMIN_MAX_FAILED_ATTEMPTS {
            device.handle(
                id,
                Outbound::AdminAuth {
                    pin: "0000".to_owned(),
                },
                now,
            );
        }
        let status = device.admin_status(id, now);
        assert!(status.locked);
        assert_eq!(status.lockout_seconds, ADMIN_LOCKOUT_SECS);

        device.handle(
            id,
            Outbound::AdminAuth {
                pin: "1234".to_owned(),
            },
            now,
        );
        assert!(device.admin_status(id, now).locked);

        let later = now + Duration::from_secs(u64::from(ADMIN_LOCKOUT_SECS));
        device.handle(
            id,
            Outbound::AdminAuth {
                pin: "1234".to_owned(),
            },
            later,
        );
        let status = device.admin_status(id, later);
        assert!(!status.locked);
        assert_eq!(status.remaining_seconds, ADMIN_UNLOCK_SECS);
    }

    #[test]
    fn remember_last_mode_updates_default() {
        let (mut device, id) = device_with_client(None);
        let now = Instant::now();
        device.handle(id, Outbound::SetRememberLastMode { enabled: true }, now);
        device.handle(
            id,
            Outbound::SetMode {
                mode: "sleepy".to_owned(),
            },
            now,
        );
        assert!(device.state.mode.is_auto);
        assert_eq!(
            device.config.mode.as_ref().and_then(|m| m.default_mode.as_deref()),
            Some("sleepy")
        );
    }
}
