use std::time::Instant;

use animeyes_core::encode_outbound;
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{
    net::TcpStream,
    sync::mpsc,
    task::JoinHandle,
    time::{MissedTickBehavior, interval, timeout},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    admin::AccessMode,
    app::{AppContext, ClientCommand, Notice},
    projection::ControlValues,
    session::{CloseReason, ConnectionStatus, Session, SessionConfig},
    settings::ClientSettings,
};

type DeviceSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type DeviceSink = SplitSink<DeviceSocket, Message>;
type DeviceStream = SplitStream<DeviceSocket>;

#[derive(Debug)]
pub enum RuntimeCommand {
    Apply(ClientCommand),
    /// The user came back to the controller (window shown, terminal
    /// focused). Reconnects at once when the link is down.
    Visible,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Status(ConnectionStatus),
    /// A device message of this kind was applied.
    Received(&'static str),
    Notice(Notice),
    Controls(ControlValues),
    Admin(AccessMode),
}

pub struct ClientHandle {
    commands: mpsc::UnboundedSender<RuntimeCommand>,
    events: mpsc::UnboundedReceiver<ClientEvent>,
    task: JoinHandle<AppContext>,
}

impl ClientHandle {
    pub fn commands(&self) -> mpsc::UnboundedSender<RuntimeCommand> {
        self.commands.clone()
    }

    pub fn apply(&self, command: ClientCommand) -> bool {
        self.commands.send(RuntimeCommand::Apply(command)).is_ok()
    }

    pub fn visible(&self) -> bool {
        self.commands.send(RuntimeCommand::Visible).is_ok()
    }

    pub async fn next_event(&mut self) -> Option<ClientEvent> {
        self.events.recv().await
    }

    /// Stops the driver and hands back its final state.
    pub async fn shutdown(self) -> Option<AppContext> {
        let _ = self.commands.send(RuntimeCommand::Shutdown);
        self.task.await.ok()
    }
}

/// Spawns the driver on the current tokio runtime.
pub fn spawn_client(endpoint: Url, config: SessionConfig, settings: ClientSettings) -> ClientHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let driver = Driver::new(
        AppContext::new(&settings),
        Session::new(endpoint, config),
        commands_rx,
        events_tx,
    );
    ClientHandle {
        commands: commands_tx,
        events: events_rx,
        task: tokio::spawn(driver.run()),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    RetryNow,
    Shutdown,
}

enum ConnectStep {
    Connected(Box<DeviceSocket>),
    Failed(CloseReason),
    Restart,
    Shutdown,
}

enum OpenStep {
    Closed(CloseReason),
    Shutdown,
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

/// One task owning the session and the application context. Every socket
/// frame, user command and timer runs to completion before the next.
struct Driver {
    app: AppContext,
    session: Session,
    commands: mpsc::UnboundedReceiver<RuntimeCommand>,
    events: mpsc::UnboundedSender<ClientEvent>,
    last_controls: ControlValues,
    last_access: AccessMode,
}

impl Driver {
    fn new(
        app: AppContext,
        session: Session,
        commands: mpsc::UnboundedReceiver<RuntimeCommand>,
        events: mpsc::UnboundedSender<ClientEvent>,
    ) -> Self {
        let last_controls = app.controls().clone();
        let last_access = app.access_mode();
        Self {
            app,
            session,
            commands,
            events,
            last_controls,
            last_access,
        }
    }

    async fn run(mut self) -> AppContext {
        info!(endpoint = %self.session.endpoint(), "runtime starting");
        loop {
            self.session.begin_connect();
            self.emit(ClientEvent::Status(self.session.status()));

            let reason = match self.connect().await {
                ConnectStep::Connected(socket) => match self.serve(*socket).await {
                    OpenStep::Closed(reason) => reason,
                    OpenStep::Shutdown => break,
                },
                ConnectStep::Failed(reason) => reason,
                ConnectStep::Restart => continue,
                ConnectStep::Shutdown => break,
            };

            self.session.on_closed(&reason, Instant::now());
            self.app.on_disconnected();
            self.emit(ClientEvent::Status(self.session.status()));

            if self.wait_for_retry().await == Flow::Shutdown {
                break;
            }
        }
        info!("runtime stopped");
        self.app
    }

    async fn connect(&mut self) -> ConnectStep {
        let url = self.session.endpoint().to_string();
        let connect_timeout = self.session.config().connect_timeout;
        let attempt = timeout(connect_timeout, connect_async(url));
        tokio::pin!(attempt);

        loop {
            let deadline = self.app.next_deadline(Instant::now());
            tokio::select! {
                result = &mut attempt => {
                    return match result {
                        Ok(Ok((socket, _))) => ConnectStep::Connected(Box::new(socket)),
                        Ok(Err(err)) => ConnectStep::Failed(CloseReason::ConnectFailed(err.to_string())),
                        Err(_) => ConnectStep::Failed(CloseReason::ConnectFailed(format!(
                            "timed out after {connect_timeout:?}"
                        ))),
                    };
                }
                command = self.commands.recv() => {
                    match self.handle_command(command) {
                        Flow::Shutdown => return ConnectStep::Shutdown,
                        Flow::RetryNow => return ConnectStep::Restart,
                        Flow::Continue => self.drop_outbound(),
                    }
                }
                _ = sleep_until(deadline) => {
                    self.app.tick(Instant::now());
                    self.drop_outbound();
                }
            }
            self.publish();
        }
    }

    async fn serve(&mut self, socket: DeviceSocket) -> OpenStep {
        let (mut sink, mut stream): (DeviceSink, DeviceStream) = socket.split();
        let now = Instant::now();
        self.session.on_open(now);
        self.emit(ClientEvent::Status(self.session.status()));
        self.app.on_connected(now);

        let mut heartbeat = interval(self.session.config().heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Err(reason) = self.flush(&mut sink).await {
                return OpenStep::Closed(reason);
            }
            self.publish();

            let deadline = self.app.next_deadline(Instant::now());
            tokio::select! {
                frame = stream.next() => {
                    let now = Instant::now();
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            self.session.on_message(now);
                            if let Some(kind) = self.app.handle_text(text.as_str(), now) {
                                self.emit(ClientEvent::Received(kind));
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return OpenStep::Closed(CloseReason::PeerClosed),
                        Some(Ok(_)) => self.session.on_message(now),
                        Some(Err(err)) => return OpenStep::Closed(CloseReason::Transport(err.to_string())),
                    }
                }
                command = self.commands.recv() => {
                    match self.handle_command(command) {
                        Flow::Shutdown => {
                            let _ = sink.send(Message::Close(None)).await;
                            return OpenStep::Shutdown;
                        }
                        Flow::Continue | Flow::RetryNow => {}
                    }
                }
                _ = heartbeat.tick() => {
                    if self.session.heartbeat_expired(Instant::now()) {
                        return OpenStep::Closed(CloseReason::HeartbeatTimeout);
                    }
                }
                _ = sleep_until(deadline) => self.app.tick(Instant::now()),
            }
        }
    }

    async fn wait_for_retry(&mut self) -> Flow {
        loop {
            let deadline = self.app.next_deadline(Instant::now());
            tokio::select! {
                _ = sleep_until(self.session.reconnect_at()) => return Flow::Continue,
                command = self.commands.recv() => {
                    match self.handle_command(command) {
                        Flow::Shutdown => return Flow::Shutdown,
                        Flow::RetryNow => return Flow::Continue,
                        Flow::Continue => self.drop_outbound(),
                    }
                }
                _ = sleep_until(deadline) => {
                    self.app.tick(Instant::now());
                    self.drop_outbound();
                }
            }
            self.publish();
        }
    }

    fn handle_command(&mut self, command: Option<RuntimeCommand>) -> Flow {
        match command {
            Some(RuntimeCommand::Apply(command)) => {
                // Refusals are reported through notices.
                let _ = self.app.apply(command, Instant::now());
                Flow::Continue
            }
            Some(RuntimeCommand::Visible) => {
                if self.session.on_visible() {
                    info!("visible again while disconnected, reconnecting now");
                    Flow::RetryNow
                } else {
                    Flow::Continue
                }
            }
            Some(RuntimeCommand::Shutdown) | None => Flow::Shutdown,
        }
    }

    async fn flush(&mut self, sink: &mut DeviceSink) -> Result<(), CloseReason> {
        for command in self.app.take_outbound() {
            let text = match encode_outbound(&command) {
                Ok(text) => text,
                Err(err) => {
                    warn!(kind = %command.kind(), "failed to encode command: {err}");
                    continue;
                }
            };
            debug!(kind = %command.kind(), "sending");
            sink.send(Message::Text(text.into()))
                .await
                .map_err(|err| CloseReason::Transport(err.to_string()))?;
        }
        Ok(())
    }

    /// Commands produced while the link is down are not queued.
    fn drop_outbound(&mut self) {
        for command in self.app.take_outbound() {
            debug!(kind = %command.kind(), "not connected, dropping command");
        }
    }

    fn publish(&mut self) {
        for notice in self.app.take_notices() {
            self.emit(ClientEvent::Notice(notice));
        }
        if self.app.controls() != &self.last_controls {
            self.last_controls = self.app.controls().clone();
            self.emit(ClientEvent::Controls(self.last_controls.clone()));
        }
        let access = self.app.access_mode();
        if access != self.last_access {
            self.last_access = access;
            self.emit(ClientEvent::Admin(access));
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }
}
