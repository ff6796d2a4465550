use std::{net::SocketAddr, time::Duration};

use animeyes_client::{
    ClientCommand, ClientEvent, ClientHandle, ConnectionStatus, NoticeLevel, SessionConfig,
    admin::AccessMode,
    config_store::{FieldValue, Section},
    endpoint_from_origin,
    settings::ClientSettings,
    spawn_client,
};
use animeyes_sim::{AppState, SimOptions, serve};
use tokio::{net::TcpListener, time::timeout};

const WAIT: Duration = Duration::from_secs(5);

fn fast_session() -> SessionConfig {
    SessionConfig {
        reconnect_delay: Duration::from_millis(100),
        heartbeat_interval: Duration::from_millis(50),
        heartbeat_timeout: Duration::from_millis(1000),
        connect_timeout: Duration::from_secs(2),
    }
}

async fn start_device(admin_pin: Option<&str>) -> (SocketAddr, AppState) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral device socket");
    let address = listener.local_addr().expect("device local addr");
    let state = AppState::new(SimOptions {
        admin_pin: admin_pin.map(str::to_owned),
        broadcast_interval: Duration::from_millis(20),
    });
    let served = state.clone();
    tokio::spawn(async move {
        let _ = serve(listener, served).await;
    });
    (address, state)
}

fn start_client(address: SocketAddr) -> ClientHandle {
    let endpoint = endpoint_from_origin(&format!("http://{address}")).expect("endpoint");
    spawn_client(endpoint, fast_session(), ClientSettings::default())
}

async fn wait_for(client: &mut ClientHandle, what: &str, accept: impl Fn(&ClientEvent) -> bool) {
    let found = timeout(WAIT, async {
        while let Some(event) = client.next_event().await {
            if accept(&event) {
                return true;
            }
        }
        false
    })
    .await;
    assert!(matches!(found, Ok(true)), "timed out waiting for {what}");
}

#[tokio::test]
async fn saves_reach_the_device_and_survive_a_reconnect() {
    let (address, device) = start_device(None).await;
    let mut client = start_client(address);

    wait_for(&mut client, "open", |event| {
        *event == ClientEvent::Status(ConnectionStatus::Open)
    })
    .await;
    wait_for(&mut client, "config", |event| {
        *event == ClientEvent::Received("config")
    })
    .await;

    client.apply(ClientCommand::SetField {
        section: Section::Mdns,
        key: "hostname".to_owned(),
        value: FieldValue::Text("Work Bench".to_owned()),
    });
    client.apply(ClientCommand::SaveSection(Section::Mdns));
    wait_for(&mut client, "save notice", |event| {
        matches!(event, ClientEvent::Notice(notice) if notice.level == NoticeLevel::Success)
    })
    .await;
    wait_for(&mut client, "device log", |event| {
        *event == ClientEvent::Received("log")
    })
    .await;
    let hostname = device.config().await.mdns.and_then(|mdns| mdns.hostname);
    assert_eq!(hostname.as_deref(), Some("workbench"));

    device.disconnect_all().await;
    wait_for(&mut client, "closed", |event| {
        *event == ClientEvent::Status(ConnectionStatus::Closed)
    })
    .await;
    wait_for(&mut client, "reopened", |event| {
        *event == ClientEvent::Status(ConnectionStatus::Open)
    })
    .await;

    let app = client.shutdown().await.expect("driver state");
    assert_eq!(app.config().saved().mdns.hostname, "workbench");
    assert!(app.state().is_some());
}

#[tokio::test]
async fn unreachable_device_keeps_retrying() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind placeholder");
    let address = listener.local_addr().expect("placeholder addr");
    drop(listener);

    let mut client = start_client(address);
    wait_for(&mut client, "first failure", |event| {
        *event == ClientEvent::Status(ConnectionStatus::Closed)
    })
    .await;
    wait_for(&mut client, "retry", |event| {
        *event == ClientEvent::Status(ConnectionStatus::Connecting)
    })
    .await;

    let app = client.shutdown().await.expect("driver state");
    assert!(!app.is_connected());
}

#[tokio::test]
async fn admin_lock_is_mirrored_from_the_device() {
    let (address, device) = start_device(Some("1357")).await;
    let mut client = start_client(address);

    wait_for(&mut client, "locked", |event| {
        *event == ClientEvent::Admin(AccessMode::Locked)
    })
    .await;

    client.apply(ClientCommand::FactoryReset);
    wait_for(&mut client, "refusal", |event| {
        matches!(event, ClientEvent::Notice(notice) if notice.level == NoticeLevel::Error)
    })
    .await;

    client.apply(ClientCommand::Unlock("1357".to_owned()));
    wait_for(&mut client, "unlocked", |event| {
        matches!(event, ClientEvent::Admin(AccessMode::Unlocked { .. }))
    })
    .await;

    client.apply(ClientCommand::SetUpdateCheckEnabled(false));
    let applied = timeout(WAIT, async {
        loop {
            if !device.runtime_state().await.update.enabled {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(applied.is_ok(), "update check setting never reached the device");

    let _ = client.shutdown().await;
}
