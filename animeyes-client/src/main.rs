use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use animeyes_client::{
    ClientEvent, NoticeLevel, RuntimeCommand, SessionConfig, endpoint_from_origin,
    repl::{HELP, ReplLine, parse_line},
    settings::{load_settings, log_path_for, save_settings_with_retry, settings_path},
    spawn_client,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

const DEFAULT_DEVICE_URL: &str = "ws://192.168.4.1/ws";

#[derive(Parser, Debug, Clone)]
#[command(name = "animeyes")]
struct ClientArgs {
    /// Device page origin (`http://host`) or socket URL. Defaults to the last
    /// URL used, then to the device's own access point.
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Log file. Defaults to `logs/animeyes.log` beside the settings file.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Log to stderr instead of a file.
    #[arg(long)]
    log_stderr: bool,
    #[arg(long, default_value_t = 3000)]
    reconnect_ms: u64,
    #[arg(long, default_value_t = 3000)]
    heartbeat_timeout_ms: u64,
}

fn init_logging(log_file: Option<&Path>) {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();

    let file = log_file.map(|path| {
        if let Some(dir) = path.parent() {
            let _ = fs::create_dir_all(dir);
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|err| eprintln!("failed to open log file {}: {err}", path.display()))
    });

    match file {
        Some(Ok(file)) => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .init(),
    }
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::Status(status) => println!("* {}", status.label()),
        ClientEvent::Received(_) => {}
        ClientEvent::Notice(notice) => {
            let marker = match notice.level {
                NoticeLevel::Info => "i",
                NoticeLevel::Success => "+",
                NoticeLevel::Error => "!",
            };
            println!("{marker} {}", notice.message);
        }
        ClientEvent::Controls(values) => println!(
            "  gaze {} {} depth {} lids {} {} coupling {} mode {}",
            values.gaze_x,
            values.gaze_y,
            values.gaze_z,
            values.lid_left,
            values.lid_right,
            values.coupling,
            if values.mode.is_empty() { "-" } else { values.mode.as_str() },
        ),
        ClientEvent::Admin(mode) => println!("* admin {mode:?}"),
    }
}

#[tokio::main]
async fn main() {
    let args = ClientArgs::parse();
    let settings_file = args.settings.clone().unwrap_or_else(settings_path);
    let log_file = (!args.log_stderr).then(|| {
        args.log_file
            .clone()
            .unwrap_or_else(|| log_path_for(&settings_file))
    });
    init_logging(log_file.as_deref());
    let settings = load_settings(&settings_file);

    let device_url = args
        .url
        .clone()
        .or_else(|| settings.device_url.clone())
        .unwrap_or_else(|| DEFAULT_DEVICE_URL.to_owned());
    let endpoint = match endpoint_from_origin(&device_url) {
        Ok(endpoint) => endpoint,
        Err(err) => {
            error!(url = %device_url, "{err}");
            std::process::exit(2);
        }
    };

    let config = SessionConfig {
        reconnect_delay: Duration::from_millis(args.reconnect_ms),
        heartbeat_timeout: Duration::from_millis(args.heartbeat_timeout_ms),
        ..SessionConfig::default()
    };

    info!(endpoint = %endpoint, "starting controller");
    println!("animeyes: controlling {endpoint}, type help for commands");

    let mut client = spawn_client(endpoint, config, settings);
    let commands = client.commands();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        warn!("stdin read failed: {err}");
                        break;
                    }
                };
                match parse_line(&line) {
                    Ok(ReplLine::Commands(batch)) => {
                        for command in batch {
                            let _ = commands.send(RuntimeCommand::Apply(command));
                        }
                    }
                    Ok(ReplLine::Visible) => {
                        let _ = commands.send(RuntimeCommand::Visible);
                    }
                    Ok(ReplLine::Help) => println!("{HELP}"),
                    Ok(ReplLine::Quit) => break,
                    Ok(ReplLine::Empty) => {}
                    Err(err) => println!("! {err}"),
                }
            }
            event = client.next_event() => {
                match event {
                    Some(event) => print_event(&event),
                    None => break,
                }
            }
        }
    }

    let Some(app) = client.shutdown().await else {
        return;
    };
    if let Err(err) = save_settings_with_retry(&settings_file, &app.settings(&device_url)) {
        warn!(path = %settings_file.display(), "failed to save settings: {err}");
    }
}
