//! Line commands for the terminal controller.

use std::str::FromStr;

use crate::{
    app::{BlinkTarget, ClientCommand, LidSide, Tab},
    config_store::{FieldValue, Section},
    locks::Gesture,
};

pub const HELP: &str = "\
commands:
  tab <control|calibration|configuration|console|system>
  gaze <x> <y> | depth <z> | lid <left|right> <v> | coupling <v> | link <on|off>
  blink [left|right] | mode <name> | center | impulse
  autoblink <on|off> | autoimpulse <on|off>
  set <section> <key> <value> | save <section> | revert <section>
  scan | pick <slot> <ssid> | forget <slot> | impulse-select <name> <on|off>
  cal <min|max> <servo> <delta> | cal <center|test|pin> <servo> <value>
  cal invert <servo> <on|off> | cal reset | cal save | cal center-all
  unlock <pin> | lock | pin set <pin> | pin clear | admin
  reboot | factory-reset | reset-connection
  update check | update enabled <on|off> | update interval <0|1|2>
  upload <start|progress <sent> <total>|response <status> [body]|error>
  visible | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ReplLine {
    Commands(Vec<ClientCommand>),
    Visible,
    Help,
    Quit,
    Empty,
}

fn number<T: FromStr>(token: Option<&str>, what: &str) -> Result<T, String> {
    let token = token.ok_or_else(|| format!("missing {what}"))?;
    token
        .parse()
        .map_err(|_| format!("invalid {what}: {token}"))
}

fn switch(token: Option<&str>) -> Result<bool, String> {
    match token {
        Some("on" | "true" | "yes" | "1") => Ok(true),
        Some("off" | "false" | "no" | "0") => Ok(false),
        Some(other) => Err(format!("expected on/off, got {other}")),
        None => Err("missing on/off".to_owned()),
    }
}

fn section(token: Option<&str>) -> Result<Section, String> {
    token.ok_or_else(|| "missing section".to_owned())?.parse()
}

/// A one-shot move from the terminal is a complete gesture.
fn gesture(kind: Gesture, command: ClientCommand) -> ReplLine {
    ReplLine::Commands(vec![
        ClientCommand::BeginGesture(kind),
        command,
        ClientCommand::EndGesture(kind),
    ])
}

fn single(command: ClientCommand) -> ReplLine {
    ReplLine::Commands(vec![command])
}

pub fn parse_line(line: &str) -> Result<ReplLine, String> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(ReplLine::Empty);
    };

    let parsed = match head {
        "help" | "?" => ReplLine::Help,
        "quit" | "exit" => ReplLine::Quit,
        "visible" => ReplLine::Visible,
        "tab" => single(ClientCommand::EnterTab(
            words.next().ok_or("missing tab")?.parse::<Tab>()?,
        )),
        "gaze" => {
            let x = number(words.next(), "x")?;
            let y = number(words.next(), "y")?;
            gesture(Gesture::GazePad, ClientCommand::Gaze { x, y })
        }
        "depth" => gesture(
            Gesture::Depth,
            ClientCommand::Depth(number(words.next(), "depth")?),
        ),
        "lid" => {
            let side = match words.next() {
                Some("left") => LidSide::Left,
                Some("right") => LidSide::Right,
                _ => return Err("expected left or right".to_owned()),
            };
            let value = number(words.next(), "lid value")?;
            gesture(Gesture::LidSliders, ClientCommand::Lid { side, value })
        }
        "coupling" => gesture(
            Gesture::Coupling,
            ClientCommand::Coupling(number(words.next(), "coupling")?),
        ),
        "link" => single(ClientCommand::SetLidLink(switch(words.next())?)),
        "blink" => single(ClientCommand::Blink(match words.next() {
            None => BlinkTarget::Both,
            Some("left") => BlinkTarget::Left,
            Some("right") => BlinkTarget::Right,
            Some(other) => return Err(format!("unknown eye {other}")),
        })),
        "mode" => single(ClientCommand::SelectMode(
            words.next().ok_or("missing mode")?.to_owned(),
        )),
        "center" => single(ClientCommand::CenterEyes),
        "impulse" => single(ClientCommand::TriggerImpulse),
        "autoblink" => single(ClientCommand::AutoBlinkOverride(switch(words.next())?)),
        "autoimpulse" => single(ClientCommand::AutoImpulseOverride(switch(words.next())?)),

        "set" => {
            let section = section(words.next())?;
            let key = words.next().ok_or("missing key")?.to_owned();
            let rest = words.collect::<Vec<_>>().join(" ");
            let value = match rest.as_str() {
                "true" => FieldValue::Flag(true),
                "false" => FieldValue::Flag(false),
                _ => FieldValue::Text(rest),
            };
            single(ClientCommand::SetField {
                section,
                key,
                value,
            })
        }
        "save" => single(ClientCommand::SaveSection(section(words.next())?)),
        "revert" => single(ClientCommand::RevertSection(section(words.next())?)),
        "scan" => single(ClientCommand::ScanNetworks),
        "pick" => {
            let index = number(words.next(), "slot")?;
            let ssid = words.collect::<Vec<_>>().join(" ");
            single(ClientCommand::PickNetwork { index, ssid })
        }
        "forget" => single(ClientCommand::ForgetNetwork(number(words.next(), "slot")?)),
        "impulse-select" => {
            let name = words.next().ok_or("missing impulse")?.to_owned();
            let selected = switch(words.next())?;
            single(ClientCommand::ToggleImpulse { name, selected })
        }

        "cal" => parse_calibration(&mut words)?,

        "unlock" => single(ClientCommand::Unlock(
            words.next().ok_or("missing pin")?.to_owned(),
        )),
        "lock" => single(ClientCommand::LockAdmin),
        "pin" => match words.next() {
            Some("set") => single(ClientCommand::SetAdminPin(
                words.next().ok_or("missing pin")?.to_owned(),
            )),
            Some("clear") => single(ClientCommand::ClearAdminPin),
            _ => return Err("expected pin set <pin> or pin clear".to_owned()),
        },
        "admin" => single(ClientCommand::RefreshAdmin),

        "reboot" => single(ClientCommand::Reboot),
        "factory-reset" => single(ClientCommand::FactoryReset),
        "reset-connection" => single(ClientCommand::ResetConnection),
        "update" => match words.next() {
            Some("check") => single(ClientCommand::CheckForUpdate),
            Some("enabled") => single(ClientCommand::SetUpdateCheckEnabled(switch(
                words.next(),
            )?)),
            Some("interval") => single(ClientCommand::SetUpdateCheckInterval(number(
                words.next(),
                "interval",
            )?)),
            _ => return Err("expected update check|enabled|interval".to_owned()),
        },
        "upload" => match words.next() {
            Some("start") => single(ClientCommand::UploadStarted),
            Some("progress") => single(ClientCommand::UploadProgress {
                sent: number(words.next(), "sent bytes")?,
                total: number(words.next(), "total bytes")?,
            }),
            Some("response") => single(ClientCommand::UploadResponse {
                status: number(words.next(), "status")?,
                body: words.collect::<Vec<_>>().join(" "),
            }),
            Some("error") => single(ClientCommand::UploadTransportError),
            _ => return Err("expected upload start|progress|response|error".to_owned()),
        },
        other => return Err(format!("unknown command {other}, try help")),
    };
    Ok(parsed)
}

fn parse_calibration<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<ReplLine, String> {
    let action = words.next().ok_or("missing calibration action")?;
    let command = match action {
        "reset" => ClientCommand::ResetCalibration,
        "save" => ClientCommand::SaveCalibration,
        "center-all" => ClientCommand::CenterAll,
        _ => {
            let index = number(words.next(), "servo")?;
            match action {
                "min" => ClientCommand::AdjustMin {
                    index,
                    delta: number(words.next(), "delta")?,
                },
                "max" => ClientCommand::AdjustMax {
                    index,
                    delta: number(words.next(), "delta")?,
                },
                "center" => ClientCommand::SetCenter {
                    index,
                    value: number(words.next(), "center")?,
                },
                "test" => ClientCommand::TestPosition {
                    index,
                    value: number(words.next(), "position")?,
                },
                "pin" => ClientCommand::SetServoPin {
                    index,
                    pin: number(words.next(), "gpio")?,
                },
                "invert" => ClientCommand::SetInvert {
                    index,
                    invert: switch(words.next())?,
                },
                other => return Err(format!("unknown calibration action {other}")),
            }
        }
    };
    Ok(single(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaze_is_a_full_gesture() {
        assert_eq!(
            parse_line("gaze 10 -20"),
            Ok(ReplLine::Commands(vec![
                ClientCommand::BeginGesture(Gesture::GazePad),
                ClientCommand::Gaze { x: 10, y: -20 },
                ClientCommand::EndGesture(Gesture::GazePad),
            ]))
        );
    }

    #[test]
    fn set_keeps_spaces_and_flags() {
        assert_eq!(
            parse_line("set mdns hostname My Device!!"),
            Ok(single(ClientCommand::SetField {
                section: Section::Mdns,
                key: "hostname".to_owned(),
                value: FieldValue::Text("My Device!!".to_owned()),
            }))
        );
        assert_eq!(
            parse_line("set ap keepAP false"),
            Ok(single(ClientCommand::SetField {
                section: Section::Ap,
                key: "keepAP".to_owned(),
                value: FieldValue::Flag(false),
            }))
        );
    }

    #[test]
    fn calibration_commands() {
        assert_eq!(
            parse_line("cal min 2 -1"),
            Ok(single(ClientCommand::AdjustMin { index: 2, delta: -1 }))
        );
        assert_eq!(
            parse_line("cal invert 0 on"),
            Ok(single(ClientCommand::SetInvert {
                index: 0,
                invert: true
            }))
        );
        assert!(parse_line("cal spin 0 1").is_err());
    }

    #[test]
    fn errors_and_blank_lines() {
        assert_eq!(parse_line("   "), Ok(ReplLine::Empty));
        assert!(parse_line("gaze ten 0").is_err());
        assert!(parse_line("save nowhere").is_err());
        assert!(parse_line("frobnicate").is_err());
        assert_eq!(parse_line("quit"), Ok(ReplLine::Quit));
    }
}
