//! Line-oriented console front end
//!
//! Each stdin line is one command. Replies are short plain-text lines
//! addressed to the acting user.

use std::time::Duration;
use thiserror::Error;
use timeclock_api::{Action, ActionRejection, EventKind, StartRejection};
use timeclock_core::{Coordinator, CoordinatorError};
use timeclock_util::{PanelId, UserId, format_clock_time, format_datetime_full, format_duration};

const DEFAULT_LOG_LIMIT: usize = 20;

const HELP: &str = "\
commands:
  start <user> [display name...]   clock in and open a panel
  open <user>                      open a panel without clocking in
  pause <user>                     start a break
  resume <user>                    return from a break
  finish <user>                    clock out
  panel <panel-id> <actor> entry|pause|resume|finish
  status <user>                    current cycle state and panel
  history <user>                   all events for a user
  log [limit]                      most recent events
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start {
        user: UserId,
        display_name: Option<String>,
    },
    Open(UserId),
    Pause(UserId),
    Resume(UserId),
    Finish(UserId),
    Panel {
        panel_id: PanelId,
        actor: UserId,
        action: Action,
    },
    Status(UserId),
    History(UserId),
    Log(usize),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid panel id '{0}'")]
    InvalidPanel(String),

    #[error("unknown panel action '{0}'")]
    InvalidAction(String),
}

fn user_arg(arg: Option<&str>, usage: &'static str) -> Result<UserId, ParseError> {
    arg.map(UserId::new).ok_or(ParseError::Usage(usage))
}

fn parse_action(word: &str) -> Result<Action, ParseError> {
    match word {
        "entry" => Ok(Action::StartEntry),
        "pause" => Ok(Action::StartPause),
        "resume" => Ok(Action::Resume),
        "finish" => Ok(Action::FinishExit),
        other => Err(ParseError::InvalidAction(other.to_string())),
    }
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let command = match verb.to_lowercase().as_str() {
            "start" => {
                let user = user_arg(words.next(), "start <user> [display name...]")?;
                let rest: Vec<&str> = words.collect();
                Command::Start {
                    user,
                    display_name: (!rest.is_empty()).then(|| rest.join(" ")),
                }
            }
            "open" => Command::Open(user_arg(words.next(), "open <user>")?),
            "pause" => Command::Pause(user_arg(words.next(), "pause <user>")?),
            "resume" => Command::Resume(user_arg(words.next(), "resume <user>")?),
            "finish" => Command::Finish(user_arg(words.next(), "finish <user>")?),
            "panel" => {
                const USAGE: &str = "panel <panel-id> <actor> entry|pause|resume|finish";
                let (Some(id), Some(actor), Some(action)) =
                    (words.next(), words.next(), words.next())
                else {
                    return Err(ParseError::Usage(USAGE));
                };
                Command::Panel {
                    panel_id: id
                        .parse()
                        .map_err(|_| ParseError::InvalidPanel(id.to_string()))?,
                    actor: UserId::new(actor),
                    action: parse_action(action)?,
                }
            }
            "status" => Command::Status(user_arg(words.next(), "status <user>")?),
            "history" => Command::History(user_arg(words.next(), "history <user>")?),
            "log" => match words.next() {
                Some(n) => Command::Log(n.parse().map_err(|_| ParseError::Usage("log [limit]"))?),
                None => Command::Log(DEFAULT_LOG_LIMIT),
            },
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };

        Ok(Some(command))
    }
}

fn start_rejection_text(rejection: &StartRejection) -> String {
    match rejection {
        StartRejection::CooldownActive { remaining_seconds } => format!(
            "you just finished a cycle; wait {} before starting a new one",
            format_duration(Duration::from_secs(*remaining_seconds))
        ),
        other => other.to_string(),
    }
}

fn failure_text<R>(err: &CoordinatorError<R>, describe: impl Fn(&R) -> String) -> String {
    match err {
        CoordinatorError::Rejected(r) => describe(r),
        CoordinatorError::Storage(_) => "could not record that right now, please try again".into(),
    }
}

fn action_failure(err: &CoordinatorError<ActionRejection>) -> String {
    failure_text(err, ActionRejection::to_string)
}

fn recorded_text(user: &UserId, kind: EventKind, at: &chrono::DateTime<chrono::Local>) -> String {
    let what = match kind {
        EventKind::Entry => "entry recorded",
        EventKind::Pause => "break started",
        EventKind::Resume => "back from break",
        EventKind::Exit => "exit recorded",
    };
    format!("{user}: {what} at {}", format_clock_time(at))
}

/// Run a parsed command and produce the reply text
pub fn execute(coordinator: &Coordinator, command: &Command) -> String {
    match command {
        Command::Start { user, display_name } => {
            let name = display_name.as_deref().unwrap_or(user.as_str());
            match coordinator.start_cycle(user, name) {
                Ok(started) => format!(
                    "{} (panel {})",
                    recorded_text(user, EventKind::Entry, &started.at),
                    started.panel.panel_id
                ),
                Err(e) => failure_text(&e, start_rejection_text),
            }
        }
        Command::Open(user) => match coordinator.request_start(user) {
            Ok(token) => format!("{user}: panel {} opened", token.panel_id),
            Err(rejection) => start_rejection_text(&rejection),
        },
        Command::Pause(user) => match coordinator.pause(user) {
            Ok(at) => recorded_text(user, EventKind::Pause, &at),
            Err(e) => action_failure(&e),
        },
        Command::Resume(user) => match coordinator.resume(user) {
            Ok(at) => recorded_text(user, EventKind::Resume, &at),
            Err(e) => action_failure(&e),
        },
        Command::Finish(user) => match coordinator.finish(user) {
            Ok(at) => recorded_text(user, EventKind::Exit, &at),
            Err(e) => action_failure(&e),
        },
        Command::Panel {
            panel_id,
            actor,
            action,
        } => match coordinator.act_on_panel(*panel_id, actor, *action) {
            Ok(t) => recorded_text(actor, t.event.kind, &t.event.timestamp),
            Err(e) => action_failure(&e),
        },
        Command::Status(user) => match coordinator.state(user) {
            Ok(state) => {
                let panel = coordinator
                    .session(user)
                    .and_then(|s| s.panel_id)
                    .map(|id| format!(", panel {id}"))
                    .unwrap_or_default();
                format!("{user}: {state}{panel}")
            }
            Err(_) => "could not read attendance right now".into(),
        },
        Command::History(user) => match coordinator.history(user) {
            Ok(events) if events.is_empty() => format!("{user}: no events"),
            Ok(events) => events
                .iter()
                .map(|e| format!("{}  {}", format_datetime_full(&e.timestamp), e.kind))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(_) => "could not read attendance right now".into(),
        },
        Command::Log(limit) => match coordinator.recent(*limit) {
            Ok(events) if events.is_empty() => "no events".into(),
            Ok(events) => events
                .iter()
                .map(|e| {
                    format!(
                        "{}  {} ({})  {}",
                        format_datetime_full(&e.timestamp),
                        e.user_id,
                        e.display_name,
                        e.kind
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Err(_) => "could not read attendance right now".into(),
        },
        Command::Help => HELP.to_string(),
        Command::Quit => "bye".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::sync::Arc;
    use timeclock_config::SessionPolicy;
    use timeclock_core::{AttendanceMachine, SessionRegistry};
    use timeclock_store::{EventLog, MemoryStore};
    use timeclock_util::ManualClock;

    fn coordinator() -> (Coordinator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Local.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let coordinator = Coordinator::new(
            AttendanceMachine::new(EventLog::new(store)),
            Arc::new(SessionRegistry::new()),
            clock.clone(),
            SessionPolicy::default(),
        );
        (coordinator, clock)
    }

    fn run(coordinator: &Coordinator, line: &str) -> String {
        let command = Command::parse(line).unwrap().unwrap();
        execute(coordinator, &command)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(
            Command::parse("start U1 Ada Lovelace").unwrap(),
            Some(Command::Start {
                user: UserId::new("U1"),
                display_name: Some("Ada Lovelace".into()),
            })
        );
        assert_eq!(
            Command::parse("START U1").unwrap(),
            Some(Command::Start {
                user: UserId::new("U1"),
                display_name: None,
            })
        );
        assert_eq!(Command::parse("log").unwrap(), Some(Command::Log(DEFAULT_LOG_LIMIT)));
        assert_eq!(Command::parse("log 5").unwrap(), Some(Command::Log(5)));

        let id = PanelId::new();
        assert_eq!(
            Command::parse(&format!("panel {id} U2 finish")).unwrap(),
            Some(Command::Panel {
                panel_id: id,
                actor: UserId::new("U2"),
                action: Action::FinishExit,
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Command::parse("dance"),
            Err(ParseError::Unknown("dance".into()))
        );
        assert_eq!(
            Command::parse("pause"),
            Err(ParseError::Usage("pause <user>"))
        );
        assert_eq!(
            Command::parse("panel nope U1 pause"),
            Err(ParseError::InvalidPanel("nope".into()))
        );
        assert!(matches!(
            Command::parse(&format!("panel {} U1 dance", PanelId::new())),
            Err(ParseError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_cycle_replies() {
        let (coordinator, clock) = coordinator();

        let reply = run(&coordinator, "start U1 Ada");
        assert!(reply.starts_with("U1: entry recorded at 09:00:00 (panel "), "{reply}");

        assert_eq!(run(&coordinator, "status U1").split(',').next(), Some("U1: working"));

        clock.advance_secs(30);
        assert_eq!(run(&coordinator, "pause U1"), "U1: break started at 09:00:30");
        assert_eq!(
            run(&coordinator, "pause U1"),
            ActionRejection::PauseAlreadyActive.to_string()
        );
        assert_eq!(run(&coordinator, "resume U1"), "U1: back from break at 09:00:30");
        assert_eq!(run(&coordinator, "finish U1"), "U1: exit recorded at 09:00:30");
        assert_eq!(run(&coordinator, "status U1"), "U1: idle");

        assert_eq!(
            run(&coordinator, "start U1"),
            "you just finished a cycle; wait 2m 0s before starting a new one"
        );
        assert_eq!(run(&coordinator, "history U1").lines().count(), 4);
        assert!(run(&coordinator, "log 2").contains("U1 (Ada)  exit"));
    }

    #[test]
    fn test_panel_replies() {
        let (coordinator, _) = coordinator();

        let reply = run(&coordinator, "open U1");
        let panel_id = reply
            .trim_start_matches("U1: panel ")
            .trim_end_matches(" opened")
            .to_string();

        assert_eq!(
            run(&coordinator, &format!("panel {panel_id} U2 entry")),
            ActionRejection::NotOwner.to_string()
        );
        assert_eq!(
            run(&coordinator, &format!("panel {panel_id} U1 entry")),
            "U1: entry recorded at 09:00:00"
        );
        run(&coordinator, &format!("panel {panel_id} U1 finish"));
        assert_eq!(
            run(&coordinator, &format!("panel {panel_id} U1 pause")),
            ActionRejection::PanelClosed.to_string()
        );
    }

    #[test]
    fn test_help_and_quit_replies() {
        let (coordinator, _) = coordinator();

        assert_eq!(run(&coordinator, "help"), HELP);
        assert_eq!(run(&coordinator, "?"), HELP);
        assert_eq!(run(&coordinator, "quit"), "bye");
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Quit));
    }
}
