//! Line-oriented serial console.
//!
//! Each input line becomes one [`AppCommand`] pushed onto the request
//! queue; the scheduler loop applies it between ticks.
//!
//! | Line               | Command                        |
//! |--------------------|--------------------------------|
//! | `calibrate`        | `BeginCalibration`             |
//! | `cancel`           | `CancelCalibration`            |
//! | `reset`            | `ResetCounters`                |
//! | `kwh <value>`      | `SetConsumption(value)`        |
//! | `save`             | `SaveState`                    |
//! | `import <json>`    | `ApplySettings(..)`            |
//! | `restart`          | `Restart`                      |
//! | `factory-reset`    | `FactoryReset`                 |

use core::fmt;
use std::io::BufRead;

use log::{info, warn};

use crate::app::commands::AppCommand;
use crate::app::ports::ConfigError;
use crate::config::import_settings;
use crate::engine::meter::MAX_CONSUMPTION_KWH;
use crate::requests;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleError {
    Empty,
    Unknown,
    MissingArgument(&'static str),
    BadNumber,
    OutOfRange,
    Settings(ConfigError),
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty line"),
            Self::Unknown => write!(f, "unknown command"),
            Self::MissingArgument(cmd) => write!(f, "{} needs an argument", cmd),
            Self::BadNumber => write!(f, "not a number"),
            Self::OutOfRange => write!(f, "value out of range"),
            Self::Settings(e) => write!(f, "settings: {}", e),
        }
    }
}

pub fn parse_line(line: &str) -> Result<AppCommand, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ConsoleError::Empty);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((w, r)) => (w, r.trim()),
        None => (line, ""),
    };

    match word {
        "calibrate" => Ok(AppCommand::BeginCalibration),
        "cancel" => Ok(AppCommand::CancelCalibration),
        "reset" => Ok(AppCommand::ResetCounters),
        "save" => Ok(AppCommand::SaveState),
        "restart" => Ok(AppCommand::Restart),
        "factory-reset" => Ok(AppCommand::FactoryReset),
        "kwh" => {
            if rest.is_empty() {
                return Err(ConsoleError::MissingArgument("kwh"));
            }
            let kwh: f64 = rest.parse().map_err(|_| ConsoleError::BadNumber)?;
            if !kwh.is_finite() || kwh < 0.0 {
                return Err(ConsoleError::BadNumber);
            }
            if kwh > MAX_CONSUMPTION_KWH {
                return Err(ConsoleError::OutOfRange);
            }
            Ok(AppCommand::SetConsumption(kwh))
        }
        "import" => {
            if rest.is_empty() {
                return Err(ConsoleError::MissingArgument("import"));
            }
            import_settings(rest)
                .map(AppCommand::ApplySettings)
                .map_err(ConsoleError::Settings)
        }
        _ => Err(ConsoleError::Unknown),
    }
}

/// Read commands from `input` until EOF, queueing each valid one.
pub fn run<R: BufRead>(input: R) {
    for line in input.lines() {
        let Ok(line) = line else { break };
        match parse_line(&line) {
            Ok(cmd) => {
                info!("console: {:?}", cmd);
                requests::submit(cmd);
            }
            Err(ConsoleError::Empty) => {}
            Err(e) => warn!("console: {}", e),
        }
    }
}

/// Spawn the stdin reader on its own thread.
pub fn spawn() -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("console".into())
        .stack_size(6 * 1024)
        .spawn(|| run(std::io::stdin().lock()))
}
