//! External control commands.

use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Fixed response for every command except `status`.
pub const DEFAULT_RESPONSE: &str = "OK";

/// A command received on the external control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Terminate the process (an outer service manager restarts it)
    Restart,
    /// Clear every source's silence window
    Reset,
    /// Send one photo from every source on its next processed frame
    GetPhotos,
    Arming,
    Disarming,
    /// Report the armed state
    Status,
    /// Run the configured home-automation scene
    RunScene,
    /// Exchange a home-automation auth code for tokens
    SaveCode(String),
}

impl FromStr for ControlCommand {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "restart" => Ok(Self::Restart),
            "reset" => Ok(Self::Reset),
            "get_photos" => Ok(Self::GetPhotos),
            "arming" => Ok(Self::Arming),
            "disarming" => Ok(Self::Disarming),
            "status" => Ok(Self::Status),
            "run_scene" => Ok(Self::RunScene),
            _ => match s.strip_prefix("save_code:") {
                Some(code) if !code.trim().is_empty() => Ok(Self::SaveCode(code.trim().to_string())),
                _ => Err(ModelError::UnknownCommand(s.to_string())),
            },
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Restart => write!(f, "restart"),
            Self::Reset => write!(f, "reset"),
            Self::GetPhotos => write!(f, "get_photos"),
            Self::Arming => write!(f, "arming"),
            Self::Disarming => write!(f, "disarming"),
            Self::Status => write!(f, "status"),
            Self::RunScene => write!(f, "run_scene"),
            // the code is a credential, keep it out of logs
            Self::SaveCode(_) => write!(f, "save_code:<redacted>"),
        }
    }
}
