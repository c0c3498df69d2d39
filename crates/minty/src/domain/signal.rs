use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown signal '{0}'. Must be one of: SIGINT, SIGTSTP, EOF")]
pub struct UnknownSignal(pub String);

/// Terminal-driver signals delivered as control bytes on the PTY input
/// stream rather than through `kill(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Interrupt,
    Suspend,
    EndOfFile,
}

impl SignalKind {
    pub fn control_byte(self) -> u8 {
        match self {
            SignalKind::Interrupt => 0x03,
            SignalKind::Suspend => 0x1A,
            SignalKind::EndOfFile => 0x04,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Interrupt => "SIGINT",
            SignalKind::Suspend => "SIGTSTP",
            SignalKind::EndOfFile => "EOF",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SIGINT" | "INT" => Ok(SignalKind::Interrupt),
            "SIGTSTP" | "TSTP" => Ok(SignalKind::Suspend),
            "EOF" => Ok(SignalKind::EndOfFile),
            _ => Err(UnknownSignal(s.to_string())),
        }
    }
}
