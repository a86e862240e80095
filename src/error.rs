// MIT License - Copyright (c) 2026 Peter Wright
// Error types

use std::fmt;

/// Result codes carried by the panel's `0xEF` answer to a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// 0x00 - OK
    Ok,
    /// 0x01 - User code not found
    UserCodeNotFound,
    /// 0x02 - No access
    NoAccess,
    /// 0x03 - Selected user does not exist
    UserDoesNotExist,
    /// 0x04 - Selected user already exists
    UserAlreadyExists,
    /// 0x05 - Wrong code or code already exists
    WrongCode,
    /// 0x06 - Telephone code already exists
    TelephoneCodeExists,
    /// 0x07 - Changed code is the same
    CodeUnchanged,
    /// 0x08 - Other error
    Other,
    /// 0x11 - Cannot arm, but force arm is possible
    CannotArmForceAvailable,
    /// 0x12 - Cannot arm
    CannotArm,
    /// 0xFF - Command accepted, will be processed
    Accepted,
    /// Any code not listed in the protocol documentation
    Unknown(u8),
}

impl ResultCode {
    pub fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::Ok,
            0x01 => Self::UserCodeNotFound,
            0x02 => Self::NoAccess,
            0x03 => Self::UserDoesNotExist,
            0x04 => Self::UserAlreadyExists,
            0x05 => Self::WrongCode,
            0x06 => Self::TelephoneCodeExists,
            0x07 => Self::CodeUnchanged,
            0x08 => Self::Other,
            0x11 => Self::CannotArmForceAvailable,
            0x12 => Self::CannotArm,
            0xFF => Self::Accepted,
            other => Self::Unknown(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Ok => 0x00,
            Self::UserCodeNotFound => 0x01,
            Self::NoAccess => 0x02,
            Self::UserDoesNotExist => 0x03,
            Self::UserAlreadyExists => 0x04,
            Self::WrongCode => 0x05,
            Self::TelephoneCodeExists => 0x06,
            Self::CodeUnchanged => 0x07,
            Self::Other => 0x08,
            Self::CannotArmForceAvailable => 0x11,
            Self::CannotArm => 0x12,
            Self::Accepted => 0xFF,
            Self::Unknown(b) => *b,
        }
    }

    /// Whether the panel took the command.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::Accepted)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::UserCodeNotFound => "User code not found",
            Self::NoAccess => "No access",
            Self::UserDoesNotExist => "Selected user does not exist",
            Self::UserAlreadyExists => "Selected user already exists",
            Self::WrongCode => "Wrong code or code already exists",
            Self::TelephoneCodeExists => "Telephone code already exists",
            Self::CodeUnchanged => "Changed code is the same",
            Self::Other => "Other error",
            Self::CannotArmForceAvailable => "Cannot arm, but can use force arm",
            Self::CannotArm => "Cannot arm",
            Self::Accepted => "Command accepted",
            Self::Unknown(_) => "Unknown result code",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}: {}", self.as_byte(), self.description())
    }
}

/// All errors that can occur while talking to the panel.
#[derive(Debug, thiserror::Error)]
pub enum SatelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Command timeout: 0x{command:02X}")]
    CommandTimeout { command: u8 },

    #[error("Command rejected by panel: {0}")]
    Rejected(ResultCode),

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("Too many checksum errors (exceeded limit of {limit})")]
    ChecksumLimitExceeded { limit: u32 },

    #[error("Invalid user code")]
    InvalidCode,

    #[error("Invalid arm mode: {0} (must be 0-3)")]
    InvalidArmMode(u8),

    #[error("Invalid device number: {id} (max: {max})")]
    InvalidDeviceId { id: u32, max: u32 },

    #[error("Invalid frame: {details}")]
    InvalidFrame { details: String },

    #[error("Monitoring not accepted by panel: {0}")]
    MonitoringRejected(ResultCode),

    #[error("Not connected")]
    Disconnected,

    #[error("Client closed")]
    Closed,

    #[error("Channel closed")]
    ChannelClosed,
}

impl SatelError {
    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SatelError::Io(_)
                | SatelError::ConnectionTimeout
                | SatelError::CommandTimeout { .. }
                | SatelError::Disconnected
                | SatelError::ChecksumMismatch
                | SatelError::ChecksumLimitExceeded { .. }
                | SatelError::ChannelClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, SatelError>;

/// Errors raised while loading or validating the bridge configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("You need to specify alarm code to use switchable_outputs")]
    AlarmCodeRequired,

    #[error("Invalid arm_home_mode {mode} for partition {partition} (must be 0-3)")]
    InvalidArmHomeMode { partition: u32, mode: u8 },

    #[error("Invalid {kind} number {id} (must be 1-{max})")]
    InvalidNumber { kind: &'static str, id: u32, max: u32 },

    #[error("{kind} {id} is configured more than once")]
    Duplicate { kind: &'static str, id: u32 },

    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),

    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Invalid MQTT URL {url}: {reason}")]
    InvalidMqttUrl { url: String, reason: &'static str },
}

/// Errors that abort setting up the integration.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to connect to panel: {0}")]
    Connect(#[source] SatelError),
}
