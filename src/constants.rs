// MIT License - Copyright (c) 2026 Peter Wright
// Satel INTEGRA (INT-RS / ETHM-1) protocol constants

/// Protocol framing bytes.
pub const FRAME_SYNC: u8 = 0xFE; // Start-of-frame marker, doubled on the wire
pub const FRAME_END: u8 = 0x0D; // Follows FRAME_SYNC to close a frame
pub const STUFFED: u8 = 0xF0; // Follows FRAME_SYNC when 0xFE appears in the body

/// Initial value of the frame checksum.
pub const CRC_SEED: u16 = 0x147A;

/// Default ETHM-1 integration port.
pub const DEFAULT_PORT: u16 = 7094;

/// Size in bytes of an encoded user code (16 BCD nibbles, `F`-padded).
pub const CODE_LEN: usize = 8;
/// Size in bytes of the zone bitmask sent with arm/disarm/clear commands.
pub const ZONE_MASK_LEN: usize = 4;
/// Size in bytes of the output bitmask sent with output on/off commands.
pub const OUTPUT_MASK_LEN: usize = 16;
/// Size in bytes of the start-monitoring command bitmask.
pub const MONITOR_MASK_LEN: usize = 12;

/// Command and notification codes.
pub mod cmd {
    /// Violated inputs (notification / query)
    pub const ZONES_VIOLATION: u8 = 0x00;
    /// Active outputs (notification / query)
    pub const OUTPUTS_STATE: u8 = 0x17;
    /// Start monitoring: payload is a bitmask of the notifications to push
    pub const START_MONITORING: u8 = 0x7F;
    /// Read device name; used as the keep-alive query
    pub const READ_DEVICE_NAME: u8 = 0xEE;
    /// Result of the last control command
    pub const RESULT: u8 = 0xEF;
    /// Arm in mode 0; modes 1-3 follow at 0x81-0x83
    pub const ARM_MODE0: u8 = 0x80;
    pub const DISARM: u8 = 0x84;
    pub const CLEAR_ALARM: u8 = 0x85;
    pub const OUTPUTS_ON: u8 = 0x88;
    pub const OUTPUTS_OFF: u8 = 0x89;
}

/// Partition-level state tags reported by the panel.
///
/// Each tag is pushed by a dedicated notification command whose payload is the
/// bitmask of zones currently in that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlarmState {
    ArmedMode0,
    ArmedMode1,
    ArmedMode2,
    ArmedMode3,
    ArmedSuppressed,
    EntryTime,
    ExitCountdownOver10,
    ExitCountdownUnder10,
    Triggered,
    TriggeredFire,
}

impl AlarmState {
    /// Every tag, in notification-code order.
    pub const ALL: [AlarmState; 10] = [
        AlarmState::ArmedSuppressed,
        AlarmState::ArmedMode0,
        AlarmState::ArmedMode2,
        AlarmState::ArmedMode3,
        AlarmState::EntryTime,
        AlarmState::ExitCountdownOver10,
        AlarmState::ExitCountdownUnder10,
        AlarmState::Triggered,
        AlarmState::TriggeredFire,
        AlarmState::ArmedMode1,
    ];

    /// Notification command that carries this tag.
    pub fn command(&self) -> u8 {
        match self {
            Self::ArmedSuppressed => 0x09,
            Self::ArmedMode0 => 0x0A,
            Self::ArmedMode2 => 0x0B,
            Self::ArmedMode3 => 0x0C,
            Self::EntryTime => 0x0E,
            Self::ExitCountdownOver10 => 0x0F,
            Self::ExitCountdownUnder10 => 0x10,
            Self::Triggered => 0x13,
            Self::TriggeredFire => 0x14,
            Self::ArmedMode1 => 0x2A,
        }
    }

    /// Map a notification command back to its tag.
    pub fn from_command(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.command() == code)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ArmedMode0 => "Armed (mode 0)",
            Self::ArmedMode1 => "Armed (mode 1)",
            Self::ArmedMode2 => "Armed (mode 2)",
            Self::ArmedMode3 => "Armed (mode 3)",
            Self::ArmedSuppressed => "Armed (suppressed)",
            Self::EntryTime => "Entry time",
            Self::ExitCountdownOver10 => "Exit time > 10s",
            Self::ExitCountdownUnder10 => "Exit time < 10s",
            Self::Triggered => "Alarm",
            Self::TriggeredFire => "Fire alarm",
        }
    }
}

/// Notification commands requested from the panel when monitoring starts.
pub fn monitored_commands() -> Vec<u8> {
    let mut cmds = vec![cmd::ZONES_VIOLATION, cmd::OUTPUTS_STATE];
    cmds.extend(AlarmState::ALL.iter().map(AlarmState::command));
    cmds.sort_unstable();
    cmds
}
