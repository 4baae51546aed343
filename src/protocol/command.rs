//! Command opcodes for the CMS50D+ protocol.
//!
//! Commands travel as `Command` packages whose first payload byte is the
//! opcode, optionally followed by parameters.

/// Command opcodes sent to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandOpcode {
    /// Start streaming realtime measurements.
    StartRealtime = 0xA1,
    /// Stop streaming realtime measurements.
    StopRealtime = 0xA2,
    /// Start transferring a stored segment (followed by user index and segment).
    StartStorage = 0xA6,
    /// Stop transferring stored data.
    StopStorage = 0xA7,
    /// Keep the device from timing out.
    Keepalive = 0xAF,
}

impl From<CommandOpcode> for u8 {
    fn from(cmd: CommandOpcode) -> Self {
        cmd as Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_opcode_values() {
        assert_eq!(CommandOpcode::StartRealtime as u8, 0xa1);
        assert_eq!(CommandOpcode::StopRealtime as u8, 0xa2);
        assert_eq!(CommandOpcode::StartStorage as u8, 0xa6);
        assert_eq!(CommandOpcode::StopStorage as u8, 0xa7);
        assert_eq!(CommandOpcode::Keepalive as u8, 0xaf);
    }

    #[test]
    fn test_command_from_conversion() {
        let cmd: u8 = CommandOpcode::Keepalive.into();
        assert_eq!(cmd, 0xaf);
    }
}
