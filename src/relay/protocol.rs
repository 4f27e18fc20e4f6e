use serde::{Deserialize, Serialize};

/// Byte strings written to the relay board.
///
/// Defaults match the common single-channel LCUS-1 USB relay: start byte
/// `0xA0`, channel, state, checksum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayProtocol {
    pub on: Vec<u8>,
    pub off: Vec<u8>,
    /// Harmless command used for the connect handshake and health checks.
    pub ping: Vec<u8>,
}

impl RelayProtocol {
    /// LCUS-style frame for `channel` set to `state`.
    pub fn lcus_command(channel: u8, state: bool) -> Vec<u8> {
        let state = u8::from(state);
        let checksum = 0xA0u8.wrapping_add(channel).wrapping_add(state);
        vec![0xA0, channel, state, checksum]
    }

    pub fn lcus(channel: u8) -> Self {
        let off = Self::lcus_command(channel, false);
        Self {
            on: Self::lcus_command(channel, true),
            ping: off.clone(),
            off,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, bytes) in [("on", &self.on), ("off", &self.off), ("ping", &self.ping)] {
            if bytes.is_empty() {
                return Err(format!("{name} command must not be empty"));
            }
        }
        if self.on == self.off {
            return Err("on and off commands must differ".to_string());
        }
        Ok(())
    }
}

impl Default for RelayProtocol {
    fn default() -> Self {
        Self::lcus(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcus_defaults_match_board_commands() {
        let protocol = RelayProtocol::default();
        assert_eq!(protocol.on, vec![0xA0, 0x01, 0x01, 0xA2]);
        assert_eq!(protocol.off, vec![0xA0, 0x01, 0x00, 0xA1]);
        assert_eq!(protocol.ping, protocol.off);
        assert!(protocol.validate().is_ok());
    }

    #[test]
    fn identical_on_off_is_rejected() {
        let protocol = RelayProtocol {
            on: vec![1],
            off: vec![1],
            ping: vec![1],
        };
        assert!(protocol.validate().is_err());
    }
}
