//! Scenario file support for the `srt-filter-cli` tool
//!
//! A scenario describes one loopback run: the session both ends share, the
//! filter configuration string, and which data packets the simulated
//! channel drops.

use serde::{Deserialize, Serialize};
use srt_filter::session::DEFAULT_LIVE_PAYLOAD_SIZE;
use srt_filter::{SessionError, SessionParameters};
use srt_protocol::SeqNumber;
use std::fs;
use std::path::Path;

/// Session shared by the simulated sender and receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Socket id stamped into control packets
    #[serde(default = "default_socket_id")]
    pub socket_id: u32,
    /// Initial sequence number (both directions)
    #[serde(default)]
    pub isn: u32,
    /// Payload size of every packet
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,
}

fn default_socket_id() -> u32 {
    0x1000
}

fn default_payload_size() -> usize {
    DEFAULT_LIVE_PAYLOAD_SIZE
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            socket_id: default_socket_id(),
            isn: 0,
            payload_size: default_payload_size(),
        }
    }
}

impl SessionConfig {
    pub fn to_parameters(&self) -> Result<SessionParameters, SessionError> {
        let isn = SeqNumber::new_unchecked(self.isn);
        SessionParameters::new(self.socket_id, isn, isn, self.payload_size)
    }
}

/// Filter section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSection {
    /// Configuration string, e.g. `fec,cols:10,rows:5`
    pub config: String,
}

/// Run parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of data packets to send
    #[serde(default = "default_packets")]
    pub packets: u32,
    /// Offsets (from the ISN) of data packets the channel drops
    #[serde(default)]
    pub drop: Vec<u32>,
    /// Drop every filter control packet
    #[serde(default)]
    pub drop_control: bool,
}

fn default_packets() -> u32 {
    100
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            packets: default_packets(),
            drop: Vec::new(),
            drop_control: false,
        }
    }
}

/// Complete scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub session: SessionConfig,
    pub filter: FilterSection,
    #[serde(default)]
    pub run: RunConfig,
}

impl ScenarioConfig {
    /// Scenario with default session and run settings
    pub fn with_filter(config: &str) -> Self {
        ScenarioConfig {
            session: SessionConfig::default(),
            filter: FilterSection {
                config: config.to_string(),
            },
            run: RunConfig::default(),
        }
    }

    /// Load scenario from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path)?;
        let scenario: ScenarioConfig = toml::from_str(&contents)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Save scenario to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ScenarioError> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ScenarioError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check what the filter itself does not: run bounds
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.run.packets == 0 {
            return Err(ScenarioError::Invalid("run.packets must be positive".into()));
        }
        if let Some(offset) = self.run.drop.iter().find(|d| **d >= self.run.packets) {
            return Err(ScenarioError::Invalid(format!(
                "drop offset {} is outside the {} packet run",
                offset, self.run.packets
            )));
        }
        Ok(())
    }

    /// Example: row/column FEC with a burst loss the columns can repair
    pub fn example() -> Self {
        ScenarioConfig {
            session: SessionConfig {
                socket_id: 0x2a,
                isn: 1000,
                payload_size: DEFAULT_LIVE_PAYLOAD_SIZE,
            },
            filter: FilterSection {
                config: "fec,cols:10,rows:5,arq:onreq".to_string(),
            },
            run: RunConfig {
                packets: 100,
                drop: vec![3, 4, 5, 57],
                drop_control: false,
            },
        }
    }
}

/// Scenario errors
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_roundtrip() {
        let scenario = ScenarioConfig::example();
        let text = scenario.to_toml().unwrap();
        let parsed: ScenarioConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, scenario);
    }

    #[test]
    fn test_defaults_applied() {
        let parsed: ScenarioConfig = toml::from_str(
            r#"
            [filter]
            config = "arq,arq:always"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.session, SessionConfig::default());
        assert_eq!(parsed.run.packets, 100);
        assert!(parsed.run.drop.is_empty());
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_drop_outside_run() {
        let mut scenario = ScenarioConfig::with_filter("noop");
        scenario.run.packets = 10;
        scenario.run.drop = vec![10];
        assert!(matches!(scenario.validate(), Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_session_parameters() {
        let mut session = SessionConfig::default();
        session.isn = 7;
        let params = session.to_parameters().unwrap();
        assert_eq!(params.rcv_isn(), SeqNumber::new(7));
        assert_eq!(params.snd_isn(), SeqNumber::new(7));

        session.payload_size = 0;
        assert!(session.to_parameters().is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("srt-filter-scenario-{}.toml", std::process::id()));
        let scenario = ScenarioConfig::example();
        scenario.to_file(&path).unwrap();
        let loaded = ScenarioConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, scenario);
    }
}
