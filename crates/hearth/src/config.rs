//! Daemon configuration: defaults, then a TOML file, then CLI overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hearth_session::{PasswordScheme, SessionConfig};
use serde::Deserialize;

use crate::HearthError;

/// Everything `hearthd` can be configured with.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HearthConfig {
    pub transport: TransportSection,
    pub store: StoreSection,
    pub presence: PresenceSection,
    pub auth: AuthSection,
    pub dispatch: DispatchSection,
}

/// `[transport]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportSection {
    /// Address the WebSocket gateway listens on.
    pub listen: String,
    /// Topic the dispatcher subscribes to on a pub/sub transport such as
    /// `MemoryBus`. The WebSocket gateway has a single socket set and
    /// ignores it, so `hearthd` takes no flag for it.
    pub read_topic: String,
    /// Topic the relay publishes on.
    pub publish_topic: String,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            read_topic: default_read_topic(),
            publish_topic: default_publish_topic(),
        }
    }
}

/// `[store]`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    /// JSON seed with users and zones. Without one the store starts empty.
    pub seed: Option<PathBuf>,
}

/// `[presence]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresenceSection {
    pub sweep_interval_secs: u64,
    pub expiry_secs: u64,
    pub state_refreshes_liveness: bool,
}

impl Default for PresenceSection {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 10,
            expiry_secs: 10,
            state_refreshes_liveness: false,
        }
    }
}

/// `[auth]`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthSection {
    pub scheme: PasswordScheme,
}

/// `[dispatch]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchSection {
    /// Capacity of every work queue and of the outbound queue.
    pub queue_capacity: usize,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

fn default_listen() -> String {
    "127.0.0.1:4150".to_string()
}
fn default_read_topic() -> String {
    "glc-daemon".to_string()
}
fn default_publish_topic() -> String {
    "glc-gamestate".to_string()
}

/// Values given on the command line. `None` leaves the file value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub listen: Option<String>,
    pub publish_topic: Option<String>,
    pub seed: Option<PathBuf>,
    pub sweep_interval_secs: Option<u64>,
    pub expiry_secs: Option<u64>,
    pub state_refreshes_liveness: bool,
    pub scheme: Option<PasswordScheme>,
    pub queue_capacity: Option<usize>,
}

impl CliOverrides {
    pub fn apply(self, mut config: HearthConfig) -> HearthConfig {
        if let Some(listen) = self.listen {
            config.transport.listen = listen;
        }
        if let Some(topic) = self.publish_topic {
            config.transport.publish_topic = topic;
        }
        if self.seed.is_some() {
            config.store.seed = self.seed;
        }
        if let Some(secs) = self.sweep_interval_secs {
            config.presence.sweep_interval_secs = secs;
        }
        if let Some(secs) = self.expiry_secs {
            config.presence.expiry_secs = secs;
        }
        // A bare flag can only switch it on.
        if self.state_refreshes_liveness {
            config.presence.state_refreshes_liveness = true;
        }
        if let Some(scheme) = self.scheme {
            config.auth.scheme = scheme;
        }
        if let Some(capacity) = self.queue_capacity {
            config.dispatch.queue_capacity = capacity;
        }
        config
    }
}

impl HearthConfig {
    /// Reads `path` if given and present; otherwise starts from defaults.
    ///
    /// # Errors
    /// `ConfigRead` if the file exists but can't be read, `ConfigParse`
    /// if it isn't valid.
    pub fn load(path: Option<&Path>) -> Result<Self, HearthError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::info!(path = %path.display(), "loading config file");
        let content = std::fs::read_to_string(path).map_err(|source| HearthError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses a config from TOML text.
    ///
    /// # Errors
    /// `ConfigParse`.
    pub fn from_toml(content: &str) -> Result<Self, HearthError> {
        Ok(toml::from_str(content)?)
    }

    /// Rejects values the daemon can't run with.
    ///
    /// # Errors
    /// `ConfigInvalid` naming the first bad field.
    pub fn validated(self) -> Result<Self, HearthError> {
        if self.presence.sweep_interval_secs == 0 {
            return Err(invalid("presence.sweep_interval_secs must be at least 1"));
        }
        if self.presence.expiry_secs == 0 {
            return Err(invalid("presence.expiry_secs must be at least 1"));
        }
        if self.dispatch.queue_capacity == 0 {
            return Err(invalid("dispatch.queue_capacity must be at least 1"));
        }
        if self.transport.read_topic.is_empty() || self.transport.publish_topic.is_empty() {
            return Err(invalid("transport topics must not be empty"));
        }
        Ok(self)
    }

    /// The registry and presence settings.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sweep_interval: Duration::from_secs(self.presence.sweep_interval_secs),
            expiry: Duration::from_secs(self.presence.expiry_secs),
            state_refreshes_liveness: self.presence.state_refreshes_liveness,
            command_capacity: self.dispatch.queue_capacity,
        }
    }
}

fn invalid(message: &str) -> HearthError {
    HearthError::ConfigInvalid(message.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_load_no_path_gives_defaults() {
        let config = HearthConfig::load(None).unwrap();

        assert_eq!(config, HearthConfig::default());
        assert_eq!(config.transport.listen, "127.0.0.1:4150");
        assert_eq!(config.transport.read_topic, "glc-daemon");
        assert_eq!(config.transport.publish_topic, "glc-gamestate");
        assert_eq!(config.dispatch.queue_capacity, 256);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let config = HearthConfig::load(Some(&dir.path().join("hearth.toml"))).unwrap();

        assert_eq!(config, HearthConfig::default());
    }

    #[test]
    fn test_load_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[presence]\nexpiry_secs = 30\n\n[auth]\nscheme = \"salted-sha512\""
        )
        .unwrap();

        let config = HearthConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.presence.expiry_secs, 30);
        assert_eq!(config.presence.sweep_interval_secs, 10);
        assert_eq!(config.auth.scheme, PasswordScheme::SaltedSha512);
        assert_eq!(config.transport.read_topic, "glc-daemon");
    }

    #[test]
    fn test_from_toml_unknown_key_rejected() {
        let result = HearthConfig::from_toml("[presence]\nexpiry = 3\n");

        assert!(matches!(result, Err(HearthError::ConfigParse(_))));
    }

    #[test]
    fn test_apply_cli_beats_file_beats_default() {
        let file = HearthConfig::from_toml(
            "[transport]\nlisten = \"0.0.0.0:9000\"\nread_topic = \"from-file\"\n",
        )
        .unwrap();
        let cli = CliOverrides {
            listen: Some("0.0.0.0:9100".into()),
            state_refreshes_liveness: true,
            ..CliOverrides::default()
        };

        let config = cli.apply(file);

        assert_eq!(config.transport.listen, "0.0.0.0:9100");
        assert_eq!(config.transport.read_topic, "from-file");
        assert_eq!(config.transport.publish_topic, "glc-gamestate");
        assert!(config.presence.state_refreshes_liveness);
    }

    #[test]
    fn test_validated_rejects_zero_values() {
        for toml in [
            "[presence]\nsweep_interval_secs = 0\n",
            "[presence]\nexpiry_secs = 0\n",
            "[dispatch]\nqueue_capacity = 0\n",
        ] {
            let config = HearthConfig::from_toml(toml).unwrap();
            assert!(matches!(
                config.validated(),
                Err(HearthError::ConfigInvalid(_))
            ));
        }
    }

    #[test]
    fn test_session_config_maps_presence_section() {
        let config = HearthConfig::from_toml("[presence]\nsweep_interval_secs = 5\nexpiry_secs = 20\n")
            .unwrap();

        let session = config.session_config();

        assert_eq!(session.sweep_interval, Duration::from_secs(5));
        assert_eq!(session.expiry, Duration::from_secs(20));
        assert!(!session.state_refreshes_liveness);
    }
}
