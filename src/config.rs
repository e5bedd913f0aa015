use crate::{
    Error,
    Result,
    types::Address,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tracing::warn;

pub const CONFIG_DIR_NAME: &str = ".wager-session";
const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_STATS_REFRESH: Duration = Duration::from_secs(30);

/// Settings the user edits and the client persists between runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub contract_address: Option<String>,
}

impl ClientConfig {
    /// The configured contract, if one is set and well formed.
    pub fn contract(&self) -> Option<Address> {
        let raw = self.contract_address.as_deref()?;
        match raw.parse() {
            Ok(address) => Some(address),
            Err(err) => {
                warn!(%raw, %err, "ignoring malformed saved contract address");
                None
            }
        }
    }
}

/// Client-local storage for [`ClientConfig`].
pub trait ConfigStore {
    fn load(&self) -> Result<ClientConfig>;

    fn save(&mut self, config: &ClientConfig) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerSettings {
    /// How often stats are re-read while connected.
    pub stats_refresh_interval: Duration,
    /// Upper bound on waiting for a wager to confirm. `None` waits forever,
    /// which leaves the wager control disabled if the ledger never answers.
    pub confirmation_timeout: Option<Duration>,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            stats_refresh_interval: DEFAULT_STATS_REFRESH,
            confirmation_timeout: None,
        }
    }
}

#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let path = ensure_store(dir.as_ref())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<ClientConfig> {
        let data = fs::read(&self.path).map_err(|e| {
            Error::config(format!("failed to read {}: {e}", self.path.display()))
        })?;
        if data.is_empty() {
            return Ok(ClientConfig::default());
        }
        serde_json::from_slice(&data).map_err(|e| {
            Error::config(format!("failed to parse {}: {e}", self.path.display()))
        })
    }

    fn save(&mut self, config: &ClientConfig) -> Result<()> {
        let json = serde_json::to_vec_pretty(config)
            .map_err(|e| Error::config(format!("failed to serialize config: {e}")))?;
        fs::write(&self.path, json).map_err(|e| {
            Error::config(format!("failed to write {}: {e}", self.path.display()))
        })
    }
}

pub fn default_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::config("HOME environment variable not set"))?;
    Ok(PathBuf::from(home).join(CONFIG_DIR_NAME))
}

pub fn resolve_config_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_config_dir(),
    }
}

fn ensure_store(dir: &Path) -> Result<PathBuf> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            Error::config(format!("failed to create {}: {e}", dir.display()))
        })?;
    }
    let file_path = dir.join(CONFIG_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).map_err(|e| {
            Error::config(format!("failed to create {}: {e}", file_path.display()))
        })?;
        file.write_all(b"{}").map_err(|e| {
            Error::config(format!("failed to initialise {}: {e}", file_path.display()))
        })?;
    }
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn file_config_store__round_trips_contract_address() {
        // given
        let dir = TempDir::new("wager-session-config").unwrap();
        let mut store = FileConfigStore::new(dir.path().join("nested")).unwrap();
        let config = ClientConfig {
            contract_address: Some("0x5fbdb2315678afecb367f032d93f642f64180aa3".into()),
        };

        // when
        store.save(&config).unwrap();
        let reopened = FileConfigStore::new(dir.path().join("nested")).unwrap();

        // then
        assert_eq!(reopened.load().unwrap(), config);
        assert!(reopened.load().unwrap().contract().is_some());
    }

    #[test]
    fn file_config_store__starts_empty() {
        let dir = TempDir::new("wager-session-config").unwrap();
        let store = FileConfigStore::new(dir.path()).unwrap();
        assert_eq!(store.load().unwrap(), ClientConfig::default());
    }

    #[test]
    fn contract__ignores_malformed_saved_value() {
        let config = ClientConfig {
            contract_address: Some("not-an-address".into()),
        };
        assert_eq!(config.contract(), None);
    }

    #[test]
    fn resolve_config_dir__expands_tilde() {
        let home = std::env::var("HOME").unwrap();
        let dir = resolve_config_dir(Some("~/wagers")).unwrap();
        assert_eq!(dir, PathBuf::from(home).join("wagers"));
    }
}
