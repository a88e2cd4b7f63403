use crate::api::auth::DeviceIdentity;
use crate::error::{DiskError, Result};
use directories::ProjectDirs;
use std::fmt;
use std::fs;
use std::io;
use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const QUALIFIER: &str = "ru";
const ORGANIZATION: &str = "yandex_disk";
const APPLICATION: &str = "yandex_disk";
const CONFIG_FILE_NAME: &str = "cYandexDisk.conf";
const SECTION: &str = "[cYandexDisk]";

pub const DEFAULT_DEVICE_NAME: &str = "yandex_disk";

/// Set of config keys, used both for "which keys are present" and "which
/// keys differ".
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigKeys(u8);

impl ConfigKeys {
    pub const NONE: ConfigKeys = ConfigKeys(0);
    pub const CLIENT_ID: ConfigKeys = ConfigKeys(1);
    pub const CLIENT_SECRET: ConfigKeys = ConfigKeys(2);
    pub const DEVICE_ID: ConfigKeys = ConfigKeys(4);
    pub const DEVICE_NAME: ConfigKeys = ConfigKeys(8);
    pub const TOKEN: ConfigKeys = ConfigKeys(16);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: ConfigKeys) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ConfigKeys {
    type Output = ConfigKeys;

    fn bitor(self, rhs: ConfigKeys) -> ConfigKeys {
        ConfigKeys(self.0 | rhs.0)
    }
}

impl BitOrAssign for ConfigKeys {
    fn bitor_assign(&mut self, rhs: ConfigKeys) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ConfigKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = KEYS
            .iter()
            .filter(|(_, key)| self.contains(*key))
            .map(|(name, _)| *name)
            .collect();
        write!(f, "ConfigKeys({})", names.join(" | "))
    }
}

const KEYS: [(&str, ConfigKeys); 5] = [
    ("client_id", ConfigKeys::CLIENT_ID),
    ("client_secret", ConfigKeys::CLIENT_SECRET),
    ("device_id", ConfigKeys::DEVICE_ID),
    ("device_name", ConfigKeys::DEVICE_NAME),
    ("token", ConfigKeys::TOKEN),
];

/// Application credentials and the user token, as kept in `cYandexDisk.conf`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub token: Option<String>,
}

impl Config {
    fn slot(&mut self, key: ConfigKeys) -> &mut Option<String> {
        match key {
            ConfigKeys::CLIENT_ID => &mut self.client_id,
            ConfigKeys::CLIENT_SECRET => &mut self.client_secret,
            ConfigKeys::DEVICE_ID => &mut self.device_id,
            ConfigKeys::DEVICE_NAME => &mut self.device_name,
            _ => &mut self.token,
        }
    }

    fn value(&self, key: ConfigKeys) -> Option<&str> {
        match key {
            ConfigKeys::CLIENT_ID => self.client_id.as_deref(),
            ConfigKeys::CLIENT_SECRET => self.client_secret.as_deref(),
            ConfigKeys::DEVICE_ID => self.device_id.as_deref(),
            ConfigKeys::DEVICE_NAME => self.device_name.as_deref(),
            _ => self.token.as_deref(),
        }
    }

    /// Parses `key = value` lines. Blank lines, `#` comments and `[section]`
    /// headers are skipped; unknown or repeated keys are logged and ignored,
    /// so the first value of a key wins.
    pub fn parse(text: &str) -> Config {
        let mut config = Config::default();
        let mut seen = ConfigKeys::NONE;

        for (index, raw) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }

            let parsed = line.split_once('=').and_then(|(name, value)| {
                let key = KEYS.iter().find(|(known, _)| *known == name.trim())?.1;
                let value = value.trim();
                (!value.is_empty()).then_some((key, value))
            });
            let Some((key, value)) = parsed else {
                log::warn!("[config] line {line_number}: syntax error: {line}");
                continue;
            };
            if seen.contains(key) {
                log::warn!("[config] line {line_number}: {key:?} already set");
                continue;
            }
            seen |= key;
            *config.slot(key) = Some(value.to_string());
        }
        config
    }

    /// Reads a config file. A missing file is an empty config.
    pub fn read(path: &Path) -> Result<Config> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Config::parse(&text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("[config] {} does not exist yet", path.display());
                Ok(Config::default())
            }
            Err(err) => Err(DiskError::Config(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }

    /// File contents for this config; only keys that are set are written.
    pub fn render(&self) -> String {
        let mut out = String::from(
            "#cYandexDisk.conf - config file\n#this config generated automaticaly\n\n",
        );
        out.push_str(SECTION);
        out.push('\n');
        for (name, key) in KEYS {
            if let Some(value) = self.value(key) {
                out.push_str(&format!("{name} = {value}\n"));
            }
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                DiskError::Config(format!("failed to create config directory {dir:?}: {e}"))
            })?;
        }
        fs::write(path, self.render())
            .map_err(|e| DiskError::Config(format!("failed to write {}: {e}", path.display())))?;
        log::debug!("[config] saved {}", path.display());
        Ok(())
    }

    /// Keys that currently have a value.
    pub fn set_keys(&self) -> ConfigKeys {
        KEYS.iter()
            .filter(|(_, key)| self.value(*key).is_some())
            .fold(ConfigKeys::NONE, |acc, (_, key)| acc | *key)
    }

    /// Keys whose values differ between `self` and `other`.
    pub fn diff(&self, other: &Config) -> ConfigKeys {
        KEYS.iter()
            .filter(|(_, key)| self.value(*key) != other.value(*key))
            .fold(ConfigKeys::NONE, |acc, (_, key)| acc | *key)
    }

    /// Device identity for OAuth. A missing device id is generated (and kept
    /// in `self` so it can be saved); a missing name falls back to
    /// [`DEFAULT_DEVICE_NAME`].
    pub fn device_identity(&mut self) -> DeviceIdentity {
        let id = self
            .device_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        let name = self
            .device_name
            .clone()
            .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());
        DeviceIdentity { id, name }
    }
}

/// Per-user location of the config file.
pub fn default_config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION).ok_or_else(|| {
        DiskError::Config("failed to resolve application config directory".to_string())
    })?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
#cYandexDisk.conf - config file

[cYandexDisk]
client_id = abc123
  client_secret=s3cret
device_name = laptop
token = AQAAAA
";

    #[test]
    fn parses_keys_and_skips_comments() {
        let config = Config::parse(SAMPLE);
        assert_eq!(config.client_id.as_deref(), Some("abc123"));
        assert_eq!(config.client_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.device_name.as_deref(), Some("laptop"));
        assert_eq!(config.token.as_deref(), Some("AQAAAA"));
        assert!(config.device_id.is_none());
        assert_eq!(
            config.set_keys(),
            ConfigKeys::CLIENT_ID | ConfigKeys::CLIENT_SECRET | ConfigKeys::DEVICE_NAME | ConfigKeys::TOKEN
        );
        assert_eq!(config.set_keys().bits(), 1 | 2 | 8 | 16);
    }

    #[test]
    fn bad_and_repeated_lines_are_skipped() {
        let config = Config::parse("token = first\ntoken = second\nhost = x\ngarbage\nclient_id =\n");
        assert_eq!(config.token.as_deref(), Some("first"));
        assert_eq!(config.set_keys(), ConfigKeys::TOKEN);
    }

    #[test]
    fn write_then_read_restores_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cYandexDisk.conf");
        let config = Config {
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            device_id: Some("dev".to_string()),
            device_name: Some("box".to_string()),
            token: None,
        };
        config.write(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("#cYandexDisk.conf"));
        assert!(text.contains("[cYandexDisk]\nclient_id = id\n"));
        assert!(!text.contains("token"));

        assert_eq!(Config::read(&path).unwrap(), config);
    }

    #[test]
    fn spaced_device_name_survives_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cYandexDisk.conf");
        let mut config = Config {
            device_name: Some("my laptop".to_string()),
            token: Some("t".to_string()),
            ..Config::default()
        };
        let identity = config.device_identity();
        config.write(&path).unwrap();

        let mut restored = Config::read(&path).unwrap();
        assert_eq!(restored, config);
        assert_eq!(restored.device_name.as_deref(), Some("my laptop"));
        assert_eq!(restored.device_identity(), identity);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::read(&dir.path().join("absent.conf")).unwrap();
        assert!(config.set_keys().is_empty());
    }

    #[test]
    fn diff_lists_changed_keys() {
        let old = Config::parse("client_id = a\ntoken = t1\n");
        let new = Config::parse("client_id = a\ntoken = t2\ndevice_name = n\n");
        let changed = old.diff(&new);
        assert_eq!(changed, ConfigKeys::TOKEN | ConfigKeys::DEVICE_NAME);
        assert!(!changed.contains(ConfigKeys::CLIENT_ID));
        assert!(old.diff(&old).is_empty());
    }

    #[test]
    fn device_identity_generates_and_keeps_id() {
        let mut config = Config::default();
        let first = config.device_identity();
        assert_eq!(first.name, DEFAULT_DEVICE_NAME);
        assert!(Uuid::parse_str(&first.id).is_ok());
        assert_eq!(config.device_id.as_deref(), Some(first.id.as_str()));
        assert_eq!(config.device_identity(), first);
    }

    #[test]
    fn config_without_token_cannot_build_client() {
        let config = Config::parse("client_id = a\n");
        assert!(matches!(
            crate::api::disk::DiskClient::from_config(&config),
            Err(DiskError::Config(_))
        ));
        let config = Config::parse("token = t\n");
        assert!(crate::api::disk::DiskClient::from_config(&config).is_ok());
    }
}
