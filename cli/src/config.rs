use anyhow::{anyhow, Context, Result};
use log::debug;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    env, fs,
    path::{Path, PathBuf},
};

use crate::errors::MissingConfig;

pub const PROJECT_ID: &str = "project_id";
pub const BUCKET_NAME: &str = "bucket_name";
pub const ENVIRONMENT_PATH: &str = "environment_path";
pub const TEMPLATES_DIR: &str = "templates_dir";
pub const ACCESS_TOKEN: &str = "access_token";
pub const RESOURCE_MANAGER_ENDPOINT: &str = "resource_manager_endpoint";
pub const STORAGE_ENDPOINT: &str = "storage_endpoint";
pub const COMPOSER_ENDPOINT: &str = "composer_endpoint";

/// Keys written by `fuga environment init`, in the order they are resolved.
pub const ENVIRONMENT_KEYS: [&str; 3] = [PROJECT_ID, BUCKET_NAME, ENVIRONMENT_PATH];

const OVERRIDE_PREFIX: &str = "FUGA_";
const FUGA_HOME_VARIABLE: &str = "FUGA_HOME";
const CONFIG_FILE_NAME: &str = "config.yml";

/// Name of the environment variable overriding `key`, e.g. `FUGA_PROJECT_ID`.
pub fn override_variable(key: &str) -> String {
    format!("{}{}", OVERRIDE_PREFIX, key.to_uppercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Env,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub source: ValueSource,
}

/// Key-value configuration persisted in `<FUGA_HOME>/config.yml`.
///
/// Every key can be overridden with a `FUGA_<KEY>` environment variable; overrides are
/// captured once on construction and are never written back to the file.
#[derive(Debug, Clone)]
pub struct FugaConfig {
    path: PathBuf,
    values: BTreeMap<String, String>,
    overrides: HashMap<String, String>,
}

impl FugaConfig {
    pub fn load(
        path: impl Into<PathBuf>,
        variables: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let path = path.into();
        let values = read_fuga_config(&path)?;
        let overrides = variables
            .into_iter()
            .filter(|(name, _)| name.starts_with(OVERRIDE_PREFIX))
            .collect();
        Ok(Self {
            path,
            values,
            overrides,
        })
    }

    pub fn from_process_env(path: impl Into<PathBuf>) -> Result<Self> {
        Self::load(path, env::vars())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The override if one is set, else the file value. An empty value counts as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.overrides
            .get(&override_variable(key))
            .or_else(|| self.values.get(key))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// `templates_dir` if configured, otherwise `templates` next to the configuration file.
    pub fn templates_dir(&self) -> PathBuf {
        match self.get(TEMPLATES_DIR) {
            Some(templates_dir) => PathBuf::from(templates_dir),
            None => self
                .path
                .parent()
                .map(|parent| parent.join("templates"))
                .unwrap_or_else(|| PathBuf::from("templates")),
        }
    }

    pub fn source(&self, key: &str) -> Option<ValueSource> {
        if self.overrides.contains_key(&override_variable(key)) {
            Some(ValueSource::Env)
        } else if self.values.contains_key(key) {
            Some(ValueSource::File)
        } else {
            None
        }
    }

    /// Like `get`, but fails with instructions when any of `keys` is missing.
    pub fn require(&self, keys: &[&str]) -> Result<Vec<&str>> {
        let missing: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| self.get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(MissingConfig {
                keys: missing.iter().map(|key| key.to_string()).collect(),
                variables: missing.iter().map(|key| override_variable(key)).collect(),
            }
            .into());
        }
        Ok(keys.iter().filter_map(|key| self.get(key)).collect())
    }

    /// Set `key` in the configuration file and write the file immediately. Lines of other
    /// keys are kept as they are.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        update_fuga_config(&self.path, key, &value)?;
        self.values.insert(key.to_owned(), value);
        Ok(())
    }

    pub fn entries(&self) -> Vec<ConfigEntry> {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        for key in ENVIRONMENT_KEYS {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys.into_iter()
            .filter_map(|key| {
                Some(ConfigEntry {
                    key: key.to_owned(),
                    value: self.get(key)?.to_owned(),
                    source: self.source(key)?,
                })
            })
            .collect()
    }
}

/// Directory holding fuga's configuration and templates.
///
/// `FUGA_HOME` if set, otherwise `~/.fuga`, or `<tmp>/.fuga` when the home directory is not
/// writable.
pub fn find_fuga_home() -> Result<PathBuf> {
    let fuga_home = match env::var_os(FUGA_HOME_VARIABLE) {
        Some(fuga_home) => PathBuf::from(fuga_home),
        None => dirs::home_dir()
            .filter(|home| is_writable(home))
            .unwrap_or_else(env::temp_dir)
            .join(".fuga"),
    };
    fs::create_dir_all(&fuga_home).with_context(|| {
        format!(
            "Could not create fuga home directory `{}`",
            fuga_home.display()
        )
    })?;
    Ok(fuga_home)
}

pub fn default_config_path(fuga_home: &Path) -> PathBuf {
    fuga_home.join(CONFIG_FILE_NAME)
}

fn is_writable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|metadata| !metadata.permissions().readonly())
        .unwrap_or(false)
}

pub fn read_fuga_config(path: impl AsRef<Path>) -> Result<BTreeMap<String, String>> {
    let path = path.as_ref();
    debug!("Reading config file at `{}`", path.display());
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not open config file `{}`", path.display()))?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(&content)
        .with_context(|| format!("Could not parse config file `{}`", path.display()))?;

    let mut values = BTreeMap::new();
    for (key, value) in raw {
        let value = match value {
            serde_yaml::Value::Null => continue,
            serde_yaml::Value::String(value) => value,
            serde_yaml::Value::Bool(value) => value.to_string(),
            serde_yaml::Value::Number(value) => value.to_string(),
            _ => {
                return Err(anyhow!(
                    "Config key `{}` in `{}` must be a scalar value",
                    key,
                    path.display()
                ))
            }
        };
        values.insert(key, value);
    }
    Ok(values)
}

/// Write `key: value` into the config file at `path`, replacing the key's existing entry or
/// appending one. Everything else in the file is left byte for byte.
pub fn update_fuga_config(path: impl AsRef<Path>, key: &str, value: &str) -> Result<()> {
    let path = path.as_ref();
    debug!("Writing `{}` to config file at `{}`", key, path.display());
    let content = if path.exists() {
        fs::read_to_string(path)
            .with_context(|| format!("Could not open config file `{}`", path.display()))?
    } else {
        String::new()
    };

    let entry = serde_yaml::to_string(&BTreeMap::from([(key, value)])).with_context(|| {
        format!("Could not serialise configuration to `{}`", path.display())
    })?;
    fs::write(path, splice_entry(&content, key, &entry))
        .with_context(|| format!("Could not write config file `{}`", path.display()))
}

fn is_entry_of(line: &str, key: &str) -> bool {
    [key.to_owned(), format!("'{key}'"), format!("\"{key}\"")]
        .iter()
        .any(|name| {
            line.strip_prefix(name.as_str())
                .map_or(false, |rest| rest.trim_start().starts_with(':'))
        })
}

/// Replace the top-level entry of `key` (with its indented continuation lines) by `entry`,
/// or append `entry` when `content` has none.
fn splice_entry(content: &str, key: &str, entry: &str) -> String {
    let mut spliced = String::with_capacity(content.len() + entry.len());
    let mut replaced = false;
    let mut in_entry = false;
    for line in content.split_inclusive('\n') {
        if in_entry && (line.starts_with(' ') || line.starts_with('\t')) {
            continue;
        }
        in_entry = false;
        if !replaced && is_entry_of(line, key) {
            spliced.push_str(entry);
            replaced = true;
            in_entry = true;
            continue;
        }
        spliced.push_str(line);
    }
    if !replaced {
        if !spliced.is_empty() && !spliced.ends_with('\n') {
            spliced.push('\n');
        }
        spliced.push_str(entry);
    }
    spliced
}
