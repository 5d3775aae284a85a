//! # pmoconfig - Configuration du client de portail Stalker et du simulateur
//!
//! La configuration est construite par couches :
//! - le `pmostalker.yaml` embarqué par défaut
//! - un `config.yaml` optionnel dans le répertoire de configuration
//! - les surcharges d'environnement `PMOSTALKER_CONFIG__SECTION__KEY=value`
//!
//! Les crates qui ont leurs propres réglages les ajoutent via des traits d'extension
//! (`StalkerConfigExt`, `MockConfigExt`) construits sur [`Config::get_value`] et
//! [`Config::set_value`].
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//! let level = config.get_log_min_level()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::info;

const DEFAULT_CONFIG: &str = include_str!("pmostalker.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load pmostalker configuration"));
}

const ENV_CONFIG_DIR: &str = "PMOSTALKER_CONFIG";
const ENV_PREFIX: &str = "PMOSTALKER_CONFIG__";
const DEFAULT_DIR_NAME: &str = ".pmostalker";

const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Génère un couple getter/setter pour un entier non signé avec valeur par défaut
#[macro_export]
macro_rules! impl_u64_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        fn $getter(&self) -> anyhow::Result<u64> {
            match self.get_value($path) {
                Ok(serde_yaml::Value::Number(n)) => Ok(n.as_u64().unwrap_or($default)),
                Ok(serde_yaml::Value::String(s)) => Ok(s.trim().parse().unwrap_or($default)),
                _ => Ok($default),
            }
        }

        fn $setter(&self, value: u64) -> anyhow::Result<()> {
            self.set_value($path, serde_yaml::Value::Number(serde_yaml::Number::from(value)))
        }
    };
}

/// Génère un couple getter/setter pour un booléen avec valeur par défaut
#[macro_export]
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        fn $getter(&self) -> anyhow::Result<bool> {
            match self.get_value($path) {
                Ok(serde_yaml::Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        fn $setter(&self, value: bool) -> anyhow::Result<()> {
            self.set_value($path, serde_yaml::Value::Bool(value))
        }
    };
}

/// Gestionnaire de configuration
///
/// Les valeurs sont stockées dans un arbre YAML aux clés en minuscules. Chaque
/// `set_value` est réécrit dans `config.yaml`, sauf pour les configurations créées par
/// [`Config::from_yaml_str`] qui ne vivent qu'en mémoire.
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: Option<String>,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().unwrap().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Trying to load config from env");
            return env_path;
        }

        if Path::new(DEFAULT_DIR_NAME).exists() {
            return DEFAULT_DIR_NAME.to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(DEFAULT_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        DEFAULT_DIR_NAME.to_string()
    }

    fn prepare_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }
        Ok(())
    }

    /// Charge la configuration depuis `directory`
    ///
    /// Un `directory` vide signifie : `$PMOSTALKER_CONFIG`, puis `./.pmostalker`,
    /// puis `~/.pmostalker`. Le résultat fusionné est sauvegardé dans
    /// `<directory>/config.yaml`.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::prepare_config_dir(Path::new(&config_dir))?;
        info!(config_dir = %config_dir, "Using config directory");

        let path = Path::new(&config_dir)
            .join("config.yaml")
            .to_string_lossy()
            .to_string();

        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path, "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut value, &external);
            }
            Err(_) => info!(config_file = %path, "Config file not found, using embedded defaults"),
        }

        let mut value = lower_keys(value);
        apply_env_overrides(&mut value);

        let config = Config {
            config_dir,
            path: Some(path),
            data: Mutex::new(value),
        };
        config.save()?;
        Ok(config)
    }

    /// Construit une configuration en mémoire : défauts embarqués recouverts par `yaml`
    ///
    /// Rien n'est lu ni écrit sur disque et les surcharges d'environnement ne sont
    /// pas appliquées.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        if !yaml.trim().is_empty() {
            let external: Value = serde_yaml::from_str(yaml)?;
            merge_yaml(&mut value, &external);
        }
        Ok(Config {
            config_dir: String::new(),
            path: None,
            data: Mutex::new(lower_keys(value)),
        })
    }

    /// Répertoire contenant `config.yaml` (vide pour une configuration en mémoire)
    pub fn dir(&self) -> &str {
        &self.config_dir
    }

    /// Écrit l'arbre courant dans `config.yaml`
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = self.data.lock().unwrap();
        fs::write(path, serde_yaml::to_string(&*data)?)?;
        Ok(())
    }

    /// Fixe la valeur à `path` (ex: `&["mock", "http_port"]`) et sauvegarde
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data.lock().unwrap();
            set_value_at(&mut data, path, value)?;
        }
        self.save()
    }

    /// Retourne la valeur à `path`, ou une erreur si le chemin n'existe pas
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        let mut current = &*data;
        for (i, key) in path.iter().enumerate() {
            let Value::Mapping(map) = current else {
                return Err(anyhow!("Path {} is not a mapping", path[..i].join(".")));
            };
            current = map
                .get(&Value::String(key.to_lowercase()))
                .ok_or_else(|| anyhow!("Path {} does not exist", path[..=i].join(".")))?;
        }
        Ok(current.clone())
    }

    /// Retourne la chaîne à `path`, ou `default` si absente ou pas une chaîne
    pub fn get_string_or(&self, path: &[&str], default: &str) -> String {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.trim().is_empty() => s,
            _ => default.to_string(),
        }
    }

    /// Niveau de log minimal du subscriber tracing (`INFO` par défaut)
    pub fn get_log_min_level(&self) -> Result<String> {
        Ok(self.get_string_or(&["host", "logger", "min_level"], DEFAULT_LOG_MIN_LEVEL))
    }

    pub fn set_log_min_level(&self, level: &str) -> Result<()> {
        self.set_value(
            &["host", "logger", "min_level"],
            Value::String(level.to_string()),
        )
    }

    pub fn get_log_enable_console(&self) -> Result<bool> {
        match self.get_value(&["host", "logger", "enable_console"]) {
            Ok(Value::Bool(b)) => Ok(b),
            _ => Ok(DEFAULT_LOG_ENABLE_CONSOLE),
        }
    }
}

fn set_value_at(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        *data = value;
        return Ok(());
    };
    let Value::Mapping(map) = data else {
        return Err(anyhow!("Current node is not a mapping"));
    };
    let key = Value::String(first.to_lowercase());
    if rest.is_empty() {
        map.insert(key, value);
        Ok(())
    } else {
        let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
        set_value_at(entry, rest, value)
    }
}

fn apply_env_overrides(config: &mut Value) {
    for (key, raw) in env::vars() {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path: Vec<&str> = stripped.split("__").collect();
        let value = serde_yaml::from_str::<Value>(&raw).unwrap_or(Value::String(raw.clone()));
        let _ = set_value_at(config, &path, value);
    }
}

fn lower_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lower_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys).collect()),
        other => other,
    }
}

/// Fusionne récursivement `external` dans `default` ; scalaires et séquences sont remplacés
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

/// Retourne la configuration globale, chargée au premier accès
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}
