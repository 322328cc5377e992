use std::{
    collections::HashMap,
    env, fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use directories::BaseDirs;

use crate::secrets::ENV_VARS_VAR;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Default for Config {
    /// Built-in defaults only; no rc file, no environment.
    fn default() -> Self {
        Self { inner: default_map(), config_path: default_config_path() }
    }
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(default_config_path())
    }

    pub fn load_from(config_path: PathBuf) -> Self {
        let mut map = default_map();

        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                map.extend(parse_rc(BufReader::new(file)));
            }
        }

        // Overlay environment variables (take precedence)
        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if key != ENV_VARS_VAR {
            self.inner.insert(key, value.into());
        }
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    /// `MODULEPATH` split on the platform path separator.
    pub fn modulepath(&self) -> Vec<PathBuf> {
        self.get("MODULEPATH")
            .map(|v| env::split_paths(&v).filter(|p| !p.as_os_str().is_empty()).collect())
            .unwrap_or_default()
    }
}

fn parse_rc<R: BufRead>(reader: R) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in reader.lines().map_while(Result::ok) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let k = k.trim();
            // The secret payload never lives in a file.
            if k == ENV_VARS_VAR {
                continue;
            }
            out.push((k.to_string(), v.trim().to_string()));
        }
    }
    out
}

fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &["SHELL_NAME", "COMMAND_TIMEOUT", "MODULEPATH", "DEFAULT_FORMAT", "NO_COLOR"];
    k != ENV_VARS_VAR && (KEYS.contains(&k) || k.starts_with("SEV_"))
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("secure_env_vars").join(".sevrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("SHELL_NAME".into(), "auto".into());
    m.insert("COMMAND_TIMEOUT".into(), "60".into());
    m.insert(
        "MODULEPATH".into(),
        Path::new("modules").to_string_lossy().into_owned(),
    );
    m.insert("DEFAULT_FORMAT".into(), "human".into());
    m
}
