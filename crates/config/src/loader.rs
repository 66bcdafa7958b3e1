use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, info},
};

use crate::{
    error::{Error, Result},
    schema::NaiaConfig,
};

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG_PATH: &str = "NAIA_CONFIG";

const ENV_GATEWAY_URL: &str = "NAIA_GATEWAY_URL";
const ENV_GATEWAY_TOKEN: &str = "NAIA_GATEWAY_TOKEN";
const ENV_SESSION_KEY: &str = "NAIA_SESSION_KEY";

/// `<platform config dir>/naia.toml`, if a home directory can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "naia").map(|dirs| dirs.config_dir().join("naia.toml"))
}

/// Load a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<NaiaConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(NaiaConfig::default());
        },
        Err(source) => {
            return Err(Error::Read {
                path: path.to_path_buf(),
                source,
            });
        },
    };
    let config = toml::from_str(&raw).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Resolve the config location (`explicit` → `$NAIA_CONFIG` → default path),
/// load it, then apply environment overrides.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<NaiaConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from))
        .or_else(default_config_path);

    let mut config = match path {
        Some(path) => load_config(&path)?,
        None => NaiaConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Overlay `NAIA_GATEWAY_URL`, `NAIA_GATEWAY_TOKEN` and `NAIA_SESSION_KEY`.
/// Empty values are ignored.
pub fn apply_env_overrides(config: &mut NaiaConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_GATEWAY_URL) {
        config.gateway.url = url;
    }
    if let Some(token) = get(ENV_GATEWAY_TOKEN) {
        config.gateway.token = Secret::new(token);
    }
    if let Some(session_key) = get(ENV_SESSION_KEY) {
        config.chat.session_key = session_key;
    }
}
