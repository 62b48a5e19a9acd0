use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use tracing::{debug, warn};

use crate::schema::SkilleryConfig;

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["skillery.toml", "skillery.yaml", "skillery.yml", "skillery.json"];

static DATA_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Override the data directory for this process (CLI `--data-dir`).
pub fn set_data_dir(dir: PathBuf) {
    if let Ok(mut guard) = DATA_DIR_OVERRIDE.write() {
        *guard = Some(dir);
    }
}

/// Clear a previously set data directory override (used by tests).
pub fn clear_data_dir() {
    if let Ok(mut guard) = DATA_DIR_OVERRIDE.write() {
        *guard = None;
    }
}

/// Returns the data directory where the catalog, state file and installed
/// skills live. Defaults to the platform data dir for "skillery".
pub fn data_dir() -> PathBuf {
    if let Ok(guard) = DATA_DIR_OVERRIDE.read()
        && let Some(dir) = guard.as_ref()
    {
        return dir.clone();
    }
    directories::ProjectDirs::from("", "", "skillery")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".skillery"))
}

/// Returns the user-global config directory (`~/.config/skillery/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "skillery").map(|d| d.config_dir().to_path_buf())
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<SkilleryConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./skillery.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/skillery/skillery.{toml,yaml,yml,json}` (user-global)
///
/// Returns `SkilleryConfig::default()` if no config file is found.
pub fn discover_and_load() -> SkilleryConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    SkilleryConfig::default()
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(config_dir) = config_dir() {
        for name in CONFIG_FILENAMES {
            let p = config_dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    if let Some(path) = find_config_file() {
        return path;
    }
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skillery.toml")
}

/// Render a config as pretty TOML (the `config` subcommand display format).
pub fn render_config(config: &SkilleryConfig) -> anyhow::Result<String> {
    toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("serialize config: {e}"))
}

/// Serialize `config` to TOML and write it to `path`.
pub fn save_config(config: &SkilleryConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_config(config)?)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<SkilleryConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_dir_override() {
        let tmp = tempfile::tempdir().unwrap();
        set_data_dir(tmp.path().to_path_buf());
        assert_eq!(data_dir(), tmp.path());
        clear_data_dir();
        assert_ne!(data_dir(), tmp.path());
    }

    #[test]
    fn test_parse_config_formats() {
        let toml_cfg =
            parse_config("[aggregator]\nfetch_retries = 5\n", Path::new("skillery.toml")).unwrap();
        assert_eq!(toml_cfg.aggregator.fetch_retries, 5);

        let json_cfg = parse_config(
            r#"{"aggregator":{"fetch_retries":2}}"#,
            Path::new("skillery.json"),
        )
        .unwrap();
        assert_eq!(json_cfg.aggregator.fetch_retries, 2);

        let yaml_cfg = parse_config(
            "aggregator:\n  fetch_retries: 7\n",
            Path::new("skillery.yaml"),
        )
        .unwrap();
        assert_eq!(yaml_cfg.aggregator.fetch_retries, 7);

        assert!(parse_config("x", Path::new("skillery.ini")).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config(Path::new("/nonexistent/skillery.toml")).is_err());
    }

    #[test]
    fn test_save_config_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("skillery.toml");

        let mut config = SkilleryConfig::default();
        config.aggregator.fetch_retries = 9;
        save_config(&config, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.aggregator.fetch_retries, 9);
        assert_eq!(loaded.install.default_agent, "auto");
    }
}
