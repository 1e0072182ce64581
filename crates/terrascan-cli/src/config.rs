//! Reads/writes `~/.terrascan/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use terrascan_perception::PerceptionConfig;

/// Persisted CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Service name reported to the OTLP collector.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// The `[perception]` table.  Missing keys fall back to the compiled-in
    /// defaults.
    #[serde(default)]
    pub perception: PerceptionConfig,
}

fn default_service_name() -> String {
    "terrascan".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            perception: PerceptionConfig::default(),
        }
    }
}

/// Return the path to `~/.terrascan/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".terrascan").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `TERRASCAN_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TERRASCAN_WORLD_SIZE` | `perception.world_size` |
/// | `TERRASCAN_SCALE` | `perception.scale` |
/// | `TERRASCAN_ATTITUDE_TOLERANCE` | `perception.attitude_tolerance_deg` |
///
/// Values that do not parse, or are not positive, are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("TERRASCAN_WORLD_SIZE")
        && let Ok(size) = v.trim().parse::<usize>()
        && size > 0
    {
        cfg.perception.world_size = size;
    }
    if let Some(v) = lookup("TERRASCAN_SCALE")
        && let Some(scale) = parse_positive(&v)
    {
        cfg.perception.scale = scale;
    }
    if let Some(v) = lookup("TERRASCAN_ATTITUDE_TOLERANCE")
        && let Some(tol) = parse_positive(&v)
    {
        cfg.perception.attitude_tolerance_deg = tol;
    }
}

fn parse_positive(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Save the config to disk, creating `~/.terrascan/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = render(cfg)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

/// Pretty TOML for `cfg`.
pub fn render(cfg: &Config) -> Result<String, String> {
    toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.service_name, "terrascan");
        assert_eq!(loaded.perception.calibration, PerceptionConfig::default().calibration);
        assert_eq!(loaded.perception.sample_band, PerceptionConfig::default().sample_band);
    }

    #[test]
    fn partial_perception_table_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[perception]\nframe_width = 640\n\n[perception.calibration]\nbottom_offset = 4.0\n")
            .expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.perception.frame_width, 640);
        assert_eq!(cfg.perception.frame_height, 160);
        assert_eq!(cfg.perception.calibration.bottom_offset, 4.0);
        assert_eq!(cfg.perception.calibration.dst_size, 5.0);
        assert_eq!(cfg.service_name, "terrascan");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[perception\nworld_size = ").expect("write");
        let err = load_from(&path).unwrap_err();
        assert!(err.starts_with("Failed to parse config"));
    }

    #[test]
    fn config_path_points_to_terrascan_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".terrascan"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn overrides_apply_to_perception_fields() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            env(&[
                ("TERRASCAN_WORLD_SIZE", "400"),
                ("TERRASCAN_SCALE", "20"),
                ("TERRASCAN_ATTITUDE_TOLERANCE", "0.5"),
            ]),
        );
        assert_eq!(cfg.perception.world_size, 400);
        assert_eq!(cfg.perception.scale, 20.0);
        assert_eq!(cfg.perception.attitude_tolerance_deg, 0.5);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            env(&[
                ("TERRASCAN_WORLD_SIZE", "0"),
                ("TERRASCAN_SCALE", "-3"),
                ("TERRASCAN_ATTITUDE_TOLERANCE", "level"),
            ]),
        );
        assert_eq!(cfg, Config::default());
    }
}
