use anyhow::{Context, Result};
use funnyface_core::{FeatureSelection, StyleProfile};
use serde::Deserialize;
use std::path::Path;

/// CLI configuration: defaults, then an optional TOML file named by
/// `FUNNYFACE_CONFIG`, then `FUNNYFACE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Features enabled when no `--features` flag is given.
    pub features: FeatureSelection,
    /// Overlay style profile when no `--style` flag is given. Unset means
    /// each command's own profile (`live` for the live preview, `still` otherwise).
    pub style: Option<StyleProfile>,
    /// Bounded handoff between the frame loop and the renderer.
    pub channel_capacity: usize,
    /// Frames to discard at startup (camera AGC/AE stabilization).
    pub warmup_frames: usize,
    pub capture_width: u32,
    pub capture_height: u32,
    /// Mirror camera frames horizontally, like a front-facing preview.
    pub mirror: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            camera_device: "/dev/video0".to_string(),
            features: FeatureSelection::default(),
            style: None,
            channel_capacity: 4,
            warmup_frames: 4,
            capture_width: 640,
            capture_height: 480,
            mirror: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("FUNNYFACE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from `FUNNYFACE_*` variables. Unparseable values are
    /// logged and ignored.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(device) = var("FUNNYFACE_CAMERA_DEVICE") {
            self.camera_device = device;
        }
        env_parse(&var, "FUNNYFACE_FEATURES", &mut self.features);
        if let Some(raw) = var("FUNNYFACE_STYLE") {
            match raw.parse() {
                Ok(profile) => self.style = Some(profile),
                Err(e) => tracing::warn!(
                    key = "FUNNYFACE_STYLE",
                    value = %raw,
                    error = %e,
                    "ignoring invalid environment override"
                ),
            }
        }
        env_parse(&var, "FUNNYFACE_CHANNEL_CAPACITY", &mut self.channel_capacity);
        env_parse(&var, "FUNNYFACE_WARMUP_FRAMES", &mut self.warmup_frames);
        env_parse(&var, "FUNNYFACE_CAPTURE_WIDTH", &mut self.capture_width);
        env_parse(&var, "FUNNYFACE_CAPTURE_HEIGHT", &mut self.capture_height);
        if let Some(raw) = var("FUNNYFACE_MIRROR") {
            self.mirror = !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no");
        }
    }

    /// Style for a command whose own default profile is `fallback`.
    pub fn style_or(&self, fallback: StyleProfile) -> StyleProfile {
        self.style.unwrap_or(fallback)
    }
}

fn env_parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T)
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = var(key) else {
        return;
    };
    match raw.parse() {
        Ok(value) => *slot = value,
        Err(e) => tracing::warn!(key, value = %raw, error = %e, "ignoring invalid environment override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnyface_core::Feature;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.camera_device, "/dev/video0");
        assert_eq!(config.features, FeatureSelection::from_iter([Feature::Eyes]));
        assert_eq!(config.style, None);
        assert_eq!(config.channel_capacity, 4);
        assert!(config.mirror);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(vars(&[
            ("FUNNYFACE_CAMERA_DEVICE", "/dev/video2"),
            ("FUNNYFACE_FEATURES", "mouth,sunglasses"),
            ("FUNNYFACE_STYLE", "live"),
            ("FUNNYFACE_WARMUP_FRAMES", "0"),
            ("FUNNYFACE_MIRROR", "0"),
        ]));
        assert_eq!(config.camera_device, "/dev/video2");
        assert_eq!(config.features, FeatureSelection::from_iter([Feature::Mouth, Feature::Sunglasses]));
        assert_eq!(config.style, Some(StyleProfile::Live));
        assert_eq!(config.warmup_frames, 0);
        assert!(!config.mirror);
        assert_eq!(config.capture_width, 640);
    }

    #[test]
    fn test_invalid_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(vars(&[
            ("FUNNYFACE_CHANNEL_CAPACITY", "lots"),
            ("FUNNYFACE_FEATURES", "eyes,moustache"),
            ("FUNNYFACE_STYLE", "sketchy"),
        ]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_toml_partial() {
        let config: Config = toml::from_str(
            r#"
            features = ["eyes", "mouth"]
            style = "live"
            capture_width = 1280
            mirror = false
            "#,
        )
        .unwrap();
        assert_eq!(config.features, FeatureSelection::from_iter([Feature::Eyes, Feature::Mouth]));
        assert_eq!(config.style, Some(StyleProfile::Live));
        assert_eq!(config.capture_width, 1280);
        assert!(!config.mirror);
        assert_eq!(config.capture_height, 480);
        assert_eq!(config.camera_device, "/dev/video0");
    }

    #[test]
    fn test_style_falls_back_per_command() {
        let config = Config::default();
        assert_eq!(config.style_or(StyleProfile::Live), StyleProfile::Live);
        assert_eq!(config.style_or(StyleProfile::Still), StyleProfile::Still);

        let pinned = Config {
            style: Some(StyleProfile::Still),
            ..Config::default()
        };
        assert_eq!(pinned.style_or(StyleProfile::Live), StyleProfile::Still);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::from_file(Path::new("/nonexistent/funnyface.toml")).is_err());
    }
}
