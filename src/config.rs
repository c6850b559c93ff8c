use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::element::ElementConfig;
use crate::errors::{ClickshotError, ClickshotResult};
use crate::perception::types::Rect;

pub const CONFIG_FILE_NAME: &str = "clickshot.toml";

/// Settings shared by every element of a region.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where reference images live. Defaults to `<base>/images`, or
    /// `<base>/images/<os>` when that directory exists.
    pub image_dir: Option<PathBuf>,
    /// Where diagnostic screenshots go. Defaults to `<base>/screenshots`.
    pub screenshot_dir: Option<PathBuf>,
    /// Anchor for the default directories. The working directory when unset.
    pub base_dir: Option<PathBuf>,
    /// Default search timeout for `click` and `wait_until_visible`.
    pub click_retry_seconds: u64,
    /// Ask the operator before failing on a missing reference image.
    pub interactive: bool,
    /// Divides click coordinates, for captures taken at a higher resolution than
    /// the pointer's coordinate space.
    pub screenshot_scaling: u32,
    pub warn_for_delayed_detections: bool,
    pub log_progress: bool,
    pub retry_interval_ms: u64,
}

fn default_click_retry_seconds() -> u64 {
    30
}

fn default_retry_interval_ms() -> u64 {
    50
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_dir: None,
            screenshot_dir: None,
            base_dir: None,
            click_retry_seconds: default_click_retry_seconds(),
            interactive: false,
            screenshot_scaling: 1,
            warn_for_delayed_detections: false,
            log_progress: false,
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    fn base(&self) -> PathBuf {
        match &self.base_dir {
            Some(base) => base.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn image_dir(&self) -> PathBuf {
        if let Some(dir) = &self.image_dir {
            return dir.clone();
        }
        let images = self.base().join("images");
        let per_os = images.join(std::env::consts::OS);
        if per_os.is_dir() {
            per_os
        } else {
            images
        }
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        match &self.screenshot_dir {
            Some(dir) => dir.clone(),
            None => self.base().join("screenshots"),
        }
    }

    /// Copy with both directories filled in.
    pub fn resolved(&self) -> Self {
        let mut resolved = self.clone();
        resolved.image_dir = Some(self.image_dir());
        resolved.screenshot_dir = Some(self.screenshot_dir());
        resolved
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.click_retry_seconds)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.base_dir = Some(dir.into());
        self
    }

    pub fn image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.image_dir = Some(dir.into());
        self
    }

    pub fn screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.screenshot_dir = Some(dir.into());
        self
    }

    pub fn click_retry_seconds(mut self, seconds: u64) -> Self {
        self.config.click_retry_seconds = seconds;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.config.interactive = interactive;
        self
    }

    pub fn screenshot_scaling(mut self, scaling: u32) -> Self {
        self.config.screenshot_scaling = scaling;
        self
    }

    pub fn warn_for_delayed_detections(mut self, warn: bool) -> Self {
        self.config.warn_for_delayed_detections = warn;
        self
    }

    pub fn log_progress(mut self, log: bool) -> Self {
        self.config.log_progress = log;
        self
    }

    pub fn retry_interval_ms(mut self, ms: u64) -> Self {
        self.config.retry_interval_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    #[serde(default)]
    pub boundary: Option<Rect>,
    #[serde(default)]
    pub elements: Vec<ElementConfig>,
    /// Reject lookups of elements not listed in `elements`.
    #[serde(default)]
    pub closed: bool,
}

/// Contents of `clickshot.toml`: top-level settings plus `[[region]]` tables.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub settings: Config,
    #[serde(default, rename = "region")]
    pub regions: Vec<RegionConfig>,
}

impl ConfigFile {
    pub fn region(&self, name: &str) -> Option<&RegionConfig> {
        self.regions.iter().find(|r| r.name == name)
    }
}

fn resolve_config_path() -> ClickshotResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join(CONFIG_FILE_NAME);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(ClickshotError::Config(format!(
        "{CONFIG_FILE_NAME} not found next to executable or in working directory"
    )))
}

pub fn load_config() -> ClickshotResult<ConfigFile> {
    let path = resolve_config_path()?;
    load_config_from(&path)
}

/// Parse a config file. Relative directories and the default base directory are
/// taken relative to the file's own directory.
pub fn load_config_from(path: &Path) -> ClickshotResult<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    let mut file: ConfigFile = toml::from_str(&content)?;

    if file.settings.screenshot_scaling == 0 {
        return Err(ClickshotError::Config(
            "screenshot_scaling must be at least 1".into(),
        ));
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let settings = &mut file.settings;
    let base = match settings.base_dir.take() {
        Some(base) if base.is_relative() => dir.join(base),
        Some(base) => base,
        None => dir.to_path_buf(),
    };
    for entry in [&mut settings.image_dir, &mut settings.screenshot_dir] {
        if let Some(p) = entry.as_mut() {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
    }
    settings.base_dir = Some(base);

    tracing::info!(
        path = %path.display(),
        regions = file.regions.len(),
        "config loaded"
    );
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.default_timeout(), Duration::from_secs(30));
        assert!(!config.interactive);
        assert_eq!(config.screenshot_scaling, 1);
        assert_eq!(config.retry_interval(), Duration::from_millis(50));
    }

    #[test]
    fn resolved_dirs_hang_off_base_dir() {
        let base = tempfile::tempdir().unwrap();
        let config = Config::builder().base_dir(base.path()).build().resolved();

        assert_eq!(config.image_dir, Some(base.path().join("images")));
        assert_eq!(config.screenshot_dir, Some(base.path().join("screenshots")));
    }

    #[test]
    fn image_dir_prefers_os_subdirectory_when_present() {
        let base = tempfile::tempdir().unwrap();
        let per_os = base.path().join("images").join(std::env::consts::OS);
        std::fs::create_dir_all(&per_os).unwrap();

        let config = Config::default().with_base_dir(base.path());

        assert_eq!(config.image_dir(), per_os);
    }

    #[test]
    fn explicit_dirs_are_kept() {
        let config = Config::builder()
            .base_dir("/nowhere")
            .image_dir("/refs")
            .screenshot_dir("/shots")
            .build()
            .resolved();

        assert_eq!(config.image_dir, Some(PathBuf::from("/refs")));
        assert_eq!(config.screenshot_dir, Some(PathBuf::from("/shots")));
    }

    #[test]
    fn loads_settings_and_regions_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"
click_retry_seconds = 5
screenshot_dir = "out"
log_progress = true

[[region]]
name = "toolbar"
boundary = { left = 0, top = 0, width = 400, height = 40 }

[[region.elements]]
name = "save"
click_offset = [2, 3]

[[region]]
name = "dialog"
closed = true
"#,
        )
        .unwrap();

        let file = load_config_from(&path).unwrap();

        assert_eq!(file.settings.click_retry_seconds, 5);
        assert!(file.settings.log_progress);
        assert_eq!(file.settings.base_dir.as_deref(), Some(dir.path()));
        assert_eq!(file.settings.screenshot_dir, Some(dir.path().join("out")));
        assert_eq!(file.settings.image_dir(), dir.path().join("images"));

        let toolbar = file.region("toolbar").unwrap();
        assert_eq!(toolbar.boundary, Some(Rect::new(0, 0, 400, 40)));
        assert_eq!(toolbar.elements[0].name, "save");
        assert_eq!(toolbar.elements[0].click_offset, (2, 3));
        assert!(!toolbar.closed);
        assert!(file.region("dialog").unwrap().closed);
        assert!(file.region("missing").is_none());
    }

    #[test]
    fn rejects_zero_scaling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "screenshot_scaling = 0\n").unwrap();

        assert!(matches!(
            load_config_from(&path),
            Err(ClickshotError::Config(_))
        ));
    }

    #[test]
    fn malformed_file_is_a_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "click_retry_seconds = \"soon\"\n").unwrap();

        assert!(matches!(
            load_config_from(&path),
            Err(ClickshotError::TomlDe(_))
        ));
    }
}
