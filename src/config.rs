use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::ExtractorKind;
use crate::diff::DiffMode;
use crate::ingest::{SourceKind, SourceSettings};
use crate::record::TimeFormat;
use crate::settings::{Settings, SettingsDraft};

const DEFAULT_OUTPUT: &str = "positions.csv";

/// On-disk shape of a session configuration. Every field is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SessionConfigFile {
    source: Option<SourceSettings>,
    detector: Option<SettingsDraft>,
    diff_mode: Option<DiffMode>,
    extractor: Option<ExtractorKind>,
    output: Option<OutputConfigFile>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OutputConfigFile {
    path: Option<PathBuf>,
    time_format: Option<TimeFormat>,
}

/// Command-line layer over file and environment configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    pub source: Option<String>,
    pub location: Option<String>,
    pub extractor: Option<String>,
    pub diff_mode: Option<String>,
    pub fps: Option<f64>,
    pub max_frames: Option<u64>,
    pub output: Option<PathBuf>,
    pub time_format: Option<String>,
}

/// Everything a session is built from, fixed for its lifetime.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub source: SourceSettings,
    pub settings: Settings,
    pub diff_mode: DiffMode,
    pub extractor: ExtractorKind,
    pub output: PathBuf,
    pub time_format: TimeFormat,
    /// Stop after this many captured frames.
    pub max_frames: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source: SourceSettings::default(),
            settings: Settings::default(),
            diff_mode: DiffMode::default(),
            extractor: ExtractorKind::default(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            time_format: TimeFormat::default(),
            max_frames: None,
        }
    }
}

impl SessionConfig {
    /// Defaults, then the file named by `CVRACE_CONFIG`, then `CVRACE_*`
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CVRACE_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like [`load`](Self::load), with an explicit config file path.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let cfg = Self::load_unvalidated(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// File and environment layers without the final cross-field check, for
    /// callers that layer more overrides on top and then call
    /// [`validate`](Self::validate) themselves.
    pub fn load_unvalidated(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Apply command-line overrides. Values are parsed like their
    /// environment counterparts.
    pub fn apply_overrides(&mut self, overrides: &SessionOverrides) -> Result<()> {
        if let Some(source) = &overrides.source {
            self.source.kind = SourceKind::parse(source)?;
        }
        if overrides.location.is_some() {
            self.source.location = overrides.location.clone();
        }
        if let Some(extractor) = &overrides.extractor {
            self.extractor = ExtractorKind::parse(extractor)?;
        }
        if let Some(mode) = &overrides.diff_mode {
            self.diff_mode = DiffMode::parse(mode)?;
        }
        if let Some(fps) = overrides.fps {
            let mut draft = self.settings.to_draft();
            draft.target_fps = fps;
            self.settings = draft.validate()?;
        }
        if overrides.max_frames.is_some() {
            self.max_frames = overrides.max_frames;
        }
        if let Some(output) = &overrides.output {
            self.output = output.clone();
        }
        if let Some(format) = &overrides.time_format {
            self.time_format = TimeFormat::parse(format)?;
        }
        Ok(())
    }

    fn from_file(file: SessionConfigFile) -> Result<Self> {
        let output = file.output.unwrap_or_default();
        Ok(Self {
            source: file.source.unwrap_or_default(),
            settings: file.detector.unwrap_or_default().validate()?,
            diff_mode: file.diff_mode.unwrap_or_default(),
            extractor: file.extractor.unwrap_or_default(),
            output: output.path.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            time_format: output.time_format.unwrap_or_default(),
            max_frames: file.max_frames,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(kind) = env_value("CVRACE_SOURCE") {
            self.source.kind = SourceKind::parse(&kind)?;
        }
        if let Some(location) = env_value("CVRACE_SOURCE_LOCATION") {
            self.source.location = Some(location);
        }
        if let Some(fps) = env_value("CVRACE_TARGET_FPS") {
            let target_fps: f64 = fps
                .parse()
                .map_err(|_| anyhow!("CVRACE_TARGET_FPS must be a number of frames per second"))?;
            let mut draft = self.settings.to_draft();
            draft.target_fps = target_fps;
            self.settings = draft.validate()?;
        }
        if let Some(extractor) = env_value("CVRACE_EXTRACTOR") {
            self.extractor = ExtractorKind::parse(&extractor)?;
        }
        if let Some(mode) = env_value("CVRACE_DIFF_MODE") {
            self.diff_mode = DiffMode::parse(&mode)?;
        }
        if let Some(output) = env_value("CVRACE_OUTPUT") {
            self.output = PathBuf::from(output);
        }
        if let Some(max_frames) = env_value("CVRACE_MAX_FRAMES") {
            let max_frames: u64 = max_frames
                .parse()
                .map_err(|_| anyhow!("CVRACE_MAX_FRAMES must be a non-negative integer"))?;
            self.max_frames = Some(max_frames);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        if self.max_frames == Some(0) {
            return Err(anyhow!("max_frames must be greater than zero"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(anyhow!("output path must not be empty"));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<SessionConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let cfg = if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_toml(raw: &str) -> Result<SessionConfig> {
        let file: SessionConfigFile = toml::from_str(raw)?;
        let cfg = SessionConfig::from_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[test]
    fn empty_file_gives_defaults() -> Result<()> {
        let cfg = parse_toml("")?;
        assert_eq!(cfg.settings, Settings::default());
        assert_eq!(cfg.extractor, ExtractorKind::Contour);
        assert_eq!(cfg.diff_mode, DiffMode::Signed { bias: 127 });
        assert_eq!(cfg.output, PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(cfg.max_frames, None);
        Ok(())
    }

    #[test]
    fn nested_sections_are_read() -> Result<()> {
        let cfg = parse_toml(
            r#"
            extractor = "delaunay"
            max_frames = 40

            [diff_mode]
            mode = "clipped"

            [source]
            kind = "images"
            location = "/tmp/stills"
            crop_top = 0.3333
            crop_bottom = 0.6667

            [detector]
            blur_radius = 9
            merge_radius = 12.5

            [output]
            path = "run.csv"
            time_format = "monotonic_millis"
            "#,
        )?;
        assert_eq!(cfg.extractor, ExtractorKind::Delaunay);
        assert_eq!(cfg.diff_mode, DiffMode::Clipped);
        assert_eq!(cfg.source.kind, SourceKind::Images);
        assert_eq!(cfg.source.location.as_deref(), Some("/tmp/stills"));
        assert_eq!(cfg.settings.blur_radius(), 9);
        assert_eq!(cfg.settings.merge_radius(), 12.5);
        assert_eq!(cfg.settings.intensity_threshold(), 20);
        assert_eq!(cfg.output, PathBuf::from("run.csv"));
        assert_eq!(cfg.time_format, TimeFormat::MonotonicMillis);
        assert_eq!(cfg.max_frames, Some(40));
        Ok(())
    }

    #[test]
    fn invalid_detector_values_are_rejected() {
        assert!(parse_toml("[detector]\nblur_radius = 4\n").is_err());
        assert!(parse_toml("[detector]\nmerge_radius = 0.0\n").is_err());
        assert!(parse_toml("max_frames = 0\n").is_err());
        assert!(parse_toml("unknown_key = 1\n").is_err());
    }
}
