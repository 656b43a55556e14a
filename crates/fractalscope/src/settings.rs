use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories_next::ProjectDirs;
use fractal::{FractalParameters, FractalState};
use renderer::{BackendConfig, RendererConfig};
use serde::{Deserialize, Serialize};

use crate::cli::RunArgs;

const QUALIFIER: &str = "";
const ORGANISATION: &str = "";
const APPLICATION: &str = "fractalscope";
const SETTINGS_FILE: &str = "settings.toml";

/// `settings.toml` in the user config directory, when one can be determined.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
}

/// Application settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub startup_configuration: PathBuf,
    pub shader_dir: PathBuf,
    pub export_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Offscreen framebuffer size relative to the window.
    pub resolution_scale: f32,
    pub smoothing: f32,
    pub movement_speed: f32,
    pub rotation_speed: f32,
    pub zoom_speed: f32,
    pub vsync: bool,
    pub escape_closes_app: bool,
    pub clear_color: [f32; 4],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            startup_configuration: PathBuf::from("assets/configurations/default.fractal"),
            shader_dir: PathBuf::from("assets/shaders"),
            export_dir: PathBuf::from("Export"),
            width: 1280,
            height: 720,
            resolution_scale: 1.0,
            smoothing: 5.0,
            movement_speed: 1.0,
            rotation_speed: 1.0,
            zoom_speed: 1.0,
            vsync: true,
            escape_closes_app: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file at {}", path.display()))?;
            let settings: Self = toml::from_str(&contents)
                .with_context(|| format!("failed to parse settings file at {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loaded settings");
            Ok(settings)
        } else {
            tracing::debug!(path = %path.display(), "settings file not found; using defaults");
            Ok(Self::default())
        }
    }

    /// Like [`Settings::load`], but an unreadable or malformed file is logged
    /// and replaced by the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|err| {
            tracing::error!(path = %path.display(), "{err:#}; using default settings");
            Self::default()
        })
    }

    /// Command-line values take precedence over the file.
    pub fn apply_run_args(&mut self, args: &RunArgs) {
        if let Some(config) = &args.config {
            self.startup_configuration = config.clone();
        }
        if let Some((width, height)) = args.size {
            self.width = width;
            self.height = height;
        }
        if let Some(scale) = args.resolution_scale {
            self.resolution_scale = scale;
        }
        if let Some(dir) = &args.shader_dir {
            self.shader_dir = dir.clone();
        }
        if let Some(dir) = &args.export_dir {
            self.export_dir = dir.clone();
        }
        if let Some(smoothing) = args.smoothing {
            self.smoothing = smoothing;
        }
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            vsync: self.vsync,
            ..BackendConfig::default()
        }
    }

    /// Offscreen size for a window of `width` x `height`, never below 1x1.
    pub fn scaled_size(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = if self.resolution_scale.is_finite() && self.resolution_scale > 0.0 {
            self.resolution_scale
        } else {
            1.0
        };
        let scaled = |value: u32| ((value as f32 * scale).round() as u32).max(1);
        (scaled(width), scaled(height))
    }

    pub fn renderer_config(&self, width: u32, height: u32) -> RendererConfig {
        RendererConfig {
            framebuffer_size: (width, height),
            clear_color: self.clear_color,
            ..RendererConfig::default()
        }
        .with_shader_dir(&self.shader_dir)
    }

    /// A fresh animation state using the configured speeds.
    pub fn fractal_state(&self, initial: FractalParameters) -> FractalState {
        let mut state = FractalState::new(initial);
        state.set_smoothing(self.smoothing);
        state.set_movement_speed(self.movement_speed);
        state.set_rotation_speed(self.rotation_speed);
        state.set_zoom_speed(self.zoom_speed);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    use crate::cli::Cli;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_or_default(&dir.path().join("settings.toml"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "smoothing = 9.5\nvsync = false\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.smoothing, 9.5);
        assert!(!settings.vsync);
        assert_eq!(settings.width, 1280);
        assert!(settings.escape_closes_app);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "width = \"wide\"\n").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse settings file"));
        assert_eq!(Settings::load_or_default(&path), Settings::default());
    }

    #[test]
    fn cli_overrides_file_values() {
        let cli = Cli::try_parse_from([
            "fractalscope",
            "ship.fractal",
            "--size",
            "800x600",
            "--export-dir",
            "shots",
        ])
        .unwrap();
        let mut settings = Settings::default();
        settings.apply_run_args(&cli.run);

        assert_eq!(settings.startup_configuration, PathBuf::from("ship.fractal"));
        assert_eq!((settings.width, settings.height), (800, 600));
        assert_eq!(settings.export_dir, PathBuf::from("shots"));
        assert_eq!(settings.shader_dir, PathBuf::from("assets/shaders"));
    }

    #[test]
    fn scaled_size_never_reaches_zero() {
        let settings = Settings {
            resolution_scale: 0.5,
            ..Settings::default()
        };
        assert_eq!(settings.scaled_size(1280, 720), (640, 360));
        assert_eq!(settings.scaled_size(1, 1), (1, 1));
    }

    #[test]
    fn fractal_state_uses_configured_speeds() {
        let settings = Settings {
            smoothing: 2.0,
            zoom_speed: 3.0,
            ..Settings::default()
        };
        let state = settings.fractal_state(FractalParameters::default());
        assert_eq!(state.smoothing(), 2.0);
        assert_eq!(state.zoom_speed(), 3.0);
        assert_eq!(state.current(), state.target());
    }
}
