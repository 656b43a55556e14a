use std::path::Path;

use anyhow::Result;
use fractal::FractalParameters;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::settings::Settings;
use crate::window;

pub fn run(args: RunArgs, mut settings: Settings) -> Result<()> {
    settings.apply_run_args(&args);
    tracing::debug!(
        configuration = %settings.startup_configuration.display(),
        shaders = %settings.shader_dir.display(),
        export = %settings.export_dir.display(),
        width = settings.width,
        height = settings.height,
        resolution_scale = settings.resolution_scale,
        "resolved fractalscope settings"
    );

    let initial = load_parameters(&settings.startup_configuration);
    window::run_window(settings, initial)
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Reads the startup document; a missing or broken file falls back to the
/// built-in defaults so the window still opens.
pub fn load_parameters(path: &Path) -> FractalParameters {
    match fractal::load(path) {
        Ok(params) => {
            tracing::info!(path = %path.display(), "loaded fractal configuration");
            params
        }
        Err(err) => {
            tracing::error!(
                path = %path.display(),
                "failed to load fractal configuration; using defaults: {err}"
            );
            FractalParameters::default()
        }
    }
}
