use anyhow::{bail, Context, Result};
use renderer::{Renderer, WgpuBackend};

use crate::cli::RenderArgs;
use crate::settings::Settings;

/// Renders one frame of `args.config` offscreen and writes it as PNG.
pub fn render(args: RenderArgs, mut settings: Settings) -> Result<()> {
    if let Some(dir) = args.shader_dir {
        settings.shader_dir = dir;
    }
    let (width, height) = args.size.unwrap_or((settings.width, settings.height));
    let params = fractal::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let backend = WgpuBackend::headless(settings.backend_config())
        .context("failed to initialise headless GPU backend")?;
    tracing::debug!(adapter = backend.adapter_name(), width, height, "rendering offscreen");
    let mut renderer = Renderer::new(backend, settings.renderer_config(width, height))?;
    if !renderer.shader().is_valid() {
        bail!(
            "fractal shader in {} failed to compile",
            settings.shader_dir.display()
        );
    }

    renderer.begin();
    renderer.submit(&params);
    renderer.end();

    if !renderer.export_frame(&args.output) {
        bail!("failed to write {}", args.output.display());
    }
    println!("{}", args.output.display());
    Ok(())
}
