use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "fractalscope",
    author,
    version,
    about = "Interactive GPU fractal explorer",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Settings file; defaults to `settings.toml` in the user config directory.
    #[arg(long, global = true, env = "FRACTALSCOPE_SETTINGS", value_name = "FILE")]
    pub settings: Option<PathBuf>,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// `.fractal` document to open (defaults to the settings' startup configuration).
    #[arg(value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Offscreen resolution relative to the window (0.1-4.0).
    #[arg(long, value_name = "SCALE", value_parser = parse_resolution_scale)]
    pub resolution_scale: Option<f32>,

    /// Directory containing `mandelbrot.vert` and `mandelbrot.frag`.
    #[arg(long, value_name = "DIR")]
    pub shader_dir: Option<PathBuf>,

    /// Directory exported frames are written to.
    #[arg(long, value_name = "DIR")]
    pub export_dir: Option<PathBuf>,

    /// Exponential smoothing rate for parameter animation.
    #[arg(long, value_name = "RATE", value_parser = parse_positive)]
    pub smoothing: Option<f32>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render one frame of a `.fractal` document to a PNG without opening a window.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
pub struct RenderArgs {
    /// `.fractal` document to render.
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// PNG file to write.
    #[arg(long, short, value_name = "PATH")]
    pub output: PathBuf,

    /// Output size (e.g. `1920x1080`); defaults to the settings' window size.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Directory containing `mandelbrot.vert` and `mandelbrot.frag`.
    #[arg(long, value_name = "DIR")]
    pub shader_dir: Option<PathBuf>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_resolution_scale(value: &str) -> Result<f32, String> {
    let scale = parse_positive(value)?;
    if !(0.1..=4.0).contains(&scale) {
        return Err(format!("resolution scale {scale} is outside 0.1-4.0"));
    }
    Ok(scale)
}

pub fn parse_positive(value: &str) -> Result<f32, String> {
    let trimmed = value.trim();
    let parsed = trimmed
        .parse::<f32>()
        .map_err(|_| format!("invalid number '{trimmed}'"))?;
    if !parsed.is_finite() || parsed <= 0.0 {
        return Err(format!("{trimmed} must be a positive number"));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("1280x720").unwrap(), (1280, 720));
        assert_eq!(parse_size(" 640 X 480 ").unwrap(), (640, 480));
        assert!(parse_size("1280").is_err());
        assert!(parse_size("0x720").is_err());
        assert!(parse_size("widexhigh").is_err());
    }

    #[test]
    fn resolution_scale_is_bounded() {
        assert_eq!(parse_resolution_scale("0.5").unwrap(), 0.5);
        assert!(parse_resolution_scale("0").is_err());
        assert!(parse_resolution_scale("8").is_err());
        assert!(parse_positive("NaN").is_err());
    }

    #[test]
    fn render_subcommand_takes_config_and_output() {
        let cli = Cli::try_parse_from([
            "fractalscope",
            "render",
            "ship.fractal",
            "--output",
            "out.png",
            "--size",
            "320x200",
        ])
        .unwrap();
        let Some(Command::Render(args)) = cli.command else {
            panic!("expected render subcommand");
        };
        assert_eq!(args.config, PathBuf::from("ship.fractal"));
        assert_eq!(args.output, PathBuf::from("out.png"));
        assert_eq!(args.size, Some((320, 200)));
    }

    #[test]
    fn window_mode_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "fractalscope",
            "preset.fractal",
            "--smoothing",
            "8",
            "--resolution-scale",
            "0.75",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.config, Some(PathBuf::from("preset.fractal")));
        assert_eq!(cli.run.smoothing, Some(8.0));
        assert_eq!(cli.run.resolution_scale, Some(0.75));
    }
}
