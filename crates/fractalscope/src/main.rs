mod cli;
mod keys;
mod render;
mod run;
mod settings;
mod window;

use anyhow::Result;
use cli::Command;
use settings::Settings;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    let settings_path = cli.settings.clone().or_else(settings::default_path);
    let settings = match settings_path.as_deref() {
        Some(path) => Settings::load_or_default(path),
        None => {
            tracing::debug!("no settings directory available; using defaults");
            Settings::default()
        }
    };

    match cli.command {
        Some(Command::Render(args)) => render::render(args, settings),
        None => run::run(cli.run, settings),
    }
}
