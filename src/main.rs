// Serenade host: plays the ambient track and reads page interactions from stdin

use clap::Parser;
use std::path::PathBuf;

use serenade_lib::RunOptions;

#[derive(Parser)]
#[command(name = "serenade", about = "Ambient greeting-page audio with volume ducking", version)]
struct Cli {
    /// Directory for settings.json and preferences.json
    #[arg(long, default_value = ".serenade")]
    app_dir: PathBuf,

    /// Directory track and clip paths are relative to
    #[arg(long, default_value = ".")]
    assets: PathBuf,

    /// Ambient track, overriding the configured one
    #[arg(long)]
    track: Option<PathBuf>,

    /// Restart the ambient track when it ends
    #[arg(long = "loop")]
    looping: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    serenade_lib::run(RunOptions {
        app_dir: cli.app_dir,
        asset_dir: cli.assets,
        track: cli.track,
        looping: cli.looping,
    })
    .await
}
