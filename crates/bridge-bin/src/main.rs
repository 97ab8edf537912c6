//! channeldir bridge - connects the channeldir application core to Supabase.

mod app;
mod console;

use std::path::PathBuf;

use bridge_config::{init_logging, Config, Paths};
use clap::Parser;

/// channeldir bridge command-line interface.
#[derive(Parser)]
#[command(name = "channeldir-bridge")]
#[command(about = "Bridge between the channeldir application core and Supabase")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Base directory for runtime files (config, logs, session). Defaults to ~/.channeldir
    #[arg(long)]
    base_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    paths.ensure_dirs()?;

    let config = Config::load(&paths)?;

    init_logging(&cli.log_level, Some(paths.log_file()))?;

    app::run(config, paths).await
}
