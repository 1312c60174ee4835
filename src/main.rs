use anyhow::{anyhow, Context, Result};
use clap::Parser;

use tomo_xf::{run, Cli, InputMode, ZAxis};

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .parse_default_env()
        .init();

    let config = cli.run_config().map_err(|e| anyhow!(e))?;

    let summary = run(&config).with_context(|| match &config.mode {
        InputMode::Alignment { first, second, .. } => format!(
            "Failed to compute transform from alignment files {:?} and {:?}",
            first, second
        ),
        InputMode::Affine { first, second } => format!(
            "Failed to compute transform from transform files {:?} and {:?}",
            first, second
        ),
    })?;

    let delta = summary.delta;
    eprintln!("Wrote rigid transform to {:?}", config.output);
    eprintln!(
        "  drotation = {:.3}°, dX = {:.3}px, dY = {:.3}px, flip-Z = {}, pairs = {}",
        delta.rotation,
        delta.dx,
        delta.dy,
        config.z_axis == ZAxis::Flip,
        delta.pairs
    );

    Ok(())
}
