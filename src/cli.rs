use clap::{ArgGroup, Parser};
use std::path::PathBuf;

use crate::estimate::DEFAULT_TILT_CUTOFF;
use crate::geometry::ZAxis;

#[derive(Parser, Debug)]
#[command(name = "tomo-xf")]
#[command(
    version,
    about = "Compute a single rigid 3x4 transform between two tomograms from their alignment or per-image transform files"
)]
#[command(group(ArgGroup::new("mode").required(true).args(["aln1", "xf1"])))]
pub struct Cli {
    /// Alignment file (.aln) of the source tomogram
    #[arg(long, requires = "aln2", conflicts_with_all = ["xf1", "xf2"])]
    pub aln1: Option<PathBuf>,

    /// Alignment file (.aln) of the target tomogram
    #[arg(long, requires = "aln1")]
    pub aln2: Option<PathBuf>,

    /// Per-image transform file (.xf) of the source tomogram
    #[arg(long, requires = "xf2")]
    pub xf1: Option<PathBuf>,

    /// Per-image transform file (.xf) of the target tomogram
    #[arg(long, requires = "xf1")]
    pub xf2: Option<PathBuf>,

    /// Output transform file
    #[arg(short, long)]
    pub out: PathBuf,

    /// Keep images with |tilt| <= cutoff degrees (alignment mode only)
    #[arg(
        long,
        default_value_t = DEFAULT_TILT_CUTOFF,
        value_parser = parse_cutoff,
        conflicts_with = "xf1"
    )]
    pub tilt_cutoff: f64,

    /// Invert the Z axis in the output transform
    #[arg(long)]
    pub flip_z: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Which pair of input tables the transform is estimated from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    Alignment {
        first: PathBuf,
        second: PathBuf,
        tilt_cutoff: f64,
    },
    Affine {
        first: PathBuf,
        second: PathBuf,
    },
}

/// Immutable settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub mode: InputMode,
    pub output: PathBuf,
    pub z_axis: ZAxis,
}

impl Cli {
    pub fn run_config(&self) -> Result<RunConfig, String> {
        let mode = match (&self.aln1, &self.aln2, &self.xf1, &self.xf2) {
            (Some(first), Some(second), None, None) => InputMode::Alignment {
                first: first.clone(),
                second: second.clone(),
                tilt_cutoff: self.tilt_cutoff,
            },
            (None, None, Some(first), Some(second)) => InputMode::Affine {
                first: first.clone(),
                second: second.clone(),
            },
            _ => return Err("give either --aln1/--aln2 or --xf1/--xf2".to_string()),
        };

        Ok(RunConfig {
            mode,
            output: self.out.clone(),
            z_axis: ZAxis::from_flag(self.flip_z),
        })
    }
}

fn parse_cutoff(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("Invalid tilt cutoff: {}", s))?;
    if !value.is_finite() || value < 0.0 {
        return Err("Tilt cutoff must be a non-negative number of degrees".to_string());
    }
    Ok(value)
}
