use log::{debug, info};

use crate::cli::{InputMode, RunConfig};
use crate::error::Result;
use crate::estimate::{estimate_from_affine, estimate_from_alignment, PairwiseDelta};
use crate::geometry::{compute_rigid_transform, RigidTransform};
use crate::records::{read_affine_file, read_alignment_file};
use crate::writer::write_transform;

/// Result of a completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub delta: PairwiseDelta,
    pub transform: RigidTransform,
}

/// Estimate the median offset between the two inputs named by `mode`.
pub fn estimate(mode: &InputMode) -> Result<PairwiseDelta> {
    match mode {
        InputMode::Alignment {
            first,
            second,
            tilt_cutoff,
        } => {
            let a = read_alignment_file(first)?;
            let b = read_alignment_file(second)?;
            info!(
                "read {} and {} alignment records from {:?} and {:?}",
                a.len(),
                b.len(),
                first,
                second
            );
            estimate_from_alignment(&a, &b, *tilt_cutoff)
        }
        InputMode::Affine { first, second } => {
            let a = read_affine_file(first)?;
            let b = read_affine_file(second)?;
            info!(
                "read {} and {} per-image transforms from {:?} and {:?}",
                a.len(),
                b.len(),
                first,
                second
            );
            estimate_from_affine(&a, &b)
        }
    }
}

/// Read both inputs, estimate the offset, and write the transform.
///
/// Nothing is written unless the estimate succeeds.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    let delta = estimate(&config.mode)?;
    let transform = compute_rigid_transform(delta.rotation, delta.dx, delta.dy, config.z_axis);
    debug!("transform:\n{}", transform);

    write_transform(&config.output, &transform)?;
    Ok(RunSummary { delta, transform })
}
