pub mod cli;
pub mod error;
pub mod estimate;
pub mod geometry;
pub mod pipeline;
pub mod records;
pub mod writer;

pub use cli::{Cli, InputMode, RunConfig};
pub use error::XfError;
pub use estimate::{estimate_from_affine, estimate_from_alignment, median, PairwiseDelta};
pub use geometry::{compute_rigid_transform, RigidTransform, ZAxis};
pub use pipeline::{run, RunSummary};
pub use records::{parse_affine_table, parse_alignment_table, AffineRecord, AlignmentRecord};
pub use writer::write_transform;
