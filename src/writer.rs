use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use nalgebra::Matrix3x4;
use tempfile::NamedTempFile;

use crate::error::{Result, XfError};
use crate::geometry::RigidTransform;
use crate::records::{parse_fields, read_text};

const ROWS: usize = 3;
const COLS: usize = 4;

/// Fixed-point field with a leading separator; `-0.0` is written as `0.000000`.
fn write_field(f: &mut fmt::Formatter<'_>, value: f64) -> fmt::Result {
    write!(f, " {:>11.6}", value + 0.0)
}

impl fmt::Display for RigidTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.matrix();
        for r in 0..ROWS {
            for c in 0..COLS {
                write_field(f, m[(r, c)])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl RigidTransform {
    /// Read back a single 3x4 matrix written by [`write_transform`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut matrix = Matrix3x4::zeros();
        let mut row = 0;
        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if row == ROWS {
                return Err(XfError::parse(
                    idx + 1,
                    line,
                    format!("unexpected line after {} matrix rows", ROWS),
                ));
            }
            for (c, value) in parse_fields(idx + 1, line, COLS)?.into_iter().enumerate() {
                matrix[(row, c)] = value;
            }
            row += 1;
        }
        if row != ROWS {
            return Err(XfError::InsufficientData(format!(
                "expected {} matrix rows, found {}",
                ROWS, row
            )));
        }
        Ok(RigidTransform::from_matrix(matrix))
    }
}

impl FromStr for RigidTransform {
    type Err = XfError;

    fn from_str(s: &str) -> Result<Self> {
        RigidTransform::parse(s)
    }
}

/// Write (or overwrite) `path` with the single-matrix transform.
///
/// The text goes to a temporary file next to `path` that then replaces it, so
/// the destination is either left untouched or holds the complete matrix.
pub fn write_transform(path: &Path, transform: &RigidTransform) -> Result<()> {
    let io_err = |source: std::io::Error| XfError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(transform.to_string().as_bytes())
        .map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

pub fn read_transform(path: &Path) -> Result<RigidTransform> {
    let text = read_text(path)?;
    RigidTransform::parse(&text).map_err(|e| e.with_path(path))
}
