use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{Result, XfError};
use crate::geometry::derived_angle_degrees;

/// One projection image from a tilt-series alignment table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentRecord {
    /// Image (section) index as written in the table
    pub section: u32,
    /// In-plane rotation about Z, degrees
    pub rotation: f64,
    pub tx: f64,
    pub ty: f64,
    /// Stage tilt, degrees
    pub tilt: f64,
}

/// One projection image from a per-image 2D transform table:
/// `a11 a12 a21 a22 dx dy`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineRecord {
    pub a11: f64,
    pub a12: f64,
    pub a21: f64,
    pub a22: f64,
    pub dx: f64,
    pub dy: f64,
}

impl AffineRecord {
    pub const FIELD_COUNT: usize = 6;

    /// In-plane rotation in degrees, atan2(a21, a11).
    ///
    /// Assumes the linear block is a pure rotation; shear or anisotropic scale
    /// biases the result.
    pub fn rotation_degrees(&self) -> f64 {
        derived_angle_degrees(self.a11, self.a21)
    }
}

/// Column positions of the fields we need in an alignment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub section: usize,
    pub rotation: usize,
    pub tx: usize,
    pub ty: usize,
    pub tilt: usize,
}

impl ColumnLayout {
    /// `SEC ROT TX TY TILT`, used when the table carries no column header.
    pub const COMPACT: ColumnLayout = ColumnLayout {
        section: 0,
        rotation: 1,
        tx: 2,
        ty: 3,
        tilt: 4,
    };

    /// Read column positions from a header comment such as
    /// `# SEC ROT GMAG TX TY SMEAN SFIT SCALE BASE TILT`.
    pub fn from_header(line: &str) -> Option<Self> {
        let body = line.trim_start().strip_prefix('#')?;
        let names: Vec<String> = body
            .split_whitespace()
            .map(|token| token.to_ascii_uppercase())
            .collect();
        let find = |name: &str| names.iter().position(|n| n == name);

        Some(Self {
            section: find("SEC")?,
            rotation: find("ROT")?,
            tx: find("TX")?,
            ty: find("TY")?,
            tilt: find("TILT")?,
        })
    }

    fn min_fields(&self) -> usize {
        [self.section, self.rotation, self.tx, self.ty, self.tilt]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::COMPACT
    }
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#')
}

pub(crate) fn parse_number(line_no: usize, line: &str, token: &str) -> Result<f64> {
    let value: f64 = token
        .parse()
        .map_err(|_| XfError::parse(line_no, line, format!("non-numeric field '{}'", token)))?;
    if !value.is_finite() {
        return Err(XfError::parse(
            line_no,
            line,
            format!("non-finite field '{}'", token),
        ));
    }
    Ok(value)
}

/// Split a data line into exactly `expected` numeric fields.
pub(crate) fn parse_fields(line_no: usize, line: &str, expected: usize) -> Result<Vec<f64>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != expected {
        return Err(XfError::parse(
            line_no,
            line,
            format!("expected {} fields, found {}", expected, tokens.len()),
        ));
    }
    tokens
        .iter()
        .map(|token| parse_number(line_no, line, token))
        .collect()
}

/// Parse the global table of a tilt-series alignment file.
///
/// Comment lines before the first data row may carry the column header; the
/// first comment after a data row (e.g. `# Local Alignment`) ends the table.
pub fn parse_alignment_table(text: &str) -> Result<Vec<AlignmentRecord>> {
    let mut layout = ColumnLayout::default();
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_comment(trimmed) {
            if !records.is_empty() {
                break;
            }
            if let Some(found) = ColumnLayout::from_header(trimmed) {
                layout = found;
            }
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        if tokens.len() < layout.min_fields() {
            return Err(XfError::parse(
                line_no,
                line,
                format!(
                    "expected at least {} fields, found {}",
                    layout.min_fields(),
                    tokens.len()
                ),
            ));
        }

        let section_token = tokens[layout.section];
        let section: u32 = section_token.parse().map_err(|_| {
            XfError::parse(
                line_no,
                line,
                format!("invalid image index '{}'", section_token),
            )
        })?;
        if !seen.insert(section) {
            return Err(XfError::parse(
                line_no,
                line,
                format!("duplicate image index {}", section),
            ));
        }

        records.push(AlignmentRecord {
            section,
            rotation: parse_number(line_no, line, tokens[layout.rotation])?,
            tx: parse_number(line_no, line, tokens[layout.tx])?,
            ty: parse_number(line_no, line, tokens[layout.ty])?,
            tilt: parse_number(line_no, line, tokens[layout.tilt])?,
        });
    }

    Ok(records)
}

/// Parse a per-image transform table, one `a11 a12 a21 a22 dx dy` row per image.
pub fn parse_affine_table(text: &str) -> Result<Vec<AffineRecord>> {
    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_comment(trimmed) {
            continue;
        }
        let f = parse_fields(idx + 1, line, AffineRecord::FIELD_COUNT)?;
        records.push(AffineRecord {
            a11: f[0],
            a12: f[1],
            a21: f[2],
            a22: f[3],
            dx: f[4],
            dy: f[5],
        });
    }
    Ok(records)
}

pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| XfError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_alignment_file(path: &Path) -> Result<Vec<AlignmentRecord>> {
    let text = read_text(path)?;
    parse_alignment_table(&text).map_err(|e| e.with_path(path))
}

pub fn read_affine_file(path: &Path) -> Result<Vec<AffineRecord>> {
    let text = read_text(path)?;
    parse_affine_table(&text).map_err(|e| e.with_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ARETOMO_ALN: &str = "\
# AreTomo Alignment / Priims bprmMn
# RawSize = 4096 4096 3
# NumPatches = 0
# DarkFrame =     0    0   -60.00
# SEC     ROT         GMAG       TX          TY      SMEAN     SFIT    SCALE     BASE     TILT
    0    85.3520    1.00000    -12.250     30.500     1.00     1.00     1.00     0.00    -3.00
    1    85.4010    1.00000    -10.125     28.000     1.00     1.00     1.00     0.00     0.00
    2    85.3300    1.00000     -9.000     27.500     1.00     1.00     1.00     0.00     3.00
# Local Alignment
   0    0   100.0   200.0   1.0   2.0   1.0
";

    #[test]
    fn test_header_selects_columns() {
        let records = parse_alignment_table(ARETOMO_ALN).unwrap();
        assert_eq!(records.len(), 3);
        let r = records[1];
        assert_eq!(r.section, 1);
        assert_abs_diff_eq!(r.rotation, 85.401);
        assert_abs_diff_eq!(r.tx, -10.125);
        assert_abs_diff_eq!(r.ty, 28.0);
        assert_abs_diff_eq!(r.tilt, 0.0);
    }

    #[test]
    fn test_compact_layout_without_header() {
        let text = "0 1.5 2.0 3.0 -60.0\n1 1.0 2.5 3.5 -57.0\n";
        let records = parse_alignment_table(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            AlignmentRecord {
                section: 0,
                rotation: 1.5,
                tx: 2.0,
                ty: 3.0,
                tilt: -60.0
            }
        );
    }

    #[test]
    fn test_alignment_short_row_is_error() {
        let err = parse_alignment_table("0 1.0 2.0 3.0\n").unwrap_err();
        match err {
            XfError::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_alignment_bad_number_is_error() {
        let err = parse_alignment_table("0 1.0 2.0 3.0 0.0\n1 abc 2.0 3.0 0.0\n").unwrap_err();
        match err {
            XfError::Parse { line, content, .. } => {
                assert_eq!(line, 2);
                assert!(content.contains("abc"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_alignment_duplicate_index_is_error() {
        let err = parse_alignment_table("3 0 0 0 0\n3 0 0 0 1\n").unwrap_err();
        assert!(err.to_string().contains("duplicate image index 3"));
    }

    #[test]
    fn test_header_requires_all_columns() {
        assert_eq!(ColumnLayout::from_header("# SEC ROT TX TY"), None);
        assert_eq!(ColumnLayout::from_header("SEC ROT TX TY TILT"), None);
        assert_eq!(
            ColumnLayout::from_header("#sec rot tx ty tilt"),
            Some(ColumnLayout::COMPACT)
        );
    }

    #[test]
    fn test_affine_table() {
        let text = "\n   1.0  0.0  0.0  1.0  5.5  -2.0\n0.0 -1.0 1.0 0.0 0 0\n";
        let records = parse_affine_table(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_abs_diff_eq!(records[0].dx, 5.5);
        assert_abs_diff_eq!(records[0].dy, -2.0);
        assert_abs_diff_eq!(records[0].rotation_degrees(), 0.0);
        assert_abs_diff_eq!(records[1].rotation_degrees(), 90.0, epsilon = 1e-12);
    }

    #[test]
    fn test_affine_wrong_field_count() {
        let err = parse_affine_table("1 0 0 1 0\n").unwrap_err();
        assert!(err.to_string().contains("expected 6 fields, found 5"));
        assert!(parse_affine_table("1 0 0 1 0 0 0\n").is_err());
    }

    #[test]
    fn test_affine_rejects_non_finite() {
        assert!(parse_affine_table("1 0 0 1 nan 0\n").is_err());
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let err = read_affine_file(Path::new("/nonexistent/dir/file.xf")).unwrap_err();
        assert!(matches!(err, XfError::Io { .. }));
    }
}
