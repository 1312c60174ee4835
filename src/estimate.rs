use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::error::{Result, XfError};
use crate::records::{AffineRecord, AlignmentRecord};

/// Default |tilt| cutoff for alignment mode, degrees.
pub const DEFAULT_TILT_CUTOFF: f64 = 5.0;

/// Rotation and translation of matched images from one input file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerImageSeries {
    pub rotation: Vec<f64>,
    pub tx: Vec<f64>,
    pub ty: Vec<f64>,
}

impl PerImageSeries {
    fn with_capacity(n: usize) -> Self {
        Self {
            rotation: Vec::with_capacity(n),
            tx: Vec::with_capacity(n),
            ty: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, rotation: f64, tx: f64, ty: f64) {
        self.rotation.push(rotation);
        self.tx.push(tx);
        self.ty.push(ty);
    }

    pub fn len(&self) -> usize {
        self.rotation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rotation.is_empty()
    }
}

/// Index-matched series from both inputs; element `i` of `first` and `second`
/// describe the same image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairedSeries {
    pub first: PerImageSeries,
    pub second: PerImageSeries,
}

/// Median frame-to-frame offset, second input minus first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairwiseDelta {
    /// Degrees
    pub rotation: f64,
    pub dx: f64,
    pub dy: f64,
    /// Number of image pairs the medians were taken over
    pub pairs: usize,
}

/// Median of a sequence; even lengths average the two central values.
pub fn median(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(XfError::InsufficientData(
            "cannot take the median of an empty sequence".to_string(),
        ));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Ok((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Ok(sorted[mid])
    }
}

fn median_of_differences(
    first: &[f64],
    second: &[f64],
    difference: impl Fn(f64, f64) -> f64,
) -> Result<f64> {
    if first.len() != second.len() {
        return Err(XfError::InsufficientData(format!(
            "sequences differ in length ({} vs {})",
            first.len(),
            second.len()
        )));
    }
    let diffs: Vec<f64> = first
        .iter()
        .zip(second)
        .map(|(&a, &b)| difference(a, b))
        .collect();
    median(&diffs)
}

/// Median of the element-wise differences `second[i] - first[i]`.
pub fn median_difference(first: &[f64], second: &[f64]) -> Result<f64> {
    median_of_differences(first, second, |a, b| b - a)
}

/// Wrap an angle difference into (-180, 180] degrees.
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Median of `second[i] - first[i]` for angles, each difference wrapped into
/// (-180, 180] so images either side of ±180° compare by their short way round.
pub fn median_angle_difference(first: &[f64], second: &[f64]) -> Result<f64> {
    median_of_differences(first, second, |a, b| wrap_degrees(b - a))
}

/// Keep records with |tilt| <= `cutoff` degrees.
pub fn filter_by_tilt(records: &[AlignmentRecord], cutoff: f64) -> Vec<AlignmentRecord> {
    records
        .iter()
        .filter(|r| r.tilt.abs() <= cutoff)
        .copied()
        .collect()
}

fn format_indices(indices: &[u32]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Filter both alignment tables by tilt and pair what remains by image index.
///
/// Fails if either side is empty after filtering or the two sides do not
/// cover the same image indices.
pub fn pair_alignment(
    first: &[AlignmentRecord],
    second: &[AlignmentRecord],
    tilt_cutoff: f64,
) -> Result<PairedSeries> {
    let kept_first = filter_by_tilt(first, tilt_cutoff);
    let kept_second = filter_by_tilt(second, tilt_cutoff);
    info!(
        "tilt cutoff ±{:.2}°: kept {}/{} (first) and {}/{} (second) images",
        tilt_cutoff,
        kept_first.len(),
        first.len(),
        kept_second.len(),
        second.len()
    );

    for (label, kept) in [("first", &kept_first), ("second", &kept_second)] {
        if kept.is_empty() {
            return Err(XfError::InsufficientData(format!(
                "no images within ±{}° of zero tilt in the {} alignment",
                tilt_cutoff, label
            )));
        }
    }

    let by_section_first: BTreeMap<u32, &AlignmentRecord> =
        kept_first.iter().map(|r| (r.section, r)).collect();
    let by_section_second: BTreeMap<u32, &AlignmentRecord> =
        kept_second.iter().map(|r| (r.section, r)).collect();

    let only_first: Vec<u32> = by_section_first
        .keys()
        .filter(|k| !by_section_second.contains_key(k))
        .copied()
        .collect();
    let only_second: Vec<u32> = by_section_second
        .keys()
        .filter(|k| !by_section_first.contains_key(k))
        .copied()
        .collect();

    if !only_first.is_empty() || !only_second.is_empty() {
        warn!(
            "unmatched image indices after tilt filtering: first only [{}], second only [{}]",
            format_indices(&only_first),
            format_indices(&only_second)
        );
        return Err(XfError::InsufficientData(format!(
            "alignments do not cover the same images after tilt filtering \
             ({} vs {} images; first only [{}], second only [{}])",
            kept_first.len(),
            kept_second.len(),
            format_indices(&only_first),
            format_indices(&only_second)
        )));
    }

    let mut paired = PairedSeries {
        first: PerImageSeries::with_capacity(by_section_first.len()),
        second: PerImageSeries::with_capacity(by_section_second.len()),
    };
    for (section, a) in &by_section_first {
        let b = by_section_second[section];
        debug!(
            "image {}: drot={:.4} dx={:.3} dy={:.3}",
            section,
            wrap_degrees(b.rotation - a.rotation),
            b.tx - a.tx,
            b.ty - a.ty
        );
        paired.first.push(a.rotation, a.tx, a.ty);
        paired.second.push(b.rotation, b.tx, b.ty);
    }

    Ok(paired)
}

/// Pair per-image transforms by row order, deriving each image's rotation
/// from its linear block.
pub fn pair_affine(first: &[AffineRecord], second: &[AffineRecord]) -> Result<PairedSeries> {
    if first.is_empty() || second.is_empty() {
        return Err(XfError::InsufficientData(format!(
            "transform tables must not be empty ({} vs {} rows)",
            first.len(),
            second.len()
        )));
    }
    if first.len() != second.len() {
        return Err(XfError::InsufficientData(format!(
            "transform tables differ in length ({} vs {} rows)",
            first.len(),
            second.len()
        )));
    }

    let mut paired = PairedSeries {
        first: PerImageSeries::with_capacity(first.len()),
        second: PerImageSeries::with_capacity(second.len()),
    };
    for (a, b) in first.iter().zip(second) {
        paired.first.push(a.rotation_degrees(), a.dx, a.dy);
        paired.second.push(b.rotation_degrees(), b.dx, b.dy);
    }
    Ok(paired)
}

/// Per-component median of second minus first.
pub fn estimate_delta(paired: &PairedSeries) -> Result<PairwiseDelta> {
    let delta = PairwiseDelta {
        rotation: median_angle_difference(&paired.first.rotation, &paired.second.rotation)?,
        dx: median_difference(&paired.first.tx, &paired.second.tx)?,
        dy: median_difference(&paired.first.ty, &paired.second.ty)?,
        pairs: paired.first.len(),
    };
    info!(
        "median over {} pairs: drot={:.4}° dx={:.3} dy={:.3}",
        delta.pairs, delta.rotation, delta.dx, delta.dy
    );
    Ok(delta)
}

pub fn estimate_from_alignment(
    first: &[AlignmentRecord],
    second: &[AlignmentRecord],
    tilt_cutoff: f64,
) -> Result<PairwiseDelta> {
    estimate_delta(&pair_alignment(first, second, tilt_cutoff)?)
}

pub fn estimate_from_affine(first: &[AffineRecord], second: &[AffineRecord]) -> Result<PairwiseDelta> {
    estimate_delta(&pair_affine(first, second)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn aln(section: u32, rotation: f64, tx: f64, ty: f64, tilt: f64) -> AlignmentRecord {
        AlignmentRecord {
            section,
            rotation,
            tx,
            ty,
            tilt,
        }
    }

    fn rigid(angle_deg: f64, dx: f64, dy: f64) -> AffineRecord {
        let (s, c) = angle_deg.to_radians().sin_cos();
        AffineRecord {
            a11: c,
            a12: -s,
            a21: s,
            a22: c,
            dx,
            dy,
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
        assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 2.5);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
        assert_eq!(median(&[-7.5]).unwrap(), -7.5);
    }

    #[test]
    fn test_median_empty_is_insufficient() {
        assert!(matches!(median(&[]), Err(XfError::InsufficientData(_))));
    }

    #[test]
    fn test_median_resists_outlier() {
        let d = median_difference(&[0.0, 0.0, 0.0, 0.0, 0.0], &[1.0, 1.1, 0.9, 1.0, 500.0]).unwrap();
        assert_abs_diff_eq!(d, 1.0);
    }

    #[test]
    fn test_median_difference_length_mismatch() {
        assert!(matches!(
            median_difference(&[1.0, 2.0], &[1.0]),
            Err(XfError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_alignment_example_with_cutoff() {
        let first = [aln(0, 0.0, 1.0, 0.0, 0.0), aln(1, 0.0, 2.0, 0.0, 10.0)];
        let second = [aln(0, 5.0, 3.0, 0.0, 0.0), aln(1, 5.0, 10.0, 0.0, 10.0)];
        let delta = estimate_from_alignment(&first, &second, 5.0).unwrap();
        assert_eq!(delta.pairs, 1);
        assert_abs_diff_eq!(delta.rotation, 5.0);
        assert_abs_diff_eq!(delta.dx, 2.0);
        assert_abs_diff_eq!(delta.dy, 0.0);
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let first = [aln(0, 0.0, 0.0, 0.0, -5.0)];
        let second = [aln(0, 1.0, 0.0, 0.0, 5.0)];
        assert_eq!(filter_by_tilt(&first, 5.0).len(), 1);
        assert!(estimate_from_alignment(&first, &second, 5.0).is_ok());
    }

    #[test]
    fn test_alignment_pairs_by_index_not_position() {
        let first = [aln(0, 0.0, 0.0, 0.0, 0.0), aln(1, 0.0, 10.0, 0.0, 1.0)];
        let second = [aln(1, 0.0, 13.0, 0.0, 1.0), aln(0, 0.0, 3.0, 0.0, 0.0)];
        let delta = estimate_from_alignment(&first, &second, 5.0).unwrap();
        assert_abs_diff_eq!(delta.dx, 3.0);
    }

    #[test]
    fn test_everything_filtered_is_insufficient() {
        let first = [aln(0, 0.0, 0.0, 0.0, 30.0)];
        let second = [aln(0, 0.0, 0.0, 0.0, 0.0)];
        let err = estimate_from_alignment(&first, &second, 5.0).unwrap_err();
        assert!(matches!(err, XfError::InsufficientData(_)));
        assert!(err.to_string().contains("first"));
    }

    #[test]
    fn test_unequal_after_filtering_is_insufficient() {
        let first = [aln(0, 0.0, 0.0, 0.0, 0.0), aln(1, 0.0, 0.0, 0.0, 3.0)];
        let second = [aln(0, 0.0, 0.0, 0.0, 0.0), aln(1, 0.0, 0.0, 0.0, 6.0)];
        let err = estimate_from_alignment(&first, &second, 5.0).unwrap_err();
        assert!(matches!(err, XfError::InsufficientData(_)));
        assert!(err.to_string().contains("first only [1]"));
    }

    #[test]
    fn test_affine_estimate() {
        let first = [rigid(10.0, 1.0, 2.0), rigid(20.0, 1.0, 2.0), rigid(30.0, 1.0, 2.0)];
        let second = [rigid(12.0, 4.0, 0.0), rigid(22.0, 4.5, -1.0), rigid(90.0, 100.0, 2.0)];
        let delta = estimate_from_affine(&first, &second).unwrap();
        assert_eq!(delta.pairs, 3);
        assert_abs_diff_eq!(delta.rotation, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(delta.dx, 3.5);
        assert_abs_diff_eq!(delta.dy, -2.0);
    }

    #[test]
    fn test_wrap_degrees() {
        assert_abs_diff_eq!(wrap_degrees(-358.0), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_degrees(358.0), -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_degrees(180.0), 180.0);
        assert_abs_diff_eq!(wrap_degrees(-180.0), 180.0);
        assert_abs_diff_eq!(wrap_degrees(5.0), 5.0);
    }

    #[test]
    fn test_affine_rotation_across_half_turn() {
        // +179° -> -179° is a +2° step; +178° -> +180° also +2°
        let first = [rigid(179.0, 0.0, 0.0), rigid(178.0, 0.0, 0.0), rigid(-179.5, 0.0, 0.0)];
        let second = [rigid(-179.0, 0.0, 0.0), rigid(180.0, 0.0, 0.0), rigid(-177.5, 0.0, 0.0)];
        let delta = estimate_from_affine(&first, &second).unwrap();
        assert_abs_diff_eq!(delta.rotation, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_affine_unequal_lengths_fail() {
        let first = [rigid(0.0, 0.0, 0.0), rigid(0.0, 0.0, 0.0)];
        let second = [rigid(0.0, 0.0, 0.0)];
        assert!(matches!(
            estimate_from_affine(&first, &second),
            Err(XfError::InsufficientData(_))
        ));
        assert!(matches!(
            estimate_from_affine(&[], &[]),
            Err(XfError::InsufficientData(_))
        ));
    }
}
