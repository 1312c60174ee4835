use nalgebra::{Matrix2, Matrix3x4, Rotation2, Vector2, Vector3};

/// Sign of the Z axis in the output transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZAxis {
    #[default]
    Keep,
    Flip,
}

impl ZAxis {
    pub fn from_flag(flip_z: bool) -> Self {
        if flip_z {
            ZAxis::Flip
        } else {
            ZAxis::Keep
        }
    }

    pub fn sign(self) -> f64 {
        match self {
            ZAxis::Keep => 1.0,
            ZAxis::Flip => -1.0,
        }
    }
}

/// Rigid 3x4 transform between two reconstructions:
///
/// ```text
/// [ cos θ  -sin θ  0  dx ]
/// [ sin θ   cos θ  0  dy ]
/// [ 0       0      s  0  ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    matrix: Matrix3x4<f64>,
}

impl RigidTransform {
    pub fn identity() -> Self {
        compute_rigid_transform(0.0, 0.0, 0.0, ZAxis::Keep)
    }

    pub(crate) fn from_matrix(matrix: Matrix3x4<f64>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &Matrix3x4<f64> {
        &self.matrix
    }

    /// The in-plane 2x2 rotation block.
    pub fn rotation_block(&self) -> Matrix2<f64> {
        self.matrix.fixed_view::<2, 2>(0, 0).into_owned()
    }

    pub fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.matrix[(0, 3)], self.matrix[(1, 3)])
    }

    /// Rotation angle of the in-plane block, degrees.
    pub fn rotation_degrees(&self) -> f64 {
        self.matrix[(1, 0)].atan2(self.matrix[(0, 0)]).to_degrees()
    }

    pub fn z_axis(&self) -> ZAxis {
        if self.matrix[(2, 2)] < 0.0 {
            ZAxis::Flip
        } else {
            ZAxis::Keep
        }
    }

    /// Apply the transform to a 3D point.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.matrix.fixed_view::<3, 3>(0, 0) * p + self.matrix.column(3)
    }
}

/// In-plane rotation of a per-image 2x2 block, degrees.
pub fn derived_angle_degrees(a11: f64, a21: f64) -> f64 {
    a21.atan2(a11).to_degrees()
}

/// Build the rigid transform for a rotation of `rotation_deg` degrees about Z,
/// an in-plane shift `(dx, dy)`, and the requested Z-axis sign.
pub fn compute_rigid_transform(rotation_deg: f64, dx: f64, dy: f64, z_axis: ZAxis) -> RigidTransform {
    let rot = Rotation2::new(rotation_deg.to_radians());
    let r = rot.matrix();

    #[rustfmt::skip]
    let matrix = Matrix3x4::new(
        r[(0, 0)], r[(0, 1)], 0.0,           dx,
        r[(1, 0)], r[(1, 1)], 0.0,           dy,
        0.0,       0.0,       z_axis.sign(), 0.0,
    );

    RigidTransform::from_matrix(matrix)
}
