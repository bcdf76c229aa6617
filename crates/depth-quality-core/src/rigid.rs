//! Rigid (rotation + translation) transforms and their least-squares fit.

use nalgebra::{
    Isometry3, Matrix3, Matrix4, Point3, Rotation3, Translation3, UnitQuaternion, Vector3,
};
use serde::{Deserialize, Serialize};

/// Minimum number of correspondences for a unique rigid fit.
pub const MIN_RIGID_CORRESPONDENCES: usize = 3;

/// Errors from [`estimate_rigid_transform`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RigidSolveError {
    #[error("source and target point counts differ ({src} vs {dst})")]
    MismatchedLengths { src: usize, dst: usize },
    #[error("underdetermined rigid fit: {found} correspondences, need at least {required}")]
    TooFewCorrespondences { found: usize, required: usize },
    #[error("degenerate correspondences: points are coincident or collinear")]
    Degenerate,
    #[error("SVD of the cross-covariance did not converge")]
    SvdFailed,
}

/// A proper rigid motion: `p' = R p + t` with `R` orthonormal, `det R = +1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub iso: Isometry3<f64>,
}

impl RigidTransform {
    pub fn new(iso: Isometry3<f64>) -> Self {
        Self { iso }
    }

    pub fn identity() -> Self {
        Self::new(Isometry3::identity())
    }

    /// Build from a rotation matrix and translation.
    ///
    /// The matrix is re-orthonormalised through a unit quaternion.
    pub fn from_parts(r: Matrix3<f64>, t: Vector3<f64>) -> Self {
        let rot = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r));
        Self::new(Isometry3::from_parts(Translation3::from(t), rot))
    }

    /// Homogeneous 4x4 matrix.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        self.iso.to_homogeneous()
    }

    /// Row-major 4x4 matrix.
    pub fn to_array(&self) -> [[f64; 4]; 4] {
        let m = self.to_matrix();
        let mut out = [[0.0; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = m[(r, c)];
            }
        }
        out
    }

    /// Linear block of the homogeneous matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.iso.rotation.to_rotation_matrix().into_inner()
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.iso.translation.vector
    }

    #[inline]
    pub fn apply(&self, p: &Point3<f64>) -> Point3<f64> {
        self.iso.transform_point(p)
    }

    /// Rotate a direction (translation is ignored).
    #[inline]
    pub fn rotate(&self, v: &Vector3<f64>) -> Vector3<f64> {
        self.iso.transform_vector(v)
    }

    pub fn inverse(&self) -> Self {
        Self::new(self.iso.inverse())
    }

    /// RMS of `|T src_i - dst_i|`.
    pub fn rms_residual(&self, src: &[Point3<f64>], dst: &[Point3<f64>]) -> f64 {
        if src.is_empty() {
            return 0.0;
        }
        let sum: f64 = src
            .iter()
            .zip(dst)
            .map(|(s, d)| (self.apply(s) - d).norm_squared())
            .sum();
        (sum / src.len().min(dst.len()) as f64).sqrt()
    }
}

fn centroid(pts: &[Point3<f64>]) -> Vector3<f64> {
    let mut c = Vector3::zeros();
    for p in pts {
        c += p.coords;
    }
    c / pts.len() as f64
}

/// Least-squares rigid transform mapping `src` onto `dst`.
///
/// Minimises `sum |R src_i + t - dst_i|^2` over rotations and translations
/// only (Kabsch: SVD of the cross-covariance followed by a reflection fix).
/// At least three non-collinear correspondences are required.
pub fn estimate_rigid_transform(
    src: &[Point3<f64>],
    dst: &[Point3<f64>],
) -> Result<RigidTransform, RigidSolveError> {
    if src.len() != dst.len() {
        return Err(RigidSolveError::MismatchedLengths {
            src: src.len(),
            dst: dst.len(),
        });
    }
    if src.len() < MIN_RIGID_CORRESPONDENCES {
        return Err(RigidSolveError::TooFewCorrespondences {
            found: src.len(),
            required: MIN_RIGID_CORRESPONDENCES,
        });
    }

    let c_s = centroid(src);
    let c_d = centroid(dst);

    let mut h = Matrix3::zeros();
    let mut spread = Matrix3::zeros();
    for (ps, pd) in src.iter().zip(dst) {
        let ds = ps.coords - c_s;
        let dd = pd.coords - c_d;
        h += dd * ds.transpose();
        spread += ds * ds.transpose();
    }

    if is_rank_deficient(&spread) {
        return Err(RigidSolveError::Degenerate);
    }

    let svd = h.svd(true, true);
    let u = svd.u.ok_or(RigidSolveError::SvdFailed)?;
    let v_t = svd.v_t.ok_or(RigidSolveError::SvdFailed)?;
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        // flip the axis of the smallest singular value
        let weakest = svd.singular_values.imin();
        let mut u_fix = u;
        u_fix.column_mut(weakest).neg_mut();
        r = u_fix * v_t;
    }

    let t = c_d - r * c_s;
    Ok(RigidTransform::from_parts(r, t))
}

/// True when the centered source points span less than a plane.
fn is_rank_deficient(spread: &Matrix3<f64>) -> bool {
    let mut sv: Vec<f64> = spread.singular_values().iter().copied().collect();
    sv.sort_by(|a, b| b.total_cmp(a));
    let largest = sv[0];
    if !largest.is_finite() || largest <= f64::MIN_POSITIVE {
        return true;
    }
    sv[1] <= largest * 1e-12
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_points() -> Vec<Point3<f64>> {
        (0..12)
            .map(|k| {
                let t = k as f64;
                Point3::new(
                    (t * 1.3).sin() * 50.0,
                    (t * 0.7).cos() * 40.0,
                    (t * 0.4).sin() * 10.0 + 5.0,
                )
            })
            .collect()
    }

    fn ground_truth() -> RigidTransform {
        RigidTransform::new(Isometry3::new(
            Vector3::new(0.12, -0.3, 0.55),
            Vector3::new(0.3, -1.1, 2.4),
        ))
    }

    #[test]
    fn recovers_exact_transform() {
        let src = sample_points();
        let gt = ground_truth();
        let dst: Vec<_> = src.iter().map(|p| gt.apply(p)).collect();

        let est = estimate_rigid_transform(&src, &dst).expect("solve");
        assert_relative_eq!(est.to_matrix(), gt.to_matrix(), epsilon = 1e-9);
        assert!(est.rms_residual(&src, &dst) < 1e-9);
    }

    #[test]
    fn rotation_block_is_orthonormal_under_noise() {
        let src = sample_points();
        let gt = ground_truth();
        let dst: Vec<_> = src
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let n = i as f64;
                gt.apply(p) + Vector3::new((n * 2.1).sin(), (n * 3.7).cos(), (n * 0.9).sin()) * 0.5
            })
            .collect();

        let est = estimate_rigid_transform(&src, &dst).expect("solve");
        let r = est.rotation_matrix();
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(r.transpose() * r, Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn mirrored_target_still_yields_proper_rotation() {
        let src = sample_points();
        let dst: Vec<_> = src.iter().map(|p| Point3::new(-p.x, p.y, p.z)).collect();
        let est = estimate_rigid_transform(&src, &dst).expect("solve");
        assert_relative_eq!(est.rotation_matrix().determinant(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn too_few_points_is_underdetermined() {
        let src = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let err = estimate_rigid_transform(&src, &src).unwrap_err();
        assert_eq!(
            err,
            RigidSolveError::TooFewCorrespondences {
                found: 2,
                required: 3
            }
        );
    }

    #[test]
    fn collinear_points_are_degenerate() {
        let src: Vec<_> = (0..5).map(|k| Point3::new(k as f64, 2.0 * k as f64, 0.0)).collect();
        let err = estimate_rigid_transform(&src, &src).unwrap_err();
        assert_eq!(err, RigidSolveError::Degenerate);
    }

    #[test]
    fn mismatched_lengths_fail() {
        let src = sample_points();
        let err = estimate_rigid_transform(&src, &src[..4]).unwrap_err();
        assert!(matches!(err, RigidSolveError::MismatchedLengths { .. }));
    }
}
