use crate::units::*;
use std::f64::consts::PI;

/// Common interface of SPH smoothing functions.
///
/// Callers are expected to have the squared distance around anyways, so both
/// it and the distance are passed in to avoid recomputation.
pub trait Kernel<const D: usize> {
    /// Evaluates W at distance `r`.
    fn evaluate(&self, r_sq: Real, r: Real) -> Real;

    /// Evaluates ∇W for the offset `ri_to_rj = ri - rj` of length `r`.
    ///
    /// Returns zero when `r` is below machine epsilon; the gradient of a
    /// radially symmetric kernel vanishes at the origin.
    fn gradient(&self, ri_to_rj: Vector<D>, r_sq: Real, r: Real) -> Vector<D>;

    /// Distance beyond which `evaluate` and `gradient` are identically zero.
    fn support_radius(&self) -> Real;
}

/// Cubic spline kernel with support radius `2h`.
///
/// W(r) = σ_d · (1 − 1.5q² + 0.75q³) for q < 1, σ_d · 0.25(2−q)³ for
/// 1 ≤ q < 2, with q = r/h and σ₂ = 10/(7πh²), σ₃ = 1/(πh³).
#[derive(Debug)]
pub struct CubicSpline<const D: usize> {
    smoothing_length: Real,
    support: Real,
    normalization: Real,
    gradient_normalization: Real,
}

impl<const D: usize> CubicSpline<D> {
    pub fn new(smoothing_length: Real) -> CubicSpline<D> {
        assert!(
            D == 2 || D == 3,
            "cubic spline is only defined in 2 and 3 dimensions"
        );
        let h = smoothing_length;
        let normalization = if D == 2 {
            10.0 / (7.0 * PI * h * h)
        } else {
            1.0 / (PI * h * h * h)
        };
        CubicSpline {
            smoothing_length: h,
            support: 2.0 * h,
            normalization,
            gradient_normalization: normalization / h,
        }
    }

    pub fn smoothing_length(&self) -> Real {
        self.smoothing_length
    }
}

impl<const D: usize> Kernel<D> for CubicSpline<D> {
    fn evaluate(&self, _r_sq: Real, r: Real) -> Real {
        let q = r / self.smoothing_length;
        if q < 1.0 {
            self.normalization * (1.0 - 1.5 * q * q + 0.75 * q * q * q)
        } else if q < 2.0 {
            let d = 2.0 - q;
            self.normalization * 0.25 * d * d * d
        } else {
            0.0
        }
    }

    fn gradient(&self, ri_to_rj: Vector<D>, _r_sq: Real, r: Real) -> Vector<D> {
        if r < Real::EPSILON {
            return Vector::zeros();
        }
        let q = r / self.smoothing_length;
        let df = if q <= 1.0 {
            -3.0 * q + 2.25 * q * q
        } else if q < 2.0 {
            let d = 2.0 - q;
            -0.75 * d * d
        } else {
            return Vector::zeros();
        };
        ri_to_rj * (self.gradient_normalization * df / r)
    }

    fn support_radius(&self) -> Real {
        self.support
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::prelude::*;

    fn random_offset<const D: usize>(rng: &mut StdRng, max_len: Real) -> Vector<D> {
        loop {
            let v = Vector::<D>::from_fn(|_, _| rng.gen_range(-1.0..1.0));
            let len = v.norm();
            if len > 1.0e-3 && len < 1.0 {
                return v * (max_len * len);
            }
        }
    }

    #[test]
    fn kernel_is_symmetric_and_gradient_antisymmetric() {
        let h = 0.5;
        let kernel = CubicSpline::<2>::new(h);
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..100 {
            let r: Vector<2> = random_offset(&mut rng, 2.0 * h);
            let (r_sq, len) = (r.norm_squared(), r.norm());
            assert_abs_diff_eq!(
                kernel.evaluate(r_sq, len),
                kernel.evaluate(r_sq, (-r).norm()),
                epsilon = 0.0
            );
            let forward = kernel.gradient(r, r_sq, len);
            let backward = kernel.gradient(-r, r_sq, len);
            assert_abs_diff_eq!(forward, -backward, epsilon = 1.0e-14);
        }
    }

    #[test]
    fn gradient_vanishes_at_the_origin() {
        let kernel = CubicSpline::<2>::new(0.5);
        let zero = Vector::<2>::zeros();
        assert_eq!(kernel.gradient(zero, 0.0, 0.0), zero);
    }

    #[test]
    fn kernel_has_compact_support() {
        let h = 0.5;
        let kernel = CubicSpline::<2>::new(h);
        assert_eq!(kernel.smoothing_length(), h);
        assert_eq!(kernel.support_radius(), 2.0 * kernel.smoothing_length());
        for r in [2.0 * h, 2.5 * h, 100.0 * h] {
            assert_eq!(kernel.evaluate(r * r, r), 0.0);
            let offset = Vector::<2>::new(r, 0.0);
            assert_eq!(kernel.gradient(offset, r * r, r), Vector::<2>::zeros());
        }
    }

    #[test]
    fn kernel_is_continuous_across_branches() {
        let h = 0.5;
        let kernel = CubicSpline::<3>::new(h);
        let eps = 1.0e-9;
        for edge in [h, 2.0 * h] {
            let below = kernel.evaluate(0.0, edge - eps);
            let above = kernel.evaluate(0.0, edge + eps);
            assert_abs_diff_eq!(below, above, epsilon = 1.0e-6);
        }
    }

    // For a particle well inside a uniformly sampled fluid region the kernel
    // sum approximates a partition of unity: Σ_j W(x_i - x_j) · m0/ρ0 → 1.
    #[test]
    fn lattice_sum_approximates_partition_of_unity_2d() {
        let h = 0.5;
        let kernel = CubicSpline::<2>::new(h);
        let mut sum = 0.0;
        for i in -4i32..=4 {
            for j in -4i32..=4 {
                let r = Vector::<2>::new(i as Real * h, j as Real * h);
                sum += kernel.evaluate(r.norm_squared(), r.norm());
            }
        }
        // m0/ρ0 = h² in 2d
        assert_relative_eq!(sum * h * h, 1.0, max_relative = 0.01);
    }

    #[test]
    fn lattice_sum_approximates_partition_of_unity_3d() {
        let h = 0.5;
        let kernel = CubicSpline::<3>::new(h);
        let mut sum = 0.0;
        for i in -4i32..=4 {
            for j in -4i32..=4 {
                for k in -4i32..=4 {
                    let r = Vector::<3>::new(i as Real * h, j as Real * h, k as Real * h);
                    sum += kernel.evaluate(r.norm_squared(), r.norm());
                }
            }
        }
        assert_relative_eq!(sum * h * h * h, 1.0, max_relative = 0.01);
    }
}
