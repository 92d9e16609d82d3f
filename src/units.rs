use nalgebra as na;

/// Scalar type used throughout the simulation.
pub type Real = f64;

/// World-space position, parameterized by the spatial dimension.
pub type Point<const D: usize> = na::Point<Real, D>;

/// Velocity/force/offset vector, parameterized by the spatial dimension.
pub type Vector<const D: usize> = na::SVector<Real, D>;

/// Earth gravity pointing down the y-axis, zero on the other axes.
pub fn standard_gravity<const D: usize>() -> Vector<D> {
    let mut g = Vector::<D>::zeros();
    g[1] = -9.8;
    g
}
