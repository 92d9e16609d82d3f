//! Lagrangian fluid simulation with Smoothed Particle Hydrodynamics.
//!
//! The crate provides two pressure models over a shared particle world,
//! cubic-spline kernel and uniform-grid neighbor search:
//!
//! - [`sph::IISPHSolver`]: implicit incompressible SPH. A relaxed-Jacobi
//!   iteration enforces a near-incompressibility constraint every step, with
//!   static boundary particles coupled through precomputed density
//!   coefficients.
//! - [`sph::WCSPHSolver`]: weakly compressible SPH with an equation-of-state
//!   pressure.
//!
//! Both solvers are generic over the spatial dimension (2 or 3). Rendering,
//! windowing and I/O are deliberately out of scope; the per-step outputs are
//! the particle arrays exposed by [`sph::FluidParticleWorld`].
//!
//! ```
//! use ripple::sph::{FluidParticleWorld, IISPHSolver, Simulation};
//!
//! let mut world = FluidParticleWorld::<2>::new([20, 20], 0.5, 1000.0, 0.08).unwrap();
//! world.add_boundary_box([0, 0], [20, 20]).unwrap();
//! world.add_fluid_block([1, 1], [8, 8]).unwrap();
//! let solver = IISPHSolver::new(&world).unwrap();
//! let mut sim = Simulation::with_default_timestep(world, Box::new(solver));
//! sim.step().unwrap();
//! ```

pub mod sph;
pub mod units;

pub use sph::{
    ColorRamp, ConfigError, Containment, FluidParticleWorld, IISPHSolver, Simulation, Solver,
    StepError, WCSPHSolver,
};
pub use units::{Point, Real, Vector};
