pub mod fluidparticleworld;
pub mod iisph;
pub mod neighborhood_search;
pub mod smoothing_kernel;
pub mod wcsph;

pub use fluidparticleworld::{ColorRamp, Containment, FluidParticleWorld, Particles};
pub use iisph::IISPHSolver;
pub use wcsph::WCSPHSolver;

use crate::units::*;
use thiserror::Error;

/// Time step the implicit solver was tuned for in two dimensions.
pub const DEFAULT_TIMESTEP_2D: Real = 0.005;
/// Time step the implicit solver was tuned for in three dimensions (~120Hz).
pub const DEFAULT_TIMESTEP_3D: Real = 0.00835;
/// Time step for the stiffer weakly compressible model.
pub const DEFAULT_TIMESTEP_WCSPH: Real = 0.0005;

/// Default Jacobi relaxation factor ω.
pub const DEFAULT_RELAXATION: Real = 0.5;
/// Default compressibility tolerance η on the average density error.
pub const DEFAULT_COMPRESSIBILITY: Real = 0.01;

/// The pressure loop always runs at least this many iterations.
pub const MIN_PRESSURE_ITERATIONS: usize = 2;
/// Slow convergence is cut off (with a warning) after this many iterations.
pub const MAX_PRESSURE_ITERATIONS: usize = 100;

/// Rejected scene or solver configuration. Constructors return these before
/// any simulation state is built up; no partial state is retained.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("simulation is only defined for 2 or 3 dimensions, got {0}")]
    UnsupportedDimension(usize),
    #[error("particle spacing must be positive, got {0}")]
    InvalidSpacing(Real),
    #[error("grid resolution must be nonzero on every axis")]
    ZeroResolution,
    #[error("block has zero extent on at least one axis")]
    EmptyBlock,
    #[error("block does not fit inside the grid")]
    BlockOutsideGrid,
    #[error("compressibility tolerance must be positive, got {0}")]
    InvalidTolerance(Real),
    #[error("relaxation factor must be in (0, 1], got {0}")]
    InvalidRelaxation(Real),
    #[error("boundary particle {index} has no boundary neighbors within the kernel support")]
    DegenerateBoundary { index: usize },
}

/// State of a fluid particle at the moment a step failed, for diagnosis.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleSnapshot<const D: usize> {
    pub position: Point<D>,
    pub velocity: Vector<D>,
    pub density: Real,
    pub pressure: Real,
}

/// Fatal runtime condition. The step halts and is not retried; recovery is
/// up to the host.
#[derive(Debug, Error, PartialEq)]
pub enum StepError<const D: usize> {
    /// A fluid particle left the simulation grid after integration. Only
    /// possible under [`Containment::BoundaryParticles`]; usually means the
    /// time step is too large for the scene.
    #[error("fluid particle {index} left the simulation domain")]
    Divergence {
        index: usize,
        snapshot: ParticleSnapshot<D>,
    },
}

/// A pressure model advancing the particle world by one time step.
///
/// A step runs: neighbor search update, advection prediction, pressure
/// computation, time integration, containment.
pub trait Solver<const D: usize> {
    fn simulation_step(
        &mut self,
        world: &mut FluidParticleWorld<D>,
        timestep: Real,
    ) -> Result<(), StepError<D>>;
}

/// Owns the particle world, a pressure solver and the (fixed) time step.
pub struct Simulation<const D: usize> {
    pub world: FluidParticleWorld<D>,
    solver: Box<dyn Solver<D>>,
    timestep: Real,
}

impl<const D: usize> Simulation<D> {
    pub fn new(world: FluidParticleWorld<D>, solver: Box<dyn Solver<D>>, timestep: Real) -> Self {
        Simulation {
            world,
            solver,
            timestep,
        }
    }

    /// Like [`Simulation::new`] with the hand-tuned per-dimension time step.
    pub fn with_default_timestep(world: FluidParticleWorld<D>, solver: Box<dyn Solver<D>>) -> Self {
        let timestep = if D == 3 {
            DEFAULT_TIMESTEP_3D
        } else {
            DEFAULT_TIMESTEP_2D
        };
        Self::new(world, solver, timestep)
    }

    pub fn timestep(&self) -> Real {
        self.timestep
    }

    pub fn step(&mut self) -> Result<(), StepError<D>> {
        self.solver.simulation_step(&mut self.world, self.timestep)
    }

    /// Advances the simulation by several steps, stopping at the first error.
    pub fn run(&mut self, num_steps: usize) -> Result<(), StepError<D>> {
        for _ in 0..num_steps {
            self.step()?;
        }
        Ok(())
    }
}
