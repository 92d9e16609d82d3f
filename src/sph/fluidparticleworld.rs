use crate::units::*;
use nalgebra as na;

use super::{ConfigError, ParticleSnapshot, StepError};

/// Per-particle state arrays, indexed in parallel.
///
/// Fluid particles are dynamic; boundary particles never move and only
/// contribute to density and pressure forces (through the Ψ coefficients the
/// pressure solvers precompute).
#[derive(Debug)]
pub struct Particles<const D: usize> {
    pub positions: Vec<Point<D>>,
    pub velocities: Vec<Vector<D>>,
    pub densities: Vec<Real>, // local densities ρ
    pub pressures: Vec<Real>,

    pub boundary_positions: Vec<Point<D>>,
}

impl<const D: usize> Particles<D> {
    fn new() -> Particles<D> {
        Particles {
            positions: Vec::new(),
            velocities: Vec::new(),
            densities: Vec::new(),
            pressures: Vec::new(),
            boundary_positions: Vec::new(),
        }
    }
}

/// What keeps fluid particles inside the simulation domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    /// Positions leaving the domain are clamped back in, with the velocity
    /// reset to the performed displacement over the time step. Divergence is
    /// impossible under this policy.
    Clamp,
    /// Containment is left entirely to the pressure of boundary particles.
    /// A particle that still leaves the grid makes the step fail with
    /// [`StepError::Divergence`].
    BoundaryParticles,
}

/// Maps a density ratio ρ/ρ₀ to a color between two endpoints.
///
/// Purely a convenience for hosts that want the classic density shading;
/// the simulation itself never touches colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorRamp {
    pub light: [Real; 3],
    pub dense: [Real; 3],
}

impl ColorRamp {
    pub fn shade(&self, t: Real) -> [Real; 3] {
        [
            self.light[0] + t * (self.dense[0] - self.light[0]),
            self.light[1] + t * (self.dense[1] - self.light[1]),
            self.light[2] + t * (self.dense[2] - self.light[2]),
        ]
    }
}

/// The particle arrays plus everything that describes the simulated fluid:
/// spacing, rest density, viscosity, gravity, domain and containment.
///
/// Scenes are built cell by cell: the domain is a grid of cells whose side
/// length is the kernel support (twice the particle spacing), and fluid
/// blocks and boundary boxes are placed on whole cells, each cell sampled
/// with 2^d particles at sub-cell offsets 0.25 and 0.75.
#[derive(Debug)]
pub struct FluidParticleWorld<const D: usize> {
    pub particles: Particles<D>,

    grid_resolution: [usize; D],
    particle_spacing: Real,     // typically expressed as 'h'
    rest_density: Real,         // kg/m^d for the resting fluid (ρ₀)
    kinematic_viscosity: Real,  // ν
    rest_mass: Real,            // m₀ = ρ₀·h^d
    containment: Containment,

    pub gravity: Vector<D>, // global gravity force in m/s² (== N/kg)
}

impl<const D: usize> FluidParticleWorld<D> {
    pub fn new(
        grid_resolution: [usize; D],
        particle_spacing: Real,
        rest_density: Real,
        kinematic_viscosity: Real,
    ) -> Result<FluidParticleWorld<D>, ConfigError> {
        if D != 2 && D != 3 {
            return Err(ConfigError::UnsupportedDimension(D));
        }
        if !(particle_spacing > 0.0) {
            return Err(ConfigError::InvalidSpacing(particle_spacing));
        }
        if grid_resolution.iter().any(|&r| r == 0) {
            return Err(ConfigError::ZeroResolution);
        }

        Ok(FluidParticleWorld {
            particles: Particles::new(),
            grid_resolution,
            particle_spacing,
            rest_density,
            kinematic_viscosity,
            rest_mass: rest_density * particle_spacing.powi(D as i32),
            containment: Containment::Clamp,
            gravity: standard_gravity(),
        })
    }

    pub fn particle_spacing(&self) -> Real {
        self.particle_spacing
    }

    /// Kernel support radius; doubles as the grid cell side length.
    pub fn support_radius(&self) -> Real {
        2.0 * self.particle_spacing
    }

    pub fn rest_density(&self) -> Real {
        self.rest_density
    }

    pub fn kinematic_viscosity(&self) -> Real {
        self.kinematic_viscosity
    }

    pub fn rest_mass(&self) -> Real {
        self.rest_mass
    }

    pub fn grid_resolution(&self) -> [usize; D] {
        self.grid_resolution
    }

    /// World-space extent of the domain, per axis.
    pub fn domain_extent(&self, axis: usize) -> Real {
        self.grid_resolution[axis] as Real * self.support_radius()
    }

    pub fn containment(&self) -> Containment {
        self.containment
    }

    pub fn set_containment(&mut self, containment: Containment) {
        self.containment = containment;
    }

    pub fn fluid_count(&self) -> usize {
        self.particles.positions.len()
    }

    pub fn boundary_count(&self) -> usize {
        self.particles.boundary_positions.len()
    }

    pub fn fluid_position(&self, i: usize) -> Point<D> {
        self.particles.positions[i]
    }

    pub fn fluid_velocity(&self, i: usize) -> Vector<D> {
        self.particles.velocities[i]
    }

    pub fn fluid_density(&self, i: usize) -> Real {
        self.particles.densities[i]
    }

    pub fn fluid_pressure(&self, i: usize) -> Real {
        self.particles.pressures[i]
    }

    pub fn boundary_position(&self, j: usize) -> Point<D> {
        self.particles.boundary_positions[j]
    }

    pub fn fluid_color(&self, i: usize, ramp: &ColorRamp) -> [Real; 3] {
        ramp.shade(self.particles.densities[i] / self.rest_density)
    }

    /// Samples a block of fluid covering `extent` cells starting at
    /// `lower_cell`, 2^d particles per cell.
    pub fn add_fluid_block(
        &mut self,
        lower_cell: [usize; D],
        extent: [usize; D],
    ) -> Result<(), ConfigError> {
        if extent.iter().any(|&e| e == 0) {
            return Err(ConfigError::EmptyBlock);
        }
        for a in 0..D {
            if lower_cell[a] + extent[a] > self.grid_resolution[a] {
                return Err(ConfigError::BlockOutsideGrid);
            }
        }

        let num_particles = (1 << D) * extent.iter().product::<usize>();
        self.particles.positions.reserve(num_particles);
        let new_len = self.particles.velocities.len() + num_particles;
        self.particles.velocities.resize(new_len, na::zero());
        self.particles.densities.resize(new_len, 0.0);
        self.particles.pressures.resize(new_len, 0.0);

        let mut upper = [0; D];
        for a in 0..D {
            upper[a] = lower_cell[a] + extent[a];
        }
        let cell_size = self.support_radius();
        let positions = &mut self.particles.positions;
        for_each_cell(lower_cell, upper, |cell| {
            sample_cell(cell, cell_size, positions);
        });
        Ok(())
    }

    /// Samples the walls of the box `[lower_cell, upper_cell)` with boundary
    /// particles: every cell of the box shell, 2^d particles per cell (two
    /// particle layers per wall).
    pub fn add_boundary_box(
        &mut self,
        lower_cell: [usize; D],
        upper_cell: [usize; D],
    ) -> Result<(), ConfigError> {
        for a in 0..D {
            if lower_cell[a] >= upper_cell[a] {
                return Err(ConfigError::EmptyBlock);
            }
            if upper_cell[a] > self.grid_resolution[a] {
                return Err(ConfigError::BlockOutsideGrid);
            }
        }

        let cell_size = self.support_radius();
        let positions = &mut self.particles.boundary_positions;
        for_each_cell(lower_cell, upper_cell, |cell| {
            let on_shell =
                (0..D).any(|a| cell[a] == lower_cell[a] || cell[a] == upper_cell[a] - 1);
            if on_shell {
                sample_cell(cell, cell_size, positions);
            }
        });
        Ok(())
    }

    /// Applies the configured containment policy after integration.
    pub(super) fn enforce_containment(&mut self, timestep: Real) -> Result<(), StepError<D>> {
        match self.containment {
            Containment::Clamp => {
                let margin = 0.5 * self.particle_spacing;
                let mut limits = [0.0; D];
                for (a, limit) in limits.iter_mut().enumerate() {
                    *limit = self.domain_extent(a) - margin;
                }
                for (position, velocity) in self
                    .particles
                    .positions
                    .iter_mut()
                    .zip(self.particles.velocities.iter_mut())
                {
                    let previous = *position;
                    for a in 0..D {
                        position[a] = position[a].clamp(margin, limits[a]);
                    }
                    if *position != previous {
                        *velocity = (*position - previous) / timestep;
                    }
                }
                Ok(())
            }
            Containment::BoundaryParticles => {
                for (i, position) in self.particles.positions.iter().enumerate() {
                    let inside = (0..D)
                        .all(|a| position[a] >= 0.0 && position[a] < self.domain_extent(a));
                    if !inside {
                        let snapshot = ParticleSnapshot {
                            position: *position,
                            velocity: self.particles.velocities[i],
                            density: self.particles.densities[i],
                            pressure: self.particles.pressures[i],
                        };
                        log::error!(
                            "fluid particle {} diverged out of the domain: {:?}",
                            i,
                            snapshot
                        );
                        return Err(StepError::Divergence { index: i, snapshot });
                    }
                }
                Ok(())
            }
        }
    }
}

fn for_each_cell<const D: usize>(
    lower: [usize; D],
    upper: [usize; D],
    mut f: impl FnMut([usize; D]),
) {
    let mut cell = lower;
    loop {
        f(cell);
        let mut axis = 0;
        loop {
            cell[axis] += 1;
            if cell[axis] < upper[axis] {
                break;
            }
            cell[axis] = lower[axis];
            axis += 1;
            if axis == D {
                return;
            }
        }
    }
}

// 2^d sample points per cell, at 0.25/0.75 of the cell side per axis.
fn sample_cell<const D: usize>(cell: [usize; D], cell_size: Real, out: &mut Vec<Point<D>>) {
    for corner in 0..(1usize << D) {
        let mut p = Point::<D>::origin();
        for a in 0..D {
            let offset = if corner >> a & 1 == 1 { 0.75 } else { 0.25 };
            p[a] = (cell[a] as Real + offset) * cell_size;
        }
        out.push(p);
    }
}
