use crate::units::*;
use rayon::prelude::*;

use super::fluidparticleworld::{FluidParticleWorld, Particles};
use super::iisph::compute_boundary_psi;
use super::neighborhood_search::NeighborhoodSearch;
use super::smoothing_kernel::{CubicSpline, Kernel};
use super::{ConfigError, Solver, StepError, DEFAULT_COMPRESSIBILITY};

/// Tait exponent γ of the equation of state.
pub const DEFAULT_EOS_EXPONENT: Real = 7.0;

/// Weakly compressible SPH.
///
/// Pressure comes directly from an equation of state,
/// p = k·((ρ/ρ₀)^γ − 1), clamped to zero; small density fluctuations are
/// accepted instead of solved away. Shares the neighbor search, kernel and
/// boundary Ψ coupling with the implicit solver, but needs a considerably
/// smaller time step to stay stable.
pub struct WCSPHSolver<const D: usize> {
    kernel: CubicSpline<D>,
    search: NeighborhoodSearch<D>,
    stiffness: Real,    // EOS coefficient k = ρ₀·c²/γ
    eos_exponent: Real, // γ

    psi: Vec<Real>,
    accelerations: Vec<Vector<D>>,
}

impl<const D: usize> WCSPHSolver<D> {
    pub fn new(world: &FluidParticleWorld<D>) -> Result<WCSPHSolver<D>, ConfigError> {
        Self::with_parameters(world, DEFAULT_COMPRESSIBILITY, DEFAULT_EOS_EXPONENT)
    }

    /// The stiffness is derived from the compressibility tolerance: the
    /// speed of sound is chosen as c = |g_y|/η, then k = ρ₀·c²/γ.
    pub fn with_parameters(
        world: &FluidParticleWorld<D>,
        compressibility: Real,
        eos_exponent: Real,
    ) -> Result<WCSPHSolver<D>, ConfigError> {
        if !(compressibility > 0.0) {
            return Err(ConfigError::InvalidTolerance(compressibility));
        }

        let kernel = CubicSpline::new(world.particle_spacing());
        let support = world.support_radius();
        let mut search = NeighborhoodSearch::new(world.grid_resolution(), support, support);
        search.register_boundaries(&world.particles.boundary_positions);
        let psi = compute_boundary_psi(
            &kernel,
            &search,
            &world.particles.boundary_positions,
            world.rest_density(),
        )?;

        let speed_of_sound = world.gravity[1].abs() / compressibility;
        let stiffness = world.rest_density() * speed_of_sound * speed_of_sound / eos_exponent;

        Ok(WCSPHSolver {
            kernel,
            search,
            stiffness,
            eos_exponent,
            psi,
            accelerations: vec![Vector::zeros(); world.fluid_count()],
        })
    }

    pub fn psi(&self) -> &[Real] {
        &self.psi
    }

    pub fn stiffness(&self) -> Real {
        self.stiffness
    }
}

impl<const D: usize> Solver<D> for WCSPHSolver<D> {
    fn simulation_step(
        &mut self,
        world: &mut FluidParticleWorld<D>,
        timestep: Real,
    ) -> Result<(), StepError<D>> {
        assert_eq!(
            world.fluid_count(),
            self.accelerations.len(),
            "solver was built for a different particle count"
        );

        self.search.update(
            &world.particles.positions,
            &world.particles.boundary_positions,
        );

        let m0 = world.rest_mass();
        let h = world.particle_spacing();
        let rho0 = world.rest_density();
        let nu = world.kinematic_viscosity();
        let gravity = world.gravity;
        let stiffness = self.stiffness;
        let eos_exponent = self.eos_exponent;

        let Particles {
            positions,
            velocities,
            densities,
            pressures,
            boundary_positions,
        } = &mut world.particles;
        let positions_shared: &[Point<D>] = positions;
        let boundary_positions: &[Point<D>] = boundary_positions;

        let Self {
            kernel,
            search,
            psi,
            accelerations,
            ..
        } = self;
        let kernel: &CubicSpline<D> = kernel;
        let search: &NeighborhoodSearch<D> = search;
        let psi: &[Real] = psi;

        densities.par_iter_mut().enumerate().for_each(|(i, density)| {
            let xi = positions_shared[i];
            let mut rho = 0.0;
            for &j in search.fluid_neighbors(i) {
                let pos_ij = xi - positions_shared[j as usize];
                rho += m0 * kernel.evaluate(pos_ij.norm_squared(), pos_ij.norm());
            }
            for &j in search.boundary_neighbors(i) {
                let pos_ij = xi - boundary_positions[j as usize];
                rho += psi[j as usize] * kernel.evaluate(pos_ij.norm_squared(), pos_ij.norm());
            }
            *density = rho;
        });
        let densities: &[Real] = densities;

        pressures.par_iter_mut().enumerate().for_each(|(i, p)| {
            *p = (stiffness * ((densities[i] / rho0).powf(eos_exponent) - 1.0)).max(0.0);
        });
        let pressures: &[Real] = pressures;

        let velocities_shared: &[Vector<D>] = velocities;
        accelerations
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, acceleration)| {
                let xi = positions_shared[i];
                let vi = velocities_shared[i];
                let rho_i_sq = densities[i] * densities[i];
                let p_i = pressures[i];

                let mut acc = gravity;
                for &j in search.fluid_neighbors(i) {
                    let j = j as usize;
                    if j == i {
                        continue;
                    }
                    let pos_ij = xi - positions_shared[j];
                    let r_sq = pos_ij.norm_squared();
                    let grad = kernel.gradient(pos_ij, r_sq, r_sq.sqrt());

                    acc += grad
                        * (-m0 * (p_i / rho_i_sq + pressures[j] / (densities[j] * densities[j])));
                    let vel_ij = vi - velocities_shared[j];
                    acc += grad
                        * (2.0 * nu * (m0 / densities[j]) * vel_ij.dot(&pos_ij)
                            / (r_sq + 0.01 * h * h));
                }
                for &j in search.boundary_neighbors(i) {
                    let j = j as usize;
                    let pos_ij = xi - boundary_positions[j];
                    let r_sq = pos_ij.norm_squared();
                    let grad = kernel.gradient(pos_ij, r_sq, r_sq.sqrt());
                    acc += grad * (-psi[j] * (p_i / rho_i_sq));
                }
                *acceleration = acc;
            });
        let accelerations: &[Vector<D>] = accelerations;

        velocities
            .par_iter_mut()
            .zip(positions.par_iter_mut())
            .enumerate()
            .for_each(|(i, (velocity, position))| {
                *velocity += accelerations[i] * timestep;
                *position += *velocity * timestep;
            });

        world.enforce_containment(timestep)
    }
}
