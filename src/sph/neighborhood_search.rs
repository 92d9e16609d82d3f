use crate::units::*;

pub type ParticleIndex = u32;
pub type CellIndex = u32;

const INVALID_CELL: CellIndex = CellIndex::MAX;

/// Cell → particle-index lists in compressed sparse row form.
///
/// Rebuilt with a counting sort: count per cell, prefix sum, scatter. The
/// scatter walks particles in ascending index order, so the per-cell lists
/// are sorted and rebuilds from identical positions are identical.
#[derive(Debug)]
struct CellGrid {
    // offsets.len() == cell_count + 1; particles of cell c live in
    // indices[offsets[c]..offsets[c + 1]]
    offsets: Vec<u32>,
    indices: Vec<ParticleIndex>,
    // scratch, valid during rebuild only
    cell_of: Vec<CellIndex>,
    cursors: Vec<u32>,
}

impl CellGrid {
    fn new(cell_count: usize) -> CellGrid {
        CellGrid {
            offsets: vec![0; cell_count + 1],
            indices: Vec::new(),
            cell_of: Vec::new(),
            cursors: vec![0; cell_count],
        }
    }

    fn cell(&self, id: usize) -> &[ParticleIndex] {
        &self.indices[self.offsets[id] as usize..self.offsets[id + 1] as usize]
    }
}

/// Dense uniform grid over the simulation domain with separate cell lists
/// for fluid and boundary particles.
///
/// Cell side length equals the kernel support radius, so a support-radius
/// query never needs to look further than the adjacent cell ring. The cell
/// range for a query is computed from the query radius regardless.
#[derive(Debug)]
pub struct UniformGrid<const D: usize> {
    resolution: [usize; D],
    cell_size: Real,
    cell_count: usize,
    fluid_cells: CellGrid,
    boundary_cells: CellGrid,
}

impl<const D: usize> UniformGrid<D> {
    pub fn new(resolution: [usize; D], cell_size: Real) -> UniformGrid<D> {
        let cell_count = resolution.iter().product();
        UniformGrid {
            resolution,
            cell_size,
            cell_count,
            fluid_cells: CellGrid::new(cell_count),
            boundary_cells: CellGrid::new(cell_count),
        }
    }

    pub fn resolution(&self) -> [usize; D] {
        self.resolution
    }

    pub fn cell_size(&self) -> Real {
        self.cell_size
    }

    /// World-space extent of the grid, per axis.
    pub fn extent(&self, axis: usize) -> Real {
        self.resolution[axis] as Real * self.cell_size
    }

    pub fn is_inside(&self, position: &Point<D>) -> bool {
        (0..D).all(|a| position[a] >= 0.0 && position[a] < self.extent(a))
    }

    fn cell_id(&self, coords: [usize; D]) -> usize {
        // i + j·n_x (+ k·n_x·n_y)
        let mut id = 0;
        let mut stride = 1;
        for a in 0..D {
            id += coords[a] * stride;
            stride *= self.resolution[a];
        }
        id
    }

    fn cell_id_of(&self, position: &Point<D>) -> Option<usize> {
        if !self.is_inside(position) {
            return None;
        }
        let mut coords = [0; D];
        for a in 0..D {
            coords[a] = (position[a] / self.cell_size) as usize;
        }
        Some(self.cell_id(coords))
    }

    pub fn rebuild_fluid(&mut self, positions: &[Point<D>]) {
        rebuild_cells(self, positions, CellKind::Fluid);
    }

    pub fn rebuild_boundary(&mut self, positions: &[Point<D>]) {
        rebuild_cells(self, positions, CellKind::Boundary);
    }

    /// Calls `f` with every fluid index stored in a cell overlapping the
    /// sphere around `position`; no-op for positions outside the grid. The
    /// caller is responsible for the exact distance test.
    pub fn for_each_fluid_candidate(
        &self,
        position: &Point<D>,
        radius: Real,
        f: impl FnMut(ParticleIndex),
    ) {
        self.for_each_candidate(&self.fluid_cells, position, radius, f);
    }

    pub fn for_each_boundary_candidate(
        &self,
        position: &Point<D>,
        radius: Real,
        f: impl FnMut(ParticleIndex),
    ) {
        self.for_each_candidate(&self.boundary_cells, position, radius, f);
    }

    fn for_each_candidate(
        &self,
        cells: &CellGrid,
        position: &Point<D>,
        radius: Real,
        mut f: impl FnMut(ParticleIndex),
    ) {
        if !self.is_inside(position) {
            return;
        }
        let mut min = [0; D];
        let mut max = [0; D];
        for a in 0..D {
            min[a] = ((position[a] - radius) / self.cell_size).floor().max(0.0) as usize;
            max[a] = (((position[a] + radius) / self.cell_size).floor() as usize)
                .min(self.resolution[a] - 1);
        }

        // row-major walk over the cell box [min, max]
        let mut coords = min;
        loop {
            for &p in cells.cell(self.cell_id(coords)) {
                f(p);
            }
            let mut axis = 0;
            loop {
                coords[axis] += 1;
                if coords[axis] <= max[axis] {
                    break;
                }
                coords[axis] = min[axis];
                axis += 1;
                if axis == D {
                    return;
                }
            }
        }
    }
}

enum CellKind {
    Fluid,
    Boundary,
}

fn rebuild_cells<const D: usize>(
    grid: &mut UniformGrid<D>,
    positions: &[Point<D>],
    kind: CellKind,
) {
    let cell_count = grid.cell_count;
    // assign cells first; the mutable CellGrid borrow below must not overlap
    // the geometry lookups
    let mut cell_of = std::mem::take(match kind {
        CellKind::Fluid => &mut grid.fluid_cells.cell_of,
        CellKind::Boundary => &mut grid.boundary_cells.cell_of,
    });
    cell_of.clear();
    cell_of.extend(positions.iter().map(|p| match grid.cell_id_of(p) {
        Some(id) => id as CellIndex,
        None => INVALID_CELL,
    }));

    let cells = match kind {
        CellKind::Fluid => &mut grid.fluid_cells,
        CellKind::Boundary => &mut grid.boundary_cells,
    };

    cells.offsets.fill(0);
    let mut stored = 0;
    for &c in &cell_of {
        if c != INVALID_CELL {
            cells.offsets[c as usize + 1] += 1;
            stored += 1;
        }
    }
    for c in 0..cell_count {
        cells.offsets[c + 1] += cells.offsets[c];
    }

    cells.indices.resize(stored, 0);
    cells.cursors.copy_from_slice(&cells.offsets[..cell_count]);
    for (i, &c) in cell_of.iter().enumerate() {
        if c != INVALID_CELL {
            let cursor = &mut cells.cursors[c as usize];
            cells.indices[*cursor as usize] = i as ParticleIndex;
            *cursor += 1;
        }
    }

    cells.cell_of = cell_of;
}

/// Per-particle neighbor lists in compressed sparse row form.
#[derive(Debug)]
pub struct NeighborLists {
    offsets: Vec<u32>,
    indices: Vec<ParticleIndex>,
}

impl NeighborLists {
    fn new() -> NeighborLists {
        NeighborLists {
            offsets: vec![0],
            indices: Vec::new(),
        }
    }

    fn clear(&mut self) {
        self.offsets.truncate(1);
        self.indices.clear();
    }

    fn close_list(&mut self) {
        self.offsets.push(self.indices.len() as u32);
    }

    pub fn num_lists(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn neighbors(&self, i: usize) -> &[ParticleIndex] {
        &self.indices[self.offsets[i] as usize..self.offsets[i + 1] as usize]
    }
}

/// Supplies every per-particle loop with the fluid and boundary particles
/// within the support radius.
///
/// The boundary grid is filled once (boundaries are static); the fluid grid
/// and both neighbor lists are rebuilt at the start of every step by a
/// single writer, then read shared by the parallel phases.
#[derive(Debug)]
pub struct NeighborhoodSearch<const D: usize> {
    grid: UniformGrid<D>,
    query_radius: Real,
    fluid_neighbors: NeighborLists,
    boundary_neighbors: NeighborLists,
}

impl<const D: usize> NeighborhoodSearch<D> {
    /// * `cell_size`: side length of a grid cell
    /// * `query_radius`: radius of the neighborhoods built by `update`
    pub fn new(resolution: [usize; D], cell_size: Real, query_radius: Real) -> Self {
        NeighborhoodSearch {
            grid: UniformGrid::new(resolution, cell_size),
            query_radius,
            fluid_neighbors: NeighborLists::new(),
            boundary_neighbors: NeighborLists::new(),
        }
    }

    pub fn grid(&self) -> &UniformGrid<D> {
        &self.grid
    }

    pub fn query_radius(&self) -> Real {
        self.query_radius
    }

    /// Inserts the (static) boundary particles into their grid. Call once,
    /// or again if the boundary topology ever changes.
    pub fn register_boundaries(&mut self, boundary_positions: &[Point<D>]) {
        self.grid.rebuild_boundary(boundary_positions);
    }

    /// Rebuilds the fluid grid and recomputes both neighbor lists of every
    /// fluid particle: all particles with squared distance strictly less
    /// than the squared query radius, in deterministic (ascending index)
    /// order. The list of a particle contains the particle itself. Out of
    /// grid positions get empty lists.
    pub fn update(&mut self, fluid_positions: &[Point<D>], boundary_positions: &[Point<D>]) {
        self.grid.rebuild_fluid(fluid_positions);
        self.fluid_neighbors.clear();
        self.boundary_neighbors.clear();

        let radius_sq = self.query_radius * self.query_radius;
        for xi in fluid_positions {
            let fluid_neighbors = &mut self.fluid_neighbors;
            self.grid
                .for_each_fluid_candidate(xi, self.query_radius, |j| {
                    if nalgebra::distance_squared(xi, &fluid_positions[j as usize]) < radius_sq {
                        fluid_neighbors.indices.push(j);
                    }
                });
            fluid_neighbors.close_list();

            let boundary_neighbors = &mut self.boundary_neighbors;
            self.grid
                .for_each_boundary_candidate(xi, self.query_radius, |j| {
                    if nalgebra::distance_squared(xi, &boundary_positions[j as usize]) < radius_sq {
                        boundary_neighbors.indices.push(j);
                    }
                });
            boundary_neighbors.close_list();
        }
    }

    pub fn fluid_neighbors(&self, i: usize) -> &[ParticleIndex] {
        self.fluid_neighbors.neighbors(i)
    }

    pub fn boundary_neighbors(&self, i: usize) -> &[ParticleIndex] {
        self.boundary_neighbors.neighbors(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(origin: [Real; 2], count: [usize; 2], spacing: Real) -> Vec<Point<2>> {
        let mut positions = Vec::new();
        for j in 0..count[1] {
            for i in 0..count[0] {
                positions.push(Point::<2>::new(
                    origin[0] + i as Real * spacing,
                    origin[1] + j as Real * spacing,
                ));
            }
        }
        positions
    }

    #[test]
    fn rebuild_is_idempotent() {
        let positions = block([0.3, 0.3], [7, 5], 0.45);
        let mut search = NeighborhoodSearch::<2>::new([8, 8], 1.0, 1.0);
        search.update(&positions, &[]);
        let first: Vec<Vec<ParticleIndex>> = (0..positions.len())
            .map(|i| search.fluid_neighbors(i).to_vec())
            .collect();

        search.update(&positions, &[]);
        for (i, list) in first.iter().enumerate() {
            assert_eq!(search.fluid_neighbors(i), &list[..]);
        }
    }

    #[test]
    fn neighborhoods_match_brute_force() {
        let radius = 1.0;
        let positions = block([0.25, 0.25], [12, 10], 0.25);
        let mut search = NeighborhoodSearch::<2>::new([6, 6], radius, radius);
        search.update(&positions, &[]);

        for (i, xi) in positions.iter().enumerate() {
            let mut expected: Vec<ParticleIndex> = positions
                .iter()
                .enumerate()
                .filter(|(_, xj)| nalgebra::distance_squared(xi, xj) < radius * radius)
                .map(|(j, _)| j as ParticleIndex)
                .collect();
            expected.sort_unstable();
            assert_eq!(search.fluid_neighbors(i), &expected[..], "particle {}", i);
        }
    }

    #[test]
    fn neighbor_list_contains_the_particle_itself() {
        let positions = block([0.5, 0.5], [3, 3], 0.5);
        let mut search = NeighborhoodSearch::<2>::new([4, 4], 1.0, 1.0);
        search.update(&positions, &[]);
        for i in 0..positions.len() {
            assert!(search.fluid_neighbors(i).contains(&(i as ParticleIndex)));
        }
    }

    #[test]
    fn out_of_grid_positions_get_empty_lists() {
        let mut positions = block([0.5, 0.5], [2, 2], 0.5);
        positions.push(Point::<2>::new(-1.0, 0.5));
        positions.push(Point::<2>::new(0.5, 17.0));
        let mut search = NeighborhoodSearch::<2>::new([4, 4], 1.0, 1.0);
        search.update(&positions, &[]);

        let outside = positions.len() - 2;
        assert!(search.fluid_neighbors(outside).is_empty());
        assert!(search.fluid_neighbors(outside + 1).is_empty());
        // and nobody lists the strays as neighbors
        for i in 0..outside {
            for &j in search.fluid_neighbors(i) {
                assert!((j as usize) < outside);
            }
        }
    }

    #[test]
    fn boundary_neighborhoods_are_found() {
        let fluid = vec![Point::<2>::new(2.0, 2.0)];
        let boundary = vec![
            Point::<2>::new(2.4, 2.0),  // inside support
            Point::<2>::new(2.0, 2.95), // inside support
            Point::<2>::new(3.5, 2.0),  // outside
        ];
        let mut search = NeighborhoodSearch::<2>::new([4, 4], 1.0, 1.0);
        search.register_boundaries(&boundary);
        search.update(&fluid, &boundary);
        assert_eq!(search.boundary_neighbors(0), &[0, 1]);
    }

    #[test]
    fn three_dimensional_neighborhoods_match_brute_force() {
        let radius = 1.0;
        let mut positions = Vec::new();
        for k in 0..4 {
            for j in 0..4 {
                for i in 0..4 {
                    positions.push(Point::<3>::new(
                        0.4 + i as Real * 0.5,
                        0.4 + j as Real * 0.5,
                        0.4 + k as Real * 0.5,
                    ));
                }
            }
        }
        let mut search = NeighborhoodSearch::<3>::new([3, 3, 3], radius, radius);
        search.update(&positions, &[]);

        for (i, xi) in positions.iter().enumerate() {
            let expected: Vec<ParticleIndex> = positions
                .iter()
                .enumerate()
                .filter(|(_, xj)| nalgebra::distance_squared(xi, xj) < radius * radius)
                .map(|(j, _)| j as ParticleIndex)
                .collect();
            assert_eq!(search.fluid_neighbors(i), &expected[..]);
        }
    }
}
