//! Point-driven lazy quad-tree over the lon/lat plane.
//!
//! A region is only refined when a second point lands in it: the first point activates its
//! base-grid cell, every later hit on an activated patch larger than the floor replaces that
//! patch with its `fan_out x fan_out` children. Each point splits at most one level.

use crate::classify::find_containing_patch;
use crate::config::PartitionConfig;
use crate::error::PartitionError;
use crate::grid::build_base_grid;
use crate::types::Patch;
use geo::Point;
use std::collections::BTreeMap;
use tracing::trace;

/// Stable handle of an activated patch. Ids grow monotonically, so ordering by id is
/// insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatchId(u64);

/// The working partition. Iterates in insertion order.
#[derive(Debug, Default, Clone)]
pub struct ActivatedPatches {
    patches: BTreeMap<PatchId, Patch>,
    next_id: u64,
}

impl ActivatedPatches {
    pub fn insert(&mut self, patch: Patch) -> PatchId {
        let id = PatchId(self.next_id);
        self.next_id += 1;
        self.patches.insert(id, patch);
        id
    }

    pub fn remove(&mut self, id: PatchId) -> Option<Patch> {
        self.patches.remove(&id)
    }

    #[cfg(test)]
    pub fn get(&self, id: PatchId) -> Option<&Patch> {
        self.patches.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PatchId, &Patch)> + '_ {
        self.patches.iter().map(|(id, patch)| (*id, patch))
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn into_patches(self) -> Vec<Patch> {
        self.patches.into_values().collect()
    }
}

/// Tiles `patch` into `fan_out x fan_out` squares of side `size / fan_out`, x-major like the
/// base grid. Child edges are computed from integer indices; the outermost edges are copied
/// from the parent so the union is exact.
pub fn subdivide(patch: &Patch, fan_out: u32) -> Result<Vec<Patch>, PartitionError> {
    let size = patch.size();
    if fan_out < 2 || !size.is_finite() || size <= 0.0 {
        return Err(PartitionError::DegenerateSubdivision { size, fan_out });
    }

    let n = fan_out as usize;
    let child = size / fan_out as f64;
    let edge = |origin: f64, far: f64, i: usize| {
        if i == n {
            far
        } else {
            origin + i as f64 * child
        }
    };

    let mut children = Vec::with_capacity(n * n);
    for ix in 0..n {
        for iy in 0..n {
            children.push(Patch::new(
                edge(patch.left, patch.right, ix),
                edge(patch.left, patch.right, ix + 1),
                edge(patch.bottom, patch.top, iy),
                edge(patch.bottom, patch.top, iy + 1),
            ));
        }
    }
    Ok(children)
}

/// What a single point did to the partition.
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    /// The point missed every activated patch; its base cell is now active.
    Activated { id: PatchId, patch: Patch },
    /// The point hit an oversized patch, which was replaced by its children.
    Subdivided { parent: Patch, children: Vec<PatchId> },
    /// The point hit a patch already at the size floor.
    Saturated { id: PatchId, patch: Patch },
}

#[derive(Debug, Clone)]
pub struct Partitioner {
    base_grid: Vec<Patch>,
    activated: ActivatedPatches,
    min_size: f64,
    fan_out: u32,
}

impl Partitioner {
    /// Expects a validated configuration.
    pub fn new(config: &PartitionConfig) -> Self {
        Self {
            base_grid: build_base_grid(&config.bounds, config.base_step),
            activated: ActivatedPatches::default(),
            min_size: config.min_size,
            fan_out: config.fan_out,
        }
    }

    pub fn activated(&self) -> &ActivatedPatches {
        &self.activated
    }

    pub fn insert(&mut self, point: &Point<f64>) -> Result<Insertion, PartitionError> {
        let hit = find_containing_patch(point, self.activated.iter());

        let Some((id, patch)) = hit else {
            let (_, base) = find_containing_patch(point, self.base_grid.iter().enumerate())
                .ok_or(PartitionError::OutOfBounds {
                    lat: point.y(),
                    lon: point.x(),
                })?;
            let id = self.activated.insert(base);
            trace!(?base, "activated base cell");
            return Ok(Insertion::Activated { id, patch: base });
        };

        if patch.size() <= self.min_size {
            return Ok(Insertion::Saturated { id, patch });
        }

        let children = subdivide(&patch, self.fan_out)?;
        self.activated.remove(id);
        let children = children
            .into_iter()
            .map(|child| self.activated.insert(child))
            .collect();
        trace!(parent = ?patch, "subdivided");
        Ok(Insertion::Subdivided {
            parent: patch,
            children,
        })
    }

    pub fn finish(self) -> Vec<Patch> {
        self.activated.into_patches()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::lat_lon;

    fn world() -> Partitioner {
        Partitioner::new(&PartitionConfig::default())
    }

    fn run(points: &[(f64, f64)]) -> Vec<Patch> {
        let mut partitioner = world();
        for &(lat, lon) in points {
            partitioner.insert(&lat_lon(lat, lon)).unwrap();
        }
        partitioner.finish()
    }

    #[test]
    fn subdivides_into_four_quadrants() {
        let children = subdivide(&Patch::new(0.0, 10.0, 0.0, 10.0), 2).unwrap();
        assert_eq!(
            children,
            vec![
                Patch::new(0.0, 5.0, 0.0, 5.0),
                Patch::new(0.0, 5.0, 5.0, 10.0),
                Patch::new(5.0, 10.0, 0.0, 5.0),
                Patch::new(5.0, 10.0, 5.0, 10.0),
            ]
        );
        let area: f64 = children.iter().map(|c| c.size() * c.height()).sum();
        assert_eq!(area, 100.0);
    }

    #[test]
    fn three_way_fan_out_has_exact_outer_edges() {
        let children = subdivide(&Patch::new(0.0, 1.0, 0.0, 1.0), 3).unwrap();
        assert_eq!(children.len(), 9);
        assert_eq!(children[8].right, 1.0);
        assert_eq!(children[8].top, 1.0);
        for (i, a) in children.iter().enumerate() {
            for b in &children[i + 1..] {
                assert!(!a.overlaps_interior(b));
            }
        }
    }

    #[test]
    fn degenerate_subdivision_is_an_error() {
        let patch = Patch::new(0.0, 10.0, 0.0, 10.0);
        assert_eq!(
            subdivide(&patch, 1),
            Err(PartitionError::DegenerateSubdivision {
                size: 10.0,
                fan_out: 1
            })
        );
        let inverted = Patch {
            left: 1.0,
            right: 1.0,
            bottom: 0.0,
            top: 1.0,
        };
        assert!(subdivide(&inverted, 2).is_err());
    }

    #[test]
    fn single_point_activates_its_base_cell() {
        let patches = run(&[(2.0, 2.0)]);
        assert_eq!(patches, vec![Patch::new(0.0, 10.0, 0.0, 10.0)]);
    }

    #[test]
    fn second_point_splits_one_level() {
        let patches = run(&[(2.0, 2.0), (3.0, 3.0)]);
        assert_eq!(patches.len(), 4);
        assert!(patches.iter().all(|p| p.size() == 5.0));
        assert!(patches.contains(&Patch::new(0.0, 5.0, 0.0, 5.0)));
        assert!(patches.contains(&Patch::new(5.0, 10.0, 5.0, 10.0)));
    }

    #[test]
    fn points_in_distinct_cells_never_split() {
        let patches = run(&[(2.0, 2.0), (45.0, 100.0), (-60.0, -120.0)]);
        assert_eq!(patches.len(), 3);
        assert!(patches.iter().all(|p| p.size() == 10.0));
    }

    #[test]
    fn repeated_hits_stop_below_the_floor() {
        let mut partitioner = world();
        let point = lat_lon(2.0, 2.0);
        let mut outcomes = Vec::new();
        for _ in 0..10 {
            outcomes.push(partitioner.insert(&point).unwrap());
        }

        // 10 -> 5 -> 2.5 -> 1.25 -> 0.625; 0.625 <= 1 saturates.
        assert!(matches!(outcomes[0], Insertion::Activated { .. }));
        for outcome in &outcomes[1..5] {
            assert!(matches!(outcome, Insertion::Subdivided { .. }));
        }
        for outcome in &outcomes[5..] {
            assert!(matches!(outcome, Insertion::Saturated { patch, .. } if patch.size() == 0.625));
        }

        let patches = partitioner.finish();
        assert_eq!(patches.len(), 1 + 3 * 4);
        let smallest = patches.iter().map(Patch::size).fold(f64::INFINITY, f64::min);
        assert_eq!(smallest, 0.625);
        assert!(patches.iter().all(|p| p.size() > 0.5));
    }

    #[test]
    fn children_are_appended_after_survivors() {
        let mut partitioner = world();
        partitioner.insert(&lat_lon(2.0, 2.0)).unwrap();
        partitioner.insert(&lat_lon(45.0, 105.0)).unwrap();
        let outcome = partitioner.insert(&lat_lon(3.0, 3.0)).unwrap();

        let (parent, children) = match outcome {
            Insertion::Subdivided { parent, children } => (parent, children),
            other => panic!("expected a subdivision, got {:?}", other),
        };
        assert_eq!(parent, Patch::new(0.0, 10.0, 0.0, 10.0));

        let order: Vec<_> = partitioner.activated().iter().map(|(_, p)| *p).collect();
        assert_eq!(order[0], Patch::new(100.0, 110.0, 40.0, 50.0));
        assert_eq!(order[1], Patch::new(0.0, 5.0, 0.0, 5.0));
        assert_eq!(children.len(), 4);
        assert_eq!(partitioner.activated().len(), 5);
        assert_eq!(partitioner.activated().get(children[3]), Some(&Patch::new(5.0, 10.0, 5.0, 10.0)));
    }

    #[test]
    fn point_on_shared_base_edge_activates_the_earlier_cell() {
        let patches = run(&[(45.0, 100.0)]);
        assert_eq!(patches, vec![Patch::new(90.0, 100.0, 40.0, 50.0)]);
    }

    #[test]
    fn out_of_bounds_points_are_reported() {
        let mut partitioner = world();
        assert_eq!(
            partitioner.insert(&lat_lon(95.0, 0.0)),
            Err(PartitionError::OutOfBounds { lat: 95.0, lon: 0.0 })
        );
        assert!(partitioner.insert(&lat_lon(f64::NAN, 0.0)).is_err());
        assert!(partitioner.activated().is_empty());
    }

    #[test]
    fn plane_corners_are_accepted() {
        let patches = run(&[(90.0, 180.0), (-90.0, -180.0)]);
        assert_eq!(patches.len(), 2);
    }

    #[test]
    fn dense_cluster_keeps_partition_sound() {
        let mut points = Vec::new();
        for i in 0..40 {
            for j in 0..40 {
                // A cluster around (48.8, 2.3) plus a sparse diagonal.
                points.push((48.0 + i as f64 * 0.037, 2.0 + j as f64 * 0.041));
            }
            points.push((-80.0 + i as f64 * 4.1, -170.0 + i as f64 * 8.3));
        }

        let mut partitioner = world();
        for &(lat, lon) in &points {
            partitioner.insert(&lat_lon(lat, lon)).unwrap();
        }
        let patches = partitioner.finish();

        for (i, a) in patches.iter().enumerate() {
            for b in &patches[i + 1..] {
                assert!(!a.overlaps_interior(b), "{:?} overlaps {:?}", a, b);
            }
        }
        for &(lat, lon) in &points {
            let point = lat_lon(lat, lon);
            assert!(patches.iter().any(|p| p.contains(&point)), "({}, {}) uncovered", lat, lon);
        }
        for patch in &patches {
            let depth = (10.0 / patch.size()).log2().round();
            assert!(depth <= 4.0, "{:?} is too deep", patch);
            assert!(patch.size() > 0.5);
        }
    }
}
