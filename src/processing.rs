use crate::config::PartitionConfig;
use crate::error::PartitionError;
use crate::partition::{Insertion, Partitioner};
use crate::types::Patch;
use anyhow::Result;
use geo::{Area, Point};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Finalized partition, handed read-only to rendering.
#[derive(Debug, Clone)]
pub struct Partition {
    pub patches: Vec<Patch>,
    pub summary: PartitionSummary,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionSummary {
    pub points_processed: usize,
    pub points_skipped: usize,
    pub activations: usize,
    pub subdivisions: usize,
    pub saturated_hits: usize,
    pub patches: usize,
    /// Patch count per subdivision level; level 0 is the base step.
    pub patches_per_level: BTreeMap<u32, usize>,
    pub covered_area: f64,
}

/// Feeds `points` through the partitioner in order. Out-of-bounds points are skipped with a
/// warning; any other core error aborts.
pub fn partition_points(config: &PartitionConfig, points: &[Point<f64>]) -> Result<Partition> {
    info!("Partitioning {} points...", points.len());
    let mut partitioner = Partitioner::new(config);
    let mut summary = PartitionSummary::default();

    for point in points {
        match partitioner.insert(point) {
            Ok(Insertion::Activated { .. }) => summary.activations += 1,
            Ok(Insertion::Subdivided { .. }) => summary.subdivisions += 1,
            Ok(Insertion::Saturated { .. }) => summary.saturated_hits += 1,
            Err(err @ PartitionError::OutOfBounds { .. }) => {
                warn!("Skipping point: {}", err);
                summary.points_skipped += 1;
                continue;
            }
            Err(err) => return Err(err.into()),
        }
        summary.points_processed += 1;
    }

    if partitioner.activated().is_empty() {
        warn!("No point landed inside the plane bounds");
    }
    summary.patches = partitioner.activated().len();

    let patches = partitioner.finish();
    for patch in &patches {
        *summary
            .patches_per_level
            .entry(subdivision_level(config, patch))
            .or_default() += 1;
    }
    summary.covered_area = patches.iter().map(|p| p.to_rect().unsigned_area()).sum();

    info!(
        "Partition has {} patches after {} subdivisions ({} points skipped)",
        summary.patches,
        summary.subdivisions,
        summary.points_skipped
    );

    Ok(Partition { patches, summary })
}

/// How many times a base cell was split to produce a patch of this size.
pub fn subdivision_level(config: &PartitionConfig, patch: &Patch) -> u32 {
    let ratio = config.base_step / patch.size();
    (ratio.ln() / (config.fan_out as f64).ln()).round().max(0.0) as u32
}

impl PartitionSummary {
    pub fn report(&self, config: &PartitionConfig) -> String {
        let mut out = String::new();
        out.push_str(&format!("points processed:  {}\n", self.points_processed));
        out.push_str(&format!("points skipped:    {}\n", self.points_skipped));
        out.push_str(&format!("activations:       {}\n", self.activations));
        out.push_str(&format!("subdivisions:      {}\n", self.subdivisions));
        out.push_str(&format!("saturated hits:    {}\n", self.saturated_hits));
        out.push_str(&format!("patches:           {}\n", self.patches));
        out.push_str(&format!("covered area:      {:.3} sq deg\n", self.covered_area));
        out.push_str("level  patch size  patches\n");
        for (level, count) in &self.patches_per_level {
            let size = config.base_step / (config.fan_out as f64).powi(*level as i32);
            out.push_str(&format!("{:>5}  {:>10.4}  {:>7}\n", level, size, count));
        }
        out
    }
}
