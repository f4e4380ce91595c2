use crate::types::Patch;

/// Number of `step`-sized cells along each axis of `bounds` as `(columns, rows)`.
pub fn grid_dimensions(bounds: &Patch, step: f64) -> (usize, usize) {
    let columns = (bounds.size() / step).round() as usize;
    let rows = (bounds.height() / step).round() as usize;
    (columns, rows)
}

/// Tiles `bounds` with `step x step` patches, ordered by increasing x, then increasing y.
///
/// The bounds must be evenly divisible by `step`; configuration validation guarantees it.
/// Cell corners come from integer indices so no error accumulates across the plane.
pub fn build_base_grid(bounds: &Patch, step: f64) -> Vec<Patch> {
    let (columns, rows) = grid_dimensions(bounds, step);
    debug_assert!(
        (columns as f64 * step - bounds.size()).abs() < 1e-9
            && (rows as f64 * step - bounds.height()).abs() < 1e-9,
        "bounds must be a whole number of steps"
    );

    let mut patches = Vec::with_capacity(columns * rows);
    for gx in 0..columns {
        for gy in 0..rows {
            patches.push(Patch::new(
                bounds.left + gx as f64 * step,
                bounds.left + (gx + 1) as f64 * step,
                bounds.bottom + gy as f64 * step,
                bounds.bottom + (gy + 1) as f64 * step,
            ));
        }
    }
    patches
}
