use thiserror::Error;

/// Conditions the partitioning core can report. Everything else (parsing, files, images)
/// belongs to the layers around it.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum PartitionError {
    #[error("point ({lat}, {lon}) lies outside the plane bounds")]
    OutOfBounds { lat: f64, lon: f64 },

    #[error("cannot subdivide a patch of size {size} into {fan_out}x{fan_out} children")]
    DegenerateSubdivision { size: f64, fan_out: u32 },
}
