use crate::types::Patch;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub points_csv: PathBuf,
    #[serde(default)]
    pub has_headers: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PartitionConfig {
    pub bounds: Patch,
    pub base_step: f64,
    pub min_size: f64, // roughly 100 km at the equator
    pub fan_out: u32,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            bounds: Patch::new(-180.0, 180.0, -90.0, 90.0),
            base_step: 10.0,
            min_size: 1.0,
            fan_out: 2,
        }
    }
}

impl PartitionConfig {
    pub fn validate(&self) -> Result<()> {
        let b = &self.bounds;
        let values = [b.left, b.right, b.bottom, b.top, self.base_step, self.min_size];
        if values.iter().any(|v| !v.is_finite()) {
            bail!("Partition settings must be finite numbers");
        }
        if b.left >= b.right || b.bottom >= b.top {
            bail!("Plane bounds are degenerate: {:?}", b);
        }
        if self.base_step <= 0.0 {
            bail!("base_step must be positive, got {}", self.base_step);
        }
        if !divides_evenly(b.size(), self.base_step) || !divides_evenly(b.height(), self.base_step) {
            bail!(
                "Plane bounds {:?} are not evenly divisible by base_step {}",
                b,
                self.base_step
            );
        }
        if self.min_size <= 0.0 {
            bail!("min_size must be positive, got {}", self.min_size);
        }
        if self.fan_out < 2 {
            bail!("fan_out must be at least 2, got {}", self.fan_out);
        }
        Ok(())
    }
}

fn divides_evenly(extent: f64, step: f64) -> bool {
    let cells = extent / step;
    (cells - cells.round()).abs() < 1e-9 && cells.round() >= 1.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub image: PathBuf,
    #[serde(default = "default_pixels_per_degree")]
    pub pixels_per_degree: u32,
}

fn default_pixels_per_degree() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub grid_colors: [String; 2], // Hex codes, alternated as a checkerboard
    pub patch_color: String,
    pub outline_color: String,
    pub point_color: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            grid_colors: ["#2e3131".to_string(), "#67809f".to_string()],
            patch_color: "#c80000".to_string(),
            outline_color: "#000000".to_string(),
            point_color: "#f0ff00".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.partition.validate()?;
        if config.output.pixels_per_degree == 0 {
            bail!("pixels_per_degree must be at least 1");
        }
        Ok(config)
    }
}
