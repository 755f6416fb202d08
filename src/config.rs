use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub render: RenderConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub stats_csv: PathBuf,
    /// Boundary source: a local GeoJSON/TopoJSON path, or an http(s) URL
    /// (the world-atlas CDN file).
    pub topology: String,
    /// Object name inside a TopoJSON topology holding the country
    /// geometries. Ignored for plain GeoJSON input.
    #[serde(default = "default_topology_object")]
    pub topology_object: String,
    /// Optional TOML file overriding the built-in alias/numeric tables.
    pub tables: Option<PathBuf>,
}

fn default_topology_object() -> String {
    "countries".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    pub out_dir: PathBuf,
    /// Map width in pixels; the equirectangular height is width / 2.
    #[serde(default = "default_map_width")]
    pub map_width: u32,
    #[serde(default = "default_scatter_size")]
    pub scatter_width: u32,
    #[serde(default = "default_scatter_size")]
    pub scatter_height: u32,
}

fn default_map_width() -> u32 {
    1600
}

fn default_scatter_size() -> u32 {
    900
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory of front-end assets served at /.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_static_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Tick intervals for the three playback speed presets, milliseconds.
#[derive(Debug, Deserialize, Clone)]
pub struct TimelineConfig {
    #[serde(default = "default_slow_ms")]
    pub slow_ms: u64,
    #[serde(default = "default_normal_ms")]
    pub normal_ms: u64,
    #[serde(default = "default_fast_ms")]
    pub fast_ms: u64,
}

fn default_slow_ms() -> u64 {
    1500
}

fn default_normal_ms() -> u64 {
    800
}

fn default_fast_ms() -> u64 {
    300
}

impl Default for TimelineConfig {
    fn default() -> Self {
        TimelineConfig {
            slow_ms: default_slow_ms(),
            normal_ms: default_normal_ms(),
            fast_ms: default_fast_ms(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let toml_src = r#"
            [input]
            stats_csv = "data/connectivity.csv"
            topology = "https://cdn.jsdelivr.net/npm/world-atlas@2/countries-110m.json"

            [render]
            out_dir = "out"

            [server]
            port = 8080
        "#;
        let config: AppConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.input.topology_object, "countries");
        assert_eq!(config.render.map_width, 1600);
        assert_eq!(config.timeline.normal_ms, 800);
        assert!(config.input.tables.is_none());
    }

    #[test]
    fn timeline_presets_override() {
        let toml_src = r#"
            [input]
            stats_csv = "stats.csv"
            topology = "world.geojson"

            [render]
            out_dir = "out"

            [server]
            port = 3000

            [timeline]
            fast_ms = 100
        "#;
        let config: AppConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.timeline.fast_ms, 100);
        assert_eq!(config.timeline.slow_ms, 1500);
    }
}
