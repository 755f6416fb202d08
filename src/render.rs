use crate::annotate;
use crate::config::AppConfig;
use crate::scene::{self, Scene};
use crate::tables::LookupTables;
use crate::types::{CountryFeature, Region, ResolvedPair, YearIndex, END_YEAR, START_YEAR};
use anyhow::{Context, Result};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::Point;
use image::{ImageBuffer, Rgba, RgbaImage};
use rayon::prelude::*;
use std::fs;
use tracing::warn;

/// Bubble-size fallback for records with no population value. Carried
/// over from the source dataset's convention; every use is logged so the
/// bias stays visible.
pub const DEFAULT_POPULATION: u64 = 50_000_000;

const SCATTER_MARGIN: u32 = 60;

pub fn render_scene(
    config: &AppConfig,
    scene_kind: Scene,
    features: &[CountryFeature],
    index: &YearIndex,
    tables: &LookupTables,
) -> Result<()> {
    fs::create_dir_all(&config.render.out_dir).context("Failed to create output directory")?;

    match scene_kind {
        Scene::Overview => {
            let year = START_YEAR;
            let pairs = scene::resolve_year(features, index, year, tables);
            let img = render_choropleth(config.render.map_width, &pairs);
            let path = config.render.out_dir.join("scene1.png");
            img.save(&path)
                .with_context(|| format!("Failed to save {:?}", path))?;
            println!("Rendered scene 1 ({} features) to {:?}", pairs.len(), path);
        }
        Scene::Timeline => {
            let frame_dir = config.render.out_dir.join("frames");
            fs::create_dir_all(&frame_dir).context("Failed to create frames directory")?;
            println!(
                "Rendering timeline frames {}..={} to {:?}...",
                START_YEAR, END_YEAR, frame_dir
            );
            // One frame per year; each frame re-resolves its own slice.
            (START_YEAR..=END_YEAR)
                .into_par_iter()
                .try_for_each(|year| -> Result<()> {
                    let pairs = scene::resolve_year(features, index, year, tables);
                    let img = render_choropleth(config.render.map_width, &pairs);
                    let path = frame_dir.join(format!("{}.png", year));
                    img.save(&path)
                        .with_context(|| format!("Failed to save {:?}", path))?;
                    Ok(())
                })?;
            println!("Rendered {} frames", END_YEAR - START_YEAR + 1);
        }
        Scene::Scatter => {
            let year = END_YEAR;
            let slice = index.get(&year).map(Vec::as_slice).unwrap_or(&[]);
            let img = render_scatter(
                config.render.scatter_width,
                config.render.scatter_height,
                slice,
                None,
                true,
            );
            let path = config.render.out_dir.join("scene3.png");
            img.save(&path)
                .with_context(|| format!("Failed to save {:?}", path))?;
            println!("Rendered scene 3 ({} records) to {:?}", slice.len(), path);
        }
    }

    Ok(())
}

// Equirectangular projection over the full world extent.

fn project(lon: f64, lat: f64, width: u32, height: u32) -> (f64, f64) {
    let x = (lon + 180.0) / 360.0 * width as f64;
    let y = (90.0 - lat) / 180.0 * height as f64;
    (x, y)
}

fn unproject(px: u32, py: u32, width: u32, height: u32) -> (f64, f64) {
    let lon = (px as f64 + 0.5) / width as f64 * 360.0 - 180.0;
    let lat = 90.0 - (py as f64 + 0.5) / height as f64 * 180.0;
    (lon, lat)
}

/// Rasterize one resolved year slice as a world choropleth. Each feature
/// tests the pixel centers inside its bounding box; features paint in
/// parallel and blit sequentially.
pub fn render_choropleth(width: u32, pairs: &[ResolvedPair]) -> RgbaImage {
    let height = width / 2;
    let mut img: RgbaImage =
        ImageBuffer::from_pixel(width, height, annotate::OCEAN_COLOR);

    let painted: Vec<Vec<(u32, u32, Rgba<u8>)>> = pairs
        .par_iter()
        .map(|pair| {
            let color = annotate::fill_color(pair);
            let Some(bbox) = pair.feature.geometry.bounding_rect() else {
                return Vec::new();
            };
            let (min_x, max_y) = project(bbox.min().x, bbox.min().y, width, height);
            let (max_x, min_y) = project(bbox.max().x, bbox.max().y, width, height);

            let px_min = min_x.floor().max(0.0) as u32;
            let px_max = (max_x.ceil() as u32).min(width.saturating_sub(1));
            let py_min = min_y.floor().max(0.0) as u32;
            let py_max = (max_y.ceil() as u32).min(height.saturating_sub(1));

            let mut pixels = Vec::new();
            for py in py_min..=py_max {
                for px in px_min..=px_max {
                    let (lon, lat) = unproject(px, py, width, height);
                    if pair.feature.geometry.contains(&Point::new(lon, lat)) {
                        pixels.push((px, py, color));
                    }
                }
            }
            pixels
        })
        .collect();

    for pixels in painted {
        for (px, py, color) in pixels {
            img.put_pixel(px, py, color);
        }
    }

    img
}

/// Scene-3 scatterplot: log10 GDP per capita (x) against penetration (y),
/// bubble area from population, colored by region, with an optional OLS
/// trend line clamped to the visible range.
pub fn render_scatter(
    width: u32,
    height: u32,
    records: &[crate::types::ConnectivityRecord],
    region: Option<Region>,
    with_trend: bool,
) -> RgbaImage {
    let mut img: RgbaImage =
        ImageBuffer::from_pixel(width, height, Rgba([255, 255, 255, 255]));

    let filtered = scene::filter_region(records, region);

    // x domain from the data with a little padding; a sane default when
    // the subset is empty.
    let xs: Vec<f64> = filtered
        .iter()
        .filter(|r| r.gdp_per_capita > 0.0)
        .map(|r| r.gdp_per_capita.log10())
        .collect();
    let (x_lo, x_hi) = match (
        xs.iter().copied().fold(f64::INFINITY, f64::min),
        xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    ) {
        (lo, hi) if lo.is_finite() && hi > lo => (lo - 0.25, hi + 0.25),
        _ => (2.0, 5.5),
    };

    let plot_w = width.saturating_sub(2 * SCATTER_MARGIN) as f64;
    let plot_h = height.saturating_sub(2 * SCATTER_MARGIN) as f64;
    let to_px = |x: f64, y: f64| -> (i64, i64) {
        let px = SCATTER_MARGIN as f64 + (x - x_lo) / (x_hi - x_lo) * plot_w;
        let py = SCATTER_MARGIN as f64 + (1.0 - y / 100.0) * plot_h;
        (px.round() as i64, py.round() as i64)
    };

    draw_axes(&mut img, width, height);

    let mut defaulted = 0usize;
    for record in &filtered {
        if record.gdp_per_capita <= 0.0 {
            continue;
        }
        let population = record.population.unwrap_or_else(|| {
            defaulted += 1;
            DEFAULT_POPULATION
        });
        let radius = bubble_radius(population);
        let (cx, cy) = to_px(record.gdp_per_capita.log10(), record.internet_penetration);
        draw_circle(&mut img, cx, cy, radius, annotate::region_color(record.region));
    }
    if defaulted > 0 {
        warn!(
            count = defaulted,
            fallback = DEFAULT_POPULATION,
            "records without population rendered with the fallback bubble size"
        );
    }

    if with_trend {
        if let Some(line) = scene::trend_line(filtered.iter().copied()) {
            let steps = plot_w as i64;
            let dark = Rgba([40, 40, 40, 255]);
            for i in 0..=steps {
                let x = line.x_min + (line.x_max - line.x_min) * i as f64 / steps.max(1) as f64;
                let (px, py) = to_px(x, line.y_at(x));
                draw_circle(&mut img, px, py, 1.0, dark);
            }
        }
    }

    img
}

/// Bubble radius scaled so area tracks population.
pub fn bubble_radius(population: u64) -> f64 {
    (population as f64 / 2_000_000.0).sqrt().clamp(2.0, 28.0)
}

fn draw_axes(img: &mut RgbaImage, width: u32, height: u32) {
    if width <= 2 * SCATTER_MARGIN || height <= 2 * SCATTER_MARGIN {
        return;
    }
    let axis = Rgba([120, 120, 120, 255]);
    let left = SCATTER_MARGIN;
    let right = width.saturating_sub(SCATTER_MARGIN);
    let top = SCATTER_MARGIN;
    let bottom = height.saturating_sub(SCATTER_MARGIN);
    for px in left..=right.min(width - 1) {
        img.put_pixel(px, bottom.min(height - 1), axis);
        img.put_pixel(px, top, axis);
    }
    for py in top..=bottom.min(height - 1) {
        img.put_pixel(left, py, axis);
        img.put_pixel(right.min(width - 1), py, axis);
    }
}

fn draw_circle(img: &mut RgbaImage, cx: i64, cy: i64, radius: f64, color: Rgba<u8>) {
    let r = radius.ceil() as i64;
    let r2 = radius * radius;
    for dy in -r..=r {
        for dx in -r..=r {
            if (dx * dx + dy * dy) as f64 > r2 {
                continue;
            }
            let (px, py) = (cx + dx, cy + dy);
            if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
                img.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}
