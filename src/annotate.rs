use crate::types::{Region, ResolvedPair};
use image::Rgba;
use serde::Serialize;

/// Neutral fill for features that resolved to no record.
pub const NO_DATA_COLOR: Rgba<u8> = Rgba([204, 204, 204, 255]);
pub const OCEAN_COLOR: Rgba<u8> = Rgba([236, 244, 248, 255]);

// Choropleth ramp anchors: pale at 0% online, saturated at 100%.
const RAMP_LOW: [u8; 3] = [0xed, 0xf8, 0xfb];
const RAMP_HIGH: [u8; 3] = [0x00, 0x58, 0x24];

/// Linear two-anchor ramp over internet penetration.
pub fn penetration_color(pct: f64) -> Rgba<u8> {
    let t = (pct / 100.0).clamp(0.0, 1.0);
    let channel = |low: u8, high: u8| -> u8 {
        (low as f64 + (high as f64 - low as f64) * t).round() as u8
    };
    Rgba([
        channel(RAMP_LOW[0], RAMP_HIGH[0]),
        channel(RAMP_LOW[1], RAMP_HIGH[1]),
        channel(RAMP_LOW[2], RAMP_HIGH[2]),
        255,
    ])
}

pub fn fill_color(pair: &ResolvedPair) -> Rgba<u8> {
    match pair.record {
        Some(record) => penetration_color(record.internet_penetration),
        None => NO_DATA_COLOR,
    }
}

/// Scatterplot palette, one color per fixed region category.
pub fn region_color(region: Region) -> Rgba<u8> {
    let hex = match region {
        Region::EastAsiaPacific => "#1b9e77",
        Region::EuropeCentralAsia => "#d95f02",
        Region::LatinAmericaCaribbean => "#7570b3",
        Region::MiddleEastNorthAfrica => "#e7298a",
        Region::NorthAmerica => "#66a61e",
        Region::SouthAsia => "#e6ab02",
        Region::SubSaharanAfrica => "#a6761d",
    };
    hex_to_rgba(hex)
}

pub fn hex_to_rgba(hex: &str) -> Rgba<u8> {
    let hex = hex.trim_start_matches('#');
    let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0);
    let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0);
    let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0);
    Rgba([r, g, b, 255])
}

fn rgba_to_hex(color: Rgba<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color.0[0], color.0[1], color.0[2])
}

#[derive(Debug, Clone, Serialize)]
pub struct LegendStop {
    pub value: f64,
    pub color: String,
    pub label: String,
}

/// Legend for the choropleth scenes: five evenly spaced stops plus the
/// "no data" swatch.
pub fn legend_stops() -> Vec<LegendStop> {
    let mut stops: Vec<LegendStop> = [0.0, 25.0, 50.0, 75.0, 100.0]
        .iter()
        .map(|&value| LegendStop {
            value,
            color: rgba_to_hex(penetration_color(value)),
            label: format!("{:.0}% online", value),
        })
        .collect();
    stops.push(LegendStop {
        value: f64::NAN,
        color: rgba_to_hex(NO_DATA_COLOR),
        label: "No data".to_string(),
    });
    stops
}

/// Hover text for one resolved feature. Absence of a record is a normal
/// outcome, spelled out rather than erroring.
pub fn tooltip_text(pair: &ResolvedPair) -> String {
    let fallback = pair.feature.id.as_str();
    match pair.record {
        Some(record) => format!(
            "{}: {:.1}% online in {}, GDP per capita ${:.0}",
            record.country, record.internet_penetration, record.year, record.gdp_per_capita
        ),
        None => {
            let name = pair.feature.display_name().unwrap_or(fallback);
            if name.is_empty() {
                "No data".to_string()
            } else {
                format!("{}: no data", name)
            }
        }
    }
}

/// Scene-2 annotation line for the current year.
pub fn summary_text(year: u16, average: f64) -> String {
    format!("Global average: {:.1}% online in {}", average, year)
}
