use crate::resolve::YearLookup;
use crate::tables::LookupTables;
use crate::types::{
    ConnectivityRecord, CountryFeature, Region, ResolvedPair, YearIndex, END_YEAR, START_YEAR,
};
use serde::Serialize;

/// The three scenes of the tour. Scenes 1 and 3 pin their year; scene 2
/// follows the playback year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    /// Static choropleth of the starting year.
    Overview,
    /// Animated choropleth, year driven by the playback state machine.
    Timeline,
    /// Penetration vs. GDP scatterplot for the final year.
    Scatter,
}

impl Scene {
    pub fn from_number(n: u8) -> Option<Scene> {
        match n {
            1 => Some(Scene::Overview),
            2 => Some(Scene::Timeline),
            3 => Some(Scene::Scatter),
            _ => None,
        }
    }

    /// Fixed year for scenes that have one.
    pub fn fixed_year(&self) -> Option<u16> {
        match self {
            Scene::Overview => Some(START_YEAR),
            Scene::Timeline => None,
            Scene::Scatter => Some(END_YEAR),
        }
    }
}

/// Resolve every boundary feature against one year slice. Rebuilt per
/// render pass; with a few hundred records per year the lookup rebuild
/// is well inside an animation tick.
pub fn resolve_year<'a>(
    features: &'a [CountryFeature],
    index: &'a YearIndex,
    year: u16,
    tables: &'a LookupTables,
) -> Vec<ResolvedPair<'a>> {
    let slice: &[ConnectivityRecord] = index.get(&year).map(Vec::as_slice).unwrap_or(&[]);
    let lookup = YearLookup::build(slice, tables);
    features
        .iter()
        .map(|feature| ResolvedPair {
            feature,
            record: lookup.resolve(feature),
        })
        .collect()
}

/// Arithmetic mean of internet penetration for a year slice, rounded to
/// one decimal place. An empty slice yields 0.
pub fn global_average(records: &[ConnectivityRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let sum: f64 = records.iter().map(|r| r.internet_penetration).sum();
    (sum / records.len() as f64 * 10.0).round() / 10.0
}

pub fn filter_region<'a>(
    records: &'a [ConnectivityRecord],
    region: Option<Region>,
) -> Vec<&'a ConnectivityRecord> {
    records
        .iter()
        .filter(|r| region.map_or(true, |want| r.region == want))
        .collect()
}

/// Ordinary least squares of penetration (y) on log10(GDP per capita) (x).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrendLine {
    pub slope: f64,
    pub intercept: f64,
    /// x extent of the fitted subset, log10 USD.
    pub x_min: f64,
    pub x_max: f64,
}

impl TrendLine {
    /// Line value at x, clamped to the visible percentage range.
    pub fn y_at(&self, x: f64) -> f64 {
        (self.slope * x + self.intercept).clamp(0.0, 100.0)
    }
}

/// Fit the trend over the filtered subset. Records without a positive
/// GDP value cannot be log-scaled and are left out; fewer than 3 usable
/// points (or a degenerate x spread) suppresses the line.
pub fn trend_line<'a, I>(records: I) -> Option<TrendLine>
where
    I: IntoIterator<Item = &'a ConnectivityRecord>,
{
    let points: Vec<(f64, f64)> = records
        .into_iter()
        .filter(|r| r.gdp_per_capita > 0.0)
        .map(|r| (r.gdp_per_capita.log10(), r.internet_penetration))
        .collect();
    if points.len() < 3 {
        return None;
    }

    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();

    let denom = n * sum_xx - sum_x * sum_x;
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    let intercept = (sum_y - slope * sum_x) / n;

    let x_min = points.iter().map(|(x, _)| *x).fold(f64::INFINITY, f64::min);
    let x_max = points
        .iter()
        .map(|(x, _)| *x)
        .fold(f64::NEG_INFINITY, f64::max);

    Some(TrendLine {
        slope,
        intercept,
        x_min,
        x_max,
    })
}
