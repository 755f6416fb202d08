use crate::config::AppConfig;
use crate::topo;
use crate::types::{
    ConnectivityRecord, CountryFeature, Region, YearIndex, END_YEAR, START_YEAR,
};
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use geo::MultiPolygon;
use std::collections::HashSet;
use std::fs::File;
use tracing::warn;

/// Load the statistics CSV and build the year index. Both data sources
/// are loaded once at startup; a failure here is fatal to the whole run.
pub fn load_records(config: &AppConfig) -> Result<YearIndex> {
    println!("Loading statistics from {:?}...", config.input.stats_csv);

    let file = File::open(&config.input.stats_csv)
        .with_context(|| format!("Failed to open CSV file: {:?}", config.input.stats_csv))?;
    let mut rdr = ReaderBuilder::new().from_reader(file);
    let headers = rdr.headers()?.clone();

    let col = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("Column '{}' not found in CSV", name))
    };

    let country_idx = col("country")?;
    let code_idx = col("countryCode")?;
    let year_idx = col("year")?;
    let penetration_idx = col("internetPenetration")?;
    let gdp_idx = col("gdpPerCapita")?;
    let region_idx = col("region")?;
    // Optional in the source.
    let population_idx = headers.iter().position(|h| h == "population");

    let mut index = YearIndex::new();
    // (code, year) pairs already seen; codes are unique within a year.
    let mut seen: HashSet<(String, u16)> = HashSet::new();
    let mut skipped = 0usize;

    for (row_no, result) in rdr.records().enumerate() {
        let record = result?;
        let get = |idx: usize| record.get(idx).unwrap_or("").trim();

        let parsed = (|| -> Option<ConnectivityRecord> {
            let country = get(country_idx);
            let code = get(code_idx);
            if country.is_empty() || code.is_empty() {
                return None;
            }
            let year: u16 = get(year_idx).parse().ok()?;
            let internet_penetration: f64 = get(penetration_idx).parse().ok()?;
            let gdp_per_capita: f64 = get(gdp_idx).parse().ok()?;
            if !(0.0..=100.0).contains(&internet_penetration) || gdp_per_capita < 0.0 {
                return None;
            }
            let population = population_idx
                .and_then(|idx| {
                    let raw = get(idx);
                    if raw.is_empty() {
                        None
                    } else {
                        Some(raw.parse::<u64>())
                    }
                })
                .transpose()
                .ok()?;
            let region = Region::parse(get(region_idx))?;
            Some(ConnectivityRecord {
                country: country.to_string(),
                country_code: code.to_string(),
                year,
                internet_penetration,
                gdp_per_capita,
                population,
                region,
            })
        })();

        let Some(rec) = parsed else {
            warn!(row = row_no + 2, "skipping malformed CSV row");
            skipped += 1;
            continue;
        };

        if !(START_YEAR..=END_YEAR).contains(&rec.year) {
            warn!(row = row_no + 2, year = rec.year, "skipping out-of-range year");
            skipped += 1;
            continue;
        }
        if !seen.insert((rec.country_code.clone(), rec.year)) {
            warn!(
                row = row_no + 2,
                code = %rec.country_code,
                year = rec.year,
                "skipping duplicate country-year row"
            );
            skipped += 1;
            continue;
        }

        index.entry(rec.year).or_default().push(rec);
    }

    let total: usize = index.values().map(|v| v.len()).sum();
    println!(
        "Loaded {} records across {} years ({} rows skipped)",
        total,
        index.len(),
        skipped
    );
    if total == 0 {
        return Err(anyhow!("Statistics CSV produced no usable records"));
    }
    Ok(index)
}

/// Fetch the raw topology text: a public CDN URL or a local file path.
pub async fn fetch_topology(config: &AppConfig) -> Result<String> {
    let source = &config.input.topology;
    if source.starts_with("http://") || source.starts_with("https://") {
        println!("Fetching topology from {}...", source);
        let response = reqwest::get(source)
            .await
            .with_context(|| format!("Failed to fetch topology from {}", source))?
            .error_for_status()
            .with_context(|| format!("Topology fetch returned an error status: {}", source))?;
        Ok(response.text().await.context("Failed to read topology body")?)
    } else {
        println!("Reading topology from {:?}...", source);
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read topology file: {}", source))
    }
}

/// Parse boundary features out of the topology text. Dispatches on the
/// document's `type`: a TopoJSON `Topology` or a plain GeoJSON
/// `FeatureCollection`.
pub fn parse_features(config: &AppConfig, text: &str) -> Result<Vec<CountryFeature>> {
    let doc: serde_json::Value =
        serde_json::from_str(text).context("Failed to parse topology JSON")?;
    let kind = doc
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow!("Topology document has no 'type' field"))?;

    let features = match kind {
        "Topology" => topo::decode(text, &config.input.topology_object)?,
        "FeatureCollection" => parse_geojson(text)?,
        other => return Err(anyhow!("Unsupported topology document type: {}", other)),
    };

    println!("Loaded {} boundary features", features.len());
    if features.is_empty() {
        return Err(anyhow!("Topology contained no usable country features"));
    }
    Ok(features)
}

fn parse_geojson(text: &str) -> Result<Vec<CountryFeature>> {
    use geojson::GeoJson;

    let geojson: GeoJson = text.parse().context("Failed to parse GeoJSON")?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut features = Vec::new();
    for feature in collection.features {
        let id = match &feature.id {
            Some(geojson::feature::Id::String(s)) => s.clone(),
            Some(geojson::feature::Id::Number(n)) => n.to_string(),
            None => String::new(),
        };

        let properties = feature
            .properties
            .as_ref()
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(k, v)| {
                        v.as_str().map(|s| (k.to_lowercase(), s.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let geometry = match feature.geometry {
            Some(geom) => {
                let converted: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry: {:?}", e))?;
                match converted {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // points/lines are not country boundaries
                }
            }
            None => continue,
        };

        features.push(CountryFeature {
            id,
            properties,
            geometry,
        });
    }

    Ok(features)
}
