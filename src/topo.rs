use crate::types::CountryFeature;
use anyhow::{anyhow, Context, Result};
use geo::{LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use std::collections::HashMap;

// TopoJSON wire structures. Arcs are shared between geometries and, when
// a transform is present, quantized and delta-encoded.

#[derive(Debug, Deserialize)]
struct Topology {
    transform: Option<Transform>,
    arcs: Vec<Vec<Vec<f64>>>,
    objects: HashMap<String, TopoObject>,
}

#[derive(Debug, Deserialize)]
struct Transform {
    scale: [f64; 2],
    translate: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct TopoObject {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    geometries: Vec<TopoGeometry>,
}

#[derive(Debug, Deserialize)]
struct TopoGeometry {
    #[serde(rename = "type")]
    kind: String,
    id: Option<serde_json::Value>,
    properties: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    arcs: serde_json::Value,
}

/// Decode the named geometry collection of a TopoJSON topology into
/// country features.
pub fn decode(text: &str, object_name: &str) -> Result<Vec<CountryFeature>> {
    let topology: Topology = serde_json::from_str(text).context("Failed to parse TopoJSON")?;

    let object = topology
        .objects
        .get(object_name)
        .ok_or_else(|| anyhow!("Topology has no '{}' object", object_name))?;
    if object.kind != "GeometryCollection" {
        return Err(anyhow!(
            "Topology object '{}' is a {}, expected GeometryCollection",
            object_name,
            object.kind
        ));
    }

    let arcs = decode_arcs(&topology);

    let mut features = Vec::new();
    for geometry in &object.geometries {
        let rings: Vec<Vec<Vec<i64>>> = match geometry.kind.as_str() {
            "Polygon" => {
                let polygon: Vec<Vec<i64>> = serde_json::from_value(geometry.arcs.clone())
                    .context("Malformed Polygon arc indices")?;
                vec![polygon]
            }
            "MultiPolygon" => serde_json::from_value(geometry.arcs.clone())
                .context("Malformed MultiPolygon arc indices")?,
            _ => continue,
        };

        let polygons: Vec<Polygon<f64>> = rings
            .iter()
            .filter_map(|polygon| {
                let mut lines = polygon.iter().map(|ring| stitch_ring(&arcs, ring));
                let exterior = lines.next()?;
                Some(Polygon::new(exterior, lines.collect()))
            })
            .collect();

        let id = match &geometry.id {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let properties = geometry
            .properties
            .as_ref()
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.to_lowercase(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        features.push(CountryFeature {
            id,
            properties,
            geometry: MultiPolygon::new(polygons),
        });
    }

    Ok(features)
}

/// Expand every arc to absolute coordinates. Quantized topologies store
/// per-point deltas that accumulate along the arc before the transform
/// scale/translate applies.
fn decode_arcs(topology: &Topology) -> Vec<Vec<(f64, f64)>> {
    topology
        .arcs
        .iter()
        .map(|arc| match &topology.transform {
            Some(t) => {
                let mut x = 0.0;
                let mut y = 0.0;
                arc.iter()
                    .filter(|p| p.len() >= 2)
                    .map(|p| {
                        x += p[0];
                        y += p[1];
                        (x * t.scale[0] + t.translate[0], y * t.scale[1] + t.translate[1])
                    })
                    .collect()
            }
            None => arc
                .iter()
                .filter(|p| p.len() >= 2)
                .map(|p| (p[0], p[1]))
                .collect(),
        })
        .collect()
}

/// Join a sequence of arc indices into one closed ring. A negative index
/// `~i` walks arc `i` backwards; each arc after the first repeats the
/// previous arc's endpoint, which is dropped.
fn stitch_ring(arcs: &[Vec<(f64, f64)>], indices: &[i64]) -> LineString<f64> {
    let mut points: Vec<(f64, f64)> = Vec::new();
    for &idx in indices {
        let arc: Vec<(f64, f64)> = if idx >= 0 {
            arcs.get(idx as usize).cloned().unwrap_or_default()
        } else {
            let mut reversed = arcs.get(!idx as usize).cloned().unwrap_or_default();
            reversed.reverse();
            reversed
        };
        let skip = usize::from(!points.is_empty());
        points.extend(arc.into_iter().skip(skip));
    }
    if points.first() != points.last() {
        if let Some(&first) = points.first() {
            points.push(first);
        }
    }
    LineString::from(points)
}
