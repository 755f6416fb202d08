use crate::annotate::{self, LegendStop};
use crate::config::AppConfig;
use crate::scene::{self, Scene, TrendLine};
use crate::tables::LookupTables;
use crate::timeline::{self, Effect, PlaybackEvent, PlaybackState, Speed};
use crate::types::{ConnectivityRecord, CountryFeature, Region, ResolvedPair, YearIndex};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use geo::algorithm::bounding_rect::BoundingRect;
use geo::algorithm::contains::Contains;
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

// Wrapper for RTree indexing of feature bounding boxes.
struct FeatureIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for FeatureIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// The single process-wide application state. The playback value is only
/// ever replaced through `timeline::step`; the ticker handle is stored so
/// every stop (and every scene switch away from the timeline) cancels the
/// running timer instead of leaking it.
pub struct AppState {
    pub config: AppConfig,
    pub features: Vec<CountryFeature>,
    pub index: YearIndex,
    pub tables: LookupTables,
    tree: RTree<FeatureIndex>,
    playback: Mutex<PlaybackState>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

pub async fn start_server(
    config: AppConfig,
    features: Vec<CountryFeature>,
    index: YearIndex,
    tables: LookupTables,
) -> Result<()> {
    println!("Building spatial index for hover queries...");
    let tree_items: Vec<FeatureIndex> = features
        .iter()
        .enumerate()
        .filter_map(|(i, feature)| {
            let rect = feature.geometry.bounding_rect()?;
            Some(FeatureIndex {
                index: i,
                aabb: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
            })
        })
        .collect();
    let tree = RTree::bulk_load(tree_items);

    let port = config.server.port;
    let static_dir = config.server.static_dir.clone();
    let state = Arc::new(AppState {
        config,
        features,
        index,
        tables,
        tree,
        playback: Mutex::new(PlaybackState::default()),
        ticker: Mutex::new(None),
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("Starting server on http://{}", addr);

    let app = Router::new()
        .route("/api/scene/:scene", get(scene_handler))
        .route("/api/scene/:scene/activate", post(activate_scene_handler))
        .route("/api/timeline", get(timeline_state_handler))
        .route("/api/timeline/:action", post(timeline_action_handler))
        .route("/api/query", get(query_handler))
        .nest_service("/", ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Deserialize)]
struct SceneParams {
    /// Region label, e.g. "South Asia"; absent means all regions.
    region: Option<String>,
    /// Scene 3 trend-line toggle, on by default.
    trend: Option<bool>,
}

#[derive(Serialize)]
struct SceneRow {
    code: Option<String>,
    country: Option<String>,
    value: Option<f64>,
    gdp: Option<f64>,
    population: Option<u64>,
    region: Option<String>,
    tooltip: String,
    feature_id: String,
}

#[derive(Serialize)]
struct SceneResponse {
    scene: u8,
    year: u16,
    rows: Vec<SceneRow>,
    summary: String,
    legend: Vec<LegendStop>,
    trend: Option<TrendLine>,
}

async fn scene_handler(
    State(state): State<Arc<AppState>>,
    Path(scene_no): Path<u8>,
    Query(params): Query<SceneParams>,
) -> Result<Json<SceneResponse>, StatusCode> {
    let scene_kind = Scene::from_number(scene_no).ok_or(StatusCode::NOT_FOUND)?;
    let region = match params.region.as_deref() {
        None | Some("all") => None,
        Some(label) => Some(Region::parse(label).ok_or(StatusCode::BAD_REQUEST)?),
    };

    let year = scene_kind
        .fixed_year()
        .unwrap_or_else(|| state.playback.lock().unwrap().year);

    let slice: &[ConnectivityRecord] = state.index.get(&year).map(Vec::as_slice).unwrap_or(&[]);
    let pairs = scene::resolve_year(&state.features, &state.index, year, &state.tables);

    let rows = pairs
        .iter()
        .filter(|pair| match (region, pair.record) {
            (Some(want), Some(record)) => record.region == want,
            (Some(_), None) => scene_kind != Scene::Scatter,
            (None, _) => true,
        })
        .map(row_for_pair)
        .collect();

    let trend = if scene_kind == Scene::Scatter && params.trend.unwrap_or(true) {
        scene::trend_line(scene::filter_region(slice, region))
    } else {
        None
    };

    Ok(Json(SceneResponse {
        scene: scene_no,
        year,
        rows,
        summary: annotate::summary_text(year, scene::global_average(slice)),
        legend: annotate::legend_stops(),
        trend,
    }))
}

fn row_for_pair(pair: &ResolvedPair) -> SceneRow {
    SceneRow {
        code: pair.record.map(|r| r.country_code.clone()),
        country: pair
            .record
            .map(|r| r.country.clone())
            .or_else(|| pair.feature.display_name().map(str::to_string)),
        value: pair.record.map(|r| r.internet_penetration),
        gdp: pair.record.map(|r| r.gdp_per_capita),
        population: pair.record.and_then(|r| r.population),
        region: pair.record.map(|r| r.region.label().to_string()),
        tooltip: annotate::tooltip_text(pair),
        feature_id: pair.feature.id.clone(),
    }
}

/// Scene switch. Entering any scene other than the timeline pauses
/// playback, which cancels a running ticker.
async fn activate_scene_handler(
    State(state): State<Arc<AppState>>,
    Path(scene_no): Path<u8>,
) -> Result<Json<PlaybackState>, StatusCode> {
    let scene_kind = Scene::from_number(scene_no).ok_or(StatusCode::NOT_FOUND)?;
    let playback = if scene_kind != Scene::Timeline {
        apply_event(&state, PlaybackEvent::Pause)
    } else {
        *state.playback.lock().unwrap()
    };
    Ok(Json(playback))
}

async fn timeline_state_handler(State(state): State<Arc<AppState>>) -> Json<PlaybackState> {
    Json(*state.playback.lock().unwrap())
}

#[derive(Deserialize)]
struct TimelineParams {
    year: Option<u16>,
    preset: Option<String>,
}

async fn timeline_action_handler(
    State(state): State<Arc<AppState>>,
    Path(action): Path<String>,
    Query(params): Query<TimelineParams>,
) -> Result<Json<PlaybackState>, StatusCode> {
    let event = match action.as_str() {
        "play" => PlaybackEvent::Play,
        "pause" => PlaybackEvent::Pause,
        "reset" => PlaybackEvent::Reset,
        "scrub" => PlaybackEvent::Scrub(params.year.ok_or(StatusCode::BAD_REQUEST)?),
        "speed" => {
            let preset = params.preset.as_deref().ok_or(StatusCode::BAD_REQUEST)?;
            PlaybackEvent::SetSpeed(Speed::parse(preset).ok_or(StatusCode::BAD_REQUEST)?)
        }
        _ => return Err(StatusCode::NOT_FOUND),
    };
    Ok(Json(apply_event(&state, event)))
}

/// Run one playback event through the pure state machine, then perform
/// its ticker effects.
fn apply_event(state: &Arc<AppState>, event: PlaybackEvent) -> PlaybackState {
    let (next, effects) = {
        let mut playback = state.playback.lock().unwrap();
        let (next, effects) = timeline::step(*playback, event, &state.config.timeline);
        *playback = next;
        (next, effects)
    };
    for effect in effects {
        match effect {
            Effect::StopTicker => stop_ticker(state),
            Effect::StartTicker(interval) => start_ticker(state, interval),
        }
    }
    next
}

fn stop_ticker(state: &Arc<AppState>) {
    if let Some(handle) = state.ticker.lock().unwrap().take() {
        handle.abort();
    }
}

fn start_ticker(state: &Arc<AppState>, interval: Duration) {
    stop_ticker(state);
    let task_state = Arc::clone(state);
    let handle = tokio::spawn(async move {
        let state = task_state;
        let mut ticker = tokio::time::interval(interval);
        // The first interval tick fires immediately; swallow it so the
        // initial year stays on screen for one full interval.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let effects = {
                let mut playback = state.playback.lock().unwrap();
                let (next, effects) =
                    timeline::step(*playback, PlaybackEvent::Tick, &state.config.timeline);
                *playback = next;
                effects
            };
            // Reaching the final year stops playback from inside the tick.
            if effects.contains(&Effect::StopTicker) {
                break;
            }
        }
    });
    *state.ticker.lock().unwrap() = Some(handle);
}

#[derive(Deserialize)]
struct QueryParams {
    lat: f64,
    lon: f64,
    year: Option<u16>,
}

#[derive(Serialize)]
struct QueryResponse {
    feature_id: String,
    tooltip: String,
    code: Option<String>,
    value: Option<f64>,
}

/// Hover hit test: R-tree candidates, then exact point-in-polygon. The
/// hit feature is resolved against the requested (or current playback)
/// year; "no data" is a normal payload, not an error.
async fn query_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<QueryResponse>> {
    let point = Point::new(params.lon, params.lat);
    let envelope = AABB::from_point([params.lon, params.lat]);

    for candidate in state.tree.locate_in_envelope_intersecting(&envelope) {
        let Some(feature) = state.features.get(candidate.index) else {
            continue;
        };
        if !feature.geometry.contains(&point) {
            continue;
        }

        let year = params
            .year
            .unwrap_or_else(|| state.playback.lock().unwrap().year);
        let pairs = scene::resolve_year(
            std::slice::from_ref(feature),
            &state.index,
            year,
            &state.tables,
        );
        let pair = &pairs[0];
        return Json(Some(QueryResponse {
            feature_id: feature.id.clone(),
            tooltip: annotate::tooltip_text(pair),
            code: pair.record.map(|r| r.country_code.clone()),
            value: pair.record.map(|r| r.internet_penetration),
        }));
    }

    Json(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InputConfig, RenderConfig, ServerConfig, TimelineConfig};
    use crate::timeline::Phase;
    use crate::types::START_YEAR;

    fn test_state() -> Arc<AppState> {
        let config = AppConfig {
            input: InputConfig {
                stats_csv: "stats.csv".into(),
                topology: "world.geojson".to_string(),
                topology_object: "countries".to_string(),
                tables: None,
            },
            render: RenderConfig {
                out_dir: "out".into(),
                map_width: 100,
                scatter_width: 100,
                scatter_height: 100,
            },
            server: ServerConfig {
                port: 0,
                static_dir: ".".into(),
            },
            timeline: TimelineConfig::default(),
        };
        Arc::new(AppState {
            config,
            features: Vec::new(),
            index: YearIndex::new(),
            tables: LookupTables::builtin(),
            tree: RTree::bulk_load(Vec::new()),
            playback: Mutex::new(PlaybackState::default()),
            ticker: Mutex::new(None),
        })
    }

    #[tokio::test]
    async fn play_spawns_a_ticker_and_reset_cancels_it() {
        let state = test_state();

        let playback = apply_event(&state, PlaybackEvent::Play);
        assert_eq!(playback.phase, Phase::Playing);
        assert!(state.ticker.lock().unwrap().is_some());

        let playback = apply_event(&state, PlaybackEvent::Reset);
        assert_eq!(playback.phase, Phase::Paused);
        assert_eq!(playback.year, START_YEAR);
        assert!(state.ticker.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn speed_change_while_playing_replaces_the_ticker() {
        let state = test_state();
        apply_event(&state, PlaybackEvent::Play);
        assert!(state.ticker.lock().unwrap().is_some());

        let playback = apply_event(&state, PlaybackEvent::SetSpeed(Speed::Fast));
        assert_eq!(playback.phase, Phase::Playing);
        assert_eq!(playback.year, START_YEAR);
        assert_eq!(playback.speed, Speed::Fast);
        assert!(state.ticker.lock().unwrap().is_some());

        apply_event(&state, PlaybackEvent::Reset);
        assert!(state.ticker.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn pausing_outside_playback_is_a_no_op() {
        let state = test_state();
        let playback = apply_event(&state, PlaybackEvent::Pause);
        assert_eq!(playback, PlaybackState::default());
        assert!(state.ticker.lock().unwrap().is_none());
    }
}
