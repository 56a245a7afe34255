//! Web server for the quakemap UI.
//!
//! Provides the interactive map using:
//! - Axum for HTTP server
//! - SSE (Server-Sent Events) to push full view snapshots
//! - Leaflet for the map itself, redrawn from each snapshot
//!
//! The server owns the single [`Controller`]. Browser controls post actions,
//! the controller transitions, and every resulting view is broadcast to all
//! connected pages.

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::client::{FeedSource, TimeWindow};
use crate::controller::{Action, Controller, FetchRequest, ViewSnapshot, ViewState};
use crate::filters::{MAX_THRESHOLD, MagnitudeThreshold, THRESHOLD_STEP};
use crate::presenter::{MarkerPresenter, Severity, escape_html};
use crate::surface::{SceneLayer, Viewport};

/// Capacity of the snapshot broadcast channel.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub window: TimeWindow,
    pub threshold: MagnitudeThreshold,
    pub utc: bool,
}

/// Anything the server can fetch feeds from on a blocking thread.
pub type SharedSource = Arc<dyn FeedSource + Send + Sync>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The one view controller, rendering into an in-memory scene
    controller: Arc<Mutex<Controller<SceneLayer>>>,
    /// Feed access, used from `spawn_blocking`
    source: SharedSource,
    /// Channel for broadcasting snapshots to SSE clients
    tx: broadcast::Sender<String>,
}

impl AppState {
    /// Build the state with an idle controller.
    pub fn new(source: SharedSource, presenter: MarkerPresenter, initial: ViewState) -> Self {
        let (tx, _rx) = broadcast::channel::<String>(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            controller: Arc::new(Mutex::new(Controller::new(
                SceneLayer::new(),
                presenter,
                initial,
            ))),
            source,
            tx,
        }
    }

    /// Apply a user action, publish the new view, and start any fetch it
    /// asks for. Returns the published snapshot.
    pub async fn dispatch(&self, action: Action) -> ViewSnapshot {
        let (snapshot, request) = {
            let mut controller = self.controller.lock().await;
            let request = controller.dispatch(action);
            let snapshot = controller.snapshot();
            // Published under the lock so broadcast order is revision order.
            self.publish(&snapshot);
            (snapshot, request)
        };

        if let Some(request) = request {
            self.spawn_fetch(request);
        }
        snapshot
    }

    /// Current view without changing anything.
    pub async fn snapshot(&self) -> ViewSnapshot {
        self.controller.lock().await.snapshot()
    }

    /// Tear down the map surface.
    pub async fn shutdown(&self) {
        self.controller.lock().await.shutdown();
    }

    fn spawn_fetch(&self, request: FetchRequest) {
        let state = self.clone();
        tokio::spawn(async move {
            let source = state.source.clone();
            let joined =
                tokio::task::spawn_blocking(move || source.fetch_events(request.window)).await;

            let action = match joined {
                Ok(result) => {
                    if let Err(e) = &result {
                        tracing::debug!(status = ?e.status(), "feed fetch failed: {}", e);
                    }
                    Action::from_fetch(request, result)
                }
                Err(join_err) => {
                    tracing::error!("fetch task aborted: {}", join_err);
                    Action::FetchFailed {
                        generation: request.generation,
                        message: format!("fetch task aborted: {join_err}"),
                    }
                }
            };
            state.complete_fetch(action).await;
        });
    }

    /// Feed a fetch completion back in. Completions never request another
    /// fetch, so nothing is spawned from here.
    async fn complete_fetch(&self, action: Action) {
        let mut controller = self.controller.lock().await;
        let follow_up = controller.dispatch(action);
        debug_assert!(follow_up.is_none());
        self.publish(&controller.snapshot());
    }

    fn publish(&self, snapshot: &ViewSnapshot) {
        match serde_json::to_string(snapshot) {
            // No receivers simply means no page is open.
            Ok(json) => {
                let _ = self.tx.send(json);
            }
            Err(e) => tracing::error!("failed to serialize snapshot: {}", e),
        }
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/state", get(state_handler))
        .route("/stream", get(sse_handler))
        .route("/window/{window}", post(window_handler))
        .route("/threshold", post(threshold_handler))
        .route("/retry", post(retry_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the web server.
///
/// `source` is used only from blocking threads, so a blocking HTTP client
/// is fine here as long as it was built outside the runtime.
pub async fn run_server(config: ServerConfig, source: SharedSource) -> anyhow::Result<()> {
    let presenter = if config.utc {
        MarkerPresenter::utc()
    } else {
        MarkerPresenter::local()
    };
    let state = AppState::new(
        source,
        presenter,
        ViewState::new(config.window, config.threshold),
    );

    // First load happens before any page connects.
    state.dispatch(Action::Mount).await;

    let app = create_router(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("🌍 quakemap UI starting at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the map UI.
async fn index_handler(State(state): State<AppState>) -> Html<String> {
    let viewport = *state.controller.lock().await.surface().viewport();
    Html(render_index(&viewport))
}

/// Current snapshot, used for the initial page load.
async fn state_handler(State(state): State<AppState>) -> Json<ViewSnapshot> {
    Json(state.snapshot().await)
}

/// SSE stream handler for snapshot updates.
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(json) => Some(Ok(Event::default().event("snapshot").data(json))),
        // A lagged receiver just waits for the next full snapshot.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Switch the time window.
async fn window_handler(State(state): State<AppState>, Path(window): Path<String>) -> Response {
    match window.parse::<TimeWindow>() {
        Ok(window) => {
            tracing::info!("time window changed to {} via UI", window);
            Json(state.dispatch(Action::SelectWindow(window)).await).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ThresholdParams {
    value: f64,
}

/// Change the minimum magnitude.
async fn threshold_handler(
    State(state): State<AppState>,
    Query(params): Query<ThresholdParams>,
) -> Response {
    match MagnitudeThreshold::new(params.value) {
        Ok(threshold) => {
            tracing::debug!("threshold changed to {} via UI", threshold);
            Json(state.dispatch(Action::SetThreshold(threshold)).await).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, e).into_response(),
    }
}

/// Retry a failed fetch.
async fn retry_handler(State(state): State<AppState>) -> Json<ViewSnapshot> {
    tracing::info!("retry requested via UI");
    Json(state.dispatch(Action::Retry).await)
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

/// Fill the page template with the viewport, selector options and legend.
fn render_index(viewport: &Viewport) -> String {
    let options: String = TimeWindow::ALL
        .iter()
        .map(|w| format!(r#"<option value="{}">{}</option>"#, w.as_str(), w.label()))
        .collect();

    let legend: String = Severity::ALL
        .iter()
        .map(|s| {
            format!(
                r#"<div class="legend-item"><span class="dot" style="background:{}"></span><span>{}</span></div>"#,
                s.fill_color(),
                escape_html(s.legend_label())
            )
        })
        .collect();

    INDEX_HTML
        .replace("{{WINDOW_OPTIONS}}", &options)
        .replace("{{LEGEND}}", &legend)
        .replace("{{MAX_THRESHOLD}}", &MAX_THRESHOLD.to_string())
        .replace("{{THRESHOLD_STEP}}", &THRESHOLD_STEP.to_string())
        .replace("{{CENTER_LAT}}", &viewport.center.0.to_string())
        .replace("{{CENTER_LNG}}", &viewport.center.1.to_string())
        .replace("{{ZOOM}}", &viewport.zoom.to_string())
        .replace("{{TILE_URL}}", viewport.tile_url)
        .replace("{{TILE_ATTRIBUTION}}", viewport.tile_attribution)
        .replace("{{MAX_ZOOM}}", &viewport.max_zoom.to_string())
}

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Global Earthquake Visualizer</title>

    <!-- Leaflet -->
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>

    <style>
        :root {
            --bg: #111827;
            --panel: #1f2937;
            --panel-2: #374151;
            --border: #374151;
            --text: #f9fafb;
            --muted: #9ca3af;
            --accent: #3b82f6;
        }
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Inter', sans-serif;
            background: var(--bg);
            color: var(--text);
            min-height: 100vh;
            display: flex;
            flex-direction: column;
        }
        header, .controls, footer {
            background: var(--panel);
            border-bottom: 1px solid var(--border);
            padding: 16px 24px;
        }
        header h1 { text-align: center; font-size: 28px; }
        header p { text-align: center; color: var(--muted); margin-top: 4px; }
        .grid {
            max-width: 1280px;
            margin: 0 auto;
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(220px, 1fr));
            gap: 16px;
        }
        label { display: block; font-size: 14px; margin-bottom: 8px; }
        select, input[type=range] { width: 100%; }
        select {
            padding: 8px 12px;
            background: var(--panel-2);
            color: var(--text);
            border: 1px solid #4b5563;
            border-radius: 8px;
        }
        input[type=range] { accent-color: var(--accent); }
        .stat { background: var(--panel-2); border-radius: 8px; padding: 12px; }
        .stat .name { font-size: 12px; color: var(--muted); }
        .stat .value { font-size: 24px; font-weight: 700; }
        #stat-count { color: #60a5fa; }
        #stat-avg { color: #34d399; }
        .legend {
            max-width: 1280px;
            margin: 16px auto 0;
            display: flex;
            flex-wrap: wrap;
            gap: 16px;
            font-size: 14px;
        }
        .legend-item { display: flex; align-items: center; gap: 8px; }
        .dot { width: 16px; height: 16px; border-radius: 50%; display: inline-block; }
        .map-wrap { position: relative; flex: 1; min-height: 400px; }
        #map { position: absolute; inset: 0; background: var(--panel); }
        .overlay {
            position: absolute;
            inset: 0;
            z-index: 1000;
            display: none;
            align-items: center;
            justify-content: center;
            background: rgba(17, 24, 39, 0.75);
        }
        .overlay.visible { display: flex; }
        #error-overlay { background: var(--bg); }
        .spinner {
            width: 64px; height: 64px;
            border-radius: 50%;
            border-bottom: 2px solid var(--accent);
            animation: spin 1s linear infinite;
            margin: 0 auto 16px;
        }
        @keyframes spin { to { transform: rotate(360deg); } }
        .error-box {
            background: #7f1d1d;
            border: 1px solid #b91c1c;
            border-radius: 8px;
            padding: 24px;
            max-width: 420px;
        }
        .error-box h3 { font-size: 20px; margin-bottom: 8px; }
        .error-box p { color: #fecaca; }
        .error-box button {
            margin-top: 16px;
            padding: 8px 16px;
            background: #b91c1c;
            color: var(--text);
            border: none;
            border-radius: 8px;
            cursor: pointer;
        }
        .error-box button:hover { background: #dc2626; }
        footer { border-top: 1px solid var(--border); text-align: center; font-size: 14px; color: var(--muted); }
        .popup { color: #111827; min-width: 200px; }
        .popup h3 { font-size: 18px; margin-bottom: 8px; }
        .popup p { font-size: 14px; margin-bottom: 4px; }
    </style>
</head>
<body>
    <header>
        <h1>🌍 Global Earthquake Visualizer</h1>
        <p>Real-time seismic activity monitoring</p>
    </header>

    <section class="controls">
        <div class="grid">
            <div>
                <label for="window">Time Range</label>
                <select id="window">{{WINDOW_OPTIONS}}</select>
            </div>
            <div>
                <label for="threshold">Min Magnitude: <span id="threshold-label">0.0</span></label>
                <input id="threshold" type="range" min="0" max="{{MAX_THRESHOLD}}" step="{{THRESHOLD_STEP}}" value="0">
            </div>
            <div class="stat">
                <p class="name">Total Events</p>
                <p class="value" id="stat-count">0</p>
            </div>
            <div class="stat">
                <p class="name">Avg Magnitude</p>
                <p class="value" id="stat-avg">0.00</p>
            </div>
        </div>
        <div class="legend">{{LEGEND}}</div>
    </section>

    <div class="map-wrap">
        <div class="overlay" id="loading-overlay">
            <div>
                <div class="spinner"></div>
                <p>Loading earthquake data...</p>
            </div>
        </div>
        <div class="overlay" id="error-overlay">
            <div class="error-box">
                <h3>Error Loading Data</h3>
                <p id="error-message"></p>
                <button id="retry">Retry</button>
            </div>
        </div>
        <div id="map"></div>
    </div>

    <footer>
        Data: USGS Earthquake Hazards Program |
        Showing <span id="filtered-count">0</span> of <span id="total-count">0</span> events
    </footer>

    <script>
        const map = L.map('map').setView([{{CENTER_LAT}}, {{CENTER_LNG}}], {{ZOOM}});
        L.tileLayer('{{TILE_URL}}', {
            attribution: '{{TILE_ATTRIBUTION}}',
            maxZoom: {{MAX_ZOOM}}
        }).addTo(map);

        // Every snapshot replaces the whole marker set.
        const markers = L.layerGroup().addTo(map);

        const $ = (id) => document.getElementById(id);

        // Views from POST responses and the stream can arrive out of order.
        let revision = -1;

        function render(view) {
            if (view.revision < revision) {
                return;
            }
            revision = view.revision;

            markers.clearLayers();
            for (const m of view.markers) {
                L.circleMarker([m.latitude, m.longitude], {
                    radius: m.radius,
                    fillColor: m.fill_color,
                    color: m.style.stroke_color,
                    weight: m.style.weight,
                    opacity: m.style.opacity,
                    fillOpacity: m.style.fill_opacity
                }).bindPopup(m.popup_html).addTo(markers);
            }

            $('window').value = view.window;
            $('threshold').value = view.threshold;
            $('threshold-label').textContent = Number(view.threshold).toFixed(1);
            $('stat-count').textContent = view.filtered_count;
            $('stat-avg').textContent = view.stats.avg;
            $('filtered-count').textContent = view.filtered_count;
            $('total-count').textContent = view.total_count;

            $('loading-overlay').classList.toggle('visible', view.phase === 'loading');
            $('error-overlay').classList.toggle('visible', view.phase === 'error');
            $('error-message').textContent = view.error || '';
        }

        async function post(path) {
            const response = await fetch(path, { method: 'POST' });
            if (response.ok) {
                render(await response.json());
            }
        }

        $('window').addEventListener('change', (e) => post('/window/' + e.target.value));
        $('threshold').addEventListener('input', (e) => {
            $('threshold-label').textContent = Number(e.target.value).toFixed(1);
            post('/threshold?value=' + encodeURIComponent(e.target.value));
        });
        $('retry').addEventListener('click', () => post('/retry'));

        fetch('/state').then((r) => r.json()).then(render);

        const stream = new EventSource('/stream');
        stream.addEventListener('snapshot', (e) => render(JSON.parse(e.data)));
    </script>
</body>
</html>
"##;
