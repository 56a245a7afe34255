//! View state controller.
//!
//! The view is an immutable [`ViewState`] record. [`transition`] is the only
//! place state changes are decided: it takes the current state and an
//! [`Action`] and returns the next state plus the [`Effect`]s to perform.
//! [`Controller`] applies those effects to a [`MapSurface`] and hands fetch
//! requests back to whoever owns the network.
//!
//! Every fetch is tagged with a generation number. A completion whose
//! generation is not the current one belongs to a superseded request and is
//! dropped, so a slow response for an old time window can never overwrite
//! the view of a newer one.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{FeedSource, TimeWindow};
use crate::errors::FetchError;
use crate::filters::{self, MagnitudeThreshold};
use crate::models::QuakeEvent;
use crate::presenter::{MarkerDescriptor, MarkerPresenter};
use crate::stats::{self, StatsSnapshot};
use crate::surface::{MapSurface, MarkerLayer, SceneLayer};

/// Message shown when a failed fetch carries no text of its own.
const GENERIC_FETCH_ERROR: &str = "Failed to fetch data";

/// Loading lifecycle of the view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed { message: String },
}

impl Phase {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed { .. } => "error",
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// Everything the view knows at one instant.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub window: TimeWindow,
    pub threshold: MagnitudeThreshold,
    pub phase: Phase,
    /// Events from the last successful fetch
    pub events: Arc<[QuakeEvent]>,
    /// Statistics over `events`, ignoring the threshold
    pub stats: StatsSnapshot,
    /// Generation of the most recently issued fetch
    pub generation: u64,
}

impl ViewState {
    #[must_use]
    pub fn new(window: TimeWindow, threshold: MagnitudeThreshold) -> Self {
        Self {
            window,
            threshold,
            ..Self::default()
        }
    }

    /// Events passing the current threshold.
    #[must_use]
    pub fn filtered(&self) -> Vec<&QuakeEvent> {
        filters::filter_by_magnitude(&self.events, self.threshold)
    }

    #[must_use]
    pub fn filtered_count(&self) -> usize {
        filters::count_matching(&self.events, self.threshold)
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.events.len()
    }

    /// Same state with a fresh fetch for `window` in flight.
    fn begin_fetch(&self, window: TimeWindow) -> Transition {
        let generation = self.generation + 1;
        Transition {
            state: Self {
                window,
                phase: Phase::Loading,
                generation,
                ..self.clone()
            },
            effects: vec![Effect::Fetch(FetchRequest { window, generation })],
        }
    }
}

/// A fetch the controller wants performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub window: TimeWindow,
    pub generation: u64,
}

/// Inputs to the state machine.
#[derive(Debug, Clone)]
pub enum Action {
    /// The view appeared for the first time
    Mount,
    SelectWindow(TimeWindow),
    SetThreshold(MagnitudeThreshold),
    /// User asked to try the failed fetch again
    Retry,
    FetchSucceeded {
        generation: u64,
        events: Vec<QuakeEvent>,
    },
    FetchFailed {
        generation: u64,
        message: String,
    },
}

impl Action {
    /// Completion action for `request`.
    #[must_use]
    pub fn from_fetch(request: FetchRequest, result: Result<Vec<QuakeEvent>, FetchError>) -> Self {
        match result {
            Ok(events) => Self::FetchSucceeded {
                generation: request.generation,
                events,
            },
            Err(e) => Self::FetchFailed {
                generation: request.generation,
                message: e.to_string(),
            },
        }
    }
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Fetch(FetchRequest),
    /// Recompute markers from events and threshold and redraw them all
    RenderMarkers,
}

/// Result of applying one action.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: ViewState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn unchanged(state: &ViewState) -> Self {
        Self {
            state: state.clone(),
            effects: Vec::new(),
        }
    }
}

/// Decide the next state for `action`. Pure: no I/O, no rendering.
#[must_use]
pub fn transition(state: &ViewState, action: Action) -> Transition {
    match action {
        Action::Mount => {
            if state.phase == Phase::Idle {
                state.begin_fetch(state.window)
            } else {
                debug!("mount ignored: view already {}", state.phase.name());
                Transition::unchanged(state)
            }
        }

        Action::SelectWindow(window) => {
            if window == state.window && state.phase != Phase::Idle {
                debug!("window {} already selected", window);
                Transition::unchanged(state)
            } else {
                state.begin_fetch(window)
            }
        }

        Action::SetThreshold(threshold) => Transition {
            state: ViewState {
                threshold,
                ..state.clone()
            },
            effects: vec![Effect::RenderMarkers],
        },

        Action::Retry => {
            if matches!(state.phase, Phase::Failed { .. }) {
                state.begin_fetch(state.window)
            } else {
                debug!("retry ignored: view is {}", state.phase.name());
                Transition::unchanged(state)
            }
        }

        Action::FetchSucceeded { generation, events } => {
            if !is_current(state, generation) {
                return Transition::unchanged(state);
            }
            Transition {
                state: ViewState {
                    phase: Phase::Loaded,
                    stats: stats::summarize(&events),
                    events: events.into(),
                    ..state.clone()
                },
                effects: vec![Effect::RenderMarkers],
            }
        }

        Action::FetchFailed { generation, message } => {
            if !is_current(state, generation) {
                return Transition::unchanged(state);
            }
            let message = if message.trim().is_empty() {
                GENERIC_FETCH_ERROR.to_string()
            } else {
                message
            };
            Transition {
                state: ViewState {
                    phase: Phase::Failed { message },
                    events: Arc::default(),
                    stats: StatsSnapshot::default(),
                    ..state.clone()
                },
                effects: vec![Effect::RenderMarkers],
            }
        }
    }
}

/// Whether a completion for `generation` should be applied.
fn is_current(state: &ViewState, generation: u64) -> bool {
    if generation != state.generation || state.phase != Phase::Loading {
        debug!(
            "dropping stale fetch result (generation {}, current {}, phase {})",
            generation,
            state.generation,
            state.phase.name()
        );
        return false;
    }
    true
}

/// Drives [`transition`] and owns the map surface it renders to.
pub struct Controller<L: MarkerLayer> {
    state: ViewState,
    surface: MapSurface<L>,
    presenter: MarkerPresenter,
    revision: u64,
}

impl<L: MarkerLayer> Controller<L> {
    pub fn new(layer: L, presenter: MarkerPresenter, state: ViewState) -> Self {
        Self {
            state,
            surface: MapSurface::new(layer),
            presenter,
            revision: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    #[must_use]
    pub fn surface(&self) -> &MapSurface<L> {
        &self.surface
    }

    /// Number of actions dispatched so far. Strictly increases with every
    /// dispatch, so clients can order views.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply `action`, render if asked, and return the fetch to perform, if
    /// any. The caller must feed the fetch outcome back through
    /// [`Action::from_fetch`].
    pub fn dispatch(&mut self, action: Action) -> Option<FetchRequest> {
        let Transition { state, effects } = transition(&self.state, action);
        self.log_phase_change(&state);
        self.state = state;
        self.revision += 1;

        let mut fetch = None;
        for effect in effects {
            match effect {
                Effect::RenderMarkers => self.render(),
                Effect::Fetch(request) => fetch = Some(request),
            }
        }
        fetch
    }

    /// Dispatch `action` and satisfy any resulting fetch synchronously from
    /// `source`.
    pub fn run<S: FeedSource + ?Sized>(&mut self, source: &S, action: Action) {
        let mut pending = self.dispatch(action);
        while let Some(request) = pending {
            let result = source.fetch_events(request.window);
            pending = self.dispatch(Action::from_fetch(request, result));
        }
    }

    /// Release the map surface. Further renders are ignored.
    pub fn shutdown(&mut self) {
        self.surface.teardown();
    }

    fn render(&mut self) {
        if self.surface.is_torn_down() {
            return;
        }
        let markers = self.presenter.present(self.state.filtered());
        self.surface.replace_markers(markers);
    }

    fn log_phase_change(&self, next: &ViewState) {
        if next.phase == self.state.phase && next.generation == self.state.generation {
            return;
        }
        match &next.phase {
            Phase::Loading => info!(
                "loading {} feed (generation {})",
                next.window.as_str(),
                next.generation
            ),
            Phase::Loaded => info!(
                "loaded {} events from {} feed",
                next.events.len(),
                next.window.as_str()
            ),
            Phase::Failed { message } => warn!("{} feed failed: {}", next.window.as_str(), message),
            Phase::Idle => {}
        }
    }
}

impl Controller<SceneLayer> {
    /// Serializable picture of the whole view, markers included.
    #[must_use]
    pub fn snapshot(&self) -> ViewSnapshot {
        let markers = self
            .surface
            .layer()
            .map(|layer| layer.markers().cloned().collect())
            .unwrap_or_default();
        ViewSnapshot::capture(&self.state, self.revision, markers)
    }
}

/// A marker plus its popup rendered to HTML.
#[derive(Debug, Clone, Serialize)]
pub struct MarkerView {
    #[serde(flatten)]
    pub marker: MarkerDescriptor,
    pub popup_html: String,
}

/// What a client needs to draw the view.
#[derive(Debug, Clone, Serialize)]
pub struct ViewSnapshot {
    pub revision: u64,
    pub phase: &'static str,
    pub error: Option<String>,
    pub window: TimeWindow,
    pub window_label: &'static str,
    pub threshold: MagnitudeThreshold,
    pub stats: StatsSnapshot,
    pub filtered_count: usize,
    pub total_count: usize,
    pub markers: Vec<MarkerView>,
}

impl ViewSnapshot {
    #[must_use]
    pub fn capture(state: &ViewState, revision: u64, markers: Vec<MarkerDescriptor>) -> Self {
        Self {
            revision,
            phase: state.phase.name(),
            error: state.phase.error().map(str::to_string),
            window: state.window,
            window_label: state.window.label(),
            threshold: state.threshold,
            stats: state.stats.clone(),
            filtered_count: state.filtered_count(),
            total_count: state.total_count(),
            markers: markers
                .into_iter()
                .map(|marker| MarkerView {
                    popup_html: marker.popup.to_html(),
                    marker,
                })
                .collect(),
        }
    }
}
