// User-facing controls: which filter is active, whether eyes get marked,
// and the snapshot slot the pipeline thread reads once per frame.
//
// The UI thread owns `Controls` and is the only writer. After every toggle it
// publishes a fresh `Snapshot` into the shared `SnapshotSlot`; the pipeline
// copies the whole snapshot, so it never sees half of an update.

use crate::crop::AspectRatio;
use crate::filter::Filter;
use parking_lot::Mutex;
use std::sync::Arc;

pub const SEPIA_INTENSITY: f32 = 1.0;
pub const EDGE_INTENSITY: f32 = 16.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterMode {
    Idle,
    Sepia,
    Edges,
}

/// Filter selection state machine.
///
/// Entering `Sepia` or `Edges` rebuilds the filter with its fixed intensity.
/// Going back to `Idle` keeps the last filter around but stops applying it.
#[derive(Clone, Debug)]
pub struct FilterState {
    mode: FilterMode,
    filter: Filter,
    builds: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterState {
    /// Starts `Idle` with an inert sepia filter at intensity 0.0.
    pub fn new() -> Self {
        Self {
            mode: FilterMode::Idle,
            filter: Filter::SepiaTone { intensity: 0.0 },
            builds: 0,
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// The filter to apply this frame, `None` while idle.
    pub fn active_filter(&self) -> Option<Filter> {
        match self.mode {
            FilterMode::Idle => None,
            FilterMode::Sepia | FilterMode::Edges => Some(self.filter),
        }
    }

    /// The stored filter object, applied or not.
    pub fn stored_filter(&self) -> Filter {
        self.filter
    }

    /// How many times a toggle has (re)constructed the filter.
    pub fn builds(&self) -> u32 {
        self.builds
    }

    pub fn toggle_sepia(&mut self) -> FilterMode {
        if self.mode == FilterMode::Sepia {
            self.mode = FilterMode::Idle;
        } else {
            self.mode = FilterMode::Sepia;
            self.rebuild(Filter::SepiaTone { intensity: SEPIA_INTENSITY });
        }
        self.mode
    }

    pub fn toggle_edges(&mut self) -> FilterMode {
        if self.mode == FilterMode::Edges {
            self.mode = FilterMode::Idle;
        } else {
            self.mode = FilterMode::Edges;
            self.rebuild(Filter::EdgeDetect { intensity: EDGE_INTENSITY });
        }
        self.mode
    }

    fn rebuild(&mut self, filter: Filter) {
        self.filter = filter;
        self.builds += 1;
    }
}

/// Everything the pipeline needs to know about the UI for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Snapshot {
    pub filter: Option<Filter>,
    pub eye_overlay: bool,
    pub aspect_ratio: AspectRatio,
}

/// Single guarded slot shared between the UI thread (writer) and the
/// pipeline thread (reader).
#[derive(Clone, Debug)]
pub struct SnapshotSlot {
    inner: Arc<Mutex<Snapshot>>,
}

impl SnapshotSlot {
    pub fn new(initial: Snapshot) -> Self {
        Self { inner: Arc::new(Mutex::new(initial)) }
    }

    pub fn load(&self) -> Snapshot {
        *self.inner.lock()
    }

    pub fn store(&self, snapshot: Snapshot) {
        *self.inner.lock() = snapshot;
    }
}

/// UI-owned control state. Each toggle publishes a new snapshot.
pub struct Controls {
    filter: FilterState,
    eye_overlay: bool,
    aspect_ratio: AspectRatio,
    slot: SnapshotSlot,
}

impl Controls {
    pub fn new(aspect_ratio: AspectRatio) -> Self {
        let filter = FilterState::new();
        let slot = SnapshotSlot::new(Snapshot {
            filter: filter.active_filter(),
            eye_overlay: false,
            aspect_ratio,
        });
        Self { filter, eye_overlay: false, aspect_ratio, slot }
    }

    /// Handle for the pipeline thread.
    pub fn slot(&self) -> SnapshotSlot {
        self.slot.clone()
    }

    pub fn mode(&self) -> FilterMode {
        self.filter.mode()
    }

    pub fn eye_overlay(&self) -> bool {
        self.eye_overlay
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    pub fn toggle_sepia(&mut self) -> FilterMode {
        let mode = self.filter.toggle_sepia();
        self.publish();
        mode
    }

    pub fn toggle_edges(&mut self) -> FilterMode {
        let mode = self.filter.toggle_edges();
        self.publish();
        mode
    }

    pub fn toggle_eye_overlay(&mut self) -> bool {
        self.eye_overlay = !self.eye_overlay;
        self.publish();
        self.eye_overlay
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            filter: self.filter.active_filter(),
            eye_overlay: self.eye_overlay,
            aspect_ratio: self.aspect_ratio,
        }
    }

    fn publish(&self) {
        let snap = self.snapshot();
        log::debug!("controls -> {:?}", snap);
        self.slot.store(snap);
    }
}
