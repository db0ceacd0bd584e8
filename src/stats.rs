// Frame counters shared by the capture thread, the pipeline and the UI.
// Dropped frames are never retried, so these counters are the only trace of them.

use crate::error::Error;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    captured: AtomicU64,
    source_dropped: AtomicU64,
    presented: AtomicU64,
    sink_dropped: AtomicU64,
    detector_dropped: AtomicU64,
    filter_dropped: AtomicU64,
    crop_dropped: AtomicU64,
    rasterize_dropped: AtomicU64,
    other_dropped: AtomicU64,
}

/// Plain copy of the counters at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub captured: u64,
    pub source_dropped: u64,
    pub presented: u64,
    pub sink_dropped: u64,
    pub detector_dropped: u64,
    pub filter_dropped: u64,
    pub crop_dropped: u64,
    pub rasterize_dropped: u64,
    /// Failures no stage is expected to produce.
    pub other_dropped: u64,
}

impl StatsSnapshot {
    /// Frames the pipeline itself rejected.
    pub fn pipeline_dropped(&self) -> u64 {
        self.detector_dropped
            + self.filter_dropped
            + self.crop_dropped
            + self.rasterize_dropped
            + self.other_dropped
    }
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_captured(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Capture thread found the pipeline still busy.
    pub fn record_source_drop(&self) {
        self.source_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_presented(&self) {
        self.presented.fetch_add(1, Ordering::Relaxed);
    }

    /// UI had not picked up the previous result yet.
    pub fn record_sink_drop(&self) {
        self.sink_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a frame the pipeline gave up on, bucketed by cause.
    pub fn record_failure(&self, err: &Error) {
        let counter = match err {
            Error::DetectorUnavailable | Error::Detector(_) => &self.detector_dropped,
            Error::Filter(_) => &self.filter_dropped,
            Error::CropOutOfBounds { .. } => &self.crop_dropped,
            Error::Rasterize(_) => &self.rasterize_dropped,
            other => {
                log::warn!("unexpected pipeline failure: {other}");
                &self.other_dropped
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            captured: self.captured.load(Ordering::Relaxed),
            source_dropped: self.source_dropped.load(Ordering::Relaxed),
            presented: self.presented.load(Ordering::Relaxed),
            sink_dropped: self.sink_dropped.load(Ordering::Relaxed),
            detector_dropped: self.detector_dropped.load(Ordering::Relaxed),
            filter_dropped: self.filter_dropped.load(Ordering::Relaxed),
            crop_dropped: self.crop_dropped.load(Ordering::Relaxed),
            rasterize_dropped: self.rasterize_dropped.load(Ordering::Relaxed),
            other_dropped: self.other_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_land_in_their_bucket() {
        let stats = PipelineStats::new();
        stats.record_failure(&Error::DetectorUnavailable);
        stats.record_failure(&Error::Filter("x".into()));
        stats.record_failure(&Error::CropOutOfBounds {
            y: -1,
            width: 1,
            height: 3,
            src_width: 1,
            src_height: 1,
        });
        stats.record_failure(&Error::Rasterize("x".into()));
        stats.record_failure(&Error::Rasterize("y".into()));

        let s = stats.snapshot();
        assert_eq!(s.detector_dropped, 1);
        assert_eq!(s.filter_dropped, 1);
        assert_eq!(s.crop_dropped, 1);
        assert_eq!(s.rasterize_dropped, 2);
        assert_eq!(s.other_dropped, 0);
        assert_eq!(s.pipeline_dropped(), 5);
        assert_eq!(s.presented, 0);
    }

    #[test]
    fn unrelated_errors_are_not_rasterize_drops() {
        let stats = PipelineStats::new();
        stats.record_failure(&Error::Config("x".into()));
        stats.record_failure(&Error::CameraFrame("y".into()));

        let s = stats.snapshot();
        assert_eq!(s.rasterize_dropped, 0);
        assert_eq!(s.other_dropped, 2);
        assert_eq!(s.pipeline_dropped(), 2);
    }
}
