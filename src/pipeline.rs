// The per-frame pipeline: orient -> annotate eyes -> filter -> rasterize
// -> crop -> publish. `Pipeline::render` is pure apart from calling the
// detector and filter engine it was built with, so it runs without a camera
// or a window.

use crate::controls::Snapshot;
use crate::crop::crop_to_aspect;
use crate::detector::{Accuracy, FaceDetector};
use crate::error::Error;
use crate::filter::FilterEngine;
use crate::overlay::{annotate, eye_markers};
use crate::stats::PipelineStats;
use crate::types::{DisplayOrientation, Frame, FrameBuffer, SensorOrientation};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::Arc;

/// One processed frame on its way to the window.
#[derive(Clone, Debug)]
pub struct Presented {
    pub sequence: u64,
    /// Filtered and cropped output; `None` when a stage dropped the frame.
    pub image: Option<FrameBuffer>,
    /// Raw frame after orientation, for the side-by-side preview.
    /// Always present, so the preview keeps moving while frames are dropped.
    pub preview: FrameBuffer,
    pub orientation: DisplayOrientation,
    pub scale: f32,
}

/// Where processed frames go. Best effort: a sink may drop what it gets.
pub trait DisplaySink {
    fn publish(&self, frame: Presented);
}

/// Hand-off to the UI thread. Never blocks; if the UI has not taken the
/// previous frame yet, this one is dropped.
pub struct ChannelSink {
    tx: Sender<Presented>,
    stats: Arc<PipelineStats>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Presented>, stats: Arc<PipelineStats>) -> Self {
        Self { tx, stats }
    }
}

impl DisplaySink for ChannelSink {
    fn publish(&self, frame: Presented) {
        let filtered = frame.image.is_some();
        match self.tx.try_send(frame) {
            Ok(()) if filtered => self.stats.record_presented(),
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.stats.record_sink_drop(),
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("display sink gone; frame discarded");
            }
        }
    }
}

pub struct Pipeline {
    filters: Box<dyn FilterEngine>,
    detector: Box<dyn FaceDetector>,
    stats: Arc<PipelineStats>,
}

impl Pipeline {
    pub fn new(
        filters: Box<dyn FilterEngine>,
        detector: Box<dyn FaceDetector>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self { filters, detector, stats }
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Steps 2-5 for one upright frame against one control snapshot.
    pub fn render(&self, upright: &FrameBuffer, snap: &Snapshot) -> Result<FrameBuffer, Error> {
        // 2) Eye rings, drawn on a copy.
        let mut image = if snap.eye_overlay {
            let faces = self.detector.detect(upright, Accuracy::High)?;
            let markers = eye_markers(&faces, upright.height);
            if markers.is_empty() { upright.clone() } else { annotate(upright, &markers) }
        } else {
            upright.clone()
        };

        // 3) Active filter, if any.
        if let Some(filter) = snap.filter {
            let out = self.filters.apply(&filter, &image)?;
            if (out.width, out.height) != (image.width, image.height) {
                return Err(Error::Filter(format!(
                    "{} returned {}x{} for a {}x{} input",
                    filter.name(),
                    out.width,
                    out.height,
                    image.width,
                    image.height
                )));
            }
            image = out;
        }

        // 4) Fixed 8-bit-per-channel output.
        let image = rasterize(image)?;

        // 5) Center crop to the panel's aspect ratio.
        crop_to_aspect(&image, snap.aspect_ratio)
    }

    /// Run every stage for one frame and publish the result. A frame a
    /// stage rejects is counted and published with its preview only.
    /// Returns whether a filtered image made it to the sink.
    pub fn run_frame(&self, frame: Frame, snap: &Snapshot, sink: &dyn DisplaySink) -> bool {
        let sequence = frame.sequence;
        let captured_at = frame.captured_at;

        // 1) Upright portrait before anything looks at the pixels.
        let preview = to_portrait(frame.buffer, frame.orientation);

        let image = match self.render(&preview, snap) {
            Ok(image) => {
                log::trace!("frame {sequence} ready after {:?}", captured_at.elapsed());
                Some(image)
            }
            Err(e) => {
                log::debug!("frame {sequence} dropped: {e}");
                self.stats.record_failure(&e);
                None
            }
        };
        let filtered = image.is_some();

        // 6) Front camera: mirrored, unrotated, 1:1.
        sink.publish(Presented {
            sequence,
            image,
            preview,
            orientation: DisplayOrientation::UpMirrored,
            scale: 1.0,
        });
        filtered
    }
}

/// Rotate a buffer captured in `orientation` so it reads upright.
pub fn to_portrait(src: FrameBuffer, orientation: SensorOrientation) -> FrameBuffer {
    match orientation {
        SensorOrientation::Portrait => src,
        SensorOrientation::PortraitUpsideDown => {
            let mut out = src;
            out.pixels.reverse();
            out
        }
        SensorOrientation::LandscapeLeft => rotate_cw(&src),
        SensorOrientation::LandscapeRight => rotate_ccw(&src),
    }
}

fn rotate_cw(src: &FrameBuffer) -> FrameBuffer {
    let (w, h) = (src.width, src.height);
    let mut out = FrameBuffer::new(h, w);
    for y in 0..h {
        for x in 0..w {
            // (x, y) -> (h - 1 - y, x)
            out.pixels[x * h + (h - 1 - y)] = src.pixels[y * w + x];
        }
    }
    out
}

fn rotate_ccw(src: &FrameBuffer) -> FrameBuffer {
    let (w, h) = (src.width, src.height);
    let mut out = FrameBuffer::new(h, w);
    for y in 0..h {
        for x in 0..w {
            // (x, y) -> (y, w - 1 - x)
            out.pixels[(w - 1 - x) * h + y] = src.pixels[y * w + x];
        }
    }
    out
}

/// Check the extent and strip anything outside the 0x00RRGGBB channels.
fn rasterize(mut fb: FrameBuffer) -> Result<FrameBuffer, Error> {
    if fb.width == 0 || fb.height == 0 {
        return Err(Error::Rasterize(format!("empty {}x{} image", fb.width, fb.height)));
    }
    if fb.pixels.len() != fb.width * fb.height {
        return Err(Error::Rasterize(format!(
            "{} pixels for a {}x{} image",
            fb.pixels.len(),
            fb.width,
            fb.height
        )));
    }
    for px in &mut fb.pixels {
        *px &= 0x00_FF_FF_FF;
    }
    Ok(fb)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{Controls, FilterMode};
    use crate::crop::AspectRatio;
    use crate::detector::Unavailable;
    use crate::filter::{Filter, SoftwareFilters};
    use crate::overlay::MARKER_COLOR;
    use crate::types::{FaceFeature, Point};
    use crossbeam_channel::bounded;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Returns a fixed list of faces and counts calls.
    struct FixedFaces {
        faces: Vec<FaceFeature>,
        calls: Arc<AtomicUsize>,
    }

    impl FaceDetector for FixedFaces {
        fn detect(
            &self,
            _frame: &FrameBuffer,
            accuracy: Accuracy,
        ) -> Result<Vec<FaceFeature>, Error> {
            assert_eq!(accuracy, Accuracy::High);
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.faces.clone())
        }
    }

    /// Records which filters were applied; output is a solid color.
    struct RecordingFilters {
        applied: Arc<Mutex<Vec<Filter>>>,
    }

    impl FilterEngine for RecordingFilters {
        fn apply(&self, filter: &Filter, src: &FrameBuffer) -> Result<FrameBuffer, Error> {
            self.applied.lock().push(*filter);
            Ok(FrameBuffer::filled(src.width, src.height, 0x00_01_02_03))
        }
    }

    /// Keeps a copy of every filter input.
    #[derive(Default)]
    struct CapturesInput(Arc<Mutex<Vec<FrameBuffer>>>);

    impl FilterEngine for CapturesInput {
        fn apply(&self, _filter: &Filter, src: &FrameBuffer) -> Result<FrameBuffer, Error> {
            self.0.lock().push(src.clone());
            Ok(FrameBuffer::filled(src.width, src.height, 0x00_01_02_03))
        }
    }

    #[derive(Default)]
    struct VecSink(Mutex<Vec<Presented>>);

    impl DisplaySink for VecSink {
        fn publish(&self, frame: Presented) {
            self.0.lock().push(frame);
        }
    }

    fn frame(w: usize, h: usize, color: u32) -> Frame {
        Frame {
            buffer: FrameBuffer::filled(w, h, color),
            sequence: 7,
            captured_at: Instant::now(),
            orientation: SensorOrientation::Portrait,
        }
    }

    fn snap(filter: Option<Filter>, eye_overlay: bool, ratio: f64) -> Snapshot {
        Snapshot { filter, eye_overlay, aspect_ratio: AspectRatio::new(ratio).unwrap() }
    }

    fn one_eye_at(x: f32, y: f32) -> FaceFeature {
        FaceFeature { left_eye: Some(Point { x, y }), right_eye: None }
    }

    fn without_detector(stats: &Arc<PipelineStats>) -> Pipeline {
        Pipeline::new(Box::new(SoftwareFilters::new()), Box::new(Unavailable), stats.clone())
    }

    type Recorded = (Pipeline, Arc<AtomicUsize>, Arc<Mutex<Vec<Filter>>>);

    fn pipeline_with(faces: Vec<FaceFeature>) -> Recorded {
        let calls = Arc::new(AtomicUsize::new(0));
        let applied = Arc::new(Mutex::new(Vec::new()));
        let p = Pipeline::new(
            Box::new(RecordingFilters { applied: applied.clone() }),
            Box::new(FixedFaces { faces, calls: calls.clone() }),
            Arc::new(PipelineStats::new()),
        );
        (p, calls, applied)
    }

    #[test]
    fn crop_taller_than_frame_drops_it() {
        // 640 x 480 at 1.5 needs 960 rows.
        let (p, _, _) = pipeline_with(vec![]);
        let sink = VecSink::default();
        let snap = snap(None, false, 1.5);
        assert!(!p.run_frame(frame(640, 480, 0x00_10_20_30), &snap, &sink));
        assert!(sink.0.lock().iter().all(|out| out.image.is_none()));
        assert_eq!(p.stats().snapshot().crop_dropped, 1);
    }

    #[test]
    fn dropped_frames_still_refresh_the_preview() {
        let stats = Arc::new(PipelineStats::new());
        let p = without_detector(&stats);
        let sink = VecSink::default();

        let mut overlay_on = frame(10, 10, 0x00_11_11_11);
        overlay_on.sequence = 1;
        assert!(!p.run_frame(overlay_on, &snap(None, true, 1.0), &sink));

        let mut too_tall = frame(64, 48, 0x00_22_22_22);
        too_tall.sequence = 2;
        assert!(!p.run_frame(too_tall, &snap(None, false, 1.5), &sink));

        let got = sink.0.lock();
        assert_eq!(got.iter().map(|out| out.sequence).collect::<Vec<_>>(), vec![1, 2]);
        assert!(got.iter().all(|out| out.image.is_none()));
        assert_eq!(got[0].preview, FrameBuffer::filled(10, 10, 0x00_11_11_11));
        assert_eq!(got[1].preview, FrameBuffer::filled(64, 48, 0x00_22_22_22));

        let s = stats.snapshot();
        assert_eq!((s.detector_dropped, s.crop_dropped), (1, 1));
    }

    #[test]
    fn channel_sink_delivers_the_preview_of_a_dropped_frame() {
        let stats = Arc::new(PipelineStats::new());
        let (tx, rx) = bounded(1);
        let sink = ChannelSink::new(tx, stats.clone());
        let p = without_detector(&stats);

        p.run_frame(frame(8, 8, 0x00_33_33_33), &snap(None, true, 1.0), &sink);

        let out = rx.try_recv().expect("preview delivered");
        assert!(out.image.is_none());
        assert_eq!((out.preview.width, out.preview.height), (8, 8));
        // Only filtered frames count as presented.
        assert_eq!(stats.snapshot().presented, 0);
    }

    #[test]
    fn published_frames_are_mirrored_and_unscaled() {
        let (p, _, _) = pipeline_with(vec![]);
        let sink = VecSink::default();
        assert!(p.run_frame(frame(640, 480, 0x00_10_20_30), &snap(None, false, 0.5), &sink));

        let got = sink.0.lock();
        let out = &got[0];
        assert_eq!(out.sequence, 7);
        assert_eq!(out.orientation, DisplayOrientation::UpMirrored);
        assert_eq!(out.scale, 1.0);
        assert_eq!(out.preview, FrameBuffer::filled(640, 480, 0x00_10_20_30));
        assert!(out.image.is_some());
    }

    #[test]
    fn idle_without_overlay_is_a_plain_crop() {
        let (p, calls, applied) = pipeline_with(vec![]);
        let src = FrameBuffer::filled(640, 480, 0x00_10_20_30);
        let out = p.render(&src, &snap(None, false, 0.5)).unwrap();
        assert_eq!((out.width, out.height), (640, 320));
        assert!(out.pixels.iter().all(|&px| px == 0x00_10_20_30));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(applied.lock().is_empty());
    }

    #[test]
    fn sepia_with_no_faces_is_just_sepia() {
        let src = FrameBuffer::filled(64, 48, 0x00_80_80_80);
        let engine = SoftwareFilters::new();
        let sepia = Filter::SepiaTone { intensity: 1.0 };
        let expected = engine.apply(&sepia, &src).unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let p = Pipeline::new(
            Box::new(SoftwareFilters::new()),
            Box::new(FixedFaces { faces: vec![], calls: calls.clone() }),
            Arc::new(PipelineStats::new()),
        );
        let out = p.render(&src, &snap(Some(sepia), true, 0.5)).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!((out.width, out.height), (64, 32));
        // Rows 8..40 of the sepia frame, no rings anywhere.
        assert_eq!(out.pixels[..], expected.pixels[8 * 64..40 * 64]);
        assert!(!out.pixels.contains(&MARKER_COLOR));
    }

    #[test]
    fn overlay_off_never_calls_the_detector() {
        let (p, calls, _) = pipeline_with(vec![one_eye_at(50.0, 50.0)]);
        let out = p.render(&FrameBuffer::new(100, 100), &snap(None, false, 1.0)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!out.pixels.contains(&MARKER_COLOR));
    }

    #[test]
    fn overlay_without_filter_shows_the_rings() {
        let (p, _, _) = pipeline_with(vec![one_eye_at(50.0, 50.0)]);
        let src = FrameBuffer::new(100, 100);
        let out = p.render(&src, &snap(None, true, 1.0)).unwrap();
        // Eye at y=50 from the bottom of a 100-high frame -> ring centered at row 50.
        assert_eq!(out.get(75, 50), MARKER_COLOR);
        // The upright source stays raw.
        assert!(!src.pixels.contains(&MARKER_COLOR));
    }

    #[test]
    fn filter_receives_the_annotated_frame() {
        let inputs = Arc::new(Mutex::new(Vec::new()));
        let p = Pipeline::new(
            Box::new(CapturesInput(inputs.clone())),
            Box::new(FixedFaces {
                faces: vec![one_eye_at(50.0, 50.0)],
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            Arc::new(PipelineStats::new()),
        );
        let edges = Filter::EdgeDetect { intensity: 16.0 };

        let out = p.render(&FrameBuffer::new(100, 100), &snap(Some(edges), true, 1.0)).unwrap();

        let seen = inputs.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].pixels.contains(&MARKER_COLOR));
        assert_eq!(seen[0].get(75, 50), MARKER_COLOR);
        // The filter output replaces the rings.
        assert!(!out.pixels.contains(&MARKER_COLOR));
        drop(seen);

        // Overlay off: the same filter sees a clean frame.
        p.render(&FrameBuffer::new(100, 100), &snap(Some(edges), false, 1.0)).unwrap();
        assert!(!inputs.lock()[1].pixels.contains(&MARKER_COLOR));
    }

    #[test]
    fn edges_toggled_twice_is_never_applied() {
        let mut controls = Controls::new(AspectRatio::new(1.0).unwrap());
        controls.toggle_edges();
        assert_eq!(controls.toggle_edges(), FilterMode::Idle);
        assert_eq!(controls.filter_state().builds(), 1);

        let (p, _, applied) = pipeline_with(vec![]);
        p.render(&FrameBuffer::filled(10, 10, 0x00_44_44_44), &controls.slot().load()).unwrap();
        assert!(applied.lock().is_empty());
    }

    #[test]
    fn unavailable_detector_drops_only_overlay_frames() {
        let stats = Arc::new(PipelineStats::new());
        let p = without_detector(&stats);
        let sink = VecSink::default();

        assert!(!p.run_frame(frame(10, 10, 0), &snap(None, true, 1.0), &sink));
        assert!(p.run_frame(frame(10, 10, 0), &snap(None, false, 1.0), &sink));
        let filtered = sink.0.lock().iter().filter(|out| out.image.is_some()).count();
        assert_eq!(filtered, 1);
        assert_eq!(stats.snapshot().detector_dropped, 1);
    }

    #[test]
    fn wrong_sized_filter_output_is_rejected() {
        struct Shrinks;
        impl FilterEngine for Shrinks {
            fn apply(&self, _filter: &Filter, _src: &FrameBuffer) -> Result<FrameBuffer, Error> {
                Ok(FrameBuffer::new(1, 1))
            }
        }
        let stats = Arc::new(PipelineStats::new());
        let p = Pipeline::new(Box::new(Shrinks), Box::new(Unavailable), stats);
        let sepia = Filter::SepiaTone { intensity: 1.0 };
        let res = p.render(&FrameBuffer::new(10, 10), &snap(Some(sepia), false, 1.0));
        assert!(matches!(res, Err(Error::Filter(_))));
    }

    #[test]
    fn rotations_put_the_top_row_where_expected() {
        // 3 x 2: row 0 = 1 2 3, row 1 = 4 5 6
        let src = FrameBuffer { width: 3, height: 2, pixels: vec![1, 2, 3, 4, 5, 6] };

        let cw = to_portrait(src.clone(), SensorOrientation::LandscapeLeft);
        assert_eq!((cw.width, cw.height), (2, 3));
        assert_eq!(cw.pixels, vec![4, 1, 5, 2, 6, 3]);

        let ccw = to_portrait(src.clone(), SensorOrientation::LandscapeRight);
        assert_eq!(ccw.pixels, vec![3, 6, 2, 5, 1, 4]);

        let flip = to_portrait(src.clone(), SensorOrientation::PortraitUpsideDown);
        assert_eq!(flip.pixels, vec![6, 5, 4, 3, 2, 1]);

        assert_eq!(to_portrait(src.clone(), SensorOrientation::Portrait), src);
    }

    #[test]
    fn rasterize_masks_the_unused_byte() {
        let fb = FrameBuffer { width: 1, height: 1, pixels: vec![0xFF_12_34_56] };
        assert_eq!(rasterize(fb).unwrap().pixels, vec![0x00_12_34_56]);
        assert!(rasterize(FrameBuffer::new(0, 4)).is_err());
    }

    #[test]
    fn channel_sink_drops_when_the_ui_is_busy() {
        let stats = Arc::new(PipelineStats::new());
        let (tx, rx) = bounded(1);
        let sink = ChannelSink::new(tx, stats.clone());
        let (p, _, _) = pipeline_with(vec![]);

        for _ in 0..3 {
            p.run_frame(frame(4, 4, 0), &snap(None, false, 1.0), &sink);
        }
        assert_eq!(rx.try_iter().count(), 1);
        let s = stats.snapshot();
        assert_eq!(s.presented, 1);
        assert_eq!(s.sink_dropped, 2);
    }
}
