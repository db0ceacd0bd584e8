// Face / eye landmark detection seam.
// The pipeline only needs eye positions; whatever backend finds them plugs
// in behind `FaceDetector`.

use crate::error::Error;
use crate::types::{FaceFeature, FrameBuffer, Point};
use crossbeam_channel::{Sender, bounded};
use image::DynamicImage;
use std::path::Path;
use std::thread;

/// Speed/quality hint passed to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Accuracy {
    High,
}

/// Finds faces in a frame. Eye coordinates are in image space with the
/// origin at the bottom-left corner.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &FrameBuffer, accuracy: Accuracy)
    -> Result<Vec<FaceFeature>, Error>;

    /// Whether `detect` can ever succeed. The UI uses this to warn early.
    fn is_available(&self) -> bool {
        true
    }
}

/// Placeholder used when no face model was configured.
/// Every call fails, so frames are dropped while the eye overlay is on.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unavailable;

impl FaceDetector for Unavailable {
    fn detect(
        &self,
        _frame: &FrameBuffer,
        _accuracy: Accuracy,
    ) -> Result<Vec<FaceFeature>, Error> {
        Err(Error::DetectorUnavailable)
    }

    fn is_available(&self) -> bool {
        false
    }
}

/* ----------------------------- SeetaFace ----------------------------- */

// Eye centers relative to a SeetaFace frontal box (top-left origin).
const EYE_INSET: f32 = 0.30;
const EYE_LINE: f32 = 0.38;

const MIN_FACE_SIZE: u32 = 40;
const SCORE_THRESHOLD: f64 = 2.0;
const PYRAMID_SCALE: f32 = 0.8;

/// Face box as reported by the detector, top-left origin, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
struct FaceBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

struct Request {
    gray: Vec<u8>,
    width: u32,
    height: u32,
    step: u32,
    reply: Sender<Vec<FaceBox>>,
}

/// Frontal face detector backed by `rustface` and a SeetaFace model file
/// (`seeta_fd_frontal_v1.0.bin`). The detector itself lives on a
/// `face-detector` thread; `detect` hands it a grayscale copy and waits.
/// Eye points are placed at fixed positions inside each face box.
pub struct SeetaFace {
    requests: Sender<Request>,
}

impl SeetaFace {
    /// Load the model on the detector thread. Returns once it is ready,
    /// or with the reason it could not be loaded.
    pub fn load(model: &Path) -> Result<Self, Error> {
        let path = model
            .to_str()
            .ok_or_else(|| Error::Detector(format!("model path {} is not UTF-8", model.display())))?
            .to_string();

        let (ready_tx, ready_rx) = bounded::<Result<(), Error>>(1);
        let (requests, rx) = bounded::<Request>(1);

        thread::Builder::new()
            .name("face-detector".to_string())
            .spawn(move || {
                let mut detector = match rustface::create_detector(&path) {
                    Ok(d) => {
                        let _ = ready_tx.send(Ok(()));
                        d
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(Error::Detector(format!("load {path}: {e}"))));
                        return;
                    }
                };
                detector.set_min_face_size(MIN_FACE_SIZE);
                detector.set_score_thresh(SCORE_THRESHOLD);
                detector.set_pyramid_scale_factor(PYRAMID_SCALE);

                // Ends when the owning `SeetaFace` is dropped.
                for req in rx.iter() {
                    detector.set_slide_window_step(req.step, req.step);
                    let mut image = rustface::ImageData::new(&req.gray, req.width, req.height);
                    let faces: Vec<FaceBox> = detector
                        .detect(&mut image)
                        .iter()
                        .map(|face| {
                            let b = face.bbox();
                            FaceBox {
                                x: b.x() as f32,
                                y: b.y() as f32,
                                width: b.width() as f32,
                                height: b.height() as f32,
                            }
                        })
                        .collect();
                    let _ = req.reply.send(faces);
                }
            })
            .map_err(|e| Error::Detector(format!("Spawn detector thread: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| Error::Detector("detector thread exited during startup".into()))??;

        log::info!("face model loaded from {}", model.display());
        Ok(Self { requests })
    }
}

impl FaceDetector for SeetaFace {
    fn detect(
        &self,
        frame: &FrameBuffer,
        accuracy: Accuracy,
    ) -> Result<Vec<FaceFeature>, Error> {
        let gone = || Error::Detector("face-detector thread stopped".into());

        let (reply, replies) = bounded(1);
        let req = Request {
            gray: luma(frame),
            width: frame.width as u32,
            height: frame.height as u32,
            step: window_step(accuracy),
            reply,
        };
        self.requests.send(req).map_err(|_| gone())?;
        let boxes = replies.recv().map_err(|_| gone())?;

        Ok(boxes.iter().map(|b| eyes_in_box(b, frame.height)).collect())
    }
}

fn window_step(accuracy: Accuracy) -> u32 {
    match accuracy {
        Accuracy::High => 4,
    }
}

/// 8-bit grayscale copy, row-major, as the detector expects.
fn luma(frame: &FrameBuffer) -> Vec<u8> {
    DynamicImage::ImageRgb8(frame.to_rgb_image()).into_luma8().into_raw()
}

/// Eye estimate for one face box, flipped to a bottom-left origin.
fn eyes_in_box(b: &FaceBox, frame_height: usize) -> FaceFeature {
    let eye_y = frame_height as f32 - (b.y + b.height * EYE_LINE);
    FaceFeature {
        left_eye: Some(Point { x: b.x + b.width * EYE_INSET, y: eye_y }),
        right_eye: Some(Point { x: b.x + b.width * (1.0 - EYE_INSET), y: eye_y }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::eye_markers;

    #[test]
    fn unavailable_always_fails() {
        let d = Unavailable;
        assert!(!d.is_available());
        assert!(matches!(
            d.detect(&FrameBuffer::new(4, 4), Accuracy::High),
            Err(Error::DetectorUnavailable)
        ));
    }

    #[test]
    fn eyes_sit_on_the_upper_part_of_the_box() {
        let b = FaceBox { x: 100.0, y: 50.0, width: 100.0, height: 100.0 };
        let face = eyes_in_box(&b, 400);

        let left = face.left_eye.unwrap();
        let right = face.right_eye.unwrap();
        assert!((left.x - 130.0).abs() < 1e-3);
        assert!((right.x - 170.0).abs() < 1e-3);
        // 50 + 38 rows from the top of a 400-row frame.
        assert!((left.y - 312.0).abs() < 1e-3);
        assert_eq!(left.y, right.y);
    }

    #[test]
    fn estimated_eyes_land_back_inside_the_box() {
        let b = FaceBox { x: 100.0, y: 50.0, width: 100.0, height: 100.0 };
        let markers = eye_markers(&[eyes_in_box(&b, 400)], 400);
        assert_eq!(markers.len(), 2);
        for m in markers {
            let (cx, cy) = m.center();
            assert!(cx > 100.0 && cx < 200.0, "{cx}");
            assert!(cy > 50.0 && cy < 150.0, "{cy}");
        }
    }

    #[test]
    fn luma_is_one_byte_per_pixel() {
        let frame = FrameBuffer { width: 2, height: 1, pixels: vec![0x00_FF_FF_FF, 0] };
        assert_eq!(luma(&frame), vec![255, 0]);
    }

    #[test]
    fn missing_model_file_fails_to_load() {
        let path = std::env::temp_dir().join("video-analysis-no-such-model.bin");
        assert!(matches!(SeetaFace::load(&path), Err(Error::Detector(_))));
    }
}
