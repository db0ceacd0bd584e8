// Opens a camera on its own thread and pushes frames to the pipeline.
// The capture thread never waits on the pipeline: if the previous frame has
// not been picked up yet, the new one is dropped and counted.

use crate::error::Error;
use crate::stats::PipelineStats;
use crate::types::{Frame, FrameBuffer, SensorOrientation};
use crossbeam_channel::{Sender, TrySendError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

// Bring in nokhwa types for camera control.
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

/// Give up on the device after this many failed grabs in a row.
const MAX_CONSECUTIVE_FRAME_ERRORS: u32 = 30;

/// What to ask the camera for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSettings {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub orientation: SensorOrientation,
}

// A small wrapper around nokhwa::Camera so the capture loop stays clean.
pub struct CameraCapture {
    cam: Camera,
    width: u32,
    height: u32,
}

impl CameraCapture {
    /// Open camera `index` near the requested resolution (falls back if not exact).
    pub fn new(index: u32, width: u32, height: u32, fps: u32) -> Result<Self, Error> {
        let idx = CameraIndex::Index(index);

        let fmt = CameraFormat::new(
            Resolution::new(width, height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            fps,
        );

        // Ask for RGB frames at the closest format the device offers.
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("Create camera {index}: {e}")))?;

        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // The actual stream might choose a slightly different resolution.
        let actual = cam.resolution();

        Ok(Self {
            cam,
            width: actual.width(),
            height: actual.height(),
        })
    }

    /// Grab one frame and pack it as 0x00RRGGBB pixels.
    /// Blocks until the device has a new frame.
    pub fn next_frame(&mut self) -> Result<FrameBuffer, Error> {
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;

        let rgb_img = frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))?;

        let (w, h) = rgb_img.dimensions();
        Ok(FrameBuffer::from_rgb_bytes(w as usize, h as usize, rgb_img.as_raw()))
    }

    /// Report the actual resolution the camera is delivering.
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Running capture thread. Dropping it stops the thread.
pub struct CaptureHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// Whether the thread is still delivering frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            if t.join().is_err() {
                log::error!("camera-capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open the camera on a dedicated thread and start streaming into `tx`.
/// Returns once the device is open, or with the reason it could not be.
pub fn spawn_capture(
    settings: CaptureSettings,
    tx: Sender<Frame>,
    stats: Arc<PipelineStats>,
) -> Result<CaptureHandle, Error> {
    let running = Arc::new(AtomicBool::new(true));
    let (ready_tx, ready_rx) = bounded::<Result<(u32, u32), Error>>(1);

    let running_thread = running.clone();
    let thread = thread::Builder::new()
        .name("camera-capture".to_string())
        .spawn(move || {
            // The device handle stays on this thread for its whole life.
            let opened = CameraCapture::new(
                settings.index,
                settings.width,
                settings.height,
                settings.fps,
            );
            let mut cam = match opened {
                Ok(cam) => {
                    let _ = ready_tx.send(Ok(cam.resolution()));
                    cam
                }
                Err(e) => {
                    running_thread.store(false, Ordering::Relaxed);
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            capture_loop(&mut cam, settings.orientation, &tx, &stats, &running_thread);
            running_thread.store(false, Ordering::Relaxed);
            log::info!("camera-capture stopped");
        })
        .map_err(|e| Error::CameraInit(format!("Spawn capture thread: {e}")))?;

    let resolution = ready_rx
        .recv()
        .map_err(|_| Error::CameraInit("capture thread exited during startup".into()))??;

    log::info!(
        "camera {} streaming at {}x{} ({:?})",
        settings.index,
        resolution.0,
        resolution.1,
        settings.orientation
    );

    Ok(CaptureHandle { running, thread: Some(thread) })
}

fn capture_loop(
    cam: &mut CameraCapture,
    orientation: SensorOrientation,
    tx: &Sender<Frame>,
    stats: &PipelineStats,
    running: &AtomicBool,
) {
    let mut sequence = 0u64;
    let mut consecutive_errors = 0u32;

    while running.load(Ordering::Relaxed) {
        let buffer = match cam.next_frame() {
            Ok(buffer) => {
                consecutive_errors = 0;
                buffer
            }
            Err(e) => {
                consecutive_errors += 1;
                log::warn!("{e}");
                if consecutive_errors >= MAX_CONSECUTIVE_FRAME_ERRORS {
                    log::error!(
                        "camera failed {consecutive_errors} times in a row; stopping capture"
                    );
                    return;
                }
                continue;
            }
        };

        stats.record_captured();
        let frame = Frame { buffer, sequence, captured_at: Instant::now(), orientation };
        sequence += 1;

        if !offer(tx, frame, stats) {
            return;
        }
    }
}

/// Hand `frame` to the pipeline without waiting. A busy pipeline costs the
/// frame (counted as a source drop). Returns `false` once the pipeline is gone.
fn offer(tx: &Sender<Frame>, frame: Frame, stats: &PipelineStats) -> bool {
    match tx.try_send(frame) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            stats.record_source_drop();
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}
