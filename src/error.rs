// One error type for the whole app.
// Every variant states *where* things went wrong.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Window init error: {0}")]
    WindowInit(String), // Creating the window failed
    #[error("Window update error: {0}")]
    WindowUpdate(String), // Updating the window buffer failed
    #[error("Camera init error: {0}")]
    CameraInit(String), // Opening/starting the camera failed
    #[error("Camera frame error: {0}")]
    CameraFrame(String), // Grabbing/decoding a frame failed
    #[error("Config error: {0}")]
    Config(String), // Bad command-line flag or value

    // Per-frame failures: the frame is dropped, the next one is unaffected.
    #[error("no face detector is available")]
    DetectorUnavailable,
    #[error("Detector error: {0}")]
    Detector(String),
    #[error("Filter error: {0}")]
    Filter(String),
    #[error("crop {width}x{height} at y={y} does not fit a {src_width}x{src_height} frame")]
    CropOutOfBounds {
        y: i64,
        width: i64,
        height: i64,
        src_width: usize,
        src_height: usize,
    },
    #[error("Rasterize error: {0}")]
    Rasterize(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String), // Writing a PNG snapshot failed
}
