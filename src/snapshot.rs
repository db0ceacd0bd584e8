// Still capture: write the filtered frame to disk as a PNG, oriented the
// way it is shown on screen.

use crate::error::Error;
use crate::pipeline::Presented;
use crate::types::{DisplayOrientation, FrameBuffer};
use std::path::{Path, PathBuf};

/// Apply the display orientation tag to the pixels.
pub fn oriented(image: &FrameBuffer, orientation: DisplayOrientation) -> FrameBuffer {
    match orientation {
        DisplayOrientation::Up => image.clone(),
        DisplayOrientation::UpMirrored => {
            let mut out = image.clone();
            for row in out.pixels.chunks_mut(image.width.max(1)) {
                row.reverse();
            }
            out
        }
    }
}

/// Save the filtered image of `frame` as `snapshot-<sequence>.png` inside `dir`.
pub fn save_snapshot(dir: &Path, frame: &Presented) -> Result<PathBuf, Error> {
    let image = frame
        .image
        .as_ref()
        .ok_or_else(|| Error::Snapshot(format!("frame {} was dropped", frame.sequence)))?;

    std::fs::create_dir_all(dir)
        .map_err(|e| Error::Snapshot(format!("create {}: {e}", dir.display())))?;

    let path = dir.join(format!("snapshot-{:06}.png", frame.sequence));
    oriented(image, frame.orientation)
        .to_rgb_image()
        .save(&path)
        .map_err(|e| Error::Snapshot(format!("write {}: {e}", path.display())))?;
    Ok(path)
}
