// The background processing thread: one frame at a time, one control
// snapshot per frame, results handed to the UI without waiting.

use crate::controls::SnapshotSlot;
use crate::error::Error;
use crate::pipeline::{DisplaySink, Pipeline};
use crate::types::Frame;
use crossbeam_channel::Receiver;
use std::thread::{self, JoinHandle};

/// Run `pipeline` on every frame from `frames` until all senders are gone.
pub fn spawn_pipeline<S>(
    pipeline: Pipeline,
    frames: Receiver<Frame>,
    controls: SnapshotSlot,
    sink: S,
) -> Result<JoinHandle<()>, Error>
where
    S: DisplaySink + Send + 'static,
{
    thread::Builder::new()
        .name("frame-pipeline".to_string())
        .spawn(move || {
            for frame in frames.iter() {
                let snap = controls.load();
                pipeline.run_frame(frame, &snap, &sink);
            }
            let presented = pipeline.stats().snapshot().presented;
            log::info!("frame-pipeline stopped after {presented} frames");
        })
        .map_err(|e| Error::CameraInit(format!("Spawn pipeline thread: {e}")))
}
