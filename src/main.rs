// What you SEE:
// • Left panel: the raw camera preview (mirrored, like a selfie camera).
// • Right panel: the same feed after eye markers + filter, cropped to the panel.
// • S toggles sepia, E toggles edges (one filter at a time), Y toggles eye markers.
// • P saves the filtered frame as PNG, R retries a camera that failed to open, ESC quits.
//
// Threads: camera-capture -> frame-pipeline -> this (UI) thread. Each hop is
// a one-slot channel that drops instead of queueing.

mod camera;
mod config;
mod controls;
mod crop;
mod detector;
mod draw;
mod error;
mod filter;
mod gamma;
mod overlay;
mod pipeline;
mod snapshot;
mod stats;
mod types;
mod worker;

use camera::{CaptureHandle, spawn_capture};
use config::{AppConfig, Command, USAGE};
use controls::{Controls, FilterMode};
use crossbeam_channel::{Sender, bounded};
use detector::{FaceDetector, SeetaFace, Unavailable};
use draw::{Drawer, Layout, compose};
use error::Error;
use filter::SoftwareFilters;
use pipeline::{ChannelSink, Pipeline, Presented};
use stats::PipelineStats;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use types::{Frame, FrameBuffer};

fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = match AppConfig::from_args(std::env::args().skip(1))? {
        Command::Run(cfg) => cfg,
        Command::Help => {
            println!("{USAGE}");
            return Ok(());
        }
    };

    /* --- Window ---
       The aspect ratio is taken from the filtered panel once, right after the
       window exists, and stays fixed for the session. */
    let layout = Layout { panel_width: cfg.panel_width, panel_height: cfg.panel_height };
    let mut drawer = Drawer::new("Video Analysis", layout)?;
    let aspect_ratio = cfg.aspect_ratio()?;
    log::info!(
        "panel {}x{}, crop aspect ratio {:.4}",
        layout.panel_width,
        layout.panel_height,
        aspect_ratio.get()
    );

    let (w, h) = drawer.layout().window_size();
    let mut screen = FrameBuffer::new(w, h);

    /* --- Controls + pipeline thread --- */
    let mut controls = Controls::new(aspect_ratio);
    let stats = Arc::new(PipelineStats::new());

    let detector = load_detector(cfg.face_model.as_deref())?;
    let detector_available = detector.is_available();
    let pipeline = Pipeline::new(Box::new(SoftwareFilters::new()), detector, stats.clone());

    let (frame_tx, frame_rx) = bounded::<Frame>(1);
    let (out_tx, out_rx) = bounded::<Presented>(1);
    let worker = worker::spawn_pipeline(
        pipeline,
        frame_rx,
        controls.slot(),
        ChannelSink::new(out_tx, stats.clone()),
    )?;

    /* --- Camera --- */
    let mut capture = start_camera(&cfg, &frame_tx, &stats);

    /* --- FPS / diagnostics --- */
    let mut last_report = Instant::now();
    let mut shown_this_second: u32 = 0;
    let mut fps = 0.0f32;
    // Raw preview of the newest frame; last frame that made it through every stage.
    let mut preview: Option<FrameBuffer> = None;
    let mut shown: Option<Presented> = None;

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        /* 1) Toggles. Each one publishes a fresh snapshot for the pipeline. */
        if drawer.sepia_pressed_once() {
            let mode = controls.toggle_sepia();
            log_filter(&controls, mode);
        }
        if drawer.edges_pressed_once() {
            let mode = controls.toggle_edges();
            log_filter(&controls, mode);
        }
        if drawer.eyes_pressed_once() {
            let on = controls.toggle_eye_overlay();
            log::info!("eye markers: {}", if on { "on" } else { "off" });
            if on && !detector_available {
                log::warn!("no face model given; frames are dropped while eye markers are on");
            }
        }

        /* 2) Camera retry after a failed start or a dead device. */
        let camera_up = capture.as_ref().is_some_and(CaptureHandle::is_running);
        if !camera_up && drawer.retry_pressed_once() {
            log::info!("retrying camera {}", cfg.capture.index);
            capture = start_camera(&cfg, &frame_tx, &stats);
        }

        /* 3) Newest frame from the pipeline. The preview always moves on;
              the right panel keeps its last good image through drops. */
        if let Some(mut p) = out_rx.try_iter().last() {
            preview = Some(std::mem::take(&mut p.preview));
            if p.image.is_some() {
                shown_this_second += 1;
                shown = Some(p);
            }
        }

        /* 4) Still capture of what the right panel shows. */
        if drawer.snapshot_pressed_once() {
            match &shown {
                Some(p) => match snapshot::save_snapshot(&cfg.snapshot_dir, p) {
                    Ok(path) => log::info!("saved {}", path.display()),
                    Err(e) => log::error!("{e}"),
                },
                None => log::warn!("nothing to save yet"),
            }
        }

        /* 5) Compose + present. */
        let status = status_line(&controls, camera_up, fps, &stats);
        compose(
            &mut screen,
            drawer.layout(),
            preview.as_ref(),
            shown.as_ref().and_then(|p| p.image.as_ref().map(|img| (img, p.orientation))),
            &status,
        );
        drawer.present(&screen)?;

        /* 6) Once per second: FPS + drop counters to the log. */
        let now = Instant::now();
        if now.duration_since(last_report) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_report).as_secs_f32();
            fps = shown_this_second as f32 / secs;
            let s = stats.snapshot();
            log::info!(
                "FPS: {:.1} | captured {} presented {} | dropped: source {} sink {} \
                 detector {} filter {} crop {} rasterize {} other {}",
                fps,
                s.captured,
                s.presented,
                s.source_dropped,
                s.sink_dropped,
                s.detector_dropped,
                s.filter_dropped,
                s.crop_dropped,
                s.rasterize_dropped,
                s.other_dropped
            );
            shown_this_second = 0;
            last_report = now;
        }
    }

    /* --- Teardown: camera first, then let the pipeline drain and exit. --- */
    drop(capture);
    drop(frame_tx);
    if worker.join().is_err() {
        log::error!("frame-pipeline thread panicked");
    }

    Ok(())
}

/// SeetaFace when a model is given, otherwise the placeholder.
fn load_detector(model: Option<&Path>) -> Result<Box<dyn FaceDetector>, Error> {
    match model {
        Some(path) => Ok(Box::new(SeetaFace::load(path)?)),
        None => Ok(Box::new(Unavailable)),
    }
}

/// Open the camera; on failure log why and keep running without one.
fn start_camera(
    cfg: &AppConfig,
    frames: &Sender<Frame>,
    stats: &Arc<PipelineStats>,
) -> Option<CaptureHandle> {
    match spawn_capture(cfg.capture, frames.clone(), stats.clone()) {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::error!("{e} (press R to retry)");
            None
        }
    }
}

fn log_filter(controls: &Controls, mode: FilterMode) {
    let state = controls.filter_state();
    let f = state.stored_filter();
    match state.active_filter() {
        Some(_) => log::info!(
            "filter: {} {} at {} (build #{})",
            mode_label(mode),
            f.name(),
            f.intensity(),
            state.builds()
        ),
        None => log::info!("filter: {} ({} kept, not applied)", mode_label(mode), f.name()),
    }
}

fn mode_label(mode: FilterMode) -> &'static str {
    match mode {
        FilterMode::Idle => "NONE",
        FilterMode::Sepia => "SEPIA",
        FilterMode::Edges => "EDGES",
    }
}

fn status_line(controls: &Controls, camera_up: bool, fps: f32, stats: &PipelineStats) -> String {
    if !camera_up {
        return String::from("NO CAMERA | R: RETRY | ESC: QUIT");
    }
    let s = stats.snapshot();
    format!(
        "FILTER: {} | EYES: {} | FPS: {:.1} | DROPS: {} | S/E/Y TOGGLE  P SAVE",
        mode_label(controls.mode()),
        if controls.eye_overlay() { "ON" } else { "OFF" },
        fps,
        s.pipeline_dropped() + s.source_dropped + s.sink_dropped
    )
}
