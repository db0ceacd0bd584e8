// Command-line configuration. Every flag has a default, so running with no
// arguments opens camera 0 at 1280x720.

use crate::camera::CaptureSettings;
use crate::crop::AspectRatio;
use crate::error::Error;
use crate::types::SensorOrientation;
use std::path::PathBuf;

pub const USAGE: &str = "Usage: video-analysis [--camera <index>] [--width <px>] \
[--height <px>] [--fps <n>] [--panel <WxH>] \
[--orientation <portrait|upside-down|landscape-left|landscape-right>] \
[--snapshot-dir <dir>] [--face-model <seeta_fd_frontal_v1.0.bin>]\n\n\
Keys: S sepia, E edges, Y eye markers, P save snapshot, R retry camera, ESC quit";

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub capture: CaptureSettings,
    /// Size of each of the two window panels (preview, filtered).
    pub panel_width: usize,
    pub panel_height: usize,
    pub snapshot_dir: PathBuf,
    /// SeetaFace model for eye markers; without one the overlay drops frames.
    pub face_model: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capture: CaptureSettings {
                index: 0,
                width: 1280,
                height: 720,
                fps: 30,
                orientation: SensorOrientation::Portrait,
            },
            panel_width: 640,
            panel_height: 360,
            snapshot_dir: PathBuf::from("."),
            face_model: None,
        }
    }
}

/// What `main` should do after parsing.
#[derive(Debug, PartialEq)]
pub enum Command {
    Run(AppConfig),
    Help,
}

impl AppConfig {
    /// Parse `args` (without the program name).
    pub fn from_args<I, S>(args: I) -> Result<Command, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cfg = AppConfig::default();
        let mut args = args.into_iter();

        while let Some(flag) = args.next() {
            let flag = flag.as_ref();
            if flag == "--help" || flag == "-h" {
                return Ok(Command::Help);
            }
            let value = args
                .next()
                .ok_or_else(|| Error::Config(format!("{flag} requires a value")))?;
            let value = value.as_ref();

            match flag {
                "--camera" => cfg.capture.index = parse_num(flag, value)?,
                "--width" => cfg.capture.width = parse_positive(flag, value)?,
                "--height" => cfg.capture.height = parse_positive(flag, value)?,
                "--fps" => cfg.capture.fps = parse_positive(flag, value)?,
                "--panel" => {
                    let (w, h) = parse_size(value)?;
                    cfg.panel_width = w;
                    cfg.panel_height = h;
                }
                "--orientation" => cfg.capture.orientation = parse_orientation(value)?,
                "--snapshot-dir" => cfg.snapshot_dir = PathBuf::from(value),
                "--face-model" => cfg.face_model = Some(PathBuf::from(value)),
                other => return Err(Error::Config(format!("unknown flag {other:?}\n{USAGE}"))),
            }
        }

        Ok(Command::Run(cfg))
    }

    /// Height/width of the filtered panel; fixed for the whole session.
    pub fn aspect_ratio(&self) -> Result<AspectRatio, Error> {
        let (w, h) = (self.panel_width, self.panel_height);
        AspectRatio::of_surface(w, h)
            .ok_or_else(|| Error::Config(format!("panel {w}x{h} has no aspect ratio")))
    }
}

fn parse_num(flag: &str, value: &str) -> Result<u32, Error> {
    value
        .parse::<u32>()
        .map_err(|e| Error::Config(format!("{flag} {value:?}: {e}")))
}

fn parse_positive(flag: &str, value: &str) -> Result<u32, Error> {
    match parse_num(flag, value)? {
        0 => Err(Error::Config(format!("{flag} must be greater than zero"))),
        n => Ok(n),
    }
}

fn parse_size(value: &str) -> Result<(usize, usize), Error> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| Error::Config(format!("--panel expects WxH, got {value:?}")))?;
    let w = parse_positive("--panel", w)? as usize;
    let h = parse_positive("--panel", h)? as usize;
    Ok((w, h))
}

fn parse_orientation(value: &str) -> Result<SensorOrientation, Error> {
    match value {
        "portrait" => Ok(SensorOrientation::Portrait),
        "upside-down" => Ok(SensorOrientation::PortraitUpsideDown),
        "landscape-left" => Ok(SensorOrientation::LandscapeLeft),
        "landscape-right" => Ok(SensorOrientation::LandscapeRight),
        other => Err(Error::Config(format!("unknown orientation {other:?}"))),
    }
}
