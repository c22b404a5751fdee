mod settings;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use facepixel_core::capture::domain::frame_source::FrameSource;
use facepixel_core::capture::infrastructure::ffmpeg_frame_source::FfmpegFrameSource;
use facepixel_core::capture::infrastructure::still_image_source::StillImageSource;
use facepixel_core::detection::domain::face_detector::FaceDetector;
use facepixel_core::detection::infrastructure::model_resolver;
use facepixel_core::detection::infrastructure::onnx_yolo_detector::OnnxYoloDetector;
use facepixel_core::filtering::infrastructure::backend_factory::create_backend;
use facepixel_core::parameters::parameter_store::{Parameters, ParameterStore};
use facepixel_core::pipeline::frame_processor::FrameProcessor;
use facepixel_core::pipeline::frame_sink::{FrameSink, LatestFrameSink};
use facepixel_core::pipeline::infrastructure::live_pipeline::{
    LivePipeline, PipelineStats, StopHandle,
};
use facepixel_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facepixel_core::shared::constants::{
    PipelineTuning, FIXED_PIXELATE_CENTER, IMAGE_EXTENSIONS, YOLO_MODEL_NAME, YOLO_MODEL_URL,
};
use facepixel_core::shared::latest_slot::SlotReceiver;
use facepixel_core::shared::region::PixelAnchor;
use facepixel_core::shared::rendered_frame::RenderedFrame;

use settings::Settings;

/// Live face pixelation for a camera, video file or still image.
///
/// While running, type commands on stdin: `scale <n>`, `padding <p>`,
/// `show`, `quit`.
#[derive(Parser)]
#[command(name = "facepixel")]
struct Cli {
    /// Video file, still image, or capture device name (with --device-format).
    input: String,

    /// Open the input as an ffmpeg capture device (v4l2, avfoundation, dshow).
    #[arg(long)]
    device_format: Option<String>,

    /// Capture size requested from the device, e.g. 1280x720.
    #[arg(long)]
    video_size: Option<String>,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.5")]
    confidence: f64,

    /// Initial pixelation block size (20-400). Defaults to the saved value.
    #[arg(long)]
    scale: Option<f64>,

    /// Initial face padding (0.0-1.5). Defaults to the saved value.
    #[arg(long)]
    padding: Option<f64>,

    /// Where the freshest output frame is written.
    #[arg(long, default_value = "preview.png")]
    preview: PathBuf,

    /// Stop after this many delivered frames.
    #[arg(long)]
    max_frames: Option<usize>,

    /// Times a still image input is replayed.
    #[arg(long, default_value = "1")]
    repeat: usize,

    /// Release video file frames at their native frame rate.
    #[arg(long)]
    realtime: bool,

    /// Do not mirror the output.
    #[arg(long)]
    no_mirror: bool,

    /// Point the pixelation grid is aligned to: `centre` (frame centre),
    /// `fixed` (150,150) or `X,Y` in pixels from the top-left corner.
    #[arg(long, value_parser = parse_anchor, default_value = "centre")]
    pixelate_center: PixelAnchor,

    /// Skip the GPU backend and hardware execution providers.
    #[arg(long)]
    cpu_only: bool,

    /// Settings file (defaults to the user config directory).
    #[arg(long)]
    settings: Option<PathBuf>,
}

/// A line typed on stdin.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Scale(f64),
    Padding(f64),
    Show,
    Quit,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings_path = cli.settings.clone().or_else(Settings::default_path);
    let saved = settings_path
        .as_deref()
        .map(Settings::load_from)
        .unwrap_or_default();
    let initial = Parameters::from(Settings {
        pixel_scale: cli.scale.unwrap_or(saved.pixel_scale),
        face_padding: cli.padding.unwrap_or(saved.face_padding),
    });
    let store = Arc::new(ParameterStore::new(initial));
    let params = store.snapshot();
    log::info!(
        "Pixel scale {}, face padding {}",
        params.pixel_scale,
        params.face_padding
    );

    let source = open_source(&cli)?;
    let detector = build_detector(&cli)?;
    let backend = create_backend(!cli.cpu_only);
    let tuning = PipelineTuning {
        mirror: !cli.no_mirror,
        pixelate_anchor: cli.pixelate_center,
        ..PipelineTuning::default()
    };
    let processor = FrameProcessor::new(detector, backend, Arc::clone(&store), tuning)
        .with_logger(Box::new(StdoutPipelineLogger::default()));

    let stop = StopHandle::new();
    let (latest, preview_rx) = LatestFrameSink::channel();
    let sink = LimitedSink::new(latest, cli.max_frames, stop.clone());
    let preview = spawn_preview_writer(preview_rx, cli.preview.clone());

    let pipeline = LivePipeline::start_with_stop(source, processor, sink, stop.clone())?;
    spawn_command_reader(Arc::clone(&store), stop);

    let stats = pipeline.join();
    if preview.join().is_err() {
        log::error!("Preview writer panicked");
    }
    print_stats(&stats);

    if let Some(path) = settings_path {
        match Settings::from(store.snapshot()).save_to(&path) {
            Ok(()) => log::info!("Settings saved to {}", path.display()),
            Err(e) => log::warn!("Could not save settings to {}: {e}", path.display()),
        }
    }
    Ok(())
}

fn open_source(cli: &Cli) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    if let Some(format) = &cli.device_format {
        let mut options = Vec::new();
        if let Some(size) = &cli.video_size {
            options.push(("video_size", size.as_str()));
        }
        return Ok(Box::new(FfmpegFrameSource::open_device(
            format, &cli.input, &options,
        )?));
    }

    let path = Path::new(&cli.input);
    if is_image(path) {
        Ok(Box::new(StillImageSource::open(path, cli.repeat)?))
    } else {
        Ok(Box::new(FfmpegFrameSource::open_file(path, cli.realtime)?))
    }
}

fn build_detector(cli: &Cli) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {YOLO_MODEL_NAME}");
    let progress = ProgressLine::default();
    let model_path = model_resolver::resolve(
        YOLO_MODEL_NAME,
        YOLO_MODEL_URL,
        None,
        Some(progress.callback()),
    );
    progress.finish();
    let model_path = model_path?;

    Ok(Box::new(OnnxYoloDetector::new(
        &model_path,
        cli.confidence,
        !cli.cpu_only,
    )?))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.device_format.is_none() && !Path::new(&cli.input).exists() {
        return Err(format!("Input file not found: {}", cli.input).into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.max_frames == Some(0) {
        return Err("--max-frames must be at least 1".into());
    }
    if cli.repeat == 0 {
        return Err("--repeat must be at least 1".into());
    }
    Ok(())
}

fn parse_anchor(value: &str) -> Result<PixelAnchor, String> {
    match value.trim().to_lowercase().as_str() {
        "centre" | "center" => return Ok(PixelAnchor::FrameCentre),
        "fixed" => return Ok(FIXED_PIXELATE_CENTER),
        _ => {}
    }
    let coord = |part: Option<&str>| -> Result<f64, String> {
        part.map(str::trim)
            .and_then(|p| p.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("expected centre, fixed or X,Y, got '{value}'"))
    };
    let mut parts = value.split(',');
    let x = coord(parts.next())?;
    let y = coord(parts.next())?;
    if parts.next().is_some() {
        return Err(format!("expected centre, fixed or X,Y, got '{value}'"));
    }
    Ok(PixelAnchor::Point { x, y })
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Forwards to the preview slot and requests a stop after `limit` frames.
struct LimitedSink {
    inner: LatestFrameSink,
    limit: Option<usize>,
    delivered: usize,
    stop: StopHandle,
}

impl LimitedSink {
    fn new(inner: LatestFrameSink, limit: Option<usize>, stop: StopHandle) -> Self {
        Self {
            inner,
            limit,
            delivered: 0,
            stop,
        }
    }
}

impl FrameSink for LimitedSink {
    fn deliver(&mut self, frame: RenderedFrame) {
        self.inner.deliver(frame);
        self.delivered += 1;
        if self.limit == Some(self.delivered) {
            log::info!("Reached {} frames, stopping", self.delivered);
            self.stop.stop();
        }
    }
}

/// The presentation side: keeps the preview file showing the newest frame.
fn spawn_preview_writer(
    rx: SlotReceiver<RenderedFrame>,
    path: PathBuf,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut written = 0usize;
        while let Some(frame) = rx.recv() {
            match frame.image.save(&path) {
                Ok(()) => written += 1,
                Err(e) => log::warn!("Failed to write preview {}: {e}", path.display()),
            }
        }
        log::info!(
            "Wrote {written} previews to {} ({} skipped)",
            path.display(),
            rx.evicted()
        );
    })
}

/// Reads slider commands from stdin. Runs detached: end of input only ends
/// this reader, never the pipeline.
fn spawn_command_reader(store: Arc<ParameterStore>, stop: StopHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Ok(None) => {}
                Ok(Some(command)) => {
                    println!("{}", apply_command(&store, &stop, command));
                    if command == Command::Quit {
                        break;
                    }
                }
                Err(e) => println!("{e}"),
            }
        }
    });
}

fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok(None);
    };
    let value = parts.next();
    if parts.next().is_some() {
        return Err(format!("Too many arguments: {line}"));
    }

    let number = |name: &str| -> Result<f64, String> {
        value
            .ok_or_else(|| format!("Usage: {name} <value>"))?
            .parse::<f64>()
            .map_err(|_| format!("Not a number: {}", value.unwrap_or_default()))
    };

    match verb.to_lowercase().as_str() {
        "scale" => number("scale").map(|v| Some(Command::Scale(v))),
        "padding" => number("padding").map(|v| Some(Command::Padding(v))),
        "show" if value.is_none() => Ok(Some(Command::Show)),
        "quit" | "exit" if value.is_none() => Ok(Some(Command::Quit)),
        _ => Err(format!(
            "Unknown command: {line} (expected scale <n>, padding <p>, show, quit)"
        )),
    }
}

/// Applies a command and returns the line echoed back to the user.
fn apply_command(store: &ParameterStore, stop: &StopHandle, command: Command) -> String {
    match command {
        Command::Scale(v) => format!("pixel scale = {}", store.set_pixel_scale(v)),
        Command::Padding(v) => format!("face padding = {}", store.set_face_padding(v)),
        Command::Show => {
            let p = store.snapshot();
            format!(
                "pixel scale = {}, face padding = {}",
                p.pixel_scale, p.face_padding
            )
        }
        Command::Quit => {
            stop.stop();
            "stopping".to_string()
        }
    }
}

fn print_stats(stats: &PipelineStats) {
    eprintln!(
        "Captured {} frames ({} read errors), processed {}, delivered {}, dropped {}, skipped {}",
        stats.captured,
        stats.capture_errors,
        stats.processed,
        stats.delivered,
        stats.dropped,
        stats.evicted
    );
}

/// Model download progress on stderr.
#[derive(Default)]
struct ProgressLine {
    started: Arc<AtomicBool>,
}

impl ProgressLine {
    fn callback(&self) -> model_resolver::ProgressFn {
        let started = Arc::clone(&self.started);
        Box::new(move |downloaded, total| {
            started.store(true, Ordering::Relaxed);
            download_progress(downloaded, total);
        })
    }

    /// Terminates the progress line if anything was printed. Returns whether
    /// it was.
    fn finish(&self) -> bool {
        let started = self.started.load(Ordering::Relaxed);
        if started {
            eprintln!();
        }
        started
    }
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use rstest::rstest;

    #[rstest]
    #[case("scale 120", Command::Scale(120.0))]
    #[case("  padding 0.4 ", Command::Padding(0.4))]
    #[case("SCALE 7.5", Command::Scale(7.5))]
    #[case("show", Command::Show)]
    #[case("quit", Command::Quit)]
    #[case("exit", Command::Quit)]
    fn test_parse_command(#[case] line: &str, #[case] expected: Command) {
        assert_eq!(parse_command(line), Ok(Some(expected)));
    }

    #[rstest]
    #[case("scale")]
    #[case("scale big")]
    #[case("padding 1 2")]
    #[case("show 3")]
    #[case("zoom 2")]
    fn test_parse_command_rejects(#[case] line: &str) {
        assert!(parse_command(line).is_err());
    }

    #[test]
    fn test_blank_line_is_ignored() {
        assert_eq!(parse_command("   "), Ok(None));
    }

    #[test]
    fn test_setters_echo_clamped_values() {
        let store = ParameterStore::default();
        let stop = StopHandle::new();
        assert_eq!(
            apply_command(&store, &stop, Command::Scale(5.0)),
            "pixel scale = 20"
        );
        assert_eq!(
            apply_command(&store, &stop, Command::Padding(9.0)),
            "face padding = 1.5"
        );
        assert_eq!(
            apply_command(&store, &stop, Command::Show),
            "pixel scale = 20, face padding = 1.5"
        );
        assert!(!stop.is_stopped());
    }

    #[test]
    fn test_quit_requests_stop() {
        let store = ParameterStore::default();
        let stop = StopHandle::new();
        apply_command(&store, &stop, Command::Quit);
        assert!(stop.is_stopped());
    }

    #[test]
    fn test_limited_sink_stops_at_limit() {
        let stop = StopHandle::new();
        let (latest, rx) = LatestFrameSink::channel();
        let mut sink = LimitedSink::new(latest, Some(2), stop.clone());
        let frame = |sequence| RenderedFrame {
            image: DynamicImage::new_rgb8(1, 1),
            sequence,
        };

        sink.deliver(frame(1));
        assert!(!stop.is_stopped());
        sink.deliver(frame(2));
        assert!(stop.is_stopped());
        assert_eq!(rx.try_recv().map(|f| f.sequence), Some(2));
    }

    #[rstest]
    #[case("photo.JPG", true)]
    #[case("clip.mp4", false)]
    #[case("noext", false)]
    fn test_is_image(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_image(Path::new(name)), expected);
    }

    #[rstest]
    #[case("centre", PixelAnchor::FrameCentre)]
    #[case("Center", PixelAnchor::FrameCentre)]
    #[case("fixed", FIXED_PIXELATE_CENTER)]
    #[case("150,150", PixelAnchor::Point { x: 150.0, y: 150.0 })]
    #[case(" 12.5 , -4 ", PixelAnchor::Point { x: 12.5, y: -4.0 })]
    fn test_parse_anchor(#[case] value: &str, #[case] expected: PixelAnchor) {
        assert_eq!(parse_anchor(value), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("150")]
    #[case("1,2,3")]
    #[case("x,2")]
    #[case("inf,2")]
    fn test_parse_anchor_rejects(#[case] value: &str) {
        assert!(parse_anchor(value).is_err());
    }

    #[test]
    fn test_anchor_defaults_to_frame_centre() {
        let cli = Cli::try_parse_from(["facepixel", "in.mp4"]).unwrap();
        assert_eq!(cli.pixelate_center, PixelAnchor::FrameCentre);
    }

    #[test]
    fn test_progress_line_untouched_without_download() {
        let progress = ProgressLine::default();
        let _callback = progress.callback();
        assert!(!progress.finish());
    }

    #[test]
    fn test_progress_line_finished_after_download() {
        let progress = ProgressLine::default();
        (progress.callback())(512, 1024);
        assert!(progress.finish());
    }
}
