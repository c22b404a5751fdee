use std::path::Path;
use std::time::{Duration, Instant};

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;

/// Decodes a video file or an ffmpeg capture device into RGB frames.
///
/// Devices are opened through libavdevice by input format name (`v4l2`,
/// `avfoundation`, `dshow`). Files can be paced at their native frame rate
/// so they behave like a live camera.
pub struct FfmpegFrameSource {
    ictx: Option<ffmpeg_next::format::context::Input>,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    pacing: Option<Pacing>,
}

// Safety: FfmpegFrameSource is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegFrameSource {}

struct Pacing {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Pacing {
    fn wait(&mut self) {
        let now = Instant::now();
        match self.next_due {
            Some(due) if due > now => {
                std::thread::sleep(due - now);
                self.next_due = Some(due + self.interval);
            }
            // First frame, or running late: restart the clock
            _ => self.next_due = Some(now + self.interval),
        }
    }
}

impl FfmpegFrameSource {
    /// Opens a video file. With `realtime` set, frames are released no faster
    /// than the stream's frame rate.
    pub fn open_file(path: &Path, realtime: bool) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let ictx = ffmpeg_next::format::input(path)?;
        log::info!("Opened video file {}", path.display());
        Self::from_input(ictx, realtime)
    }

    /// Opens a capture device such as `/dev/video0` (`v4l2`) or `0`
    /// (`avfoundation`). `options` are passed to the demuxer, e.g.
    /// `framerate` or `video_size`.
    pub fn open_device(
        format_name: &str,
        device: &str,
        options: &[(&str, &str)],
    ) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == format_name)
            .ok_or_else(|| format!("Capture format '{format_name}' is not available"))?;

        let mut dict = ffmpeg_next::Dictionary::new();
        for (key, value) in options {
            dict.set(key, value);
        }
        let ictx = ffmpeg_next::format::open_with(
            device,
            &ffmpeg_next::format::format::Format::Input(format),
            dict,
        )?
        .input();
        log::info!("Opened capture device {device} via {format_name}");
        // Devices deliver at their own rate
        Self::from_input(ictx, false)
    }

    fn from_input(
        ictx: ffmpeg_next::format::context::Input,
        realtime: bool,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let video_stream_index = stream.index();
        let fps = frame_rate(stream.rate());

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let pacing = match (realtime, fps) {
            (true, Some(fps)) => Some(Pacing {
                interval: Duration::from_secs_f64(1.0 / fps),
                next_due: None,
            }),
            _ => None,
        };
        log::debug!("Video stream {width}x{height} at {fps:?} fps, pacing {}", pacing.is_some());

        Ok(Self {
            ictx: Some(ictx),
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            frame_index: 0,
            flushing: false,
            pacing,
        })
    }

    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        self.decoder.receive_frame(&mut decoded).ok()?;

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(Box::new(e)));
        }
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }

    fn decode_next(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        if let Some(result) = self.try_receive() {
            return Some(result);
        }
        if self.flushing {
            self.close();
            return None;
        }

        let mut retries = 0;
        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            let read = packet.read(self.ictx.as_mut()?);
            match classify_read(read) {
                ReadStep::Packet => retries = 0,
                ReadStep::Retry if retries < MAX_READ_RETRIES => {
                    retries += 1;
                    std::thread::sleep(RETRY_DELAY);
                    continue;
                }
                ReadStep::Retry => {
                    return Some(Err(format!(
                        "no data from input after {MAX_READ_RETRIES} attempts"
                    )
                    .into()));
                }
                ReadStep::Failed(e) => return Some(Err(Box::new(e))),
                ReadStep::EndOfStream => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                    let result = self.try_receive();
                    if result.is_none() {
                        self.close();
                    }
                    return result;
                }
            }
            if packet.stream() != self.video_stream_index {
                continue;
            }
            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {e}");
                continue;
            }
            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Attempts to re-read before a source that keeps reporting `EAGAIN` is
/// surfaced as an error.
const MAX_READ_RETRIES: usize = 200;
const RETRY_DELAY: Duration = Duration::from_millis(5);

#[derive(Debug)]
enum ReadStep {
    Packet,
    EndOfStream,
    /// Device has no data yet; read again.
    Retry,
    Failed(ffmpeg_next::Error),
}

/// Only a real end of file ends the stream. Devices report `EAGAIN` between
/// frames and other errors are surfaced so the capture loop can count them.
fn classify_read(result: Result<(), ffmpeg_next::Error>) -> ReadStep {
    match result {
        Ok(()) => ReadStep::Packet,
        Err(ffmpeg_next::Error::Eof) => ReadStep::EndOfStream,
        Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
            ReadStep::Retry
        }
        Err(e) => ReadStep::Failed(e),
    }
}

impl FrameSource for FfmpegFrameSource {
    fn next_frame(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let result = self.decode_next()?;
        if let Some(pacing) = self.pacing.as_mut() {
            pacing.wait();
        }
        Some(result)
    }

    fn close(&mut self) {
        self.ictx = None;
    }
}

fn frame_rate(rate: ffmpeg_next::Rational) -> Option<f64> {
    if rate.denominator() == 0 || rate.numerator() <= 0 {
        return None;
    }
    Some(rate.numerator() as f64 / rate.denominator() as f64)
}

/// Copies pixel data from an ffmpeg frame into a tightly packed RGB buffer,
/// dropping any per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
