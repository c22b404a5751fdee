use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::capture::domain::frame_source::FrameSource;
use crate::capture::infrastructure::capture_thread::CaptureThread;
use crate::pipeline::frame_processor::FrameProcessor;
use crate::pipeline::frame_sink::FrameSink;
use crate::shared::frame::Frame;
use crate::shared::latest_slot::{latest_slot, SlotReceiver};

/// How often the processing thread re-checks the stop flag while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Counters reported when the pipeline is joined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub captured: usize,
    pub capture_errors: usize,
    /// Frames that entered processing.
    pub processed: usize,
    pub delivered: usize,
    /// Frames lost to a backend failure.
    pub dropped: usize,
    /// Frames replaced in the handoff before processing picked them up.
    pub evicted: usize,
}

#[derive(Default)]
struct ProcessingReport {
    processed: usize,
    delivered: usize,
    dropped: usize,
}

/// Cloneable request to stop a running pipeline.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Capture and processing on two threads joined by a single-slot handoff.
///
/// Layout: `source → capture thread → [latest slot] → processing thread → sink`
///
/// Capture never waits on processing; when processing is busy the waiting
/// frame is replaced by the newer one. A stop request is honoured before each
/// new frame, so the frame in flight always completes.
pub struct LivePipeline {
    stop: StopHandle,
    capture: CaptureThread,
    processing: JoinHandle<ProcessingReport>,
    evicted: Arc<AtomicUsize>,
}

impl LivePipeline {
    pub fn start(
        source: Box<dyn FrameSource>,
        processor: FrameProcessor,
        sink: impl FrameSink + 'static,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        Self::start_with_stop(source, processor, sink, StopHandle::new())
    }

    /// Like [`start`](Self::start), but observing a stop handle created
    /// beforehand, e.g. one already captured by the sink.
    pub fn start_with_stop(
        source: Box<dyn FrameSource>,
        mut processor: FrameProcessor,
        sink: impl FrameSink + 'static,
        stop: StopHandle,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let (tx, rx) = latest_slot::<Frame>();
        let evicted = rx.eviction_counter();

        processor.info(&format!(
            "Starting live pipeline on the {} backend",
            processor.backend_name()
        ));
        let processing = {
            let stop = stop.clone();
            std::thread::Builder::new()
                .name("facepixel-process".into())
                .spawn(move || run_processing(rx, processor, sink, stop))?
        };
        let capture = CaptureThread::spawn(source, tx, stop.flag.clone());

        Ok(Self {
            stop,
            capture,
            processing,
            evicted,
        })
    }

    /// Requests a stop. Returns immediately; use [`join`](Self::join) to wait.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// True once both threads have exited.
    pub fn is_finished(&self) -> bool {
        self.processing.is_finished() && self.capture.is_finished()
    }

    /// Waits for both threads and returns the run's counters.
    pub fn join(self) -> PipelineStats {
        let report = self.processing.join().unwrap_or_else(|_| {
            log::error!("Processing thread panicked");
            ProcessingReport::default()
        });
        // Processing is gone; make sure capture does not outlive it
        self.stop.stop();
        let capture = self.capture.join();

        let stats = PipelineStats {
            captured: capture.captured,
            capture_errors: capture.errors,
            processed: report.processed,
            delivered: report.delivered,
            dropped: report.dropped,
            evicted: self.evicted.load(Ordering::Relaxed),
        };
        log::info!(
            "Pipeline stopped: {} captured, {} processed, {} delivered, {} dropped, {} evicted",
            stats.captured,
            stats.processed,
            stats.delivered,
            stats.dropped,
            stats.evicted
        );
        stats
    }
}

fn run_processing(
    rx: SlotReceiver<Frame>,
    mut processor: FrameProcessor,
    mut sink: impl FrameSink,
    stop: StopHandle,
) -> ProcessingReport {
    let mut report = ProcessingReport::default();
    while !stop.is_stopped() {
        let frame = match rx.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        // A stop that arrived while waiting wins over the new frame
        if stop.is_stopped() {
            break;
        }

        report.processed += 1;
        match processor.process(&frame) {
            Some(rendered) => {
                sink.deliver(rendered);
                report.delivered += 1;
            }
            None => report.dropped += 1,
        }
    }
    stop.stop();
    processor.summary();
    report
}
