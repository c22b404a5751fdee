use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::capture::domain::frame_source::FrameSource;
use crate::shared::frame::Frame;
use crate::shared::latest_slot::SlotSender;

/// Consecutive decode failures after which the source is treated as dead.
const MAX_CONSECUTIVE_ERRORS: usize = 30;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureReport {
    pub captured: usize,
    pub errors: usize,
}

/// Drives a [`FrameSource`] on its own thread, publishing every frame into a
/// single-slot handoff so a slow consumer only ever sees the newest frame.
pub struct CaptureThread {
    handle: JoinHandle<CaptureReport>,
}

impl CaptureThread {
    /// Starts capturing. The loop ends at end of stream, when `stop` is set,
    /// when the consumer goes away, or after too many consecutive errors.
    pub fn spawn(
        mut source: Box<dyn FrameSource>,
        slot: SlotSender<Frame>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        let handle = std::thread::spawn(move || {
            let mut report = CaptureReport::default();
            let mut consecutive_errors = 0;
            while !stop.load(Ordering::Relaxed) {
                match source.next_frame() {
                    None => {
                        log::info!("Frame source ended after {} frames", report.captured);
                        break;
                    }
                    Some(Ok(frame)) => {
                        consecutive_errors = 0;
                        report.captured += 1;
                        if !slot.publish(frame) {
                            log::debug!("Frame consumer gone, stopping capture");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        report.errors += 1;
                        consecutive_errors += 1;
                        log::warn!("Failed to read frame: {e}");
                        if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                            log::error!("Giving up after {consecutive_errors} consecutive read errors");
                            break;
                        }
                    }
                }
            }
            source.close();
            report
        });
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> CaptureReport {
        self.handle.join().unwrap_or_else(|_| {
            log::error!("Capture thread panicked");
            CaptureReport::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::infrastructure::still_image_source::StillImageSource;
    use crate::shared::latest_slot::latest_slot;

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn next_frame(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
            Some(Err("device unplugged".into()))
        }

        fn close(&mut self) {}
    }

    #[test]
    fn test_delivers_until_end_of_stream() {
        let (tx, rx) = latest_slot();
        let source = StillImageSource::new(Frame::filled(4, 4, 3, 0, 0), 5);
        let thread = CaptureThread::spawn(Box::new(source), tx, Arc::new(AtomicBool::new(false)));

        let mut received = Vec::new();
        while let Some(frame) = rx.recv() {
            received.push(frame.index());
        }
        let report = thread.join();

        assert_eq!(report.captured, 5);
        assert_eq!(received.len() + rx.evicted(), 5);
        assert_eq!(received.last(), Some(&4));
        assert!(received.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_stop_flag_prevents_capture() {
        let (tx, _rx) = latest_slot();
        let stop = Arc::new(AtomicBool::new(true));
        let source = StillImageSource::new(Frame::filled(4, 4, 3, 0, 0), 5);
        let report = CaptureThread::spawn(Box::new(source), tx, stop).join();
        assert_eq!(report.captured, 0);
    }

    #[test]
    fn test_gives_up_after_consecutive_errors() {
        let (tx, _rx) = latest_slot();
        let source = FailingSource;
        let report =
            CaptureThread::spawn(Box::new(source), tx, Arc::new(AtomicBool::new(false))).join();
        assert_eq!(report.errors, MAX_CONSECUTIVE_ERRORS);
        assert_eq!(report.captured, 0);
    }

    #[test]
    fn test_stops_when_consumer_dropped() {
        let (tx, rx) = latest_slot();
        drop(rx);
        let source = StillImageSource::new(Frame::filled(4, 4, 3, 0, 0), 100);
        let report =
            CaptureThread::spawn(Box::new(source), tx, Arc::new(AtomicBool::new(false))).join();
        assert_eq!(report.captured, 1);
    }
}
