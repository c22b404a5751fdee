use crate::shared::latest_slot::{latest_slot, SlotReceiver, SlotSender};
use crate::shared::rendered_frame::RenderedFrame;

/// Receives finished frames from the processing thread, in processing order.
pub trait FrameSink: Send {
    fn deliver(&mut self, frame: RenderedFrame);
}

impl<F> FrameSink for F
where
    F: FnMut(RenderedFrame) + Send,
{
    fn deliver(&mut self, frame: RenderedFrame) {
        self(frame)
    }
}

/// Hands frames to a presentation consumer through a single slot.
///
/// A consumer that falls behind skips straight to the newest frame.
pub struct LatestFrameSink {
    slot: SlotSender<RenderedFrame>,
}

impl LatestFrameSink {
    pub fn channel() -> (Self, SlotReceiver<RenderedFrame>) {
        let (slot, rx) = latest_slot();
        (Self { slot }, rx)
    }

    /// Frames replaced before the consumer took them.
    pub fn skipped(&self) -> usize {
        self.slot.evicted()
    }
}

impl FrameSink for LatestFrameSink {
    fn deliver(&mut self, frame: RenderedFrame) {
        if !self.slot.publish(frame) {
            log::debug!("Presentation consumer gone, frame discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn rendered(sequence: usize) -> RenderedFrame {
        RenderedFrame {
            image: DynamicImage::new_rgb8(2, 2),
            sequence,
        }
    }

    #[test]
    fn test_closure_is_a_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |f: RenderedFrame| seen.push(f.sequence);
            sink.deliver(rendered(1));
            sink.deliver(rendered(2));
        }
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_latest_sink_keeps_freshest() {
        let (mut sink, rx) = LatestFrameSink::channel();
        for seq in 1..=3 {
            sink.deliver(rendered(seq));
        }
        assert_eq!(rx.try_recv().map(|f| f.sequence), Some(3));
        assert!(rx.try_recv().is_none());
        assert_eq!(sink.skipped(), 2);
    }

    #[test]
    fn test_latest_sink_tolerates_dropped_consumer() {
        let (mut sink, rx) = LatestFrameSink::channel();
        drop(rx);
        sink.deliver(rendered(1));
        assert_eq!(sink.skipped(), 0);
    }
}
