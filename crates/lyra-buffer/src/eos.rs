use lyra_core::{BufferType, PerType};
use lyra_events::BufferEvent;

/// Aggregates per-type completion into `EndOfStream` / `ResumeStream`.
///
/// Only transitions are reported: `EndOfStream` once every managed type is
/// complete, `ResumeStream` when one of them becomes active again.
#[derive(Debug)]
pub struct EndOfStreamTracker {
    managed: Vec<BufferType>,
    complete: PerType<bool>,
    ended: bool,
}

impl EndOfStreamTracker {
    #[must_use]
    pub fn new(managed: &[BufferType]) -> Self {
        Self {
            managed: managed.to_vec(),
            complete: PerType::default(),
            ended: false,
        }
    }

    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Feed one event; returns the stream-wide event it triggers, if any.
    pub fn on_event(&mut self, event: &BufferEvent) -> Option<BufferEvent> {
        match *event {
            BufferEvent::CompleteBuffer { buffer_type } => {
                self.complete[buffer_type] = true;
                let all = !self.managed.is_empty()
                    && self.managed.iter().all(|&t| self.complete[t]);
                if all && !self.ended {
                    self.ended = true;
                    return Some(BufferEvent::EndOfStream);
                }
                None
            }
            BufferEvent::ActiveBuffer { buffer_type } => {
                self.complete[buffer_type] = false;
                if self.ended {
                    self.ended = false;
                    return Some(BufferEvent::ResumeStream);
                }
                None
            }
            _ => None,
        }
    }
}
