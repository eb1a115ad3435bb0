//! Change notifications of an [`AudioMediaData`](super::AudioMediaData).

use std::fmt;
use std::time::Duration;

use crate::pcm::PcmFormat;

/// A committed change to an audio media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMediaEvent {
    /// `duration` of audio now starts at `at`.
    AudioInserted { at: Duration, duration: Duration },
    /// `duration` of audio that started at `at` is gone.
    AudioRemoved { at: Duration, duration: Duration },
    /// The PCM format was changed while the media held no audio.
    FormatChanged { format: PcmFormat },
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn Fn(&AudioMediaEvent) + Send + Sync>;

/// Synchronous listener list. Listeners run in subscription order.
#[derive(Default)]
pub(crate) struct EventEmitter {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
}

impl EventEmitter {
    pub(crate) fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&AudioMediaEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub(crate) fn emit(&self, event: AudioMediaEvent) {
        for (_, listener) in &self.listeners {
            listener(&event);
        }
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_and_unsubscribe() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut emitter = EventEmitter::default();

        let s = seen.clone();
        let id = emitter.subscribe(move |e| s.lock().unwrap().push(*e));

        let event = AudioMediaEvent::AudioInserted {
            at: Duration::ZERO,
            duration: Duration::from_millis(10),
        };
        emitter.emit(event);
        assert!(emitter.unsubscribe(id));
        assert!(!emitter.unsubscribe(id));
        emitter.emit(event);

        assert_eq!(seen.lock().unwrap().as_slice(), &[event]);
    }
}
