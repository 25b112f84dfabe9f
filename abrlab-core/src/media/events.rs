//! Raw engine events and the sink the engine publishes them through.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::level::LevelInfo;

/// Metadata for a single media fragment as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentMeta {
    /// Media sequence number
    pub sequence: u64,
    pub url: String,
    /// Fragment duration in seconds
    pub duration: f64,
    /// Encoded size, when the playlist or a completed download reveals it
    pub size_bytes: Option<u64>,
    /// Bitrate of the rendition the fragment belongs to
    pub bitrate_bps: Option<u64>,
}

/// Events emitted by an external media engine.
///
/// These mirror what an adaptive-streaming engine reports natively; the
/// engine adapter translates them into the session's `MediaEvent` model.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Multivariant manifest parsed and renditions discovered
    ManifestParsed { url: String, levels: Vec<LevelInfo> },
    /// Media playlist loaded for a level
    LevelLoaded {
        level: usize,
        fragments: Vec<FragmentMeta>,
    },
    /// Playback switched to another rendition
    LevelSwitched { level: usize },
    /// A fragment finished downloading
    FragLoaded { fragment: FragmentMeta },
    /// Engine failure; `error_type` is the engine's own classification and
    /// `fragment` the position of the failed fragment in the loaded playlist
    Error {
        error_type: String,
        details: String,
        fatal: bool,
        fragment: Option<usize>,
    },
    /// Media data appended to the playback buffer
    BufferAppended,
    /// All media up to end of stream is buffered
    BufferEos,
}

impl EngineEvent {
    /// Returns string representation of event type for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineEvent::ManifestParsed { .. } => "ManifestParsed",
            EngineEvent::LevelLoaded { .. } => "LevelLoaded",
            EngineEvent::LevelSwitched { .. } => "LevelSwitched",
            EngineEvent::FragLoaded { .. } => "FragLoaded",
            EngineEvent::Error { .. } => "Error",
            EngineEvent::BufferAppended => "BufferAppended",
            EngineEvent::BufferEos => "BufferEos",
        }
    }
}

/// Channel handed to the engine on attach.
///
/// `emit()` is a sync call and never blocks. Once the owning session is
/// destroyed the receiving end is gone and events are silently dropped.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineEventSink {
    /// Creates a sink together with the receiver consumed by the session actor.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publishes an event to the owning session.
    pub fn emit(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Engine event dropped: session no longer listening");
        }
    }

    /// Returns true once the owning session has stopped listening.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_delivers_in_emission_order() {
        let (sink, mut rx) = EngineEventSink::channel();
        sink.emit(EngineEvent::BufferAppended);
        sink.emit(EngineEvent::LevelSwitched { level: 2 });
        sink.emit(EngineEvent::BufferEos);

        assert_eq!(rx.recv().await, Some(EngineEvent::BufferAppended));
        assert_eq!(rx.recv().await, Some(EngineEvent::LevelSwitched { level: 2 }));
        assert_eq!(rx.recv().await, Some(EngineEvent::BufferEos));
    }

    #[test]
    fn test_emit_after_receiver_dropped_does_not_panic() {
        let (sink, rx) = EngineEventSink::channel();
        drop(rx);
        assert!(sink.is_closed());
        sink.emit(EngineEvent::BufferAppended);
    }
}
