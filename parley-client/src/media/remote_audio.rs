use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::trace;

/// Packets held for a listener that falls behind. Older audio is worthless,
/// so anything beyond this is dropped rather than queued.
pub const REMOTE_AUDIO_BUFFER: usize = 64;

/// Audio received from one remote member.
///
/// Yields the RTP payloads (Opus frames for the default codec set) in
/// arrival order. The stream ends when the link closes.
#[derive(Debug)]
pub struct RemoteAudio {
    track_id: String,
    mime_type: String,
    payloads: mpsc::Receiver<Bytes>,
}

/// Writing end of a [`RemoteAudio`], held by the link reading the track.
#[derive(Debug, Clone)]
pub struct RemoteAudioFeed {
    tx: mpsc::Sender<Bytes>,
}

impl RemoteAudio {
    pub fn channel(
        track_id: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> (RemoteAudioFeed, RemoteAudio) {
        let (tx, payloads) = mpsc::channel(REMOTE_AUDIO_BUFFER);
        (
            RemoteAudioFeed { tx },
            RemoteAudio {
                track_id: track_id.into(),
                mime_type: mime_type.into(),
                payloads,
            },
        )
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Next payload, or `None` once the track has ended.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.payloads.recv().await
    }
}

impl RemoteAudioFeed {
    /// Hand one payload to the listener. Returns `false` once the listener
    /// is gone and reading can stop.
    pub fn push(&self, payload: Bytes) -> bool {
        match self.tx.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("Remote audio listener is behind, dropping a packet");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
