use crate::error::MediaError;
use crate::media::{LocalAudioTrack, LocalMedia, MediaCapture};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Opus frame that decodes to 20 ms of silence.
pub const OPUS_SILENCE_FRAME: [u8; 3] = [0xf8, 0xff, 0xfe];

const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Capture backed by a single Opus track.
///
/// Until an encoder feeds [`LocalAudioTrack::write_frame`] the track is kept
/// alive with silence frames so peers see a flowing stream.
#[derive(Debug, Clone)]
pub struct OpusCapture {
    stream_id: String,
    keepalive: bool,
}

impl OpusCapture {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            keepalive: true,
        }
    }

    /// Leave the track silent on the wire; frames come only from the caller.
    pub fn without_keepalive(mut self) -> Self {
        self.keepalive = false;
        self
    }
}

impl Default for OpusCapture {
    fn default() -> Self {
        Self::new("parley")
    }
}

#[async_trait]
impl MediaCapture for OpusCapture {
    async fn acquire(&self) -> Result<LocalMedia, MediaError> {
        let track = Arc::new(LocalAudioTrack::opus("audio", self.stream_id.clone()));
        let media = LocalMedia::new(vec![Arc::clone(&track)]);

        if self.keepalive {
            let stop = media.stopped();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(FRAME_DURATION);
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        _ = ticker.tick() => {
                            let frame = Bytes::from_static(&OPUS_SILENCE_FRAME);
                            if let Err(e) = track.write_frame(frame, FRAME_DURATION).await {
                                warn!("Failed to write audio frame: {}", e);
                            }
                        }
                    }
                }
                debug!("Audio keepalive stopped");
            });
        }

        Ok(media)
    }
}
