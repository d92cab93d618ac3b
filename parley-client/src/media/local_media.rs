use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

const OPUS_CLOCK_RATE: u32 = 48_000;
const OPUS_CHANNELS: u16 = 2;

/// Outgoing audio track shared by every peer link of a session.
///
/// Muting keeps the track negotiated but stops frames from being written.
pub struct LocalAudioTrack {
    track: Arc<TrackLocalStaticSample>,
    enabled: AtomicBool,
}

impl LocalAudioTrack {
    pub fn opus(id: impl Into<String>, stream_id: impl Into<String>) -> Self {
        let track = TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: OPUS_CLOCK_RATE,
                channels: OPUS_CHANNELS,
                ..Default::default()
            },
            id.into(),
            stream_id.into(),
        );

        Self {
            track: Arc::new(track),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> &str {
        self.track.id()
    }

    pub fn rtc_track(&self) -> Arc<TrackLocalStaticSample> {
        Arc::clone(&self.track)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Write one encoded frame. Returns `false` when the frame was dropped
    /// because the track is muted.
    pub async fn write_frame(&self, data: Bytes, duration: Duration) -> webrtc::error::Result<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        self.track
            .write_sample(&Sample {
                data,
                duration,
                ..Default::default()
            })
            .await?;
        Ok(true)
    }
}

impl fmt::Debug for LocalAudioTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalAudioTrack")
            .field("id", &self.id())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Captured local media, the equivalent of a browser `MediaStream`.
#[derive(Debug, Clone)]
pub struct LocalMedia {
    tracks: Vec<Arc<LocalAudioTrack>>,
    stop: CancellationToken,
}

impl LocalMedia {
    pub fn new(tracks: Vec<Arc<LocalAudioTrack>>) -> Self {
        Self {
            tracks,
            stop: CancellationToken::new(),
        }
    }

    pub fn tracks(&self) -> &[Arc<LocalAudioTrack>] {
        &self.tracks
    }

    pub fn set_enabled(&self, enabled: bool) {
        for track in &self.tracks {
            track.set_enabled(enabled);
        }
    }

    /// Stop capturing. Frame producers watch [`LocalMedia::stopped`].
    pub fn release(&self) {
        self.stop.cancel();
    }

    pub fn is_released(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn stopped(&self) -> CancellationToken {
        self.stop.clone()
    }
}
