mod local_media;
mod opus_capture;
mod remote_audio;

pub use local_media::*;
pub use opus_capture::*;
pub use remote_audio::*;

use crate::error::MediaError;
use async_trait::async_trait;

/// Source of the local microphone tracks.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    async fn acquire(&self) -> Result<LocalMedia, MediaError>;
}
