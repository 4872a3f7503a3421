//! Audio driver capability.
//!
//! The pipeline never talks to the sound hardware directly; a session
//! is handed an implementation of this trait. Production uses
//! [`CpalDriver`](super::CpalDriver); tests inject synthetic drivers.

use crate::error::Result;

/// Invoked once per capture buffer. The slice is only valid for the
/// duration of the call; implementations hand out their own reusable
/// buffer, so receivers must copy before crossing a thread boundary.
pub type FrameCallback = Box<dyn FnMut(&[i16]) + Send>;

/// Capability interface over the platform audio stack. Mono signed-16
/// PCM at the configured sample rate; capture buffers hold
/// `sample_rate / 50` samples.
pub trait AudioDriver: Send + Sync {
    /// Begin capture, invoking `on_frame` for every buffer until
    /// `stop_capture`. The callback is dropped when capture stops.
    fn start_capture(&self, on_frame: FrameCallback) -> Result<()>;

    /// Stop capture and drop the frame callback. Idempotent.
    fn stop_capture(&self);

    /// Queue samples for playback through the speaker.
    fn emit(&self, samples: &[i16]) -> Result<()>;

    /// Tear down all platform resources. Implies `stop_capture`.
    fn release(&self);
}
