//! Audio output backends.
//!
//! Playback runs as a detached unit that outlives the callback which
//! started it: the backend hands back a stop flag and a completion
//! signal, and the session watcher treats natural completion exactly
//! like an explicit stop.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from the audio backend.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The asset file could not be opened.
    #[error("failed to open audio asset: {0}")]
    Open(#[source] std::io::Error),

    /// The asset could not be decoded.
    #[error("failed to decode audio asset: {0}")]
    Decode(String),

    /// No usable output device.
    #[error("audio device unavailable: {0}")]
    Device(String),
}

/// A live playback started by a backend.
pub struct AudioHandle {
    stop: Arc<AtomicBool>,
    done: oneshot::Receiver<()>,
}

impl AudioHandle {
    /// Build a handle from its stop flag and completion receiver.
    pub fn new(stop: Arc<AtomicBool>, done: oneshot::Receiver<()>) -> Self {
        Self { stop, done }
    }

    /// Split into the stop flag and the completion receiver.
    pub fn into_parts(self) -> (Arc<AtomicBool>, oneshot::Receiver<()>) {
        (self.stop, self.done)
    }
}

/// An audio output device.
pub trait AudioBackend: Send + Sync {
    /// Start playing the file at `path` at the given volume.
    ///
    /// Open and decode failures are reported synchronously; device
    /// failures after that point end the playback as if it completed.
    fn play(&self, path: &Path, volume: f32) -> Result<AudioHandle, AudioError>;
}

/// Backend that plays nothing and completes immediately.
///
/// Used when the crate is built without the `audio` feature; playback
/// sessions still run their full lifecycle, just silently.
pub struct NullAudioBackend;

impl AudioBackend for NullAudioBackend {
    fn play(&self, path: &Path, volume: f32) -> Result<AudioHandle, AudioError> {
        tracing::warn!(
            path = %path.display(),
            volume,
            "audio feature disabled, completing playback silently"
        );
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel();
        let _ = done_tx.send(());
        Ok(AudioHandle::new(stop, done_rx))
    }
}

/// Rodio-backed audio output.
///
/// Each playback owns a dedicated thread holding the output stream (the
/// stream handle is not Send); the thread polls the stop flag while the
/// sink drains and signals completion when either side finishes.
#[cfg(feature = "audio")]
pub struct RodioBackend;

#[cfg(feature = "audio")]
impl AudioBackend for RodioBackend {
    fn play(&self, path: &Path, volume: f32) -> Result<AudioHandle, AudioError> {
        use std::fs::File;
        use std::io::BufReader;

        let file = File::open(path).map_err(AudioError::Open)?;
        let source = rodio::Decoder::new(BufReader::new(file))
            .map_err(|e| AudioError::Decode(e.to_string()))?;

        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel();
        let stop_flag = Arc::clone(&stop);
        let path_display = path.display().to_string();

        let spawned = std::thread::Builder::new()
            .name("muezzin-audio".into())
            .spawn(move || {
                let Ok((_stream, handle)) = rodio::OutputStream::try_default() else {
                    tracing::error!(path = %path_display, "no audio output device");
                    let _ = done_tx.send(());
                    return;
                };
                let Ok(sink) = rodio::Sink::try_new(&handle) else {
                    tracing::error!(path = %path_display, "failed to create audio sink");
                    let _ = done_tx.send(());
                    return;
                };

                sink.set_volume(volume);
                sink.append(source);

                while !sink.empty() && !stop_flag.load(std::sync::atomic::Ordering::SeqCst) {
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
                sink.stop();
                let _ = done_tx.send(());
            });

        if let Err(e) = spawned {
            return Err(AudioError::Device(format!(
                "failed to spawn audio thread: {}",
                e
            )));
        }

        Ok(AudioHandle::new(stop, done_rx))
    }
}
