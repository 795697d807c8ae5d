//! Crate-wide error type.

/// Errors produced by the dispatch layer and its engines.
#[derive(thiserror::Error, Debug)]
pub enum NarrateError {
    #[error(
        "Engine '{0}' is not available. Enable it with the matching cargo feature: \
         narrate = {{ version = \"0.1\", features = [\"{0}\"] }}"
    )]
    EngineNotAvailable(String),

    #[error(
        "No TTS engine is enabled. Rebuild with one of:\n  \
         features = [\"kokoro\"]  (82M, fast, CPU)\n  \
         features = [\"pocket\"]  (higher quality, emotion control)\n  \
         features = [\"full\"]    (all engines + playback)"
    )]
    NoEngineAvailable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV encoding error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[cfg(feature = "kokoro")]
    #[error(transparent)]
    Kokoro(#[from] crate::engines::kokoro::KokoroError),

    #[cfg(feature = "pocket")]
    #[error(transparent)]
    Pocket(#[from] crate::engines::pocket::PocketError),
}
