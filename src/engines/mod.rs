//! Speech synthesis engines.
//!
//! Each engine adapts one backend onto the [`TtsEngine`](crate::TtsEngine)
//! contract. Enable engines via Cargo features:
//!
//! - `kokoro` — Kokoro-82M (ONNX, espeak-ng required)
//! - `pocket` — Pocket-TTS (candle, emotion control)

#[cfg(feature = "kokoro")]
pub mod kokoro;

#[cfg(feature = "pocket")]
pub mod pocket;
