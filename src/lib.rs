//! # narrate
//!
//! Local text-to-speech with pluggable engines.
//!
//! The crate is a thin dispatch layer: it resolves which engine and voice to
//! use, asks the engine for audio, writes a WAV file, and optionally plays it.
//! The synthesis work itself is delegated to the engine backends.
//!
//! ## Engines
//!
//! Engines are enabled via Cargo features:
//!
//! - `kokoro` — Kokoro-82M (ONNX). Small, fast, CPU-friendly. Requires
//!   espeak-ng on the system; model files are downloaded on first use.
//! - `pocket` — Pocket-TTS (candle). Higher quality, supports an emotion
//!   intensity control.
//! - `playback` — play synthesized audio through the default output device.
//! - `full` — all of the above.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! narrate = { version = "0.1", features = ["kokoro", "playback"] }
//! ```
//!
//! ```ignore
//! use narrate::{Narrator, NarrateOptions};
//!
//! let mut narrator = Narrator::new();
//!
//! // Quick TTS (uses the first available engine, plays through speakers)
//! narrator.narrate("Hello world", &NarrateOptions::default())?;
//!
//! // Choose engine, voice and speed, save to a known path
//! let opts = narrate::NarrateOptionsBuilder::default()
//!     .engine("kokoro")
//!     .voice("af_heart")
//!     .speed(1.2)
//!     .output("hello.wav")
//!     .build()?;
//! let path = narrator.narrate("Hello world", &opts)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engines;
pub mod error;
pub mod narrator;
pub mod playback;
pub mod registry;

pub use error::NarrateError;
pub use narrator::{NarrateOptions, NarrateOptionsBuilder, Narrator};
pub use registry::EngineRegistry;

use std::path::Path;

use serde::{Deserialize, Serialize};

/// A named speaking identity offered by an engine.
///
/// Voice catalogs are static and engine-defined; the descriptor carries no
/// state beyond its identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Engine-specific voice id (e.g. `"af_heart"`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short human-readable description.
    pub description: String,
}

impl Voice {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Per-call synthesis parameters passed to an engine.
///
/// Engines are free to ignore controls they do not support: Kokoro ignores
/// `emotion`, Pocket-TTS ignores `speed`.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// Voice id. Empty means the engine's own default.
    pub voice: String,
    /// Speech speed multiplier (1.0 = normal).
    pub speed: f32,
    /// Emotion intensity, 0.0–1.0.
    pub emotion: f32,
}

impl Default for SynthesisRequest {
    fn default() -> Self {
        Self {
            voice: String::new(),
            speed: 1.0,
            emotion: 0.0,
        }
    }
}

/// Synthesized audio: raw f32 samples plus their sample rate.
#[derive(Debug)]
pub struct AudioBuffer {
    /// Raw mono audio samples as f32 values.
    pub samples: Vec<f32>,
    /// Sample rate of the audio in Hz.
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Write the audio to a 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), NarrateError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Common interface for text-to-speech engines.
///
/// Implementations are constructed fresh by the [`EngineRegistry`] and keep
/// any expensive backend handles (loaded models, sessions) as lazily
/// initialized fields, so constructing an engine is always cheap.
pub trait TtsEngine {
    /// The registry name of this engine.
    fn name(&self) -> &'static str;

    /// Generate speech audio from text.
    fn synthesize(
        &mut self,
        text: &str,
        request: &SynthesisRequest,
    ) -> Result<AudioBuffer, NarrateError>;

    /// The engine's static voice catalog.
    fn voices(&self) -> Vec<Voice>;

    /// Probe whether this engine can actually run in the current environment.
    ///
    /// Must be cheap and free of side effects: no model loads, no downloads,
    /// no caching of a negative result.
    fn is_available(&self) -> bool {
        true
    }
}
