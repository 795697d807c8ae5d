//! The `Narrator` orchestrator: engine/voice resolution, synthesis, output
//! path derivation, saving and playback.

use std::fs;
use std::path::PathBuf;

use derive_builder::Builder;
use sha2::{Digest, Sha256};

use crate::playback;
use crate::registry::{EngineFactory, EngineRegistry};
use crate::{NarrateError, SynthesisRequest, Voice};

/// Engine preferred by default when several are available.
///
/// Kokoro is the lightest backend, so it wins ties unless the caller picked
/// an engine explicitly or configured a default.
const PREFERRED_ENGINE: &str = "kokoro";

/// Maximum number of leading characters of the text used in derived filenames.
const SLUG_LEN: usize = 30;

/// Per-call options for [`Narrator::narrate`].
///
/// Build with [`NarrateOptionsBuilder`]:
///
/// ```
/// use narrate::NarrateOptionsBuilder;
///
/// let opts = NarrateOptionsBuilder::default()
///     .voice("af_heart")
///     .speed(1.2)
///     .play(false)
///     .build()
///     .unwrap();
/// assert_eq!(opts.voice.as_deref(), Some("af_heart"));
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), default)]
pub struct NarrateOptions {
    /// Engine name. `None` falls back to the configured default, then to the
    /// best available engine.
    #[builder(setter(into, strip_option))]
    pub engine: Option<String>,
    /// Voice id. `None` falls back to the configured default, then to the
    /// first entry of the engine's catalog.
    #[builder(setter(into, strip_option))]
    pub voice: Option<String>,
    /// Speech speed multiplier (default 1.0).
    pub speed: f32,
    /// Emotion intensity 0.0–1.0 (Pocket-TTS only).
    pub emotion: f32,
    /// Path for the output WAV file. `None` derives one (output directory or
    /// temp file).
    #[builder(setter(into, strip_option))]
    pub output: Option<PathBuf>,
    /// Whether to play the audio. `None` uses the narrator's auto-play flag.
    #[builder(setter(strip_option))]
    pub play: Option<bool>,
}

impl Default for NarrateOptions {
    fn default() -> Self {
        Self {
            engine: None,
            voice: None,
            speed: 1.0,
            emotion: 0.0,
            output: None,
            play: None,
        }
    }
}

/// Text-to-speech orchestrator.
///
/// Owns the engine registry and the process-wide defaults (engine, voice,
/// auto-play, output directory). Construct one per logical configuration;
/// there is no hidden global state.
pub struct Narrator {
    registry: EngineRegistry,
    default_engine: Option<String>,
    default_voice: Option<String>,
    auto_play: bool,
    output_dir: Option<PathBuf>,
}

impl Default for Narrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Narrator {
    /// Narrator over all engines compiled into this build.
    pub fn new() -> Self {
        Self::with_registry(EngineRegistry::new())
    }

    /// Narrator over an explicit registry (custom or stripped-down setups).
    pub fn with_registry(registry: EngineRegistry) -> Self {
        Self {
            registry,
            default_engine: None,
            default_voice: None,
            auto_play: true,
            output_dir: None,
        }
    }

    /// Set the default engine name used when a call does not pick one.
    pub fn set_engine(&mut self, name: impl Into<String>) {
        self.default_engine = Some(name.into());
    }

    /// Set the default voice id used when a call does not pick one.
    pub fn set_voice(&mut self, voice: impl Into<String>) {
        self.default_voice = Some(voice.into());
    }

    /// Whether to play audio after synthesis when a call does not say.
    /// Initially `true`.
    pub fn set_auto_play(&mut self, auto_play: bool) {
        self.auto_play = auto_play;
    }

    /// Directory for derived output files. Created on demand.
    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.output_dir = Some(dir.into());
    }

    /// Register a custom engine factory. The last registration for a name wins.
    pub fn register_engine(&mut self, name: &str, factory: EngineFactory) {
        self.registry.register(name, factory);
    }

    /// Names of the engines that are currently usable.
    pub fn list_engines(&self) -> Vec<String> {
        self.registry.available()
    }

    /// Voice catalog of the named engine, or of the engine that would be
    /// resolved for a plain `narrate` call.
    pub fn list_voices(&self, engine: Option<&str>) -> Result<Vec<Voice>, NarrateError> {
        let name = self.resolve_engine_name(engine)?;
        Ok(self.registry.get(&name)?.voices())
    }

    /// Generate speech from `text` and return the path of the WAV file.
    pub fn narrate(&mut self, text: &str, opts: &NarrateOptions) -> Result<PathBuf, NarrateError> {
        let engine_name = self.resolve_engine_name(opts.engine.as_deref())?;
        let mut engine = self.registry.get(&engine_name)?;

        let voice = opts
            .voice
            .clone()
            .filter(|v| !v.is_empty())
            .or_else(|| self.default_voice.clone())
            .or_else(|| engine.voices().first().map(|v| v.id.clone()))
            .unwrap_or_default();

        log::info!(
            "Synthesizing {} chars with engine '{engine_name}', voice '{voice}'",
            text.chars().count()
        );

        let request = SynthesisRequest {
            voice,
            speed: opts.speed,
            emotion: opts.emotion,
        };
        let audio = engine.synthesize(text, &request)?;

        let output = match &opts.output {
            Some(path) => path.clone(),
            None => self.derive_output_path(text)?,
        };
        audio.write_wav(&output)?;
        log::info!(
            "Saved {:.2}s of audio to {}",
            audio.duration_secs(),
            output.display()
        );

        if opts.play.unwrap_or(self.auto_play) {
            playback::play(&audio)?;
        }

        Ok(output)
    }

    /// Pick the engine for a call: explicit name, else the configured default,
    /// else the lightest available engine, else the first available one.
    fn resolve_engine_name(&self, explicit: Option<&str>) -> Result<String, NarrateError> {
        if let Some(name) = explicit.filter(|n| !n.is_empty()) {
            return Ok(name.to_string());
        }
        if let Some(name) = &self.default_engine {
            return Ok(name.clone());
        }

        let available = self.registry.available();
        if available.is_empty() {
            return Err(NarrateError::NoEngineAvailable);
        }
        if available.iter().any(|n| n == PREFERRED_ENGINE) {
            return Ok(PREFERRED_ENGINE.to_string());
        }
        Ok(available[0].clone())
    }

    fn derive_output_path(&self, text: &str) -> Result<PathBuf, NarrateError> {
        match &self.output_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(dir.join(output_filename(text)))
            }
            None => {
                let file = tempfile::Builder::new()
                    .prefix("narrate_")
                    .suffix(".wav")
                    .tempfile()?;
                let (_, path) = file.keep().map_err(|e| NarrateError::Io(e.error))?;
                Ok(path)
            }
        }
    }
}

/// Derive a deterministic filename from the text: a sanitized slug of its
/// first characters plus a short content hash, so identical text maps to the
/// same file.
pub(crate) fn output_filename(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    let hash: String = digest[..4].iter().map(|b| format!("{b:02x}")).collect();

    let slug: String = text
        .chars()
        .take(SLUG_LEN)
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let slug = slug.trim_matches('_');

    format!("narrate_{slug}_{hash}.wav")
}
