//! Pocket-TTS engine.
//!
//! The higher-quality engine: the kyutai Pocket-TTS model running through
//! candle. Supports an emotion intensity control, mapped onto the model's
//! sampling temperature (its expressiveness knob). Model weights and voice
//! embeddings are fetched from HuggingFace on first use and cached by
//! `pocket-tts` itself.
//!
//! Runs on an accelerator when one is available, otherwise on CPU. The speed
//! parameter is not supported by this backend and is ignored.

use candle_core::Device;
use pocket_tts::TTSModel;

use crate::{AudioBuffer, NarrateError, SynthesisRequest, TtsEngine, Voice};

/// Registry name of this engine.
pub const ENGINE_NAME: &str = "pocket";

/// Voice used when a request does not name one.
pub const DEFAULT_VOICE: &str = "alba";

const MODEL_ID: &str = "b6369a24";
const VOICE_EMBEDDINGS_REPO: &str = "hf://kyutai/pocket-tts-without-voice-cloning/embeddings";

/// Emotion 0.0 maps to a flat delivery, 1.0 to the most expressive one the
/// model stays stable at.
const MIN_TEMPERATURE: f32 = 0.4;
const MAX_TEMPERATURE: f32 = 1.2;

const LSD_DECODE_STEPS: usize = 1;
const EOS_THRESHOLD: f32 = -4.0;

#[derive(thiserror::Error, Debug)]
pub enum PocketError {
    #[error("Failed to load Pocket-TTS model: {0}")]
    ModelLoad(String),
    #[error("Failed to load voice '{0}': {1}")]
    VoiceLoad(String, String),
    #[error("Generation failed: {0}")]
    Generation(String),
    #[error("Pocket-TTS backend failed to initialize")]
    BackendNotLoaded,
}

struct LoadedModel {
    /// Temperature the handle was built with; a request mapping to a
    /// different temperature forces a reload.
    temperature: f32,
    model: TTSModel,
}

/// Pocket-TTS engine adapter.
///
/// The model handle and the last-used voice state are loaded on first
/// synthesis and kept for the lifetime of the instance.
pub struct PocketEngine {
    loaded: Option<LoadedModel>,
    voice_state: Option<(String, pocket_tts::ModelState)>,
}

impl Default for PocketEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PocketEngine {
    pub fn new() -> Self {
        Self {
            loaded: None,
            voice_state: None,
        }
    }

    fn ensure_model(&mut self, temperature: f32) -> Result<(), PocketError> {
        let stale = match &self.loaded {
            Some(loaded) => (loaded.temperature - temperature).abs() > f32::EPSILON,
            None => true,
        };
        if !stale {
            return Ok(());
        }

        let device = Device::cuda_if_available(0).unwrap_or(Device::Cpu);
        log::info!(
            "Loading Pocket-TTS model '{MODEL_ID}' on {device:?} (temperature {temperature:.2})"
        );
        let model = TTSModel::load_with_params_device(
            MODEL_ID,
            temperature,
            LSD_DECODE_STEPS,
            EOS_THRESHOLD,
            None,
            &device,
        )
        .map_err(|e| PocketError::ModelLoad(e.to_string()))?;

        self.loaded = Some(LoadedModel { temperature, model });
        // The cached voice state belongs to the previous handle.
        self.voice_state = None;
        Ok(())
    }

    fn ensure_voice_state(&mut self, voice: &str) -> Result<(), PocketError> {
        if matches!(&self.voice_state, Some((id, _)) if id == voice) {
            return Ok(());
        }

        let model = match &self.loaded {
            Some(loaded) => &loaded.model,
            None => return Err(PocketError::BackendNotLoaded),
        };

        let hf_path = format!("{VOICE_EMBEDDINGS_REPO}/{voice}.safetensors");
        let local_path = pocket_tts::weights::download_if_necessary(&hf_path)
            .map_err(|e| PocketError::VoiceLoad(voice.to_string(), e.to_string()))?;
        let state = model
            .get_voice_state_from_prompt_file(&local_path)
            .map_err(|e| PocketError::VoiceLoad(voice.to_string(), e.to_string()))?;

        self.voice_state = Some((voice.to_string(), state));
        Ok(())
    }
}

impl TtsEngine for PocketEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn synthesize(
        &mut self,
        text: &str,
        request: &SynthesisRequest,
    ) -> Result<AudioBuffer, NarrateError> {
        let temperature = temperature_for(request.emotion);
        self.ensure_model(temperature)?;

        let voice = if request.voice.is_empty() {
            DEFAULT_VOICE
        } else {
            request.voice.as_str()
        };
        self.ensure_voice_state(voice)?;

        let (model, state) = match (&self.loaded, &self.voice_state) {
            (Some(loaded), Some((_, state))) => (&loaded.model, state),
            _ => return Err(PocketError::BackendNotLoaded.into()),
        };

        let mut tensor = model
            .generate(text, state)
            .map_err(|e| PocketError::Generation(e.to_string()))?;

        // Generation yields [channels, samples] (or with a leading batch dim);
        // flatten down to the mono sample vector.
        while tensor.dims().len() > 1 {
            tensor = tensor
                .squeeze(0)
                .map_err(|e| PocketError::Generation(e.to_string()))?;
        }
        let samples = tensor
            .to_vec1::<f32>()
            .map_err(|e| PocketError::Generation(e.to_string()))?;

        Ok(AudioBuffer {
            samples,
            sample_rate: model.sample_rate as u32,
        })
    }

    fn voices(&self) -> Vec<Voice> {
        vec![Voice::new(
            DEFAULT_VOICE,
            "Alba",
            "Pocket-TTS default voice",
        )]
    }

    /// The model library is linked into this build, so the engine is always
    /// usable; weights are fetched on demand.
    fn is_available(&self) -> bool {
        true
    }
}

/// Map emotion intensity 0.0–1.0 onto the sampling temperature range.
fn temperature_for(emotion: f32) -> f32 {
    MIN_TEMPERATURE + emotion.clamp(0.0, 1.0) * (MAX_TEMPERATURE - MIN_TEMPERATURE)
}
