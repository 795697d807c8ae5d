//! Kokoro-82M text-to-speech engine.
//!
//! The lightweight engine: an 8-bit-friendly ONNX model that runs well on
//! CPU. Phonemization goes through espeak-ng, so **espeak-ng must be
//! installed on the system**:
//!
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: installer from <https://espeak-ng.org/download>
//!
//! The two model assets (ONNX graph and voice style archive) are fetched from
//! the published kokoro-onnx release on first use and cached under the
//! per-user cache directory (`~/.cache/narrate/kokoro` on Linux).
//!
//! Voices follow the pattern `{language_prefix}_{name}`; the built-in catalog
//! covers American and British English (`af_`/`am_`/`bf_`/`bm_` prefixes).

pub mod backend;
pub mod phonemize;
pub mod vocab;

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{AudioBuffer, NarrateError, SynthesisRequest, TtsEngine, Voice};
use backend::{KokoroBackend, SAMPLE_RATE};

/// Registry name of this engine.
pub const ENGINE_NAME: &str = "kokoro";

/// Voice used when a request does not name one.
pub const DEFAULT_VOICE: &str = "af_heart";

const MODEL_URL: &str =
    "https://github.com/thewh1teagle/kokoro-onnx/releases/download/model-files-v1.0/kokoro-v1.0.onnx";
const VOICES_URL: &str =
    "https://github.com/thewh1teagle/kokoro-onnx/releases/download/model-files-v1.0/voices-v1.0.bin";

const MODEL_FILE: &str = "kokoro-v1.0.onnx";
const VOICES_FILE: &str = "voices-v1.0.bin";

#[derive(thiserror::Error, Debug)]
pub enum KokoroError {
    #[error("ONNX runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
    #[error("Phonemization failed: {0}")]
    Phonemizer(String),
    #[error("Voice '{0}' not found. Call list_voices() to see available voices.")]
    VoiceNotFound(String),
    #[error("Failed to parse voice file: {0}")]
    VoiceParse(String),
    #[error("Model download failed: {0}")]
    Download(String),
    #[error("Kokoro backend failed to initialize")]
    BackendNotLoaded,
}

/// Kokoro engine adapter.
///
/// The ONNX session and voice store are loaded on first synthesis and kept
/// for the lifetime of the instance.
pub struct KokoroEngine {
    backend: Option<KokoroBackend>,
}

impl Default for KokoroEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl KokoroEngine {
    pub fn new() -> Self {
        Self { backend: None }
    }

    fn backend(&mut self) -> Result<&mut KokoroBackend, KokoroError> {
        if self.backend.is_none() {
            let (model_path, voices_path) = ensure_assets()?;
            self.backend = Some(KokoroBackend::load(&model_path, &voices_path)?);
        }
        self.backend.as_mut().ok_or(KokoroError::BackendNotLoaded)
    }
}

impl TtsEngine for KokoroEngine {
    fn name(&self) -> &'static str {
        ENGINE_NAME
    }

    fn synthesize(
        &mut self,
        text: &str,
        request: &SynthesisRequest,
    ) -> Result<AudioBuffer, NarrateError> {
        let voice = if request.voice.is_empty() {
            DEFAULT_VOICE
        } else {
            request.voice.as_str()
        };

        let backend = self.backend()?;
        let samples = backend.synthesize(text, voice, request.speed)?;

        Ok(AudioBuffer {
            samples,
            sample_rate: SAMPLE_RATE,
        })
    }

    fn voices(&self) -> Vec<Voice> {
        vec![
            Voice::new("af_heart", "Heart", "Female, warm"),
            Voice::new("af_bella", "Bella", "Female, clear"),
            Voice::new("af_nicole", "Nicole", "Female, professional"),
            Voice::new("af_sarah", "Sarah", "Female, soft"),
            Voice::new("af_sky", "Sky", "Female, bright"),
            Voice::new("am_adam", "Adam", "Male, deep"),
            Voice::new("am_michael", "Michael", "Male, natural"),
            Voice::new("bf_emma", "Emma", "British female"),
            Voice::new("bm_george", "George", "British male"),
        ]
    }

    fn is_available(&self) -> bool {
        espeak_installed()
    }
}

/// Probe for espeak-ng on PATH without touching any model state.
pub(crate) fn espeak_installed() -> bool {
    Command::new("espeak-ng").arg("--version").output().is_ok()
}

fn asset_dir() -> Result<PathBuf, KokoroError> {
    let base = dirs::cache_dir().ok_or_else(|| {
        KokoroError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            "no per-user cache directory on this platform",
        ))
    })?;
    Ok(base.join("narrate").join("kokoro"))
}

/// Make sure both model assets exist locally, downloading any that are
/// missing. Returns (model path, voices path).
fn ensure_assets() -> Result<(PathBuf, PathBuf), KokoroError> {
    let dir = asset_dir()?;
    let model_path = dir.join(MODEL_FILE);
    let voices_path = dir.join(VOICES_FILE);

    if !model_path.is_file() {
        download(MODEL_URL, &model_path)?;
    }
    if !voices_path.is_file() {
        download(VOICES_URL, &voices_path)?;
    }

    Ok((model_path, voices_path))
}

/// Stream a file from `url` to `dest`, going through a `.partial` sibling so
/// an interrupted download never leaves a truncated asset in place.
fn download(url: &str, dest: &Path) -> Result<(), KokoroError> {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| url.to_string());

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    log::info!("Downloading {name}...");
    let response = ureq::get(url)
        .call()
        .map_err(|e| KokoroError::Download(format!("{url}: {e}")))?;
    let mut reader = response.into_body().into_reader();

    let partial = dest.with_extension("partial");
    let mut file = std::fs::File::create(&partial)?;
    io::copy(&mut reader, &mut file)?;
    std::fs::rename(&partial, dest)?;

    let size_mb = dest.metadata()?.len() as f64 / 1_048_576.0;
    log::info!("Downloaded {name} ({size_mb:.1} MB)");
    Ok(())
}
