//! ONNX inference backend for Kokoro: session setup, voice style vectors and
//! waveform generation.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use ndarray::Array2;
use ort::execution_providers::CPUExecutionProvider;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use super::phonemize::{phonemize, voice_lang};
use super::vocab;
use super::KokoroError;

/// Output sample rate of the Kokoro model.
pub const SAMPLE_RATE: u32 = 24000;

/// Style vector dimension.
pub const STYLE_DIM: usize = 256;

/// Maximum phoneme tokens per inference call (model context limit).
const MAX_PHONEME_LEN: usize = 510;

/// Loaded Kokoro model: ONNX session plus voice style vectors and the IPA
/// token vocabulary.
pub struct KokoroBackend {
    session: Session,
    voices: HashMap<String, Vec<[f32; STYLE_DIM]>>,
    vocab: HashMap<char, i64>,
    /// Input name for phoneme tokens ("input_ids" or "tokens", model-dependent).
    tokens_input_name: String,
    /// Whether the speed input expects int32 rather than float32.
    speed_is_int32: bool,
}

impl KokoroBackend {
    /// Load the model graph and voice archive from the given paths.
    pub fn load(model_path: &Path, voices_path: &Path) -> Result<Self, KokoroError> {
        log::info!("Loading Kokoro model from {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers(vec![CPUExecutionProvider::default().build()])?
            .with_parallel_execution(true)?
            .commit_from_file(model_path)?;

        let tokens_input_name = detect_tokens_input(&session);
        let speed_is_int32 = detect_speed_type(&session);
        log::debug!("Kokoro inputs: tokens='{tokens_input_name}', speed_is_int32={speed_is_int32}");

        let voices = load_voice_archive(voices_path)?;
        log::info!("Loaded {} voice style sets", voices.len());

        Ok(Self {
            session,
            voices,
            vocab: vocab::ipa_vocab(),
            tokens_input_name,
            speed_is_int32,
        })
    }

    /// Synthesize audio for `text` with the given voice and speed multiplier.
    pub fn synthesize(
        &mut self,
        text: &str,
        voice: &str,
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        let lang = voice_lang(voice);
        let ids = phonemize(text, lang, &self.vocab)?;

        if ids.is_empty() {
            log::warn!("No phoneme tokens produced for text: {text:?}");
            return Ok(Vec::new());
        }

        // Style vectors are indexed by token count; keep the index stable
        // across chunks so long inputs don't shift prosody mid-sentence.
        let style = self.style_vector(voice, ids.len())?;

        let mut samples = Vec::with_capacity(ids.len() * 300);
        for chunk in split_chunks(&ids) {
            let audio = self.run_chunk(&chunk, &style, speed)?;
            samples.extend_from_slice(&audio);
        }
        Ok(samples)
    }

    fn style_vector(&self, voice: &str, token_count: usize) -> Result<[f32; STYLE_DIM], KokoroError> {
        let styles = self
            .voices
            .get(voice)
            .ok_or_else(|| KokoroError::VoiceNotFound(voice.to_string()))?;
        let idx = token_count.min(styles.len().saturating_sub(1));
        Ok(styles[idx])
    }

    fn run_chunk(
        &mut self,
        tokens: &[i64],
        style: &[f32; STYLE_DIM],
        speed: f32,
    ) -> Result<Vec<f32>, KokoroError> {
        // Token tensor is [[0, t1..tN, 0]] (zero-padded at both ends).
        let seq_len = tokens.len() + 2;
        let mut padded = vec![0i64; seq_len];
        padded[1..seq_len - 1].copy_from_slice(tokens);
        let tokens_arr = Array2::from_shape_vec((1, seq_len), padded)?;

        let style_view = ndarray::ArrayView2::from_shape((1, STYLE_DIM), style.as_slice())?;

        let output = if self.speed_is_int32 {
            let speed_arr = ndarray::arr1(&[speed as i32]);
            self.session.run(inputs![
                self.tokens_input_name.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ])?
        } else {
            let speed_arr = ndarray::arr1(&[speed]);
            self.session.run(inputs![
                self.tokens_input_name.as_str() => TensorRef::from_array_view(tokens_arr.view())?,
                "style" => TensorRef::from_array_view(style_view)?,
                "speed" => TensorRef::from_array_view(speed_arr.view())?,
            ])?
        };

        let first_output = output
            .iter()
            .next()
            .ok_or_else(|| KokoroError::Ort(ort::Error::new("No output from model")))?;
        let waveform = first_output.1.try_extract_array::<f32>()?;
        Ok(waveform.as_slice().unwrap_or(&[]).to_vec())
    }
}

fn detect_tokens_input(session: &Session) -> String {
    for input in session.inputs() {
        if input.name() == "input_ids" || input.name() == "tokens" {
            return input.name().to_string();
        }
    }
    "input_ids".to_string()
}

fn detect_speed_type(session: &Session) -> bool {
    for input in session.inputs() {
        if input.name() == "speed" {
            let type_str = format!("{:?}", input.dtype());
            return type_str.contains("Int32") || type_str.contains("int32");
        }
    }
    // Modern Kokoro exports use int32.
    true
}

/// Load all voices from the `.npz` voice archive.
///
/// Each archive entry is a `.npy` file named after the voice, holding a 2D
/// little-endian float32 array of shape `[N, 256]` (one style vector per
/// token-count bucket).
fn load_voice_archive(
    path: &Path,
) -> Result<HashMap<String, Vec<[f32; STYLE_DIM]>>, KokoroError> {
    let file = File::open(path)?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| KokoroError::VoiceParse(format!("failed to open archive: {e}")))?;

    let mut voices = HashMap::new();
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| KokoroError::VoiceParse(format!("failed to read entry {i}: {e}")))?;

        let raw_name = entry.name().to_string();
        let voice_name = raw_name
            .trim_end_matches('/')
            .trim_end_matches(".npy")
            .to_string();
        if voice_name.is_empty() || raw_name.ends_with('/') {
            continue;
        }

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| KokoroError::VoiceParse(format!("failed to read {raw_name}: {e}")))?;

        voices.insert(voice_name, parse_style_vectors(&data, &raw_name)?);
    }

    Ok(voices)
}

fn parse_style_vectors(data: &[u8], name: &str) -> Result<Vec<[f32; STYLE_DIM]>, KokoroError> {
    // Minimal .npy reader: magic, version, header length, then raw floats.
    if data.len() < 10 || &data[0..6] != b"\x93NUMPY" {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: not a numpy array file"
        )));
    }

    let header_len = u16::from_le_bytes([data[8], data[9]]) as usize;
    let data_offset = 10 + header_len;
    if data.len() < data_offset {
        return Err(KokoroError::VoiceParse(format!("{name}: header truncated")));
    }

    let floats = &data[data_offset..];
    if floats.len() % (4 * STYLE_DIM) != 0 {
        return Err(KokoroError::VoiceParse(format!(
            "{name}: payload of {} bytes is not a whole number of style vectors",
            floats.len()
        )));
    }

    let n_styles = floats.len() / (4 * STYLE_DIM);
    let mut result = Vec::with_capacity(n_styles);
    for i in 0..n_styles {
        let mut vec = [0f32; STYLE_DIM];
        for (j, value) in vec.iter_mut().enumerate() {
            let offset = (i * STYLE_DIM + j) * 4;
            *value = f32::from_le_bytes([
                floats[offset],
                floats[offset + 1],
                floats[offset + 2],
                floats[offset + 3],
            ]);
        }
        result.push(vec);
    }
    Ok(result)
}

/// Split token IDs into chunks of at most `MAX_PHONEME_LEN`, preferring to
/// break after punctuation tokens.
fn split_chunks(ids: &[i64]) -> Vec<Vec<i64>> {
    if ids.len() <= MAX_PHONEME_LEN {
        return vec![ids.to_vec()];
    }

    // Punctuation token IDs: ';' ':' ',' '.' '!' '?'
    const PUNCT_IDS: &[i64] = &[1, 2, 3, 4, 5, 6];

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < ids.len() {
        let end = (start + MAX_PHONEME_LEN).min(ids.len());
        if end == ids.len() {
            chunks.push(ids[start..end].to_vec());
            break;
        }

        let split = ids[start..end]
            .iter()
            .enumerate()
            .rev()
            .find(|(_, &id)| PUNCT_IDS.contains(&id))
            .map(|(i, _)| start + i + 1)
            .unwrap_or(end);

        chunks.push(ids[start..split].to_vec());
        start = split;
    }
    chunks
}
