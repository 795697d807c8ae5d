//! Integration tests for engine/voice resolution and output handling, using
//! stub engines registered at runtime.

use std::sync::{Arc, Mutex};

use narrate::registry::EngineFactory;
use narrate::{
    AudioBuffer, EngineRegistry, NarrateError, NarrateOptionsBuilder, Narrator, SynthesisRequest,
    TtsEngine, Voice,
};
use sha2::{Digest, Sha256};

/// Stub engine that records every synthesis request it receives.
struct RecordingEngine {
    name: &'static str,
    voices: Vec<Voice>,
    available: bool,
    marker: f32,
    log: Arc<Mutex<Vec<SynthesisRequest>>>,
}

impl TtsEngine for RecordingEngine {
    fn name(&self) -> &'static str {
        self.name
    }

    fn synthesize(
        &mut self,
        _text: &str,
        request: &SynthesisRequest,
    ) -> Result<AudioBuffer, NarrateError> {
        self.log.lock().unwrap().push(request.clone());
        Ok(AudioBuffer {
            samples: vec![self.marker; 240],
            sample_rate: 24000,
        })
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

struct StubHandle {
    log: Arc<Mutex<Vec<SynthesisRequest>>>,
}

impl StubHandle {
    fn requests(&self) -> Vec<SynthesisRequest> {
        self.log.lock().unwrap().clone()
    }
}

fn stub(
    name: &'static str,
    voice_ids: &[&str],
    available: bool,
    marker: f32,
) -> (EngineFactory, StubHandle) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let voices: Vec<Voice> = voice_ids
        .iter()
        .map(|id| Voice::new(id, id, "stub voice"))
        .collect();

    let factory_log = Arc::clone(&log);
    let factory: EngineFactory = Box::new(move || {
        Box::new(RecordingEngine {
            name,
            voices: voices.clone(),
            available,
            marker,
            log: Arc::clone(&factory_log),
        })
    });

    (factory, StubHandle { log })
}

fn quiet_narrator(registry: EngineRegistry) -> Narrator {
    let mut narrator = Narrator::with_registry(registry);
    narrator.set_auto_play(false);
    narrator
}

fn hash8(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

#[test]
fn no_engine_error_lists_all_install_hints() {
    let mut narrator = quiet_narrator(EngineRegistry::empty());
    let err = narrator
        .narrate("Hello world", &Default::default())
        .unwrap_err();

    assert!(matches!(err, NarrateError::NoEngineAvailable));
    let message = err.to_string();
    for hint in ["kokoro", "pocket", "full"] {
        assert!(message.contains(hint), "missing hint {hint:?} in {message}");
    }
}

#[test]
fn explicit_engine_request_never_substitutes() {
    let mut registry = EngineRegistry::empty();
    let (factory, _handle) = stub("other", &["v"], true, 0.0);
    registry.register("other", factory);

    let mut narrator = quiet_narrator(registry);
    let opts = NarrateOptionsBuilder::default()
        .engine("kokoro")
        .build()
        .unwrap();
    let err = narrator.narrate("hi", &opts).unwrap_err();

    match err {
        NarrateError::EngineNotAvailable(name) => assert_eq!(name, "kokoro"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn resolution_prefers_the_lightweight_engine() {
    let mut registry = EngineRegistry::empty();
    let (quality, quality_handle) = stub("quality", &["q"], true, 0.0);
    let (kokoro, kokoro_handle) = stub("kokoro", &["af_heart"], true, 0.0);
    // Register the heavier engine first so preference, not order, decides.
    registry.register("quality", quality);
    registry.register("kokoro", kokoro);

    let mut narrator = quiet_narrator(registry);
    let path = narrator.narrate("hi", &Default::default()).unwrap();
    std::fs::remove_file(path).unwrap();

    assert_eq!(kokoro_handle.requests().len(), 1);
    assert!(quality_handle.requests().is_empty());
}

#[test]
fn resolution_falls_back_to_first_available_engine() {
    let mut registry = EngineRegistry::empty();
    let (offline, offline_handle) = stub("offline", &["v"], false, 0.0);
    let (quality, quality_handle) = stub("quality", &["q"], true, 0.0);
    registry.register("offline", offline);
    registry.register("quality", quality);

    let mut narrator = quiet_narrator(registry);
    let path = narrator.narrate("hi", &Default::default()).unwrap();
    std::fs::remove_file(path).unwrap();

    assert!(offline_handle.requests().is_empty());
    assert_eq!(quality_handle.requests().len(), 1);
}

#[test]
fn configured_default_engine_wins_over_preference() {
    let mut registry = EngineRegistry::empty();
    let (kokoro, kokoro_handle) = stub("kokoro", &["af_heart"], true, 0.0);
    let (quality, quality_handle) = stub("quality", &["q"], true, 0.0);
    registry.register("kokoro", kokoro);
    registry.register("quality", quality);

    let mut narrator = quiet_narrator(registry);
    narrator.set_engine("quality");
    let path = narrator.narrate("hi", &Default::default()).unwrap();
    std::fs::remove_file(path).unwrap();

    assert!(kokoro_handle.requests().is_empty());
    assert_eq!(quality_handle.requests().len(), 1);
}

#[test]
fn voice_defaults_to_first_catalog_entry() {
    let mut registry = EngineRegistry::empty();
    let (factory, handle) = stub("stub", &["first_voice", "second_voice"], true, 0.0);
    registry.register("stub", factory);

    let mut narrator = quiet_narrator(registry);
    let path = narrator.narrate("hi", &Default::default()).unwrap();
    std::fs::remove_file(path).unwrap();

    assert_eq!(handle.requests()[0].voice, "first_voice");
}

#[test]
fn empty_catalog_resolves_to_empty_voice_without_error() {
    let mut registry = EngineRegistry::empty();
    let (factory, handle) = stub("stub", &[], true, 0.0);
    registry.register("stub", factory);

    let mut narrator = quiet_narrator(registry);
    let path = narrator.narrate("hi", &Default::default()).unwrap();
    std::fs::remove_file(path).unwrap();

    assert_eq!(handle.requests()[0].voice, "");
}

#[test]
fn explicit_voice_and_parameters_reach_the_engine() {
    let mut registry = EngineRegistry::empty();
    let (factory, handle) = stub("stub", &["default_voice"], true, 0.0);
    registry.register("stub", factory);

    let mut narrator = quiet_narrator(registry);
    narrator.set_voice("configured_voice");

    let opts = NarrateOptionsBuilder::default()
        .voice("requested_voice")
        .speed(1.5)
        .emotion(0.8)
        .build()
        .unwrap();
    let path = narrator.narrate("hi", &opts).unwrap();
    std::fs::remove_file(path).unwrap();

    let request = &handle.requests()[0];
    assert_eq!(request.voice, "requested_voice");
    assert_eq!(request.speed, 1.5);
    assert_eq!(request.emotion, 0.8);
}

#[test]
fn output_path_is_deterministic_inside_output_dir() {
    let mut registry = EngineRegistry::empty();
    let (factory, _handle) = stub("stub", &["v"], true, 0.25);
    registry.register("stub", factory);

    let dir = tempfile::tempdir().unwrap();
    let mut narrator = quiet_narrator(registry);
    narrator.set_output_dir(dir.path());

    let first = narrator.narrate("Hello world", &Default::default()).unwrap();
    let second = narrator.narrate("Hello world", &Default::default()).unwrap();

    assert_eq!(first, second);
    assert!(first.starts_with(dir.path()));

    let name = first.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.contains(&hash8("Hello world")), "filename {name}");
    assert!(name.starts_with("narrate_Hello_world_"));
    assert!(name.ends_with(".wav"));

    // Only one file: the second call overwrote the first.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn temp_fallback_yields_distinct_recognizable_paths() {
    let mut registry = EngineRegistry::empty();
    let (factory, _handle) = stub("stub", &["v"], true, 0.0);
    registry.register("stub", factory);

    let mut narrator = quiet_narrator(registry);
    let first = narrator.narrate("one", &Default::default()).unwrap();
    let second = narrator.narrate("one", &Default::default()).unwrap();

    assert_ne!(first, second);
    for path in [&first, &second] {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("narrate_"), "filename {name}");
        assert!(name.ends_with(".wav"), "filename {name}");
        assert!(path.exists());
    }

    std::fs::remove_file(first).unwrap();
    std::fs::remove_file(second).unwrap();
}

#[test]
fn explicit_play_false_suppresses_playback() {
    let mut registry = EngineRegistry::empty();
    let (factory, _handle) = stub("stub", &["v"], true, 0.0);
    registry.register("stub", factory);

    // auto-play left at its default (true); the explicit flag must win even
    // in an environment with no audio device.
    let mut narrator = Narrator::with_registry(registry);
    let opts = NarrateOptionsBuilder::default().play(false).build().unwrap();
    let path = narrator.narrate("hi", &opts).unwrap();
    std::fs::remove_file(path).unwrap();
}

#[test]
fn saved_wav_holds_the_synthesized_samples() {
    let mut registry = EngineRegistry::empty();
    let (factory, _handle) = stub("stub", &["v"], true, 0.5);
    registry.register("stub", factory);

    let dir = tempfile::tempdir().unwrap();
    let mut narrator = quiet_narrator(registry);
    narrator.set_output_dir(dir.path());

    let path = narrator.narrate("check samples", &Default::default()).unwrap();

    let mut reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 24000);
    assert_eq!(spec.sample_format, hound::SampleFormat::Float);

    let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 240);
    assert!(samples.iter().all(|&s| s == 0.5));
}

#[test]
fn registered_custom_engine_overrides_builtin_name() {
    let mut registry = EngineRegistry::empty();
    let (original, original_handle) = stub("kokoro", &["v"], true, 0.0);
    registry.register("kokoro", original);

    let mut narrator = quiet_narrator(registry);
    let (replacement, replacement_handle) = stub("kokoro", &["v"], true, 0.0);
    narrator.register_engine("kokoro", replacement);

    let path = narrator.narrate("hi", &Default::default()).unwrap();
    std::fs::remove_file(path).unwrap();

    assert!(original_handle.requests().is_empty());
    assert_eq!(replacement_handle.requests().len(), 1);
}

#[test]
fn list_voices_reports_the_resolved_engine_catalog() {
    let mut registry = EngineRegistry::empty();
    let (factory, _handle) = stub("stub", &["a", "b"], true, 0.0);
    registry.register("stub", factory);

    let narrator = quiet_narrator(registry);
    let voices = narrator.list_voices(None).unwrap();
    assert_eq!(voices.len(), 2);
    assert_eq!(voices[0].id, "a");

    let voices = narrator.list_voices(Some("stub")).unwrap();
    assert_eq!(voices[1].id, "b");
}

#[test]
fn list_engines_reflects_availability() {
    let mut registry = EngineRegistry::empty();
    let (ready, _h1) = stub("ready", &["v"], true, 0.0);
    let (offline, _h2) = stub("offline", &["v"], false, 0.0);
    registry.register("ready", ready);
    registry.register("offline", offline);

    let narrator = quiet_narrator(registry);
    assert_eq!(narrator.list_engines(), vec!["ready"]);
}
