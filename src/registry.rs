//! Engine registry: name → factory lookup with availability probing.

use crate::{NarrateError, TtsEngine};

/// Factory producing a fresh engine instance.
///
/// Instances are cheap to construct; any expensive backend state is loaded
/// lazily inside the engine on first synthesis.
pub type EngineFactory = Box<dyn Fn() -> Box<dyn TtsEngine> + Send + Sync>;

/// Maps engine names to factories.
///
/// Entries keep their registration order, which is also the probing order of
/// [`available`](EngineRegistry::available) and the fallback order used by the
/// orchestrator when no engine is requested explicitly.
pub struct EngineRegistry {
    entries: Vec<(String, EngineFactory)>,
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineRegistry {
    /// Registry pre-populated with every engine compiled into this build.
    pub fn new() -> Self {
        #[cfg_attr(not(any(feature = "kokoro", feature = "pocket")), allow(unused_mut))]
        let mut registry = Self::empty();

        #[cfg(feature = "kokoro")]
        registry.register(
            crate::engines::kokoro::ENGINE_NAME,
            Box::new(|| Box::new(crate::engines::kokoro::KokoroEngine::new())),
        );

        #[cfg(feature = "pocket")]
        registry.register(
            crate::engines::pocket::ENGINE_NAME,
            Box::new(|| Box::new(crate::engines::pocket::PocketEngine::new())),
        );

        registry
    }

    /// Registry with no engines registered.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record a factory under `name`. The last registration for a name wins.
    pub fn register(&mut self, name: &str, factory: EngineFactory) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = factory;
        } else {
            self.entries.push((name.to_string(), factory));
        }
    }

    /// Construct a fresh instance of the named engine.
    ///
    /// Fails with [`NarrateError::EngineNotAvailable`] for names that are not
    /// registered (typically: the matching cargo feature is not enabled).
    /// Never substitutes another engine.
    pub fn get(&self, name: &str) -> Result<Box<dyn TtsEngine>, NarrateError> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| factory())
            .ok_or_else(|| NarrateError::EngineNotAvailable(name.to_string()))
    }

    /// Names of registered engines whose availability probe passes.
    pub fn available(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, factory)| factory().is_available())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether any engine at all is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioBuffer, SynthesisRequest, Voice};

    struct StubEngine {
        available: bool,
        marker: f32,
    }

    impl TtsEngine for StubEngine {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn synthesize(
            &mut self,
            _text: &str,
            _request: &SynthesisRequest,
        ) -> Result<AudioBuffer, NarrateError> {
            Ok(AudioBuffer {
                samples: vec![self.marker; 100],
                sample_rate: 24000,
            })
        }

        fn voices(&self) -> Vec<Voice> {
            vec![Voice::new("stub_voice", "Stub", "Test voice")]
        }

        fn is_available(&self) -> bool {
            self.available
        }
    }

    fn stub_factory(available: bool, marker: f32) -> EngineFactory {
        Box::new(move || {
            Box::new(StubEngine {
                available,
                marker,
            })
        })
    }

    #[test]
    fn get_unregistered_engine_fails_with_install_guidance() {
        let registry = EngineRegistry::empty();
        match registry.get("kokoro") {
            Ok(_) => panic!("lookup in an empty registry should fail"),
            Err(NarrateError::EngineNotAvailable(name)) => assert_eq!(name, "kokoro"),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn get_returns_fresh_instances() {
        let mut registry = EngineRegistry::empty();
        registry.register("stub", stub_factory(true, 0.5));

        let mut first = registry.get("stub").unwrap();
        let mut second = registry.get("stub").unwrap();
        let a = first.synthesize("x", &SynthesisRequest::default()).unwrap();
        let b = second.synthesize("x", &SynthesisRequest::default()).unwrap();
        assert_eq!(a.samples, b.samples);
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = EngineRegistry::empty();
        registry.register("stub", stub_factory(true, 1.0));
        registry.register("stub", stub_factory(true, 2.0));

        let mut engine = registry.get("stub").unwrap();
        let audio = engine.synthesize("x", &SynthesisRequest::default()).unwrap();
        assert_eq!(audio.samples[0], 2.0);
    }

    #[test]
    fn available_filters_by_probe_in_registration_order() {
        let mut registry = EngineRegistry::empty();
        registry.register("offline", stub_factory(false, 0.0));
        registry.register("ready_b", stub_factory(true, 0.0));
        registry.register("ready_a", stub_factory(true, 0.0));

        assert_eq!(registry.available(), vec!["ready_b", "ready_a"]);
    }
}
