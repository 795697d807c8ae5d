use std::time::Instant;

use narrate::{NarrateOptionsBuilder, Narrator};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut narrator = Narrator::new();

    let engines = narrator.list_engines();
    println!("Available engines: {engines:?}");
    if engines.is_empty() {
        eprintln!("No engine enabled; rebuild with e.g. --features kokoro");
        std::process::exit(1);
    }

    println!("Voices:");
    for voice in narrator.list_voices(None)? {
        println!("  {:<12} {} — {}", voice.id, voice.name, voice.description);
    }

    let text = "Hello! This is narrate, a small text to speech dispatcher. \
                It picks an engine, synthesizes your text, and saves the result \
                as a WAV file.";

    let opts = NarrateOptionsBuilder::default().speed(1.0).build()?;

    let start = Instant::now();
    let path = narrator.narrate(text, &opts)?;
    println!("Saved to {} in {:.2?}", path.display(), start.elapsed());

    Ok(())
}
