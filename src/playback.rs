//! Audio playback through the default output device.
//!
//! Playback is an optional dependency. Without the `playback` feature the
//! crate still synthesizes and saves audio; [`play`] just does nothing.

use crate::{AudioBuffer, NarrateError};

/// Play the buffer through the default output device, blocking until done.
#[cfg(feature = "playback")]
pub fn play(audio: &AudioBuffer) -> Result<(), NarrateError> {
    use rodio::{OutputStreamBuilder, Sink};

    let stream = OutputStreamBuilder::open_default_stream()
        .map_err(|e| NarrateError::Playback(format!("failed to open output stream: {e}")))?;
    let sink = Sink::connect_new(stream.mixer());

    let source = rodio::buffer::SamplesBuffer::new(1, audio.sample_rate, audio.samples.clone());
    sink.append(source);
    sink.sleep_until_end();
    Ok(())
}

/// Playback support is not compiled in; skip silently.
#[cfg(not(feature = "playback"))]
pub fn play(_audio: &AudioBuffer) -> Result<(), NarrateError> {
    log::debug!("playback feature not enabled, skipping audio playback");
    Ok(())
}
