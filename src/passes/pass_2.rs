//! Pass 2: Pitch Mapping & Note Aggregation

use crate::audio::AudioState;
use crate::config::Config;
use crate::error::{Result, TranscriptionError};
use crate::pitch::{aggregate, PitchMapper};
use ndarray::Axis;
use std::collections::BTreeSet;

pub fn run(state: &mut AudioState, config: &Config) -> Result<()> {
    let spectrogram = state.spectrogram.as_ref().ok_or_else(|| {
        TranscriptionError::SpectralProcessingError(
            "no spectrogram; pass 1 must run first".to_string(),
        )
    })?;

    let mapper = PitchMapper::new(
        config.frame.frame_length,
        state.sr,
        &config.band,
        &config.intensity,
    );

    let frame_notes: Vec<_> = spectrogram
        .axis_iter(Axis(1))
        .enumerate()
        .map(|(frame_idx, column)| {
            aggregate(frame_idx, &mapper.observe(column), config.aggregation)
        })
        .collect();

    let pitches: BTreeSet<u8> = frame_notes
        .iter()
        .flat_map(|f| f.notes.keys().copied())
        .collect();
    log::info!(
        "Pass 2: {} frames over {} usable bins, {} pitch classes observed",
        frame_notes.len(),
        mapper.bins().len(),
        pitches.len()
    );
    for frame in &frame_notes {
        log::debug!("Frame {}: {} pitch classes", frame.frame_idx, frame.notes.len());
    }

    state.frame_notes = frame_notes;
    Ok(())
}
