//! Pass 0: Preflight & Resampling

use crate::audio::{peak, resample, rms, AudioState, REFERENCE_FULL_SCALE};
use crate::config::{validate_config, Config};
use crate::error::{Result, TranscriptionError};

/// Validate the configuration, bring the buffer to the working rate and
/// report degenerate input.
pub fn run(state: &mut AudioState, config: &Config) -> Result<()> {
    validate_config(config)?;

    if state.sr == 0 {
        return Err(TranscriptionError::UnsupportedSampleRate(0));
    }

    let working_rate = config.audio.working_rate;
    if config.audio.resample_above_working_rate && state.sr > working_rate {
        log::info!("Resampling {} Hz -> {} Hz", state.sr, working_rate);
        state.y = resample(&state.y, state.sr, working_rate)?;
        state.sr = working_rate;
    }

    let peak = peak(&state.y);
    let rms = rms(&state.y);

    if peak == 0.0 {
        log::warn!("Input is silent; no notes will be produced");
    } else if peak >= REFERENCE_FULL_SCALE - 1.0 {
        log::warn!("Input may be clipped (peak = {:.0})", peak);
    }

    if state.y.len() < config.frame.frame_length {
        log::warn!(
            "Input has {} samples, fewer than one {}-sample frame; no notes will be produced",
            state.y.len(),
            config.frame.frame_length
        );
    }

    log::info!(
        "Preflight: {} samples at {} Hz ({:.2}s), peak {:.0}, rms {:.1}",
        state.n_samples(),
        state.sr,
        state.duration_sec(),
        peak,
        rms
    );

    Ok(())
}
