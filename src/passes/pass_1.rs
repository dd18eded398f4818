//! Pass 1: Frame Segmentation & Spectral Estimation

use crate::audio::AudioState;
use crate::config::Config;
use crate::error::Result;
use crate::spectral::{FrameSegmenter, SpectralEstimator};

pub fn run(state: &mut AudioState, config: &Config) -> Result<()> {
    let frame_length = config.frame.frame_length;
    let segmenter = FrameSegmenter::new(&state.y, frame_length, config.frame.overlap, state.sr)?;

    let estimator = SpectralEstimator::new(frame_length, config.intensity.magnitude);
    let spectrogram = estimator.spectrogram(&segmenter)?;
    let frame_offsets = segmenter.frame_offsets();

    log::info!(
        "Pass 1: {} frames of {} samples (hop {}), {} bins each",
        frame_offsets.len(),
        frame_length,
        segmenter.hop_length(),
        estimator.n_bins()
    );
    if let Some(&tail) = frame_offsets.last() {
        if tail + frame_length > state.y.len() {
            log::debug!(
                "Final frame at {} holds {} samples",
                tail,
                state.y.len() - tail
            );
        }
    }

    state.frame_offsets = frame_offsets;
    state.spectrogram = Some(spectrogram);
    Ok(())
}
