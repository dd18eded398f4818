//! Spectral audio-to-MIDI transcription
//!
//! Converts a sampled waveform into note-on/note-off events by slicing it
//! into Hann-windowed frames, mapping each frame's spectrum onto the
//! equal-tempered scale, and tracking every pitch class across frames.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod passes;
pub mod pitch;
pub mod qa;
pub mod spectral;
pub mod tracker;
pub mod velocity;

pub use audio::AudioState;
pub use config::Config;
pub use error::{Result as TranscriptionResult, TranscriptionError};
pub use tracker::{NoteEvent, NoteEventKind};

use std::path::Path;

/// Main processing pipeline for audio-to-MIDI conversion
pub struct Wav2Midi {
    config: Config,
}

impl Wav2Midi {
    /// Create a new processor; the configuration is validated up front
    pub fn new(config: Config) -> TranscriptionResult<Self> {
        config::validate_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Transcribe a WAV file and write the MIDI file, analysis and QA
    /// artifacts into `output_dir`
    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_dir: Q,
    ) -> TranscriptionResult<AudioState> {
        let mut state = AudioState::load(input_path, &self.config)?;
        self.transcribe(&mut state)?;
        self.export_results(&state, output_dir.as_ref())?;
        Ok(state)
    }

    /// Execute every pass over an already-loaded state
    pub fn transcribe(&self, state: &mut AudioState) -> TranscriptionResult<()> {
        // Pass 0: Preflight & Resampling
        passes::pass_0::run(state, &self.config)?;

        // Pass 1: Frame Segmentation & Spectral Estimation
        passes::pass_1::run(state, &self.config)?;

        // Pass 2: Pitch Mapping & Note Aggregation
        passes::pass_2::run(state, &self.config)?;

        // Pass 3: Note-State Tracking & Velocity Shaping
        passes::pass_3::run(state, &self.config)?;

        Ok(())
    }

    /// Export MIDI and analysis results
    fn export_results(&self, state: &AudioState, output_dir: &Path) -> TranscriptionResult<()> {
        midi::export_midi(state, output_dir, &self.config)?;
        analysis::export_analysis(state, output_dir)?;
        qa::generate_artifacts(state, output_dir, &self.config)?;
        Ok(())
    }
}

/// Transcribe mono samples (16-bit reference scale) held in memory
pub fn transcribe_samples(
    samples: &[f32],
    sample_rate: u32,
    config: &Config,
) -> TranscriptionResult<Vec<NoteEvent>> {
    let processor = Wav2Midi::new(config.clone())?;
    let mut state = AudioState::from_test_samples(samples.to_vec(), sample_rate, config);
    processor.transcribe(&mut state)?;
    Ok(state.note_events)
}

/// Validate configuration and input files
pub fn validate_input<P: AsRef<Path>>(input_path: P, config: &Config) -> TranscriptionResult<()> {
    audio::validate_audio_file(input_path)?;
    config::validate_config(config)?;
    Ok(())
}
