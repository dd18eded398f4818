//! Audio I/O: WAV decoding, channel reduction, resampling and pipeline state

use crate::config::{ChannelReduction, Config};
use crate::error::{Result, TranscriptionError};
use crate::midi::TempoDirective;
use crate::pitch::FrameNotes;
use crate::tracker::NoteEvent;
use hound::WavReader;
use ndarray::Array2;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;

/// Samples are held on a 16-bit scale whatever the source depth, so
/// intensity constants do not depend on the file format.
pub const REFERENCE_FULL_SCALE: f32 = 32768.0;
const REFERENCE_MIN: f32 = -REFERENCE_FULL_SCALE;
const REFERENCE_MAX: f32 = REFERENCE_FULL_SCALE - 1.0;

/// Output of the decoder: interleaved samples on the reference scale
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Audio state carried through the passes
#[derive(Debug, Clone)]
pub struct AudioState {
    /// Mono samples on the reference scale, at `sr`
    pub y: Vec<f32>,
    /// Working sample rate in Hz
    pub sr: u32,
    /// Sample rate of the decoded source
    pub source_sr: u32,
    pub channels: u16,
    pub bit_depth: u16,
    /// Configuration reference
    pub config: Config,

    // Pass 1: Segmentation & spectra
    /// Start offset of every analysis frame
    pub frame_offsets: Vec<usize>,
    /// Magnitude spectrogram (bins × frames)
    pub spectrogram: Option<Array2<f32>>,

    // Pass 2: Pitch mapping & aggregation
    pub frame_notes: Vec<FrameNotes>,

    // Pass 3: Note tracking
    pub note_events: Vec<NoteEvent>,
    pub tempo: Option<TempoDirective>,
}

impl AudioState {
    /// Load audio file and create initial state
    pub fn load<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        let decoded = decode_wav(path)?;
        let y = reduce_to_mono(&decoded.samples, decoded.channels, config.audio.channel_reduction);
        let mut state = Self::from_test_samples(y, decoded.sample_rate, config);
        state.channels = decoded.channels;
        state.bit_depth = decoded.bit_depth;
        Ok(state)
    }

    /// Create a state from mono samples already on the reference scale
    pub fn from_test_samples(samples: Vec<f32>, sr: u32, config: &Config) -> Self {
        AudioState {
            y: samples,
            sr,
            source_sr: sr,
            channels: 1,
            bit_depth: 16,
            config: config.clone(),
            frame_offsets: Vec::new(),
            spectrogram: None,
            frame_notes: Vec::new(),
            note_events: Vec::new(),
            tempo: None,
        }
    }

    /// Get audio duration in seconds
    pub fn duration_sec(&self) -> f32 {
        self.y.len() as f32 / self.sr as f32
    }

    /// Get number of samples
    pub fn n_samples(&self) -> usize {
        self.y.len()
    }

    /// Seconds between consecutive frame starts at the working rate
    pub fn hop_sec(&self) -> f64 {
        self.config.frame.hop_sec(self.sr)
    }

    pub fn frame_count(&self) -> usize {
        self.frame_offsets.len()
    }
}

/// Decode a PCM WAV file
pub fn decode_wav<P: AsRef<Path>>(path: P) -> Result<DecodedAudio> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 || spec.channels > 2 {
        return Err(TranscriptionError::InvalidAudioFormat(format!(
            "{} channels not supported (mono or stereo only)",
            spec.channels
        )));
    }
    if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
        return Err(TranscriptionError::InvalidAudioFormat(format!(
            "Unsupported bit depth: {}",
            spec.bits_per_sample
        )));
    }

    let mut samples: Vec<f32> = Vec::with_capacity(reader.len() as usize);
    match spec.sample_format {
        hound::SampleFormat::Int => {
            let to_reference =
                REFERENCE_FULL_SCALE / (1i64 << (spec.bits_per_sample - 1)) as f32;
            for sample in reader.samples::<i32>() {
                samples.push(sample? as f32 * to_reference);
            }
        }
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                samples.push(sample? * REFERENCE_FULL_SCALE);
            }
        }
    }

    log::debug!(
        "Decoded {} samples, {} Hz, {} ch, {} bit",
        samples.len(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bit_depth: spec.bits_per_sample,
    })
}

/// Reduce interleaved samples to a single channel
pub fn reduce_to_mono(samples: &[f32], channels: u16, mode: ChannelReduction) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.to_vec();
    }

    match mode {
        ChannelReduction::Left => samples.iter().step_by(channels).copied().collect(),
        ChannelReduction::Mix => samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect(),
    }
}

/// Resample mono audio from `from_rate` to `to_rate`, clipped to the
/// reference range.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if samples.is_empty() || from_rate == to_rate {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(TranscriptionError::ResampleFailed(format!(
            "invalid rates {} -> {}",
            from_rate, to_rate
        )));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| TranscriptionError::ResampleFailed(e.to_string()))?;

    let input = vec![samples.to_vec()];
    let output = resampler
        .process(&input, None)
        .map_err(|e| TranscriptionError::ResampleFailed(e.to_string()))?;

    Ok(output
        .into_iter()
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|x| x.clamp(REFERENCE_MIN, REFERENCE_MAX))
        .collect())
}

/// Validate audio file format and content
pub fn validate_audio_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(TranscriptionError::InputValidationError(format!(
            "Audio file does not exist: {}",
            path.display()
        )));
    }

    let decoded = decode_wav(path)?;

    if decoded.samples.is_empty() {
        return Err(TranscriptionError::InputValidationError(
            "Audio file contains no samples".to_string(),
        ));
    }

    if !(8000..=192000).contains(&decoded.sample_rate) {
        return Err(TranscriptionError::UnsupportedSampleRate(decoded.sample_rate));
    }

    let peak = peak(&decoded.samples);
    if peak >= REFERENCE_MAX {
        log::warn!("Audio file may be clipped (peak = {:.0})", peak);
    }

    Ok(())
}

/// Root mean square of a signal
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Largest absolute sample value
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
}
