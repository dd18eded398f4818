//! Bin-to-pitch mapping and per-frame note aggregation

use crate::config::{AggregationPolicy, BandConfig, IntensityConfig};
use ndarray::ArrayView1;
use serde::Serialize;
use std::collections::BTreeMap;

pub const A4_PITCH: f32 = 69.0;
pub const A4_HZ: f32 = 440.0;

/// log10 of one equal-tempered semitone ratio, 2^(1/12)
const SEMITONE_LOG10: f32 = std::f32::consts::LOG10_2 / 12.0;

/// Continuous pitch on the MIDI scale (A4 = 69 = 440 Hz)
pub fn frequency_to_pitch(freq_hz: f32) -> f32 {
    A4_PITCH + (freq_hz / A4_HZ).log10() / SEMITONE_LOG10
}

pub fn pitch_to_frequency(pitch: f32) -> f32 {
    A4_HZ * 2.0f32.powf((pitch - A4_PITCH) / 12.0)
}

/// Split a continuous pitch into its nearest pitch class and the remainder.
/// Returns `None` when the nearest class falls outside 0..=127.
pub fn split_pitch(pitch: f32) -> Option<(u8, f32)> {
    let class = pitch.round();
    if !(0.0..=127.0).contains(&class) {
        return None;
    }
    Some((class as u8, pitch - class))
}

/// Power-law compression of an amplitude-normalised bin magnitude
pub fn compress_intensity(magnitude: f32, cfg: &IntensityConfig) -> f32 {
    (magnitude.max(0.0) * cfg.gain).powf(cfg.exponent) * cfg.scale
}

/// Intensity estimate for one bin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchObservation {
    pub pitch_class: u8,
    /// pitch - pitch_class, within [-0.5, 0.5]
    pub offset: f32,
    pub intensity: f32,
}

/// Pitch assignment of one usable bin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinPitch {
    pub bin: usize,
    pub frequency: f32,
    pub pitch_class: u8,
    pub offset: f32,
}

/// Maps spectral bins onto the equal-tempered scale.
///
/// The bin table depends only on frame length, sample rate and band, so it is
/// built once and reused for every frame.
#[derive(Debug, Clone)]
pub struct PitchMapper {
    bins: Vec<BinPitch>,
    intensity: IntensityConfig,
}

impl PitchMapper {
    pub fn new(
        frame_length: usize,
        sample_rate: u32,
        band: &BandConfig,
        intensity: &IntensityConfig,
    ) -> Self {
        let frame_sec = frame_length as f32 / sample_rate as f32;
        let bins = (1..frame_length / 2)
            .filter_map(|bin| {
                let frequency = bin as f32 / frame_sec;
                if frequency < band.f_min || frequency > band.f_max {
                    return None;
                }
                let (pitch_class, offset) = split_pitch(frequency_to_pitch(frequency))?;
                Some(BinPitch {
                    bin,
                    frequency,
                    pitch_class,
                    offset,
                })
            })
            .collect();

        Self {
            bins,
            intensity: intensity.clone(),
        }
    }

    /// Usable bins, ascending
    pub fn bins(&self) -> &[BinPitch] {
        &self.bins
    }

    /// One observation per usable bin of a frame's magnitude column
    pub fn observe(&self, magnitudes: ArrayView1<f32>) -> Vec<PitchObservation> {
        self.bins
            .iter()
            .filter(|b| b.bin < magnitudes.len())
            .map(|b| PitchObservation {
                pitch_class: b.pitch_class,
                offset: b.offset,
                intensity: compress_intensity(magnitudes[b.bin], &self.intensity),
            })
            .collect()
    }
}

/// Merged intensity of every bin sharing one pitch class in a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregatedNote {
    pub intensity: f32,
    /// Fractional offset of the loudest contributing bin
    pub offset: f32,
    /// Loudest single-bin intensity
    pub peak: f32,
    pub bins: usize,
}

/// Aggregated notes of one frame, keyed by pitch class
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameNotes {
    pub frame_idx: usize,
    pub notes: BTreeMap<u8, AggregatedNote>,
}

impl FrameNotes {
    pub fn new(frame_idx: usize) -> Self {
        Self {
            frame_idx,
            notes: BTreeMap::new(),
        }
    }

    pub fn get(&self, pitch: u8) -> Option<&AggregatedNote> {
        self.notes.get(&pitch)
    }

    /// Aggregated intensity, 0 when the pitch class is absent
    pub fn intensity(&self, pitch: u8) -> f32 {
        self.notes.get(&pitch).map_or(0.0, |n| n.intensity)
    }

    /// Record `intensity` for `pitch` directly
    pub fn insert(&mut self, pitch: u8, intensity: f32, offset: f32) {
        self.notes.insert(
            pitch,
            AggregatedNote {
                intensity,
                offset,
                peak: intensity,
                bins: 1,
            },
        );
    }
}

/// Collapse a frame's observations into one entry per pitch class
pub fn aggregate(
    frame_idx: usize,
    observations: &[PitchObservation],
    policy: AggregationPolicy,
) -> FrameNotes {
    let mut frame = FrameNotes::new(frame_idx);

    for obs in observations {
        if !(obs.intensity > 0.0) {
            continue;
        }

        let entry = frame.notes.entry(obs.pitch_class).or_insert(AggregatedNote {
            intensity: 0.0,
            offset: obs.offset,
            peak: 0.0,
            bins: 0,
        });

        entry.intensity = match policy {
            AggregationPolicy::Max => entry.intensity.max(obs.intensity),
            AggregationPolicy::RootSumSquares => entry.intensity.hypot(obs.intensity),
        };
        if obs.intensity > entry.peak {
            entry.peak = obs.intensity;
            entry.offset = obs.offset;
        }
        entry.bins += 1;
    }

    frame
}
