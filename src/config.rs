//! Configuration system for the transcription engine

use crate::error::{Result, TranscriptionError};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub frame: FrameConfig,
    pub band: BandConfig,
    pub intensity: IntensityConfig,
    pub aggregation: AggregationPolicy,
    pub tracking: TrackingConfig,
    pub velocity: VelocityConfig,
    pub export: ExportConfig,
    pub qa: QaConfig,
}

/// Input handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Rate the engine is tuned around
    pub working_rate: u32,
    /// Resample sources faster than `working_rate` down to it
    pub resample_above_working_rate: bool,
    pub channel_reduction: ChannelReduction,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            working_rate: 40960,
            resample_above_working_rate: true,
            channel_reduction: ChannelReduction::Left,
        }
    }
}

/// How multi-channel input is reduced to one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelReduction {
    /// First channel only
    Left,
    /// Mean of all channels
    Mix,
}

/// Analysis frame configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub frame_length: usize,
    /// Frames per frame length; hop = frame_length / overlap
    pub overlap: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_length: 16384,
            overlap: 2,
        }
    }
}

impl FrameConfig {
    pub fn hop_length(&self) -> usize {
        self.frame_length / self.overlap.max(1)
    }

    /// Hop duration in seconds at the given sample rate
    pub fn hop_sec(&self, sample_rate: u32) -> f64 {
        self.hop_length() as f64 / sample_rate as f64
    }
}

/// Usable frequency band, inclusive
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BandConfig {
    pub f_min: f32,
    pub f_max: f32,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            f_min: 64.0,
            f_max: 11175.0,
        }
    }
}

/// Which part of a complex bin stands in for its magnitude
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnitudeSource {
    /// |re + i·im|
    Modulus,
    /// |im|, the cheap approximation
    Imaginary,
}

/// Power-law intensity compression: `(magnitude * gain) ^ exponent * scale`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityConfig {
    pub magnitude: MagnitudeSource,
    pub gain: f32,
    pub exponent: f32,
    pub scale: f32,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self {
            magnitude: MagnitudeSource::Modulus,
            gain: 1.0,
            exponent: 0.6,
            scale: 1.125,
        }
    }
}

/// How bins mapping to the same pitch class are merged within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Keep the loudest bin only
    Max,
    /// sqrt(a² + b² + ...)
    #[default]
    RootSumSquares,
}

/// Note-state tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Aggregated intensity at or below this is silence
    pub min_intensity: f32,
    pub mode: TrackingMode,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_intensity: 4.0,
            mode: TrackingMode::Hysteresis { tolerance: 3 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackingMode {
    /// Hold a sounding note while its velocity stays within `tolerance`
    Hysteresis { tolerance: u8 },
    /// Release every note at the end of its frame
    PerFrame,
}

/// Which side of the central register a damping rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterBound {
    Below(u8),
    Above(u8),
}

impl RegisterBound {
    pub fn matches(&self, pitch: u8) -> bool {
        match *self {
            RegisterBound::Below(threshold) => pitch < threshold,
            RegisterBound::Above(threshold) => pitch > threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegisterRule {
    pub bound: RegisterBound,
    pub multiplier: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetStep {
    /// Upper bound on |fractional offset| for this step
    pub max_offset: f32,
    pub multiplier: f32,
}

/// Velocity shaping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    /// Every matching rule applies, so nested bounds cascade
    pub register: Vec<RegisterRule>,
    pub offset_weighting_enabled: bool,
    pub offset_weighting: Vec<OffsetStep>,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            register: default_register_rules(),
            offset_weighting_enabled: false,
            offset_weighting: default_offset_steps(),
        }
    }
}

/// Largest division a metrical SMF header can carry
pub const MAX_PPQ: u16 = 0x7FFF;
/// Upper bound on ticks per hop
pub const MAX_TICKS_PER_HOP: u32 = u16::MAX as u32;

/// MIDI export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub ppq: u16,
    /// Ticks between consecutive frame starts
    pub ticks_per_hop: u32,
    pub channel: u8,
    pub midi_filename: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            ppq: 480,
            ticks_per_hop: 120,
            channel: 0,
            midi_filename: "transcription.mid".to_string(),
        }
    }
}

/// QA artifacts configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    pub generate_images: bool,
    pub piano_roll_size: [u32; 2],
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            generate_images: true,
            piano_roll_size: [1600, 800],
        }
    }
}

fn default_register_rules() -> Vec<RegisterRule> {
    vec![
        RegisterRule { bound: RegisterBound::Below(56), multiplier: 0.8 },
        RegisterRule { bound: RegisterBound::Below(48), multiplier: 0.7 },
        RegisterRule { bound: RegisterBound::Below(40), multiplier: 0.6 },
        RegisterRule { bound: RegisterBound::Above(107), multiplier: 0.8 },
        RegisterRule { bound: RegisterBound::Above(113), multiplier: 0.7 },
        RegisterRule { bound: RegisterBound::Above(119), multiplier: 0.6 },
    ]
}

fn default_offset_steps() -> Vec<OffsetStep> {
    vec![
        OffsetStep { max_offset: 0.1, multiplier: 1.0 },
        OffsetStep { max_offset: 0.2, multiplier: 0.9 },
        OffsetStep { max_offset: 0.3, multiplier: 0.8 },
        OffsetStep { max_offset: 0.4, multiplier: 0.7 },
        OffsetStep { max_offset: 0.5, multiplier: 0.6 },
    ]
}

fn invalid(msg: impl Into<String>) -> TranscriptionError {
    TranscriptionError::ConfigValidationFailed(msg.into())
}

/// Validate configuration parameters
pub fn validate_config(config: &Config) -> Result<()> {
    let frame = &config.frame;
    if frame.frame_length == 0 {
        return Err(invalid("frame_length must be > 0"));
    }
    if frame.overlap == 0 {
        return Err(invalid("overlap must be > 0"));
    }
    if frame.overlap > frame.frame_length {
        return Err(invalid(format!(
            "overlap {} exceeds frame_length {}",
            frame.overlap, frame.frame_length
        )));
    }

    let band = &config.band;
    if !(band.f_min > 0.0) {
        return Err(invalid("f_min must be > 0"));
    }
    if band.f_min >= band.f_max {
        return Err(invalid(format!(
            "f_min ({}) must be < f_max ({})",
            band.f_min, band.f_max
        )));
    }

    let intensity = &config.intensity;
    if !(intensity.gain > 0.0) || !(intensity.exponent > 0.0) || !(intensity.scale > 0.0) {
        return Err(invalid("intensity gain, exponent and scale must be > 0"));
    }

    if !(config.tracking.min_intensity >= 0.0) {
        return Err(invalid("min_intensity must be >= 0"));
    }

    if config.audio.working_rate == 0 {
        return Err(invalid("working_rate must be > 0"));
    }

    let velocity = &config.velocity;
    if velocity.register.iter().any(|r| !(r.multiplier > 0.0)) {
        return Err(invalid("register multipliers must be > 0"));
    }
    if velocity.offset_weighting.iter().any(|s| !(s.multiplier > 0.0)) {
        return Err(invalid("offset multipliers must be > 0"));
    }
    if velocity
        .offset_weighting
        .windows(2)
        .any(|w| w[0].max_offset > w[1].max_offset)
    {
        return Err(invalid("offset steps must be sorted by max_offset"));
    }
    if velocity.offset_weighting_enabled && velocity.offset_weighting.is_empty() {
        return Err(invalid("offset weighting enabled without steps"));
    }

    let export = &config.export;
    if export.ppq == 0 || export.ticks_per_hop == 0 {
        return Err(invalid("ppq and ticks_per_hop must be > 0"));
    }
    if export.ppq > MAX_PPQ {
        return Err(invalid(format!("ppq {} exceeds {}", export.ppq, MAX_PPQ)));
    }
    if export.ticks_per_hop > MAX_TICKS_PER_HOP {
        return Err(invalid(format!(
            "ticks_per_hop {} exceeds {}",
            export.ticks_per_hop, MAX_TICKS_PER_HOP
        )));
    }
    if export.channel > 15 {
        return Err(invalid(format!("MIDI channel {} out of range", export.channel)));
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)
        .map_err(|e| invalid(format!("failed to parse configuration: {}", e)))?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<std::path::Path>>(config: &Config, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
