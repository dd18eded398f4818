//! Per-pitch note lifecycle tracking across frames
//!
//! Each of the 128 pitch classes is either idle or sounding. Every frame
//! resolves every pitch class to exactly one [`Transition`]; absence from the
//! frame counts as zero intensity, which is what releases held notes.

use crate::config::{TrackingConfig, TrackingMode};
use crate::pitch::FrameNotes;
use crate::velocity::VelocityShaper;
use serde::{Deserialize, Serialize};

pub const PITCH_CLASSES: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteEventKind {
    On,
    Off,
}

/// One note-on or note-off command, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub kind: NoteEventKind,
    pub pitch: u8,
    pub velocity: u8,
    /// Ticks since the previous event in the stream
    pub delta_ticks: u32,
    /// Absolute position in ticks
    pub tick: u64,
    /// Frame that produced the event
    pub frame_idx: usize,
}

impl NoteEvent {
    pub fn is_on(&self) -> bool {
        self.kind == NoteEventKind::On
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteStatus {
    #[default]
    Idle,
    Sounding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoteState {
    pub status: NoteStatus,
    /// Velocity of the last On
    pub current_velocity: u8,
    pub frames_since_change: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Idle and still silent
    Rest,
    Onset { velocity: u8 },
    /// Sounding, within tolerance of the current velocity
    Sustain,
    /// Sounding, but far enough from the current velocity to re-strike
    Retrigger { velocity: u8 },
    Release,
}

/// Decide the transition for one pitch class given this frame's aggregated
/// intensity and its shaped velocity.
pub fn next_transition(
    state: &NoteState,
    intensity: f32,
    velocity: u8,
    config: &TrackingConfig,
) -> Transition {
    let audible = intensity > config.min_intensity;

    match (state.status, audible) {
        (NoteStatus::Idle, false) => Transition::Rest,
        (NoteStatus::Idle, true) => Transition::Onset { velocity },
        (NoteStatus::Sounding, false) => Transition::Release,
        (NoteStatus::Sounding, true) => match config.mode {
            TrackingMode::Hysteresis { tolerance }
                if velocity.abs_diff(state.current_velocity) <= tolerance =>
            {
                Transition::Sustain
            }
            _ => Transition::Retrigger { velocity },
        },
    }
}

/// Owns the note-state table and turns aggregated frames into note events.
///
/// Frames must be fed strictly in temporal order. Frame `n` starts at tick
/// `n * ticks_per_hop`.
#[derive(Debug, Clone)]
pub struct NoteTracker {
    states: [NoteState; PITCH_CLASSES],
    config: TrackingConfig,
    shaper: VelocityShaper,
    ticks_per_hop: u32,
    /// Frames processed so far
    version: u64,
    last_event_tick: u64,
}

impl NoteTracker {
    pub fn new(config: &TrackingConfig, shaper: VelocityShaper, ticks_per_hop: u32) -> Self {
        Self {
            states: [NoteState::default(); PITCH_CLASSES],
            config: config.clone(),
            shaper,
            ticks_per_hop,
            version: 0,
            last_event_tick: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_sounding(&self, pitch: u8) -> bool {
        self.states
            .get(pitch as usize)
            .is_some_and(|s| s.status == NoteStatus::Sounding)
    }

    pub fn sounding_count(&self) -> usize {
        self.states
            .iter()
            .filter(|s| s.status == NoteStatus::Sounding)
            .count()
    }

    fn frame_tick(&self, frame: u64) -> u64 {
        frame * self.ticks_per_hop as u64
    }

    /// Advance one frame, returning the events it produced
    pub fn update(&mut self, frame: &FrameNotes) -> Vec<NoteEvent> {
        let tick = self.frame_tick(self.version);
        let mut events = Vec::new();

        for pitch in 0..PITCH_CLASSES as u8 {
            let (intensity, offset) = frame
                .get(pitch)
                .map_or((0.0, 0.0), |n| (n.intensity, n.offset));
            // A zero-velocity note-on reads as a note-off downstream
            let velocity = self.shaper.shape(intensity, pitch, offset).max(1);
            let state = self.states[pitch as usize];

            match next_transition(&state, intensity, velocity, &self.config) {
                Transition::Rest | Transition::Sustain => {
                    let slot = &mut self.states[pitch as usize];
                    slot.frames_since_change = slot.frames_since_change.saturating_add(1);
                }
                Transition::Onset { velocity } => {
                    self.emit(&mut events, NoteEventKind::On, pitch, velocity, tick, frame.frame_idx);
                    self.states[pitch as usize] = NoteState {
                        status: NoteStatus::Sounding,
                        current_velocity: velocity,
                        frames_since_change: 0,
                    };
                }
                Transition::Retrigger { velocity } => {
                    self.emit(&mut events, NoteEventKind::Off, pitch, 0, tick, frame.frame_idx);
                    self.emit(&mut events, NoteEventKind::On, pitch, velocity, tick, frame.frame_idx);
                    self.states[pitch as usize] = NoteState {
                        status: NoteStatus::Sounding,
                        current_velocity: velocity,
                        frames_since_change: 0,
                    };
                }
                Transition::Release => {
                    self.emit(&mut events, NoteEventKind::Off, pitch, 0, tick, frame.frame_idx);
                    self.states[pitch as usize] = NoteState::default();
                }
            }
        }

        self.version += 1;

        if self.config.mode == TrackingMode::PerFrame {
            let end_tick = self.frame_tick(self.version);
            self.release_all(&mut events, end_tick, frame.frame_idx);
        }

        events
    }

    /// Release everything still sounding at the end of the last frame
    pub fn finish(&mut self) -> Vec<NoteEvent> {
        let mut events = Vec::new();
        let end_tick = self.frame_tick(self.version);
        let last_frame = self.version.saturating_sub(1) as usize;
        self.release_all(&mut events, end_tick, last_frame);
        events
    }

    /// Feed every frame in order and finish the stream
    pub fn run(&mut self, frames: &[FrameNotes]) -> Vec<NoteEvent> {
        let mut events = Vec::new();
        for frame in frames {
            events.extend(self.update(frame));
        }
        events.extend(self.finish());
        events
    }

    fn release_all(&mut self, events: &mut Vec<NoteEvent>, tick: u64, frame_idx: usize) {
        for pitch in 0..PITCH_CLASSES as u8 {
            if self.states[pitch as usize].status == NoteStatus::Sounding {
                self.emit(events, NoteEventKind::Off, pitch, 0, tick, frame_idx);
                self.states[pitch as usize] = NoteState::default();
            }
        }
    }

    fn emit(
        &mut self,
        events: &mut Vec<NoteEvent>,
        kind: NoteEventKind,
        pitch: u8,
        velocity: u8,
        tick: u64,
        frame_idx: usize,
    ) {
        let delta = tick.saturating_sub(self.last_event_tick);
        self.last_event_tick = tick;
        events.push(NoteEvent {
            kind,
            pitch,
            velocity,
            delta_ticks: u32::try_from(delta).unwrap_or(u32::MAX),
            tick,
            frame_idx,
        });
    }
}
