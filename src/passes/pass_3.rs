//! Pass 3: Note-State Tracking & Velocity Shaping

use crate::audio::AudioState;
use crate::config::Config;
use crate::error::Result;
use crate::midi::TempoDirective;
use crate::tracker::NoteTracker;
use crate::velocity::VelocityShaper;

pub fn run(state: &mut AudioState, config: &Config) -> Result<()> {
    let shaper = VelocityShaper::new(&config.velocity);
    let mut tracker = NoteTracker::new(&config.tracking, shaper, config.export.ticks_per_hop);

    state.note_events = tracker.run(&state.frame_notes);
    state.tempo = Some(TempoDirective::from_hop(
        state.hop_sec(),
        config.export.ppq,
        config.export.ticks_per_hop,
    ));

    let note_ons = state.note_events.iter().filter(|e| e.is_on()).count();
    log::info!(
        "Pass 3: {} note-on / {} note-off events over {} frames",
        note_ons,
        state.note_events.len() - note_ons,
        tracker.version()
    );

    Ok(())
}
