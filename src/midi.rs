//! MIDI export functionality

use crate::audio::AudioState;
use crate::config::{Config, ExportConfig};
use crate::error::{Result, TranscriptionError};
use crate::tracker::{NoteEvent, NoteEventKind};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, TrackEvent, TrackEventKind};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Largest value a tempo meta event can carry
const MAX_MICROS_PER_QUARTER: u32 = 0x00FF_FFFF;

/// Leading tempo of the event stream, chosen so `ticks_per_hop` ticks last
/// exactly one hop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TempoDirective {
    pub micros_per_quarter: u32,
    pub bpm: f64,
}

impl TempoDirective {
    pub fn from_hop(hop_sec: f64, ppq: u16, ticks_per_hop: u32) -> Self {
        let quarter_sec = hop_sec * ppq as f64 / ticks_per_hop as f64;
        let micros_per_quarter =
            (quarter_sec * 1e6).round().clamp(1.0, MAX_MICROS_PER_QUARTER as f64) as u32;
        Self {
            micros_per_quarter,
            bpm: 60_000_000.0 / micros_per_quarter as f64,
        }
    }
}

/// Export MIDI file from processed audio state
pub fn export_midi(state: &AudioState, output_dir: &Path, config: &Config) -> Result<PathBuf> {
    if state.note_events.is_empty() {
        log::warn!("No note events; writing tempo-only MIDI file");
    }

    std::fs::create_dir_all(output_dir)?;
    let midi_path = output_dir.join(&config.export.midi_filename);

    let tempo = state.tempo.unwrap_or_else(|| {
        TempoDirective::from_hop(state.hop_sec(), config.export.ppq, config.export.ticks_per_hop)
    });
    let midi_data = encode_smf(&state.note_events, &tempo, &config.export)?;

    let mut file = File::create(&midi_path)?;
    file.write_all(&midi_data)?;

    log::info!(
        "Exported {} note events to {}",
        state.note_events.len(),
        midi_path.display()
    );
    Ok(midi_path)
}

/// Serialize the event stream as a single-track standard MIDI file
pub fn encode_smf(
    events: &[NoteEvent],
    tempo: &TempoDirective,
    export: &ExportConfig,
) -> Result<Vec<u8>> {
    let channel = u4::try_from(export.channel).ok_or_else(|| {
        TranscriptionError::MidiExportError(format!("channel {} out of range", export.channel))
    })?;
    let division = u15::try_from(export.ppq).ok_or_else(|| {
        TranscriptionError::MidiExportError(format!("ppq {} does not fit 15 bits", export.ppq))
    })?;
    let mut track_events = Vec::with_capacity(events.len() + 2);

    track_events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(tempo.micros_per_quarter))),
    });

    for event in events {
        let delta = u28::try_from(event.delta_ticks).ok_or_else(|| {
            TranscriptionError::MidiExportError(format!(
                "delta of {} ticks at tick {} does not fit 28 bits",
                event.delta_ticks, event.tick
            ))
        })?;
        let key = u7::from(event.pitch);
        let message = match event.kind {
            NoteEventKind::On => MidiMessage::NoteOn {
                key,
                vel: u7::from(event.velocity),
            },
            NoteEventKind::Off => MidiMessage::NoteOff {
                key,
                vel: u7::from(0),
            },
        };
        track_events.push(TrackEvent {
            delta,
            kind: TrackEventKind::Midi { channel, message },
        });
    }

    track_events.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let header = Header {
        format: Format::SingleTrack,
        timing: midly::Timing::Metrical(division),
    };

    let smf = Smf {
        header,
        tracks: vec![track_events],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes).map_err(|e| {
        TranscriptionError::MidiExportError(format!("Failed to write MIDI data: {:?}", e))
    })?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: NoteEventKind, pitch: u8, velocity: u8, delta_ticks: u32) -> NoteEvent {
        NoteEvent {
            kind,
            pitch,
            velocity,
            delta_ticks,
            tick: 0,
            frame_idx: 0,
        }
    }

    #[test]
    fn test_tempo_from_hop() {
        // 8192-sample hop at 40960 Hz, 120 ticks per hop, 480 ppq
        let tempo = TempoDirective::from_hop(0.2, 480, 120);
        assert_eq!(tempo.micros_per_quarter, 800_000);
        assert!((tempo.bpm - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_is_clamped() {
        let tempo = TempoDirective::from_hop(1000.0, 480, 1);
        assert_eq!(tempo.micros_per_quarter, MAX_MICROS_PER_QUARTER);
    }

    #[test]
    fn test_encode_preserves_order_and_deltas() {
        let events = vec![
            event(NoteEventKind::On, 69, 100, 0),
            event(NoteEventKind::Off, 69, 0, 120),
            event(NoteEventKind::On, 72, 64, 0),
            event(NoteEventKind::Off, 72, 0, 240),
        ];
        let tempo = TempoDirective::from_hop(0.2, 480, 120);
        let bytes = encode_smf(&events, &tempo, &ExportConfig::default()).unwrap();

        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.header.timing, midly::Timing::Metrical(u15::from(480)));
        let track = &smf.tracks[0];
        assert_eq!(track.len(), events.len() + 2);
        assert_eq!(
            track[0].kind,
            TrackEventKind::Meta(MetaMessage::Tempo(u24::from(800_000)))
        );
        assert_eq!(track.last().unwrap().kind, TrackEventKind::Meta(MetaMessage::EndOfTrack));

        for (written, source) in track[1..=events.len()].iter().zip(&events) {
            assert_eq!(written.delta.as_int(), source.delta_ticks);
            match (written.kind, source.kind) {
                (
                    TrackEventKind::Midi {
                        message: MidiMessage::NoteOn { key, vel },
                        ..
                    },
                    NoteEventKind::On,
                ) => {
                    assert_eq!(key.as_int(), source.pitch);
                    assert_eq!(vel.as_int(), source.velocity);
                }
                (
                    TrackEventKind::Midi {
                        message: MidiMessage::NoteOff { key, .. },
                        ..
                    },
                    NoteEventKind::Off,
                ) => assert_eq!(key.as_int(), source.pitch),
                other => panic!("unexpected event pair {:?}", other),
            }
        }
    }

    #[test]
    fn test_division_is_written_exactly() {
        let export = ExportConfig {
            ppq: 0x7FFF,
            ..ExportConfig::default()
        };
        let tempo = TempoDirective::from_hop(0.2, export.ppq, export.ticks_per_hop);
        let bytes = encode_smf(&[], &tempo, &export).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        match smf.header.timing {
            midly::Timing::Metrical(ppq) => assert_eq!(ppq.as_int(), 0x7FFF),
            other => panic!("unexpected timing {:?}", other),
        }
    }

    #[test]
    fn test_oversized_division_is_rejected() {
        let export = ExportConfig {
            ppq: 40000,
            ..ExportConfig::default()
        };
        let tempo = TempoDirective::from_hop(0.2, export.ppq, export.ticks_per_hop);
        assert!(matches!(
            encode_smf(&[], &tempo, &export),
            Err(TranscriptionError::MidiExportError(_))
        ));
    }

    #[test]
    fn test_oversized_delta_is_rejected() {
        let events = vec![event(NoteEventKind::On, 60, 90, 1 << 28)];
        let tempo = TempoDirective::from_hop(0.2, 480, 120);
        assert!(matches!(
            encode_smf(&events, &tempo, &ExportConfig::default()),
            Err(TranscriptionError::MidiExportError(_))
        ));
    }

    #[test]
    fn test_empty_stream_is_tempo_only() {
        let tempo = TempoDirective::from_hop(0.1, 480, 120);
        let bytes = encode_smf(&[], &tempo, &ExportConfig::default()).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks[0].len(), 2);
    }
}
