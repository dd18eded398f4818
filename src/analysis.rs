//! Note-span reconstruction and JSON analysis export

use crate::audio::AudioState;
use crate::error::Result;
use crate::midi::TempoDirective;
use crate::tracker::{NoteEvent, NoteEventKind, PITCH_CLASSES};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One sounding note, from its On to its matching Off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NoteSpan {
    pub pitch: u8,
    pub velocity: u8,
    pub start_tick: u64,
    pub end_tick: u64,
}

impl NoteSpan {
    pub fn duration_ticks(&self) -> u64 {
        self.end_tick - self.start_tick
    }
}

/// Pair every On with the next Off of the same pitch.
/// Spans are ordered by start tick, then pitch.
pub fn note_spans(events: &[NoteEvent]) -> Vec<NoteSpan> {
    let mut open: [Option<(u64, u8)>; PITCH_CLASSES] = [None; PITCH_CLASSES];
    let mut spans = Vec::new();

    for event in events {
        let slot = &mut open[event.pitch as usize % PITCH_CLASSES];
        match event.kind {
            NoteEventKind::On => *slot = Some((event.tick, event.velocity)),
            NoteEventKind::Off => {
                if let Some((start_tick, velocity)) = slot.take() {
                    spans.push(NoteSpan {
                        pitch: event.pitch,
                        velocity,
                        start_tick,
                        end_tick: event.tick,
                    });
                }
            }
        }
    }

    spans.sort_by_key(|s| (s.start_tick, s.pitch));
    spans
}

/// Summary written to `analysis.json`
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub source_sample_rate: u32,
    pub working_sample_rate: u32,
    pub duration_sec: f32,
    pub frame_length: usize,
    pub hop_length: usize,
    pub hop_sec: f64,
    pub frame_count: usize,
    pub ticks_per_hop: u32,
    pub tempo: Option<TempoDirective>,
    pub note_on_count: usize,
    pub note_off_count: usize,
    /// Note count per pitch class
    pub pitch_histogram: BTreeMap<u8, usize>,
    pub spans: Vec<NoteSpan>,
}

pub fn build_report(state: &AudioState) -> AnalysisReport {
    let spans = note_spans(&state.note_events);
    let mut pitch_histogram = BTreeMap::new();
    for span in &spans {
        *pitch_histogram.entry(span.pitch).or_insert(0) += 1;
    }
    let note_on_count = state.note_events.iter().filter(|e| e.is_on()).count();

    AnalysisReport {
        source_sample_rate: state.source_sr,
        working_sample_rate: state.sr,
        duration_sec: state.duration_sec(),
        frame_length: state.config.frame.frame_length,
        hop_length: state.config.frame.hop_length(),
        hop_sec: state.hop_sec(),
        frame_count: state.frame_count(),
        ticks_per_hop: state.config.export.ticks_per_hop,
        tempo: state.tempo,
        note_on_count,
        note_off_count: state.note_events.len() - note_on_count,
        pitch_histogram,
        spans,
    }
}

/// Seconds from stream start for a tick position
pub fn ticks_to_sec(tick: u64, hop_sec: f64, ticks_per_hop: u32) -> f64 {
    tick as f64 * hop_sec / ticks_per_hop.max(1) as f64
}

/// Write `analysis.json` into `output_dir`
pub fn export_analysis(state: &AudioState, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join("analysis.json");
    let report = build_report(state);
    std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
    log::info!("Analysis written to {}", path.display());
    Ok(path)
}
