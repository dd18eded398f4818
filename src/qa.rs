//! QA artifacts generation

use crate::analysis::{note_spans, ticks_to_sec, NoteSpan};
use crate::audio::AudioState;
use crate::config::Config;
use crate::error::{Result, TranscriptionError};
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Generate QA artifacts (piano roll, statistics report)
pub fn generate_artifacts(state: &AudioState, output_dir: &Path, config: &Config) -> Result<()> {
    let qa_dir = output_dir.join("qa");
    fs::create_dir_all(&qa_dir)?;

    let spans = note_spans(&state.note_events);

    if config.qa.generate_images {
        generate_piano_roll(&spans, &qa_dir, config.qa.piano_roll_size)?;
    }
    generate_statistics_report(state, &spans, &qa_dir)?;

    log::info!("QA artifacts generated in {}", qa_dir.display());
    Ok(())
}

fn qa_error<E: std::fmt::Debug>(what: &str) -> impl FnOnce(E) -> TranscriptionError + '_ {
    move |e| TranscriptionError::QaGenerationError(format!("Failed to {}: {:?}", what, e))
}

/// Velocity mapped onto a blue (soft) to red (loud) ramp
fn velocity_color(velocity: u8) -> RGBColor {
    let t = velocity as f32 / 127.0;
    RGBColor((255.0 * t) as u8, 40, (255.0 * (1.0 - t)) as u8)
}

/// Piano roll: time in ticks against pitch class
fn generate_piano_roll(spans: &[NoteSpan], output_dir: &Path, size: [u32; 2]) -> Result<()> {
    let path = output_dir.join("piano_roll.png");
    let root = BitMapBackend::new(&path, (size[0], size[1])).into_drawing_area();
    root.fill(&WHITE).map_err(qa_error("fill plot background"))?;

    let end_tick = spans.iter().map(|s| s.end_tick).max().unwrap_or(0).max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption("Piano Roll", ("sans-serif", 30))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0u64..end_tick, 0u32..128u32)
        .map_err(qa_error("build chart"))?;

    chart
        .configure_mesh()
        .x_desc("Time (ticks)")
        .y_desc("Pitch")
        .draw()
        .map_err(qa_error("draw mesh"))?;

    chart
        .draw_series(spans.iter().map(|span| {
            let pitch = span.pitch as u32;
            Rectangle::new(
                [(span.start_tick, pitch), (span.end_tick, pitch + 1)],
                velocity_color(span.velocity).filled(),
            )
        }))
        .map_err(qa_error("draw notes"))?;

    root.present().map_err(qa_error("write piano roll"))?;
    Ok(())
}

fn generate_statistics_report(
    state: &AudioState,
    spans: &[NoteSpan],
    output_dir: &Path,
) -> Result<()> {
    let report = render_statistics(state, spans).map_err(qa_error("format statistics"))?;
    fs::write(output_dir.join("statistics.txt"), report)?;
    Ok(())
}

/// Plain-text summary of the transcription
fn render_statistics(
    state: &AudioState,
    spans: &[NoteSpan],
) -> std::result::Result<String, std::fmt::Error> {
    let hop_sec = state.hop_sec();
    let ticks_per_hop = state.config.export.ticks_per_hop;
    let mut report = String::new();

    writeln!(report, "Transcription statistics")?;
    writeln!(report, "========================")?;
    writeln!(
        report,
        "Audio: {:.2}s at {} Hz (source {} Hz)",
        state.duration_sec(),
        state.sr,
        state.source_sr
    )?;
    writeln!(
        report,
        "Frames: {} x {} samples, hop {:.3}s",
        state.frame_count(),
        state.config.frame.frame_length,
        hop_sec
    )?;
    if let Some(tempo) = &state.tempo {
        writeln!(report, "Tempo: {:.2} BPM", tempo.bpm)?;
    }
    writeln!(report, "Events: {}", state.note_events.len())?;
    writeln!(report, "Notes: {}", spans.len())?;

    if !spans.is_empty() {
        let mean_ticks =
            spans.iter().map(|s| s.duration_ticks()).sum::<u64>() as f64 / spans.len() as f64;
        let mean_velocity =
            spans.iter().map(|s| s.velocity as f64).sum::<f64>() / spans.len() as f64;
        writeln!(
            report,
            "Mean duration: {:.3}s",
            ticks_to_sec(mean_ticks.round() as u64, hop_sec, ticks_per_hop)
        )?;
        writeln!(report, "Mean velocity: {:.1}", mean_velocity)?;

        let mut per_pitch: BTreeMap<u8, usize> = BTreeMap::new();
        for span in spans {
            *per_pitch.entry(span.pitch).or_insert(0) += 1;
        }
        let mut busiest: Vec<_> = per_pitch.into_iter().collect();
        busiest.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        writeln!(report, "\nBusiest pitches:")?;
        for (pitch, count) in busiest.iter().take(10) {
            writeln!(report, "  {:3}: {}", pitch, count)?;
        }

        let mut buckets = [0usize; 8];
        for span in spans {
            buckets[(span.velocity / 16) as usize] += 1;
        }
        writeln!(report, "\nVelocity histogram:")?;
        for (i, count) in buckets.iter().enumerate() {
            writeln!(report, "  {:3}-{:3}: {}", i * 16, i * 16 + 15, count)?;
        }
    }

    Ok(report)
}
