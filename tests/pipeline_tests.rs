//! End-to-end tests: WAV file in, Standard MIDI File out

use hound::{SampleFormat, WavSpec, WavWriter};
use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use std::f64::consts::PI;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wav2midi::config::{ChannelReduction, Config};
use wav2midi::{transcribe_samples, validate_input, NoteEventKind, Wav2Midi};

fn write_wav_i16(path: &Path, sr: u32, channels: Vec<Vec<f64>>) {
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate: sr,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    let n = channels[0].len();
    for i in 0..n {
        for ch in &channels {
            writer.write_sample(ch[i].round() as i16).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn sine(freq: f64, amplitude: f64, sr: u32, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| amplitude * (2.0 * PI * freq * i as f64 / sr as f64).sin())
        .collect()
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.qa.generate_images = false;
    config
}

fn note_ons(smf: &Smf) -> Vec<(u8, u8)> {
    smf.tracks[0]
        .iter()
        .filter_map(|ev| match ev.kind {
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { key, vel },
                ..
            } if vel.as_int() > 0 => Some((key.as_int(), vel.as_int())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_wav_to_midi() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a440.wav");
        write_wav_i16(&input, 40960, vec![sine(440.0, 10000.0, 40960, 81920)]);

        let processor = Wav2Midi::new(test_config()).unwrap();
        let out = dir.path().join("out");
        let state = processor.process(&input, &out).unwrap();
        assert_eq!(state.frame_count(), 9);

        let bytes = fs::read(out.join("transcription.mid")).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 1);

        let ons = note_ons(&smf);
        assert_eq!(ons.len(), 1);
        assert_eq!(ons[0].0, 69);

        let has_tempo = smf.tracks[0].iter().any(|ev| {
            matches!(ev.kind, TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 800_000)
        });
        assert!(has_tempo);
        assert!(matches!(
            smf.tracks[0].last().map(|ev| ev.kind),
            Some(TrackEventKind::Meta(MetaMessage::EndOfTrack))
        ));

        assert!(out.join("analysis.json").exists());
        assert!(out.join("qa").join("statistics.txt").exists());
    }

    #[test]
    fn test_silent_wav_writes_tempo_only_file() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("silence.wav");
        write_wav_i16(&input, 40960, vec![vec![0.0; 40960]]);

        let processor = Wav2Midi::new(test_config()).unwrap();
        let out = dir.path().join("out");
        let state = processor.process(&input, &out).unwrap();
        assert!(state.note_events.is_empty());

        let bytes = fs::read(out.join("transcription.mid")).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert!(note_ons(&smf).is_empty());
        assert_eq!(smf.tracks[0].len(), 2);
    }

    #[test]
    fn test_stereo_left_channel_reduction() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("stereo.wav");
        write_wav_i16(
            &input,
            40960,
            vec![sine(440.0, 10000.0, 40960, 32768), vec![0.0; 32768]],
        );

        let mut left = test_config();
        left.audio.channel_reduction = ChannelReduction::Left;
        let state = Wav2Midi::new(left).unwrap().process(&input, dir.path().join("l")).unwrap();
        assert_eq!(state.channels, 2);
        assert!(state.note_events.iter().any(|e| e.is_on() && e.pitch == 69));

        // Swapped channels: the left one is silent
        let swapped = dir.path().join("swapped.wav");
        write_wav_i16(
            &swapped,
            40960,
            vec![vec![0.0; 32768], sine(440.0, 10000.0, 40960, 32768)],
        );
        let mut left = test_config();
        left.audio.channel_reduction = ChannelReduction::Left;
        let state = Wav2Midi::new(left).unwrap().process(&swapped, dir.path().join("s")).unwrap();
        assert!(state.note_events.is_empty());

        let mut mix = test_config();
        mix.audio.channel_reduction = ChannelReduction::Mix;
        let state = Wav2Midi::new(mix).unwrap().process(&swapped, dir.path().join("m")).unwrap();
        assert!(state.note_events.iter().any(|e| e.is_on() && e.pitch == 69));
    }

    #[test]
    fn test_high_rate_input_is_resampled() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a440_48k.wav");
        write_wav_i16(&input, 48000, vec![sine(440.0, 10000.0, 48000, 96000)]);

        let state = Wav2Midi::new(test_config()).unwrap().process(&input, dir.path()).unwrap();
        assert_eq!(state.sr, 40960);
        assert_eq!(state.source_sr, 48000);
        assert!(state.note_events.iter().any(|e| e.is_on() && e.pitch == 69));
    }

    #[test]
    fn test_transcribe_samples_in_memory() {
        let config = Config::default();
        let audio: Vec<f32> = sine(440.0, 10000.0, 40960, 16384)
            .into_iter()
            .map(|x| x as f32)
            .collect();
        let events = transcribe_samples(&audio, 40960, &config).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!((events[0].kind, events[0].pitch), (NoteEventKind::On, 69));
        assert_eq!((events[1].kind, events[1].pitch), (NoteEventKind::Off, 69));

        let short = transcribe_samples(&audio[..1000], 40960, &config).unwrap();
        assert!(short.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let mut config = Config::default();
        config.export.ticks_per_hop = 0;
        assert!(Wav2Midi::new(config).is_err());
    }

    #[test]
    fn test_validate_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("ok.wav");
        write_wav_i16(&input, 44100, vec![sine(220.0, 5000.0, 44100, 4410)]);
        assert!(validate_input(&input, &Config::default()).is_ok());

        let missing = dir.path().join("missing.wav");
        assert!(validate_input(&missing, &Config::default()).is_err());

        let garbage = dir.path().join("garbage.wav");
        fs::write(&garbage, b"not a wav file").unwrap();
        assert!(validate_input(&garbage, &Config::default()).is_err());
    }
}
