//! Validation tests for Pass 0: Preflight & Resampling

use wav2midi::audio::{peak, AudioState, REFERENCE_FULL_SCALE};
use wav2midi::config::Config;
use wav2midi::passes::pass_0;
use std::f64::consts::PI;

fn generate_sine(freq: f64, amplitude: f64, sr: u32, n_samples: usize) -> Vec<f32> {
    (0..n_samples)
        .map(|i| (amplitude * (2.0 * PI * freq * i as f64 / sr as f64).sin()) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_source_is_resampled_to_working_rate() {
        let config = Config::default();
        let audio = generate_sine(440.0, 10000.0, 96000, 96000);
        let mut state = AudioState::from_test_samples(audio, 96000, &config);

        pass_0::run(&mut state, &config).unwrap();

        assert_eq!(state.sr, 40960);
        assert_eq!(state.source_sr, 96000);
        let expected = 40960i64;
        assert!(
            (state.n_samples() as i64 - expected).abs() < 512,
            "got {} samples",
            state.n_samples()
        );
        assert!(peak(&state.y) < 11000.0);
    }

    #[test]
    fn test_resampled_output_stays_in_range() {
        let config = Config::default();
        // Square-ish wave at full scale rings when band-limited
        let audio: Vec<f32> = (0..48000)
            .map(|i| if (i / 40) % 2 == 0 { 32767.0 } else { -32768.0 })
            .collect();
        let mut state = AudioState::from_test_samples(audio, 48000, &config);

        pass_0::run(&mut state, &config).unwrap();

        for &x in &state.y {
            assert!(x >= -REFERENCE_FULL_SCALE && x <= REFERENCE_FULL_SCALE - 1.0);
        }
    }

    #[test]
    fn test_silent_and_short_inputs_are_not_errors() {
        let config = Config::default();
        let mut silent = AudioState::from_test_samples(vec![0.0; 50000], 40960, &config);
        assert!(pass_0::run(&mut silent, &config).is_ok());

        let mut short = AudioState::from_test_samples(vec![100.0; 10], 40960, &config);
        assert!(pass_0::run(&mut short, &config).is_ok());
    }

    #[test]
    fn test_inverted_band_is_fatal() {
        let mut config = Config::default();
        config.band.f_min = 500.0;
        config.band.f_max = 100.0;
        let mut state = AudioState::from_test_samples(vec![0.0; 20000], 40960, &config);
        assert!(pass_0::run(&mut state, &config).is_err());
    }
}
