//! Velocity shaping: register damping, tuning weighting, clamping

use crate::config::{OffsetStep, RegisterRule, VelocityConfig};

pub const MAX_VELOCITY: u8 = 127;

/// Maps aggregated intensity to a MIDI velocity.
#[derive(Debug, Clone)]
pub struct VelocityShaper {
    register: Vec<RegisterRule>,
    offset_steps: Option<Vec<OffsetStep>>,
}

impl VelocityShaper {
    pub fn new(config: &VelocityConfig) -> Self {
        Self {
            register: config.register.clone(),
            offset_steps: config
                .offset_weighting_enabled
                .then(|| config.offset_weighting.clone()),
        }
    }

    /// Shape `intensity` for `pitch`; `offset` is the fractional distance
    /// from the nearest semitone.
    pub fn shape(&self, intensity: f32, pitch: u8, offset: f32) -> u8 {
        let mut velocity = intensity * register_damping(pitch, &self.register);
        if let Some(steps) = &self.offset_steps {
            velocity *= offset_weight(offset, steps);
        }
        clamp_velocity(velocity)
    }
}

/// Product of the multipliers of every rule matching `pitch`
pub fn register_damping(pitch: u8, rules: &[RegisterRule]) -> f32 {
    rules
        .iter()
        .filter(|rule| rule.bound.matches(pitch))
        .map(|rule| rule.multiplier)
        .product()
}

/// Multiplier of the first step bounding `|offset|`, else the last step's
pub fn offset_weight(offset: f32, steps: &[OffsetStep]) -> f32 {
    let distance = offset.abs();
    steps
        .iter()
        .find(|step| distance <= step.max_offset)
        .or(steps.last())
        .map_or(1.0, |step| step.multiplier)
}

/// Round and clamp to 0..=127
pub fn clamp_velocity(velocity: f32) -> u8 {
    if velocity.is_nan() {
        return 0;
    }
    velocity.round().clamp(0.0, MAX_VELOCITY as f32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegisterBound;

    fn default_shaper() -> VelocityShaper {
        VelocityShaper::new(&VelocityConfig::default())
    }

    #[test]
    fn test_central_register_is_undamped() {
        let shaper = default_shaper();
        assert_eq!(shaper.shape(64.0, 69, 0.0), 64);
        assert_eq!(shaper.shape(64.0, 56, 0.0), 64);
        assert_eq!(shaper.shape(64.0, 107, 0.0), 64);
    }

    #[test]
    fn test_register_damping_cascades() {
        let rules = VelocityConfig::default().register;
        assert!((register_damping(69, &rules) - 1.0).abs() < 1e-6);
        assert!((register_damping(50, &rules) - 0.8).abs() < 1e-6);
        assert!((register_damping(45, &rules) - 0.56).abs() < 1e-6);
        assert!((register_damping(30, &rules) - 0.336).abs() < 1e-6);
        assert!((register_damping(110, &rules) - 0.8).abs() < 1e-6);
        assert!((register_damping(125, &rules) - 0.336).abs() < 1e-6);
    }

    #[test]
    fn test_custom_register_rules() {
        let rules = vec![RegisterRule {
            bound: RegisterBound::Above(60),
            multiplier: 0.5,
        }];
        assert_eq!(register_damping(61, &rules), 0.5);
        assert_eq!(register_damping(60, &rules), 1.0);
        assert_eq!(register_damping(60, &[]), 1.0);
    }

    #[test]
    fn test_offset_weighting() {
        let steps = VelocityConfig::default().offset_weighting;
        assert_eq!(offset_weight(0.0, &steps), 1.0);
        assert_eq!(offset_weight(-0.15, &steps), 0.9);
        assert_eq!(offset_weight(0.35, &steps), 0.7);
        assert_eq!(offset_weight(0.5, &steps), 0.6);
        assert_eq!(offset_weight(0.7, &steps), 0.6);
        assert_eq!(offset_weight(0.3, &[]), 1.0);
    }

    #[test]
    fn test_offset_weighting_only_when_enabled() {
        let mut config = VelocityConfig::default();
        assert_eq!(VelocityShaper::new(&config).shape(100.0, 69, 0.45), 100);

        config.offset_weighting_enabled = true;
        assert_eq!(VelocityShaper::new(&config).shape(100.0, 69, 0.45), 60);
        assert_eq!(VelocityShaper::new(&config).shape(100.0, 69, 0.05), 100);
    }

    #[test]
    fn test_clamp_bounds() {
        assert_eq!(clamp_velocity(-3.0), 0);
        assert_eq!(clamp_velocity(1e9), 127);
        assert_eq!(clamp_velocity(f32::INFINITY), 127);
        assert_eq!(clamp_velocity(f32::NAN), 0);
        assert_eq!(clamp_velocity(63.5), 64);
    }

    #[test]
    fn test_velocity_monotonic_in_intensity() {
        let mut config = VelocityConfig::default();
        config.offset_weighting_enabled = true;
        let shaper = VelocityShaper::new(&config);

        for &(pitch, offset) in &[(30u8, 0.0f32), (69, 0.25), (120, -0.45)] {
            let mut previous = 0u8;
            for step in 0..2000 {
                let intensity = step as f32 * 0.25;
                let v = shaper.shape(intensity, pitch, offset);
                assert!(v >= previous);
                assert!(v <= MAX_VELOCITY);
                previous = v;
            }
        }
    }
}
