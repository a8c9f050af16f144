// Velocity curve - maps raw strike velocity to a perceptual level in [0, 1]
//
// Piecewise-linear over fixed control points. The default points place the
// eight dynamic markings (MIN, PP, P, MP, MF, F, FF, MAX) at equal level steps.

use crate::error::ConfigError;
use tracing::warn;

/// (velocity, level) control points for the standard dynamics scale
const DYNAMICS: [(i32, f32); 8] = [
    (10, 0.0),
    (20, 1.0 / 7.0),
    (30, 2.0 / 7.0),
    (40, 3.0 / 7.0),
    (55, 4.0 / 7.0),
    (70, 5.0 / 7.0),
    (90, 6.0 / 7.0),
    (127, 1.0),
];

/// Result of a curve lookup, distinguishing clamped values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveLookup {
    InRange(f32),
    /// At or below the first control point; level clamped to 0
    BelowRange(f32),
    /// Beyond the last control point; level clamped to 1
    AboveRange(f32),
}

impl CurveLookup {
    pub fn level(self) -> f32 {
        match self {
            CurveLookup::InRange(level)
            | CurveLookup::BelowRange(level)
            | CurveLookup::AboveRange(level) => level,
        }
    }

    pub fn is_in_range(self) -> bool {
        matches!(self, CurveLookup::InRange(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VelocityCurve {
    points: Vec<(i32, f32)>,
}

impl VelocityCurve {
    /// Build a curve from control points. Velocities must be strictly
    /// increasing and levels non-decreasing from exactly 0 to exactly 1.
    pub fn new(points: Vec<(i32, f32)>) -> Result<Self, ConfigError> {
        if points.len() < 2 {
            return Err(ConfigError::InvalidCurve(
                "at least two control points required".to_string(),
            ));
        }
        for pair in points.windows(2) {
            let ((v0, l0), (v1, l1)) = (pair[0], pair[1]);
            if v1 <= v0 {
                return Err(ConfigError::InvalidCurve(format!(
                    "velocities must increase strictly ({} then {})",
                    v0, v1
                )));
            }
            if l1 < l0 {
                return Err(ConfigError::InvalidCurve(format!(
                    "levels must not decrease ({} then {})",
                    l0, l1
                )));
            }
        }
        let first = points[0].1;
        let last = points[points.len() - 1].1;
        if first != 0.0 || last != 1.0 {
            return Err(ConfigError::InvalidCurve(format!(
                "levels must run from 0 to 1 (got {} to {})",
                first, last
            )));
        }
        Ok(Self { points })
    }

    /// The standard eight-step dynamics curve
    pub fn dynamics() -> Self {
        Self {
            points: DYNAMICS.to_vec(),
        }
    }

    pub fn points(&self) -> &[(i32, f32)] {
        &self.points
    }

    /// Look up a level without logging
    pub fn lookup(&self, velocity: i32) -> CurveLookup {
        let (first_velocity, first_level) = self.points[0];
        if velocity <= first_velocity {
            return CurveLookup::BelowRange(first_level);
        }

        for pair in self.points.windows(2) {
            let ((v0, l0), (v1, l1)) = (pair[0], pair[1]);
            if velocity == v1 {
                return CurveLookup::InRange(l1);
            }
            if velocity < v1 {
                let fraction = (velocity - v0) as f32 / (v1 - v0) as f32;
                return CurveLookup::InRange(l0 + fraction * (l1 - l0));
            }
        }

        let (_, last_level) = self.points[self.points.len() - 1];
        CurveLookup::AboveRange(last_level)
    }

    /// Level for a velocity. Out-of-range velocities clamp and log a warning.
    pub fn level_of(&self, velocity: i32) -> f32 {
        let lookup = self.lookup(velocity);
        match lookup {
            CurveLookup::BelowRange(level) => {
                warn!(velocity, level, "velocity at or below curve range, clamped");
            }
            CurveLookup::AboveRange(level) => {
                warn!(velocity, level, "velocity above curve range, clamped");
            }
            CurveLookup::InRange(_) => {}
        }
        lookup.level()
    }
}

impl Default for VelocityCurve {
    fn default() -> Self {
        Self::dynamics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_control_points_hit_exactly() {
        let curve = VelocityCurve::dynamics();
        assert!((curve.level_of(20) - 1.0 / 7.0).abs() < EPSILON);
        assert!((curve.level_of(55) - 4.0 / 7.0).abs() < EPSILON);
        assert_eq!(curve.level_of(127), 1.0);
    }

    #[test]
    fn test_interpolation() {
        let curve = VelocityCurve::dynamics();
        // Halfway between MP (40) and MF (55)
        let level = curve.level_of(47);
        let expected = 3.0 / 7.0 + (7.0 / 15.0) * (1.0 / 7.0);
        assert!((level - expected).abs() < EPSILON);
    }

    #[test]
    fn test_below_range_clamps_to_zero() {
        let curve = VelocityCurve::dynamics();
        assert_eq!(curve.lookup(10), CurveLookup::BelowRange(0.0));
        assert_eq!(curve.lookup(0), CurveLookup::BelowRange(0.0));
        assert_eq!(curve.level_of(3), 0.0);
    }

    #[test]
    fn test_above_range_clamps_to_one() {
        let curve = VelocityCurve::dynamics();
        assert_eq!(curve.lookup(128), CurveLookup::AboveRange(1.0));
        assert_eq!(curve.level_of(500), 1.0);
        assert!(curve.lookup(127).is_in_range());
    }

    #[test]
    fn test_monotonic_over_domain() {
        let curve = VelocityCurve::dynamics();
        let mut previous = curve.level_of(-5);
        for velocity in -4..=140 {
            let level = curve.level_of(velocity);
            assert!(level >= previous, "dropped at velocity {}", velocity);
            assert!((0.0..=1.0).contains(&level));
            previous = level;
        }
    }

    #[test]
    fn test_monotonic_for_custom_curves() {
        let curves = [
            vec![(0, 0.0), (127, 1.0)],
            vec![(5, 0.0), (6, 0.9), (100, 0.9), (101, 1.0)],
            vec![(-10, 0.0), (0, 0.5), (10, 1.0)],
        ];
        for points in curves {
            let first = points[0].0;
            let last = points[points.len() - 1].0;
            let curve = VelocityCurve::new(points).unwrap();

            assert_eq!(curve.level_of(first), 0.0);
            assert_eq!(curve.level_of(last), 1.0);

            let mut previous = 0.0;
            for velocity in (first - 3)..=(last + 3) {
                let level = curve.level_of(velocity);
                assert!(level >= previous);
                previous = level;
            }
        }
    }

    #[test]
    fn test_invalid_curves_rejected() {
        assert!(VelocityCurve::new(vec![(10, 0.0)]).is_err());
        assert!(VelocityCurve::new(vec![(10, 0.0), (10, 1.0)]).is_err());
        assert!(VelocityCurve::new(vec![(10, 0.0), (20, 0.8), (30, 0.4), (40, 1.0)]).is_err());
        assert!(VelocityCurve::new(vec![(10, 0.1), (20, 1.0)]).is_err());
        assert!(VelocityCurve::new(vec![(10, 0.0), (20, 0.9)]).is_err());
    }
}
