//! Particulate severity scoring and actuator speed mapping.
//!
//! Both functions here are pure: the evaluator classifies a pm2_5/pm10 pair
//! into a 1 (best) to 4 (worst) severity class, and the translator shifts
//! that class into the 0..3 fan-speed range the cleaner device accepts.
//! Thresholds are fixed domain constants, not configuration.

// ---

/// Upper-inclusive pm2.5 band breakpoints (ug/m3): <=15 good, <=35 moderate,
/// <=75 bad, above very bad.
const PM2_5_BREAKPOINTS: [f64; 3] = [15.0, 35.0, 75.0];

/// Upper-inclusive pm10 band breakpoints (ug/m3).
const PM10_BREAKPOINTS: [f64; 3] = [30.0, 80.0, 150.0];

fn band(value: f64, breakpoints: &[f64; 3]) -> u8 {
    // ---
    match breakpoints.iter().position(|&upper| value <= upper) {
        Some(i) => i as u8 + 1,
        None => 4,
    }
}

/// Classify a pm2_5/pm10 pair into a severity class 1..=4.
///
/// The worse of the two pollutant bands dominates. Inputs are expected to be
/// non-negative; there is no upper bound and the function never fails: any
/// finite value past the last breakpoint lands in band 4.
pub fn evaluate(pm2_5: f64, pm10: f64) -> u8 {
    // ---
    band(pm2_5, &PM2_5_BREAKPOINTS).max(band(pm10, &PM10_BREAKPOINTS))
}

/// Map a severity class to a device fan speed.
///
/// Class 1 (best air) → speed 0, class 4 (worst) → speed 3. A reading with
/// no score yields no speed, and the caller must not issue a device command.
pub fn to_speed(score: Option<u8>) -> Option<u8> {
    // ---
    score.map(|s| s.saturating_sub(1).min(3))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_both_pollutants_good() {
        // ---
        assert_eq!(evaluate(0.0, 0.0), 1);
        assert_eq!(evaluate(10.0, 25.0), 1);

        // Upper-inclusive boundaries stay in the lower band
        assert_eq!(evaluate(15.0, 30.0), 1);
    }

    #[test]
    fn test_worse_pollutant_dominates() {
        // ---
        // pm2_5 moderate-bad, pm10 good
        assert_eq!(evaluate(36.0, 10.0), 3);

        // pm10 off the scale dominates a clean pm2_5
        assert_eq!(evaluate(10.0, 151.0), 4);

        // pm2_5 dominates the other way
        assert_eq!(evaluate(76.0, 10.0), 4);
    }

    #[test]
    fn test_band_boundaries() {
        // ---
        assert_eq!(evaluate(15.0, 0.0), 1);
        assert_eq!(evaluate(15.1, 0.0), 2);
        assert_eq!(evaluate(35.0, 0.0), 2);
        assert_eq!(evaluate(35.1, 0.0), 3);
        assert_eq!(evaluate(75.0, 0.0), 3);
        assert_eq!(evaluate(75.1, 0.0), 4);

        assert_eq!(evaluate(0.0, 30.0), 1);
        assert_eq!(evaluate(0.0, 30.1), 2);
        assert_eq!(evaluate(0.0, 80.0), 2);
        assert_eq!(evaluate(0.0, 80.1), 3);
        assert_eq!(evaluate(0.0, 150.0), 3);
        assert_eq!(evaluate(0.0, 150.1), 4);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        // ---
        for _ in 0..3 {
            assert_eq!(evaluate(20.0, 40.0), 2);
        }
    }

    #[test]
    fn test_speed_is_score_minus_one() {
        // ---
        assert_eq!(to_speed(Some(1)), Some(0));
        assert_eq!(to_speed(Some(2)), Some(1));
        assert_eq!(to_speed(Some(3)), Some(2));
        assert_eq!(to_speed(Some(4)), Some(3));
    }

    #[test]
    fn test_speed_absent_score_yields_no_command() {
        // ---
        assert_eq!(to_speed(None), None);
    }

    #[test]
    fn test_speed_is_clamped() {
        // ---
        // Out-of-domain classes still land inside the device's 0..3 range
        assert_eq!(to_speed(Some(0)), Some(0));
        assert_eq!(to_speed(Some(9)), Some(3));
    }

    #[test]
    fn test_speed_is_monotonic() {
        // ---
        let speeds: Vec<u8> = (1..=4).filter_map(|s| to_speed(Some(s))).collect();
        assert!(speeds.windows(2).all(|w| w[0] < w[1]));
    }
}
