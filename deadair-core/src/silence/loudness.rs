//! Window loudness in dBFS.

/// Root-mean-square of a sample slice. Empty slices are `0.0`.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Loudness of a sample slice relative to full scale.
///
/// Returns `f32::NEG_INFINITY` for digital silence (all zeros or empty).
pub fn dbfs(samples: &[f32]) -> f32 {
    let level = rms(samples);
    if level <= 0.0 {
        return f32::NEG_INFINITY;
    }
    20.0 * level.log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn square_wave_rms() {
        let samples: Vec<f32> = (0..256)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        assert_relative_eq!(rms(&samples), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn full_scale_is_zero_dbfs() {
        assert_relative_eq!(dbfs(&[1.0, -1.0, 1.0, -1.0]), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn half_scale_is_minus_six_dbfs() {
        assert_relative_eq!(dbfs(&[0.5; 64]), -6.0206, epsilon = 1e-3);
    }

    #[test]
    fn digital_silence_is_negative_infinity() {
        assert_eq!(dbfs(&[0.0; 32]), f32::NEG_INFINITY);
        assert_eq!(dbfs(&[]), f32::NEG_INFINITY);
    }
}
