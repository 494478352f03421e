//! Mapping of method-specific scores onto the 0..=100 display scale.
//!
//! Only the vector mapping is exact. The lexical multiplier and the hybrid
//! calibration are tuning constants; their output is an ordering aid, not a
//! probability of relevance.

/// `similarity = 1 - distance / 2`, so distance 0 maps to 100 and 2 maps to 0.
pub fn vector_score(cosine_distance: f64) -> u8 {
    let similarity = 1.0 - cosine_distance / 2.0;
    clamp_score((similarity * 100.0).floor())
}

pub fn lexical_score(relevance: f64, multiplier: f64) -> u8 {
    clamp_score((relevance * multiplier).floor())
}

pub fn hybrid_score(fused_score: f64, calibration: f64) -> u8 {
    clamp_score((fused_score * calibration).floor())
}

fn clamp_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0) as u8
}
