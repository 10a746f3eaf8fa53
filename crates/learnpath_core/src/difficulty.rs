//! Maps an assessment score onto the difficulty band a learner may be
//! recommended.

use crate::domain::Difficulty;

struct Band {
    min: i32,
    max: i32,
    allowed: &'static [Difficulty],
}

const BANDS: [Band; 3] = [
    Band {
        min: 0,
        max: 40,
        allowed: &[Difficulty::Easy, Difficulty::Intermediate],
    },
    Band {
        min: 41,
        max: 70,
        allowed: &[Difficulty::Easy, Difficulty::Intermediate, Difficulty::Advanced],
    },
    Band {
        min: 71,
        max: 100,
        allowed: &[Difficulty::Intermediate, Difficulty::Advanced],
    },
];

/// Returns the allowed difficulties for `score`. Bounds are inclusive and the
/// first matching band wins; a score outside `0..=100` matches no band.
pub fn classify(score: i32) -> &'static [Difficulty] {
    BANDS
        .iter()
        .find(|band| score >= band.min && score <= band.max)
        .map(|band| band.allowed)
        .unwrap_or(&[])
}
