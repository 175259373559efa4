use crate::state::catalog::IntensityLevel;

/// Rounds per escalation level unless configured otherwise.
pub const DEFAULT_ESCALATION_STEP: u32 = 3;

/// Intensity cap for `round` when escalation is on: `min(ceil(round / step), 3)`.
///
/// Round 0 is treated as round 1.
pub fn cap_for_round(round: u32, step: u32) -> IntensityLevel {
    let step = step.max(1);
    let round = round.max(1);
    IntensityLevel::saturating_from(round.div_ceil(step))
}

/// New cap when it rose between `previous_round` and `round`.
pub fn level_up(previous_round: u32, round: u32, step: u32) -> Option<IntensityLevel> {
    let before = cap_for_round(previous_round, step);
    let after = cap_for_round(round, step);
    (after > before).then_some(after)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_for_first_nine_rounds() {
        let caps = (1..=9)
            .map(|round| cap_for_round(round, DEFAULT_ESCALATION_STEP).as_u8())
            .collect::<Vec<_>>();
        assert_eq!(caps, [1, 1, 1, 2, 2, 2, 3, 3, 3]);
    }

    #[test]
    fn cap_never_exceeds_intense() {
        assert_eq!(cap_for_round(7, 3), IntensityLevel::Intense);
        assert_eq!(cap_for_round(400, 3), IntensityLevel::Intense);
    }

    #[test]
    fn level_up_only_when_the_cap_rises() {
        assert_eq!(level_up(3, 4, 3), Some(IntensityLevel::Medium));
        assert_eq!(level_up(4, 5, 3), None);
        assert_eq!(level_up(6, 7, 3), Some(IntensityLevel::Intense));
        assert_eq!(level_up(9, 10, 3), None);
    }
}
