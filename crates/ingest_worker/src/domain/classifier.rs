use common::domain::CompassDirection;

/// Upper bounds (inclusive) of the vane resistance ranges, ascending.
///
/// NE and E each appear twice; the vane's resistance does not increase
/// monotonically with bearing, and the table is kept as calibrated.
const RESISTANCE_TABLE: [(i64, CompassDirection); 8] = [
    (200, CompassDirection::E),
    (300, CompassDirection::SE),
    (440, CompassDirection::S),
    (750, CompassDirection::NE),
    (1380, CompassDirection::SW),
    (2850, CompassDirection::N),
    (5000, CompassDirection::NE),
    (10000, CompassDirection::E),
];

/// Largest reading the vane can produce
pub const MAX_RESISTANCE: i64 = 10_000;

/// Map a wind vane resistance reading to a compass category.
///
/// Returns `None` for readings outside `0..=10000`; the caller decides
/// whether that is fatal.
pub fn classify(resistance: i64) -> Option<CompassDirection> {
    if !(0..=MAX_RESISTANCE).contains(&resistance) {
        return None;
    }

    RESISTANCE_TABLE
        .iter()
        .find(|(upper, _)| resistance <= *upper)
        .map(|(_, direction)| *direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use CompassDirection::*;

    #[test]
    fn test_boundaries_are_inclusive_upper() {
        let cases = [
            (0, E),
            (200, E),
            (201, SE),
            (300, SE),
            (301, S),
            (440, S),
            (441, NE),
            (750, NE),
            (751, SW),
            (1380, SW),
            (1381, N),
            (2850, N),
            (2851, NE),
            (5000, NE),
            (5001, E),
            (10000, E),
        ];

        for (resistance, expected) in cases {
            assert_eq!(classify(resistance), Some(expected), "resistance {}", resistance);
        }
    }

    #[test]
    fn test_out_of_range_is_unclassified() {
        assert_eq!(classify(-1), None);
        assert_eq!(classify(10_001), None);
        assert_eq!(classify(i64::MIN), None);
        assert_eq!(classify(i64::MAX), None);
    }

    #[test]
    fn test_duplicate_categories_preserved() {
        assert_eq!(classify(600), classify(4000));
        assert_eq!(classify(100), classify(7000));
    }
}
