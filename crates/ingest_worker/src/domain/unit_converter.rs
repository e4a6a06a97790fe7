/// Convert degrees Celsius to degrees Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_points() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
    }

    #[test]
    fn test_monotonic() {
        let mut previous = celsius_to_fahrenheit(-60.0);
        let mut c = -60.0;
        while c <= 60.0 {
            c += 0.25;
            let current = celsius_to_fahrenheit(c);
            assert!(current > previous, "not increasing at {}", c);
            previous = current;
        }
    }
}
