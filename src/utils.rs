use crate::config::DisplayConfig;
use crate::schema::CellValue;

/// Numeric coercion used by the aging stage: anything that is not a number
/// becomes zero. Infinities are numbers and are kept.
pub fn coerce_numeric(value: &CellValue) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

/// `numerator / denominator`, with a missing or zero denominator (or a missing
/// numerator) giving 0 instead of NaN or infinity.
pub fn safe_ratio(numerator: Option<f64>, denominator: Option<f64>) -> f64 {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d != 0.0 => {
            let ratio = n / d;
            // -0.0 would render as "-0.00%"
            if ratio.is_finite() && ratio != 0.0 {
                ratio
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

/// Sum of the present values; all-missing sums to 0.
pub fn sum_present(values: impl IntoIterator<Item = Option<f64>>) -> f64 {
    values.into_iter().flatten().sum()
}

/// Renders an amount in crores, e.g. `12_345_678.0` -> `"1.23 Cr"`.
/// Magnitudes below the threshold are still scaled but carry no suffix.
pub fn format_amount(value: Option<f64>, display: &DisplayConfig) -> String {
    match value {
        None => String::new(),
        Some(v) if v.is_nan() => String::new(),
        Some(v) => {
            let scaled = v / display.crore_divisor;
            if v.abs() >= display.crore_threshold {
                format!("{:.*} Cr", display.decimals, scaled)
            } else {
                format!("{:.*}", display.decimals, scaled)
            }
        }
    }
}

/// Renders a ratio as a percentage, e.g. `0.125` -> `"12.50%"`.
pub fn format_percent(ratio: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_numeric() {
        assert_eq!(coerce_numeric(&CellValue::from(200.0)), 200.0);
        assert_eq!(coerce_numeric(&CellValue::from("  45 ")), 45.0);
        assert_eq!(coerce_numeric(&CellValue::from("unknown")), 0.0);
        assert_eq!(coerce_numeric(&CellValue::Empty), 0.0);
        assert_eq!(coerce_numeric(&CellValue::from(f64::NAN)), 0.0);
        assert_eq!(coerce_numeric(&CellValue::from(f64::INFINITY)), f64::INFINITY);
        assert_eq!(coerce_numeric(&CellValue::from("inf")), f64::INFINITY);
    }

    #[test]
    fn test_safe_ratio_policy() {
        assert_eq!(safe_ratio(Some(50.0), Some(0.0)), 0.0);
        assert_eq!(safe_ratio(Some(0.0), Some(0.0)), 0.0);
        assert_eq!(safe_ratio(Some(50.0), None), 0.0);
        assert_eq!(safe_ratio(None, Some(10.0)), 0.0);
        assert_eq!(safe_ratio(Some(25.0), Some(100.0)), 0.25);
    }

    #[test]
    fn test_sum_present() {
        assert_eq!(sum_present([Some(1.0), None, Some(2.5)]), 3.5);
        assert_eq!(sum_present([None, None]), 0.0);
    }

    #[test]
    fn test_format_amount() {
        let display = DisplayConfig::default();
        assert_eq!(format_amount(Some(12_345_678.0), &display), "1.23 Cr");
        assert_eq!(format_amount(Some(100_000.0), &display), "0.01 Cr");
        assert_eq!(format_amount(Some(-250_000.0), &display), "-0.03 Cr");
        assert_eq!(format_amount(Some(99_999.0), &display), "0.01");
        assert_eq!(format_amount(Some(0.0), &display), "0.00");
        assert_eq!(format_amount(None, &display), "");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.0, 2), "0.00%");
        assert_eq!(format_percent(0.125, 2), "12.50%");
        assert_eq!(format_percent(-1.0, 2), "-100.00%");
    }
}
