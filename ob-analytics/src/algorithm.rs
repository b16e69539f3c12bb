//! Pure statistics helpers shared by the ratio calculators in
//! [`crate::metric`]. None of these hold state or know about trading —
//! they operate on plain slices of [`Decimal`].

use rust_decimal::Decimal;

/// Arithmetic mean of `values`, or `None` for an empty slice.
pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().sum();
    Some(sum / Decimal::from(values.len()))
}

/// Population standard deviation of `values`.
///
/// Uses an `f64` round-trip for the square root since [`Decimal`] has no
/// native one; this matches the precision the ratio metrics need without
/// pulling in a big-decimal math crate.
pub fn std_dev(values: &[Decimal]) -> Option<Decimal> {
    variance(values).and_then(decimal_sqrt)
}

/// Standard deviation computed only over the values below `threshold`,
/// i.e. the downside deviation used by [`crate::metric::sortino`].
/// Upside values still count toward the sample size (they contribute a
/// deviation of zero), matching the conventional Sortino definition.
pub fn downside_deviation(values: &[Decimal], threshold: Decimal) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum_sq: Decimal = values
        .iter()
        .map(|v| {
            let downside = (*v - threshold).min(Decimal::ZERO);
            downside * downside
        })
        .sum();
    let variance = sum_sq / Decimal::from(values.len());
    decimal_sqrt(variance)
}

/// Per-step returns `(equity[i] - equity[i-1]) / equity[i-1]` from an
/// equity curve. Steps where the prior equity is zero are skipped rather
/// than producing a division-by-zero `Decimal` panic.
pub fn returns_from_equity_curve(equity: &[Decimal]) -> Vec<Decimal> {
    equity
        .windows(2)
        .filter_map(|pair| {
            let (prev, next) = (pair[0], pair[1]);
            if prev.is_zero() {
                None
            } else {
                Some((next - prev) / prev)
            }
        })
        .collect()
}

fn variance(values: &[Decimal]) -> Option<Decimal> {
    let m = mean(values)?;
    let sum_sq: Decimal = values.iter().map(|v| (*v - m) * (*v - m)).sum();
    Some(sum_sq / Decimal::from(values.len()))
}

fn decimal_sqrt(value: Decimal) -> Option<Decimal> {
    if value.is_sign_negative() {
        return None;
    }
    let as_f64 = value.to_string().parse::<f64>().ok()?;
    Decimal::try_from(as_f64.sqrt()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn mean_and_std_dev_known_values() {
        let values = [dec!(2), dec!(4), dec!(4), dec!(4), dec!(5), dec!(5), dec!(7), dec!(9)];
        let m = mean(&values).unwrap();
        assert_eq!(m, dec!(5));
        let sd = std_dev(&values).unwrap();
        assert!((sd - dec!(2)).abs() < dec!(0.01));
    }

    #[test]
    fn downside_deviation_ignores_upside() {
        let values = [dec!(0.1), dec!(0.1), dec!(0.1)];
        assert_eq!(downside_deviation(&values, dec!(0)), Some(dec!(0)));
    }

    #[test]
    fn returns_skip_zero_prior_equity() {
        let equity = [dec!(0), dec!(100), dec!(110)];
        let r = returns_from_equity_curve(&equity);
        assert_eq!(r.len(), 1);
    }
}
