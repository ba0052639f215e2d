//! KPI math — margin, commission, and goal attainment
//!
//! All ratios are computed in `Decimal` and guard their denominators:
//! a zero gross/target yields a zero ratio, never a panic.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

const HUNDRED: Decimal = dec!(100);

/// Net-over-gross margin as a percentage, 2 dp. Zero when gross is zero.
pub fn margin_pct(net: Decimal, gross: Decimal) -> Decimal {
    if gross > Decimal::ZERO {
        (net / gross * HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    }
}

/// Commission owed on a net amount at a given percentage, 2 dp
pub fn commission(net: Decimal, percentage: Decimal) -> Decimal {
    (net * percentage / HUNDRED).round_dp(2)
}

/// Total commission across sources, applying each source's rule percentage.
/// Sources without a rule contribute zero.
pub fn commission_total(
    net_by_source: &[(String, Decimal)],
    rules: &HashMap<String, Decimal>,
) -> Decimal {
    net_by_source
        .iter()
        .map(|(source, net)| match rules.get(source) {
            Some(pct) => commission(*net, *pct),
            None => Decimal::ZERO,
        })
        .sum()
}

/// Revenue-against-target attainment as a percentage, 2 dp.
/// Zero when the target is zero.
pub fn attainment_pct(revenue: Decimal, target: Decimal) -> Decimal {
    if target > Decimal::ZERO {
        (revenue / target * HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_margin_pct() {
        // 250 net over 1000 gross = 25%
        assert_eq!(margin_pct(dec!(250), dec!(1000)), dec!(25));
        assert_eq!(margin_pct(dec!(1), dec!(3)), dec!(33.33));
    }

    #[test]
    fn test_margin_zero_gross() {
        assert_eq!(margin_pct(dec!(250), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(margin_pct(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_commission() {
        // 2.5% of 10,000 = 250
        assert_eq!(commission(dec!(10000), dec!(2.5)), dec!(250));
        assert_eq!(commission(Decimal::ZERO, dec!(2.5)), Decimal::ZERO);
    }

    #[test]
    fn test_commission_total_missing_rule() {
        let net = vec![
            ("Bionio".to_string(), dec!(1000)),
            ("Rovema Pay".to_string(), dec!(2000)),
        ];
        let mut rules = HashMap::new();
        rules.insert("Bionio".to_string(), dec!(10));
        // Rovema Pay has no rule -> contributes zero
        assert_eq!(commission_total(&net, &rules), dec!(100));
    }

    #[test]
    fn test_attainment_pct() {
        assert_eq!(attainment_pct(dec!(7500), dec!(10000)), dec!(75));
        // Over-attainment is allowed
        assert_eq!(attainment_pct(dec!(12000), dec!(10000)), dec!(120));
    }

    #[test]
    fn test_attainment_zero_target() {
        assert_eq!(attainment_pct(dec!(500), Decimal::ZERO), Decimal::ZERO);
    }
}
