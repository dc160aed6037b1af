use super::metrics::{bedroom_multiplier, map_payment_cap_gap, pti, rti};
use super::types::{MetricContext, MetricKey, MonthlyObservation, Rgb};

pub const GREEN: Rgb = Rgb(0x1a, 0x98, 0x50);
pub const YELLOW: Rgb = Rgb(0xfe, 0xe0, 0x8b);
pub const RED: Rgb = Rgb(0xd7, 0x30, 0x27);
pub const NO_DATA: Rgb = Rgb(0xbd, 0xbd, 0xbd);

/// Value a map layer shows for one observation.
///
/// The payment-cap gap is measured on the fixed map term; a term the engine
/// rejects leaves the cell without data rather than failing the whole layer.
pub fn metric_value(
    metric: MetricKey,
    observation: &MonthlyObservation,
    ctx: &MetricContext,
) -> f64 {
    let multiplier = bedroom_multiplier(ctx.bedrooms);
    let price_adjusted = observation.price * multiplier.price;
    let rent_adjusted = observation.rent_weekly * multiplier.rent;
    match metric {
        MetricKey::MedianRent => rent_adjusted,
        MetricKey::MedianPrice => price_adjusted,
        MetricKey::MedianIncome => observation.income_annual,
        MetricKey::Pti => pti(price_adjusted, observation.income_annual),
        MetricKey::Rti => rti(rent_adjusted, observation.income_annual),
        MetricKey::PaymentCapGap => {
            map_payment_cap_gap(price_adjusted, &ctx.buyer).unwrap_or(f64::NAN)
        }
    }
}

/// `(min, max)` over the finite values; `(0, 1)` when there are none.
pub fn metric_domain<I>(values: I) -> (f64, f64)
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 1.0))
}

fn lerp_channel(a: u8, b: u8, t: f64) -> u8 {
    let value = a as f64 + (b as f64 - a as f64) * t;
    value.round().clamp(0.0, 255.0) as u8
}

fn lerp(a: Rgb, b: Rgb, t: f64) -> Rgb {
    Rgb(
        lerp_channel(a.0, b.0, t),
        lerp_channel(a.1, b.1, t),
        lerp_channel(a.2, b.2, t),
    )
}

/// Position on the ramp after orientation; 0 is green, 1 is red.
pub fn ramp_position(value: f64, min: f64, max: f64, higher_is_bad: bool) -> f64 {
    if min.is_nan() || max.is_nan() || max <= min {
        return 0.0;
    }
    let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
    if higher_is_bad { t } else { 1.0 - t }
}

pub fn ramp(t: f64) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    if t <= 0.5 {
        lerp(GREEN, YELLOW, t * 2.0)
    } else {
        lerp(YELLOW, RED, (t - 0.5) * 2.0)
    }
}

pub fn color_for(value: f64, min: f64, max: f64, higher_is_bad: bool) -> Rgb {
    if !value.is_finite() {
        return NO_DATA;
    }
    ramp(ramp_position(value, min, max, higher_is_bad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BuyerParameters, YearMonth};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn observation(price: f64, rent_weekly: f64, income_annual: f64) -> MonthlyObservation {
        MonthlyObservation {
            date: YearMonth::new(2025, 9).expect("valid month"),
            region: "SA2_03".to_string(),
            price,
            rent_weekly,
            income_annual,
        }
    }

    #[test]
    fn collapsed_domain_is_always_green() {
        for value in [-10.0, 0.0, 5.0, 1e9] {
            assert_eq!(color_for(value, 5.0, 5.0, false), GREEN);
            assert_eq!(color_for(value, 5.0, 5.0, true), GREEN);
        }
    }

    #[test]
    fn ramp_endpoints_and_midpoint() {
        assert_eq!(color_for(0.0, 0.0, 10.0, true), GREEN);
        assert_eq!(color_for(5.0, 0.0, 10.0, true), YELLOW);
        assert_eq!(color_for(10.0, 0.0, 10.0, true), RED);
    }

    #[test]
    fn higher_is_better_inverts_the_ramp() {
        assert_eq!(color_for(10.0, 0.0, 10.0, false), GREEN);
        assert_eq!(color_for(0.0, 0.0, 10.0, false), RED);
    }

    #[test]
    fn out_of_domain_values_are_clamped() {
        assert_eq!(color_for(-50.0, 0.0, 10.0, true), GREEN);
        assert_eq!(color_for(50.0, 0.0, 10.0, true), RED);
    }

    #[test]
    fn nan_values_render_as_no_data() {
        assert_eq!(color_for(f64::NAN, 0.0, 10.0, true), NO_DATA);
    }

    #[test]
    fn quarter_point_blends_green_and_yellow() {
        let color = color_for(2.5, 0.0, 10.0, true);
        assert_eq!(color, Rgb(0x8c, 0xbc, 0x6e));
    }

    #[test]
    fn domain_ignores_nan_and_defaults_when_empty() {
        assert_eq!(metric_domain([3.0, f64::NAN, -1.0, 7.5]), (-1.0, 7.5));
        assert_eq!(metric_domain([f64::NAN, f64::NAN]), (0.0, 1.0));
        assert_eq!(metric_domain(Vec::<f64>::new()), (0.0, 1.0));
    }

    #[test]
    fn metric_value_applies_bedroom_adjustment() {
        let obs = observation(1_000_000.0, 600.0, 100_000.0);
        let ctx = MetricContext {
            bedrooms: 3,
            buyer: BuyerParameters::default(),
        };
        assert_eq!(metric_value(MetricKey::MedianRent, &obs, &ctx), 600.0 * 1.75);
        assert_eq!(metric_value(MetricKey::MedianPrice, &obs, &ctx), 1_250_000.0);
        assert_eq!(metric_value(MetricKey::MedianIncome, &obs, &ctx), 100_000.0);
        assert_eq!(metric_value(MetricKey::Pti, &obs, &ctx), 12.5);
        let rti = metric_value(MetricKey::Rti, &obs, &ctx);
        assert!((rti - 1050.0 * 52.0 / 100_000.0).abs() < 1e-12);
    }

    #[test]
    fn payment_cap_gap_layer_ignores_buyer_term() {
        let obs = observation(1_000_000.0, 600.0, 100_000.0);
        let mut ctx = MetricContext::default();
        ctx.buyer.interest_annual = 0.0;
        ctx.buyer.deposit_pct = 0.2;
        ctx.buyer.max_monthly_payment = 2_000.0;
        ctx.buyer.term_years = 30.0;
        let gap = metric_value(MetricKey::PaymentCapGap, &obs, &ctx);
        assert!((gap - 0.2).abs() < 1e-12);

        ctx.buyer.term_years = 0.0;
        assert!((metric_value(MetricKey::PaymentCapGap, &obs, &ctx) - gap).abs() < 1e-12);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(128))]

        #[test]
        fn prop_domain_contains_every_finite_value(values in proptest::collection::vec(-1e6f64..1e6, 1..32)) {
            let (lo, hi) = metric_domain(values.iter().copied());
            prop_assert!(lo <= hi);
            for v in &values {
                prop_assert!(*v >= lo && *v <= hi);
            }
        }

        #[test]
        fn prop_inversion_mirrors_ramp_position(v in 0.0f64..100.0, lo in -50.0f64..0.0, width in 1.0f64..200.0) {
            let hi = lo + width;
            let bad = ramp_position(v, lo, hi, true);
            let good = ramp_position(v, lo, hi, false);
            prop_assert!((bad + good - 1.0).abs() < 1e-12);
            prop_assert!((0.0..=1.0).contains(&bad));
        }

        #[test]
        fn prop_domain_endpoints_map_to_ramp_ends(lo in -1e5f64..1e5, width in 1e-3f64..1e5) {
            let hi = lo + width;
            prop_assert_eq!(color_for(lo, lo, hi, true), GREEN);
            prop_assert_eq!(color_for(hi, lo, hi, true), RED);
        }
    }
}
