use std::collections::BTreeMap;

use super::color::metric_value;
use super::types::{
    EngineError, MetricContext, MetricKey, MonthlyObservation, WindowPreset, YearMonth,
};

pub fn window_start_index(last_index: usize, preset: WindowPreset) -> usize {
    match preset.months() {
        None => 0,
        Some(months) => last_index.saturating_sub(months),
    }
}

fn distinct_months(observations: &[MonthlyObservation]) -> Vec<YearMonth> {
    let mut months: Vec<YearMonth> = observations.iter().map(|row| row.date).collect();
    months.sort_unstable();
    months.dedup();
    months
}

/// Rows from the preset's first month through `now`, inclusive.
///
/// `now` is clamped to the last month present, so a caller's wall clock
/// running past the synthetic calendar still selects the latest data.
pub fn filter_window(
    observations: &[MonthlyObservation],
    preset: WindowPreset,
    now: YearMonth,
) -> Vec<MonthlyObservation> {
    let months = distinct_months(observations);
    let Some(&last_available) = months.last() else {
        return Vec::new();
    };
    let end = now.min(last_available);
    let last_index = months.partition_point(|month| *month <= end);
    if last_index == 0 {
        return Vec::new();
    }
    let start = months[window_start_index(last_index - 1, preset)];

    observations
        .iter()
        .filter(|row| row.date >= start && row.date <= end)
        .cloned()
        .collect()
}

pub fn filter_range(
    observations: &[MonthlyObservation],
    start: YearMonth,
    end: YearMonth,
) -> Result<Vec<MonthlyObservation>, EngineError> {
    if end < start {
        return Err(EngineError::InvalidDateRange { start, end });
    }
    Ok(observations
        .iter()
        .filter(|row| row.date >= start && row.date <= end)
        .cloned()
        .collect())
}

pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// City-wide median of `metric` for each date, in date order.
pub fn median_by_date(
    filtered: &[MonthlyObservation],
    metric: MetricKey,
    ctx: &MetricContext,
) -> Vec<(YearMonth, f64)> {
    let mut by_date: BTreeMap<YearMonth, Vec<f64>> = BTreeMap::new();
    for row in filtered {
        let value = metric_value(metric, row, ctx);
        let bucket = by_date.entry(row.date).or_default();
        if value.is_finite() {
            bucket.push(value);
        }
    }

    by_date
        .into_iter()
        .filter_map(|(date, mut values)| median(&mut values).map(|m| (date, m)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::market::{MarketConfig, generate_series};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).expect("valid month")
    }

    fn row(date: YearMonth, region: &str, price: f64) -> MonthlyObservation {
        MonthlyObservation {
            date,
            region: region.to_string(),
            price,
            rent_weekly: 500.0,
            income_annual: 100_000.0,
        }
    }

    #[test]
    fn start_index_for_each_preset() {
        assert_eq!(window_start_index(128, WindowPreset::Max), 0);
        assert_eq!(window_start_index(128, WindowPreset::FiveYears), 68);
        assert_eq!(window_start_index(128, WindowPreset::ThreeYears), 92);
        assert_eq!(window_start_index(128, WindowPreset::OneYear), 116);
        assert_eq!(window_start_index(10, WindowPreset::FiveYears), 0);
    }

    #[test]
    fn five_year_window_over_reference_market() {
        let series = generate_series(&MarketConfig::reference()).expect("valid config");
        let filtered = filter_window(series.observations(), WindowPreset::FiveYears, ym(2025, 9));
        assert_eq!(filtered.len(), 12 * 61);
        assert_eq!(filtered.iter().map(|r| r.date).min(), Some(ym(2020, 9)));
        assert_eq!(filtered.iter().map(|r| r.date).max(), Some(ym(2025, 9)));
    }

    #[test]
    fn now_past_the_calendar_is_clamped() {
        let series = generate_series(&MarketConfig::reference()).expect("valid config");
        let filtered = filter_window(series.observations(), WindowPreset::OneYear, ym(2026, 10));
        assert_eq!(filtered.len(), 12 * 13);
        assert_eq!(filtered.iter().map(|r| r.date).min(), Some(ym(2024, 9)));
    }

    #[test]
    fn now_inside_the_calendar_moves_the_window() {
        let series = generate_series(&MarketConfig::reference()).expect("valid config");
        let filtered = filter_window(series.observations(), WindowPreset::OneYear, ym(2020, 6));
        assert_eq!(filtered.iter().map(|r| r.date).min(), Some(ym(2019, 6)));
        assert_eq!(filtered.iter().map(|r| r.date).max(), Some(ym(2020, 6)));
    }

    #[test]
    fn now_before_the_calendar_selects_nothing() {
        let series = generate_series(&MarketConfig::reference()).expect("valid config");
        assert!(filter_window(series.observations(), WindowPreset::Max, ym(2010, 1)).is_empty());
        assert!(filter_window(&[], WindowPreset::Max, ym(2025, 9)).is_empty());
    }

    #[test]
    fn custom_range_rejects_inverted_bounds() {
        assert_eq!(
            filter_range(&[], ym(2024, 1), ym(2023, 1)),
            Err(EngineError::InvalidDateRange {
                start: ym(2024, 1),
                end: ym(2023, 1)
            })
        );
        let rows = vec![row(ym(2020, 1), "SA2_01", 1.0), row(ym(2021, 1), "SA2_01", 2.0)];
        let filtered = filter_range(&rows, ym(2020, 6), ym(2021, 1)).expect("valid range");
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn median_of_even_count_is_mean_of_middle_pair() {
        let date = ym(2025, 9);
        let rows: Vec<_> = [100.0, 400.0, 200.0, 300.0]
            .iter()
            .enumerate()
            .map(|(i, price)| row(date, &format!("SA2_{:02}", i + 1), *price))
            .collect();
        let ctx = MetricContext::default();
        assert_eq!(
            median_by_date(&rows, MetricKey::MedianPrice, &ctx),
            vec![(date, 250.0)]
        );
    }

    #[test]
    fn median_of_odd_count_is_middle_value() {
        let mut values = vec![9.0, 1.0, 5.0];
        assert_eq!(median(&mut values), Some(5.0));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn median_series_is_date_ordered() {
        let rows = vec![
            row(ym(2021, 2), "SA2_01", 10.0),
            row(ym(2021, 1), "SA2_01", 20.0),
            row(ym(2021, 1), "SA2_02", 40.0),
        ];
        let ctx = MetricContext::default();
        assert_eq!(
            median_by_date(&rows, MetricKey::MedianPrice, &ctx),
            vec![(ym(2021, 1), 30.0), (ym(2021, 2), 10.0)]
        );
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_median_lies_between_min_and_max(values in proptest::collection::vec(-1e6f64..1e6, 1..40)) {
            let mut sorted = values.clone();
            let m = median(&mut sorted).expect("non-empty");
            let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(m >= lo && m <= hi);
        }

        #[test]
        fn prop_window_is_contiguous_suffix(last in 0usize..200, preset_idx in 0usize..4) {
            let preset = [WindowPreset::Max, WindowPreset::FiveYears, WindowPreset::ThreeYears, WindowPreset::OneYear][preset_idx];
            let start = window_start_index(last, preset);
            prop_assert!(start <= last);
            if let Some(months) = preset.months() {
                prop_assert_eq!(last - start, months.min(last));
            } else {
                prop_assert_eq!(start, 0);
            }
        }
    }
}
