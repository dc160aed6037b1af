use serde::Serialize;

use super::color::{color_for, metric_domain, metric_value};
use super::geometry::{GridLayout, LatLon, Polygon, resolve_polygon};
use super::market::MarketSeries;
use super::metrics::compute_derived;
use super::types::{
    DerivedMetrics, EngineError, MetricContext, MetricKey, MonthlyObservation, Rgb, WindowPreset,
    YearMonth,
};
use super::window::{filter_range, filter_window, median_by_date};

pub const MAX_COMPARED_REGIONS: usize = 3;

const DEPOSIT_YEARS_ELEVATED: f64 = 15.0;
const DEPOSIT_YEARS_SEVERE: f64 = 25.0;
const MTI_ELEVATED: f64 = 0.30;
const MTI_SEVERE: f64 = 0.40;
const RTI_ELEVATED: f64 = 0.25;
const RTI_SEVERE: f64 = 0.30;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardQuery {
    pub preset: WindowPreset,
    /// Explicit `[start, end]` override of the preset.
    pub range: Option<(YearMonth, YearMonth)>,
    pub now: Option<YearMonth>,
    pub layer: MetricKey,
    pub ctx: MetricContext,
    pub selected: Vec<String>,
}

impl Default for DashboardQuery {
    fn default() -> Self {
        Self {
            preset: WindowPreset::FiveYears,
            range: None,
            now: None,
            layer: MetricKey::Pti,
            ctx: MetricContext::default(),
            selected: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapCell {
    pub region: String,
    pub value: f64,
    pub color: Rgb,
    pub center: LatLon,
    /// Outline as a closed `[lon, lat]` ring.
    pub polygon: Polygon,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayer {
    pub metric: MetricKey,
    pub label: &'static str,
    pub higher_is_bad: bool,
    pub min: f64,
    pub max: f64,
    pub center: Option<LatLon>,
    pub cells: Vec<MapCell>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub region: String,
    pub price_adjusted: f64,
    pub rent_weekly_adjusted: f64,
    pub income_annual: f64,
    pub pti: f64,
    pub rti: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyerPanel {
    pub region: String,
    pub term_years: f64,
    #[serde(flatten)]
    pub metrics: DerivedMetrics,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InsightKind {
    YearsToDeposit,
    Mti,
    Rti,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StressLevel {
    Elevated,
    Severe,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub kind: InsightKind,
    pub level: StressLevel,
    pub value: f64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SeriesPoint {
    pub date: YearMonth,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSeries {
    pub region: String,
    pub points: Vec<SeriesPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub window_start: YearMonth,
    pub window_end: YearMonth,
    pub bedrooms: u32,
    pub selected: Vec<String>,
    pub map: MapLayer,
    pub comparison: Vec<ComparisonRow>,
    pub buyer: BuyerPanel,
    pub insights: Vec<Insight>,
    pub series: Vec<RegionSeries>,
    pub city_median: Vec<SeriesPoint>,
}

/// Known codes in request order, deduplicated and capped at three; the
/// first three available codes when nothing usable was asked for.
pub fn normalize_selection(requested: &[String], available: &[String]) -> Vec<String> {
    let mut selected: Vec<String> = Vec::with_capacity(MAX_COMPARED_REGIONS);
    for code in requested {
        if selected.len() == MAX_COMPARED_REGIONS {
            break;
        }
        if available.contains(code) && !selected.contains(code) {
            selected.push(code.clone());
        }
    }
    if selected.is_empty() {
        let mut defaults = available.to_vec();
        defaults.sort();
        defaults.truncate(MAX_COMPARED_REGIONS);
        return defaults;
    }
    selected
}

fn classify(value: f64, elevated: f64, severe: f64, inclusive: bool) -> Option<StressLevel> {
    let over = |threshold: f64| {
        if inclusive {
            value >= threshold
        } else {
            value > threshold
        }
    };
    if over(severe) {
        Some(StressLevel::Severe)
    } else if over(elevated) {
        Some(StressLevel::Elevated)
    } else {
        None
    }
}

pub fn stress_insights(metrics: &DerivedMetrics) -> Vec<Insight> {
    let mut insights = Vec::new();

    if let Some(level) = classify(
        metrics.years_to_deposit,
        DEPOSIT_YEARS_ELEVATED,
        DEPOSIT_YEARS_SEVERE,
        false,
    ) {
        let message = match level {
            StressLevel::Severe => {
                "Saving the deposit takes more than 25 years; buying here is unrealistic at current settings."
            }
            StressLevel::Elevated => {
                "Saving the deposit takes more than 15 years; consider a higher saving rate, another region or a smaller deposit."
            }
        };
        insights.push(Insight {
            kind: InsightKind::YearsToDeposit,
            level,
            value: metrics.years_to_deposit,
            message: message.to_string(),
        });
    }

    if let Some(level) = classify(metrics.mti, MTI_ELEVATED, MTI_SEVERE, true) {
        let message = match level {
            StressLevel::Severe => "MTI of 40% or more: heavy mortgage burden relative to income.",
            StressLevel::Elevated => "MTI between 30% and 40%: elevated mortgage burden.",
        };
        insights.push(Insight {
            kind: InsightKind::Mti,
            level,
            value: metrics.mti,
            message: message.to_string(),
        });
    }

    if let Some(level) = classify(metrics.personal_rti, RTI_ELEVATED, RTI_SEVERE, true) {
        let message = match level {
            StressLevel::Severe => "RTI of 30% or more: rental stress.",
            StressLevel::Elevated => "RTI between 25% and 30%: borderline rental burden.",
        };
        insights.push(Insight {
            kind: InsightKind::Rti,
            level,
            value: metrics.personal_rti,
            message: message.to_string(),
        });
    }

    insights
}

fn window_rows(
    series: &MarketSeries,
    query: &DashboardQuery,
) -> Result<Vec<MonthlyObservation>, EngineError> {
    match query.range {
        Some((start, end)) => filter_range(series.observations(), start, end),
        None => {
            let Some(latest) = series.latest_month() else {
                return Ok(Vec::new());
            };
            Ok(filter_window(
                series.observations(),
                query.preset,
                query.now.unwrap_or(latest),
            ))
        }
    }
}

fn build_map(
    series: &MarketSeries,
    latest_rows: &[&MonthlyObservation],
    query: &DashboardQuery,
    grid: &GridLayout,
) -> MapLayer {
    let values: Vec<f64> = latest_rows
        .iter()
        .map(|row| metric_value(query.layer, row, &query.ctx))
        .collect();
    let (min, max) = metric_domain(values.iter().copied());
    let higher_is_bad = query.layer.higher_is_bad();

    let cells = latest_rows
        .iter()
        .zip(&values)
        .filter_map(|(row, &value)| {
            let region = series.region(&row.region)?;
            Some(MapCell {
                region: row.region.clone(),
                value,
                color: color_for(value, min, max, higher_is_bad),
                center: grid.center(region),
                polygon: resolve_polygon(&[], grid, region),
            })
        })
        .collect();

    MapLayer {
        metric: query.layer,
        label: query.layer.label(),
        higher_is_bad,
        min,
        max,
        center: grid.centroid(series.regions()),
        cells,
    }
}

pub fn build_dashboard(
    series: &MarketSeries,
    query: &DashboardQuery,
    grid: &GridLayout,
) -> Result<DashboardSnapshot, EngineError> {
    let rows = window_rows(series, query)?;
    let (Some(window_start), Some(window_end)) = (
        rows.iter().map(|row| row.date).min(),
        rows.iter().map(|row| row.date).max(),
    ) else {
        return Err(EngineError::EmptyWindow);
    };

    let latest_rows: Vec<&MonthlyObservation> =
        rows.iter().filter(|row| row.date == window_end).collect();
    let available: Vec<String> = latest_rows.iter().map(|row| row.region.clone()).collect();
    let selected = normalize_selection(&query.selected, &available);

    let map = build_map(series, &latest_rows, query, grid);

    let mut comparison = Vec::with_capacity(selected.len());
    let mut first_derived = None;
    for code in &selected {
        let Some(row) = latest_rows.iter().find(|row| &row.region == code) else {
            continue;
        };
        let derived = compute_derived(row, query.ctx.bedrooms, &query.ctx.buyer)?;
        comparison.push(ComparisonRow {
            region: code.clone(),
            price_adjusted: derived.price_adjusted,
            rent_weekly_adjusted: derived.rent_weekly_adjusted,
            income_annual: row.income_annual,
            pti: derived.pti,
            rti: derived.rti,
        });
        if first_derived.is_none() {
            first_derived = Some((code.clone(), derived));
        }
    }
    let Some((buyer_region, buyer_metrics)) = first_derived else {
        return Err(EngineError::EmptyWindow);
    };

    let series_out = selected
        .iter()
        .map(|code| RegionSeries {
            region: code.clone(),
            points: rows
                .iter()
                .filter(|row| &row.region == code)
                .map(|row| SeriesPoint {
                    date: row.date,
                    value: metric_value(query.layer, row, &query.ctx),
                })
                .collect(),
        })
        .collect();

    let city_median = median_by_date(&rows, query.layer, &query.ctx)
        .into_iter()
        .map(|(date, value)| SeriesPoint { date, value })
        .collect();

    Ok(DashboardSnapshot {
        window_start,
        window_end,
        bedrooms: query.ctx.bedrooms,
        selected,
        map,
        comparison,
        insights: stress_insights(&buyer_metrics),
        buyer: BuyerPanel {
            region: buyer_region,
            term_years: query.ctx.buyer.term_years,
            metrics: buyer_metrics,
        },
        series: series_out,
        city_median,
    })
}
