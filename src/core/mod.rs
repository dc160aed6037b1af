mod color;
mod dashboard;
mod geometry;
mod market;
mod metrics;
mod rng;
mod types;
mod window;

pub use color::{GREEN, NO_DATA, RED, YELLOW, color_for, metric_domain, metric_value, ramp};
pub use dashboard::{
    BuyerPanel, ComparisonRow, DashboardQuery, DashboardSnapshot, Insight, InsightKind, MapCell,
    MapLayer, MAX_COMPARED_REGIONS, RegionSeries, SeriesPoint, StressLevel, build_dashboard,
    normalize_selection, stress_insights,
};
pub use geometry::{GridLayout, LatLon, Polygon, PolygonSource, resolve_polygon};
pub use market::{
    INCOME_FLOOR, MarketConfig, MarketSeries, PRICE_FLOOR, RENT_FLOOR, generate_series,
    month_sequence,
};
pub use metrics::{
    BedroomMultiplier, MAP_BASELINE_TERM_YEARS, RATIO_SENTINEL, annuity_monthly_payment,
    bedroom_multiplier, compute_derived, map_payment_cap_gap, mti, payment_cap_gap,
    principal_from_monthly_payment, pti, rti, years_to_deposit,
};
pub use rng::Rng;
pub use types::{
    BuyerParameters, DerivedMetrics, EngineError, MetricContext, MetricKey, MonthlyObservation,
    Region, Rgb, WindowPreset, YearMonth,
};
pub use window::{filter_range, filter_window, median, median_by_date, window_start_index};
