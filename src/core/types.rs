use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid date range: end {end} is before start {start}")]
    InvalidDateRange { start: YearMonth, end: YearMonth },
    #[error("loan term must be a positive number of years, got {years}")]
    InvalidTerm { years: f64 },
    #[error("no observations in the selected period")]
    EmptyWindow,
}

/// Years accepted when parsing `"YYYY-MM"` text.
pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// Calendar month, ordered by year then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Month known to be valid at compile time; only usable in const items.
    pub(crate) const fn from_parts(year: i32, month: u32) -> Self {
        assert!(month >= 1 && month <= 12, "month out of range");
        Self { year, month }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    fn ordinal(self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_ordinal(ordinal: i64) -> Self {
        Self {
            year: ordinal.div_euclid(12) as i32,
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn succ(self) -> Self {
        self.offset(1)
    }

    pub fn offset(self, months: i64) -> Self {
        Self::from_ordinal(self.ordinal() + months)
    }

    /// Signed number of months from `self` to `other`.
    pub fn months_until(self, other: YearMonth) -> i64 {
        other.ordinal() - self.ordinal()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut parts = trimmed.splitn(3, '-');
        let (Some(year), Some(month)) = (parts.next(), parts.next()) else {
            return Err(format!("expected YYYY-MM, got {trimmed:?}"));
        };
        let year = year
            .parse::<i32>()
            .map_err(|_| format!("invalid year in {trimmed:?}"))?;
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(format!("year out of range {MIN_YEAR}..={MAX_YEAR} in {trimmed:?}"));
        }
        let month = month
            .parse::<u32>()
            .map_err(|_| format!("invalid month in {trimmed:?}"))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range in {trimmed:?}"))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub code: String,
    pub row: u32,
    pub col: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyObservation {
    pub date: YearMonth,
    pub region: String,
    pub price: f64,
    pub rent_weekly: f64,
    pub income_annual: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuyerParameters {
    pub income_annual: f64,
    pub savings: f64,
    pub saving_rate: f64,
    pub deposit_pct: f64,
    pub interest_annual: f64,
    pub term_years: f64,
    pub max_monthly_payment: f64,
}

impl Default for BuyerParameters {
    fn default() -> Self {
        Self {
            income_annual: 95_000.0,
            savings: 40_000.0,
            saving_rate: 0.20,
            deposit_pct: 0.20,
            interest_annual: 0.06,
            term_years: 25.0,
            max_monthly_payment: 4_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetrics {
    pub price_adjusted: f64,
    pub rent_weekly_adjusted: f64,
    pub pti: f64,
    pub rti: f64,
    pub personal_rti: f64,
    pub deposit_target: f64,
    pub years_to_deposit: f64,
    pub loan_principal: f64,
    pub monthly_payment: f64,
    pub mti: f64,
    pub cap_principal: f64,
    pub payment_cap_gap: f64,
}

/// Bedroom count and buyer inputs that every metric extraction depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricContext {
    pub bedrooms: u32,
    pub buyer: BuyerParameters,
}

impl Default for MetricContext {
    fn default() -> Self {
        Self {
            bedrooms: 2,
            buyer: BuyerParameters::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKey {
    #[serde(alias = "rent", alias = "medianRent")]
    MedianRent,
    #[serde(alias = "price", alias = "medianPrice")]
    MedianPrice,
    #[serde(alias = "income", alias = "medianIncome")]
    MedianIncome,
    Pti,
    Rti,
    #[serde(alias = "paymentCapGap", alias = "cap-gap")]
    PaymentCapGap,
}

impl MetricKey {
    pub const ALL: [MetricKey; 6] = [
        MetricKey::MedianRent,
        MetricKey::MedianPrice,
        MetricKey::MedianIncome,
        MetricKey::Pti,
        MetricKey::Rti,
        MetricKey::PaymentCapGap,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MetricKey::MedianRent => "Median Rent (week)",
            MetricKey::MedianPrice => "Median Price",
            MetricKey::MedianIncome => "Median Income (annual)",
            MetricKey::Pti => "PTI (Price-to-Income)",
            MetricKey::Rti => "RTI (Rent-to-Income)",
            MetricKey::PaymentCapGap => "Payment Cap Gap",
        }
    }

    /// Income is the only layer where a larger value means more affordable.
    pub fn higher_is_bad(self) -> bool {
        !matches!(self, MetricKey::MedianIncome)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum WindowPreset {
    #[serde(rename = "max", alias = "Max")]
    Max,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "3y")]
    ThreeYears,
    #[serde(rename = "1y")]
    OneYear,
}

impl WindowPreset {
    /// Lookback length in months; `None` for the full history.
    pub fn months(self) -> Option<usize> {
        match self {
            WindowPreset::Max => None,
            WindowPreset::FiveYears => Some(60),
            WindowPreset::ThreeYears => Some(36),
            WindowPreset::OneYear => Some(12),
        }
    }
}

impl FromStr for WindowPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(WindowPreset::Max),
            "5y" => Ok(WindowPreset::FiveYears),
            "3y" => Ok(WindowPreset::ThreeYears),
            "1y" => Ok(WindowPreset::OneYear),
            other => Err(format!("unknown window preset {other:?} (max, 5y, 3y, 1y)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ym(year: i32, month: u32) -> YearMonth {
        YearMonth::new(year, month).expect("valid month")
    }

    #[test]
    fn year_month_rejects_out_of_range_months() {
        assert!(YearMonth::new(2020, 0).is_none());
        assert!(YearMonth::new(2020, 13).is_none());
    }

    #[test]
    fn year_month_offset_crosses_year_boundaries() {
        assert_eq!(ym(2024, 12).succ(), ym(2025, 1));
        assert_eq!(ym(2025, 9).offset(-60), ym(2020, 9));
        assert_eq!(ym(2025, 1).offset(-1), ym(2024, 12));
        assert_eq!(ym(2015, 1).months_until(ym(2025, 9)), 128);
    }

    #[test]
    fn year_month_parses_and_displays_padded() {
        let parsed: YearMonth = "2015-01".parse().expect("valid");
        assert_eq!(parsed, ym(2015, 1));
        assert_eq!(parsed.to_string(), "2015-01");
        assert!("2015".parse::<YearMonth>().is_err());
        assert!("2015-13".parse::<YearMonth>().is_err());
    }

    #[test]
    fn year_month_parse_rejects_years_outside_four_digits() {
        assert!("0-01".parse::<YearMonth>().is_err());
        assert!("2147483647-12".parse::<YearMonth>().is_err());
        assert!("10000-01".parse::<YearMonth>().is_err());
        assert_eq!("9999-12".parse::<YearMonth>(), Ok(ym(9999, 12)));
        assert!(serde_json::from_str::<YearMonth>("\"-5-03\"").is_err());
    }

    #[test]
    fn year_month_serializes_as_string() {
        let json = serde_json::to_string(&ym(2025, 9)).expect("serialize");
        assert_eq!(json, "\"2025-09\"");
        let back: YearMonth = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, ym(2025, 9));
    }

    #[test]
    fn income_is_the_only_metric_where_higher_is_better() {
        for metric in MetricKey::ALL {
            assert_eq!(metric.higher_is_bad(), metric != MetricKey::MedianIncome);
        }
    }

    #[test]
    fn window_preset_parses_short_names() {
        assert_eq!("5y".parse::<WindowPreset>(), Ok(WindowPreset::FiveYears));
        assert_eq!("MAX".parse::<WindowPreset>(), Ok(WindowPreset::Max));
        assert!("2y".parse::<WindowPreset>().is_err());
    }

    #[test]
    fn rgb_hex_is_lowercase_and_padded() {
        assert_eq!(Rgb(26, 152, 80).hex(), "#1a9850");
        assert_eq!(Rgb(0, 0, 0).hex(), "#000000");
    }
}
