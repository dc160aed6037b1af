use std::f64::consts::PI;

use tracing::debug;

use super::rng::Rng;
use super::types::{EngineError, MonthlyObservation, Region, YearMonth};

pub const PRICE_FLOOR: f64 = 250_000.0;
pub const RENT_FLOOR: f64 = 250.0;
pub const INCOME_FLOOR: f64 = 40_000.0;

const GRID_COLUMNS: u32 = 4;
const REFERENCE_START: YearMonth = YearMonth::from_parts(2015, 1);
const REFERENCE_END: YearMonth = YearMonth::from_parts(2025, 9);
const SEASONAL_AMPLITUDE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketConfig {
    pub seed: u32,
    pub region_count: usize,
    pub start: YearMonth,
    pub end: YearMonth,
}

impl MarketConfig {
    /// Seed and calendar the dashboard ships with: 12 regions, 2015-01 to 2025-09.
    pub fn reference() -> Self {
        Self {
            seed: 20_250_926,
            region_count: 12,
            start: REFERENCE_START,
            end: REFERENCE_END,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketSeries {
    regions: Vec<Region>,
    months: Vec<YearMonth>,
    observations: Vec<MonthlyObservation>,
}

impl MarketSeries {
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn months(&self) -> &[YearMonth] {
        &self.months
    }

    pub fn observations(&self) -> &[MonthlyObservation] {
        &self.observations
    }

    pub fn latest_month(&self) -> Option<YearMonth> {
        self.months.last().copied()
    }

    pub fn month_index(&self, date: YearMonth) -> Option<usize> {
        let first = *self.months.first()?;
        let offset = usize::try_from(first.months_until(date)).ok()?;
        (offset < self.months.len()).then_some(offset)
    }

    pub fn region(&self, code: &str) -> Option<&Region> {
        self.regions.iter().find(|region| region.code == code)
    }

    /// Observations are stored region-major, so one region is a contiguous slice.
    pub fn for_region(&self, code: &str) -> &[MonthlyObservation] {
        let Some(position) = self.regions.iter().position(|region| region.code == code) else {
            return &[];
        };
        let len = self.months.len();
        &self.observations[position * len..(position + 1) * len]
    }

    pub fn at(&self, date: YearMonth) -> Vec<&MonthlyObservation> {
        let Some(index) = self.month_index(date) else {
            return Vec::new();
        };
        let len = self.months.len();
        (0..self.regions.len())
            .map(|position| &self.observations[position * len + index])
            .collect()
    }
}

#[derive(Debug)]
struct RegionState {
    price: f64,
    rent_weekly: f64,
    income_annual: f64,
    growth_price: f64,
    growth_rent: f64,
    growth_income: f64,
}

impl RegionState {
    fn draw(rng: &mut Rng) -> Self {
        let price = rng.uniform(650_000.0, 1_600_000.0);
        let rent_weekly = rng.uniform(420.0, 900.0);
        let income_annual = rng.uniform(70_000.0, 125_000.0);

        let growth_price = 0.0018 + rng.normal(0.0, 0.0004).clamp(-0.0012, 0.0012);
        let growth_rent = 0.0012 + rng.normal(0.0, 0.0003).clamp(-0.0009, 0.0009);
        let growth_income = 0.0009 + rng.normal(0.0, 0.00025).clamp(-0.00075, 0.00075);

        Self {
            price,
            rent_weekly,
            income_annual,
            growth_price,
            growth_rent,
            growth_income,
        }
    }

    fn step(
        &mut self,
        rng: &mut Rng,
        month_index: usize,
        date: YearMonth,
        code: &str,
    ) -> MonthlyObservation {
        let seasonal = seasonal_multiplier(month_index);

        self.price *= 1.0 + self.growth_price + rng.normal(0.0, 0.001).clamp(-0.003, 0.003);
        self.rent_weekly *= 1.0 + self.growth_rent + rng.normal(0.0, 0.0008).clamp(-0.002, 0.002);
        self.income_annual *=
            1.0 + self.growth_income + rng.normal(0.0, 0.0006).clamp(-0.0015, 0.0015);

        let price = (self.price * seasonal + rng.normal(0.0, 12_000.0)).max(PRICE_FLOOR);
        let rent_weekly = (self.rent_weekly * seasonal + rng.normal(0.0, 8.0)).max(RENT_FLOOR);
        let income_annual =
            (self.income_annual * (0.995 + rng.normal(0.0, 0.002))).max(INCOME_FLOOR);

        MonthlyObservation {
            date,
            region: code.to_string(),
            price,
            rent_weekly,
            income_annual,
        }
    }
}

pub fn seasonal_multiplier(month_index: usize) -> f64 {
    1.0 + SEASONAL_AMPLITUDE * (2.0 * PI * (month_index % 12) as f64 / 12.0).sin()
}

pub fn region_code(index: usize) -> String {
    format!("SA2_{:02}", index + 1)
}

pub fn month_sequence(start: YearMonth, end: YearMonth) -> Result<Vec<YearMonth>, EngineError> {
    if end < start {
        return Err(EngineError::InvalidDateRange { start, end });
    }
    let count = start.months_until(end) as usize + 1;
    let mut months = Vec::with_capacity(count);
    let mut current = start;
    for _ in 0..count {
        months.push(current);
        current = current.succ();
    }
    Ok(months)
}

pub fn generate_series(config: &MarketConfig) -> Result<MarketSeries, EngineError> {
    let months = month_sequence(config.start, config.end)?;
    let regions: Vec<Region> = (0..config.region_count)
        .map(|index| Region {
            code: region_code(index),
            row: index as u32 / GRID_COLUMNS,
            col: index as u32 % GRID_COLUMNS,
        })
        .collect();

    let mut rng = Rng::new(config.seed);
    let mut observations = Vec::with_capacity(regions.len() * months.len());
    for region in &regions {
        let mut state = RegionState::draw(&mut rng);
        for (month_index, &date) in months.iter().enumerate() {
            observations.push(state.step(&mut rng, month_index, date, &region.code));
        }
    }

    debug!(
        seed = config.seed,
        regions = regions.len(),
        months = months.len(),
        "generated synthetic market series"
    );

    Ok(MarketSeries {
        regions,
        months,
        observations,
    })
}
