use super::types::{BuyerParameters, DerivedMetrics, EngineError, MonthlyObservation};

/// Stand-in for an unbounded ratio when the denominator is zero or negligible.
pub const RATIO_SENTINEL: f64 = 1e9;
/// Term used for the map layer's payment-cap gap so every region shares one basis.
pub const MAP_BASELINE_TERM_YEARS: f64 = 25.0;

const MIN_DENOMINATOR: f64 = 1e-9;
const WEEKS_PER_YEAR: f64 = 52.0;
const MONTHS_PER_YEAR: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BedroomMultiplier {
    pub rent: f64,
    pub price: f64,
}

/// Unknown bedroom counts fall back to the identity multiplier.
pub fn bedroom_multiplier(bedrooms: u32) -> BedroomMultiplier {
    match bedrooms {
        1 => BedroomMultiplier {
            rent: 1.00,
            price: 0.85,
        },
        2 => BedroomMultiplier {
            rent: 1.35,
            price: 1.00,
        },
        3 => BedroomMultiplier {
            rent: 1.75,
            price: 1.25,
        },
        _ => BedroomMultiplier {
            rent: 1.00,
            price: 1.00,
        },
    }
}

fn saturating_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator.is_finite() && denominator > MIN_DENOMINATOR {
        return numerator / denominator;
    }
    if numerator == 0.0 {
        0.0
    } else {
        RATIO_SENTINEL.copysign(numerator)
    }
}

fn term_months(years: f64) -> Result<f64, EngineError> {
    if !years.is_finite() || years <= 0.0 {
        return Err(EngineError::InvalidTerm { years });
    }
    Ok((years * MONTHS_PER_YEAR).max(1.0))
}

fn monthly_rate(annual_rate: f64) -> f64 {
    if annual_rate.is_finite() {
        annual_rate.max(0.0) / MONTHS_PER_YEAR
    } else {
        0.0
    }
}

pub fn annuity_monthly_payment(
    principal: f64,
    annual_rate: f64,
    years: f64,
) -> Result<f64, EngineError> {
    let n = term_months(years)?;
    if principal <= 0.0 {
        return Ok(0.0);
    }
    let r = monthly_rate(annual_rate);
    let discount = 1.0 - (1.0 + r).powf(-n);
    if r == 0.0 || discount <= 0.0 {
        return Ok(principal / n);
    }
    Ok(principal * r / discount)
}

pub fn principal_from_monthly_payment(
    payment: f64,
    annual_rate: f64,
    years: f64,
) -> Result<f64, EngineError> {
    let n = term_months(years)?;
    if payment <= 0.0 {
        return Ok(0.0);
    }
    let r = monthly_rate(annual_rate);
    let discount = 1.0 - (1.0 + r).powf(-n);
    if r == 0.0 || discount <= 0.0 {
        return Ok(payment * n);
    }
    Ok(payment * discount / r)
}

pub fn pti(price_adjusted: f64, income_annual: f64) -> f64 {
    saturating_ratio(price_adjusted, income_annual)
}

pub fn rti(rent_weekly_adjusted: f64, income_annual: f64) -> f64 {
    saturating_ratio(rent_weekly_adjusted * WEEKS_PER_YEAR, income_annual)
}

pub fn mti(monthly_payment: f64, income_annual: f64) -> f64 {
    saturating_ratio(monthly_payment * MONTHS_PER_YEAR, income_annual)
}

pub fn years_to_deposit(
    deposit_target: f64,
    savings: f64,
    saving_rate: f64,
    income_annual: f64,
) -> f64 {
    saturating_ratio((deposit_target - savings).max(0.0), saving_rate * income_annual)
}

/// Share of the price the buyer is short under their payment cap; `<= 0` is affordable.
pub fn payment_cap_gap(price_adjusted: f64, deposit_pct: f64, cap_principal: f64) -> f64 {
    let required = price_adjusted * (1.0 - clamp_deposit(deposit_pct));
    saturating_ratio(required - cap_principal, price_adjusted)
}

fn clamp_deposit(deposit_pct: f64) -> f64 {
    if deposit_pct.is_finite() {
        deposit_pct.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Gap on the fixed map basis, independent of the buyer's chosen term.
pub fn map_payment_cap_gap(
    price_adjusted: f64,
    buyer: &BuyerParameters,
) -> Result<f64, EngineError> {
    let cap_principal = principal_from_monthly_payment(
        buyer.max_monthly_payment,
        buyer.interest_annual,
        MAP_BASELINE_TERM_YEARS,
    )?;
    Ok(payment_cap_gap(
        price_adjusted,
        buyer.deposit_pct,
        cap_principal,
    ))
}

pub fn compute_derived(
    observation: &MonthlyObservation,
    bedrooms: u32,
    buyer: &BuyerParameters,
) -> Result<DerivedMetrics, EngineError> {
    let multiplier = bedroom_multiplier(bedrooms);
    let price_adjusted = observation.price * multiplier.price;
    let rent_weekly_adjusted = observation.rent_weekly * multiplier.rent;

    let deposit_pct = clamp_deposit(buyer.deposit_pct);
    let deposit_target = deposit_pct * price_adjusted;
    let loan_principal = (price_adjusted - deposit_target).max(0.0);
    let monthly_payment =
        annuity_monthly_payment(loan_principal, buyer.interest_annual, buyer.term_years)?;
    let cap_principal = principal_from_monthly_payment(
        buyer.max_monthly_payment,
        buyer.interest_annual,
        buyer.term_years,
    )?;

    Ok(DerivedMetrics {
        price_adjusted,
        rent_weekly_adjusted,
        pti: pti(price_adjusted, observation.income_annual),
        rti: rti(rent_weekly_adjusted, observation.income_annual),
        personal_rti: rti(rent_weekly_adjusted, buyer.income_annual),
        deposit_target,
        years_to_deposit: years_to_deposit(
            deposit_target,
            buyer.savings,
            buyer.saving_rate,
            buyer.income_annual,
        ),
        loan_principal,
        monthly_payment,
        mti: mti(monthly_payment, buyer.income_annual),
        cap_principal,
        payment_cap_gap: payment_cap_gap(price_adjusted, deposit_pct, cap_principal),
    })
}
