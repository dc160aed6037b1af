use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::{
    BuyerParameters, DashboardQuery, DashboardSnapshot, GridLayout, MarketConfig, MarketSeries,
    MetricContext, MetricKey, WindowPreset, YearMonth, build_dashboard, generate_series,
};

const MAX_REGIONS: usize = 99;
const MAX_CALENDAR_MONTHS: i64 = 1200;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliLayer {
    MedianRent,
    MedianPrice,
    MedianIncome,
    Pti,
    Rti,
    PaymentCapGap,
}

impl From<CliLayer> for MetricKey {
    fn from(value: CliLayer) -> Self {
        match value {
            CliLayer::MedianRent => MetricKey::MedianRent,
            CliLayer::MedianPrice => MetricKey::MedianPrice,
            CliLayer::MedianIncome => MetricKey::MedianIncome,
            CliLayer::Pti => MetricKey::Pti,
            CliLayer::Rti => MetricKey::Rti,
            CliLayer::PaymentCapGap => MetricKey::PaymentCapGap,
        }
    }
}

impl From<MetricKey> for CliLayer {
    fn from(value: MetricKey) -> Self {
        match value {
            MetricKey::MedianRent => CliLayer::MedianRent,
            MetricKey::MedianPrice => CliLayer::MedianPrice,
            MetricKey::MedianIncome => CliLayer::MedianIncome,
            MetricKey::Pti => CliLayer::Pti,
            MetricKey::Rti => CliLayer::Rti,
            MetricKey::PaymentCapGap => CliLayer::PaymentCapGap,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliWindow {
    Max,
    #[value(name = "5y")]
    FiveYears,
    #[value(name = "3y")]
    ThreeYears,
    #[value(name = "1y")]
    OneYear,
}

impl From<CliWindow> for WindowPreset {
    fn from(value: CliWindow) -> Self {
        match value {
            CliWindow::Max => WindowPreset::Max,
            CliWindow::FiveYears => WindowPreset::FiveYears,
            CliWindow::ThreeYears => WindowPreset::ThreeYears,
            CliWindow::OneYear => WindowPreset::OneYear,
        }
    }
}

impl From<WindowPreset> for CliWindow {
    fn from(value: WindowPreset) -> Self {
        match value {
            WindowPreset::Max => CliWindow::Max,
            WindowPreset::FiveYears => CliWindow::FiveYears,
            WindowPreset::ThreeYears => CliWindow::ThreeYears,
            WindowPreset::OneYear => CliWindow::OneYear,
        }
    }
}

/// Region list given either as a JSON array or as `SA2_01,SA2_02` text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CompareList {
    List(Vec<String>),
    Csv(String),
}

impl CompareList {
    fn into_codes(self) -> Vec<String> {
        match self {
            CompareList::List(codes) => codes,
            CompareList::Csv(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DashboardPayload {
    seed: Option<u32>,
    regions: Option<usize>,
    start_month: Option<YearMonth>,
    end_month: Option<YearMonth>,

    window: Option<WindowPreset>,
    from: Option<YearMonth>,
    to: Option<YearMonth>,
    now: Option<YearMonth>,
    layer: Option<MetricKey>,

    bedrooms: Option<u32>,
    income: Option<f64>,
    savings: Option<f64>,
    saving_rate: Option<f64>,
    deposit: Option<f64>,
    interest_rate: Option<f64>,
    term_years: Option<f64>,
    max_monthly_payment: Option<f64>,

    compare: Option<CompareList>,
}

#[derive(Parser, Debug)]
#[command(
    name = "afford",
    about = "Housing affordability dashboard engine for synthetic Sydney SA2 regions"
)]
struct Cli {
    #[arg(long, default_value_t = 20_250_926, help = "Seed of the synthetic market")]
    seed: u32,
    #[arg(long, default_value_t = 12, help = "Number of synthetic SA2 regions")]
    regions: usize,
    #[arg(long, default_value = "2015-01", help = "First month of the synthetic calendar (YYYY-MM)")]
    start_month: YearMonth,
    #[arg(long, default_value = "2025-09", help = "Last month of the synthetic calendar (YYYY-MM)")]
    end_month: YearMonth,
    #[arg(long, value_enum, default_value_t = CliWindow::FiveYears, help = "Lookback window")]
    window: CliWindow,
    #[arg(long, help = "Custom window start (YYYY-MM); overrides --window")]
    from: Option<YearMonth>,
    #[arg(long, help = "Custom window end (YYYY-MM); overrides --window")]
    to: Option<YearMonth>,
    #[arg(long, help = "Month treated as the present; defaults to the last generated month")]
    now: Option<YearMonth>,
    #[arg(long, value_enum, default_value_t = CliLayer::Pti, help = "Metric used to colour the map")]
    layer: CliLayer,
    #[arg(long, default_value_t = 2, help = "Bedroom count (1-3; other values are unadjusted)")]
    bedrooms: u32,
    #[arg(long, default_value_t = 95_000.0, help = "Your annual household income")]
    income: f64,
    #[arg(long, default_value_t = 40_000.0, help = "Your current savings")]
    savings: f64,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Share of income saved each year in percent"
    )]
    saving_rate: f64,
    #[arg(long, default_value_t = 20.0, help = "Deposit in percent of price")]
    deposit: f64,
    #[arg(long, default_value_t = 6.0, help = "Annual mortgage interest rate in percent")]
    interest_rate: f64,
    #[arg(long, default_value_t = 25.0, help = "Mortgage term in years")]
    term_years: f64,
    #[arg(
        long,
        default_value_t = 4_000.0,
        help = "Largest monthly repayment you are prepared to make"
    )]
    max_monthly_payment: f64,
    #[arg(
        long,
        value_delimiter = ',',
        help = "Up to three SA2 codes to compare, e.g. SA2_01,SA2_05"
    )]
    compare: Vec<String>,
}

#[derive(Debug)]
struct ApiRequest {
    market: MarketConfig,
    query: DashboardQuery,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardResponse {
    seed: u32,
    region_count: usize,
    calendar_start: YearMonth,
    calendar_end: YearMonth,
    #[serde(flatten)]
    snapshot: DashboardSnapshot,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

struct AppState {
    reference_config: MarketConfig,
    reference: Arc<MarketSeries>,
    grid: GridLayout,
}

fn require_finite(name: &str, value: f64) -> Result<f64, String> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("{name} must be a finite number"))
    }
}

fn build_request(cli: Cli) -> Result<ApiRequest, String> {
    if cli.end_month < cli.start_month {
        return Err("--end-month must be >= --start-month".to_string());
    }

    if cli.start_month.months_until(cli.end_month) >= MAX_CALENDAR_MONTHS {
        return Err(format!("calendar must span at most {MAX_CALENDAR_MONTHS} months"));
    }

    if cli.regions == 0 || cli.regions > MAX_REGIONS {
        return Err(format!("--regions must be between 1 and {MAX_REGIONS}"));
    }

    let term_years = require_finite("--term-years", cli.term_years)?;
    if term_years <= 0.0 {
        return Err("--term-years must be > 0".to_string());
    }

    let income = require_finite("--income", cli.income)?;
    let savings = require_finite("--savings", cli.savings)?;
    let saving_rate = require_finite("--saving-rate", cli.saving_rate)?;
    let deposit = require_finite("--deposit", cli.deposit)?;
    let interest_rate = require_finite("--interest-rate", cli.interest_rate)?;
    let max_monthly_payment = require_finite("--max-monthly-payment", cli.max_monthly_payment)?;

    if income < 0.0 || savings < 0.0 || max_monthly_payment < 0.0 {
        return Err("--income, --savings and --max-monthly-payment must be >= 0".to_string());
    }

    let range = match (cli.from, cli.to) {
        (None, None) => None,
        (from, to) => {
            let start = from.unwrap_or(cli.start_month);
            let end = to.unwrap_or(cli.end_month);
            if end < start {
                return Err("--to must be >= --from".to_string());
            }
            Some((start, end))
        }
    };

    let buyer = BuyerParameters {
        income_annual: income,
        savings,
        saving_rate: saving_rate / 100.0,
        deposit_pct: deposit / 100.0,
        interest_annual: interest_rate / 100.0,
        term_years,
        max_monthly_payment,
    };

    Ok(ApiRequest {
        market: MarketConfig {
            seed: cli.seed,
            region_count: cli.regions,
            start: cli.start_month,
            end: cli.end_month,
        },
        query: DashboardQuery {
            preset: cli.window.into(),
            range,
            now: cli.now,
            layer: cli.layer.into(),
            ctx: MetricContext {
                bedrooms: cli.bedrooms,
                buyer,
            },
            selected: cli.compare,
        },
    })
}

fn run_request(
    request: &ApiRequest,
    series: &MarketSeries,
    grid: &GridLayout,
) -> Result<DashboardResponse, String> {
    let snapshot = build_dashboard(series, &request.query, grid).map_err(|e| e.to_string())?;
    Ok(DashboardResponse {
        seed: request.market.seed,
        region_count: request.market.region_count,
        calendar_start: request.market.start,
        calendar_end: request.market.end,
        snapshot,
    })
}

/// One-shot report: parse CLI flags and render the dashboard as pretty JSON.
pub fn run_report<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let request = build_request(Cli::parse_from(args))?;
    let series = generate_series(&request.market).map_err(|e| e.to_string())?;
    let response = run_request(&request, &series, &GridLayout::reference())?;
    serde_json::to_string_pretty(&response).map_err(|e| format!("Failed to encode report: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let reference_config = MarketConfig::reference();
    let reference = generate_series(&reference_config).map_err(std::io::Error::other)?;
    let state = Arc::new(AppState {
        reference_config,
        reference: Arc::new(reference),
        grid: GridLayout::reference(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/dashboard",
            get(dashboard_get_handler).post(dashboard_post_handler),
        )
        .route("/api/health", get(health_handler))
        .fallback(not_found_handler)
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "affordability API listening");
    info!("Local access: http://127.0.0.1:{port}/api/dashboard");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn dashboard_get_handler(
    State(state): State<Arc<AppState>>,
    Query(payload): Query<DashboardPayload>,
) -> Response {
    dashboard_response(&state, payload)
}

async fn dashboard_post_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DashboardPayload>,
) -> Response {
    dashboard_response(&state, payload)
}

fn dashboard_response(state: &AppState, payload: DashboardPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => {
            warn!(error = %msg, "rejected dashboard request");
            return error_response(StatusCode::BAD_REQUEST, &msg);
        }
    };

    let series = if request.market == state.reference_config {
        Arc::clone(&state.reference)
    } else {
        debug!(seed = request.market.seed, "regenerating market for custom config");
        match generate_series(&request.market) {
            Ok(series) => Arc::new(series),
            Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
        }
    };

    match run_request(&request, &series, &state.grid) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(msg) => {
            warn!(error = %msg, "dashboard request produced no snapshot");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<DashboardPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: DashboardPayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.seed {
        cli.seed = v;
    }
    if let Some(v) = payload.regions {
        cli.regions = v;
    }
    if let Some(v) = payload.start_month {
        cli.start_month = v;
    }
    if let Some(v) = payload.end_month {
        cli.end_month = v;
    }
    if let Some(v) = payload.window {
        cli.window = v.into();
    }
    cli.from = payload.from;
    cli.to = payload.to;
    cli.now = payload.now;
    if let Some(v) = payload.layer {
        cli.layer = v.into();
    }
    if let Some(v) = payload.bedrooms {
        cli.bedrooms = v;
    }
    if let Some(v) = payload.income {
        cli.income = v;
    }
    if let Some(v) = payload.savings {
        cli.savings = v;
    }
    if let Some(v) = payload.saving_rate {
        cli.saving_rate = v;
    }
    if let Some(v) = payload.deposit {
        cli.deposit = v;
    }
    if let Some(v) = payload.interest_rate {
        cli.interest_rate = v;
    }
    if let Some(v) = payload.term_years {
        cli.term_years = v;
    }
    if let Some(v) = payload.max_monthly_payment {
        cli.max_monthly_payment = v;
    }
    if let Some(v) = payload.compare {
        cli.compare = v.into_codes();
    }

    build_request(cli)
}

fn default_cli_for_api() -> Cli {
    let market = MarketConfig::reference();
    let buyer = BuyerParameters::default();
    let query = DashboardQuery::default();
    Cli {
        seed: market.seed,
        regions: market.region_count,
        start_month: market.start,
        end_month: market.end,
        window: query.preset.into(),
        from: None,
        to: None,
        now: None,
        layer: query.layer.into(),
        bedrooms: query.ctx.bedrooms,
        income: buyer.income_annual,
        savings: buyer.savings,
        saving_rate: buyer.saving_rate * 100.0,
        deposit: buyer.deposit_pct * 100.0,
        interest_rate: buyer.interest_annual * 100.0,
        term_years: buyer.term_years,
        max_monthly_payment: buyer.max_monthly_payment,
        compare: Vec::new(),
    }
}
