use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    Aggregates, BenefitSchedule, Demographics, Economy, LifecyclePath, Params, Preferences,
    SolveConfig, aggregate_capital, aggregate_labor, output, solve_steady_state,
};

#[derive(Parser, Debug)]
#[command(
    name = "olg",
    about = "Steady-state solver for an overlapping-generations economy with ability types and a parametric tax system"
)]
struct Cli {
    #[arg(long, default_value_t = 7, help = "Number of lifetime-ability types")]
    ability_types: usize,
    #[arg(long, default_value_t = 80, help = "Number of life periods")]
    lifespan: usize,
    #[arg(
        long,
        default_value_t = 160,
        help = "Transition horizon carried in the shared parameter bundle"
    )]
    transition_periods: usize,
    #[arg(long, default_value_t = 0.96, help = "Per-period discount factor")]
    discount: f64,
    #[arg(long, default_value_t = 3.0, help = "Coefficient of relative risk aversion")]
    risk_aversion: f64,
    #[arg(long, default_value_t = 0.35, help = "Capital share of income")]
    capital_share: f64,
    #[arg(
        long,
        default_value_t = 0.4,
        help = "Initial relaxation weight for the aggregate update"
    )]
    relaxation: f64,
    #[arg(long, default_value_t = 1.0, help = "Total-factor productivity")]
    total_factor_productivity: f64,
    #[arg(long, default_value_t = 0.05, help = "Capital depreciation rate")]
    depreciation: f64,
    #[arg(long, default_value_t = 1.0, help = "Per-period time endowment")]
    time_endowment: f64,
    #[arg(long, default_value_t = 0.03, help = "Technology growth rate")]
    tech_growth: f64,
    #[arg(long, default_value_t = 0.15, help = "Payroll tax rate")]
    payroll_tax: f64,
    #[arg(long, default_value_t = 72, help = "First retirement period")]
    retirement_period: usize,
    #[arg(
        long,
        default_value_t = 84580.67,
        help = "Mean income in data units, pins the income-scaling factor"
    )]
    mean_income_target: f64,
    #[arg(long, default_value_t = 3.03452711316e-06)]
    income_tax_a: f64,
    #[arg(long, default_value_t = 0.222)]
    income_tax_b: f64,
    #[arg(long, default_value_t = 133261.0)]
    income_tax_c: f64,
    #[arg(long, default_value_t = 0.219)]
    income_tax_d: f64,
    #[arg(long, default_value_t = 0.1)]
    wealth_tax_h: f64,
    #[arg(long, default_value_t = 0.096)]
    wealth_tax_p: f64,
    #[arg(long, default_value_t = 1.0)]
    wealth_tax_m: f64,
    #[arg(long, default_value_t = 25.6594, help = "Labor disutility ellipse scale")]
    ellipse_b: f64,
    #[arg(long, default_value_t = 3.0542, help = "Labor disutility ellipse curvature")]
    ellipse_upsilon: f64,
    #[arg(long, default_value_t = 0.0, help = "Bequest tax rate, uniform across types")]
    bequest_tax: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Payroll replacement amount in wage units, uniform across types"
    )]
    replacement_rate: f64,
    #[arg(long, default_value_t = 1.0, help = "Bequest weight, uniform across types")]
    bequest_weight: f64,
    #[arg(
        long,
        default_value_t = 1.0,
        help = "Labor disutility weight, uniform across periods"
    )]
    labor_disutility: f64,
    #[arg(long, default_value_t = 250, help = "Aggregate iteration cap")]
    max_iterations: usize,
    #[arg(long, default_value_t = 1e-9, help = "Aggregate convergence tolerance")]
    tolerance: f64,
    #[arg(long, default_value_t = 0.06)]
    interest_guess: f64,
    #[arg(long, default_value_t = 1.2)]
    wage_guess: f64,
    #[arg(long, default_value_t = 0.0)]
    transfer_guess: f64,
    #[arg(long, default_value_t = 100000.0)]
    factor_guess: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SteadyStatePayload {
    ability_types: Option<usize>,
    lifespan: Option<usize>,
    transition_periods: Option<usize>,
    discount: Option<f64>,
    risk_aversion: Option<f64>,
    capital_share: Option<f64>,
    relaxation: Option<f64>,
    total_factor_productivity: Option<f64>,
    depreciation: Option<f64>,
    time_endowment: Option<f64>,
    tech_growth: Option<f64>,
    payroll_tax: Option<f64>,
    retirement_period: Option<usize>,
    mean_income_target: Option<f64>,
    income_tax_a: Option<f64>,
    income_tax_b: Option<f64>,
    income_tax_c: Option<f64>,
    income_tax_d: Option<f64>,
    wealth_tax_h: Option<f64>,
    wealth_tax_p: Option<f64>,
    wealth_tax_m: Option<f64>,
    ellipse_b: Option<f64>,
    ellipse_upsilon: Option<f64>,
    bequest_tax: Option<f64>,
    replacement_rate: Option<f64>,
    bequest_weight: Option<f64>,
    labor_disutility: Option<f64>,
    max_iterations: Option<usize>,
    tolerance: Option<f64>,
    interest_guess: Option<f64>,
    wage_guess: Option<f64>,
    transfer_guess: Option<f64>,
    factor_guess: Option<f64>,
}

#[derive(Debug)]
struct ApiRequest {
    economy: Economy,
    preferences: Preferences,
    config: SolveConfig,
    guesses: Aggregates,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PathResponse {
    assets: Vec<f64>,
    labor: Vec<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SteadyStateResponse {
    converged: bool,
    iterations: usize,
    distance: f64,
    max_residual: f64,
    interest: f64,
    wage: f64,
    transfer: f64,
    factor: f64,
    capital: f64,
    labor_supply: f64,
    output: f64,
    paths: Vec<PathResponse>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_params(cli: &Cli) -> Result<Params, String> {
    let params = Params {
        ability_types: cli.ability_types,
        lifespan: cli.lifespan,
        transition_periods: cli.transition_periods,
        discount: cli.discount,
        risk_aversion: cli.risk_aversion,
        capital_share: cli.capital_share,
        relaxation: cli.relaxation,
        total_factor_productivity: cli.total_factor_productivity,
        depreciation: cli.depreciation,
        time_endowment: cli.time_endowment,
        tech_growth: cli.tech_growth,
        payroll_tax: cli.payroll_tax,
        retirement_period: cli.retirement_period,
        mean_income_target: cli.mean_income_target,
        income_tax_a: cli.income_tax_a,
        income_tax_b: cli.income_tax_b,
        income_tax_c: cli.income_tax_c,
        income_tax_d: cli.income_tax_d,
        wealth_tax_h: cli.wealth_tax_h,
        wealth_tax_p: cli.wealth_tax_p,
        wealth_tax_m: cli.wealth_tax_m,
        ellipse_b: cli.ellipse_b,
        ellipse_upsilon: cli.ellipse_upsilon,
    };
    params.validate()?;
    if cli.max_iterations == 0 {
        return Err("--max-iterations must be > 0".to_string());
    }
    if !cli.tolerance.is_finite() || cli.tolerance <= 0.0 {
        return Err("--tolerance must be > 0".to_string());
    }
    if cli.bequest_weight <= 0.0 || cli.labor_disutility <= 0.0 {
        return Err("--bequest-weight and --labor-disutility must be > 0".to_string());
    }
    if cli.factor_guess <= 0.0 {
        return Err("--factor-guess must be > 0".to_string());
    }
    Ok(params)
}

fn build_request(cli: Cli) -> Result<ApiRequest, String> {
    let params = build_params(&cli)?;
    let demographics = Demographics::canonical(params.lifespan, params.ability_types);
    let economy = Economy {
        benefits: BenefitSchedule {
            replacement: vec![cli.replacement_rate; params.ability_types],
        },
        bequest_tax: vec![cli.bequest_tax; params.ability_types],
        demographics,
        params,
    };
    economy.validate()?;
    let preferences = Preferences {
        bequest_weight: vec![cli.bequest_weight; economy.params.ability_types],
        labor_disutility: vec![cli.labor_disutility; economy.params.lifespan],
    };
    Ok(ApiRequest {
        config: SolveConfig {
            max_iterations: cli.max_iterations,
            tolerance: cli.tolerance,
        },
        guesses: Aggregates {
            interest: cli.interest_guess,
            wage: cli.wage_guess,
            transfer: cli.transfer_guess,
            factor: cli.factor_guess,
        },
        preferences,
        economy,
    })
}

fn default_cli_for_api() -> Cli {
    Cli::parse_from(["olg"])
}

fn api_request_from_payload(payload: SteadyStatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.ability_types {
        cli.ability_types = v;
    }
    if let Some(v) = payload.lifespan {
        cli.lifespan = v;
        // Keep the default retirement rule tied to the lifespan unless the
        // payload pins it explicitly.
        cli.retirement_period = (9 * v).div_ceil(10).min(v.saturating_sub(1));
    }
    if let Some(v) = payload.transition_periods {
        cli.transition_periods = v;
    }
    if let Some(v) = payload.discount {
        cli.discount = v;
    }
    if let Some(v) = payload.risk_aversion {
        cli.risk_aversion = v;
    }
    if let Some(v) = payload.capital_share {
        cli.capital_share = v;
    }
    if let Some(v) = payload.relaxation {
        cli.relaxation = v;
    }
    if let Some(v) = payload.total_factor_productivity {
        cli.total_factor_productivity = v;
    }
    if let Some(v) = payload.depreciation {
        cli.depreciation = v;
    }
    if let Some(v) = payload.time_endowment {
        cli.time_endowment = v;
    }
    if let Some(v) = payload.tech_growth {
        cli.tech_growth = v;
    }
    if let Some(v) = payload.payroll_tax {
        cli.payroll_tax = v;
    }
    if let Some(v) = payload.retirement_period {
        cli.retirement_period = v;
    }
    if let Some(v) = payload.mean_income_target {
        cli.mean_income_target = v;
    }
    if let Some(v) = payload.income_tax_a {
        cli.income_tax_a = v;
    }
    if let Some(v) = payload.income_tax_b {
        cli.income_tax_b = v;
    }
    if let Some(v) = payload.income_tax_c {
        cli.income_tax_c = v;
    }
    if let Some(v) = payload.income_tax_d {
        cli.income_tax_d = v;
    }
    if let Some(v) = payload.wealth_tax_h {
        cli.wealth_tax_h = v;
    }
    if let Some(v) = payload.wealth_tax_p {
        cli.wealth_tax_p = v;
    }
    if let Some(v) = payload.wealth_tax_m {
        cli.wealth_tax_m = v;
    }
    if let Some(v) = payload.ellipse_b {
        cli.ellipse_b = v;
    }
    if let Some(v) = payload.ellipse_upsilon {
        cli.ellipse_upsilon = v;
    }
    if let Some(v) = payload.bequest_tax {
        cli.bequest_tax = v;
    }
    if let Some(v) = payload.replacement_rate {
        cli.replacement_rate = v;
    }
    if let Some(v) = payload.bequest_weight {
        cli.bequest_weight = v;
    }
    if let Some(v) = payload.labor_disutility {
        cli.labor_disutility = v;
    }
    if let Some(v) = payload.max_iterations {
        cli.max_iterations = v;
    }
    if let Some(v) = payload.tolerance {
        cli.tolerance = v;
    }
    if let Some(v) = payload.interest_guess {
        cli.interest_guess = v;
    }
    if let Some(v) = payload.wage_guess {
        cli.wage_guess = v;
    }
    if let Some(v) = payload.transfer_guess {
        cli.transfer_guess = v;
    }
    if let Some(v) = payload.factor_guess {
        cli.factor_guess = v;
    }

    build_request(cli)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/steady-state",
            get(steady_state_get_handler).post(steady_state_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("OLG steady-state API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn steady_state_get_handler(Query(payload): Query<SteadyStatePayload>) -> Response {
    steady_state_handler_impl(payload).await
}

async fn steady_state_post_handler(Json(payload): Json<SteadyStatePayload>) -> Response {
    steady_state_handler_impl(payload).await
}

async fn steady_state_handler_impl(payload: SteadyStatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let initial_paths: Vec<LifecyclePath> = (0..request.economy.params.ability_types)
        .map(|_| {
            LifecyclePath::flat_guess(
                request.economy.params.lifespan,
                request.economy.params.time_endowment,
            )
        })
        .collect();

    let state = match solve_steady_state(
        &request.economy,
        &request.preferences,
        &initial_paths,
        request.guesses,
        &request.config,
    ) {
        Ok(state) => state,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let assets: Vec<Vec<f64>> = state.paths.iter().map(|p| p.assets.clone()).collect();
    let labor: Vec<Vec<f64>> = state.paths.iter().map(|p| p.labor.clone()).collect();
    let capital = aggregate_capital(&assets, &request.economy.demographics);
    let labor_supply = aggregate_labor(&labor, &request.economy.demographics);

    let response = SteadyStateResponse {
        converged: state.converged,
        iterations: state.iterations,
        distance: state.distance,
        max_residual: state.max_residual,
        interest: state.aggregates.interest,
        wage: state.aggregates.wage,
        transfer: state.aggregates.transfer,
        factor: state.aggregates.factor,
        capital,
        labor_supply,
        output: output(capital, labor_supply, &request.economy.params),
        paths: state
            .paths
            .into_iter()
            .map(|p| PathResponse {
                assets: p.assets,
                labor: p.labor,
            })
            .collect(),
    };
    json_response(StatusCode::OK, response)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
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
    let payload = serde_json::from_str::<SteadyStatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}
