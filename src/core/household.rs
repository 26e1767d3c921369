use super::tax::{self, TaxRound};
use super::types::Params;

pub fn marginal_utility_consumption(consumption: f64, params: &Params) -> f64 {
    consumption.powf(-params.risk_aversion)
}

/// Elliptical labor disutility, differentiated in hours.
pub fn marginal_utility_labor(labor: f64, disutility: f64, params: &Params) -> f64 {
    let endowment = params.time_endowment;
    let upsilon = params.ellipse_upsilon;
    let frac = labor / endowment;
    disutility
        * params.ellipse_b
        * (1.0 / endowment)
        * (1.0 - frac.powf(upsilon)).powf((1.0 - upsilon) / upsilon)
        * frac.powf(upsilon - 1.0)
}

/// Budget identity: gross return on holdings plus labor earnings plus
/// per-capita bequest receipts, less growth-adjusted savings and net taxes.
#[allow(clippy::too_many_arguments)]
pub fn consumption(
    interest: f64,
    assets_start: &[f64],
    wage: f64,
    productivity: &[f64],
    labor: &[f64],
    bequests: f64,
    share: f64,
    assets_next: &[f64],
    params: &Params,
    net_tax: &[f64],
) -> Vec<f64> {
    let growth = params.tech_growth.exp();
    (0..assets_start.len())
        .map(|s| {
            (1.0 + interest) * assets_start[s] + wage * productivity[s] * labor[s]
                + bequests / share
                - assets_next[s] * growth
                - net_tax[s]
        })
        .collect()
}

/// Intertemporal savings condition for one ability type's whole lifecycle.
/// Entry `s` compares marginal utility today against the discounted,
/// survival-weighted after-tax return on saving plus the bequest motive.
#[allow(clippy::too_many_arguments)]
pub fn savings_residual(
    wage: f64,
    interest: f64,
    productivity: &[f64],
    labor: &[f64],
    assets_start: &[f64],
    assets_next: &[f64],
    assets_next2: &[f64],
    bequests: f64,
    factor: f64,
    transfer: f64,
    bequest_weight: f64,
    params: &Params,
    benefit: f64,
    bequest_tax: f64,
    mortality: &[f64],
    share: f64,
) -> Vec<f64> {
    let lifespan = productivity.len();
    let mut productivity_ahead = productivity[1..].to_vec();
    productivity_ahead.push(0.0);
    let mut labor_ahead = labor[1..].to_vec();
    labor_ahead.push(0.0);

    let ctx = TaxRound {
        interest,
        wage,
        factor,
        transfer,
        params,
    };
    let tax_now = ctx.net_tax_path(
        assets_start,
        productivity,
        labor,
        bequests,
        share,
        false,
        benefit,
        bequest_tax,
    );
    let tax_ahead = ctx.net_tax_path(
        assets_next,
        &productivity_ahead,
        &labor_ahead,
        bequests,
        share,
        true,
        benefit,
        bequest_tax,
    );

    let cons_now = consumption(
        interest,
        assets_start,
        wage,
        productivity,
        labor,
        bequests,
        share,
        assets_next,
        params,
        &tax_now,
    );
    let cons_ahead = consumption(
        interest,
        assets_next,
        wage,
        &productivity_ahead,
        &labor_ahead,
        bequests,
        share,
        assets_next2,
        params,
        &tax_ahead,
    );

    let growth = (-params.risk_aversion * params.tech_growth).exp();
    (0..lifespan)
        .map(|s| {
            let income_ahead = tax::taxable_income(
                interest,
                assets_next[s],
                wage,
                productivity_ahead[s],
                labor_ahead[s],
                factor,
            );
            let after_tax_return = 1.0
                + interest
                    * (1.0
                        - tax::income_tax_rate(
                            interest,
                            assets_next[s],
                            wage,
                            productivity_ahead[s],
                            labor_ahead[s],
                            factor,
                            params,
                        )
                        - tax::income_tax_rate_deriv(
                            interest,
                            assets_next[s],
                            wage,
                            productivity_ahead[s],
                            labor_ahead[s],
                            factor,
                            params,
                        ) * income_ahead)
                - tax::wealth_tax_rate_deriv(assets_next[s], params) * assets_next[s]
                - tax::wealth_tax_rate(assets_next[s], params);
            let bequest_motive = mortality[s]
                * growth
                * bequest_weight
                * assets_next[s].powf(-params.risk_aversion);
            marginal_utility_consumption(cons_now[s], params)
                - params.discount
                    * (1.0 - mortality[s])
                    * after_tax_return
                    * marginal_utility_consumption(cons_ahead[s], params)
                    * growth
                - bequest_motive
        })
        .collect()
}

/// Labor/leisure condition: after-tax marginal earnings valued at marginal
/// utility of consumption against the marginal disutility of hours.
#[allow(clippy::too_many_arguments)]
pub fn labor_residual(
    wage: f64,
    interest: f64,
    productivity: &[f64],
    labor: &[f64],
    assets_start: &[f64],
    assets_next: &[f64],
    bequests: f64,
    factor: f64,
    transfer: f64,
    labor_disutility: &[f64],
    params: &Params,
    benefit: f64,
    bequest_tax: f64,
    share: f64,
) -> Vec<f64> {
    let ctx = TaxRound {
        interest,
        wage,
        factor,
        transfer,
        params,
    };
    let tax_now = ctx.net_tax_path(
        assets_start,
        productivity,
        labor,
        bequests,
        share,
        false,
        benefit,
        bequest_tax,
    );
    let cons = consumption(
        interest,
        assets_start,
        wage,
        productivity,
        labor,
        bequests,
        share,
        assets_next,
        params,
        &tax_now,
    );

    (0..productivity.len())
        .map(|s| {
            let income = tax::taxable_income(
                interest,
                assets_start[s],
                wage,
                productivity[s],
                labor[s],
                factor,
            );
            let wedge = 1.0
                - params.payroll_tax
                - tax::income_tax_rate(
                    interest,
                    assets_start[s],
                    wage,
                    productivity[s],
                    labor[s],
                    factor,
                    params,
                )
                - tax::income_tax_rate_deriv(
                    interest,
                    assets_start[s],
                    wage,
                    productivity[s],
                    labor[s],
                    factor,
                    params,
                ) * income;
            marginal_utility_consumption(cons[s], params) * wage * wedge * productivity[s]
                - marginal_utility_labor(labor[s], labor_disutility[s], params)
        })
        .collect()
}
