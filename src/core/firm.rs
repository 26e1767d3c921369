use super::types::{Demographics, Params};

/// Population-weighted holdings; the weights embed cohort survival.
pub fn aggregate_capital(assets: &[Vec<f64>], demographics: &Demographics) -> f64 {
    demographics
        .types
        .iter()
        .map(|ability| {
            let j = ability.index;
            ability
                .weight
                .iter()
                .zip(&assets[j])
                .map(|(w, b)| w * b)
                .sum::<f64>()
        })
        .sum()
}

pub fn aggregate_labor(labor: &[Vec<f64>], demographics: &Demographics) -> f64 {
    demographics
        .types
        .iter()
        .map(|ability| {
            let j = ability.index;
            (0..ability.productivity.len())
                .map(|s| ability.productivity[s] * labor[j][s] * ability.weight[s])
                .sum::<f64>()
        })
        .sum()
}

pub fn output(capital: f64, labor: f64, params: &Params) -> f64 {
    params.total_factor_productivity
        * capital.powf(params.capital_share)
        * labor.powf(1.0 - params.capital_share)
}

pub fn interest_rate(output: f64, capital: f64, params: &Params) -> f64 {
    params.capital_share * output / capital - params.depreciation
}

pub fn wage(output: f64, labor: f64, params: &Params) -> f64 {
    (1.0 - params.capital_share) * output / labor
}
