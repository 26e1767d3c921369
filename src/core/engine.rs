use super::firm;
use super::lifecycle::{LifecycleProblem, stack};
use super::numerics::RootFindConfig;
use super::tax;
use super::types::{
    Aggregates, Economy, LifecyclePath, Preferences, SolveConfig, SteadyState,
};

/// Inner solves are seeded at a shrunken copy of the previous round's
/// solution rather than the solution itself.
const SEED_DAMPING: f64 = 0.9;

fn damped(new: f64, old: f64, weight: f64) -> f64 {
    weight * new + (1.0 - weight) * old
}

fn bequest_flows(
    interest: f64,
    assets: &[Vec<f64>],
    economy: &Economy,
) -> Vec<f64> {
    economy
        .demographics
        .types
        .iter()
        .map(|ability| {
            let j = ability.index;
            (1.0 + interest)
                * (0..economy.params.lifespan)
                    .map(|s| {
                        assets[j][s] * ability.weight[s] * economy.demographics.mortality[s]
                    })
                    .sum::<f64>()
        })
        .collect()
}

fn check_shapes(
    economy: &Economy,
    preferences: &Preferences,
    paths: &[LifecyclePath],
) -> Result<(), String> {
    let params = &economy.params;
    if preferences.bequest_weight.len() != params.ability_types {
        return Err("bequest weight vector length must equal ability_types".to_string());
    }
    if preferences.labor_disutility.len() != params.lifespan {
        return Err("labor disutility vector length must equal the lifespan".to_string());
    }
    if paths.len() != params.ability_types {
        return Err("one initial lifecycle path per ability type is required".to_string());
    }
    for path in paths {
        if path.assets.len() != params.lifespan || path.labor.len() != params.lifespan {
            return Err("initial lifecycle paths must have lifespan length".to_string());
        }
    }
    Ok(())
}

/// Damped fixed-point iteration over prices and the lump-sum transfer.
/// Each round re-solves every ability type's lifecycle against the frozen
/// aggregate state, re-aggregates, and blends the new aggregates in with the
/// relaxation weight. The weight is halved (never restored) when the
/// distance stops shrinking late in the run. Hitting the iteration cap is
/// not an error: the last iterate is returned and the caller judges it by
/// the reported residual.
pub fn solve_steady_state(
    economy: &Economy,
    preferences: &Preferences,
    initial_paths: &[LifecyclePath],
    initial_aggregates: Aggregates,
    config: &SolveConfig,
) -> Result<SteadyState, String> {
    economy.validate()?;
    check_shapes(economy, preferences, initial_paths)?;

    let params = &economy.params;
    let demographics = &economy.demographics;
    let mut relaxation = params.relaxation;
    let mut aggregates = initial_aggregates;
    let mut paths = initial_paths.to_vec();

    let root_config = RootFindConfig::default();
    let mut distance = f64::INFINITY;
    let mut history: Vec<f64> = Vec::with_capacity(config.max_iterations);
    let mut iteration = 0;

    while distance > config.tolerance && iteration < config.max_iterations {
        for j in 0..params.ability_types {
            let problem = LifecycleProblem {
                economy,
                preferences,
                aggregates,
                ability: j,
            };
            let seed: Vec<f64> = stack(&paths[j]).iter().map(|v| v * SEED_DAMPING).collect();
            let (path, _) = problem.solve(&seed, &root_config);
            paths[j] = path;
        }

        let assets: Vec<Vec<f64>> = paths.iter().map(|p| p.assets.clone()).collect();
        let labor: Vec<Vec<f64>> = paths.iter().map(|p| p.labor.clone()).collect();
        let assets_start: Vec<Vec<f64>> = paths.iter().map(|p| p.assets_at_start()).collect();

        let capital = firm::aggregate_capital(&assets, demographics);
        let labor_supply = firm::aggregate_labor(&labor, demographics);
        let output = firm::output(capital, labor_supply, params);
        let new_interest = firm::interest_rate(output, capital, params);
        let new_wage = firm::wage(output, labor_supply, params);

        let mut average_income = 0.0;
        for ability in &demographics.types {
            let j = ability.index;
            for s in 0..params.lifespan {
                average_income += ability.weight[s]
                    * (new_interest * assets_start[j][s]
                        + new_wage * ability.productivity[s] * labor[j][s]);
            }
        }
        let new_factor = params.mean_income_target / average_income;

        let bequests = bequest_flows(new_interest, &assets, economy);
        let new_transfer = tax::lump_sum_transfer(
            new_interest,
            new_wage,
            aggregates.factor,
            params,
            demographics,
            &assets_start,
            &labor,
            &bequests,
            &economy.benefits,
            &economy.bequest_tax,
        );

        aggregates.interest = damped(new_interest, aggregates.interest, relaxation);
        aggregates.wage = damped(new_wage, aggregates.wage, relaxation);
        aggregates.factor = damped(new_factor, aggregates.factor, relaxation);
        aggregates.transfer = damped(new_transfer, aggregates.transfer, relaxation);

        distance = (aggregates.interest - new_interest)
            .abs()
            .max((aggregates.wage - new_wage).abs())
            .max((aggregates.transfer - new_transfer).abs());
        history.push(distance);
        let round = history.len() - 1;
        if round > 10 && history[round] > history[round - 1] {
            relaxation /= 2.0;
            println!("Distance rose; relaxation weight halved to {relaxation}");
        }

        iteration += 1;
        println!("Iteration: {iteration:02}  Distance: {distance:e}");
    }

    // One tighter pass per type at the settled prices; its residual is the
    // quality diagnostic reported to callers.
    let diagnostic_config = RootFindConfig {
        tolerance: 1e-13,
        max_iterations: 400,
        ..RootFindConfig::default()
    };
    let mut max_residual = 0.0_f64;
    for j in 0..params.ability_types {
        let problem = LifecycleProblem {
            economy,
            preferences,
            aggregates,
            ability: j,
        };
        let seed: Vec<f64> = stack(&paths[j]).iter().map(|v| v * SEED_DAMPING).collect();
        let (path, result) = problem.solve(&seed, &diagnostic_config);
        max_residual = max_residual.max(result.max_residual);
        paths[j] = path;
    }
    println!("Steady-state lifecycle residual: {max_residual:e}");

    Ok(SteadyState {
        paths,
        aggregates,
        iterations: iteration,
        converged: distance <= config.tolerance,
        distance,
        max_residual,
    })
}
