use serde::{Deserialize, Serialize};

use super::engine::solve_steady_state;
use super::lifecycle::{LifecycleProblem, stack};
use super::numerics::{MinimizeConfig, minimize};
use super::types::{
    Aggregates, CalibrationTargets, Economy, LifecyclePath, Preferences, SolveConfig,
    SteadyState,
};
use crate::store::Store;

const SCALING: f64 = 100.0;
const CONSTRAINT_PENALTY: f64 = 1e9;
const DEGENERATE_RESIDUAL: f64 = 1e6;
const FEASIBILITY_TOLERANCE: f64 = 1e-4;

pub const WARM_START_RECORD: &str = "calibration_warm_start";

/// Best-known solution, reused to seed the next objective evaluation and
/// persisted so an interrupted search can resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmStart {
    pub paths: Vec<LifecyclePath>,
    pub aggregates: Aggregates,
}

fn percent_deviation(model: f64, data: f64) -> f64 {
    ((model - data) / data).abs()
}

/// Scores a candidate preference vector by how far the implied steady state
/// sits from the wealth and labor moment targets. Infeasible or degenerate
/// trials are scored, never rejected: the outer search just sees a terrible
/// value and routes around them.
pub struct CalibrationObjective<'a> {
    economy: &'a Economy,
    targets: &'a CalibrationTargets,
    solve_config: SolveConfig,
    store: &'a Store,
    warm: WarmStart,
}

impl<'a> CalibrationObjective<'a> {
    pub fn new(
        economy: &'a Economy,
        targets: &'a CalibrationTargets,
        solve_config: SolveConfig,
        store: &'a Store,
        warm: WarmStart,
    ) -> Result<Self, String> {
        economy.validate()?;
        let ability_types = economy.params.ability_types;
        let lifespan = economy.params.lifespan;
        if targets.wealth_young.len() != ability_types
            || targets.wealth_old.len() != ability_types
        {
            return Err("wealth targets must carry one entry per ability type".to_string());
        }
        if targets.labor.len() != lifespan {
            return Err("labor targets must carry one entry per life period".to_string());
        }
        if targets.young_end == 0
            || targets.old_end <= targets.young_end
            || targets.old_end > lifespan - 1
        {
            return Err("wealth bucket boundaries must satisfy 0 < young < old <= lifespan - 1".to_string());
        }
        if targets
            .wealth_young
            .iter()
            .chain(&targets.wealth_old)
            .chain(&targets.labor)
            .any(|v| *v == 0.0)
        {
            return Err("moment targets must be nonzero".to_string());
        }
        if warm.paths.len() != ability_types {
            return Err("warm start must carry one path per ability type".to_string());
        }
        Ok(CalibrationObjective {
            economy,
            targets,
            solve_config,
            store,
            warm,
        })
    }

    pub fn warm_start(&self) -> &WarmStart {
        &self.warm
    }

    /// Percent deviations, wealth moments first (young then old per type),
    /// then the per-period labor moments.
    fn moment_deviations(&self, state: &SteadyState) -> Vec<f64> {
        let lifespan = self.economy.params.lifespan;
        let factor = state.aggregates.factor;
        let mut output = Vec::with_capacity(
            2 * self.economy.params.ability_types + lifespan,
        );

        for ability in &self.economy.demographics.types {
            let j = ability.index;
            let assets = &state.paths[j].assets;
            let young: f64 = assets[..self.targets.young_end].iter().sum::<f64>()
                / self.targets.young_end as f64;
            let old: f64 = assets[self.targets.young_end..self.targets.old_end]
                .iter()
                .sum::<f64>()
                / (self.targets.old_end - self.targets.young_end) as f64;
            output.push(percent_deviation(young * factor, self.targets.wealth_young[j]));
            output.push(percent_deviation(old * factor, self.targets.wealth_old[j]));
        }

        for s in 0..lifespan {
            let labor: f64 = self
                .economy
                .demographics
                .types
                .iter()
                .map(|ability| ability.share * state.paths[ability.index].labor[s])
                .sum();
            output.push(percent_deviation(labor, self.targets.labor[s]));
        }
        output
    }

    pub fn evaluate(&mut self, candidate: &[f64]) -> f64 {
        let ability_types = self.economy.params.ability_types;
        let lifespan = self.economy.params.lifespan;
        if candidate.len() != ability_types + lifespan {
            return f64::INFINITY;
        }
        let preferences = Preferences {
            bequest_weight: candidate[..ability_types].to_vec(),
            labor_disutility: candidate[ability_types..].to_vec(),
        };

        let state = match solve_steady_state(
            self.economy,
            &preferences,
            &self.warm.paths,
            self.warm.aggregates,
            &self.solve_config,
        ) {
            Ok(state) => state,
            Err(_) => return f64::INFINITY,
        };

        let mut output = self.moment_deviations(&state);

        let mut worst = 0.0_f64;
        for j in 0..ability_types {
            let problem = LifecycleProblem {
                economy: self.economy,
                preferences: &preferences,
                aggregates: state.aggregates,
                ability: j,
            };
            for value in problem.residuals(&stack(&state.paths[j])) {
                if value.is_nan() {
                    worst = f64::NAN;
                    break;
                }
                worst = worst.max(value.abs());
            }
            if worst.is_nan() {
                break;
            }
        }
        let worst = if worst.is_nan() {
            DEGENERATE_RESIDUAL
        } else {
            worst
        };

        if worst > FEASIBILITY_TOLERANCE {
            for value in &mut output {
                *value += CONSTRAINT_PENALTY;
            }
        } else {
            self.warm = WarmStart {
                paths: state.paths.clone(),
                aggregates: state.aggregates,
            };
            if let Err(e) = self.store.save(WARM_START_RECORD, &self.warm) {
                eprintln!("warm start save failed: {e}");
            }
        }

        if candidate.iter().any(|v| *v <= 0.0) {
            for value in &mut output {
                *value += CONSTRAINT_PENALTY;
            }
        }

        let value: f64 = output.iter().map(|v| (SCALING * v).powi(2)).sum();
        println!("Criterion value: {value:e}");
        value
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    pub preferences: Preferences,
    pub objective: f64,
    pub evaluations: usize,
    pub converged: bool,
}

/// Search preference space for the best moment fit, seeding every trial from
/// the best-known solution so far.
pub fn calibrate(
    economy: &Economy,
    targets: &CalibrationTargets,
    initial: &Preferences,
    warm: WarmStart,
    store: &Store,
    solve_config: SolveConfig,
    search_config: &MinimizeConfig,
) -> Result<CalibrationOutcome, String> {
    let ability_types = economy.params.ability_types;
    if initial.bequest_weight.len() != ability_types
        || initial.labor_disutility.len() != economy.params.lifespan
    {
        return Err("initial preference vector shapes must match the economy".to_string());
    }
    let mut objective =
        CalibrationObjective::new(economy, targets, solve_config, store, warm)?;

    let mut guess = initial.bequest_weight.clone();
    guess.extend_from_slice(&initial.labor_disutility);

    let result = minimize(
        |candidate| objective.evaluate(candidate),
        &guess,
        search_config,
    );

    Ok(CalibrationOutcome {
        preferences: Preferences {
            bequest_weight: result.solution[..ability_types].to_vec(),
            labor_disutility: result.solution[ability_types..].to_vec(),
        },
        objective: result.value,
        evaluations: result.evaluations,
        converged: result.converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{test_params, BenefitSchedule, Demographics};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn scratch_dir(tag: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("olg-calibrate-{tag}-{}-{n}", std::process::id()))
    }

    fn small_zero_tax_economy() -> Economy {
        let mut params = test_params();
        params.ability_types = 1;
        params.lifespan = 3;
        params.retirement_period = 2;
        params.risk_aversion = 2.0;
        params.tech_growth = 0.0;
        params.income_tax_a = 0.0;
        params.income_tax_b = 0.0;
        params.wealth_tax_p = 0.0;
        params.payroll_tax = 0.0;
        let demographics = Demographics::canonical(3, 1);
        Economy {
            benefits: BenefitSchedule::zero(1),
            bequest_tax: vec![0.0],
            demographics,
            params,
        }
    }

    fn truth_preferences() -> Preferences {
        Preferences {
            bequest_weight: vec![2.0],
            labor_disutility: vec![1.0, 1.0, 1.0],
        }
    }

    fn solved_state(economy: &Economy) -> SteadyState {
        let paths = vec![LifecyclePath::flat_guess(3, economy.params.time_endowment)];
        let aggregates = Aggregates {
            interest: 0.06,
            wage: 1.2,
            transfer: 0.0,
            factor: 1.0e5,
        };
        solve_steady_state(
            economy,
            &truth_preferences(),
            &paths,
            aggregates,
            &SolveConfig {
                max_iterations: 200,
                tolerance: 1e-6,
            },
        )
        .expect("small economy solves")
    }

    fn targets_from(economy: &Economy, state: &SteadyState) -> CalibrationTargets {
        let factor = state.aggregates.factor;
        let assets = &state.paths[0].assets;
        CalibrationTargets {
            wealth_young: vec![assets[0] * factor],
            wealth_old: vec![assets[1] * factor],
            young_end: 1,
            old_end: 2,
            labor: (0..3)
                .map(|s| economy.demographics.types[0].share * state.paths[0].labor[s])
                .collect(),
        }
    }

    #[test]
    fn percent_deviation_is_absolute_and_relative() {
        assert_eq!(percent_deviation(110.0, 100.0), 0.1);
        assert_eq!(percent_deviation(90.0, 100.0), 0.1);
    }

    #[test]
    fn objective_rejects_mismatched_targets() {
        let economy = small_zero_tax_economy();
        let store = Store::open(scratch_dir("shapes")).expect("store opens");
        let warm = WarmStart {
            paths: vec![LifecyclePath::flat_guess(3, 1.0)],
            aggregates: Aggregates {
                interest: 0.06,
                wage: 1.2,
                transfer: 0.0,
                factor: 1.0e5,
            },
        };
        let bad = CalibrationTargets {
            wealth_young: vec![1.0, 2.0],
            wealth_old: vec![1.0],
            young_end: 1,
            old_end: 2,
            labor: vec![0.3; 3],
        };
        assert!(
            CalibrationObjective::new(&economy, &bad, SolveConfig::default(), &store, warm)
                .is_err()
        );
    }

    #[test]
    fn matching_targets_score_near_zero_and_persist_warm_start() {
        let economy = small_zero_tax_economy();
        let state = solved_state(&economy);
        let targets = targets_from(&economy, &state);
        let store = Store::open(scratch_dir("clean")).expect("store opens");
        let warm = WarmStart {
            paths: state.paths.clone(),
            aggregates: state.aggregates,
        };
        let mut objective = CalibrationObjective::new(
            &economy,
            &targets,
            SolveConfig {
                max_iterations: 100,
                tolerance: 1e-6,
            },
            &store,
            warm,
        )
        .expect("valid objective");

        let value = objective.evaluate(&[2.0, 1.0, 1.0, 1.0]);
        assert!(value < 1e-2, "criterion {value}");
        assert!(store.contains(WARM_START_RECORD));
    }

    #[test]
    fn non_positive_candidate_is_heavily_penalized() {
        let economy = small_zero_tax_economy();
        let state = solved_state(&economy);
        let targets = targets_from(&economy, &state);
        let store = Store::open(scratch_dir("penalty")).expect("store opens");
        let warm = WarmStart {
            paths: state.paths.clone(),
            aggregates: state.aggregates,
        };
        let mut objective = CalibrationObjective::new(
            &economy,
            &targets,
            SolveConfig {
                max_iterations: 50,
                tolerance: 1e-6,
            },
            &store,
            warm,
        )
        .expect("valid objective");

        let value = objective.evaluate(&[0.0, 1.0, 1.0, 1.0]);
        assert!(value > 1e20, "criterion {value}");
    }

    #[test]
    fn calibrate_returns_positive_preferences_on_smoke_run() {
        let economy = small_zero_tax_economy();
        let state = solved_state(&economy);
        let targets = targets_from(&economy, &state);
        let store = Store::open(scratch_dir("driver")).expect("store opens");
        let warm = WarmStart {
            paths: state.paths.clone(),
            aggregates: state.aggregates,
        };

        let outcome = calibrate(
            &economy,
            &targets,
            &truth_preferences(),
            warm,
            &store,
            SolveConfig {
                max_iterations: 100,
                tolerance: 1e-6,
            },
            &MinimizeConfig {
                max_evaluations: 30,
                tolerance: 1e-8,
                initial_step: 0.05,
            },
        )
        .expect("calibration runs");

        assert!(outcome.objective.is_finite());
        assert!(outcome.objective < 1.0, "objective {}", outcome.objective);
        assert!(outcome.preferences.bequest_weight.iter().all(|v| *v > 0.0));
        assert!(outcome.preferences.labor_disutility.iter().all(|v| *v > 0.0));
    }
}
