use super::household;
use super::numerics::{RootFindConfig, RootFindResult, find_root};
use super::tax::TaxRound;
use super::types::{Aggregates, Economy, LifecyclePath, Preferences};

/// Added to a residual entry whenever the candidate violates a feasibility
/// constraint; the root finder sees a hopeless residual there and searches
/// elsewhere.
pub const INFEASIBLE_PENALTY: f64 = 1e9;

/// One ability type's lifecycle optimality system, posed as a 2S-dimensional
/// root-finding problem over stacked savings and hours.
pub struct LifecycleProblem<'a> {
    pub economy: &'a Economy,
    pub preferences: &'a Preferences,
    pub aggregates: Aggregates,
    pub ability: usize,
}

impl LifecycleProblem<'_> {
    pub fn residuals(&self, candidate: &[f64]) -> Vec<f64> {
        let params = &self.economy.params;
        let lifespan = params.lifespan;
        let ability = &self.economy.demographics.types[self.ability];
        let mortality = &self.economy.demographics.mortality;
        let benefit = self.economy.benefits.replacement[self.ability];
        let bequest_tax = self.economy.bequest_tax[self.ability];

        let assets_next = &candidate[..lifespan];
        let labor = &candidate[lifespan..];

        let mut assets_start = Vec::with_capacity(lifespan);
        assets_start.push(0.0);
        assets_start.extend_from_slice(&assets_next[..lifespan - 1]);
        let mut assets_next2: Vec<f64> = assets_next[1..].to_vec();
        assets_next2.push(0.0);

        let bequests = (1.0 + self.aggregates.interest)
            * (0..lifespan)
                .map(|s| assets_next[s] * ability.weight[s] * mortality[s])
                .sum::<f64>();

        let mut savings = household::savings_residual(
            self.aggregates.wage,
            self.aggregates.interest,
            &ability.productivity,
            labor,
            &assets_start,
            assets_next,
            &assets_next2,
            bequests,
            self.aggregates.factor,
            self.aggregates.transfer,
            self.preferences.bequest_weight[self.ability],
            params,
            benefit,
            bequest_tax,
            mortality,
            ability.share,
        );
        let mut hours = household::labor_residual(
            self.aggregates.wage,
            self.aggregates.interest,
            &ability.productivity,
            labor,
            &assets_start,
            assets_next,
            bequests,
            self.aggregates.factor,
            self.aggregates.transfer,
            &self.preferences.labor_disutility,
            params,
            benefit,
            bequest_tax,
            ability.share,
        );

        for s in 0..lifespan {
            if labor[s] < 0.0 {
                hours[s] += INFEASIBLE_PENALTY;
            }
            if labor[s] > params.time_endowment {
                hours[s] += INFEASIBLE_PENALTY;
            }
            if assets_next[s] <= 0.0 {
                savings[s] += INFEASIBLE_PENALTY;
            }
        }

        let ctx = TaxRound {
            interest: self.aggregates.interest,
            wage: self.aggregates.wage,
            factor: self.aggregates.factor,
            transfer: self.aggregates.transfer,
            params,
        };
        let net_tax = ctx.net_tax_path(
            &assets_start,
            &ability.productivity,
            labor,
            bequests,
            ability.share,
            false,
            benefit,
            bequest_tax,
        );
        let consumption = household::consumption(
            self.aggregates.interest,
            &assets_start,
            self.aggregates.wage,
            &ability.productivity,
            labor,
            bequests,
            ability.share,
            assets_next,
            params,
            &net_tax,
        );
        for s in 0..lifespan {
            if consumption[s] < 0.0 {
                savings[s] += INFEASIBLE_PENALTY;
            }
        }

        savings.extend(hours);
        savings
    }

    /// Run the root finder from the given stacked guess and split the result
    /// back into a path.
    pub fn solve(&self, guess: &[f64], config: &RootFindConfig) -> (LifecyclePath, RootFindResult) {
        let lifespan = self.economy.params.lifespan;
        let result = find_root(|candidate| self.residuals(candidate), guess, config);
        let path = LifecyclePath {
            assets: result.solution[..lifespan].to_vec(),
            labor: result.solution[lifespan..].to_vec(),
        };
        (path, result)
    }
}

pub fn stack(path: &LifecyclePath) -> Vec<f64> {
    let mut out = path.assets.clone();
    out.extend_from_slice(&path.labor);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{
        test_params, BenefitSchedule, Demographics, Economy, Params, Preferences,
    };

    fn zero_tax_economy(lifespan: usize) -> Economy {
        let mut params = test_params();
        params.ability_types = 1;
        params.lifespan = lifespan;
        params.retirement_period = lifespan - 1;
        params.risk_aversion = 2.0;
        params.tech_growth = 0.0;
        params.income_tax_a = 0.0;
        params.income_tax_b = 0.0;
        params.wealth_tax_p = 0.0;
        params.payroll_tax = 0.0;
        let demographics = Demographics::canonical(lifespan, 1);
        Economy {
            benefits: BenefitSchedule::zero(1),
            bequest_tax: vec![0.0],
            demographics,
            params,
        }
    }

    fn flat_preferences(params: &Params) -> Preferences {
        Preferences {
            bequest_weight: vec![2.0; params.ability_types],
            labor_disutility: vec![1.0; params.lifespan],
        }
    }

    fn test_aggregates() -> Aggregates {
        Aggregates {
            interest: 0.05,
            wage: 1.2,
            transfer: 0.0,
            factor: 1.0,
        }
    }

    #[test]
    fn residual_vector_stacks_savings_then_hours() {
        let economy = zero_tax_economy(3);
        let preferences = flat_preferences(&economy.params);
        let problem = LifecycleProblem {
            economy: &economy,
            preferences: &preferences,
            aggregates: test_aggregates(),
            ability: 0,
        };
        let candidate = vec![0.05, 0.08, 0.04, 0.3, 0.3, 0.2];
        let residuals = problem.residuals(&candidate);
        assert_eq!(residuals.len(), 6);

        // Rebuild the savings block directly from the oracle to confirm the
        // assembler's asset ladders and bequest aggregation.
        let ability = &economy.demographics.types[0];
        let bequests = 1.05
            * (0.05 * ability.weight[0] * economy.demographics.mortality[0]
                + 0.08 * ability.weight[1] * economy.demographics.mortality[1]
                + 0.04 * ability.weight[2] * economy.demographics.mortality[2]);
        let direct = household::savings_residual(
            1.2,
            0.05,
            &ability.productivity,
            &candidate[3..],
            &[0.0, 0.05, 0.08],
            &candidate[..3],
            &[0.08, 0.04, 0.0],
            bequests,
            1.0,
            0.0,
            preferences.bequest_weight[0],
            &economy.params,
            0.0,
            0.0,
            &economy.demographics.mortality,
            ability.share,
        );
        for s in 0..3 {
            assert!((residuals[s] - direct[s]).abs() < 1e-12);
        }
    }

    #[test]
    fn out_of_range_hours_are_penalized() {
        let economy = zero_tax_economy(3);
        let preferences = flat_preferences(&economy.params);
        let problem = LifecycleProblem {
            economy: &economy,
            preferences: &preferences,
            aggregates: test_aggregates(),
            ability: 0,
        };
        let negative_hours = problem.residuals(&[0.05, 0.08, 0.04, -0.1, 0.3, 0.2]);
        assert!(negative_hours[3] > 1e8);
        let excessive_hours = problem.residuals(&[0.05, 0.08, 0.04, 0.3, 1.5, 0.2]);
        assert!(excessive_hours[4] > 1e8);
    }

    #[test]
    fn non_positive_assets_are_penalized() {
        let economy = zero_tax_economy(3);
        let preferences = flat_preferences(&economy.params);
        let problem = LifecycleProblem {
            economy: &economy,
            preferences: &preferences,
            aggregates: test_aggregates(),
            ability: 0,
        };
        let residuals = problem.residuals(&[0.05, 0.0, 0.04, 0.3, 0.3, 0.2]);
        assert!(residuals[1] > 1e8);
    }

    #[test]
    fn negative_consumption_is_penalized() {
        let economy = zero_tax_economy(3);
        let preferences = flat_preferences(&economy.params);
        let problem = LifecycleProblem {
            economy: &economy,
            preferences: &preferences,
            aggregates: test_aggregates(),
            ability: 0,
        };
        // Saving 5.0 out of first-period earnings of ~0.4 is unaffordable.
        let residuals = problem.residuals(&[5.0, 0.08, 0.04, 0.3, 0.3, 0.2]);
        assert!(residuals[0] > 1e8);
    }

    #[test]
    fn solve_converges_on_small_zero_tax_lifecycle() {
        let economy = zero_tax_economy(3);
        let preferences = flat_preferences(&economy.params);
        let problem = LifecycleProblem {
            economy: &economy,
            preferences: &preferences,
            aggregates: test_aggregates(),
            ability: 0,
        };
        let guess = vec![0.05, 0.05, 0.05, 0.3, 0.3, 0.3];
        let config = RootFindConfig {
            tolerance: 1e-9,
            max_iterations: 400,
            fd_step: 1e-7,
        };
        let (path, result) = problem.solve(&guess, &config);
        assert!(result.converged, "residual {}", result.max_residual);
        for s in 0..3 {
            assert!(path.assets[s] > 0.0, "assets {:?}", path.assets);
            assert!(
                (0.0..=economy.params.time_endowment).contains(&path.labor[s]),
                "labor {:?}",
                path.labor
            );
        }
        // At the root the stacked residuals are all near zero.
        let check = problem.residuals(&stack(&path));
        assert!(check.iter().all(|v| v.abs() < 1e-7));
    }
}
