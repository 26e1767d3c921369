use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    pub ability_types: usize,
    pub lifespan: usize,
    pub transition_periods: usize,
    pub discount: f64,
    pub risk_aversion: f64,
    pub capital_share: f64,
    pub relaxation: f64,
    pub total_factor_productivity: f64,
    pub depreciation: f64,
    pub time_endowment: f64,
    pub tech_growth: f64,
    pub payroll_tax: f64,
    pub retirement_period: usize,
    pub mean_income_target: f64,
    pub income_tax_a: f64,
    pub income_tax_b: f64,
    pub income_tax_c: f64,
    pub income_tax_d: f64,
    pub wealth_tax_h: f64,
    pub wealth_tax_p: f64,
    pub wealth_tax_m: f64,
    pub ellipse_b: f64,
    pub ellipse_upsilon: f64,
}

impl Params {
    pub fn validate(&self) -> Result<(), String> {
        if self.ability_types == 0 {
            return Err("ability_types must be > 0".to_string());
        }
        if self.lifespan < 2 {
            return Err("lifespan must be >= 2".to_string());
        }
        if self.retirement_period == 0 || self.retirement_period >= self.lifespan {
            return Err("retirement_period must lie strictly inside the lifespan".to_string());
        }
        if self.income_tax_c <= 0.0 {
            return Err("income tax constant c must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.relaxation) || self.relaxation == 0.0 {
            return Err("relaxation must be in (0, 1]".to_string());
        }
        if self.time_endowment <= 0.0 {
            return Err("time_endowment must be > 0".to_string());
        }
        if self.mean_income_target <= 0.0 {
            return Err("mean_income_target must be > 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityType {
    pub index: usize,
    /// Age-productivity profile, one entry per life period.
    pub productivity: Vec<f64>,
    /// Population mass at each life period; entries sum to `share`.
    pub weight: Vec<f64>,
    pub share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demographics {
    pub types: Vec<AbilityType>,
    /// Probability of dying at the end of each life period; 1.0 in the last.
    pub mortality: Vec<f64>,
}

impl Demographics {
    pub fn validate(&self, params: &Params) -> Result<(), String> {
        if self.types.is_empty() {
            return Err("demographics must contain at least one ability type".to_string());
        }
        if self.types.len() != params.ability_types {
            return Err(format!(
                "demographics carry {} ability types, params expect {}",
                self.types.len(),
                params.ability_types
            ));
        }
        if self.mortality.len() != params.lifespan {
            return Err("mortality vector length must equal the lifespan".to_string());
        }
        for ability in &self.types {
            if ability.productivity.len() != params.lifespan
                || ability.weight.len() != params.lifespan
            {
                return Err(format!(
                    "ability type {} profiles must have lifespan length",
                    ability.index
                ));
            }
        }
        Ok(())
    }

    /// Built-in parameterization so the binary runs without external data:
    /// hump-shaped age productivity scaled per type, uniform population
    /// weights summing to one, and a mortality ramp ending in certain death.
    pub fn canonical(lifespan: usize, ability_types: usize) -> Self {
        let share = 1.0 / ability_types as f64;
        let age_span = (lifespan.max(2) - 1) as f64;
        let types = (0..ability_types)
            .map(|j| {
                let level = 0.5 * 1.35_f64.powi(j as i32);
                let productivity = (0..lifespan)
                    .map(|s| {
                        let x = s as f64 / age_span;
                        level * (0.6 + 1.4 * x - 1.2 * x * x)
                    })
                    .collect();
                let weight = vec![share / lifespan as f64; lifespan];
                AbilityType {
                    index: j,
                    productivity,
                    weight,
                    share,
                }
            })
            .collect();

        let mortality = (0..lifespan)
            .map(|s| {
                if s + 1 == lifespan {
                    1.0
                } else {
                    let x = s as f64 / age_span;
                    0.005 + 0.25 * x.powi(4)
                }
            })
            .collect();

        Demographics { types, mortality }
    }
}

/// One ability type's lifecycle decisions. `assets[s]` is the holding carried
/// out of period `s` (the last entry is the estate left at death); `labor[s]`
/// is hours worked in period `s`. Agents are born with nothing, so the
/// start-of-period sequence is derived with a leading zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecyclePath {
    pub assets: Vec<f64>,
    pub labor: Vec<f64>,
}

impl LifecyclePath {
    pub fn flat_guess(lifespan: usize, time_endowment: f64) -> Self {
        LifecyclePath {
            assets: vec![0.01; lifespan],
            labor: vec![0.5 * time_endowment; lifespan],
        }
    }

    pub fn assets_at_start(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.assets.len());
        out.push(0.0);
        out.extend_from_slice(&self.assets[..self.assets.len() - 1]);
        out
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Aggregates {
    pub interest: f64,
    pub wage: f64,
    pub transfer: f64,
    pub factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenefitSchedule {
    /// Payroll replacement amount per ability type, in model wage units.
    pub replacement: Vec<f64>,
}

impl BenefitSchedule {
    pub fn zero(ability_types: usize) -> Self {
        BenefitSchedule {
            replacement: vec![0.0; ability_types],
        }
    }
}

/// Everything the steady-state iteration needs besides preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Economy {
    pub params: Params,
    pub demographics: Demographics,
    pub benefits: BenefitSchedule,
    pub bequest_tax: Vec<f64>,
}

impl Economy {
    pub fn validate(&self) -> Result<(), String> {
        self.params.validate()?;
        self.demographics.validate(&self.params)?;
        if self.benefits.replacement.len() != self.params.ability_types {
            return Err("benefit schedule length must equal ability_types".to_string());
        }
        if self.bequest_tax.len() != self.params.ability_types {
            return Err("bequest tax vector length must equal ability_types".to_string());
        }
        Ok(())
    }
}

/// Preference parameters searched over during calibration: a bequest weight
/// per ability type and a labor-disutility weight per life period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    pub bequest_weight: Vec<f64>,
    pub labor_disutility: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteadyState {
    pub paths: Vec<LifecyclePath>,
    pub aggregates: Aggregates,
    pub iterations: usize,
    pub converged: bool,
    pub distance: f64,
    pub max_residual: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SolveConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for SolveConfig {
    fn default() -> Self {
        SolveConfig {
            max_iterations: 250,
            tolerance: 1e-9,
        }
    }
}

/// Moment data the calibration objective scores against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationTargets {
    /// Mean wealth (data units) for the younger bucket, per ability type.
    pub wealth_young: Vec<f64>,
    /// Mean wealth (data units) for the older bucket, per ability type.
    pub wealth_old: Vec<f64>,
    /// Model periods `[0, young_end)` form the younger bucket.
    pub young_end: usize,
    /// Model periods `[young_end, old_end)` form the older bucket.
    pub old_end: usize,
    /// Aggregate labor supply by period.
    pub labor: Vec<f64>,
}

#[cfg(test)]
pub(crate) fn test_params() -> Params {
    Params {
        ability_types: 2,
        lifespan: 10,
        transition_periods: 40,
        discount: 0.96,
        risk_aversion: 3.0,
        capital_share: 0.35,
        relaxation: 0.4,
        total_factor_productivity: 1.0,
        depreciation: 0.05,
        time_endowment: 1.0,
        tech_growth: 0.03,
        payroll_tax: 0.15,
        retirement_period: 7,
        mean_income_target: 84_580.67,
        income_tax_a: 3.03452711316e-06,
        income_tax_b: 0.222,
        income_tax_c: 133_261.0,
        income_tax_d: 0.219,
        wealth_tax_h: 0.1,
        wealth_tax_p: 0.096,
        wealth_tax_m: 1.0,
        ellipse_b: 25.6594,
        ellipse_upsilon: 3.0542,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_base_params() {
        assert!(test_params().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_tax_denominator() {
        let mut params = test_params();
        params.income_tax_c = 0.0;
        let err = params.validate().expect_err("must reject c == 0");
        assert!(err.contains("income tax constant"));
    }

    #[test]
    fn validate_rejects_retirement_outside_lifespan() {
        let mut params = test_params();
        params.retirement_period = 10;
        assert!(params.validate().is_err());
        params.retirement_period = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_ability_set() {
        let mut params = test_params();
        params.ability_types = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn canonical_demographics_weights_sum_to_one() {
        let demo = Demographics::canonical(10, 3);
        let total: f64 = demo.types.iter().flat_map(|t| t.weight.iter()).sum();
        assert!((total - 1.0).abs() < 1e-12, "weights sum to {total}");
        assert_eq!(demo.mortality.len(), 10);
        assert_eq!(demo.mortality[9], 1.0);
    }

    #[test]
    fn canonical_demographics_validate_against_params() {
        let mut params = test_params();
        params.ability_types = 3;
        let demo = Demographics::canonical(params.lifespan, params.ability_types);
        assert!(demo.validate(&params).is_ok());
    }

    #[test]
    fn assets_at_start_shifts_and_zeroes_birth() {
        let path = LifecyclePath {
            assets: vec![1.0, 2.0, 3.0],
            labor: vec![0.5; 3],
        };
        assert_eq!(path.assets_at_start(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn economy_validate_checks_vector_lengths() {
        let params = test_params();
        let demographics = Demographics::canonical(params.lifespan, params.ability_types);
        let mut economy = Economy {
            benefits: BenefitSchedule::zero(params.ability_types),
            bequest_tax: vec![0.0; params.ability_types],
            params,
            demographics,
        };
        assert!(economy.validate().is_ok());
        economy.bequest_tax.pop();
        assert!(economy.validate().is_err());
    }
}
