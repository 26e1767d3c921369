mod calibrate;
mod engine;
mod firm;
mod household;
mod lifecycle;
mod numerics;
mod tax;
mod types;

pub use calibrate::{
    CalibrationObjective, CalibrationOutcome, WARM_START_RECORD, WarmStart, calibrate,
};
pub use engine::solve_steady_state;
pub use firm::{aggregate_capital, aggregate_labor, interest_rate, output, wage};
pub use household::{
    consumption, labor_residual, marginal_utility_consumption, marginal_utility_labor,
    savings_residual,
};
pub use lifecycle::{INFEASIBLE_PENALTY, LifecycleProblem, stack};
pub use numerics::{
    MinimizeConfig, MinimizeResult, RootFindConfig, RootFindResult, find_root, minimize,
};
pub use tax::{
    PanelRound, TaxRound, income_tax_rate, income_tax_rate_deriv, lump_sum_transfer,
    net_taxes_panel, primary_insurance_amount, replacement_rates, taxable_income,
    wealth_tax_rate, wealth_tax_rate_deriv,
};
pub use types::{
    AbilityType, Aggregates, BenefitSchedule, CalibrationTargets, Demographics, Economy,
    LifecyclePath, Params, Preferences, SolveConfig, SteadyState,
};
