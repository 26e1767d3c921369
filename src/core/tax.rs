use super::types::{BenefitSchedule, Demographics, Params};

pub fn taxable_income(
    interest: f64,
    assets: f64,
    wage: f64,
    productivity: f64,
    labor: f64,
    factor: f64,
) -> f64 {
    (interest * assets + wage * productivity * labor) * factor
}

pub fn wealth_tax_rate(assets: f64, params: &Params) -> f64 {
    let h = params.wealth_tax_h;
    let p = params.wealth_tax_p;
    let m = params.wealth_tax_m;
    p * h * assets / (h * assets + m)
}

pub fn wealth_tax_rate_deriv(assets: f64, params: &Params) -> f64 {
    let h = params.wealth_tax_h;
    let p = params.wealth_tax_p;
    let m = params.wealth_tax_m;
    h * m * p / (assets * h + m).powi(2)
}

fn income_tax_rate_of(income: f64, params: &Params) -> f64 {
    let a = params.income_tax_a;
    let b = params.income_tax_b;
    let c = params.income_tax_c;
    let d = params.income_tax_d;
    let num = a * income * income + b * income;
    d * num / (num + c)
}

fn income_tax_rate_deriv_of(income: f64, params: &Params) -> f64 {
    let a = params.income_tax_a;
    let b = params.income_tax_b;
    let c = params.income_tax_c;
    let d = params.income_tax_d;
    let denom = a * income * income + b * income + c;
    d * c * (2.0 * a * income + b) / (denom * denom)
}

pub fn income_tax_rate(
    interest: f64,
    assets: f64,
    wage: f64,
    productivity: f64,
    labor: f64,
    factor: f64,
    params: &Params,
) -> f64 {
    let income = taxable_income(interest, assets, wage, productivity, labor, factor);
    income_tax_rate_of(income, params)
}

pub fn income_tax_rate_deriv(
    interest: f64,
    assets: f64,
    wage: f64,
    productivity: f64,
    labor: f64,
    factor: f64,
    params: &Params,
) -> f64 {
    let income = taxable_income(interest, assets, wage, productivity, labor, factor);
    income_tax_rate_deriv_of(income, params)
}

fn benefit_applies(period: usize, retirement_period: usize, shift: bool) -> bool {
    let threshold = if shift {
        retirement_period - 1
    } else {
        retirement_period
    };
    period >= threshold
}

/// Prices and government instruments shared by every liability evaluation in
/// one round. The same scalar formula backs the scalar, per-path, per-matrix
/// and per-panel call shapes.
#[derive(Clone, Copy)]
pub struct TaxRound<'a> {
    pub interest: f64,
    pub wage: f64,
    pub factor: f64,
    pub transfer: f64,
    pub params: &'a Params,
}

impl TaxRound<'_> {
    fn gross_tax(
        &self,
        assets: f64,
        productivity: f64,
        labor: f64,
        bequests: f64,
        share: f64,
        period: usize,
        shift: bool,
        benefit: f64,
        bequest_tax: f64,
    ) -> f64 {
        let income = self.interest * assets + self.wage * productivity * labor;
        let income_tax = income_tax_rate(
            self.interest,
            assets,
            self.wage,
            productivity,
            labor,
            self.factor,
            self.params,
        ) * income;
        let mut payroll = self.params.payroll_tax * self.wage * productivity * labor;
        if benefit_applies(period, self.params.retirement_period, shift) {
            payroll -= benefit * self.wage;
        }
        let bequest = bequest_tax * bequests / share;
        let wealth = wealth_tax_rate(assets, self.params) * assets;
        income_tax + payroll + bequest + wealth
    }

    #[allow(clippy::too_many_arguments)]
    pub fn net_tax(
        &self,
        assets: f64,
        productivity: f64,
        labor: f64,
        bequests: f64,
        share: f64,
        period: usize,
        shift: bool,
        benefit: f64,
        bequest_tax: f64,
    ) -> f64 {
        self.gross_tax(
            assets,
            productivity,
            labor,
            bequests,
            share,
            period,
            shift,
            benefit,
            bequest_tax,
        ) - self.transfer
    }

    /// One ability type's full lifecycle, start-of-period assets.
    #[allow(clippy::too_many_arguments)]
    pub fn net_tax_path(
        &self,
        assets: &[f64],
        productivity: &[f64],
        labor: &[f64],
        bequests: f64,
        share: f64,
        shift: bool,
        benefit: f64,
        bequest_tax: f64,
    ) -> Vec<f64> {
        (0..assets.len())
            .map(|s| {
                self.net_tax(
                    assets[s],
                    productivity[s],
                    labor[s],
                    bequests,
                    share,
                    s,
                    shift,
                    benefit,
                    bequest_tax,
                )
            })
            .collect()
    }

    /// All ability types at once; `assets` and `labor` hold one lifespan
    /// vector per type.
    #[allow(clippy::too_many_arguments)]
    pub fn net_tax_matrix(
        &self,
        assets: &[Vec<f64>],
        labor: &[Vec<f64>],
        bequests: &[f64],
        demographics: &Demographics,
        shift: bool,
        benefits: &BenefitSchedule,
        bequest_tax: &[f64],
    ) -> Vec<Vec<f64>> {
        demographics
            .types
            .iter()
            .map(|ability| {
                let j = ability.index;
                self.net_tax_path(
                    &assets[j],
                    &ability.productivity,
                    &labor[j],
                    bequests[j],
                    ability.share,
                    shift,
                    benefits.replacement[j],
                    bequest_tax[j],
                )
            })
            .collect()
    }
}

/// One time slice of a transition panel.
pub struct PanelRound<'a> {
    pub interest: f64,
    pub wage: f64,
    pub transfer: f64,
    pub assets: &'a [Vec<f64>],
    pub labor: &'a [Vec<f64>],
    pub bequests: &'a [f64],
}

/// Panel shape indexed (time, ability, period). Each slice reuses the same
/// scalar formula, so the retirement shift behaves identically in every
/// shape.
pub fn net_taxes_panel(
    rounds: &[PanelRound<'_>],
    factor: f64,
    demographics: &Demographics,
    shift: bool,
    params: &Params,
    benefits: &BenefitSchedule,
    bequest_tax: &[f64],
) -> Vec<Vec<Vec<f64>>> {
    rounds
        .iter()
        .map(|round| {
            let ctx = TaxRound {
                interest: round.interest,
                wage: round.wage,
                factor,
                transfer: round.transfer,
                params,
            };
            ctx.net_tax_matrix(
                round.assets,
                round.labor,
                round.bequests,
                demographics,
                shift,
                benefits,
                bequest_tax,
            )
        })
        .collect()
}

/// Government budget balance: the population-weighted sum of all gross
/// liabilities (benefit offset applied, no shift) is the lump-sum transfer.
#[allow(clippy::too_many_arguments)]
pub fn lump_sum_transfer(
    interest: f64,
    wage: f64,
    factor: f64,
    params: &Params,
    demographics: &Demographics,
    assets: &[Vec<f64>],
    labor: &[Vec<f64>],
    bequests: &[f64],
    benefits: &BenefitSchedule,
    bequest_tax: &[f64],
) -> f64 {
    let ctx = TaxRound {
        interest,
        wage,
        factor,
        transfer: 0.0,
        params,
    };
    let mut total = 0.0;
    for ability in &demographics.types {
        let j = ability.index;
        for s in 0..params.lifespan {
            total += ability.weight[s]
                * ctx.gross_tax(
                    assets[j][s],
                    ability.productivity[s],
                    labor[j][s],
                    bequests[j],
                    ability.share,
                    s,
                    false,
                    benefits.replacement[j],
                    bequest_tax[j],
                );
        }
    }
    total
}

const PIA_BRACKET_LOW: f64 = 749.0;
const PIA_BRACKET_HIGH: f64 = 4517.0;
const PIA_BASE_MID: f64 = 674.1;
const PIA_BASE_HIGH: f64 = 1879.86;
const PIA_RATE_LOW: f64 = 0.9;
const PIA_RATE_MID: f64 = 0.32;
const PIA_RATE_HIGH: f64 = 0.15;
const MAX_ANNUAL_BENEFIT: f64 = 30_000.0;

/// Three-bracket payroll benefit formula over average indexed monthly
/// earnings. Bracket boundaries and intercepts are policy constants.
pub fn primary_insurance_amount(aime: f64) -> f64 {
    if aime < PIA_BRACKET_LOW {
        PIA_RATE_LOW * aime
    } else if aime < PIA_BRACKET_HIGH {
        PIA_BASE_MID + PIA_RATE_MID * (aime - PIA_BRACKET_LOW)
    } else {
        PIA_BASE_HIGH + PIA_RATE_HIGH * (aime - PIA_BRACKET_HIGH)
    }
}

/// Replacement amount per ability type from a converged allocation, capped at
/// the maximum dollar payment converted into model wage units.
pub fn replacement_rates(
    wage: f64,
    factor: f64,
    demographics: &Demographics,
    labor: &[Vec<f64>],
    params: &Params,
) -> BenefitSchedule {
    let cap = MAX_ANNUAL_BENEFIT / (factor * wage);
    let replacement = demographics
        .types
        .iter()
        .map(|ability| {
            let j = ability.index;
            let mut indexed_earnings = 0.0;
            for s in 0..params.retirement_period {
                indexed_earnings +=
                    wage * factor * ability.productivity[s] * labor[j][s] * ability.weight[s];
            }
            let aime = indexed_earnings / 12.0;
            if aime <= 0.0 {
                return 0.0;
            }
            let mean_earnings_units = ability
                .productivity
                .iter()
                .zip(&labor[j])
                .map(|(e, n)| e * n)
                .sum::<f64>()
                / params.lifespan as f64;
            let theta = primary_insurance_amount(aime) * mean_earnings_units / aime;
            theta.min(cap)
        })
        .collect();
    BenefitSchedule { replacement }
}
