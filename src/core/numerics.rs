#[derive(Debug, Clone, Copy)]
pub struct RootFindConfig {
    pub tolerance: f64,
    pub max_iterations: usize,
    pub fd_step: f64,
}

impl Default for RootFindConfig {
    fn default() -> Self {
        RootFindConfig {
            tolerance: 1e-9,
            max_iterations: 200,
            fd_step: 1e-7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RootFindResult {
    pub solution: Vec<f64>,
    pub max_residual: f64,
    pub iterations: usize,
    pub converged: bool,
}

fn residual_norm(values: &[f64]) -> f64 {
    let mut worst = 0.0_f64;
    for v in values {
        if v.is_nan() {
            return f64::INFINITY;
        }
        worst = worst.max(v.abs());
    }
    worst
}

fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        if a[pivot][col].abs() < 1e-300 || !a[pivot][col].is_finite() {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let ratio = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= ratio * a[col][k];
            }
            b[row] -= ratio * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for col in (0..n).rev() {
        let mut sum = b[col];
        for k in col + 1..n {
            sum -= a[col][k] * x[k];
        }
        x[col] = sum / a[col][col];
        if !x[col].is_finite() {
            return None;
        }
    }
    Some(x)
}

/// Dense damped Newton iteration on `f(x) = 0`. The Jacobian is built by
/// forward differences and each step is halved until the residual max-norm
/// improves. Never fails hard: a stalled or singular step ends the search
/// and the best iterate is returned with `converged = false`.
pub fn find_root<F>(f: F, guess: &[f64], config: &RootFindConfig) -> RootFindResult
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = guess.len();
    let mut x = guess.to_vec();
    let mut fx = f(&x);
    let mut norm = residual_norm(&fx);
    let mut iterations = 0;

    while iterations < config.max_iterations && norm >= config.tolerance {
        iterations += 1;

        let mut jacobian = vec![vec![0.0; n]; n];
        for col in 0..n {
            let step = config.fd_step * (1.0 + x[col].abs());
            let mut probe = x.clone();
            probe[col] += step;
            let f_probe = f(&probe);
            for row in 0..n {
                jacobian[row][col] = (f_probe[row] - fx[row]) / step;
            }
        }

        let rhs: Vec<f64> = fx.iter().map(|v| -v).collect();
        let Some(direction) = solve_linear(jacobian, rhs) else {
            break;
        };

        let mut scale = 1.0;
        let mut accepted = false;
        while scale >= 1.0 / 64.0 {
            let candidate: Vec<f64> = x
                .iter()
                .zip(&direction)
                .map(|(xi, di)| xi + scale * di)
                .collect();
            let f_candidate = f(&candidate);
            let candidate_norm = residual_norm(&f_candidate);
            if candidate_norm < norm {
                x = candidate;
                fx = f_candidate;
                norm = candidate_norm;
                accepted = true;
                break;
            }
            scale *= 0.5;
        }
        if !accepted {
            break;
        }
    }

    RootFindResult {
        converged: norm < config.tolerance,
        max_residual: norm,
        solution: x,
        iterations,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MinimizeConfig {
    pub max_evaluations: usize,
    pub tolerance: f64,
    pub initial_step: f64,
}

impl Default for MinimizeConfig {
    fn default() -> Self {
        MinimizeConfig {
            max_evaluations: 2000,
            tolerance: 1e-10,
            initial_step: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MinimizeResult {
    pub solution: Vec<f64>,
    pub value: f64,
    pub evaluations: usize,
    pub converged: bool,
}

fn guard(value: f64) -> f64 {
    if value.is_nan() { f64::INFINITY } else { value }
}

/// Nelder-Mead simplex search. Objectives are free to return large penalty
/// values for infeasible points; the simplex simply moves away from them.
pub fn minimize<F>(mut f: F, guess: &[f64], config: &MinimizeConfig) -> MinimizeResult
where
    F: FnMut(&[f64]) -> f64,
{
    let n = guess.len();
    let mut evaluations = 0;
    let mut eval = |point: &[f64], count: &mut usize| -> f64 {
        *count += 1;
        guard(f(point))
    };

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    let value = eval(guess, &mut evaluations);
    simplex.push((guess.to_vec(), value));
    for i in 0..n {
        let mut vertex = guess.to_vec();
        vertex[i] += config.initial_step * (1.0 + vertex[i].abs());
        let value = eval(&vertex, &mut evaluations);
        simplex.push((vertex, value));
    }

    while evaluations < config.max_evaluations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let spread = simplex[n].1 - simplex[0].1;
        if spread.abs() < config.tolerance {
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|i| simplex[..n].iter().map(|(v, _)| v[i]).sum::<f64>() / n as f64)
            .collect();
        let worst = simplex[n].clone();

        let reflect: Vec<f64> = (0..n)
            .map(|i| centroid[i] + (centroid[i] - worst.0[i]))
            .collect();
        let reflect_value = eval(&reflect, &mut evaluations);

        if reflect_value < simplex[0].1 {
            let expand: Vec<f64> = (0..n)
                .map(|i| centroid[i] + 2.0 * (centroid[i] - worst.0[i]))
                .collect();
            let expand_value = eval(&expand, &mut evaluations);
            simplex[n] = if expand_value < reflect_value {
                (expand, expand_value)
            } else {
                (reflect, reflect_value)
            };
            continue;
        }

        if reflect_value < simplex[n - 1].1 {
            simplex[n] = (reflect, reflect_value);
            continue;
        }

        let contract: Vec<f64> = (0..n)
            .map(|i| centroid[i] + 0.5 * (worst.0[i] - centroid[i]))
            .collect();
        let contract_value = eval(&contract, &mut evaluations);
        if contract_value < worst.1 {
            simplex[n] = (contract, contract_value);
            continue;
        }

        let best = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk: Vec<f64> = (0..n)
                .map(|i| best[i] + 0.5 * (vertex.0[i] - best[i]))
                .collect();
            let shrunk_value = eval(&shrunk, &mut evaluations);
            *vertex = (shrunk, shrunk_value);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let spread = simplex[simplex.len() - 1].1 - simplex[0].1;
    let (solution, value) = simplex.swap_remove(0);
    MinimizeResult {
        converged: spread.abs() < config.tolerance,
        solution,
        value,
        evaluations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn newton_solves_symmetric_nonlinear_system() {
        let f = |x: &[f64]| vec![x[0] + x[1] - 3.0, x[0] * x[1] - 2.0];
        let result = find_root(f, &[0.5, 2.5], &RootFindConfig::default());
        assert!(result.converged, "residual {}", result.max_residual);
        assert_close(result.solution[0] + result.solution[1], 3.0, 1e-8);
        assert_close(result.solution[0] * result.solution[1], 2.0, 1e-8);
    }

    #[test]
    fn newton_recovers_closed_form_three_period_savings_plan() {
        // Quadratic felicity with bliss point 5, zero interest, unit
        // endowment income in the two working periods: consumption is
        // perfectly smoothed and the estate is exhausted.
        let f = |b: &[f64]| {
            let c0 = 1.0 - b[0];
            let c1 = b[0] + 1.0 - b[1];
            let c2 = b[1] - b[2];
            vec![(5.0 - c0) - (5.0 - c1), (5.0 - c1) - (5.0 - c2), b[2]]
        };
        let result = find_root(f, &[0.1, 0.1, 0.1], &RootFindConfig::default());
        assert!(result.converged);
        assert_close(result.solution[0], 1.0 / 3.0, 1e-8);
        assert_close(result.solution[1], 2.0 / 3.0, 1e-8);
        assert_close(result.solution[2], 0.0, 1e-8);
    }

    #[test]
    fn newton_reports_failure_when_no_root_exists() {
        let f = |x: &[f64]| vec![x[0] * x[0] + 1.0];
        let result = find_root(f, &[1.0], &RootFindConfig::default());
        assert!(!result.converged);
        assert!(result.max_residual >= 1.0 - 1e-12);
    }

    #[test]
    fn newton_treats_nan_residuals_as_worse_than_any_step() {
        // Left of zero the residual is NaN; the damped step must stay in the
        // valid region and still converge to x = 4.
        let f = |x: &[f64]| vec![x[0].sqrt() - 2.0];
        let result = find_root(f, &[1.0], &RootFindConfig::default());
        assert!(result.converged);
        assert_close(result.solution[0], 4.0, 1e-6);
    }

    #[test]
    fn nelder_mead_minimizes_shifted_quadratic() {
        let f = |x: &[f64]| (x[0] - 1.5).powi(2) + (x[1] + 0.5).powi(2) + 2.0;
        let result = minimize(f, &[0.0, 0.0], &MinimizeConfig::default());
        assert!(result.converged);
        assert_close(result.solution[0], 1.5, 1e-3);
        assert_close(result.solution[1], -0.5, 1e-3);
        assert_close(result.value, 2.0, 1e-6);
    }

    #[test]
    fn nelder_mead_routes_around_penalty_region() {
        let f = |x: &[f64]| {
            if x[0] <= 0.0 {
                1e9
            } else {
                (x[0] - 2.0).powi(2)
            }
        };
        let result = minimize(f, &[0.5], &MinimizeConfig::default());
        assert_close(result.solution[0], 2.0, 1e-3);
    }

    #[test]
    fn nelder_mead_respects_evaluation_budget() {
        let mut calls = 0_usize;
        let f = |x: &[f64]| {
            (x[0] - 3.0).powi(2) + (x[1] - 1.0).powi(2)
        };
        let config = MinimizeConfig {
            max_evaluations: 25,
            ..MinimizeConfig::default()
        };
        let counted = |x: &[f64]| {
            calls += 1;
            f(x)
        };
        let result = minimize(counted, &[0.0, 0.0], &config);
        // One round may finish in flight after the budget check.
        assert!(calls <= 25 + 8, "ran {calls} evaluations");
        assert!(result.evaluations <= 25 + 8);
    }
}
