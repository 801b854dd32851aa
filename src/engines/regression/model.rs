use super::solver::{least_squares, Bounds, Solution, SolverOptions};
use crate::error::{CalibrationError, Result};
use crate::types::{DisaggregatedUsage, WeatherJoinedBillRow};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

pub const MIN_BALANCE_POINT_F: f64 = 40.0;
pub const MAX_BALANCE_POINT_F: f64 = 90.0;
const ASSUMED_BALANCE_POINT_F: f64 = 65.0;

/// Piecewise-linear temperature-response shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegressionVariant {
    /// `b1 + b2 * max(x - b3, 0)`
    ThreeParamCooling,
    /// `b1 + b2 * min(x - b3, 0)`
    ThreeParamHeating,
    /// `b1 + b2 * min(x - b4, 0) + b3 * max(x - b5, 0)`
    FiveParam,
}

impl RegressionVariant {
    pub fn all() -> [Self; 3] {
        [Self::ThreeParamCooling, Self::ThreeParamHeating, Self::FiveParam]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ThreeParamCooling => "3-parameter Cooling",
            Self::ThreeParamHeating => "3-parameter Heating",
            Self::FiveParam => "5-parameter",
        }
    }

    pub fn n_parameters(&self) -> usize {
        match self {
            Self::ThreeParamCooling | Self::ThreeParamHeating => 3,
            Self::FiveParam => 5,
        }
    }

    pub fn bounds(&self) -> Bounds {
        let inf = f64::INFINITY;
        match self {
            Self::ThreeParamCooling => Bounds {
                lower: vec![0.0, 0.0, MIN_BALANCE_POINT_F],
                upper: vec![inf, inf, MAX_BALANCE_POINT_F],
            },
            Self::ThreeParamHeating => Bounds {
                lower: vec![0.0, -inf, MIN_BALANCE_POINT_F],
                upper: vec![inf, 0.0, MAX_BALANCE_POINT_F],
            },
            Self::FiveParam => Bounds {
                lower: vec![0.0, -inf, 0.0, MIN_BALANCE_POINT_F, MIN_BALANCE_POINT_F],
                upper: vec![inf, 0.0, inf, MAX_BALANCE_POINT_F, MAX_BALANCE_POINT_F],
            },
        }
    }

    /// Split the modelled daily use at temperature `x` into its components.
    ///
    /// The components always add up to [`Self::func`] because `func` is defined as their sum.
    pub fn evaluate(&self, p: &[f64], x: f64) -> DisaggregatedUsage {
        match self {
            Self::ThreeParamCooling => DisaggregatedUsage {
                baseload: p[0],
                heating: 0.0,
                cooling: p[1] * (x - p[2]).max(0.0),
            },
            Self::ThreeParamHeating => DisaggregatedUsage {
                baseload: p[0],
                heating: p[1] * (x - p[2]).min(0.0),
                cooling: 0.0,
            },
            Self::FiveParam => DisaggregatedUsage {
                baseload: p[0],
                heating: p[1] * (x - p[3]).min(0.0),
                cooling: p[2] * (x - p[4]).max(0.0),
            },
        }
    }

    pub fn func(&self, p: &[f64], x: f64) -> f64 {
        self.evaluate(p, x).total()
    }

    /// d(func)/d(p) at `x`
    fn gradient(&self, p: &[f64], x: f64) -> Vec<f64> {
        match self {
            Self::ThreeParamCooling => {
                let active = x > p[2];
                vec![
                    1.0,
                    (x - p[2]).max(0.0),
                    if active { -p[1] } else { 0.0 },
                ]
            }
            Self::ThreeParamHeating => {
                let active = x < p[2];
                vec![
                    1.0,
                    (x - p[2]).min(0.0),
                    if active { -p[1] } else { 0.0 },
                ]
            }
            Self::FiveParam => {
                let heating = x < p[3];
                let cooling = x > p[4];
                vec![
                    1.0,
                    (x - p[3]).min(0.0),
                    (x - p[4]).max(0.0),
                    if heating { -p[1] } else { 0.0 },
                    if cooling { -p[2] } else { 0.0 },
                ]
            }
        }
    }

    /// Heuristic starting points for the solver, one per balance-point seed
    fn initial_guesses(&self, temps: &[f64], daily: &[f64]) -> Vec<Vec<f64>> {
        let baseload = percentile(daily, 0.10);

        let (cold_idx, hot_idx) = extreme_indices(temps);
        let heating_slope = slope_towards(temps[cold_idx], daily[cold_idx], baseload).min(0.0);
        let cooling_slope = slope_towards(temps[hot_idx], daily[hot_idx], baseload).max(0.0);

        let seeds = [45.0, 55.0, ASSUMED_BALANCE_POINT_F, 75.0, 85.0];
        match self {
            Self::ThreeParamCooling => seeds
                .iter()
                .map(|bp| vec![baseload, cooling_slope, *bp])
                .collect(),
            Self::ThreeParamHeating => seeds
                .iter()
                .map(|bp| vec![baseload, heating_slope, *bp])
                .collect(),
            Self::FiveParam => {
                let mut guesses = Vec::new();
                for heat_bp in &seeds {
                    for cool_bp in seeds.iter().filter(|c| *c >= heat_bp) {
                        guesses.push(vec![
                            baseload,
                            heating_slope,
                            cooling_slope,
                            *heat_bp,
                            *cool_bp,
                        ]);
                    }
                }
                guesses
            }
        }
    }
}

/// A fitted temperature-response model. Immutable once fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionModel {
    pub variant: RegressionVariant,
    pub parameters: Vec<f64>,
    pub fit_bounds: Bounds,
    pub cvrmse: f64,
}

impl RegressionModel {
    /// Fit one candidate shape to `(avg_temp, daily_consumption)` pairs
    pub fn fit(variant: RegressionVariant, rows: &[WeatherJoinedBillRow]) -> Result<Self> {
        let (temps, daily) = split_rows(rows)?;
        let bounds = variant.bounds();
        let options = SolverOptions::default();

        let residuals = |p: &DVector<f64>| {
            let params = p.as_slice();
            DVector::from_iterator(
                temps.len(),
                temps
                    .iter()
                    .zip(&daily)
                    .map(|(x, y)| y - variant.func(params, *x)),
            )
        };
        let jacobian = |p: &DVector<f64>| {
            let params = p.as_slice();
            let n_params = variant.n_parameters();
            let mut jac = DMatrix::zeros(temps.len(), n_params);
            for (i, x) in temps.iter().enumerate() {
                for (j, g) in variant.gradient(params, *x).into_iter().enumerate() {
                    jac[(i, j)] = g;
                }
            }
            jac
        };

        let solutions: Vec<Result<Solution>> = variant
            .initial_guesses(&temps, &daily)
            .iter()
            .map(|guess| least_squares(&residuals, &jacobian, guess, &bounds, &options))
            .collect();
        let parameters = best_admissible(variant, solutions)?;

        let mut model = Self {
            variant,
            parameters,
            fit_bounds: bounds,
            cvrmse: f64::NAN,
        };
        model.cvrmse = model.calc_cvrmse(rows);
        if !model.cvrmse.is_finite() {
            return Err(CalibrationError::ModelFit(format!(
                "{}: CVRMSE is not finite",
                variant.name()
            )));
        }
        Ok(model)
    }

    pub fn n_parameters(&self) -> usize {
        self.variant.n_parameters()
    }

    pub fn predict(&self, temps: &[f64]) -> Vec<f64> {
        temps
            .iter()
            .map(|x| self.variant.func(&self.parameters, *x))
            .collect()
    }

    pub fn predict_disaggregated(&self, temps: &[f64]) -> Vec<DisaggregatedUsage> {
        temps
            .iter()
            .map(|x| self.variant.evaluate(&self.parameters, *x))
            .collect()
    }

    /// Root-mean-square error normalised by mean observed daily use.
    ///
    /// Uses n - p degrees of freedom when there are more observations than parameters.
    pub fn calc_cvrmse(&self, rows: &[WeatherJoinedBillRow]) -> f64 {
        let n = rows.len();
        if n == 0 {
            return f64::NAN;
        }
        let sse: f64 = rows
            .iter()
            .map(|row| {
                let err = row.daily_consumption - self.variant.func(&self.parameters, row.avg_temp);
                err * err
            })
            .sum();
        let mean = rows.iter().map(|r| r.daily_consumption).sum::<f64>() / n as f64;
        let p = self.n_parameters();
        let dof = if n > p { n - p } else { n };
        (sse / dof as f64).sqrt() / mean
    }

    /// Heating balance point, if the model has one
    pub fn heating_balance_point(&self) -> Option<f64> {
        match self.variant {
            RegressionVariant::ThreeParamHeating => Some(self.parameters[2]),
            RegressionVariant::FiveParam => Some(self.parameters[3]),
            RegressionVariant::ThreeParamCooling => None,
        }
    }

    pub fn heating_slope(&self) -> Option<f64> {
        match self.variant {
            RegressionVariant::ThreeParamHeating | RegressionVariant::FiveParam => {
                Some(self.parameters[1])
            }
            RegressionVariant::ThreeParamCooling => None,
        }
    }

    pub fn cooling_balance_point(&self) -> Option<f64> {
        match self.variant {
            RegressionVariant::ThreeParamCooling => Some(self.parameters[2]),
            RegressionVariant::FiveParam => Some(self.parameters[4]),
            RegressionVariant::ThreeParamHeating => None,
        }
    }
}

/// Fit every candidate shape and keep the one with the lowest CVRMSE.
///
/// Candidates that fail to fit are skipped. `max_cvrmse` (e.g. 0.20 for BPI-2400) turns a
/// poor best fit into [`CalibrationError::ModelQuality`].
pub fn fit_model(rows: &[WeatherJoinedBillRow], max_cvrmse: Option<f64>) -> Result<RegressionModel> {
    let fits = RegressionVariant::all()
        .into_iter()
        .map(|variant| (variant, RegressionModel::fit(variant, rows)))
        .collect();
    select_best(fits, max_cvrmse)
}

/// A 5-parameter solution whose heating balance point lies above its cooling balance
/// point has both slopes active over the same temperatures and is rejected.
pub fn is_admissible(variant: RegressionVariant, params: &[f64]) -> bool {
    variant != RegressionVariant::FiveParam || params[3] <= params[4]
}

/// Lowest-SSE admissible solution among the per-seed solver results
fn best_admissible(
    variant: RegressionVariant,
    solutions: impl IntoIterator<Item = Result<Solution>>,
) -> Result<Vec<f64>> {
    let mut best: Option<(Vec<f64>, f64)> = None;
    let mut last_error = None;
    for result in solutions {
        match result {
            Ok(solution) => {
                let params = solution.parameters.as_slice().to_vec();
                if !is_admissible(variant, &params) {
                    log::debug!(
                        "Discarding crossed 5-parameter solution (heating balance {:.1} > cooling balance {:.1})",
                        params[3],
                        params[4]
                    );
                    continue;
                }
                if best.as_ref().map_or(true, |(_, sse)| solution.sse < *sse) {
                    best = Some((params, solution.sse));
                }
            }
            Err(e) => last_error = Some(e),
        }
    }

    best.map(|(params, _)| params).ok_or_else(|| match last_error {
        Some(CalibrationError::ModelFit(msg)) => {
            CalibrationError::ModelFit(format!("{}: {}", variant.name(), msg))
        }
        _ => CalibrationError::ModelFit(format!(
            "{}: no admissible solution found",
            variant.name()
        )),
    })
}

/// Keep the successful candidate with the lowest CVRMSE, then apply the quality gate
fn select_best(
    fits: Vec<(RegressionVariant, Result<RegressionModel>)>,
    max_cvrmse: Option<f64>,
) -> Result<RegressionModel> {
    let mut candidates = Vec::new();
    let mut failures = Vec::new();
    for (variant, fit) in fits {
        match fit {
            Ok(model) => {
                log::debug!("{} fit with CVRMSE {:.4}", variant.name(), model.cvrmse);
                candidates.push(model);
            }
            Err(e) => {
                log::debug!("{} fit failed: {}", variant.name(), e);
                failures.push(e.to_string());
            }
        }
    }

    let best = candidates
        .into_iter()
        .min_by(|a, b| a.cvrmse.total_cmp(&b.cvrmse))
        .ok_or_else(|| {
            CalibrationError::ModelFit(format!(
                "All regression candidates failed: {}",
                failures.join("; ")
            ))
        })?;

    if let Some(threshold) = max_cvrmse {
        if best.cvrmse > threshold {
            return Err(CalibrationError::ModelQuality {
                cvrmse: best.cvrmse,
                threshold,
            });
        }
    }

    Ok(best)
}

fn split_rows(rows: &[WeatherJoinedBillRow]) -> Result<(Vec<f64>, Vec<f64>)> {
    if rows.is_empty() {
        return Err(CalibrationError::ModelFit(
            "No bill rows to fit".to_string(),
        ));
    }
    let temps: Vec<f64> = rows.iter().map(|r| r.avg_temp).collect();
    let daily: Vec<f64> = rows.iter().map(|r| r.daily_consumption).collect();
    if temps.iter().chain(&daily).any(|v| !v.is_finite()) {
        return Err(CalibrationError::ModelFit(
            "Bill rows contain non-finite temperature or consumption".to_string(),
        ));
    }
    Ok((temps, daily))
}

/// Linear-interpolated percentile, `q` in [0, 1]
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn extreme_indices(temps: &[f64]) -> (usize, usize) {
    let mut cold = 0;
    let mut hot = 0;
    for (i, t) in temps.iter().enumerate() {
        if *t < temps[cold] {
            cold = i;
        }
        if *t > temps[hot] {
            hot = i;
        }
    }
    (cold, hot)
}

fn slope_towards(temp: f64, daily: f64, baseload: f64) -> f64 {
    let dx = temp - ASSUMED_BALANCE_POINT_F;
    if dx.abs() < 1.0 {
        0.0
    } else {
        (daily - baseload) / dx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile() {
        let values = [5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 0.5), 3.0);
        assert!((percentile(&values, 0.1) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_disaggregation_sums_to_func() {
        let params = [12.0, -0.8, 2.5, 55.0, 72.0];
        for x in [10.0, 55.0, 63.3, 72.0, 95.1] {
            let parts = RegressionVariant::FiveParam.evaluate(&params, x);
            assert_eq!(parts.total(), RegressionVariant::FiveParam.func(&params, x));
            assert!(parts.heating >= 0.0 && parts.cooling >= 0.0);
        }
    }

    #[test]
    fn test_initial_guesses_respect_slope_signs() {
        let temps = [20.0, 40.0, 60.0, 80.0];
        let daily = [50.0, 30.0, 10.0, 25.0];
        for guess in RegressionVariant::FiveParam.initial_guesses(&temps, &daily) {
            assert!(guess[1] <= 0.0);
            assert!(guess[2] >= 0.0);
            assert!(guess[3] <= guess[4]);
        }
    }

    fn solution(params: &[f64], sse: f64) -> Result<Solution> {
        Ok(Solution {
            parameters: DVector::from_column_slice(params),
            sse,
            iterations: 10,
        })
    }

    fn fitted(variant: RegressionVariant, parameters: Vec<f64>, cvrmse: f64) -> RegressionModel {
        RegressionModel {
            variant,
            fit_bounds: variant.bounds(),
            parameters,
            cvrmse,
        }
    }

    #[test]
    fn test_crossed_five_parameter_solution_is_skipped() {
        let crossed = [10.0, -1.0, 1.0, 65.0, 50.0];
        let ordered = [10.0, -1.0, 1.0, 50.0, 65.0];
        assert!(!is_admissible(RegressionVariant::FiveParam, &crossed));
        assert!(is_admissible(RegressionVariant::FiveParam, &ordered));
        assert!(is_admissible(RegressionVariant::ThreeParamHeating, &[10.0, -1.0, 60.0]));

        // The crossed solution fits better but never wins
        let params = best_admissible(
            RegressionVariant::FiveParam,
            vec![solution(&crossed, 0.5), solution(&ordered, 4.0)],
        )
        .unwrap();
        assert_eq!(params, ordered.to_vec());
    }

    #[test]
    fn test_all_seeds_crossed_discards_five_parameter_candidate() {
        let seeds = vec![
            solution(&[10.0, -1.0, 1.0, 65.0, 50.0], 0.1),
            solution(&[12.0, -0.5, 2.0, 80.0, 45.0], 0.2),
        ];
        assert!(matches!(
            best_admissible(RegressionVariant::FiveParam, seeds),
            Err(CalibrationError::ModelFit(msg)) if msg.contains("no admissible solution")
        ));
    }

    #[test]
    fn test_three_parameter_model_selected_when_five_parameter_is_discarded() {
        let crossed_only = best_admissible(
            RegressionVariant::FiveParam,
            vec![solution(&[10.0, -1.0, 1.0, 65.0, 50.0], 0.0)],
        )
        .map(|p| fitted(RegressionVariant::FiveParam, p, 0.0));
        let fits = vec![
            (
                RegressionVariant::ThreeParamCooling,
                Ok(fitted(RegressionVariant::ThreeParamCooling, vec![10.0, 0.5, 70.0], 0.30)),
            ),
            (
                RegressionVariant::ThreeParamHeating,
                Ok(fitted(RegressionVariant::ThreeParamHeating, vec![20.0, -1.0, 55.0], 0.07)),
            ),
            (RegressionVariant::FiveParam, crossed_only),
        ];

        let best = select_best(fits, Some(0.20)).unwrap();
        assert_eq!(best.variant, RegressionVariant::ThreeParamHeating);
    }
}
