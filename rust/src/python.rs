//! Python bindings, built with the `python` feature.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::balance::{BalanceValidator, WorkerStats};
use crate::config::{OptimizerConfig, RosterInput};
use crate::constraints::ConstraintModel;
use crate::models::{DateRange, Period, Worker};
use crate::schedule::{Schedule, ScheduleView};
use crate::GuardiaError;

impl From<GuardiaError> for PyErr {
    fn from(err: GuardiaError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

/// A worker in the on-call pool.
#[pyclass(name = "Worker")]
#[derive(Clone, Debug)]
pub struct PyWorker {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub work_fraction: f64,
    #[pyo3(get, set)]
    pub target_shifts: Option<u32>,
    #[pyo3(get, set)]
    pub mandatory_dates: Vec<NaiveDate>,
    /// Inclusive `(start, end)` ranges.
    #[pyo3(get, set)]
    pub days_off: Vec<(NaiveDate, NaiveDate)>,
    #[pyo3(get, set)]
    pub work_periods: Vec<(NaiveDate, NaiveDate)>,
    #[pyo3(get, set)]
    pub incompatible_with: Vec<String>,
}

#[pymethods]
impl PyWorker {
    #[new]
    #[pyo3(signature = (
        id,
        work_fraction=1.0,
        target_shifts=None,
        mandatory_dates=Vec::new(),
        days_off=Vec::new(),
        work_periods=Vec::new(),
        incompatible_with=Vec::new()
    ))]
    fn new(
        id: String,
        work_fraction: f64,
        target_shifts: Option<u32>,
        mandatory_dates: Vec<NaiveDate>,
        days_off: Vec<(NaiveDate, NaiveDate)>,
        work_periods: Vec<(NaiveDate, NaiveDate)>,
        incompatible_with: Vec<String>,
    ) -> Self {
        Self {
            id,
            work_fraction,
            target_shifts,
            mandatory_dates,
            days_off,
            work_periods,
            incompatible_with,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Worker(id={:?}, work_fraction={}, target_shifts={:?})",
            self.id, self.work_fraction, self.target_shifts
        )
    }
}

impl From<&PyWorker> for Worker {
    fn from(w: &PyWorker) -> Self {
        let ranges = |r: &[(NaiveDate, NaiveDate)]| {
            r.iter()
                .map(|&(start, end)| DateRange::new(start, end))
                .collect::<Vec<_>>()
        };
        Worker {
            id: w.id.clone(),
            work_fraction: w.work_fraction,
            target_shifts: w.target_shifts,
            mandatory_dates: w.mandatory_dates.clone(),
            days_off: ranges(&w.days_off),
            work_periods: ranges(&w.work_periods),
            incompatible_with: w.incompatible_with.clone(),
        }
    }
}

/// The calendar period to staff.
#[pyclass(name = "Period")]
#[derive(Clone, Debug)]
pub struct PyPeriod {
    #[pyo3(get, set)]
    pub start: NaiveDate,
    #[pyo3(get, set)]
    pub end: NaiveDate,
    #[pyo3(get, set)]
    pub holidays: Vec<NaiveDate>,
    #[pyo3(get, set)]
    pub slots_per_day: usize,
}

#[pymethods]
impl PyPeriod {
    #[new]
    #[pyo3(signature = (start, end, holidays=Vec::new(), slots_per_day=1))]
    fn new(start: NaiveDate, end: NaiveDate, holidays: Vec<NaiveDate>, slots_per_day: usize) -> Self {
        Self {
            start,
            end,
            holidays,
            slots_per_day,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Period(start={}, end={}, holidays={}, slots_per_day={})",
            self.start,
            self.end,
            self.holidays.len(),
            self.slots_per_day
        )
    }
}

impl From<&PyPeriod> for Period {
    fn from(p: &PyPeriod) -> Self {
        Period::new(p.start, p.end, p.slots_per_day).with_holidays(p.holidays.iter().copied())
    }
}

/// Optimizer settings; omitted arguments take the engine defaults.
#[pyclass(name = "OptimizerConfig")]
#[derive(Clone, Debug)]
pub struct PyOptimizerConfig {
    #[pyo3(get, set)]
    pub tolerance_pct: f64,
    #[pyo3(get, set)]
    pub iteration_budget: Option<usize>,
    #[pyo3(get, set)]
    pub min_gap_days: u32,
    #[pyo3(get, set)]
    pub seed: u64,
    #[pyo3(get, set)]
    pub verbosity: u8,
}

#[pymethods]
impl PyOptimizerConfig {
    #[new]
    #[pyo3(signature = (
        tolerance_pct=None,
        iteration_budget=None,
        min_gap_days=None,
        seed=None,
        verbosity=None
    ))]
    fn new(
        tolerance_pct: Option<f64>,
        iteration_budget: Option<usize>,
        min_gap_days: Option<u32>,
        seed: Option<u64>,
        verbosity: Option<u8>,
    ) -> Self {
        let defaults = OptimizerConfig::default();
        Self {
            tolerance_pct: tolerance_pct.unwrap_or(defaults.tolerance_pct),
            iteration_budget: iteration_budget.or(defaults.iteration_budget),
            min_gap_days: min_gap_days.unwrap_or(defaults.min_gap_days),
            seed: seed.unwrap_or(defaults.seed),
            verbosity: verbosity.unwrap_or(defaults.verbosity),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "OptimizerConfig(tolerance_pct={}, iteration_budget={:?}, min_gap_days={})",
            self.tolerance_pct, self.iteration_budget, self.min_gap_days
        )
    }
}

impl From<Option<&PyOptimizerConfig>> for OptimizerConfig {
    fn from(config: Option<&PyOptimizerConfig>) -> Self {
        let defaults = OptimizerConfig::default();
        match config {
            None => defaults,
            Some(c) => OptimizerConfig {
                // Keep the emergency band at least as wide as the tolerance
                emergency_tolerance_pct: defaults.emergency_tolerance_pct.max(c.tolerance_pct),
                tolerance_pct: c.tolerance_pct,
                iteration_budget: c.iteration_budget,
                min_gap_days: c.min_gap_days,
                seed: c.seed,
                verbosity: c.verbosity,
                ..defaults
            },
        }
    }
}

/// One worker's row of the balance table.
#[pyclass(name = "WorkerStats", get_all)]
#[derive(Clone, Debug)]
pub struct PyWorkerStats {
    pub worker: String,
    pub total: u32,
    pub weekend: u32,
    pub expected_total: f64,
    pub deviation_pct: f64,
    pub weekend_pct: f64,
}

impl From<&WorkerStats> for PyWorkerStats {
    fn from(s: &WorkerStats) -> Self {
        Self {
            worker: s.worker.clone(),
            total: s.total,
            weekend: s.weekend,
            expected_total: s.expected_total,
            deviation_pct: s.deviation_pct,
            weekend_pct: s.weekend_pct,
        }
    }
}

/// Result of [`optimize_roster`].
#[pyclass(name = "RosterResult", get_all)]
#[derive(Clone, Debug)]
pub struct PyRosterResult {
    /// `(date, worker id per slot)` for every day of the period.
    pub assignments: Vec<(NaiveDate, Vec<Option<String>>)>,
    pub coverage: f64,
    pub balance_score: f64,
    pub stats: Vec<PyWorkerStats>,
    pub relaxations: Vec<String>,
    /// `(date, slot, reason)` for every slot left empty.
    pub unfilled: Vec<(NaiveDate, usize, String)>,
    pub findings: Vec<String>,
}

fn to_input(
    workers: &[PyWorker],
    period: &PyPeriod,
    config: Option<&PyOptimizerConfig>,
) -> RosterInput {
    RosterInput {
        workers: workers.iter().map(Worker::from).collect(),
        period: Period::from(period),
        optimizer: OptimizerConfig::from(config),
    }
}

/// Build and optimize a roster.
///
/// # Raises
/// * ValueError if the workers, period or configuration are invalid
#[pyfunction]
#[pyo3(signature = (workers, period, config=None))]
fn optimize_roster(
    py: Python<'_>,
    workers: Vec<PyWorker>,
    period: PyPeriod,
    config: Option<PyOptimizerConfig>,
) -> PyResult<PyRosterResult> {
    let input = to_input(&workers, &period, config.as_ref());
    let roster = py.allow_threads(|| crate::optimize_roster(&input))?;
    let outcome = &roster.outcome;

    Ok(PyRosterResult {
        assignments: roster
            .snapshot()
            .days
            .into_iter()
            .map(|day| (day.date, day.workers))
            .collect(),
        coverage: outcome.coverage,
        balance_score: outcome.balance.score,
        stats: outcome.balance.stats.iter().map(PyWorkerStats::from).collect(),
        relaxations: outcome.relaxations.iter().map(|r| r.to_string()).collect(),
        unfilled: outcome
            .unfilled
            .iter()
            .map(|gap| (gap.date, gap.slot, gap.to_string()))
            .collect(),
        findings: outcome
            .balance
            .violations
            .iter()
            .map(|v| v.to_string())
            .collect(),
    })
}

/// Audit the balance of an existing schedule given as `(date, worker id)` pairs.
///
/// # Raises
/// * ValueError on invalid configuration, unknown workers, dates outside the
///   period, or a day with more assignments than slots
#[pyfunction]
#[pyo3(signature = (workers, period, assignments, config=None))]
fn validate_balance(
    workers: Vec<PyWorker>,
    period: PyPeriod,
    assignments: Vec<(NaiveDate, String)>,
    config: Option<PyOptimizerConfig>,
) -> PyResult<(f64, Vec<PyWorkerStats>, Vec<String>)> {
    let input = to_input(&workers, &period, config.as_ref());
    let model = ConstraintModel::new(&input.workers, &input.period, &input.optimizer)
        .map_err(GuardiaError::from)?;

    let mut schedule = Schedule::empty(
        model.calendar().start(),
        model.num_days(),
        model.slots_per_day(),
        model.num_workers(),
    );
    for (date, id) in &assignments {
        let day = model
            .calendar()
            .index_of(*date)
            .ok_or_else(|| PyValueError::new_err(format!("{} is outside the period", date)))?;
        let worker = model
            .worker_idx(id)
            .ok_or_else(|| PyValueError::new_err(format!("Unknown worker '{}'", id)))?;
        let slot = (0..model.slots_per_day())
            .find(|&s| schedule.occupant(day, s).is_none())
            .ok_or_else(|| PyValueError::new_err(format!("{}: more assignments than slots", date)))?;
        schedule.assign(day, slot, worker);
    }

    let report = BalanceValidator::new(&input.optimizer).validate(&model, &schedule);
    Ok((
        report.score,
        report.stats.iter().map(PyWorkerStats::from).collect(),
        report.violations.iter().map(|v| v.to_string()).collect(),
    ))
}

/// The guardia Python module.
#[pymodule]
fn guardia(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyWorker>()?;
    m.add_class::<PyPeriod>()?;
    m.add_class::<PyOptimizerConfig>()?;
    m.add_class::<PyWorkerStats>()?;
    m.add_class::<PyRosterResult>()?;

    m.add_function(wrap_pyfunction!(optimize_roster, m)?)?;
    m.add_function(wrap_pyfunction!(validate_balance, m)?)?;

    Ok(())
}
