//! Satisfiability oracle.
//!
//! The solving primitive itself is external: [`SatOracle`] is the small contract the rest of the
//! crate relies on (load clauses, solve under assumptions, read back a model), and [`Varisat`]
//! is the default backend built on the `varisat` CDCL solver.
//!
//! A session is request-scoped, single-owner state. A [`Backend`] hands out a fresh session
//! per request; sessions are never shared between callers.
//!
//! # Wall-clock budget
//!
//! Sessions opened with a budget keep their solver on a worker thread and wait for each answer
//! with a timeout. When the budget expires the call returns [`OracleError::TimedOut`] and the
//! worker is abandoned; `varisat` cannot be interrupted, so the thread runs until its solve
//! completes. Workers are drawn from a bounded [`WorkerPool`], which caps how many such threads
//! can be alive at once. A session that finds the pool full waits for a slot within its budget
//! and times out otherwise.

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use varisat::solver::Solver;
use varisat::ExtendFormula;

use crate::cnf::Cnf;
use crate::types::{FeatureId, Lit};

/// Error raised by an oracle session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The solve call exceeded its wall-clock budget.
    TimedOut(Duration),
    /// The backend failed.
    Backend(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::TimedOut(budget) => write!(f, "solver timed out after {:?}", budget),
            OracleError::Backend(msg) => write!(f, "solver error: {}", msg),
        }
    }
}

impl std::error::Error for OracleError {}

/// A total truth assignment over the feature variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    values: Vec<bool>,
}

impl Model {
    pub fn new(values: Vec<bool>) -> Self {
        Self { values }
    }

    /// Builds a model over `num_vars` variables from DIMACS literals.
    ///
    /// Variables the literals do not mention are false.
    pub fn from_dimacs(num_vars: usize, lits: impl IntoIterator<Item = i32>) -> Self {
        let mut values = vec![false; num_vars];
        for lit in lits {
            let index = lit.unsigned_abs() as usize;
            if lit > 0 && index <= num_vars {
                values[index - 1] = true;
            }
        }
        Self { values }
    }

    pub fn num_vars(&self) -> usize {
        self.values.len()
    }

    /// Value of `id`; variables outside the model are false.
    pub fn value(&self, id: FeatureId) -> bool {
        self.values.get(id.index()).copied().unwrap_or(false)
    }

    /// Ids assigned true, in ascending order.
    pub fn true_ids(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v)
            .map(|(i, _)| FeatureId::from_index(i))
    }

    pub fn lits(&self) -> Vec<Lit> {
        (0..self.values.len())
            .map(|i| Lit::new(FeatureId::from_index(i), self.values[i]))
            .collect()
    }
}

/// A request-scoped solver session.
pub trait SatOracle {
    /// Adds a clause to the session.
    fn add_clause(&mut self, lits: &[Lit]);

    /// Solves the loaded clauses under the given unit assumptions.
    ///
    /// Returns `Ok(true)` if satisfiable, `Ok(false)` if not.
    fn solve(&mut self, assumptions: &[Lit]) -> Result<bool, OracleError>;

    /// The model found by the last successful [`solve`][SatOracle::solve], if any.
    fn model(&self) -> Option<Model>;

    /// Adds every clause of `cnf`.
    fn load(&mut self, cnf: &Cnf) {
        for clause in cnf.clauses() {
            self.add_clause(&clause.lits);
        }
    }
}

/// Source of fresh oracle sessions.
pub trait Backend: Sync {
    type Session: SatOracle;

    /// Opens a new session over `num_vars` variables.
    fn open(&self, num_vars: usize, budget: Option<Duration>) -> Self::Session;
}

/// Bounded set of solver worker threads.
///
/// A worker holds a permit for as long as its thread lives, including the time it
/// spends finishing a solve whose caller already timed out. Once `limit` workers are alive,
/// new sessions wait for a permit inside their own budget.
#[derive(Debug)]
pub struct WorkerPool {
    limit: usize,
    live: Mutex<usize>,
    released: Condvar,
}

impl WorkerPool {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            live: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of worker threads currently alive.
    pub fn live(&self) -> usize {
        *self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits until a worker slot is free or `deadline` passes.
    fn acquire(pool: &Arc<WorkerPool>, deadline: Instant) -> Option<WorkerPermit> {
        let mut live = pool.live.lock().unwrap_or_else(PoisonError::into_inner);
        while *live >= pool.limit {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            if remaining.is_zero() {
                return None;
            }
            live = pool
                .released
                .wait_timeout(live, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *live += 1;
        Some(WorkerPermit { pool: Arc::clone(pool) })
    }
}

/// A slot in a [`WorkerPool`], released on drop.
#[derive(Debug)]
struct WorkerPermit {
    pool: Arc<WorkerPool>,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        let mut live = self.pool.live.lock().unwrap_or_else(PoisonError::into_inner);
        *live -= 1;
        self.pool.released.notify_one();
    }
}

fn shared_pool() -> Arc<WorkerPool> {
    static SHARED: OnceLock<Arc<WorkerPool>> = OnceLock::new();
    let pool = SHARED.get_or_init(|| {
        let limit = thread::available_parallelism().map_or(4, |n| n.get());
        Arc::new(WorkerPool::new(limit))
    });
    Arc::clone(pool)
}

/// The `varisat` backend.
///
/// `Varisat::default()` draws workers from a process-wide pool sized to the available
/// parallelism; [`Varisat::with_max_workers`] gives the backend a pool of its own.
#[derive(Debug, Clone)]
pub struct Varisat {
    pool: Arc<WorkerPool>,
}

impl Default for Varisat {
    fn default() -> Self {
        Self { pool: shared_pool() }
    }
}

impl Varisat {
    pub fn with_max_workers(limit: usize) -> Self {
        Self {
            pool: Arc::new(WorkerPool::new(limit)),
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

impl Backend for Varisat {
    type Session = VarisatSession;

    fn open(&self, num_vars: usize, budget: Option<Duration>) -> Self::Session {
        VarisatSession::new(num_vars, budget, Arc::clone(&self.pool))
    }
}

enum Job {
    Clause(Vec<isize>),
    Solve(Vec<isize>),
}

type SolveResult = Result<Option<Vec<isize>>, OracleError>;

/// Channel ends of the worker thread serving one session.
struct Worker {
    jobs: Sender<Job>,
    results: Receiver<SolveResult>,
}

/// A session backed by `varisat`.
///
/// Without a budget the session owns a solver and solves on the calling thread. With a budget
/// the solver lives on a worker thread taken from the backend's pool; both keep their learnt
/// state across solves, so repeated queries are incremental. A worker whose solve times out is
/// abandoned: it exits as soon as that solve finishes, and the next solve starts a new one.
pub struct VarisatSession {
    num_vars: usize,
    budget: Option<Duration>,
    clauses: Vec<Vec<isize>>,
    pool: Arc<WorkerPool>,
    inline: Option<Solver<'static>>,
    worker: Option<Worker>,
    model: Option<Model>,
}

impl VarisatSession {
    fn new(num_vars: usize, budget: Option<Duration>, pool: Arc<WorkerPool>) -> Self {
        Self {
            num_vars,
            budget,
            clauses: Vec::new(),
            pool,
            inline: None,
            worker: None,
            model: None,
        }
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    fn solve_on_worker(&mut self, assumptions: Vec<isize>, budget: Duration) -> SolveResult {
        let deadline = Instant::now() + budget;

        if self.worker.is_none() {
            let Some(permit) = WorkerPool::acquire(&self.pool, deadline) else {
                log::warn!(
                    "All {} solver workers are busy; giving up after {:?}",
                    self.pool.limit(),
                    budget
                );
                return Err(OracleError::TimedOut(budget));
            };
            self.worker = Some(spawn_worker(self.num_vars, self.clauses.clone(), permit)?);
        }
        let Some(worker) = &self.worker else {
            return Err(OracleError::Backend("solver worker missing".to_string()));
        };

        if worker.jobs.send(Job::Solve(assumptions)).is_err() {
            self.worker = None;
            return Err(OracleError::Backend("solver thread terminated".to_string()));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        match worker.results.recv_timeout(remaining) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                // Dropping the sender lets the worker exit once its current solve is done.
                self.worker = None;
                log::warn!("Solve exceeded its budget of {:?}", budget);
                Err(OracleError::TimedOut(budget))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.worker = None;
                Err(OracleError::Backend("solver thread terminated without an answer".to_string()))
            }
        }
    }
}

impl SatOracle for VarisatSession {
    fn add_clause(&mut self, lits: &[Lit]) {
        for lit in lits {
            self.num_vars = self.num_vars.max(lit.feature().id() as usize);
        }
        let clause: Vec<isize> = lits.iter().map(|lit| lit.to_dimacs() as isize).collect();

        if let Some(solver) = &mut self.inline {
            solver.add_clause(&to_varisat(&clause));
        }
        let lost = self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.jobs.send(Job::Clause(clause.clone())).is_err());
        if lost {
            self.worker = None;
        }
        self.clauses.push(clause);
    }

    fn solve(&mut self, assumptions: &[Lit]) -> Result<bool, OracleError> {
        self.model = None;
        let assumptions: Vec<isize> = assumptions.iter().map(|lit| lit.to_dimacs() as isize).collect();

        let start = Instant::now();
        let result = match self.budget {
            None => {
                let (num_vars, clauses) = (self.num_vars, &self.clauses);
                let solver = self.inline.get_or_insert_with(|| build_solver(num_vars, clauses));
                run_solve(solver, &assumptions)
            }
            Some(budget) => self.solve_on_worker(assumptions, budget),
        };

        log::debug!(
            "Solved {} clauses over {} variables in {:?}",
            self.clauses.len(),
            self.num_vars,
            start.elapsed()
        );

        let model = result?.map(|lits| Model::from_dimacs(self.num_vars, lits.into_iter().map(|l| l as i32)));
        let sat = model.is_some();
        self.model = model;
        Ok(sat)
    }

    fn model(&self) -> Option<Model> {
        self.model.clone()
    }
}

fn to_varisat(lits: &[isize]) -> Vec<varisat::Lit> {
    lits.iter().map(|&l| varisat::Lit::from_dimacs(l)).collect()
}

/// A fresh `varisat` instance with every variable declared and every clause added.
fn build_solver(num_vars: usize, clauses: &[Vec<isize>]) -> Solver<'static> {
    let mut solver = Solver::new();

    // Make every variable known to the solver, even if no clause mentions it.
    for _ in 0..num_vars {
        solver.new_var();
    }
    for clause in clauses {
        solver.add_clause(&to_varisat(clause));
    }
    solver
}

fn run_solve(solver: &mut Solver<'static>, assumptions: &[isize]) -> SolveResult {
    solver.assume(&to_varisat(assumptions));
    match solver.solve() {
        Ok(true) => {
            let lits = solver
                .model()
                .ok_or_else(|| OracleError::Backend("SAT but no model returned".to_string()))?;
            Ok(Some(lits.iter().map(|l| l.to_dimacs()).collect()))
        }
        Ok(false) => Ok(None),
        Err(e) => Err(OracleError::Backend(e.to_string())),
    }
}

fn spawn_worker(num_vars: usize, clauses: Vec<Vec<isize>>, permit: WorkerPermit) -> Result<Worker, OracleError> {
    let (jobs, job_rx) = mpsc::channel::<Job>();
    let (result_tx, results) = mpsc::channel();

    thread::Builder::new()
        .name("fm-logic-solver".to_string())
        .spawn(move || {
            let _permit = permit;
            let mut solver = build_solver(num_vars, &clauses);
            for job in job_rx {
                match job {
                    Job::Clause(clause) => solver.add_clause(&to_varisat(&clause)),
                    Job::Solve(assumptions) => {
                        // The receiver is gone if the caller already timed out.
                        if result_tx.send(run_solve(&mut solver, &assumptions)).is_err() {
                            break;
                        }
                    }
                }
            }
        })
        .map_err(|e| OracleError::Backend(format!("failed to spawn solver thread: {}", e)))?;

    Ok(Worker { jobs, results })
}
