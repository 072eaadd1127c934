//! Wave-parallel execution.
//!
//! The dependency graph partitions a phase's calls into waves: the first
//! wave has no unresolved dependencies and each later wave depends only
//! on earlier ones. Calls inside a wave are independent, so a wave whose
//! calls are all safe runs on a bounded worker pool against one
//! copy-on-write snapshot, with results written back in document order
//! once the wave joins. A wave containing any unsafe call runs
//! sequentially instead, and small workloads never spin up the pool at
//! all (the caller enforces the minimum-operations threshold).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, trace};

use weft_op::Response;
use weft_tree::{SharedTree, Value};
use weft_util::{Error, Pos, Result};

use crate::graph::DepGraph;
use crate::{annotate, Evaluator, Opcall};

/// Cancellation handle for a running evaluation.
///
/// Cancelling stops the dispatch of new waves (and new sequential
/// calls); outstanding workers finish their current call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Execute one phase's calls wave by wave.
pub(crate) fn execute_parallel(
    ev: &Evaluator<'_>,
    tree: &mut Value,
    opcalls: &[Opcall],
    graph: &DepGraph,
    errors: &mut Vec<Error>,
) -> Result<()> {
    let workers = ev.config.concurrency.max_workers.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("weft-worker-{}", i))
        .build()
        .map_err(|err| {
            Error::evaluation(Pos::DUMMY, format!("could not start worker pool: {}", err))
        })?;

    let shared = SharedTree::new(std::mem::take(tree));
    let outcome = run_waves(ev, &pool, &shared, opcalls, graph, errors);
    *tree = shared.into_inner();
    outcome
}

fn run_waves(
    ev: &Evaluator<'_>,
    pool: &rayon::ThreadPool,
    shared: &SharedTree,
    opcalls: &[Opcall],
    graph: &DepGraph,
    errors: &mut Vec<Error>,
) -> Result<()> {
    for (number, wave) in graph.waves().into_iter().enumerate() {
        if ev.cancel.is_cancelled() {
            return Err(Error::evaluation(Pos::DUMMY, "evaluation cancelled"));
        }
        if errors.len() >= ev.max_errors {
            break;
        }

        let all_safe = wave.iter().all(|&i| opcalls[i].is_safe(ev.registry()));
        debug!(wave = number, calls = wave.len(), all_safe, "dispatching wave");

        if all_safe && wave.len() > 1 {
            run_wave_parallel(ev, pool, shared, opcalls, &wave, errors)?;
        } else {
            run_wave_sequential(ev, shared, opcalls, &wave, errors)?;
        }
    }
    Ok(())
}

/// All calls read the same snapshot; writes land after the join, in
/// document order.
fn run_wave_parallel(
    ev: &Evaluator<'_>,
    pool: &rayon::ThreadPool,
    shared: &SharedTree,
    opcalls: &[Opcall],
    wave: &[usize],
    errors: &mut Vec<Error>,
) -> Result<()> {
    let snapshot = shared.snapshot();

    let mut outcomes: Vec<(usize, Result<Response>)> = pool.install(|| {
        wave.par_iter()
            .map(|&i| {
                ev.metrics.worker_started();
                let ctx = ev.context(&*snapshot, opcalls[i].dest.clone());
                let outcome = ev.run_opcall(&opcalls[i], &ctx);
                ev.metrics.worker_done();
                (i, outcome)
            })
            .collect()
    });
    outcomes.sort_by_key(|(i, _)| *i);

    for (i, outcome) in outcomes {
        let oc = &opcalls[i];
        let applied = outcome.and_then(|response| {
            shared.update(|root| ev.apply(root, oc, response))
        });
        record_outcome(ev, oc, applied, errors)?;
    }
    Ok(())
}

/// Fallback for waves containing unsafe calls: one at a time, each
/// against the then-current tree.
fn run_wave_sequential(
    ev: &Evaluator<'_>,
    shared: &SharedTree,
    opcalls: &[Opcall],
    wave: &[usize],
    errors: &mut Vec<Error>,
) -> Result<()> {
    for &i in wave {
        if ev.cancel.is_cancelled() {
            return Err(Error::evaluation(Pos::DUMMY, "evaluation cancelled"));
        }
        if errors.len() >= ev.max_errors {
            break;
        }

        let oc = &opcalls[i];
        let snapshot = shared.snapshot();
        let outcome = {
            let ctx = ev.context(&*snapshot, oc.dest.clone());
            ev.run_opcall(oc, &ctx)
        };
        let applied = outcome.and_then(|response| {
            shared.update(|root| ev.apply(root, oc, response))
        });
        record_outcome(ev, oc, applied, errors)?;
        trace!(dest = %oc.dest, "sequential wave call done");
    }
    Ok(())
}

fn record_outcome(
    ev: &Evaluator<'_>,
    oc: &Opcall,
    outcome: Result<()>,
    errors: &mut Vec<Error>,
) -> Result<()> {
    match outcome {
        Ok(()) => Ok(()),
        Err(err) if err.is_fatal() => {
            ev.metrics.record_error(err.kind());
            Err(err)
        }
        Err(err) => {
            ev.metrics.record_error(err.kind());
            errors.push(annotate(oc, err));
            Ok(())
        }
    }
}
