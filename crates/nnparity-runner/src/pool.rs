//! Bounded worker pool over independent test cases

use crate::case::TestCase;
use crate::orchestrator::{RunContext, run_case};
use crate::report::{Stage, Verdict};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error};

/// Run every case with at most `max_parallel` in flight.
///
/// Each case task sends its verdicts to a single collector, so the only
/// shared mutable state is the append-only verdict stream. A case whose task
/// dies is reported as Errored for its backends; other cases are unaffected.
pub async fn run_cases(cases: Vec<TestCase>, ctx: Arc<RunContext>, max_parallel: usize) -> Vec<Verdict> {
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Verdict>>();
    debug!(cases = cases.len(), max_parallel, "scheduling cases");

    let mut tasks = Vec::with_capacity(cases.len());
    for case in cases {
        let semaphore = Arc::clone(&semaphore);
        let ctx_for_task = Arc::clone(&ctx);
        let tx = tx.clone();
        let task_case = case.clone();

        let handle = tokio::spawn(async move {
            let verdicts = match semaphore.acquire_owned().await {
                Ok(_permit) => run_case(&task_case, &ctx_for_task).await,
                Err(e) => ctx_for_task
                    .fallback_targets(&task_case)
                    .into_iter()
                    .map(|b| Verdict::errored(task_case.case_id.clone(), &task_case.suite, b, Stage::Scheduling, &e))
                    .collect(),
            };
            // The receiver outlives every task.
            let _ = tx.send(verdicts);
        });
        tasks.push((case, handle));
    }
    drop(tx);

    let outcomes = join_all(tasks.into_iter().map(|(case, handle)| async move { (case, handle.await) })).await;

    let mut verdicts = Vec::new();
    for (case, joined) in outcomes {
        if let Err(e) = joined {
            error!(case_id = %case.case_id, error = %e, "case task failed");
            let message = format!("case task failed: {e}");
            verdicts.extend(
                ctx.fallback_targets(&case)
                    .into_iter()
                    .map(|b| Verdict::errored(case.case_id.clone(), &case.suite, b, Stage::Scheduling, &message)),
            );
        }
    }
    while let Some(batch) = rx.recv().await {
        verdicts.extend(batch);
    }
    verdicts
}
