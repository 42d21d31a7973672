//! Admission loop: keeps up to `max_concurrency` tasks of one session in
//! flight and settles them as they complete.

use crate::types::{Event, ItemStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::SessionCoordinator;
use super::session::{QueuedTask, SessionHandle};
use super::task::{TaskContext, TaskOutcome, execute_task, failed_item};

impl SessionCoordinator {
    /// Spawn the admission loop of `handle`
    pub(crate) fn spawn_worker_loop(&self, handle: Arc<SessionHandle>) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.run_worker_loop(&handle).await;
            handle.finished.cancel();
        })
    }

    /// Run a session to completion
    ///
    /// 1. Admits queued tasks FIFO while fewer than `max_concurrency` are active
    ///    and the session is not cancelled
    /// 2. Waits for the next task to settle and records its outcome
    /// 3. Repeats until nothing is queued or in flight
    /// 4. Writes the manifest unless the session was cancelled
    async fn run_worker_loop(&self, handle: &Arc<SessionHandle>) {
        let ctx = Arc::new(TaskContext::for_session(self, handle));
        let mut tasks = JoinSet::new();
        // Kept so a panicked task can still be recorded against its candidate
        let mut in_flight: HashMap<tokio::task::Id, QueuedTask> = HashMap::new();

        loop {
            if !handle.is_cancelled() {
                let mut state = handle.state.lock().await;
                while state.active < handle.config.max_concurrency {
                    let Some(task) = state.queue.pop_front() else {
                        break;
                    };
                    state.active += 1;

                    tracing::debug!(
                        session_id = %handle.id,
                        index = task.index,
                        url = %task.candidate.best_url,
                        active = state.active,
                        "Task admitted"
                    );

                    let abort = tasks.spawn(execute_task(Arc::clone(&ctx), task.clone()));
                    in_flight.insert(abort.id(), task);
                }
            }

            let outcome = match tasks.join_next_with_id().await {
                Some(Ok((id, outcome))) => {
                    in_flight.remove(&id);
                    outcome
                }
                Some(Err(join_error)) => {
                    let Some(task) = in_flight.remove(&join_error.id()) else {
                        continue;
                    };
                    tracing::error!(
                        session_id = %handle.id,
                        index = task.index,
                        error = %join_error,
                        "Download task panicked"
                    );
                    TaskOutcome::Settled {
                        index: task.index,
                        item: failed_item(&handle.folder, &task, "download failed"),
                    }
                }
                // Nothing in flight and nothing admitted: drained or cancelled
                None => break,
            };

            self.settle(handle, outcome).await;
        }

        if handle.is_cancelled() {
            tracing::info!(session_id = %handle.id, "Session cancelled, skipping manifest");
            return;
        }

        self.finalize_session(handle).await;
    }

    /// Record a settled task and publish the new counters
    async fn settle(&self, handle: &SessionHandle, outcome: TaskOutcome) {
        let (progress, settled) = {
            let mut state = handle.state.lock().await;
            state.active = state.active.saturating_sub(1);

            let settled = match outcome {
                TaskOutcome::Dropped { index } => {
                    tracing::debug!(session_id = %handle.id, index, "Task dropped after cancellation");
                    None
                }
                TaskOutcome::Settled { index, item } => {
                    match item.status {
                        ItemStatus::Done => state.done += 1,
                        _ => state.failed += 1,
                    }
                    state.results.push(item.clone());
                    Some((index, item))
                }
            };

            (handle.progress_of(&state), settled)
        };

        if let Some((index, item)) = settled {
            self.emit_event(Event::ItemSettled {
                session_id: handle.id.clone(),
                index,
                item,
            });
        }
        self.report_progress(&progress.session_id, progress.total, progress.done, progress.failed);
    }
}

