//! Periodic task scheduler.
//!
//! Each task kind runs in its own tick loop. A run is single-flight per
//! kind: a tick or manual trigger that finds the previous run still going
//! is reported as skipped. Every run executes in a separate tokio task, so a
//! panic in one kind is logged and never takes down the others.

use crate::config::ScheduleConfig;
use crate::error::EngineError;
use crate::oplog::{LogEvent, OperationLog};
use async_trait::async_trait;
use fanpay_sdk::objects::{ScheduledTask, TaskOutcome, TaskRunResponse};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Executes one run of a scheduled task and describes what it did.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_task(&self, task: ScheduledTask) -> Result<String, EngineError>;
}

fn slot(task: ScheduledTask) -> usize {
    match task {
        ScheduledTask::MonthlyTierRecalculation => 0,
        ScheduledTask::DailyBatchPayouts => 1,
        ScheduledTask::WeeklyReconciliation => 2,
        ScheduledTask::FailoverSweep => 3,
    }
}

/// Clears the running flag, also when the run unwinds.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct TaskScheduler {
    running: [AtomicBool; 4],
    log: Arc<OperationLog>,
}

impl TaskScheduler {
    pub fn new(log: Arc<OperationLog>) -> Self {
        Self {
            running: Default::default(),
            log,
        }
    }

    pub fn is_running(&self, task: ScheduledTask) -> bool {
        self.running[slot(task)].load(Ordering::Acquire)
    }

    /// Run `task` once now unless a run of the same kind is in progress.
    pub async fn trigger(&self, task: ScheduledTask, runner: &dyn TaskRunner) -> TaskRunResponse {
        let flag = &self.running[slot(task)];
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.log.record(
                LogEvent::info("scheduler.run", "task skipped; previous run still in progress")
                    .meta("task", task.as_str()),
            );
            return TaskRunResponse {
                task,
                outcome: TaskOutcome::Skipped,
                duration_ms: 0,
                summary: None,
                error: None,
            };
        }
        let _guard = RunGuard(flag);

        let started = Instant::now();
        let result = runner.run_task(task).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(summary) => {
                self.log.record(
                    LogEvent::info("scheduler.run", "task completed")
                        .meta("task", task.as_str())
                        .meta("duration_ms", duration_ms)
                        .meta("summary", summary.clone()),
                );
                TaskRunResponse {
                    task,
                    outcome: TaskOutcome::Completed,
                    duration_ms,
                    summary: Some(summary),
                    error: None,
                }
            }
            Err(e) => {
                self.log.record(
                    LogEvent::error("scheduler.run", "task failed")
                        .meta("task", task.as_str())
                        .meta("duration_ms", duration_ms)
                        .meta("error", e.detail()),
                );
                TaskRunResponse {
                    task,
                    outcome: TaskOutcome::Failed,
                    duration_ms,
                    summary: None,
                    error: Some(e.to_body()),
                }
            }
        }
    }

    fn spawn_tick_loop(
        self: &Arc<Self>,
        task: ScheduledTask,
        period: Duration,
        runner: Arc<dyn TaskRunner>,
    ) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let run_scheduler = Arc::clone(&scheduler);
                let run_runner = Arc::clone(&runner);
                let run = tokio::spawn(async move {
                    run_scheduler.trigger(task, run_runner.as_ref()).await
                });
                if let Err(join_error) = run.await {
                    error!(task = task.as_str(), error = %join_error, "Scheduled task aborted");
                    scheduler.log.record(
                        LogEvent::critical("scheduler.run", "task panicked")
                            .meta("task", task.as_str())
                            .meta("error", join_error.to_string()),
                    );
                }
            }
        })
    }

    /// Run all tick loops until shutdown, re-spawning loops whose period
    /// changed when the schedule is updated.
    pub async fn run(
        self: Arc<Self>,
        runner: Arc<dyn TaskRunner>,
        mut schedule_rx: watch::Receiver<ScheduleConfig>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut active: Vec<(ScheduledTask, Duration, JoinHandle<()>)> = {
            let schedule = schedule_rx.borrow_and_update().clone();
            ScheduledTask::ALL
                .into_iter()
                .map(|task| {
                    let period = schedule.period(task);
                    (task, period, self.spawn_tick_loop(task, period, runner.clone()))
                })
                .collect()
        };
        info!("Scheduler started with {} task loops", active.len());

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                }

                Ok(()) = schedule_rx.changed() => {
                    let schedule = schedule_rx.borrow_and_update().clone();
                    for (task, period, handle) in active.iter_mut() {
                        let next = schedule.period(*task);
                        if next != *period {
                            handle.abort();
                            *handle = self.spawn_tick_loop(*task, next, runner.clone());
                            info!(task = task.as_str(), period_secs = next.as_secs(), "Rescheduled task");
                            *period = next;
                        }
                    }
                }

                else => break,
            }
        }

        for (_, _, handle) in active {
            handle.abort();
        }
        info!("Scheduler shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct CountingRunner {
        runs: [AtomicU32; 4],
        gate: Option<Arc<Notify>>,
        panic_on: Option<ScheduledTask>,
        fail_on: Option<ScheduledTask>,
    }

    impl CountingRunner {
        fn runs(&self, task: ScheduledTask) -> u32 {
            self.runs[slot(task)].load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskRunner for CountingRunner {
        async fn run_task(&self, task: ScheduledTask) -> Result<String, EngineError> {
            self.runs[slot(task)].fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.panic_on == Some(task) {
                panic!("runner blew up");
            }
            if self.fail_on == Some(task) {
                return Err(EngineError::StoreUnavailable {
                    detail: "down".to_string(),
                });
            }
            Ok(format!("ran {task}"))
        }
    }

    #[tokio::test]
    async fn overlapping_trigger_is_skipped() {
        let gate = Arc::new(Notify::new());
        let runner = Arc::new(CountingRunner {
            gate: Some(gate.clone()),
            ..CountingRunner::default()
        });
        let scheduler = Arc::new(TaskScheduler::new(Arc::new(OperationLog::new(100, 100))));

        let first = {
            let scheduler = scheduler.clone();
            let runner = runner.clone();
            tokio::spawn(async move {
                scheduler
                    .trigger(ScheduledTask::FailoverSweep, runner.as_ref())
                    .await
            })
        };
        while !scheduler.is_running(ScheduledTask::FailoverSweep) {
            tokio::task::yield_now().await;
        }

        let second = scheduler
            .trigger(ScheduledTask::FailoverSweep, runner.as_ref())
            .await;
        assert_eq!(second.outcome, TaskOutcome::Skipped);

        gate.notify_one();
        let first = first.await.unwrap();
        assert_eq!(first.outcome, TaskOutcome::Completed);
        assert_eq!(runner.runs(ScheduledTask::FailoverSweep), 1);
        assert!(!scheduler.is_running(ScheduledTask::FailoverSweep));
    }

    #[tokio::test]
    async fn failed_run_reports_error_body() {
        let runner = CountingRunner {
            fail_on: Some(ScheduledTask::WeeklyReconciliation),
            ..CountingRunner::default()
        };
        let log = Arc::new(OperationLog::new(100, 100));
        let scheduler = TaskScheduler::new(log.clone());
        let response = scheduler
            .trigger(ScheduledTask::WeeklyReconciliation, &runner)
            .await;
        assert_eq!(response.outcome, TaskOutcome::Failed);
        assert_eq!(
            response.error.unwrap().code,
            fanpay_sdk::objects::ErrorCode::StoreUnavailable
        );
        assert_eq!(log.summary().by_severity.error, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_task_does_not_stop_other_loops() {
        let runner = Arc::new(CountingRunner {
            panic_on: Some(ScheduledTask::DailyBatchPayouts),
            ..CountingRunner::default()
        });
        let schedule = ScheduleConfig {
            tier_recalculation_secs: 10_000,
            batch_payouts_secs: 90,
            reconciliation_secs: 10_000,
            failover_sweep_secs: 60,
        };
        let live = crate::config::LiveSchedule::new(schedule);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let log = Arc::new(OperationLog::new(100, 100));
        let scheduler = Arc::new(TaskScheduler::new(log.clone()));

        let handle = tokio::spawn(scheduler.clone().run(
            runner.clone(),
            live.subscribe(),
            shutdown_rx,
        ));
        tokio::time::sleep(Duration::from_secs(185)).await;

        assert_eq!(runner.runs(ScheduledTask::FailoverSweep), 3);
        assert_eq!(runner.runs(ScheduledTask::DailyBatchPayouts), 2);
        assert!(!scheduler.is_running(ScheduledTask::DailyBatchPayouts));
        assert_eq!(log.summary().by_severity.critical, 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
