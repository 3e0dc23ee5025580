//! Drives the pipeline once or on a fixed polling interval.

use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::pipeline::{CycleReport, Mode, Pipeline};
use crate::signal::ShutdownToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Single cycle, then exit
    Once,
    /// Single cycle without touching disk
    DryRun,
    /// Repeat until shutdown
    Every(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Terminated,
}

pub struct Scheduler {
    pipeline: Pipeline,
    schedule: Schedule,
    shutdown: ShutdownToken,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline, schedule: Schedule, shutdown: ShutdownToken) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            pipeline,
            schedule,
            shutdown,
            state,
        }
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Run according to the schedule.
    ///
    /// `Once` and `DryRun` return the cycle's error, if any. `Every` logs
    /// failed cycles and keeps going until the shutdown token is cancelled,
    /// then returns the last successful report.
    pub async fn run(&self) -> Result<Option<CycleReport>> {
        let result = match self.schedule {
            Schedule::Once => self.cycle(Mode::Apply).await.map(Some),
            Schedule::DryRun => self.cycle(Mode::DryRun).await.map(Some),
            Schedule::Every(period) => Ok(self.every(period).await),
        };
        self.state.send_replace(SchedulerState::Terminated);
        result
    }

    async fn cycle(&self, mode: Mode) -> Result<CycleReport> {
        self.state.send_replace(SchedulerState::Running);
        let result = self.pipeline.run_cycle(mode).await;
        self.state.send_replace(SchedulerState::Idle);
        result
    }

    async fn every(&self, period: Duration) -> Option<CycleReport> {
        info!("Polling every {:?}", period);
        let mut interval = tokio::time::interval(period);
        // An overrunning cycle delays the next tick instead of bunching them
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = None;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            match self.cycle(Mode::Apply).await {
                Ok(report) => last = Some(report),
                Err(e) => error!("Cycle failed, previous output kept: {:#}", e),
            }
        }

        info!("Shutting down");
        last
    }
}
