pub mod schedule;

use std::{thread, time::Duration};

use chrono::{Local, NaiveDateTime};
use log::{error, info};

use crate::daemon::schedule::Schedule;

/// Shortest sleep between cycles, guards against clock skew busy-looping.
const MIN_SLEEP: Duration = Duration::from_secs(1);

/// Source of local wall-clock time and the way to wait for it.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
    fn sleep(&self, duration: Duration);
}

/// The machine's local clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Sleeping { until: NaiveDateTime },
    Executing,
}

/// Result of one scheduled wake-up.
#[derive(Debug)]
pub struct Cycle {
    pub scheduled_for: NaiveDateTime,
    /// The job's failure, already logged. `None` when it succeeded.
    pub error: Option<anyhow::Error>,
}

/// Runs a job at every time in a [`Schedule`], forever.
pub struct ScheduleEngine<C: Clock = SystemClock> {
    schedule: Schedule,
    clock: C,
    state: EngineState,
}

impl ScheduleEngine<SystemClock> {
    pub fn new(schedule: Schedule) -> Self {
        Self::with_clock(schedule, SystemClock)
    }
}

impl<C: Clock> ScheduleEngine<C> {
    pub fn with_clock(schedule: Schedule, clock: C) -> Self {
        Self {
            schedule,
            clock,
            state: EngineState::Idle,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Sleep until the next scheduled time, then run `job` once.
    /// A failing job is logged and reported, never propagated.
    pub fn tick<F>(&mut self, mut job: F) -> Cycle
    where
        F: FnMut() -> anyhow::Result<()>,
    {
        let now = self.clock.now();
        let next = self.schedule.next_run(now);
        let wait = (next - now).to_std().unwrap_or_default().max(MIN_SLEEP);
        info!("next run at {}", next.format("%Y-%m-%d %H:%M:%S"));

        self.state = EngineState::Sleeping { until: next };
        self.clock.sleep(wait);

        self.state = EngineState::Executing;
        let error = match job() {
            Ok(()) => None,
            Err(e) => {
                error!("scheduled run failed: {e:#}");
                Some(e)
            }
        };

        self.state = EngineState::Sleeping {
            until: self.schedule.next_run(self.clock.now()),
        };
        Cycle {
            scheduled_for: next,
            error,
        }
    }

    /// Loop forever. Stops only when the process is killed.
    pub fn run<F>(&mut self, mut job: F) -> !
    where
        F: FnMut() -> anyhow::Result<()>,
    {
        info!("scheduled mode active, send times: {}", self.schedule);
        loop {
            self.tick(&mut job);
        }
    }
}
