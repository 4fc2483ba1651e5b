//! Daily time-of-day scheduler.
//!
//! Tasks are registered once, before the run starts, with a wall-clock time
//! ("HH:MM"). Each task carries its own per-day state machine:
//!
//! ```text
//! WaitingForDay ──(trading day begins)──▶ WaitingForTime ──(time reached)──▶ FiredToday
//!       ▲                                                                        │
//!       └───────────────────────────(date changes)───────────────────────────────┘
//! ```
//!
//! A task fires on the first step of a trading day whose time is at or after
//! its configured time, so a gap at the exact minute delays the firing rather
//! than skipping it. Tasks due on the same step fire in registration order.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::calendar::TradingCalendar;
use crate::error::SetupError;

/// Caller-chosen name identifying a scheduled task. Must be unique.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskHandle {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TaskHandle {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Registration index of a task. Lower ids fire first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A wall-clock time at minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// Parse a strict zero-padded "HH:MM" string.
    pub fn parse(s: &str) -> Result<Self, SetupError> {
        let malformed = || SetupError::MalformedTimeOfDay(s.to_string());
        let bytes = s.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(malformed());
        }
        let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(malformed());
        }
        let hour = u32::from(bytes[0] - b'0') * 10 + u32::from(bytes[1] - b'0');
        let minute = u32::from(bytes[3] - b'0') * 10 + u32::from(bytes[4] - b'0');
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(malformed)
    }

    pub fn time(self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// Per-day firing state of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    WaitingForDay,
    WaitingForTime,
    FiredToday,
}

#[derive(Debug, Clone)]
struct ScheduledTask {
    handle: TaskHandle,
    time: TimeOfDay,
    state: TaskState,
    /// Date the current state applies to.
    day: Option<NaiveDate>,
}

/// One task firing, as recorded in the run's firing log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFiring {
    pub timestamp: NaiveDateTime,
    pub task: TaskHandle,
}

/// Engine-owned registry of daily tasks.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
    started: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task to fire once per trading day at `time` ("HH:MM").
    pub fn register_daily(
        &mut self,
        handle: impl Into<TaskHandle>,
        time: &str,
    ) -> Result<TaskId, SetupError> {
        let handle = handle.into();
        if self.started {
            return Err(SetupError::RegistrationClosed(handle.0));
        }
        let time = TimeOfDay::parse(time)?;
        if self.tasks.iter().any(|t| t.handle == handle) {
            return Err(SetupError::DuplicateTask(handle.0));
        }

        let id = TaskId(self.tasks.len());
        self.tasks.push(ScheduledTask {
            handle,
            time,
            state: TaskState::WaitingForDay,
            day: None,
        });
        Ok(id)
    }

    /// Freeze the registry. Later registrations fail with `RegistrationClosed`.
    pub fn start(&mut self) {
        self.started = true;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn handle(&self, id: TaskId) -> Option<&TaskHandle> {
        self.tasks.get(id.0).map(|t| &t.handle)
    }

    pub fn time_of(&self, id: TaskId) -> Option<TimeOfDay> {
        self.tasks.get(id.0).map(|t| t.time)
    }

    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(id.0).map(|t| t.state)
    }

    /// Advance every task's state machine to `timestamp` and return the tasks
    /// that fire on this step, in registration order.
    ///
    /// Returned tasks are already marked `FiredToday`; calling again with a
    /// later timestamp on the same date will not return them again.
    pub fn due(
        &mut self,
        timestamp: NaiveDateTime,
        calendar: &dyn TradingCalendar,
    ) -> Vec<TaskId> {
        let date = timestamp.date();
        let trading = calendar.is_trading_day(date);
        let now = timestamp.time();
        let mut fired = Vec::new();

        for (index, task) in self.tasks.iter_mut().enumerate() {
            if task.day != Some(date) {
                task.day = Some(date);
                task.state = if trading {
                    TaskState::WaitingForTime
                } else {
                    TaskState::WaitingForDay
                };
            }

            if task.state == TaskState::WaitingForTime && task.time.time() <= now {
                task.state = TaskState::FiredToday;
                fired.push(TaskId(index));
            }
        }

        fired
    }
}
