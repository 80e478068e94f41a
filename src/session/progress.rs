//! Cosmetic progress for an in-flight generation.
//!
//! Nothing here affects the result of a request. The controller only calls
//! [`ProgressIndicator::start`] and [`ProgressIndicator::finish`], so tests
//! can swap in [`StaticProgress`] and skip the timers entirely.

use crate::session::presets::LOADING_PHASES;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How often the caption advances.
pub const PHASE_INTERVAL: Duration = Duration::from_millis(1500);
/// How often the percentage advances.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(50);
/// The percentage never passes this while generating.
pub const PROGRESS_CEILING: f64 = 99.0;
/// Once reached, the percentage stops moving until the request settles.
const PROGRESS_PLATEAU: f64 = 98.0;

/// Point-in-time view of the indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Index into [`LOADING_PHASES`].
    pub phase: usize,
    /// 0 to 100. Reaches 100 only once the request has settled.
    pub percent: f64,
}

impl ProgressSnapshot {
    /// Indicator state before any request or after one settles.
    pub const IDLE: Self = Self {
        phase: 0,
        percent: 100.0,
    };

    /// Indicator state at the start of a request.
    pub const STARTED: Self = Self {
        phase: 0,
        percent: 0.0,
    };

    /// Caption for the current phase.
    pub fn caption(&self) -> &'static str {
        LOADING_PHASES[self.phase % LOADING_PHASES.len()]
    }
}

/// A progress display driven by the session controller.
pub trait ProgressIndicator: Send + Sync {
    /// Called when a request enters flight. Resets to [`ProgressSnapshot::STARTED`].
    fn start(&self);

    /// Called on every exit from flight. Stops any timers and jumps to 100.
    fn finish(&self);

    /// Current state.
    fn snapshot(&self) -> ProgressSnapshot;
}

/// One 50 ms step of the simulated percentage.
///
/// Steps are large early and shrink as the value nears the ceiling; `noise`
/// is expected in `[0, 2)`.
pub fn advance(prev: f64, noise: f64) -> f64 {
    if prev >= PROGRESS_PLATEAU {
        return prev;
    }
    let remaining = 100.0 - prev;
    let boost = if prev < 30.0 { 0.5 } else { 0.05 };
    let increment = (remaining * 0.02 + boost + noise).max(0.05);
    (prev + increment).min(PROGRESS_CEILING)
}

/// Timer-driven indicator: cycles captions and creeps the percentage toward 99.
pub struct SimulatedProgress {
    state: Arc<Mutex<ProgressSnapshot>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    phase_interval: Duration,
    progress_interval: Duration,
}

impl SimulatedProgress {
    /// Creates an idle indicator with the default intervals.
    pub fn new() -> Self {
        Self::with_intervals(PHASE_INTERVAL, PROGRESS_INTERVAL)
    }

    /// Creates an idle indicator with custom intervals.
    pub fn with_intervals(phase_interval: Duration, progress_interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProgressSnapshot::IDLE)),
            tasks: Mutex::new(Vec::new()),
            phase_interval,
            progress_interval,
        }
    }

    fn stop_timers(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Default for SimulatedProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressIndicator for SimulatedProgress {
    fn start(&self) {
        self.stop_timers();
        *self.state.lock() = ProgressSnapshot::STARTED;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no tokio runtime, progress timers disabled");
            return;
        };

        let state = Arc::clone(&self.state);
        let period = self.phase_interval;
        let phases = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut s = state.lock();
                s.phase = (s.phase + 1) % LOADING_PHASES.len();
            }
        });

        let state = Arc::clone(&self.state);
        let period = self.progress_interval;
        let percent = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let noise = rand::random::<f64>() * 2.0;
                let mut s = state.lock();
                s.percent = advance(s.percent, noise);
            }
        });

        self.tasks.lock().extend([phases, percent]);
    }

    fn finish(&self) {
        self.stop_timers();
        self.state.lock().percent = 100.0;
    }

    fn snapshot(&self) -> ProgressSnapshot {
        *self.state.lock()
    }
}

impl Drop for SimulatedProgress {
    fn drop(&mut self) {
        self.stop_timers();
    }
}

/// Indicator without timers: 0 while in flight, 100 otherwise.
#[derive(Debug)]
pub struct StaticProgress {
    state: Mutex<ProgressSnapshot>,
}

impl StaticProgress {
    /// Creates an idle indicator.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProgressSnapshot::IDLE),
        }
    }
}

impl Default for StaticProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressIndicator for StaticProgress {
    fn start(&self) {
        *self.state.lock() = ProgressSnapshot::STARTED;
    }

    fn finish(&self) {
        self.state.lock().percent = 100.0;
    }

    fn snapshot(&self) -> ProgressSnapshot {
        *self.state.lock()
    }
}
