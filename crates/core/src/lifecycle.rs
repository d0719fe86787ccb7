//! Gateway lifecycle state
//!
//! `Starting → Ready → ShuttingDown → Terminated`. Shutdown can be entered
//! from `Starting` as well (bind failure, early child exit); a second shutdown
//! trigger is ignored.

use std::sync::atomic::{AtomicU8, Ordering};

/// Phase of the gateway process
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LifecyclePhase {
    /// Child spawn and listener bind in progress
    Starting = 0,
    /// Child running and listener accepting upgrades
    Ready = 1,
    /// Closing connections and killing the child
    ShuttingDown = 2,
    /// Cleanup finished; the process is about to exit
    Terminated = 3,
}

impl LifecyclePhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Ready,
            2 => Self::ShuttingDown,
            _ => Self::Terminated,
        }
    }
}

/// What caused the gateway to shut down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// OS termination signal
    Signal(&'static str),
    /// The child process exited on its own
    ChildExited {
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// Unrecoverable internal error, e.g. the listener failed
    Fatal(String),
}

impl ShutdownReason {
    /// Exit code for the gateway process
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Signal(_) => 0,
            Self::ChildExited { code, .. } => code.unwrap_or(1),
            Self::Fatal(_) => 1,
        }
    }
}

/// Lock-free lifecycle state shared by the HTTP handlers and the controller
#[derive(Debug)]
pub struct Lifecycle {
    phase: AtomicU8,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(LifecyclePhase::Starting as u8),
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Readiness flag consumed by health checks
    pub fn is_ready(&self) -> bool {
        self.phase() == LifecyclePhase::Ready
    }

    pub fn is_shutting_down(&self) -> bool {
        self.phase() >= LifecyclePhase::ShuttingDown
    }

    /// `Starting → Ready`. Returns false if shutdown already began.
    pub fn mark_ready(&self) -> bool {
        self.transition(LifecyclePhase::Starting, LifecyclePhase::Ready)
    }

    /// Enter `ShuttingDown`. Returns true only for the call that made the
    /// transition.
    pub fn begin_shutdown(&self) -> bool {
        self.phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (raw < LifecyclePhase::ShuttingDown as u8)
                    .then_some(LifecyclePhase::ShuttingDown as u8)
            })
            .is_ok()
    }

    pub fn mark_terminated(&self) {
        self.phase
            .store(LifecyclePhase::Terminated as u8, Ordering::Release);
    }

    fn transition(&self, from: LifecyclePhase, to: LifecyclePhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
