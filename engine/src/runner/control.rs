//! Cross-task control of a running strategy loop

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Lifecycle phase of the strategy loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopPhase {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl LoopPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LoopPhase::Running,
            2 => LoopPhase::Paused,
            3 => LoopPhase::Stopped,
            _ => LoopPhase::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LoopPhase::Idle => 0,
            LoopPhase::Running => 1,
            LoopPhase::Paused => 2,
            LoopPhase::Stopped => 3,
        }
    }
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopPhase::Idle => "idle",
            LoopPhase::Running => "running",
            LoopPhase::Paused => "paused",
            LoopPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the loop, published after every iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub last_price: Option<f64>,
    pub available_balance: Option<f64>,
    pub floating_profit: f64,
    pub open_positions: usize,
    pub pending_orders: usize,
    pub trades_total: u64,
}

#[derive(Debug)]
struct ControlFlags {
    paused: AtomicBool,
    phase: AtomicU8,
    cancel: CancellationToken,
}

/// Cloneable handle for pausing, resuming and stopping the loop from any task
#[derive(Debug, Clone)]
pub struct StrategyHandle {
    flags: Arc<ControlFlags>,
    status: watch::Receiver<StatusReport>,
}

impl StrategyHandle {
    pub(crate) fn new() -> (Self, watch::Sender<StatusReport>) {
        let (tx, rx) = watch::channel(StatusReport::default());
        let handle = Self {
            flags: Arc::new(ControlFlags {
                paused: AtomicBool::new(false),
                phase: AtomicU8::new(LoopPhase::Idle.as_u8()),
                cancel: CancellationToken::new(),
            }),
            status: rx,
        };
        (handle, tx)
    }

    /// Stop opening and managing positions until `resume`
    pub fn pause(&self) {
        if !self.flags.paused.swap(true, Ordering::SeqCst) {
            info!("Strategy pause requested");
        }
    }

    pub fn resume(&self) {
        if self.flags.paused.swap(false, Ordering::SeqCst) {
            info!("Strategy resume requested");
        }
    }

    /// Ask the loop to exit; it finishes the current step first
    pub fn stop(&self) {
        info!("Strategy stop requested");
        self.flags.cancel.cancel();
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.flags.cancel.is_cancelled()
    }

    pub fn phase(&self) -> LoopPhase {
        LoopPhase::from_u8(self.flags.phase.load(Ordering::SeqCst))
    }

    pub(crate) fn set_phase(&self, phase: LoopPhase) {
        let previous = self.flags.phase.swap(phase.as_u8(), Ordering::SeqCst);
        if previous != phase.as_u8() {
            info!("Strategy phase: {} -> {}", LoopPhase::from_u8(previous), phase);
        }
    }

    /// Latest status published by the loop
    pub fn status(&self) -> StatusReport {
        self.status.borrow().clone()
    }

    /// Token cancelled by `stop`; other tasks may share it for shutdown
    pub fn cancellation_token(&self) -> CancellationToken {
        self.flags.cancel.clone()
    }
}
