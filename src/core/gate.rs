//! Readiness gate between the caller input loop and the session task.
//!
//! The session task owns a [`ReadySignal`] and raises it once, when the
//! provider acknowledges the configuration. The input loop owns the
//! [`ReadinessGate`] and waits on it, bounded, before forwarding each audio or
//! content unit.

use std::time::Duration;

use tokio::sync::watch;

/// Default bound on how long a single unit waits for readiness.
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of waiting on the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Session is ready; the unit may be forwarded.
    Ready,
    /// The wait exceeded its bound; the unit must be dropped.
    TimedOut,
    /// The session ended before becoming ready; the unit must be dropped.
    Closed,
}

/// Write side of the gate, held by the session task.
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

impl ReadySignal {
    /// Open the gate. Later calls are no-ops.
    pub fn set_ready(&self) {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });
    }

    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Read side of the gate, held by the input loop.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    rx: watch::Receiver<bool>,
}

impl ReadinessGate {
    /// Create a closed gate and the signal that opens it.
    pub fn new() -> (ReadySignal, ReadinessGate) {
        let (tx, rx) = watch::channel(false);
        (ReadySignal { tx }, ReadinessGate { rx })
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the session is ready, at most `timeout`.
    ///
    /// A zero timeout never suspends.
    pub async fn await_ready(&mut self, timeout: Duration) -> GateOutcome {
        if self.is_ready() {
            return GateOutcome::Ready;
        }
        if timeout.is_zero() {
            return GateOutcome::TimedOut;
        }

        match tokio::time::timeout(timeout, self.rx.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => GateOutcome::Ready,
            Ok(Err(_)) => GateOutcome::Closed,
            Err(_) => GateOutcome::TimedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_gate_passes_immediately() {
        let (signal, mut gate) = ReadinessGate::new();
        signal.set_ready();
        assert_eq!(gate.await_ready(Duration::ZERO).await, GateOutcome::Ready);
    }

    #[tokio::test]
    async fn test_zero_timeout_never_waits() {
        let (_signal, mut gate) = ReadinessGate::new();
        assert_eq!(gate.await_ready(Duration::ZERO).await, GateOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_never_ready() {
        let (_signal, mut gate) = ReadinessGate::new();
        let outcome = gate.await_ready(Duration::from_millis(50)).await;
        assert_eq!(outcome, GateOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_waiter_released_when_ready_is_set() {
        let (signal, mut gate) = ReadinessGate::new();
        let waiter = tokio::spawn(async move { gate.await_ready(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.set_ready();
        assert_eq!(waiter.await.unwrap(), GateOutcome::Ready);
    }

    #[tokio::test]
    async fn test_dropped_signal_closes_gate() {
        let (signal, mut gate) = ReadinessGate::new();
        drop(signal);
        assert_eq!(
            gate.await_ready(Duration::from_secs(5)).await,
            GateOutcome::Closed
        );
    }

    #[tokio::test]
    async fn test_set_ready_is_idempotent() {
        let (signal, gate) = ReadinessGate::new();
        signal.set_ready();
        signal.set_ready();
        assert!(signal.is_ready());
        assert!(gate.is_ready());
    }
}
