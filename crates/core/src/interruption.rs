//! Screen-share interruption tracking.

use std::time::Duration;
use tokio::time::Instant;

/// The deadline only exists while a share is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenShare {
    Present,
    LostAwaitingRecovery { deadline: Instant, epoch: u64 },
    /// Absorbing.
    Terminated,
}

#[derive(Debug)]
pub struct InterruptionMachine {
    state: ScreenShare,
    recovery_timeout: Duration,
    epochs: u64,
}

impl InterruptionMachine {
    pub fn new(recovery_timeout: Duration) -> Self {
        Self {
            state: ScreenShare::Present,
            recovery_timeout,
            epochs: 0,
        }
    }

    pub fn state(&self) -> ScreenShare {
        self.state
    }

    /// Returns the new deadline, or `None` if the share was not present.
    pub fn share_lost(&mut self, now: Instant) -> Option<Instant> {
        if self.state != ScreenShare::Present {
            return None;
        }
        self.epochs += 1;
        let deadline = now + self.recovery_timeout;
        self.state = ScreenShare::LostAwaitingRecovery {
            deadline,
            epoch: self.epochs,
        };
        Some(deadline)
    }

    /// Returns `true` if a lost share was recovered.
    pub fn share_restored(&mut self) -> bool {
        if !self.is_awaiting_recovery() {
            return false;
        }
        self.state = ScreenShare::Present;
        true
    }

    /// The pending deadline and the loss it belongs to.
    pub fn deadline(&self) -> Option<(Instant, u64)> {
        match self.state {
            ScreenShare::LostAwaitingRecovery { deadline, epoch } => Some((deadline, epoch)),
            _ => None,
        }
    }

    /// Moves to `Terminated` if `epoch` is still the current loss and its
    /// deadline has passed. Stale or early firings are ignored.
    pub fn deadline_elapsed(&mut self, epoch: u64, now: Instant) -> bool {
        match self.state {
            ScreenShare::LostAwaitingRecovery {
                deadline,
                epoch: current,
            } if current == epoch && now >= deadline => {
                self.state = ScreenShare::Terminated;
                true
            }
            _ => false,
        }
    }

    pub fn terminate(&mut self) {
        self.state = ScreenShare::Terminated;
    }

    pub fn is_awaiting_recovery(&self) -> bool {
        matches!(self.state, ScreenShare::LostAwaitingRecovery { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn restore_before_deadline_prevents_termination() {
        let mut machine = InterruptionMachine::new(TIMEOUT);
        let start = Instant::now();
        let deadline = machine.share_lost(start).unwrap();
        let (_, epoch) = machine.deadline().unwrap();
        assert_eq!(deadline, start + TIMEOUT);

        assert!(machine.share_restored());
        assert!(!machine.deadline_elapsed(epoch, start + Duration::from_secs(31)));
        assert_eq!(machine.state(), ScreenShare::Present);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_epoch_is_ignored_after_second_loss() {
        let mut machine = InterruptionMachine::new(TIMEOUT);
        let start = Instant::now();
        machine.share_lost(start);
        let (_, first) = machine.deadline().unwrap();
        machine.share_restored();

        machine.share_lost(start + Duration::from_secs(20));
        let (deadline, second) = machine.deadline().unwrap();
        assert_ne!(first, second);

        assert!(!machine.deadline_elapsed(first, start + Duration::from_secs(30)));
        assert!(machine.is_awaiting_recovery());
        assert!(machine.deadline_elapsed(second, deadline));
        assert_eq!(machine.state(), ScreenShare::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn terminated_is_absorbing() {
        let mut machine = InterruptionMachine::new(TIMEOUT);
        machine.terminate();
        assert_eq!(machine.share_lost(Instant::now()), None);
        assert!(!machine.share_restored());
        assert_eq!(machine.state(), ScreenShare::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn redundant_signals_are_no_ops() {
        let mut machine = InterruptionMachine::new(TIMEOUT);
        assert!(!machine.share_restored());

        let now = Instant::now();
        let deadline = machine.share_lost(now);
        assert!(deadline.is_some());
        assert_eq!(machine.share_lost(now + Duration::from_secs(5)), None);
        assert_eq!(machine.deadline().map(|(d, _)| d), deadline);
        assert!(!machine.deadline_elapsed(1, now + Duration::from_secs(29)));
    }
}
