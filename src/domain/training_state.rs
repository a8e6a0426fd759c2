// ============================================================
// Layer 3 — Training State (early stopping)
// ============================================================
// Tracks the best validation loss seen so far and how many
// epochs in a row have failed to beat it.
//
//   Running ──▶ Improved ──▶ ... ──▶ Stalled ──▶ Stopped
//
//   - val_loss < best_val_loss  → Improved, tolerance = 0
//   - otherwise (NaN included)  → Stalled,  tolerance += 1
//   - tolerance >= max          → Stopped
//
// The state is a value: the trainer passes it into each
// observation and gets the next state back, so it can be
// unit-tested without a model or a GPU.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Running,
    Improved,
    Stalled,
    Stopped,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Running  => "running",
            Phase::Improved => "improved",
            Phase::Stalled  => "stalled",
            Phase::Stopped  => "stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    pub best_val_loss: f64,
    pub best_epoch:    Option<usize>,
    pub tolerance:     usize,
    pub phase:         Phase,
}

impl Default for TrainingState {
    fn default() -> Self {
        Self {
            best_val_loss: f64::INFINITY,
            best_epoch:    None,
            tolerance:     0,
            phase:         Phase::Running,
        }
    }
}

impl TrainingState {
    /// Fold one epoch's validation loss into the state.
    pub fn observe(self, epoch: usize, val_loss: f64, max_tolerance: usize) -> Self {
        let mut next = if val_loss < self.best_val_loss {
            Self {
                best_val_loss: val_loss,
                best_epoch:    Some(epoch),
                tolerance:     0,
                phase:         Phase::Improved,
            }
        } else {
            Self {
                tolerance: self.tolerance + 1,
                phase:     Phase::Stalled,
                ..self
            }
        };

        if next.tolerance >= max_tolerance {
            next.phase = Phase::Stopped;
        }
        next
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == Phase::Stopped
    }
}

/// Checkpoint schedule: enabled, not the first epoch, and
/// `(epoch + 1)` a multiple of `interval`. Epochs are 0-based.
pub fn should_checkpoint(save_checkpoints: bool, epoch: usize, interval: usize) -> bool {
    save_checkpoints && epoch != 0 && interval > 0 && (epoch + 1) % interval == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let s = TrainingState::default();
        assert!(s.best_val_loss.is_infinite());
        assert_eq!(s.tolerance, 0);
        assert_eq!(s.phase, Phase::Running);
    }

    #[test]
    fn test_improvement_resets_tolerance() {
        let s = TrainingState::default()
            .observe(0, 1.0, 5)
            .observe(1, 1.5, 5)
            .observe(2, 1.2, 5);
        assert_eq!(s.tolerance, 2);
        assert_eq!(s.phase, Phase::Stalled);

        let s = s.observe(3, 0.9, 5);
        assert_eq!(s.tolerance, 0);
        assert_eq!(s.best_epoch, Some(3));
        assert_eq!(s.phase, Phase::Improved);
    }

    #[test]
    fn test_equal_loss_is_not_an_improvement() {
        let s = TrainingState::default().observe(0, 1.0, 5).observe(1, 1.0, 5);
        assert_eq!(s.tolerance, 1);
        assert_eq!(s.best_epoch, Some(0));
    }

    #[test]
    fn test_nan_loss_stalls() {
        let s = TrainingState::default().observe(0, f64::NAN, 5);
        assert_eq!(s.tolerance, 1);
        assert_eq!(s.best_epoch, None);
    }

    #[test]
    fn test_stops_at_max_tolerance() {
        let mut s = TrainingState::default().observe(0, 1.0, 3);
        let mut stopped_at = None;
        for epoch in 1..10 {
            s = s.observe(epoch, 2.0, 3);
            if s.is_stopped() {
                stopped_at = Some(epoch);
                break;
            }
        }
        // Three non-improving epochs after the best one
        assert_eq!(stopped_at, Some(3));
        assert_eq!(s.best_epoch, Some(0));
    }

    #[test]
    fn test_tolerance_monotonic_between_improvements() {
        let losses = [3.0, 2.0, 2.5, 2.6, 1.0, 1.1, 1.2];
        let mut s = TrainingState::default();
        let mut prev = 0;
        for (epoch, loss) in losses.iter().enumerate() {
            s = s.observe(epoch, *loss, 100);
            if s.phase == Phase::Improved {
                assert_eq!(s.tolerance, 0);
            } else {
                assert_eq!(s.tolerance, prev + 1);
            }
            prev = s.tolerance;
        }
    }

    #[test]
    fn test_checkpoint_schedule_four_epochs_interval_two() {
        let epochs: Vec<usize> = (0..4).filter(|&e| should_checkpoint(true, e, 2)).collect();
        assert_eq!(epochs, vec![1, 3]);
    }

    #[test]
    fn test_checkpoint_schedule_skips_first_epoch() {
        assert!(!should_checkpoint(true, 0, 1));
        assert!(should_checkpoint(true, 1, 1));
    }

    #[test]
    fn test_checkpoint_schedule_disabled() {
        assert!((0..10).all(|e| !should_checkpoint(false, e, 1)));
        assert!((0..10).all(|e| !should_checkpoint(true, e, 0)));
    }
}
