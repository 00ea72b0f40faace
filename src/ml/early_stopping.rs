// ============================================================
// Layer 5 — Early Stopping
// ============================================================
// Watches validation loss once per epoch:
//
//   improved        → remember it, reset the wait counter
//   not improved    → wait one more epoch
//   waited patience → stop
//
// An epoch counts as improved only if its loss is lower than
// the best seen so far by more than `min_delta`. NaN never
// improves.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// New best loss; save a checkpoint
    Improved,
    /// No improvement yet, keep training
    Wait,
    /// Patience exhausted
    Stop,
}

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience:   usize,
    min_delta:  f64,
    best:       f64,
    best_epoch: Option<usize>,
    waited:     usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self { patience, min_delta: 0.0, best: f64::INFINITY, best_epoch: None, waited: 0 }
    }

    pub fn with_min_delta(mut self, min_delta: f64) -> Self {
        self.min_delta = min_delta.max(0.0);
        self
    }

    pub fn update(&mut self, epoch: usize, val_loss: f64) -> Verdict {
        if val_loss < self.best - self.min_delta {
            self.best       = val_loss;
            self.best_epoch = Some(epoch);
            self.waited     = 0;
            return Verdict::Improved;
        }
        self.waited += 1;
        if self.waited >= self.patience {
            Verdict::Stop
        } else {
            Verdict::Wait
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_after_patience_epochs_without_improvement() {
        let mut es = EarlyStopping::new(3);
        assert_eq!(es.update(1, 1.0), Verdict::Improved);
        assert_eq!(es.update(2, 0.8), Verdict::Improved);
        assert_eq!(es.update(3, 0.9), Verdict::Wait);
        assert_eq!(es.update(4, 0.8), Verdict::Wait);
        assert_eq!(es.update(5, 1.2), Verdict::Stop);
        assert_eq!(es.best_epoch(), Some(2));
        assert_eq!(es.best_loss(), 0.8);
    }

    #[test]
    fn test_improvement_resets_counter() {
        let mut es = EarlyStopping::new(2);
        es.update(1, 1.0);
        assert_eq!(es.update(2, 1.5), Verdict::Wait);
        assert_eq!(es.update(3, 0.5), Verdict::Improved);
        assert_eq!(es.update(4, 0.6), Verdict::Wait);
        assert_eq!(es.update(5, 0.7), Verdict::Stop);
    }

    #[test]
    fn test_nan_never_improves() {
        let mut es = EarlyStopping::new(1);
        assert_eq!(es.update(1, f64::NAN), Verdict::Stop);
        assert_eq!(es.best_epoch(), None);
    }

    #[test]
    fn test_min_delta() {
        let mut es = EarlyStopping::new(5).with_min_delta(0.1);
        es.update(1, 1.0);
        assert_eq!(es.update(2, 0.95), Verdict::Wait);
        assert_eq!(es.update(3, 0.85), Verdict::Improved);
    }

    #[test]
    fn test_zero_patience_stops_on_first_miss() {
        let mut es = EarlyStopping::new(0);
        assert_eq!(es.update(1, 1.0), Verdict::Improved);
        assert_eq!(es.update(2, 1.0), Verdict::Stop);
    }
}
