use std::time::{Duration, Instant};

/// Why a refresh was not started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSkip {
    /// The previous run for this loop is still outstanding.
    InFlight,
    /// Less than the cooldown has elapsed since the last completed run.
    Cooldown,
}

/// Minimum-spacing and overlap guard for one refresh loop.
///
/// `try_begin`/`complete` bracket the loop body. Overlapping begins are
/// always rejected; a begin inside the cooldown after the last completed
/// run is skipped unless the caller is a manual refresh. One gate per
/// loop bounds backend load no matter how many consumers are mounted.
#[derive(Debug)]
pub struct RefreshGate {
    cooldown: Duration,
    last_completed: Option<Instant>,
    in_flight: bool,
}

impl RefreshGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_completed: None,
            in_flight: false,
        }
    }

    /// Manual refresh bypasses the cooldown but never the overlap latch.
    pub fn try_begin(&mut self, manual: bool) -> Result<(), GateSkip> {
        if self.in_flight {
            return Err(GateSkip::InFlight);
        }
        if !manual {
            if let Some(done) = self.last_completed {
                if done.elapsed() < self.cooldown {
                    return Err(GateSkip::Cooldown);
                }
            }
        }
        self.in_flight = true;
        Ok(())
    }

    /// Marks the run finished, success or failure alike. The cooldown is
    /// measured from completion, not from start.
    pub fn complete(&mut self) {
        self.in_flight = false;
        self.last_completed = Some(Instant::now());
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}
