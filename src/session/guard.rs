//! Programmatic seek guard
//!
//! While any undo is still settling, position changes must not be classified
//! as scrubs. Each undo takes a ticket and hands it back when its settle delay
//! expires; the guard stays active until every outstanding ticket is back.
//! `reset` invalidates all outstanding tickets, so a timer that fires after a
//! teardown cannot touch the next attachment's guard.

/// Reference-counted guard over in-flight programmatic seeks
#[derive(Debug, Default)]
pub struct ProgrammaticSeekGuard {
    in_flight: u32,
    epoch: u64,
}

/// Proof of one in-flight programmatic seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a ticket that is never released keeps the guard active"]
pub struct GuardTicket {
    epoch: u64,
}

impl ProgrammaticSeekGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.in_flight > 0
    }

    pub fn acquire(&mut self) -> GuardTicket {
        self.in_flight += 1;
        GuardTicket { epoch: self.epoch }
    }

    /// Hand a ticket back
    ///
    /// Returns false for a ticket issued before the last `reset`.
    pub fn release(&mut self, ticket: GuardTicket) -> bool {
        if ticket.epoch != self.epoch {
            return false;
        }
        self.in_flight = self.in_flight.saturating_sub(1);
        true
    }

    /// Drop every outstanding ticket
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.in_flight = 0;
    }
}
