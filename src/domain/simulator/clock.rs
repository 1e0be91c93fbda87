/// Monotonic simulation clock in seconds.
#[derive(Debug, Clone, Default)]
pub struct SimulationClock {
    now: f64,
}

impl SimulationClock {
    pub fn new(start: f64) -> Self {
        SimulationClock { now: start }
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Moves the clock forward to `time`. Requests to go backwards are ignored.
    ///
    /// # Returns
    /// `true` if the clock actually moved.
    pub fn advance_to(&mut self, time: f64) -> bool {
        if time > self.now {
            self.now = time;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_never_moves_backwards() {
        let mut clock = SimulationClock::new(5.0);
        assert!(clock.advance_to(10.0));
        assert!(!clock.advance_to(7.0));
        assert_eq!(clock.now(), 10.0);
        assert!(!clock.advance_to(10.0));
    }
}
