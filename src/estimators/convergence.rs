
use crate::data_types::parameters::ConvergenceSettings;

/// What the caller should do after reporting a value to a convergence tracker
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConvergenceState {
    /// The sequence has stabilized within tolerance, stop and use the value
    Converged,
    /// Keep iterating
    Continue,
    /// The attempt budget ran out without stabilizing; callers fall back to 0.0 with a warning
    Exhausted
}

/// Tracks successive values of an iterative calculation against a `ConvergenceSettings`
/// window: converged once consecutive values differ by less than the tolerance (after the
/// minimum attempt count), exhausted once the maximum attempt count is spent.
#[derive(Clone, Debug)]
pub struct ConvergenceWindow {
    settings: ConvergenceSettings,
    attempts: usize,
    previous: Option<f64>
}

impl ConvergenceWindow {
    /// Constructor
    pub fn new(settings: ConvergenceSettings) -> Self {
        Self {
            settings,
            attempts: 0,
            previous: None
        }
    }

    /// Reports the next value in the sequence and returns the resulting state
    /// # Arguments
    /// * `value` - the latest iterate
    pub fn update(&mut self, value: f64) -> ConvergenceState {
        self.attempts += 1;

        let state = match self.previous {
            Some(previous) if self.attempts >= self.settings.min_attempts()
                && (value - previous).abs() < self.settings.tolerance() => ConvergenceState::Converged,
            _ if self.attempts >= self.settings.max_attempts() => ConvergenceState::Exhausted,
            _ => ConvergenceState::Continue
        };

        self.previous = Some(value);
        state
    }

    // getters
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

/// Restart-level tracker: each random restart contributes one estimate sample, and the
/// quantity that must stabilize is the running mean of those samples. The stabilized mean
/// is the final estimate.
#[derive(Clone, Debug)]
pub struct RestartTracker {
    window: ConvergenceWindow,
    sample_sum: f64,
    sample_count: usize
}

impl RestartTracker {
    /// Constructor
    pub fn new(settings: ConvergenceSettings) -> Self {
        Self {
            window: ConvergenceWindow::new(settings),
            sample_sum: 0.0,
            sample_count: 0
        }
    }

    /// Folds one restart's estimate into the running mean and reports the state
    /// # Arguments
    /// * `sample` - the estimate produced by one restart
    pub fn add_sample(&mut self, sample: f64) -> ConvergenceState {
        self.sample_sum += sample;
        self.sample_count += 1;
        self.window.update(self.mean())
    }

    /// The running mean across all restarts so far
    pub fn mean(&self) -> f64 {
        if self.sample_count == 0 {
            0.0
        } else {
            self.sample_sum / self.sample_count as f64
        }
    }

    // getters
    pub fn restarts(&self) -> usize {
        self.sample_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    #[test]
    fn test_window_converges() {
        let settings = ConvergenceSettings::new(3, 10, 1e-3);
        let mut window = ConvergenceWindow::new(settings);

        // two identical values early do not converge before the minimum
        assert_eq!(window.update(0.5), ConvergenceState::Continue);
        assert_eq!(window.update(0.5), ConvergenceState::Continue);
        // at the minimum attempt count, a stable value converges
        assert_eq!(window.update(0.5), ConvergenceState::Converged);
    }

    #[test]
    fn test_window_exhausts() {
        let settings = ConvergenceSettings::new(1, 4, 1e-6);
        let mut window = ConvergenceWindow::new(settings);

        // an oscillating sequence never settles
        assert_eq!(window.update(0.0), ConvergenceState::Continue);
        assert_eq!(window.update(1.0), ConvergenceState::Continue);
        assert_eq!(window.update(0.0), ConvergenceState::Continue);
        assert_eq!(window.update(1.0), ConvergenceState::Exhausted);
        assert_eq!(window.attempts(), 4);
    }

    #[test]
    fn test_restart_tracker_mean() {
        let settings = ConvergenceSettings::new(2, 10, 1e-2);
        let mut tracker = RestartTracker::new(settings);

        assert_eq!(tracker.add_sample(0.4), ConvergenceState::Continue);
        // mean moves from 0.4 to 0.41, outside tolerance
        assert_eq!(tracker.add_sample(0.42), ConvergenceState::Continue);
        // mean moves to ~0.4133, inside 1e-2
        assert_eq!(tracker.add_sample(0.42), ConvergenceState::Converged);
        assert_approx_eq!(tracker.mean(), (0.4 + 0.42 + 0.42) / 3.0);
        assert_eq!(tracker.restarts(), 3);
    }
}
