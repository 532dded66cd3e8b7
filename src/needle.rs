// ============================================================================
// NEEDLE SMOOTHING
// ============================================================================

/// Spring constants for the needle filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringConfig {
    pub stiffness: f64,
    pub damping: f64,
    pub mass: f64,
    /// Distance (degrees) under which the needle is considered settled.
    pub rest_delta: f64,
    /// Speed (degrees/s) under which the needle is considered settled.
    pub rest_speed: f64,
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: 140.0,
            damping: 20.0,
            mass: 0.5,
            rest_delta: 0.01,
            rest_speed: 0.01,
        }
    }
}

/// Longest frame the filter integrates; a stalled host resumes smoothly.
const MAX_FRAME_SECS: f64 = 0.25;
/// Integration sub-step.
const SUBSTEP_SECS: f64 = 1.0 / 240.0;

/// Displayed needle angle and its angular velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeedleState {
    displayed: f64,
    velocity: f64,
}

impl NeedleState {
    /// Starts at rest on the first target, so a freshly mounted gauge shows
    /// its reading without sweeping in.
    pub fn new(target: f64) -> Self {
        Self {
            displayed: if target.is_finite() { target } else { 0.0 },
            velocity: 0.0,
        }
    }

    pub fn displayed(&self) -> f64 {
        self.displayed
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    pub fn is_settled_on(&self, target: f64) -> bool {
        self.displayed == target && self.velocity == 0.0
    }

    /// Advance the filter by `dt` seconds towards `target`.
    ///
    /// A non-finite target holds the displayed angle. Non-positive or
    /// non-finite `dt` leaves the state untouched.
    pub fn step(&mut self, target: f64, dt: f64, spring: &SpringConfig) {
        if !target.is_finite() {
            log::debug!("needle target not finite, holding at {:.3}", self.displayed);
            self.velocity = 0.0;
            return;
        }
        if !(dt.is_finite() && dt > 0.0) {
            return;
        }

        let mut remaining = dt.min(MAX_FRAME_SECS);
        while remaining > 0.0 {
            let h = remaining.min(SUBSTEP_SECS);
            let spring_force = -spring.stiffness * (self.displayed - target);
            let damping_force = -spring.damping * self.velocity;
            let accel = (spring_force + damping_force) / spring.mass;
            self.velocity += accel * h;
            self.displayed += self.velocity * h;
            remaining -= h;
        }

        if (self.displayed - target).abs() < spring.rest_delta
            && self.velocity.abs() < spring.rest_speed
        {
            self.displayed = target;
            self.velocity = 0.0;
        }

        // A broken spring configuration must not leak into rendering.
        if !(self.displayed.is_finite() && self.velocity.is_finite()) {
            self.displayed = target;
            self.velocity = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f64 = 1.0 / 60.0;

    #[test]
    fn starts_on_target_without_animation() {
        let needle = NeedleState::new(42.0);
        assert!(needle.is_settled_on(42.0));
        assert_eq!(NeedleState::new(f64::NAN).displayed(), 0.0);
    }

    #[test]
    fn converges_and_stays() {
        let spring = SpringConfig::default();
        let mut needle = NeedleState::new(-120.0);
        for _ in 0..240 {
            needle.step(90.0, FRAME, &spring);
        }
        assert!(needle.is_settled_on(90.0));
        for _ in 0..60 {
            needle.step(90.0, FRAME, &spring);
            assert_eq!(needle.displayed(), 90.0);
        }
    }

    #[test]
    fn moves_towards_target_without_overshoot() {
        let spring = SpringConfig::default();
        let mut needle = NeedleState::new(0.0);
        let mut previous = needle.displayed();
        for _ in 0..240 {
            needle.step(100.0, FRAME, &spring);
            assert!(needle.displayed() >= previous);
            assert!(needle.displayed() <= 100.0);
            previous = needle.displayed();
        }
    }

    #[test]
    fn sweeps_rather_than_snaps() {
        let spring = SpringConfig::default();
        let mut needle = NeedleState::new(0.0);
        needle.step(100.0, FRAME, &spring);
        assert!(needle.displayed() > 0.0 && needle.displayed() < 50.0);
    }

    #[test]
    fn holds_on_non_finite_target() {
        let spring = SpringConfig::default();
        let mut needle = NeedleState::new(0.0);
        for _ in 0..5 {
            needle.step(60.0, FRAME, &spring);
        }
        let held = needle.displayed();
        needle.step(f64::NAN, FRAME, &spring);
        needle.step(f64::INFINITY, FRAME, &spring);
        assert_eq!(needle.displayed(), held);
        assert_eq!(needle.velocity(), 0.0);
    }

    #[test]
    fn ignores_bad_frame_times() {
        let spring = SpringConfig::default();
        let mut needle = NeedleState::new(10.0);
        let before = needle;
        needle.step(50.0, 0.0, &spring);
        needle.step(50.0, -1.0, &spring);
        needle.step(50.0, f64::NAN, &spring);
        assert_eq!(needle, before);
    }

    #[test]
    fn long_stall_stays_finite() {
        let spring = SpringConfig::default();
        let mut needle = NeedleState::new(0.0);
        needle.step(120.0, 30.0, &spring);
        assert!(needle.displayed().is_finite());
        assert!(needle.displayed() <= 120.0);
    }
}
