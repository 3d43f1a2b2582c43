//! User-scheduled external forces.
//!
//! Impulses are constant world-frame forces applied at a frame over a finite
//! interval `[t, t + dt]`, kept sorted by start time so the next-event
//! horizon is a cursor bump. Registering a second impulse at the same start
//! time replaces the first (map-key semantics). Profiles are time- and
//! state-dependent functors active over the whole simulation.

use nalgebra::{DVector, Vector3};

/// Force profile functor: `(t, x) → world force`.
pub type ForceFunctor = Box<dyn Fn(f64, &DVector<f64>) -> Vector3<f64> + Send>;

/// A constant world-frame force applied at a frame over `[t, t + dt]`.
#[derive(Debug, Clone)]
pub struct ForceImpulse {
    /// Target frame name.
    pub frame_name: String,
    /// Frame index, resolved at simulation start.
    pub frame_idx: usize,
    /// Application start time \[s\].
    pub t: f64,
    /// Application duration \[s\].
    pub dt: f64,
    /// World-frame force \[N\].
    pub force: Vector3<f64>,
}

/// A permanently-active force functor bound to a frame.
pub struct ForceProfile {
    /// Target frame name.
    pub frame_name: String,
    /// Frame index, resolved at simulation start.
    pub frame_idx: usize,
    /// Force functor.
    pub functor: ForceFunctor,
}

impl std::fmt::Debug for ForceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForceProfile")
            .field("frame_name", &self.frame_name)
            .field("frame_idx", &self.frame_idx)
            .finish_non_exhaustive()
    }
}

/// Registers of scheduled external forces.
#[derive(Debug, Default)]
pub struct ForceRegister {
    /// Impulses ordered by ascending start time.
    pub impulses: Vec<ForceImpulse>,
    /// Cursor into `impulses`: the next (or currently active) event.
    pub next_impulse: usize,
    /// Always-active force profiles.
    pub profiles: Vec<ForceProfile>,
}

impl ForceRegister {
    /// Insert an impulse, keeping the register sorted by start time.
    /// An impulse sharing the start time of an existing one replaces it.
    pub fn add_impulse(&mut self, impulse: ForceImpulse) {
        match self
            .impulses
            .binary_search_by(|probe| probe.t.partial_cmp(&impulse.t).unwrap_or(std::cmp::Ordering::Equal))
        {
            Ok(pos) => self.impulses[pos] = impulse,
            Err(pos) => self.impulses.insert(pos, impulse),
        }
    }

    /// Append a force profile (frame index resolved later).
    pub fn add_profile(&mut self, frame_name: String, functor: ForceFunctor) {
        self.profiles.push(ForceProfile {
            frame_name,
            frame_idx: usize::MAX,
            functor,
        });
    }

    /// Rewind the impulse cursor (at simulation start).
    pub fn rewind(&mut self) {
        self.next_impulse = 0;
    }

    /// Drop all registered forces.
    pub fn clear(&mut self) {
        self.impulses.clear();
        self.next_impulse = 0;
        self.profiles.clear();
    }

    /// The impulse under the cursor, if any.
    #[must_use]
    pub fn current_impulse(&self) -> Option<&ForceImpulse> {
        self.impulses.get(self.next_impulse)
    }

    /// Advance the cursor past events that ended before `t` and return the
    /// time of the next breakpoint strictly after `t`, if any.
    ///
    /// Mirrors the ordered-map cursor walk: if the current event is already
    /// over, move on; the next breakpoint is the cursor's start time when it
    /// is still ahead, otherwise the start time of the event after it.
    pub fn next_breakpoint(&mut self, t: f64) -> Option<f64> {
        let current = self.impulses.get(self.next_impulse)?;
        if t > current.t + current.dt {
            self.next_impulse += 1;
        }

        let current = self.impulses.get(self.next_impulse)?;
        if current.t > t {
            Some(current.t)
        } else {
            self.impulses.get(self.next_impulse + 1).map(|next| next.t)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn impulse(t: f64, dt: f64) -> ForceImpulse {
        ForceImpulse {
            frame_name: "tip".to_string(),
            frame_idx: usize::MAX,
            t,
            dt,
            force: Vector3::new(1.0, 0.0, 0.0),
        }
    }

    #[test]
    fn impulses_stay_sorted() {
        let mut reg = ForceRegister::default();
        reg.add_impulse(impulse(2.0, 0.1));
        reg.add_impulse(impulse(0.5, 0.1));
        reg.add_impulse(impulse(1.0, 0.1));
        let times: Vec<f64> = reg.impulses.iter().map(|i| i.t).collect();
        assert_eq!(times, vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn duplicate_start_time_replaces() {
        let mut reg = ForceRegister::default();
        reg.add_impulse(impulse(1.0, 0.1));
        let mut other = impulse(1.0, 0.5);
        other.force = Vector3::new(0.0, 9.0, 0.0);
        reg.add_impulse(other);
        assert_eq!(reg.impulses.len(), 1);
        assert_eq!(reg.impulses[0].dt, 0.5);
        assert_eq!(reg.impulses[0].force.y, 9.0);
    }

    #[test]
    fn cursor_walk_reports_upcoming_breakpoints() {
        let mut reg = ForceRegister::default();
        reg.add_impulse(impulse(0.5, 0.01));
        reg.add_impulse(impulse(1.0, 0.01));
        reg.rewind();

        // Before the first event: its start time is the breakpoint
        assert_eq!(reg.next_breakpoint(0.0), Some(0.5));
        // Inside the first event: next event's start time
        assert_eq!(reg.next_breakpoint(0.505), Some(1.0));
        // Past the first event: cursor advances, second start is ahead
        assert_eq!(reg.next_breakpoint(0.6), Some(1.0));
        // Inside the last event: no further breakpoint
        assert_eq!(reg.next_breakpoint(1.005), None);
        // Past everything: cursor exhausted
        assert_eq!(reg.next_breakpoint(2.0), None);
        assert!(reg.current_impulse().is_none());
    }
}
