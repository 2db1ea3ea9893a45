//! Scheduled parameter automation.
//!
//! `Param` is a control-rate value with a timeline of scheduled changes:
//! instantaneous sets, linear and exponential ramps, and exponential
//! approaches toward a target with a time constant. Every level change in
//! the engine goes through one of these so that gains never jump.

use alloc::vec::Vec;

/// Smallest time constant accepted by [`Param::set_target_at`].
const MIN_TIME_CONSTANT: f64 = 1e-4;

/// Number of time constants after which a target approach counts as settled.
const SETTLE_TIME_CONSTANTS: f64 = 10.0;

/// How a scheduled event moves the value to its own `value`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CurveKind {
    /// Jump to the value at the event time.
    Set,
    /// Straight line from the previous event, arriving at the event time.
    Linear,
    /// Exponential curve from the previous event, arriving at the event time.
    /// Holds the previous value when either end is not strictly positive.
    Exponential,
    /// Start approaching the value at the event time.
    Target { time_constant: f64 },
}

/// A single scheduled change on a [`Param`] timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutomationEvent {
    /// Absolute time in seconds.
    pub time: f64,
    pub value: f32,
    pub curve: CurveKind,
}

/// Value source in effect between two events.
#[derive(Clone, Copy, Debug)]
enum Segment {
    Hold(f32),
    Target { target: f32, start: f64, from: f32, time_constant: f64 },
}

impl Segment {
    fn value_at(self, time: f64) -> f32 {
        match self {
            Segment::Hold(v) => v,
            Segment::Target { target, start, from, time_constant } => {
                let elapsed = (time - start).max(0.0);
                let decay = libm::exp(-elapsed / time_constant) as f32;
                target + (from - target) * decay
            }
        }
    }
}

/// A smoothly automatable control parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    /// Value in effect before the first event.
    base: f32,
    /// Time `base` was established; ramps without a predecessor start here.
    base_time: f64,
    /// Scheduled events, sorted by time (stable for equal times).
    events: Vec<AutomationEvent>,
}

impl Param {
    /// Create a parameter holding `value` with nothing scheduled.
    pub fn new(value: f32) -> Self {
        Self { base: value, base_time: 0.0, events: Vec::new() }
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at(&mut self, value: f32, time: f64) {
        self.insert(AutomationEvent { time, value, curve: CurveKind::Set });
    }

    /// Ramp linearly from the previous event so `value` is reached at `end_time`.
    pub fn linear_ramp_to(&mut self, value: f32, end_time: f64) {
        self.insert(AutomationEvent { time: end_time, value, curve: CurveKind::Linear });
    }

    /// Ramp exponentially from the previous event so `value` is reached at `end_time`.
    pub fn exponential_ramp_to(&mut self, value: f32, end_time: f64) {
        self.insert(AutomationEvent { time: end_time, value, curve: CurveKind::Exponential });
    }

    /// Approach `target` from `start_time` with the given time constant (seconds).
    pub fn set_target_at(&mut self, target: f32, start_time: f64, time_constant: f64) {
        let time_constant = if time_constant.is_finite() {
            time_constant.max(MIN_TIME_CONSTANT)
        } else {
            MIN_TIME_CONSTANT
        };
        self.insert(AutomationEvent {
            time: start_time,
            value: target,
            curve: CurveKind::Target { time_constant },
        });
    }

    /// Drop every event scheduled at or after `from_time`.
    pub fn cancel_scheduled_values(&mut self, from_time: f64) {
        let keep = self.events.partition_point(|e| e.time < from_time);
        self.events.truncate(keep);
    }

    /// Evaluate the timeline at `time`.
    pub fn value_at(&self, time: f64) -> f32 {
        let mut segment = Segment::Hold(self.base);
        let mut prev_time = self.base_time;

        for event in &self.events {
            if event.time > time {
                let from = segment.value_at(prev_time);
                let span = event.time - prev_time;
                let pos = if span > 0.0 { ((time - prev_time) / span).clamp(0.0, 1.0) } else { 1.0 };
                return match event.curve {
                    CurveKind::Linear => from + (event.value - from) * pos as f32,
                    CurveKind::Exponential => exponential(from, event.value, pos),
                    CurveKind::Set | CurveKind::Target { .. } => segment.value_at(time),
                };
            }
            segment = match event.curve {
                CurveKind::Set | CurveKind::Linear | CurveKind::Exponential => {
                    Segment::Hold(event.value)
                }
                CurveKind::Target { time_constant } => Segment::Target {
                    target: event.value,
                    start: event.time,
                    from: segment.value_at(event.time),
                    time_constant,
                },
            };
            prev_time = event.time;
        }
        segment.value_at(time)
    }

    /// Fold every event that can no longer change the value after `time`
    /// into the base value.
    pub fn prune(&mut self, time: f64) {
        let past = self.events.partition_point(|e| e.time <= time);
        if past == 0 {
            return;
        }
        let last = self.events[past - 1];
        if let CurveKind::Target { time_constant } = last.curve {
            let settled = past == self.events.len()
                && time - last.time > time_constant * SETTLE_TIME_CONSTANTS;
            if settled {
                self.base = last.value;
                self.base_time = last.time;
                self.events.clear();
                return;
            }
            // Keep the target event, fold everything before it.
            let from = self.value_before(past - 1);
            self.base = from;
            self.base_time = last.time;
            self.events.drain(..past - 1);
            return;
        }
        self.base = last.value;
        self.base_time = last.time;
        self.events.drain(..past);
    }

    /// True when nothing further is scheduled and no approach is in progress.
    pub fn is_settled(&self, time: f64) -> bool {
        match self.events.last() {
            None => true,
            Some(last) if last.time > time => false,
            Some(last) => match last.curve {
                CurveKind::Target { time_constant } => {
                    time - last.time > time_constant * SETTLE_TIME_CONSTANTS
                }
                _ => true,
            },
        }
    }

    /// Number of events still on the timeline.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// The scheduled events, in time order.
    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    fn value_before(&self, index: usize) -> f32 {
        let time = self.events[index].time;
        let head = Param {
            base: self.base,
            base_time: self.base_time,
            events: self.events[..index].to_vec(),
        };
        head.value_at(time)
    }

    fn insert(&mut self, event: AutomationEvent) {
        if !event.time.is_finite() || !event.value.is_finite() {
            return;
        }
        let pos = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(pos, event);
    }
}

impl Default for Param {
    fn default() -> Self {
        Self::new(0.0)
    }
}

fn exponential(from: f32, to: f32, pos: f64) -> f32 {
    if from <= 0.0 || to <= 0.0 {
        return from;
    }
    let ratio = (to / from) as f64;
    from * libm::pow(ratio, pos) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn untouched_param_holds_initial_value() {
        let p = Param::new(0.8);
        assert_eq!(p.value_at(0.0), 0.8);
        assert_eq!(p.value_at(100.0), 0.8);
        assert!(p.is_settled(0.0));
    }

    #[test]
    fn set_value_takes_effect_at_its_time() {
        let mut p = Param::new(0.0);
        p.set_value_at(1.0, 2.0);
        assert_eq!(p.value_at(1.999), 0.0);
        assert_eq!(p.value_at(2.0), 1.0);
    }

    #[test]
    fn linear_ramp_interpolates_from_previous_event() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.0, 1.0);
        p.linear_ramp_to(10.0, 2.0);
        assert!(approx(p.value_at(1.5), 5.0));
        assert!(approx(p.value_at(3.0), 10.0));
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut p = Param::new(0.0);
        p.set_value_at(1.0, 0.0);
        p.exponential_ramp_to(0.01, 1.0);
        assert!(approx(p.value_at(0.5), 0.1));
        assert!(approx(p.value_at(1.0), 0.01));
    }

    #[test]
    fn exponential_ramp_from_zero_holds() {
        let mut p = Param::new(0.0);
        p.exponential_ramp_to(1.0, 1.0);
        assert_eq!(p.value_at(0.5), 0.0);
        assert_eq!(p.value_at(1.0), 1.0);
    }

    #[test]
    fn set_target_approaches_exponentially() {
        let mut p = Param::new(0.0);
        p.set_target_at(1.0, 0.0, 0.1);
        let one_tau = p.value_at(0.1);
        assert!(approx(one_tau, 1.0 - libm::expf(-1.0)));
        assert!(p.value_at(2.0) > 0.9999);
    }

    #[test]
    fn target_continues_from_reached_value() {
        let mut p = Param::new(0.0);
        p.set_target_at(1.0, 0.0, 0.1);
        p.set_target_at(0.0, 0.1, 0.1);
        let at_switch = p.value_at(0.1);
        // No discontinuity at the hand-over.
        assert!(approx(p.value_at(0.1 + 1e-9), at_switch));
        assert!(p.value_at(0.2) < at_switch);
    }

    #[test]
    fn cancel_removes_future_events_only() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.5, 1.0);
        p.set_value_at(0.9, 3.0);
        p.cancel_scheduled_values(2.0);
        assert_eq!(p.pending_events(), 1);
        assert_eq!(p.value_at(5.0), 0.5);
    }

    #[test]
    fn prune_preserves_value() {
        let mut p = Param::new(0.0);
        p.set_value_at(0.2, 0.0);
        p.set_target_at(1.0, 0.5, 0.05);
        p.set_target_at(0.3, 1.0, 0.05);
        let before = p.value_at(1.2);
        p.prune(1.2);
        assert!(approx(p.value_at(1.2), before));
        assert_eq!(p.pending_events(), 1);
    }

    #[test]
    fn prune_collapses_settled_target() {
        let mut p = Param::new(0.0);
        p.set_target_at(0.7, 0.0, 0.01);
        p.prune(1.0);
        assert_eq!(p.pending_events(), 0);
        assert_eq!(p.value_at(1.0), 0.7);
        assert!(p.is_settled(1.0));
    }

    #[test]
    fn non_finite_events_are_ignored() {
        let mut p = Param::new(0.4);
        p.set_value_at(f32::NAN, 0.0);
        p.set_target_at(1.0, f64::INFINITY, 0.1);
        assert_eq!(p.pending_events(), 0);
        assert_eq!(p.value_at(1.0), 0.4);
    }
}
