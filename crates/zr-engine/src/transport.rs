//! Step clock: a fixed-rate sixteenth-note pulse driven by the engine's sample clock.

use zr_ir::division::{pulse_interval_ms, BPM_MAX, BPM_MIN, DEFAULT_BPM, STEPS_PER_BAR};

/// One consistent view of the transport for a single tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickSnapshot {
    /// Position within the bar, 0..16.
    pub step_index: u8,
    /// Steps since the last reset.
    pub total_steps: u64,
    pub bpm: f32,
}

/// The running pulse. There is at most one per transport.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Pulse {
    interval: f64,
    next_due: f64,
}

impl Pulse {
    fn new(bpm: f32, now: f64) -> Self {
        let interval = pulse_interval_ms(bpm) / 1000.0;
        Self { interval, next_due: now + interval }
    }
}

#[derive(Clone, Debug)]
pub struct Transport {
    bpm: f32,
    step_index: u8,
    total_steps: u64,
    pulse: Option<Pulse>,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(DEFAULT_BPM)
    }
}

impl Transport {
    pub fn new(bpm: f32) -> Self {
        let bpm = if bpm.is_finite() { bpm.clamp(BPM_MIN, BPM_MAX) } else { DEFAULT_BPM };
        Self { bpm, step_index: 0, total_steps: 0, pulse: None }
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn is_running(&self) -> bool {
        self.pulse.is_some()
    }

    /// Seconds between steps at the current tempo.
    pub fn interval(&self) -> f64 {
        pulse_interval_ms(self.bpm) / 1000.0
    }

    pub fn snapshot(&self) -> TickSnapshot {
        TickSnapshot { step_index: self.step_index, total_steps: self.total_steps, bpm: self.bpm }
    }

    /// Start pulsing. Returns the current position for immediate dispatch;
    /// `None` if already running.
    pub fn start(&mut self, now: f64) -> Option<TickSnapshot> {
        if self.pulse.is_some() {
            return None;
        }
        self.pulse = Some(Pulse::new(self.bpm, now));
        log::info!("transport: start at step {} ({} bpm)", self.total_steps, self.bpm);
        Some(self.snapshot())
    }

    /// Cancel the pulse. Position is kept.
    pub fn stop(&mut self) {
        if self.pulse.take().is_some() {
            log::info!("transport: stop at step {}", self.total_steps);
        }
    }

    /// Set the tempo. A running pulse is recreated with the new interval,
    /// measured from `now`. Returns the applied value.
    pub fn set_bpm(&mut self, bpm: f32, now: f64) -> f32 {
        if !bpm.is_finite() {
            log::warn!("transport: ignoring non-finite bpm");
            return self.bpm;
        }
        self.bpm = bpm.clamp(BPM_MIN, BPM_MAX);
        if self.pulse.is_some() {
            self.pulse = Some(Pulse::new(self.bpm, now));
        }
        self.bpm
    }

    /// Advance to `now`. Returns the new position if a pulse fell due.
    ///
    /// At most one tick is produced per call; the engine polls every frame,
    /// so a late pulse is caught up one step at a time.
    pub fn poll(&mut self, now: f64) -> Option<TickSnapshot> {
        let pulse = self.pulse.as_mut()?;
        if now < pulse.next_due {
            return None;
        }
        pulse.next_due += pulse.interval;
        self.total_steps += 1;
        self.step_index = (self.step_index + 1) % STEPS_PER_BAR;
        Some(self.snapshot())
    }

    /// Return to step zero. A running transport re-dispatches position zero
    /// and restarts the pulse phase from `now`.
    pub fn reset(&mut self, now: f64) -> Option<TickSnapshot> {
        self.step_index = 0;
        self.total_steps = 0;
        let pulse = self.pulse.as_mut()?;
        pulse.next_due = now + pulse.interval;
        Some(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_dispatches_current_position() {
        let mut t = Transport::new(80.0);
        let tick = t.start(0.0).unwrap();
        assert_eq!(tick.total_steps, 0);
        assert_eq!(tick.step_index, 0);
        assert!(t.start(0.1).is_none());
    }

    #[test]
    fn pulse_interval_at_80_bpm() {
        let mut t = Transport::new(80.0);
        t.start(0.0);
        assert!((t.interval() - 0.1875).abs() < 1e-12);
        assert!(t.poll(0.1874).is_none());
        let tick = t.poll(0.1875).unwrap();
        assert_eq!(tick.total_steps, 1);
        assert!(t.poll(0.2).is_none());
        assert_eq!(t.poll(0.375).unwrap().total_steps, 2);
    }

    #[test]
    fn step_index_wraps_at_bar() {
        let mut t = Transport::new(120.0);
        t.start(0.0);
        let mut last = None;
        for i in 1..=17 {
            last = t.poll(i as f64 * t.interval());
        }
        let tick = last.unwrap();
        assert_eq!(tick.total_steps, 17);
        assert_eq!(tick.step_index, 1);
    }

    #[test]
    fn stopped_transport_never_ticks() {
        let mut t = Transport::new(80.0);
        t.start(0.0);
        t.stop();
        assert!(t.poll(10.0).is_none());
        assert!(!t.is_running());
    }

    #[test]
    fn bpm_is_clamped_and_nan_rejected() {
        let mut t = Transport::new(80.0);
        assert_eq!(t.set_bpm(500.0, 0.0), 220.0);
        assert_eq!(t.set_bpm(10.0, 0.0), 40.0);
        assert_eq!(t.set_bpm(f32::NAN, 0.0), 40.0);
        assert_eq!(Transport::new(f32::INFINITY).bpm(), DEFAULT_BPM);
    }

    #[test]
    fn bpm_change_resubscribes_from_now() {
        let mut t = Transport::new(60.0);
        t.start(0.0);
        t.set_bpm(120.0, 0.2);
        // New interval 0.125 s measured from 0.2.
        assert!(t.poll(0.3).is_none());
        assert_eq!(t.poll(0.325).unwrap().bpm, 120.0);
    }

    #[test]
    fn reset_redispatches_zero_when_running() {
        let mut t = Transport::new(80.0);
        assert!(t.reset(0.0).is_none());
        t.start(0.0);
        t.poll(0.2);
        t.poll(0.4);
        let tick = t.reset(0.45).unwrap();
        assert_eq!(tick.total_steps, 0);
        assert!(t.poll(0.6).is_none());
        assert_eq!(t.poll(0.6375).unwrap().total_steps, 1);
    }
}
