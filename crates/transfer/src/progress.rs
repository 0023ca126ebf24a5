use std::time::Instant;

/// Linear ETA extrapolation from a `(t0, p0)` snapshot.
///
/// The first observation after a reset only captures the anchor. Later
/// observations extrapolate the rate between the anchor and now:
///
/// ```text
/// remaining = elapsed * (1 - p) / (p - p0)
/// ```
#[derive(Debug, Clone, Default)]
pub struct EtaAnchor {
    anchor: Option<(Instant, f64)>,
}

impl EtaAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the anchor; the next observation re-anchors.
    pub fn reset(&mut self) {
        self.anchor = None;
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    /// Records completion fraction `p` at `now` and returns the estimated
    /// whole seconds remaining, or `None` while unknown.
    pub fn observe(&mut self, p: f64, now: Instant) -> Option<u64> {
        if !p.is_finite() {
            return None;
        }
        let Some((t0, p0)) = self.anchor else {
            self.anchor = Some((now, p));
            return None;
        };
        if p <= p0 {
            return None;
        }
        let elapsed = now.saturating_duration_since(t0).as_secs_f64();
        let remaining = elapsed * (1.0 - p) / (p - p0);
        Some(remaining.max(0.0).round() as u64)
    }
}
