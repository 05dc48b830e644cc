//! Progress Extension (C2): current/maximum progress, throttled events, and
//! a stack of weighted nested sub-steps.
//!
//! This module only holds the numeric state and the projection math; it is
//! embedded in [`crate::task::Inner`] rather than layered as a wrapper type,
//! per the collapsing decision recorded in `DESIGN.md`.

use alloc::borrow::Cow;
use alloc::vec::Vec;

#[cfg(feature = "std")]
use std::time::{Duration, Instant};

/// At most this many real progress events are allowed to escape per second;
/// everything in between is coalesced by simply overwriting `value`.
#[cfg(feature = "std")]
const THROTTLE_INTERVAL: Duration = Duration::from_millis(50);

/// One level of a weighted sub-step stack (§4.2).
#[derive(Debug)]
struct SubStepFrame {
    index: usize,
    weights: Vec<f64>,
}

/// An event a progress update produced, to be forwarded to watchers.
///
/// `None` means the update was throttled and should not be forwarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ProgressEmit {
    RangeChanged(u64),
    ValueChanged(u64),
}

/// The mutable progress state of a task, guarded by the same mutex as the
/// rest of [`crate::task::Inner`].
#[derive(Debug)]
pub(crate) struct ProgressState {
    value: u64,
    maximum: u64,
    text: Option<Cow<'static, str>>,
    #[cfg(feature = "std")]
    last_emit: Option<Instant>,
    intermittent_counter: u64,
    stack: Vec<SubStepFrame>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            value: 0,
            maximum: 0,
            text: None,
            #[cfg(feature = "std")]
            last_emit: None,
            intermittent_counter: 0,
            stack: Vec::new(),
        }
    }
}

impl ProgressState {
    pub(crate) fn value(&self) -> u64 {
        self.value
    }

    pub(crate) fn maximum(&self) -> u64 {
        self.maximum
    }

    pub(crate) fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Returns whether a real event should be emitted now; always true for
    /// the final update (`value == maximum`), otherwise rate-limited to
    /// 20 Hz wall-clock (§4.2).
    #[cfg(feature = "std")]
    fn should_emit(&mut self, is_final: bool) -> bool {
        if is_final {
            self.last_emit = Some(Instant::now());
            return true;
        }
        let now = Instant::now();
        match self.last_emit {
            Some(last) if now.duration_since(last) < THROTTLE_INTERVAL => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    #[cfg(not(feature = "std"))]
    fn should_emit(&mut self, _is_final: bool) -> bool {
        true
    }

    pub(crate) fn set_maximum(&mut self, m: u64) -> Option<ProgressEmit> {
        self.maximum = m;
        Some(ProgressEmit::RangeChanged(m))
    }

    pub(crate) fn set_value(&mut self, v: u64) -> Option<ProgressEmit> {
        self.value = v;
        let is_final = self.maximum != 0 && v >= self.maximum;
        self.should_emit(is_final).then_some(ProgressEmit::ValueChanged(v))
    }

    pub(crate) fn increment_value(&mut self, delta: u64) -> Option<ProgressEmit> {
        // Does not reset `intermittent_counter` — distinct from
        // `set_value`/`set_value_intermittent` per §4.2.
        let v = self.value.saturating_add(delta);
        self.value = v;
        let is_final = self.maximum != 0 && v >= self.maximum;
        self.should_emit(is_final).then_some(ProgressEmit::ValueChanged(v))
    }

    /// Updates on only the first call and every `update_every`-th call
    /// thereafter. Returns whether a real update happened (the caller still
    /// needs `¬is_cancelled` from the task flags to form §4.2's return
    /// value).
    pub(crate) fn set_value_intermittent(
        &mut self,
        v: u64,
        update_every: u64,
    ) -> Option<ProgressEmit> {
        let update_every = update_every.max(1);
        self.intermittent_counter += 1;
        if self.intermittent_counter == 1 || self.intermittent_counter % update_every == 0 {
            self.set_value(v)
        } else {
            self.value = v;
            None
        }
    }

    pub(crate) fn set_text(&mut self, text: Cow<'static, str>) {
        self.text = Some(text);
    }

    pub(crate) fn begin_sub_steps(&mut self, weights: &[f64]) -> Result<(), &'static str> {
        if weights.is_empty() || weights.iter().sum::<f64>() <= 0.0 {
            return Err("sub-step weights must be non-empty and sum to a positive value");
        }
        self.stack.push(SubStepFrame {
            index: 0,
            weights: weights.to_vec(),
        });
        self.value = 0;
        self.maximum = 0;
        Ok(())
    }

    pub(crate) fn next_sub_step(&mut self) -> Result<(), &'static str> {
        let frame = self
            .stack
            .last_mut()
            .ok_or("next_progress_sub_step called with no active sub-step frame")?;
        if frame.index + 1 >= frame.weights.len() {
            return Err("next_progress_sub_step called on the last sub-step");
        }
        frame.index += 1;
        self.value = 0;
        self.maximum = 0;
        Ok(())
    }

    pub(crate) fn end_sub_steps(&mut self) -> Result<(), &'static str> {
        if self.stack.pop().is_none() {
            return Err("end_progress_sub_steps called with no active sub-step frame");
        }
        self.value = 0;
        self.maximum = 0;
        Ok(())
    }

    /// Projects `(value, maximum)` through the sub-step stack onto a 0–1000
    /// scale, innermost frame first (§4.2). Returns `(total_value,
    /// total_maximum)`; `total_maximum` is `maximum` verbatim when the stack
    /// is empty, else always `1000`.
    pub(crate) fn total(&self) -> (u64, u64) {
        if self.stack.is_empty() {
            return (self.value, self.maximum);
        }
        let mut fraction = if self.maximum == 0 {
            0.0
        } else {
            self.value as f64 / self.maximum as f64
        };
        for frame in self.stack.iter().rev() {
            let left: f64 = frame.weights[..frame.index].iter().sum();
            let right: f64 = frame.weights[frame.index..].iter().sum();
            let denom = left + right;
            fraction = if denom == 0.0 {
                0.0
            } else {
                (left + fraction * frame.weights[frame.index]) / denom
            };
        }
        ((fraction * 1000.0).round() as u64, 1000)
    }
}
