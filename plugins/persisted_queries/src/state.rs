use std::sync::atomic::{AtomicBool, Ordering};

/// Link-wide switch that turns persisted queries off once the server has shown it cannot handle them.
/// It starts enabled and can only ever be disabled.
#[derive(Debug, Default)]
pub struct LinkDisablementState {
  disabled_due_to_errors: AtomicBool,
}

impl LinkDisablementState {
  pub fn is_disabled(&self) -> bool {
    self.disabled_due_to_errors.load(Ordering::Acquire)
  }

  /// Returns `true` only for the call that actually flipped the switch.
  pub fn disable(&self) -> bool {
    !self.disabled_due_to_errors.swap(true, Ordering::AcqRel)
  }
}
