//! Scoped no-gradient execution.
//!
//! Inference must not trigger gradient or training-mode side effects. The
//! guard flips a thread-local flag for its scope and restores the previous
//! value on every exit path, including unwinding.

use std::cell::Cell;

thread_local! {
    static GRAD_ENABLED: Cell<bool> = Cell::new(true);
}

/// Whether gradient/training side effects are currently enabled.
pub fn grad_enabled() -> bool {
    GRAD_ENABLED.with(|f| f.get())
}

/// RAII scope that disables gradient tracking. Nesting-safe.
pub struct InferenceGuard {
    prev: bool,
}

impl InferenceGuard {
    pub fn new() -> Self {
        let prev = GRAD_ENABLED.with(|f| f.replace(false));
        Self { prev }
    }
}

impl Default for InferenceGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InferenceGuard {
    fn drop(&mut self) {
        let prev = self.prev;
        GRAD_ENABLED.with(|f| f.set(prev));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_disables_and_restores() {
        assert!(grad_enabled());
        {
            let _guard = InferenceGuard::new();
            assert!(!grad_enabled());
        }
        assert!(grad_enabled());
    }

    #[test]
    fn nested_guards_restore_in_order() {
        let outer = InferenceGuard::new();
        assert!(!grad_enabled());
        {
            let _inner = InferenceGuard::new();
            assert!(!grad_enabled());
        }
        assert!(!grad_enabled());
        drop(outer);
        assert!(grad_enabled());
    }

    #[test]
    fn guard_restores_on_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _guard = InferenceGuard::new();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(grad_enabled());
    }
}
