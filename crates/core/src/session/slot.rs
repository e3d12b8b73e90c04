use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one load of a [`ViewSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// A display target. Starting a load supersedes every earlier load of the
/// same slot; superseded loads keep running but must not touch the view.
///
/// Clones share the same generation counter.
#[derive(Debug, Clone, Default)]
pub struct ViewSlot {
    generation: Arc<AtomicU64>,
}

impl ViewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new load, superseding the previous one.
    pub fn begin(&self) -> LoadTicket {
        LoadTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `ticket` is still the newest load.
    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_load_supersedes() {
        let slot = ViewSlot::new();
        let first = slot.begin();
        assert!(slot.is_current(first));

        let second = slot.clone().begin();
        assert!(second > first);
        assert!(!slot.is_current(first));
        assert!(slot.is_current(second));
    }
}
