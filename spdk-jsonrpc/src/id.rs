//! Correlation id allocation.

/// Produces request ids for one connection.
///
/// The counter is seeded from the process id so that traces of several
/// clients talking to the same daemon are easy to tell apart.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    counter: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::with_base(process_base())
    }

    /// The first id handed out is `base + 1`.
    pub fn with_base(base: u32) -> Self {
        IdAllocator { counter: base }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> u32 {
        self.counter = self.counter.wrapping_add(1);
        self.counter
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn process_base() -> u32 {
    (std::process::id() % (1 << 6)) * 10000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_from_base() {
        let mut ids = IdAllocator::with_base(5000);
        assert_eq!(ids.next(), 5001);
        assert_eq!(ids.next(), 5002);
    }

    #[test]
    fn ids_wrap() {
        let mut ids = IdAllocator::with_base(u32::MAX - 1);
        assert_eq!(ids.next(), u32::MAX);
        assert_eq!(ids.next(), 0);
        assert_eq!(ids.next(), 1);
    }

    #[test]
    fn process_base_is_scaled() {
        let base = process_base();
        assert_eq!(base % 10000, 0);
        assert!(base < 64 * 10000);
    }
}
