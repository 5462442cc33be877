//! Placeholder identity.

use std::fmt;

/// Identifies one async placeholder within a single render.
///
/// Allocated in pre-order while the shell is rendered; a patch carries the
/// same id so the client can find the placeholder it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub u32);

impl SlotId {
    /// Raw numeric value.
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out `SlotId`s in increasing order for one render invocation.
#[derive(Debug, Default)]
pub struct SlotIdAllocator {
    next: u32,
}

impl SlotIdAllocator {
    /// Create an allocator starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn allocate(&mut self) -> SlotId {
        let id = SlotId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> usize {
        self.next as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_sequential() {
        let mut alloc = SlotIdAllocator::new();
        assert_eq!(alloc.allocate(), SlotId(0));
        assert_eq!(alloc.allocate(), SlotId(1));
        assert_eq!(alloc.allocate(), SlotId(2));
        assert_eq!(alloc.allocated(), 3);
    }

    #[test]
    fn test_slot_id_display() {
        assert_eq!(SlotId(7).to_string(), "7");
    }
}
