//! Local identifier allocation for synthesized records.

use crate::record::{LocalId, MAX_LOCAL_ID};

/// First identifier outside the range reserved for the container header.
pub const DEFAULT_FIRST_ID: u32 = 0x800;

/// Issues strictly increasing local identifiers for one output container.
///
/// Identifiers consumed by a preloaded prior output are reserved up front so
/// they are never issued again. Issued values never go below the configured
/// floor nor above [`MAX_LOCAL_ID`].
#[derive(Debug, Clone)]
pub struct IdAllocator {
    floor: u32,
    high_water: Option<u32>,
}

impl IdAllocator {
    /// Create an allocator whose first issued id is `first_id`.
    pub fn new(first_id: u32) -> Self {
        Self {
            floor: first_id,
            high_water: None,
        }
    }

    /// Mark `id` as consumed.
    pub fn reserve(&mut self, id: LocalId) {
        let value = id.value();
        if self.high_water.map_or(true, |hw| value > hw) {
            self.high_water = Some(value);
        }
    }

    /// Issue the next identifier, or `None` once the 24-bit space is used up.
    pub fn allocate(&mut self) -> Option<LocalId> {
        let candidate = match self.high_water {
            Some(hw) => hw.checked_add(1)?.max(self.floor),
            None => self.floor,
        };
        if candidate > MAX_LOCAL_ID {
            return None;
        }
        self.high_water = Some(candidate);
        LocalId::new(candidate)
    }

    /// Highest identifier issued or reserved so far.
    pub fn high_water(&self) -> Option<LocalId> {
        self.high_water.and_then(LocalId::new)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_FIRST_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u32) -> LocalId {
        LocalId::new(value).unwrap()
    }

    #[test]
    fn test_first_allocation_is_floor() {
        let mut allocator = IdAllocator::default();
        assert_eq!(allocator.allocate(), Some(id(0x800)));
        assert_eq!(allocator.allocate(), Some(id(0x801)));
    }

    #[test]
    fn test_reserve_skips_consumed_ids() {
        let mut allocator = IdAllocator::default();
        allocator.reserve(id(0x800));
        allocator.reserve(id(0x805));
        assert_eq!(allocator.allocate(), Some(id(0x806)));
    }

    #[test]
    fn test_reserve_below_floor_keeps_floor() {
        let mut allocator = IdAllocator::default();
        allocator.reserve(id(0x10));
        assert_eq!(allocator.allocate(), Some(id(0x800)));
    }

    #[test]
    fn test_exhaustion() {
        let mut allocator = IdAllocator::default();
        allocator.reserve(id(MAX_LOCAL_ID - 1));
        assert_eq!(allocator.allocate(), Some(id(MAX_LOCAL_ID)));
        assert_eq!(allocator.allocate(), None);
        assert_eq!(allocator.allocate(), None);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_allocation_is_monotonic_and_avoids_reserved(
                reserved in proptest::collection::vec(0u32..0x2000, 0..20),
                count in 1usize..50,
            ) {
                let mut allocator = IdAllocator::default();
                for &value in &reserved {
                    allocator.reserve(id(value));
                }

                let mut previous: Option<u32> = None;
                for _ in 0..count {
                    let issued = allocator.allocate().unwrap().value();
                    prop_assert!(issued >= DEFAULT_FIRST_ID);
                    prop_assert!(!reserved.contains(&issued));
                    if let Some(prev) = previous {
                        prop_assert!(issued > prev);
                    }
                    previous = Some(issued);
                }
            }
        }
    }
}
