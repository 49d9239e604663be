use std::fmt;
use std::fmt::{Debug, Formatter};

/// Handle to a resource tracked by the resource system. Handles are small, copyable and stable
/// for as long as the resource is registered. Zero is reserved for the null handle, so a valid
/// handle is always `1..=capacity`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub const fn null() -> Self {
        ResourceId(0)
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    // Handles are 1-based so that slot 0 can stay the null handle
    pub fn from_slot_index(index: usize) -> Self {
        ResourceId(index as u32 + 1)
    }

    pub fn slot_index(&self) -> Option<usize> {
        if self.is_null() {
            None
        } else {
            Some(self.0 as usize - 1)
        }
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl Debug for ResourceId {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_tuple("ResourceId").field(&self.0).finish()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
