/// Fixed-capacity slot storage. All slots are allocated up front and handed out from a free list,
/// so allocating and freeing never touch the heap. Slot indices are stable until freed.
pub struct FixedPool<T> {
    slots: Vec<Option<T>>,
    // Free slot indices. Popped from the back, so initialized in reverse to hand out 0, 1, 2...
    free_list: Vec<u32>,
}

impl<T> FixedPool<T> {
    /// Panics if the capacity doesn't fit the u32 slot indices
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity < u32::MAX as usize,
            "pool capacity {} exceeds the u32 index space",
            capacity
        );

        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);

        FixedPool {
            slots,
            free_list: (0..capacity as u32).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.free_list.is_empty()
    }

    /// Stores the value in a free slot and returns its index. Hands the value back if the pool is
    /// full.
    pub fn allocate(
        &mut self,
        value: T,
    ) -> Result<usize, T> {
        match self.free_list.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                debug_assert!(slot.is_none());
                *slot = Some(value);
                Ok(index as usize)
            }
            None => Err(value),
        }
    }

    pub fn free(
        &mut self,
        index: usize,
    ) -> Option<T> {
        let value = self.slots.get_mut(index)?.take()?;
        self.free_list.push(index as u32);
        Some(value)
    }

    pub fn get(
        &self,
        index: usize,
    ) -> Option<&T> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(
        &mut self,
        index: usize,
    ) -> Option<&mut T> {
        self.slots.get_mut(index)?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index, value)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocates_in_order_until_full() {
        let mut pool = FixedPool::new(3);
        assert!(pool.is_empty());
        assert_eq!(pool.allocate("a"), Ok(0));
        assert_eq!(pool.allocate("b"), Ok(1));
        assert_eq!(pool.allocate("c"), Ok(2));
        assert!(pool.is_full());
        assert_eq!(pool.allocate("d"), Err("d"));
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.capacity(), 3);
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut pool = FixedPool::new(2);
        let a = pool.allocate(10).unwrap();
        let b = pool.allocate(20).unwrap();

        assert_eq!(pool.free(a), Some(10));
        assert_eq!(pool.free(a), None);
        assert!(pool.get(a).is_none());
        assert_eq!(pool.get(b), Some(&20));

        let c = pool.allocate(30).unwrap();
        assert_eq!(c, a);
        *pool.get_mut(c).unwrap() += 1;

        let values: Vec<_> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![31, 20]);
    }

    #[test]
    fn out_of_range_is_none() {
        let mut pool = FixedPool::<u32>::new(1);
        assert!(pool.get(5).is_none());
        assert!(pool.get_mut(5).is_none());
        assert!(pool.free(5).is_none());
    }

    #[test]
    #[should_panic]
    fn capacity_must_fit_u32_indices() {
        FixedPool::<u32>::new(u32::MAX as usize);
    }
}
