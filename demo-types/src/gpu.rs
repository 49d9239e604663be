use hearth::base::hashing::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GpuObjectId(u64);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GpuObjectKind {
    Buffer,
    Texture,
    Pipeline,
}

#[derive(Debug)]
struct GpuObject {
    kind: GpuObjectKind,
    size_in_bytes: usize,
    debug_name: String,
}

/// Stand-in for a graphics device. Tracks live objects so the demo and tests can check that
/// loaders create and release device state when expected.
#[derive(Default)]
pub struct GpuDevice {
    next_id: AtomicU64,
    objects: Mutex<HashMap<GpuObjectId, GpuObject>>,
    // Pretend memory budget, creation fails past it. Zero means unlimited.
    memory_budget: usize,
}

impl GpuDevice {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_memory_budget(memory_budget: usize) -> Self {
        GpuDevice {
            memory_budget,
            ..Default::default()
        }
    }

    fn create(
        &self,
        kind: GpuObjectKind,
        size_in_bytes: usize,
        debug_name: &str,
    ) -> Result<GpuObjectId, String> {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        if self.memory_budget > 0 {
            let used: usize = objects.values().map(|x| x.size_in_bytes).sum();
            if used + size_in_bytes > self.memory_budget {
                return Err(format!(
                    "out of device memory creating {} ({} bytes, {} of {} used)",
                    debug_name, size_in_bytes, used, self.memory_budget
                ));
            }
        }

        let id = GpuObjectId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        log::trace!("Create {:?} {:?} {} ({} bytes)", kind, id, debug_name, size_in_bytes);
        objects.insert(
            id,
            GpuObject {
                kind,
                size_in_bytes,
                debug_name: debug_name.to_string(),
            },
        );
        Ok(id)
    }

    pub fn create_buffer(
        &self,
        size_in_bytes: usize,
        debug_name: &str,
    ) -> Result<GpuObjectId, String> {
        self.create(GpuObjectKind::Buffer, size_in_bytes, debug_name)
    }

    pub fn create_texture(
        &self,
        width: u32,
        height: u32,
        debug_name: &str,
    ) -> Result<GpuObjectId, String> {
        self.create(
            GpuObjectKind::Texture,
            width as usize * height as usize * 4,
            debug_name,
        )
    }

    pub fn create_pipeline(
        &self,
        debug_name: &str,
    ) -> Result<GpuObjectId, String> {
        self.create(GpuObjectKind::Pipeline, 0, debug_name)
    }

    pub fn destroy(
        &self,
        id: GpuObjectId,
    ) {
        let removed = self
            .objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        match removed {
            Some(object) => log::trace!("Destroy {:?} {:?} {}", object.kind, id, object.debug_name),
            None => log::warn!("Destroy called on unknown gpu object {:?}", id),
        }
    }

    pub fn live_object_count(
        &self,
        kind: GpuObjectKind,
    ) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|x| x.kind == kind)
            .count()
    }

    pub fn kind(
        &self,
        id: GpuObjectId,
    ) -> Option<GpuObjectKind> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .map(|x| x.kind)
    }
}
