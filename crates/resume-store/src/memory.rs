use std::sync::Mutex;

use s3up_protocol::ResumeDescriptor;

use crate::{ResumeStore, StoreError, decode};

/// In-process resume slot.
///
/// Holds the serialized form rather than the struct, so it behaves like the
/// file store with respect to malformed contents.
#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    /// Puts raw contents into the slot, bypassing serialization.
    #[cfg(test)]
    pub fn put_raw(&self, raw: impl Into<String>) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(raw.into());
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }
}

impl ResumeStore for MemoryStore {
    fn save(&self, descriptor: &ResumeDescriptor) -> Result<(), StoreError> {
        let json = serde_json::to_string(descriptor)?;
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(json);
        Ok(())
    }

    fn load(&self) -> Option<ResumeDescriptor> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let descriptor = decode(slot.as_deref()?);
        if descriptor.is_none() {
            *slot = None;
        }
        descriptor
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
