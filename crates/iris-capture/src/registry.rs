use crate::{export, import, Capture, CaptureError};
use iris_resource::ResourceStore;
use iris_task::Context;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, PoisonError, RwLock};

/// Cheap name token referencing a capture held by a registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CaptureHandle {
    name: Arc<str>,
}

impl CaptureHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Process-wide index of loaded captures.
///
/// An explicit value owned by the embedding process, not a global.
/// Captures are immutable, so readers share them through `Arc` without
/// further synchronization; the lock only guards the name table.
#[derive(Default)]
pub struct CaptureRegistry {
    inner: RwLock<HashMap<Arc<str>, Arc<Capture>>>,
}

impl CaptureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capture under its own name.
    pub fn put(&self, capture: Capture) -> Result<CaptureHandle, CaptureError> {
        let name: Arc<str> = capture.name.as_str().into();
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&name) {
            return Err(CaptureError::AlreadyExists {
                name: name.to_string(),
            });
        }
        map.insert(name.clone(), Arc::new(capture));
        Ok(CaptureHandle { name })
    }

    pub fn resolve(&self, handle: &CaptureHandle) -> Result<Arc<Capture>, CaptureError> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.name)
            .cloned()
            .ok_or_else(|| CaptureError::NotFound {
                name: handle.name.to_string(),
            })
    }

    pub fn list(&self) -> Vec<CaptureHandle> {
        let mut handles: Vec<CaptureHandle> = self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .map(|name| CaptureHandle { name: name.clone() })
            .collect();
        handles.sort_by(|a, b| a.name.cmp(&b.name));
        handles
    }

    pub fn remove(&self, handle: &CaptureHandle) -> Result<(), CaptureError> {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.name)
            .map(|_| ())
            .ok_or_else(|| CaptureError::NotFound {
                name: handle.name.to_string(),
            })
    }

    /// Decodes a pack stream and registers the result under `name`.
    pub fn import<R: Read>(
        &self,
        ctx: &Context,
        name: impl Into<String>,
        store: &dyn ResourceStore,
        source: R,
    ) -> Result<CaptureHandle, CaptureError> {
        let capture = import(ctx, name, store, source)?;
        self.put(capture)
    }

    /// Serializes a registered capture to `sink`.
    pub fn export<W: Write>(
        &self,
        ctx: &Context,
        handle: &CaptureHandle,
        store: &dyn ResourceStore,
        sink: W,
    ) -> Result<(), CaptureError> {
        let capture = self.resolve(handle)?;
        export(ctx, &capture, store, sink)
    }
}
