//! Interning of binary records.
//!
//! Records that are referenced by handle (tensors, devices, layouts, memory configurations, ...) are created at most
//! once per lowering run. The [`ObjectCache`] maps the _content_ of the IR object a record was built from (or the
//! identity of the value it describes) to the [`Handle`] of that record in the [`ObjectTable`] being assembled.

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::marker::PhantomData;

use tessel_ir::{MemRefType, MemoryConfigAttr, ShardSpecAttr, TensorLayoutAttr, TensorMemoryLayout, ValueId};
use tessel_schema::{ObjectTable, Record};

use crate::errors::LoweringError;

/// Typed index of a record in the table of `T` of an [`ObjectTable`].
pub struct Handle<T> {
    index: u32,
    record: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32) -> Self {
        Self { index, record: PhantomData }
    }

    /// Index of the record in its table, which is the value stored in binary records that refer to it.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T: Record> Debug for Handle<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "Handle<{}>({})", T::TABLE, self.index)
    }
}

/// Identity of an IR object that a binary record is built from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKey {
    /// SSA value (a tensor or a device).
    Value(ValueId),
    Layout(TensorLayoutAttr),
    /// Memory reference together with the memory layout of the tensor layout that contains it.
    MemRef(MemRefType, Option<TensorMemoryLayout>),
    MemoryConfig(MemoryConfigAttr),
    ShardSpec(ShardSpecAttr),
    /// Debug bundle shared by all programs of a binary.
    DebugInfo,
}

impl Display for ObjectKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => write!(formatter, "{value}"),
            Self::Layout(layout) => write!(formatter, "{layout}"),
            Self::MemRef(memref, Some(memory_layout)) => write!(formatter, "{memref} ({memory_layout})"),
            Self::MemRef(memref, None) => write!(formatter, "{memref}"),
            Self::MemoryConfig(memory_config) => write!(formatter, "{memory_config}"),
            Self::ShardSpec(shard_spec) => write!(formatter, "#shard_spec<{:?}>", shard_spec.shard_shape),
            Self::DebugInfo => write!(formatter, "#debug_info"),
        }
    }
}

/// Cache of the records built during one lowering run, together with the [`ObjectTable`] that holds them.
#[derive(Debug, Default)]
pub struct ObjectCache {
    objects: ObjectTable,
    handles: HashMap<&'static str, HashMap<ObjectKey, u32>>,
    next_global_id: u32,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle of the record of type `T` built for `key`, building it with `build` if this is the first
    /// time `key` is requested. `build` receives the cache so that it can intern the records it refers to. If `build`
    /// fails, nothing is recorded for `key`.
    pub fn get_or_create<T, F>(&mut self, key: ObjectKey, build: F) -> Result<Handle<T>, LoweringError>
    where
        T: Record,
        F: FnOnce(&mut Self) -> Result<T, LoweringError>,
    {
        if let Some(&index) = self.handles.get(T::TABLE).and_then(|handles| handles.get(&key)) {
            return Ok(Handle::new(index));
        }
        let record = build(self)?;
        let table = T::table_mut(&mut self.objects);
        let index = table.len() as u32;
        table.push(record);
        self.handles.entry(T::TABLE).or_default().insert(key, index);
        Ok(Handle::new(index))
    }

    /// Returns the handle of the record of type `T` that was previously built for `key`.
    pub fn at<T: Record>(&self, key: &ObjectKey) -> Result<Handle<T>, LoweringError> {
        self.handles
            .get(T::TABLE)
            .and_then(|handles| handles.get(key))
            .map(|&index| Handle::new(index))
            .ok_or_else(|| LoweringError::ValueNotBuilt { key: key.to_string(), table: T::TABLE })
    }

    /// Returns the record that `handle` refers to.
    pub fn get<T: Record>(&self, handle: Handle<T>) -> Option<&T> {
        T::table(&self.objects).get(handle.index as usize)
    }

    /// Number of records of type `T` built so far.
    pub fn len<T: Record>(&self) -> usize {
        T::table(&self.objects).len()
    }

    /// Returns a new tensor identifier. Identifiers are unique within one lowering run and increase monotonically.
    pub fn next_global_id(&mut self) -> u32 {
        let id = self.next_global_id;
        self.next_global_id += 1;
        id
    }

    /// Consumes this cache and returns the tables of all records built through it.
    pub fn finish(self) -> ObjectTable {
        self.objects
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tessel_schema::{DeviceRef, ShardSpec, TensorRef};

    use super::*;

    #[test]
    fn test_get_or_create_builds_once() {
        let mut cache = ObjectCache::new();
        let mut builds = 0;
        let key = ObjectKey::Value(ValueId::from_index(3));
        let first = cache
            .get_or_create(key.clone(), |_| {
                builds += 1;
                Ok(DeviceRef { global_id: 7 })
            })
            .unwrap();
        let second = cache
            .get_or_create(key, |_| {
                builds += 1;
                Ok(DeviceRef { global_id: 8 })
            })
            .unwrap();
        assert_eq!(builds, 1);
        assert_eq!(first, second);
        assert_eq!(cache.get(first), Some(&DeviceRef { global_id: 7 }));
        assert_eq!(cache.len::<DeviceRef>(), 1);
    }

    #[test]
    fn test_tables_are_interned_independently() {
        let mut cache = ObjectCache::new();
        let key = ObjectKey::Value(ValueId::from_index(0));
        let device = cache.get_or_create(key.clone(), |_| Ok(DeviceRef { global_id: 0 })).unwrap();
        let tensor = cache.get_or_create(key.clone(), |_| Ok(TensorRef::default())).unwrap();
        assert_eq!(device.index(), 0);
        assert_eq!(tensor.index(), 0);
        assert_eq!(cache.at::<DeviceRef>(&key), Ok(device));
        assert_eq!(cache.at::<TensorRef>(&key), Ok(tensor));
    }

    #[test]
    fn test_nested_builds() {
        let mut cache = ObjectCache::new();
        let outer = cache
            .get_or_create(ObjectKey::ShardSpec(ShardSpecAttr::new(vec![2, 2])), |cache| {
                let inner =
                    cache.get_or_create(ObjectKey::ShardSpec(ShardSpecAttr::new(vec![1])), |_| {
                        Ok(ShardSpec { shard_shape: vec![1] })
                    })?;
                Ok(ShardSpec { shard_shape: vec![2, 2, inner.index() as i64] })
            })
            .unwrap();
        assert_eq!(outer.index(), 1);
        assert_eq!(
            cache.finish().shard_specs,
            vec![ShardSpec { shard_shape: vec![1] }, ShardSpec { shard_shape: vec![2, 2, 0] }],
        );
    }

    #[test]
    fn test_failed_builds_are_not_recorded() {
        let mut cache = ObjectCache::new();
        let key = ObjectKey::DebugInfo;
        let result = cache.get_or_create::<DeviceRef, _>(key.clone(), |_| Err(LoweringError::EmptyDevice));
        assert_eq!(result, Err(LoweringError::EmptyDevice));
        assert_eq!(
            cache.at::<DeviceRef>(&key),
            Err(LoweringError::ValueNotBuilt { key: "#debug_info".into(), table: "device_refs" }),
        );
        assert_eq!(cache.len::<DeviceRef>(), 0);
    }

    #[test]
    fn test_global_ids() {
        let mut cache = ObjectCache::new();
        assert_eq!((0..3).map(|_| cache.next_global_id()).collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}
