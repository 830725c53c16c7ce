//! Root records of a binary artifact.

use prost::Message;

use crate::operations::Operation;
use crate::records::{
    DebugInfo, DeviceRef, LayoutDesc, MemoryConfigDesc, MemoryDesc, ShardSpec, SystemDesc, TensorRef, Version,
};

/// Tables of the records that are referenced by handle. A handle is the index of a record in its table.
#[derive(Clone, PartialEq, Message)]
pub struct ObjectTable {
    #[prost(message, repeated, tag = "1")]
    pub tensor_refs: Vec<TensorRef>,
    #[prost(message, repeated, tag = "2")]
    pub device_refs: Vec<DeviceRef>,
    #[prost(message, repeated, tag = "3")]
    pub layout_descs: Vec<LayoutDesc>,
    #[prost(message, repeated, tag = "4")]
    pub memory_descs: Vec<MemoryDesc>,
    #[prost(message, repeated, tag = "5")]
    pub memory_configs: Vec<MemoryConfigDesc>,
    #[prost(message, repeated, tag = "6")]
    pub shard_specs: Vec<ShardSpec>,
    #[prost(message, repeated, tag = "7")]
    pub debug_infos: Vec<DebugInfo>,
}

/// Record type that is stored in one of the tables of an [`ObjectTable`].
pub trait Record: Sized {
    /// Name of the table that holds records of this type.
    const TABLE: &'static str;

    fn table(objects: &ObjectTable) -> &[Self];

    fn table_mut(objects: &mut ObjectTable) -> &mut Vec<Self>;
}

macro_rules! record {
    ($record:ty, $table:ident) => {
        impl Record for $record {
            const TABLE: &'static str = stringify!($table);

            fn table(objects: &ObjectTable) -> &[Self] {
                &objects.$table
            }

            fn table_mut(objects: &mut ObjectTable) -> &mut Vec<Self> {
                &mut objects.$table
            }
        }
    };
}

record!(TensorRef, tensor_refs);
record!(DeviceRef, device_refs);
record!(LayoutDesc, layout_descs);
record!(MemoryDesc, memory_descs);
record!(MemoryConfigDesc, memory_configs);
record!(ShardSpec, shard_specs);
record!(DebugInfo, debug_infos);

/// Executable program, lowered from one function.
#[derive(Clone, PartialEq, Message)]
pub struct Program {
    #[prost(string, tag = "1")]
    pub name: String,

    /// Handles of the [`TensorRef`]s of the program inputs.
    #[prost(uint32, repeated, tag = "2")]
    pub inputs: Vec<u32>,

    /// Handles of the [`TensorRef`]s of the program outputs.
    #[prost(uint32, repeated, tag = "3")]
    pub outputs: Vec<u32>,

    /// Operations of the program, in execution order.
    #[prost(message, repeated, tag = "4")]
    pub operations: Vec<Operation>,

    /// Handle of the [`DebugInfo`] shared by all programs of the binary.
    #[prost(uint32, tag = "5")]
    pub debug_info: u32,
}

/// Root record of a binary artifact.
#[derive(Clone, PartialEq, Message)]
pub struct Binary {
    #[prost(message, optional, tag = "1")]
    pub version: Option<Version>,

    /// Identity of the build that produced the binary (e.g., a revision hash).
    #[prost(string, tag = "2")]
    pub build_identity: String,

    #[prost(message, optional, tag = "3")]
    pub system_desc: Option<SystemDesc>,

    #[prost(message, optional, tag = "4")]
    pub objects: Option<ObjectTable>,

    #[prost(message, repeated, tag = "5")]
    pub programs: Vec<Program>,
}
