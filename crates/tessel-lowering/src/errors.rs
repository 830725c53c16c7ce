use tessel_ir::{BufferType, DataType, IrError, MeshShardType};
use tessel_schema::SchemaError;
use thiserror::Error;

/// Error type for lowering modules into binary artifacts.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum LoweringError {
    #[error("{0}")]
    Ir(#[from] IrError),

    /// Error returned when a tensor is placed in a buffer type that has no memory space in the binary schema.
    #[error("buffer type '{buffer_type}' has no corresponding memory space")]
    UnsupportedBufferType { buffer_type: BufferType },

    /// Error returned when a tensor is distributed over a device mesh with more than two dimensions.
    #[error("only 1-D and 2-D device meshes are supported, but got mesh shape {mesh_shape:?}")]
    UnsupportedMeshRank { mesh_shape: Vec<i64> },

    /// Error returned when the number of devices in a mesh overflows.
    #[error("device mesh {mesh_shape:?} has more devices than can be represented")]
    MeshTooLarge { mesh_shape: Vec<i64> },

    /// Error returned when a rank-0 tensor would need to be sharded along its last dimension.
    #[error("cannot shard a rank-0 tensor across a device mesh")]
    ScalarTensorSharding,

    /// Error returned when the grid of a tensor layout does not fit inside the worker grid of the device.
    #[error("tensor grid of {rows}x{columns} cores does not fit in the {worker_rows}x{worker_columns} worker grid")]
    GridOutOfBounds { rows: u32, columns: u32, worker_rows: u32, worker_columns: u32 },

    /// Error returned when a memory reference stores block floating-point values as scalars rather than tiles.
    #[error("block floating-point data type '{data_type}' can only be stored in tiles")]
    BlockFloatScalar { data_type: DataType },

    /// Error returned when a dimension or shape entry does not fit in the integer width of the binary schema.
    #[error("value {value} of '{name}' does not fit in the binary schema")]
    DimensionOutOfRange { name: &'static str, value: i64 },

    /// Error returned when a device type does not list any chips.
    #[error("device type does not list any chips")]
    EmptyDevice,

    /// Error returned when a mesh shard operation uses a sharding that cannot be executed as a mesh shard.
    #[error("mesh shard operations only support 'replicate' and 'devices' shardings, but got '{shard_type}'")]
    UnsupportedMeshShardType { shard_type: MeshShardType },

    /// Error returned when a destination-passing operation does not provide its init operand.
    #[error("operation '{operation}' requires a destination operand")]
    MissingDestination { operation: String },

    /// Error returned when a registered operation kind has no encoder, or when two kinds share the same encoding.
    #[error("no unique encoder is registered for operation kind '{kind}'")]
    MissingEncoder { kind: String },

    /// Error returned when an operation from an unknown dialect reaches the lowering.
    #[error("operation '{name}' cannot be lowered")]
    UnhandledOperation { name: String },

    /// Error returned when a handle is requested for an object that has not been built yet.
    #[error("object {key} has not been added to the '{table}' table")]
    ValueNotBuilt { key: String, table: &'static str },

    /// Error returned when the data of a golden tensor does not match its shape.
    #[error("golden tensor '{name}' has {length} element(s) but its shape {shape:?} requires {expected}")]
    InvalidGoldenTensor { name: String, shape: Vec<i64>, length: usize, expected: usize },

    #[error("produced binary failed verification: {0}")]
    Verification(#[from] SchemaError),
}
