//! Shared records of the binary schema: descriptors of tensors, memory, devices, and systems, and the debug bundle
//! that accompanies every program.
//!
//! Records that may be referenced from more than one place (e.g., a [`LayoutDesc`] used by many tensors) are stored
//! once in the [`ObjectTable`](crate::ObjectTable) and referenced by _handle_, which is the `u32` index of the record
//! in its table. All other records are stored inline.

use prost::{Enumeration, Message, Oneof};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Element data type of tensors and tiles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum DataType {
    Float32 = 0,
    Float16 = 1,
    BFloat16 = 2,
    BlockFloat8 = 3,
    BlockBFloat8 = 4,
    BlockFloat4 = 5,
    BlockBFloat4 = 6,
    BlockFloat2 = 7,
    BlockBFloat2 = 8,
    UInt32 = 9,
    UInt16 = 10,
    UInt8 = 11,
    Int32 = 12,
}

/// Memory space of a [`MemoryDesc`], as seen by the execution engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum MemorySpace {
    System = 0,
    SystemMmio = 1,
    DeviceDram = 2,
    DeviceL1 = 3,
}

/// Distribution of tensor pages across memory banks. [`TensorMemoryLayout::None`] is used for host tensors, which
/// have no bank layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum TensorMemoryLayout {
    None = 0,
    Interleaved = 1,
    SingleBank = 2,
    HeightSharded = 3,
    WidthSharded = 4,
    BlockSharded = 5,
}

/// Buffer type of a [`MemoryConfigDesc`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum BufferType {
    Dram = 0,
    L1 = 1,
    SystemMemory = 2,
    L1Small = 3,
    Trace = 4,
}

/// Logical data format of a tensor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum TensorLayout {
    RowMajor = 0,
    Tile = 1,
    Invalid = 2,
}

/// Value that out-of-bounds reads of a padded tensor observe.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum OobVal {
    Undef = 0,
    Zero = 1,
    One = 2,
    Inf = 3,
    NegInf = 4,
}

/// Chip architecture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum Arch {
    Grayskull = 0,
    WormholeB0 = 1,
    Blackhole = 2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum MeshShardDirection {
    FullToShardShape = 0,
    ShardToFullShape = 1,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum MeshShardType {
    Manual = 0,
    Replicate = 1,
    Maximal = 2,
    Devices = 3,
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Version of the binary format, which matches the version of the crate that produced the binary.
#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct Version {
    #[prost(uint32, tag = "1")]
    pub major: u32,
    #[prost(uint32, tag = "2")]
    pub minor: u32,
    #[prost(uint32, tag = "3")]
    pub patch: u32,
}

/// Two-dimensional extent or coordinate, in `(y, x)` order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Message)]
pub struct Dim2d {
    #[prost(int32, tag = "1")]
    pub y: i32,
    #[prost(int32, tag = "2")]
    pub x: i32,
}

impl Dim2d {
    pub fn new(y: i32, x: i32) -> Self {
        Self { y, x }
    }
}

/// Rectangle of cores, given by the coordinate of its top-left core and its size.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Message)]
pub struct Dim2dRange {
    #[prost(message, optional, tag = "1")]
    pub loc: Option<Dim2d>,
    #[prost(message, optional, tag = "2")]
    pub size: Option<Dim2d>,
}

// ---------------------------------------------------------------------------
// Tensor and device descriptors
// ---------------------------------------------------------------------------

/// Per-device memory backing a tensor.
#[derive(Clone, PartialEq, Message)]
pub struct MemoryDesc {
    /// Shape of the memory in elements, which are tiles for tiled tensors.
    #[prost(int32, repeated, tag = "1")]
    pub shape: Vec<i32>,

    /// Shape of one element, which is `1 × 1` for scalar elements.
    #[prost(message, optional, tag = "2")]
    pub tile_shape: Option<Dim2d>,

    #[prost(enumeration = "DataType", tag = "3")]
    pub data_type: i32,

    #[prost(enumeration = "MemorySpace", tag = "4")]
    pub memory_space: i32,

    #[prost(enumeration = "TensorMemoryLayout", tag = "5")]
    pub memory_layout: i32,

    /// Total size of the memory in bytes.
    #[prost(uint64, tag = "6")]
    pub size: u64,
}

/// Placement of a tensor on the cores of a device.
#[derive(Clone, PartialEq, Message)]
pub struct LayoutDesc {
    #[prost(enumeration = "OobVal", tag = "1")]
    pub oob_val: i32,

    /// Cores that hold the tensor, as a row-coalesced list of rectangles in physical coordinates.
    #[prost(message, repeated, tag = "2")]
    pub core_range_set: Vec<Dim2dRange>,

    /// Handle of the [`MemoryDesc`] of this layout.
    #[prost(uint32, tag = "3")]
    pub memory_desc: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct TensorDesc {
    #[prost(int32, repeated, tag = "1")]
    pub shape: Vec<i32>,

    /// Handle of the [`LayoutDesc`] of this tensor.
    #[prost(uint32, tag = "2")]
    pub layout: u32,
}

/// Reference to a tensor that operations read or write. Host-allocated tensors have address and size `0`.
#[derive(Clone, PartialEq, Message)]
pub struct TensorRef {
    /// Identifier of the tensor that is unique within a binary.
    #[prost(uint32, tag = "1")]
    pub global_id: u32,
    #[prost(uint64, tag = "2")]
    pub address: u64,
    #[prost(uint64, tag = "3")]
    pub size: u64,
    #[prost(message, optional, tag = "4")]
    pub desc: Option<TensorDesc>,
}

/// Reference to a device, identified by the first chip it spans.
#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct DeviceRef {
    #[prost(uint32, tag = "1")]
    pub global_id: u32,
}

#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct ShardSpec {
    #[prost(int64, repeated, tag = "1")]
    pub shard_shape: Vec<i64>,
}

#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct MemoryConfigDesc {
    #[prost(enumeration = "TensorMemoryLayout", tag = "1")]
    pub tensor_memory_layout: i32,

    #[prost(enumeration = "BufferType", tag = "2")]
    pub buffer_type: i32,

    /// Handle of the [`ShardSpec`] of this memory configuration, if it is sharded.
    #[prost(uint32, optional, tag = "3")]
    pub shard_spec: Option<u32>,
}

/// Tensor sliced along one dimension across all devices of a mesh.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Message)]
pub struct ShardTensor {
    #[prost(uint32, tag = "1")]
    pub shard_dim: u32,
}

/// Tensor sliced across both dimensions of a two-dimensional mesh.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Message)]
pub struct ShardTensor2D {
    #[prost(message, optional, tag = "1")]
    pub shard_mesh: Option<Dim2d>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Oneof)]
pub enum DistributedTensorConfig {
    #[prost(message, tag = "1")]
    ShardTensor(ShardTensor),
    #[prost(message, tag = "2")]
    ShardTensor2D(ShardTensor2D),
}

/// Strategy used to distribute a tensor that is allocated on a mesh of devices. An unset
/// [`DistributionStrategy::strategy`] means that the tensor is not distributed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Message)]
pub struct DistributionStrategy {
    #[prost(oneof = "DistributedTensorConfig", tags = "1, 2")]
    pub strategy: Option<DistributedTensorConfig>,
}

// ---------------------------------------------------------------------------
// System description
// ---------------------------------------------------------------------------

#[derive(Clone, PartialEq, Message)]
pub struct ChipDesc {
    #[prost(enumeration = "Arch", tag = "1")]
    pub arch: i32,
    #[prost(message, optional, tag = "2")]
    pub grid_size: Option<Dim2d>,
    #[prost(uint64, tag = "3")]
    pub l1_size: u64,
    #[prost(uint32, tag = "4")]
    pub num_dram_channels: u32,
    #[prost(uint64, tag = "5")]
    pub dram_channel_size: u64,
    #[prost(uint32, tag = "6")]
    pub noc_l1_address_align_bytes: u32,
    #[prost(uint32, tag = "7")]
    pub pcie_address_align_bytes: u32,
    #[prost(uint32, tag = "8")]
    pub noc_dram_address_align_bytes: u32,
    #[prost(uint32, tag = "9")]
    pub l1_unreserved_base: u32,
    #[prost(uint32, tag = "10")]
    pub dram_unreserved_base: u32,
    #[prost(enumeration = "DataType", repeated, tag = "11")]
    pub supported_data_types: Vec<i32>,
    #[prost(message, repeated, tag = "12")]
    pub supported_tile_sizes: Vec<Dim2d>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Message)]
pub struct ChipCoord {
    #[prost(uint32, tag = "1")]
    pub rack: u32,
    #[prost(uint32, tag = "2")]
    pub shelf: u32,
    #[prost(uint32, tag = "3")]
    pub y: u32,
    #[prost(uint32, tag = "4")]
    pub x: u32,
}

/// Ethernet link between two chips.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Message)]
pub struct ChipChannel {
    #[prost(uint32, tag = "1")]
    pub device_id0: u32,
    #[prost(message, optional, tag = "2")]
    pub ethernet_core_coord0: Option<Dim2d>,
    #[prost(uint32, tag = "3")]
    pub device_id1: u32,
    #[prost(message, optional, tag = "4")]
    pub ethernet_core_coord1: Option<Dim2d>,
}

/// Description of the system a binary was compiled for.
#[derive(Clone, PartialEq, Message)]
pub struct SystemDesc {
    /// Distinct chip descriptions.
    #[prost(message, repeated, tag = "1")]
    pub chip_descs: Vec<ChipDesc>,

    /// Index into [`SystemDesc::chip_descs`] for every chip of the system.
    #[prost(uint32, repeated, tag = "2")]
    pub chip_desc_indices: Vec<u32>,

    #[prost(message, repeated, tag = "3")]
    pub chip_coords: Vec<ChipCoord>,

    #[prost(message, repeated, tag = "4")]
    pub chip_channels: Vec<ChipChannel>,
}

// ---------------------------------------------------------------------------
// Debug information
// ---------------------------------------------------------------------------

/// Named snapshot of a program in textual IR form.
#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct MlirSnapshot {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub source: String,
}

/// Reference tensor used to check intermediate results of a program at runtime.
#[derive(Clone, PartialEq, Message)]
pub struct GoldenTensor {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int64, repeated, tag = "2")]
    pub shape: Vec<i64>,
    #[prost(int64, repeated, tag = "3")]
    pub stride: Vec<i64>,
    #[prost(enumeration = "DataType", tag = "4")]
    pub data_type: i32,

    /// Little-endian, row-major element data.
    #[prost(bytes = "vec", tag = "5")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GoldenKv {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<GoldenTensor>,
}

#[derive(Clone, PartialEq, Message)]
pub struct GoldenInfo {
    #[prost(message, repeated, tag = "1")]
    pub golden_map: Vec<GoldenKv>,
}

/// Debug bundle shared by all programs of a binary.
#[derive(Clone, PartialEq, Message)]
pub struct DebugInfo {
    /// Snapshot of the module the binary was lowered from.
    #[prost(message, optional, tag = "1")]
    pub mlir: Option<MlirSnapshot>,

    /// Generated source equivalent of the module, if one was provided.
    #[prost(string, tag = "2")]
    pub cpp: String,

    /// Snapshots of the module after each compiler pass, keyed by pass name.
    #[prost(message, repeated, tag = "3")]
    pub module_cache: Vec<MlirSnapshot>,

    #[prost(message, optional, tag = "4")]
    pub golden_info: Option<GoldenInfo>,
}
