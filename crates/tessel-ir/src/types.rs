//! Types that annotate values in device programs: element data types, tiles, memory references, tensor layouts, and
//! device handles.
//!
//! Tensor values carry a [`TensorType`] whose [`TensorLayoutAttr`] encoding describes where (host memory, DRAM, or
//! L1), on which core grid, and in which physical format (row-major scalars or tiles) the tensor lives. Device values
//! carry a [`DeviceType`] describing the chips they span and the logical mesh those chips are arranged in.

use std::fmt::{Display, Formatter};

/// Primitive element data types supported by the target devices.
///
/// The `Block*` variants are block floating-point formats in which groups of 16 values share one exponent byte. They
/// only exist inside tiles and therefore have no scalar element size (see [`DataType::element_size_bytes`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Float32,
    Float16,
    BFloat16,
    BlockFloat8,
    BlockBFloat8,
    BlockFloat4,
    BlockBFloat4,
    BlockFloat2,
    BlockBFloat2,
    UInt32,
    UInt16,
    UInt8,
    Int32,
}

impl DataType {
    /// Size in bytes of a single scalar element of this [`DataType`], or [`None`] for block floating-point formats,
    /// which cannot be addressed at the granularity of a single element.
    pub fn element_size_bytes(&self) -> Option<u64> {
        match self {
            Self::Float32 | Self::UInt32 | Self::Int32 => Some(4),
            Self::Float16 | Self::BFloat16 | Self::UInt16 => Some(2),
            Self::UInt8 => Some(1),
            Self::BlockFloat8
            | Self::BlockBFloat8
            | Self::BlockFloat4
            | Self::BlockBFloat4
            | Self::BlockFloat2
            | Self::BlockBFloat2 => None,
        }
    }

    /// Returns `true` if this is one of the block floating-point formats.
    pub fn is_block_float(&self) -> bool {
        self.element_size_bytes().is_none()
    }

    /// Short textual name used when rendering types (e.g., `bf16` or `bfp_bf8`).
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Float32 => "f32",
            Self::Float16 => "f16",
            Self::BFloat16 => "bf16",
            Self::BlockFloat8 => "bfp_f8",
            Self::BlockBFloat8 => "bfp_bf8",
            Self::BlockFloat4 => "bfp_f4",
            Self::BlockBFloat4 => "bfp_bf4",
            Self::BlockFloat2 => "bfp_f2",
            Self::BlockBFloat2 => "bfp_bf2",
            Self::UInt32 => "u32",
            Self::UInt16 => "u16",
            Self::UInt8 => "u8",
            Self::Int32 => "si32",
        }
    }
}

impl Display for DataType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.mnemonic())
    }
}

/// Tile element type: a `height × width` block of values of a single [`DataType`] that is stored and moved as a unit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TileType {
    pub height: u32,
    pub width: u32,
    pub data_type: DataType,
}

impl TileType {
    /// Creates a new [`TileType`].
    pub fn new(height: u32, width: u32, data_type: DataType) -> Self {
        Self { height, width, data_type }
    }

    /// Creates the default `32 × 32` tile used by the target devices.
    pub fn default_for(data_type: DataType) -> Self {
        Self::new(32, 32, data_type)
    }

    /// Size in bytes of one tile, including the shared exponent section of block floating-point formats (one exponent
    /// byte per 16 values).
    pub fn size_bytes(&self) -> u64 {
        let count = self.height as u64 * self.width as u64;
        let exponents = count / 16;
        match self.data_type {
            DataType::BlockFloat8 | DataType::BlockBFloat8 => count + exponents,
            DataType::BlockFloat4 | DataType::BlockBFloat4 => count / 2 + exponents,
            DataType::BlockFloat2 | DataType::BlockBFloat2 => count / 4 + exponents,
            data_type => count * data_type.element_size_bytes().unwrap_or_default(),
        }
    }
}

impl Display for TileType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "!tile<{}x{}, {}>", self.height, self.width, self.data_type)
    }
}

/// Element type of a [`MemRefType`]: either individual scalars or whole tiles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Scalar(DataType),
    Tile(TileType),
}

impl ElementType {
    /// [`DataType`] of the values stored in elements of this type.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Scalar(data_type) => *data_type,
            Self::Tile(tile) => tile.data_type,
        }
    }
}

impl Display for ElementType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(data_type) => write!(formatter, "{data_type}"),
            Self::Tile(tile) => write!(formatter, "{tile}"),
        }
    }
}

/// Memory in which a buffer is allocated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferType {
    SystemMemory,
    Dram,
    L1,
    L1Small,
    Trace,
}

impl Display for BufferType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::SystemMemory => "system_memory",
            Self::Dram => "dram",
            Self::L1 => "l1",
            Self::L1Small => "l1_small",
            Self::Trace => "trace",
        })
    }
}

/// Distribution of a tensor's pages across memory banks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TensorMemoryLayout {
    SingleBank,
    Interleaved,
    HeightSharded,
    WidthSharded,
    BlockSharded,
}

impl Display for TensorMemoryLayout {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::SingleBank => "single_bank",
            Self::Interleaved => "interleaved",
            Self::HeightSharded => "height_sharded",
            Self::WidthSharded => "width_sharded",
            Self::BlockSharded => "block_sharded",
        })
    }
}

/// Logical data format of a tensor (row-major scalars or tiles).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    RowMajor,
    Tile,
    Invalid,
}

impl Display for Layout {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::RowMajor => "row_major",
            Self::Tile => "tile",
            Self::Invalid => "invalid",
        })
    }
}

/// Per-device memory reference backing a tensor: shape (in elements, which may be tiles), element type, and the
/// buffer the memory lives in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemRefType {
    pub shape: Vec<i64>,
    pub element_type: ElementType,
    pub buffer_type: BufferType,
}

impl MemRefType {
    /// Creates a new [`MemRefType`].
    pub fn new(shape: Vec<i64>, element_type: ElementType, buffer_type: BufferType) -> Self {
        Self { shape, element_type, buffer_type }
    }
}

impl Display for MemRefType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "memref<")?;
        for dimension in &self.shape {
            write!(formatter, "{dimension}x")?;
        }
        write!(formatter, "{}, #{}>", self.element_type, self.buffer_type)
    }
}

/// Logical grid of worker cores over which a tensor is distributed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GridAttr {
    pub rows: u32,
    pub columns: u32,
}

impl GridAttr {
    /// Creates a new [`GridAttr`].
    pub fn new(rows: u32, columns: u32) -> Self {
        Self { rows, columns }
    }
}

impl Display for GridAttr {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "<{}x{}>", self.rows, self.columns)
    }
}

/// Layout encoding attached to every device-program tensor type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorLayoutAttr {
    pub grid: GridAttr,
    pub memref: MemRefType,
    pub memory_layout: Option<TensorMemoryLayout>,
}

impl TensorLayoutAttr {
    /// Creates a new [`TensorLayoutAttr`].
    pub fn new(grid: GridAttr, memref: MemRefType, memory_layout: Option<TensorMemoryLayout>) -> Self {
        Self { grid, memref, memory_layout }
    }
}

impl Display for TensorLayoutAttr {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "#layout<{}, {}", self.grid, self.memref)?;
        if let Some(memory_layout) = self.memory_layout {
            write!(formatter, ", {memory_layout}")?;
        }
        write!(formatter, ">")
    }
}

/// Ranked tensor type with a layout encoding.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorType {
    pub shape: Vec<i64>,
    pub data_type: DataType,
    pub encoding: TensorLayoutAttr,
}

impl TensorType {
    /// Creates a new [`TensorType`].
    pub fn new(shape: Vec<i64>, data_type: DataType, encoding: TensorLayoutAttr) -> Self {
        Self { shape, data_type, encoding }
    }

    /// Number of dimensions of this tensor.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }
}

impl Display for TensorType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "tensor<")?;
        for dimension in &self.shape {
            write!(formatter, "{dimension}x")?;
        }
        write!(formatter, "{}, {}>", self.data_type, self.encoding)
    }
}

/// Description of the chips behind a device value and of the logical mesh they form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceType {
    pub chip_ids: Vec<u32>,
    pub mesh_shape: Vec<i64>,
}

impl DeviceType {
    /// Creates a new [`DeviceType`].
    pub fn new(chip_ids: Vec<u32>, mesh_shape: Vec<i64>) -> Self {
        Self { chip_ids, mesh_shape }
    }

    /// Total number of devices in the mesh (i.e., the product of the mesh dimensions), or `None` if that product
    /// overflows.
    pub fn mesh_volume(&self) -> Option<i64> {
        self.mesh_shape.iter().try_fold(1i64, |volume, &size| volume.checked_mul(size))
    }
}

impl Display for DeviceType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let mesh = self.mesh_shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join("x");
        let chips = self.chip_ids.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ");
        write!(formatter, "!device<mesh = {mesh}, chips = [{chips}]>")
    }
}

/// Type of an IR value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Tensor(TensorType),
    Device(DeviceType),
}

impl ValueType {
    /// Returns the underlying [`TensorType`], if this is a tensor type.
    pub fn as_tensor(&self) -> Option<&TensorType> {
        match self {
            Self::Tensor(tensor_type) => Some(tensor_type),
            Self::Device(_) => None,
        }
    }

    /// Returns the underlying [`DeviceType`], if this is a device type.
    pub fn as_device(&self) -> Option<&DeviceType> {
        match self {
            Self::Tensor(_) => None,
            Self::Device(device_type) => Some(device_type),
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tensor(tensor_type) => write!(formatter, "{tensor_type}"),
            Self::Device(device_type) => write!(formatter, "{device_type}"),
        }
    }
}

impl From<TensorType> for ValueType {
    fn from(value: TensorType) -> Self {
        Self::Tensor(value)
    }
}

impl From<DeviceType> for ValueType {
    fn from(value: DeviceType) -> Self {
        Self::Device(value)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_tile_size_bytes() {
        assert_eq!(TileType::default_for(DataType::Float32).size_bytes(), 4096);
        assert_eq!(TileType::default_for(DataType::BFloat16).size_bytes(), 2048);
        assert_eq!(TileType::default_for(DataType::BlockBFloat8).size_bytes(), 1088);
        assert_eq!(TileType::default_for(DataType::BlockFloat4).size_bytes(), 576);
        assert_eq!(TileType::default_for(DataType::BlockFloat2).size_bytes(), 320);
        assert_eq!(TileType::new(16, 16, DataType::UInt8).size_bytes(), 256);
    }

    #[test]
    fn test_element_size_bytes() {
        assert_eq!(DataType::Float32.element_size_bytes(), Some(4));
        assert_eq!(DataType::BFloat16.element_size_bytes(), Some(2));
        assert_eq!(DataType::UInt8.element_size_bytes(), Some(1));
        assert_eq!(DataType::BlockBFloat8.element_size_bytes(), None);
        assert!(DataType::BlockFloat2.is_block_float());
    }

    #[test]
    fn test_tensor_type_rendering() {
        let memref = MemRefType::new(
            vec![1, 1],
            ElementType::Tile(TileType::default_for(DataType::BFloat16)),
            BufferType::Dram,
        );
        let encoding = TensorLayoutAttr::new(GridAttr::new(1, 1), memref, Some(TensorMemoryLayout::Interleaved));
        let tensor_type = TensorType::new(vec![32, 32], DataType::BFloat16, encoding);
        assert_eq!(
            tensor_type.to_string(),
            "tensor<32x32xbf16, #layout<<1x1>, memref<1x1x!tile<32x32, bf16>, #dram>, interleaved>>",
        );
        assert_eq!(tensor_type.rank(), 2);
    }

    #[test]
    fn test_device_type_mesh_volume() {
        let device_type = DeviceType::new(vec![0, 1, 2, 3, 4, 5, 6, 7], vec![2, 4]);
        assert_eq!(device_type.mesh_volume(), Some(8));
        assert_eq!(DeviceType::new(vec![0], vec![i64::MAX, 2]).mesh_volume(), None);
        assert_eq!(device_type.to_string(), "!device<mesh = 2x4, chips = [0, 1, 2, 3, 4, 5, 6, 7]>");
    }
}
