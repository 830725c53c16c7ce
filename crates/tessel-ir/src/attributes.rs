//! Attributes attached to operations and modules: memory configurations, shard specifications, the target device and
//! system descriptions, and source locations.

use std::fmt::{Display, Formatter};

use crate::types::{BufferType, DataType, TensorMemoryLayout};

/// Shape of the shard that each core holds for a sharded tensor memory layout.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShardSpecAttr {
    pub shard_shape: Vec<i64>,
}

impl ShardSpecAttr {
    /// Creates a new [`ShardSpecAttr`].
    pub fn new(shard_shape: Vec<i64>) -> Self {
        Self { shard_shape }
    }
}

/// Memory configuration requested for the result of an operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemoryConfigAttr {
    pub tensor_memory_layout: TensorMemoryLayout,
    pub buffer_type: BufferType,
    pub shard_spec: Option<ShardSpecAttr>,
}

impl MemoryConfigAttr {
    /// Creates a new [`MemoryConfigAttr`] without a shard specification.
    pub fn new(tensor_memory_layout: TensorMemoryLayout, buffer_type: BufferType) -> Self {
        Self { tensor_memory_layout, buffer_type, shard_spec: None }
    }

    /// Returns a copy of this [`MemoryConfigAttr`] with the provided shard specification attached.
    pub fn with_shard_spec(mut self, shard_spec: ShardSpecAttr) -> Self {
        self.shard_spec = Some(shard_spec);
        self
    }
}

impl Display for MemoryConfigAttr {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "#memory_config<{}, #{}", self.tensor_memory_layout, self.buffer_type)?;
        if let Some(shard_spec) = &self.shard_spec {
            let shape = shard_spec.shard_shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join("x");
            write!(formatter, ", <{shape}>")?;
        }
        write!(formatter, ">")
    }
}

/// Physical grid of worker cores available on a device. Logical core `(y, x)` maps to physical core
/// `(y + origin_y, x + origin_x)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WorkerGrid {
    pub rows: u32,
    pub columns: u32,
    pub origin_y: u32,
    pub origin_x: u32,
}

impl WorkerGrid {
    /// Creates a worker grid anchored at physical core `(0, 0)`.
    pub fn new(rows: u32, columns: u32) -> Self {
        Self { rows, columns, origin_y: 0, origin_x: 0 }
    }

    /// Returns a copy of this [`WorkerGrid`] anchored at the provided physical origin.
    pub fn with_origin(mut self, origin_y: u32, origin_x: u32) -> Self {
        self.origin_y = origin_y;
        self.origin_x = origin_x;
        self
    }
}

/// Device that a module targets: its worker grid, the chips it spans, and the mesh they form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DeviceAttr {
    pub worker_grid: WorkerGrid,
    pub chip_ids: Vec<u32>,
    pub mesh_shape: Vec<i64>,
}

impl DeviceAttr {
    /// Creates a new [`DeviceAttr`].
    pub fn new(worker_grid: WorkerGrid, chip_ids: Vec<u32>, mesh_shape: Vec<i64>) -> Self {
        Self { worker_grid, chip_ids, mesh_shape }
    }
}

impl Display for DeviceAttr {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let grid = &self.worker_grid;
        let chips = self.chip_ids.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(", ");
        let mesh = self.mesh_shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join("x");
        write!(
            formatter,
            "#device<worker_grid = {}x{}, origin = {}x{}, chips = [{chips}], mesh = {mesh}>",
            grid.rows, grid.columns, grid.origin_y, grid.origin_x,
        )
    }
}

/// Chip architecture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Arch {
    Grayskull,
    WormholeB0,
    Blackhole,
}

impl Display for Arch {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::Grayskull => "grayskull",
            Self::WormholeB0 => "wormhole_b0",
            Self::Blackhole => "blackhole",
        })
    }
}

/// Hardware description of a single chip type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChipDesc {
    pub arch: Arch,
    pub grid_rows: u32,
    pub grid_columns: u32,
    pub l1_size: u64,
    pub num_dram_channels: u32,
    pub dram_channel_size: u64,
    pub noc_l1_address_align_bytes: u32,
    pub pcie_address_align_bytes: u32,
    pub noc_dram_address_align_bytes: u32,
    pub l1_unreserved_base: u32,
    pub dram_unreserved_base: u32,
    pub supported_data_types: Vec<DataType>,
    pub supported_tile_sizes: Vec<(u32, u32)>,
}

impl ChipDesc {
    /// Description of a single Wormhole B0 chip with an `8 × 8` worker grid, which is the most common target.
    pub fn wormhole_b0() -> Self {
        Self {
            arch: Arch::WormholeB0,
            grid_rows: 8,
            grid_columns: 8,
            l1_size: 1_499_136,
            num_dram_channels: 12,
            dram_channel_size: 1 << 30,
            noc_l1_address_align_bytes: 16,
            pcie_address_align_bytes: 32,
            noc_dram_address_align_bytes: 32,
            l1_unreserved_base: 1024,
            dram_unreserved_base: 1024,
            supported_data_types: vec![
                DataType::Float32,
                DataType::Float16,
                DataType::BFloat16,
                DataType::BlockFloat8,
                DataType::BlockBFloat8,
                DataType::UInt32,
                DataType::UInt16,
                DataType::UInt8,
            ],
            supported_tile_sizes: vec![(32, 32), (16, 32), (4, 32), (2, 32), (1, 32)],
        }
    }
}

/// Physical coordinates of a chip in a cluster.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChipCoord {
    pub rack: u32,
    pub shelf: u32,
    pub y: u32,
    pub x: u32,
}

/// Ethernet link between two chips.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChipChannel {
    pub device_id0: u32,
    pub ethernet_core_coord0: (u32, u32),
    pub device_id1: u32,
    pub ethernet_core_coord1: (u32, u32),
}

/// Description of the whole system a module was compiled for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemDesc {
    pub chip_descs: Vec<ChipDesc>,
    pub chip_desc_indices: Vec<u32>,
    pub chip_coords: Vec<ChipCoord>,
    pub chip_channels: Vec<ChipChannel>,
}

impl SystemDesc {
    /// Creates a system description with `chip_count` identical chips laid out on a single shelf.
    pub fn homogeneous(chip: ChipDesc, chip_count: u32) -> Self {
        Self {
            chip_descs: vec![chip],
            chip_desc_indices: vec![0; chip_count as usize],
            chip_coords: (0..chip_count).map(|x| ChipCoord { rack: 0, shelf: 0, y: 0, x }).collect(),
            chip_channels: Vec::new(),
        }
    }
}

impl Display for SystemDesc {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let chips = self
            .chip_descs
            .iter()
            .map(|chip| {
                format!(
                    "{{arch = {}, grid = {}x{}, l1_size = {}, num_dram_channels = {}}}",
                    chip.arch, chip.grid_rows, chip.grid_columns, chip.l1_size, chip.num_dram_channels,
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        write!(formatter, "#system_desc<[{chips}], chips = {}>", self.chip_desc_indices.len())
    }
}

impl Default for SystemDesc {
    fn default() -> Self {
        Self::homogeneous(ChipDesc::wormhole_b0(), 1)
    }
}

/// Source location of an operation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Location {
    #[default]
    Unknown,
    Named(String),
    FileLineColumn { file: String, line: u32, column: u32 },
}

impl Display for Location {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(formatter, "loc(unknown)"),
            Self::Named(name) => write!(formatter, "loc(\"{name}\")"),
            Self::FileLineColumn { file, line, column } => write!(formatter, "loc(\"{file}\":{line}:{column})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_memory_config_rendering() {
        let memory_config = MemoryConfigAttr::new(TensorMemoryLayout::HeightSharded, BufferType::L1)
            .with_shard_spec(ShardSpecAttr::new(vec![64, 32]));
        assert_eq!(memory_config.to_string(), "#memory_config<height_sharded, #l1, <64x32>>");
    }

    #[test]
    fn test_location_rendering() {
        assert_eq!(Location::Unknown.to_string(), "loc(unknown)");
        assert_eq!(Location::Named("matmul_1".into()).to_string(), "loc(\"matmul_1\")");
        let location = Location::FileLineColumn { file: "model.py".into(), line: 12, column: 4 };
        assert_eq!(location.to_string(), "loc(\"model.py\":12:4)");
    }

    #[test]
    fn test_homogeneous_system_desc() {
        let system_desc = SystemDesc::homogeneous(ChipDesc::wormhole_b0(), 8);
        assert_eq!(system_desc.chip_descs.len(), 1);
        assert_eq!(system_desc.chip_desc_indices, vec![0; 8]);
        assert_eq!(system_desc.chip_coords[7], ChipCoord { rack: 0, shelf: 0, y: 0, x: 7 });
    }
}
