//! Encoders of the descriptor records that operations refer to by handle: tensors, devices, layouts, memory
//! descriptions, memory configurations, and shard specifications. Also converts IR enumerations and the system
//! description into their binary schema counterparts.

use std::collections::BTreeMap;

use tessel_ir as ir;
use tessel_schema as schema;
use tessel_schema::{
    Dim2d, Dim2dRange, LayoutDesc, MemoryConfigDesc, MemoryDesc, MemorySpace, OobVal, ShardSpec, TensorDesc, TensorRef,
};

use crate::cache::{Handle, ObjectCache, ObjectKey};
use crate::errors::LoweringError;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

pub fn data_type(data_type: ir::DataType) -> schema::DataType {
    match data_type {
        ir::DataType::Float32 => schema::DataType::Float32,
        ir::DataType::Float16 => schema::DataType::Float16,
        ir::DataType::BFloat16 => schema::DataType::BFloat16,
        ir::DataType::BlockFloat8 => schema::DataType::BlockFloat8,
        ir::DataType::BlockBFloat8 => schema::DataType::BlockBFloat8,
        ir::DataType::BlockFloat4 => schema::DataType::BlockFloat4,
        ir::DataType::BlockBFloat4 => schema::DataType::BlockBFloat4,
        ir::DataType::BlockFloat2 => schema::DataType::BlockFloat2,
        ir::DataType::BlockBFloat2 => schema::DataType::BlockBFloat2,
        ir::DataType::UInt32 => schema::DataType::UInt32,
        ir::DataType::UInt16 => schema::DataType::UInt16,
        ir::DataType::UInt8 => schema::DataType::UInt8,
        ir::DataType::Int32 => schema::DataType::Int32,
    }
}

pub fn tensor_layout(layout: ir::Layout) -> schema::TensorLayout {
    match layout {
        ir::Layout::RowMajor => schema::TensorLayout::RowMajor,
        ir::Layout::Tile => schema::TensorLayout::Tile,
        ir::Layout::Invalid => schema::TensorLayout::Invalid,
    }
}

/// Returns the memory space that tensors placed in `buffer_type` live in. Only system memory, DRAM, and L1 buffers can
/// hold tensors.
pub fn memory_space(buffer_type: ir::BufferType) -> Result<MemorySpace, LoweringError> {
    match buffer_type {
        ir::BufferType::SystemMemory => Ok(MemorySpace::System),
        ir::BufferType::Dram => Ok(MemorySpace::DeviceDram),
        ir::BufferType::L1 => Ok(MemorySpace::DeviceL1),
        buffer_type => Err(LoweringError::UnsupportedBufferType { buffer_type }),
    }
}

/// Converts an optional tensor memory layout, mapping absent layouts (i.e., host tensors) to
/// [`schema::TensorMemoryLayout::None`].
pub fn tensor_memory_layout(memory_layout: Option<ir::TensorMemoryLayout>) -> schema::TensorMemoryLayout {
    match memory_layout {
        None => schema::TensorMemoryLayout::None,
        Some(ir::TensorMemoryLayout::SingleBank) => schema::TensorMemoryLayout::SingleBank,
        Some(ir::TensorMemoryLayout::Interleaved) => schema::TensorMemoryLayout::Interleaved,
        Some(ir::TensorMemoryLayout::HeightSharded) => schema::TensorMemoryLayout::HeightSharded,
        Some(ir::TensorMemoryLayout::WidthSharded) => schema::TensorMemoryLayout::WidthSharded,
        Some(ir::TensorMemoryLayout::BlockSharded) => schema::TensorMemoryLayout::BlockSharded,
    }
}

pub fn buffer_type(buffer_type: ir::BufferType) -> schema::BufferType {
    match buffer_type {
        ir::BufferType::SystemMemory => schema::BufferType::SystemMemory,
        ir::BufferType::Dram => schema::BufferType::Dram,
        ir::BufferType::L1 => schema::BufferType::L1,
        ir::BufferType::L1Small => schema::BufferType::L1Small,
        ir::BufferType::Trace => schema::BufferType::Trace,
    }
}

pub fn arch(arch: ir::Arch) -> schema::Arch {
    match arch {
        ir::Arch::Grayskull => schema::Arch::Grayskull,
        ir::Arch::WormholeB0 => schema::Arch::WormholeB0,
        ir::Arch::Blackhole => schema::Arch::Blackhole,
    }
}

pub fn mesh_shard_direction(direction: ir::MeshShardDirection) -> schema::MeshShardDirection {
    match direction {
        ir::MeshShardDirection::FullToShard => schema::MeshShardDirection::FullToShardShape,
        ir::MeshShardDirection::ShardToFull => schema::MeshShardDirection::ShardToFullShape,
    }
}

pub fn mesh_shard_type(shard_type: ir::MeshShardType) -> schema::MeshShardType {
    match shard_type {
        ir::MeshShardType::Manual => schema::MeshShardType::Manual,
        ir::MeshShardType::Replicate => schema::MeshShardType::Replicate,
        ir::MeshShardType::Maximal => schema::MeshShardType::Maximal,
        ir::MeshShardType::Devices => schema::MeshShardType::Devices,
    }
}

// ---------------------------------------------------------------------------
// Integer conversions
// ---------------------------------------------------------------------------

/// Narrows a dimension to the 32-bit width used by the binary schema.
pub(crate) fn to_i32<T: Copy + Into<i64> + TryInto<i32>>(name: &'static str, value: T) -> Result<i32, LoweringError> {
    TryInto::<i32>::try_into(value).map_err(|_| LoweringError::DimensionOutOfRange { name, value: value.into() })
}

pub(crate) fn to_i32_vec(name: &'static str, values: &[i64]) -> Result<Vec<i32>, LoweringError> {
    values.iter().map(|&value| to_i32(name, value)).collect()
}

fn to_u64(name: &'static str, value: i64) -> Result<u64, LoweringError> {
    u64::try_from(value).map_err(|_| LoweringError::DimensionOutOfRange { name, value })
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Encodes the memory description of a memory reference. Scalar elements use a `1 × 1` tile shape. The size is the
/// number of elements (or tiles) times the size of one element (or tile).
pub fn memory_desc(
    memref: &ir::MemRefType,
    memory_layout: Option<ir::TensorMemoryLayout>,
) -> Result<MemoryDesc, LoweringError> {
    let (tile_shape, element_size) = match memref.element_type {
        ir::ElementType::Scalar(element) => {
            let size = element.element_size_bytes().ok_or(LoweringError::BlockFloatScalar { data_type: element })?;
            (Dim2d::new(1, 1), size)
        }
        ir::ElementType::Tile(tile) => {
            (Dim2d::new(to_i32("tile height", tile.height)?, to_i32("tile width", tile.width)?), tile.size_bytes())
        }
    };
    let size = memref.shape.iter().try_fold(element_size, |size, &dimension| {
        let dimension = to_u64("memref shape", dimension)?;
        size.checked_mul(dimension).ok_or(LoweringError::DimensionOutOfRange { name: "memref size", value: i64::MAX })
    })?;
    Ok(MemoryDesc {
        shape: to_i32_vec("memref shape", &memref.shape)?,
        tile_shape: Some(tile_shape),
        data_type: data_type(memref.element_type.data_type()).into(),
        memory_space: memory_space(memref.buffer_type)?.into(),
        memory_layout: tensor_memory_layout(memory_layout).into(),
        size,
    })
}

/// Returns the set of physical cores that a tensor distributed over `grid` occupies, as a row-coalesced list of
/// rectangular ranges.
///
/// Logical core `(y, x)` of the tensor grid is placed at physical core `(origin_y + y, origin_x + x)` of the worker
/// grid. Cores are first grouped into horizontal runs, one per row, and vertically adjacent runs that span the same
/// columns are then merged into a single range.
pub fn core_range_set(grid: ir::GridAttr, worker_grid: ir::WorkerGrid) -> Result<Vec<Dim2dRange>, LoweringError> {
    if grid.rows > worker_grid.rows || grid.columns > worker_grid.columns {
        return Err(LoweringError::GridOutOfBounds {
            rows: grid.rows,
            columns: grid.columns,
            worker_rows: worker_grid.rows,
            worker_columns: worker_grid.columns,
        });
    }
    let cores = (0..grid.rows).flat_map(|y| {
        (0..grid.columns).map(move |x| (worker_grid.origin_y + y, worker_grid.origin_x + x))
    });
    coalesce_cores(cores)
}

fn coalesce_cores<I: IntoIterator<Item = (u32, u32)>>(cores: I) -> Result<Vec<Dim2dRange>, LoweringError> {
    let mut rows = BTreeMap::<u32, Vec<u32>>::new();
    for (y, x) in cores {
        rows.entry(y).or_default().push(x);
    }

    // Horizontal runs as `(y, x_start, x_end)`, with `x_end` exclusive.
    let mut runs = Vec::new();
    for (y, mut columns) in rows {
        columns.sort_unstable();
        columns.dedup();
        let mut start = columns[0];
        let mut end = start + 1;
        for &x in &columns[1..] {
            if x != end {
                runs.push((y, start, end));
                start = x;
            }
            end = x + 1;
        }
        runs.push((y, start, end));
    }

    // Open ranges as `(y_start, y_end, x_start, x_end)`, with both ends exclusive.
    let mut ranges: Vec<(u32, u32, u32, u32)> = Vec::new();
    for (y, start, end) in runs {
        match ranges.iter_mut().find(|range| range.1 == y && range.2 == start && range.3 == end) {
            Some(range) => range.1 = y + 1,
            None => ranges.push((y, y + 1, start, end)),
        }
    }

    ranges
        .into_iter()
        .map(|(y_start, y_end, x_start, x_end)| -> Result<Dim2dRange, LoweringError> {
            Ok(Dim2dRange {
                loc: Some(Dim2d::new(to_i32("core row", y_start)?, to_i32("core column", x_start)?)),
                size: Some(Dim2d::new(to_i32("core rows", y_end - y_start)?, to_i32("core columns", x_end - x_start)?)),
            })
        })
        .collect()
}

/// Encodes a tensor layout. The memory description it refers to is interned by memory reference.
pub fn layout_desc(
    cache: &mut ObjectCache,
    layout: &ir::TensorLayoutAttr,
    worker_grid: ir::WorkerGrid,
) -> Result<LayoutDesc, LoweringError> {
    let core_range_set = core_range_set(layout.grid, worker_grid)?;
    let key = ObjectKey::MemRef(layout.memref.clone(), layout.memory_layout);
    let memory_desc = cache.get_or_create(key, |_| memory_desc(&layout.memref, layout.memory_layout))?;
    Ok(LayoutDesc { oob_val: OobVal::Undef.into(), core_range_set, memory_desc: memory_desc.index() })
}

/// Encodes a reference to a tensor of type `tensor_type` that lives at `address` and occupies `size` bytes. Tensors
/// allocated by the runtime on the host use address and size `0`.
pub fn tensor_ref(
    cache: &mut ObjectCache,
    tensor_type: &ir::TensorType,
    worker_grid: ir::WorkerGrid,
    address: u64,
    size: u64,
) -> Result<TensorRef, LoweringError> {
    let encoding = &tensor_type.encoding;
    let layout = cache.get_or_create(ObjectKey::Layout(encoding.clone()), |cache| {
        layout_desc(cache, encoding, worker_grid)
    })?;
    let shape = to_i32_vec("tensor shape", &tensor_type.shape)?;
    Ok(TensorRef {
        global_id: cache.next_global_id(),
        address,
        size,
        desc: Some(TensorDesc { shape, layout: layout.index() }),
    })
}

/// Encodes a reference to a device, which is identified by the first chip it spans.
pub fn device_ref(device_type: &ir::DeviceType) -> Result<schema::DeviceRef, LoweringError> {
    let global_id = device_type.chip_ids.first().copied().ok_or(LoweringError::EmptyDevice)?;
    Ok(schema::DeviceRef { global_id })
}

pub fn shard_spec(shard_spec: &ir::ShardSpecAttr) -> ShardSpec {
    ShardSpec { shard_shape: shard_spec.shard_shape.clone() }
}

/// Encodes a memory configuration. Its shard specification, if any, is interned by content.
pub fn memory_config_desc(
    cache: &mut ObjectCache,
    memory_config: &ir::MemoryConfigAttr,
) -> Result<MemoryConfigDesc, LoweringError> {
    let handle: Option<Handle<ShardSpec>> = memory_config
        .shard_spec
        .as_ref()
        .map(|spec| cache.get_or_create(ObjectKey::ShardSpec(spec.clone()), |_| Ok(shard_spec(spec))))
        .transpose()?;
    Ok(MemoryConfigDesc {
        tensor_memory_layout: tensor_memory_layout(Some(memory_config.tensor_memory_layout)).into(),
        buffer_type: buffer_type(memory_config.buffer_type).into(),
        shard_spec: handle.map(|handle| handle.index()),
    })
}

// ---------------------------------------------------------------------------
// System description
// ---------------------------------------------------------------------------

fn dim2d(name: &'static str, (y, x): (u32, u32)) -> Result<Dim2d, LoweringError> {
    Ok(Dim2d::new(to_i32(name, y)?, to_i32(name, x)?))
}

pub fn chip_desc(chip: &ir::ChipDesc) -> Result<schema::ChipDesc, LoweringError> {
    Ok(schema::ChipDesc {
        arch: arch(chip.arch).into(),
        grid_size: Some(dim2d("grid size", (chip.grid_rows, chip.grid_columns))?),
        l1_size: chip.l1_size,
        num_dram_channels: chip.num_dram_channels,
        dram_channel_size: chip.dram_channel_size,
        noc_l1_address_align_bytes: chip.noc_l1_address_align_bytes,
        pcie_address_align_bytes: chip.pcie_address_align_bytes,
        noc_dram_address_align_bytes: chip.noc_dram_address_align_bytes,
        l1_unreserved_base: chip.l1_unreserved_base,
        dram_unreserved_base: chip.dram_unreserved_base,
        supported_data_types: chip.supported_data_types.iter().map(|&dt| data_type(dt).into()).collect(),
        supported_tile_sizes: chip
            .supported_tile_sizes
            .iter()
            .map(|&size| dim2d("tile size", size))
            .collect::<Result<_, _>>()?,
    })
}

pub fn system_desc(system_desc: &ir::SystemDesc) -> Result<schema::SystemDesc, LoweringError> {
    Ok(schema::SystemDesc {
        chip_descs: system_desc.chip_descs.iter().map(chip_desc).collect::<Result<_, _>>()?,
        chip_desc_indices: system_desc.chip_desc_indices.clone(),
        chip_coords: system_desc
            .chip_coords
            .iter()
            .map(|coord| schema::ChipCoord { rack: coord.rack, shelf: coord.shelf, y: coord.y, x: coord.x })
            .collect(),
        chip_channels: system_desc
            .chip_channels
            .iter()
            .map(|channel| -> Result<schema::ChipChannel, LoweringError> {
                Ok(schema::ChipChannel {
                    device_id0: channel.device_id0,
                    ethernet_core_coord0: Some(dim2d("ethernet core", channel.ethernet_core_coord0)?),
                    device_id1: channel.device_id1,
                    ethernet_core_coord1: Some(dim2d("ethernet core", channel.ethernet_core_coord1)?),
                })
            })
            .collect::<Result<_, _>>()?,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tessel_ir::{BufferType, DataType, ElementType, GridAttr, MemRefType, TileType, WorkerGrid};

    use super::*;

    fn range(y: i32, x: i32, rows: i32, columns: i32) -> Dim2dRange {
        Dim2dRange { loc: Some(Dim2d::new(y, x)), size: Some(Dim2d::new(rows, columns)) }
    }

    #[test]
    fn test_memory_desc_scalar() {
        let memref = MemRefType::new(vec![64, 128], ElementType::Scalar(DataType::BFloat16), BufferType::Dram);
        let desc = memory_desc(&memref, Some(ir::TensorMemoryLayout::Interleaved)).unwrap();
        assert_eq!(
            desc,
            MemoryDesc {
                shape: vec![64, 128],
                tile_shape: Some(Dim2d::new(1, 1)),
                data_type: schema::DataType::BFloat16.into(),
                memory_space: MemorySpace::DeviceDram.into(),
                memory_layout: schema::TensorMemoryLayout::Interleaved.into(),
                size: 2 * 64 * 128,
            },
        );
    }

    #[test]
    fn test_memory_desc_tiles() {
        let tile = TileType::default_for(DataType::Float32);
        let memref = MemRefType::new(vec![2, 4], ElementType::Tile(tile), BufferType::L1);
        let desc = memory_desc(&memref, None).unwrap();
        assert_eq!(desc.tile_shape, Some(Dim2d::new(32, 32)));
        assert_eq!(desc.size, 32 * 32 * 4 * 8);
        assert_eq!(desc.memory_space, MemorySpace::DeviceL1 as i32);
        assert_eq!(desc.memory_layout, schema::TensorMemoryLayout::None as i32);

        // Block floating-point tiles include one shared exponent byte per 16 values.
        let tile = TileType::default_for(DataType::BlockFloat8);
        let memref = MemRefType::new(vec![1, 1], ElementType::Tile(tile), BufferType::Dram);
        assert_eq!(memory_desc(&memref, None).unwrap().size, 1024 + 64);
    }

    #[test]
    fn test_memory_desc_errors() {
        let memref = MemRefType::new(vec![4], ElementType::Scalar(DataType::BlockFloat4), BufferType::Dram);
        assert_eq!(
            memory_desc(&memref, None),
            Err(LoweringError::BlockFloatScalar { data_type: DataType::BlockFloat4 }),
        );

        let memref = MemRefType::new(vec![4], ElementType::Scalar(DataType::Float32), BufferType::L1Small);
        assert_eq!(
            memory_desc(&memref, None),
            Err(LoweringError::UnsupportedBufferType { buffer_type: BufferType::L1Small }),
        );

        let memref = MemRefType::new(vec![1 << 40], ElementType::Scalar(DataType::Float32), BufferType::Dram);
        assert!(matches!(memory_desc(&memref, None), Err(LoweringError::DimensionOutOfRange { .. })));
    }

    #[test]
    fn test_memory_space() {
        assert_eq!(memory_space(BufferType::SystemMemory), Ok(MemorySpace::System));
        assert_eq!(memory_space(BufferType::Dram), Ok(MemorySpace::DeviceDram));
        assert_eq!(memory_space(BufferType::L1), Ok(MemorySpace::DeviceL1));
        assert!(memory_space(BufferType::Trace).is_err());
    }

    #[test]
    fn test_core_range_set() {
        let worker_grid = WorkerGrid::new(8, 8);
        assert_eq!(core_range_set(GridAttr::new(1, 1), worker_grid), Ok(vec![range(0, 0, 1, 1)]));
        assert_eq!(core_range_set(GridAttr::new(4, 8), worker_grid), Ok(vec![range(0, 0, 4, 8)]));
        assert_eq!(
            core_range_set(GridAttr::new(2, 3), worker_grid.with_origin(1, 2)),
            Ok(vec![range(1, 2, 2, 3)]),
        );
        assert_eq!(
            core_range_set(GridAttr::new(9, 1), worker_grid),
            Err(LoweringError::GridOutOfBounds { rows: 9, columns: 1, worker_rows: 8, worker_columns: 8 }),
        );
    }

    #[test]
    fn test_coalesce_irregular_cores() {
        // Two rows with a gap in the middle, and a third row that spans only the left run.
        let cores = [(0, 0), (0, 1), (0, 3), (1, 0), (1, 1), (1, 3), (2, 0), (2, 1)];
        assert_eq!(coalesce_cores(cores), Ok(vec![range(0, 0, 3, 2), range(0, 3, 2, 1)]));
    }

    #[test]
    fn test_tensor_refs_intern_layouts() {
        let mut cache = ObjectCache::new();
        let memref = MemRefType::new(vec![32, 32], ElementType::Scalar(DataType::Float32), BufferType::SystemMemory);
        let layout = ir::TensorLayoutAttr::new(GridAttr::new(1, 1), memref, None);
        let tensor_type = ir::TensorType::new(vec![32, 32], DataType::Float32, layout);
        let first = tensor_ref(&mut cache, &tensor_type, WorkerGrid::new(8, 8), 0, 0).unwrap();
        let second = tensor_ref(&mut cache, &tensor_type, WorkerGrid::new(8, 8), 0, 0).unwrap();
        assert_eq!(first.global_id, 0);
        assert_eq!(second.global_id, 1);
        assert_eq!(first.desc, second.desc);
        assert_eq!(cache.len::<LayoutDesc>(), 1);
        assert_eq!(cache.len::<MemoryDesc>(), 1);
    }

    #[test]
    fn test_memory_config_desc() {
        let mut cache = ObjectCache::new();
        let sharded = ir::MemoryConfigAttr::new(ir::TensorMemoryLayout::HeightSharded, BufferType::L1)
            .with_shard_spec(ir::ShardSpecAttr::new(vec![32, 64]));
        let desc = memory_config_desc(&mut cache, &sharded).unwrap();
        assert_eq!(
            desc,
            MemoryConfigDesc {
                tensor_memory_layout: schema::TensorMemoryLayout::HeightSharded.into(),
                buffer_type: schema::BufferType::L1.into(),
                shard_spec: Some(0),
            },
        );
        memory_config_desc(&mut cache, &sharded).unwrap();
        assert_eq!(cache.finish().shard_specs, vec![ShardSpec { shard_shape: vec![32, 64] }]);

        let mut cache = ObjectCache::new();
        let interleaved = ir::MemoryConfigAttr::new(ir::TensorMemoryLayout::Interleaved, BufferType::Dram);
        assert_eq!(memory_config_desc(&mut cache, &interleaved).unwrap().shard_spec, None);
    }

    #[test]
    fn test_device_ref() {
        assert_eq!(device_ref(&ir::DeviceType::new(vec![3, 4], vec![1, 2])), Ok(schema::DeviceRef { global_id: 3 }));
        assert_eq!(device_ref(&ir::DeviceType::new(Vec::new(), vec![1])), Err(LoweringError::EmptyDevice));
    }

    #[test]
    fn test_system_desc() {
        let desc = system_desc(&ir::SystemDesc::homogeneous(ir::ChipDesc::wormhole_b0(), 2)).unwrap();
        assert_eq!(desc.chip_descs.len(), 1);
        assert_eq!(desc.chip_descs[0].grid_size, Some(Dim2d::new(8, 8)));
        assert_eq!(desc.chip_descs[0].arch, schema::Arch::WormholeB0 as i32);
        assert_eq!(desc.chip_desc_indices, vec![0, 0]);
        assert_eq!(desc.chip_coords[1], schema::ChipCoord { rack: 0, shelf: 0, y: 0, x: 1 });
    }
}
