//! Resolution of the strategy used to distribute a tensor over the devices of a mesh.

use tessel_ir::{DeviceType, TensorType};
use tessel_schema::{Dim2d, DistributedTensorConfig, DistributionStrategy, ShardTensor, ShardTensor2D};

use crate::descriptors::to_i32;
use crate::errors::LoweringError;

/// Returns the strategy used to distribute a tensor of type `tensor_type` over `device`, together with the number of
/// shards the tensor is split into.
///
/// Tensors that are not placed on a device, or that are placed on a single device, are not distributed. On a line of
/// devices (a 1-D mesh, or a 2-D mesh with a unit dimension) the tensor is sharded along its last dimension, and on a
/// proper 2-D mesh it is sharded over both mesh dimensions.
pub fn distribution_strategy(
    device: Option<&DeviceType>,
    tensor_type: &TensorType,
) -> Result<(DistributionStrategy, u32), LoweringError> {
    let Some(device) = device else {
        return Ok((DistributionStrategy::default(), 1));
    };
    let mesh_shape = &device.mesh_shape;
    let num_shards =
        device.mesh_volume().ok_or_else(|| LoweringError::MeshTooLarge { mesh_shape: mesh_shape.clone() })?;
    let num_shards = u32::try_from(num_shards)
        .map_err(|_| LoweringError::DimensionOutOfRange { name: "mesh volume", value: num_shards })?;
    if num_shards == 1 {
        return Ok((DistributionStrategy::default(), num_shards));
    }

    let strategy = match mesh_shape.as_slice() {
        [_] => shard_last_dimension(tensor_type)?,
        [rows, columns] if *rows == 1 || *columns == 1 => shard_last_dimension(tensor_type)?,
        [rows, columns] => DistributedTensorConfig::ShardTensor2D(ShardTensor2D {
            shard_mesh: Some(Dim2d::new(to_i32("mesh rows", *rows)?, to_i32("mesh columns", *columns)?)),
        }),
        _ => return Err(LoweringError::UnsupportedMeshRank { mesh_shape: mesh_shape.clone() }),
    };
    Ok((DistributionStrategy { strategy: Some(strategy) }, num_shards))
}

fn shard_last_dimension(tensor_type: &TensorType) -> Result<DistributedTensorConfig, LoweringError> {
    let shard_dim = tensor_type.rank().checked_sub(1).ok_or(LoweringError::ScalarTensorSharding)?;
    Ok(DistributedTensorConfig::ShardTensor(ShardTensor { shard_dim: shard_dim as u32 }))
}
