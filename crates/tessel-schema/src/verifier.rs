//! Structural verification of decoded binaries.
//!
//! Decoding only guarantees that a payload is well-formed at the wire level. [`verify_binary`] additionally checks that
//! every required field is set, that every handle indexes into its [`ObjectTable`] table, and that every enumeration
//! field holds a known value, so that execution engines can consume a verified [`Binary`] without further checks.

use crate::binary::{Binary, ObjectTable, Program, Record};
use crate::errors::SchemaError;
use crate::operations::{EltwiseOpType, OpType, Operation, ReductionOpType};
use crate::records::{
    Arch, BufferType, DataType, DebugInfo, DeviceRef, Dim2dRange, DistributionStrategy, DistributedTensorConfig,
    LayoutDesc, MemoryConfigDesc, MemoryDesc, MemorySpace, MeshShardDirection, MeshShardType, OobVal, ShardSpec,
    SystemDesc, TensorLayout, TensorMemoryLayout, TensorRef,
};

/// Verifies the structure of a decoded [`Binary`].
pub fn verify_binary(binary: &Binary) -> Result<(), SchemaError> {
    required(binary.version.as_ref(), "Binary", "version")?;
    verify_system_desc(required(binary.system_desc.as_ref(), "Binary", "system_desc")?)?;
    let verifier = Verifier { objects: required(binary.objects.as_ref(), "Binary", "objects")? };
    verifier.verify_objects()?;
    binary.programs.iter().try_for_each(|program| verifier.verify_program(program))
}

fn required<'a, T>(value: Option<&'a T>, record: &'static str, field: &'static str) -> Result<&'a T, SchemaError> {
    value.ok_or(SchemaError::MissingField { record, field })
}

fn enumeration<E: TryFrom<i32>>(value: i32, enumeration: &'static str) -> Result<(), SchemaError> {
    E::try_from(value).map(|_| ()).map_err(|_| SchemaError::UnknownEnumValue { enumeration, value })
}

fn optional_enumeration<E: TryFrom<i32>>(value: Option<i32>, name: &'static str) -> Result<(), SchemaError> {
    value.map_or(Ok(()), |value| enumeration::<E>(value, name))
}

fn verify_system_desc(system_desc: &SystemDesc) -> Result<(), SchemaError> {
    for chip_desc in &system_desc.chip_descs {
        enumeration::<Arch>(chip_desc.arch, "Arch")?;
        required(chip_desc.grid_size.as_ref(), "ChipDesc", "grid_size")?;
        for &data_type in &chip_desc.supported_data_types {
            enumeration::<DataType>(data_type, "DataType")?;
        }
    }
    for &index in &system_desc.chip_desc_indices {
        if index as usize >= system_desc.chip_descs.len() {
            return Err(SchemaError::InvalidHandle {
                table: "chip_descs",
                handle: index,
                length: system_desc.chip_descs.len(),
            });
        }
    }
    Ok(())
}

struct Verifier<'b> {
    objects: &'b ObjectTable,
}

impl Verifier<'_> {
    fn handle<T: Record>(&self, handle: u32) -> Result<&T, SchemaError> {
        let table = T::table(self.objects);
        table.get(handle as usize).ok_or(SchemaError::InvalidHandle { table: T::TABLE, handle, length: table.len() })
    }

    fn tensor(&self, handle: u32) -> Result<(), SchemaError> {
        self.handle::<TensorRef>(handle).map(|_| ())
    }

    fn tensors(&self, handles: &[u32]) -> Result<(), SchemaError> {
        handles.iter().try_for_each(|&handle| self.tensor(handle))
    }

    fn optional_tensor(&self, handle: Option<u32>) -> Result<(), SchemaError> {
        handle.map_or(Ok(()), |handle| self.tensor(handle))
    }

    fn device(&self, handle: u32) -> Result<(), SchemaError> {
        self.handle::<DeviceRef>(handle).map(|_| ())
    }

    fn optional_device(&self, handle: Option<u32>) -> Result<(), SchemaError> {
        handle.map_or(Ok(()), |handle| self.device(handle))
    }

    fn memory_config(&self, handle: u32) -> Result<(), SchemaError> {
        self.handle::<MemoryConfigDesc>(handle).map(|_| ())
    }

    fn optional_memory_config(&self, handle: Option<u32>) -> Result<(), SchemaError> {
        handle.map_or(Ok(()), |handle| self.memory_config(handle))
    }

    fn verify_objects(&self) -> Result<(), SchemaError> {
        for tensor_ref in &self.objects.tensor_refs {
            let desc = required(tensor_ref.desc.as_ref(), "TensorRef", "desc")?;
            self.handle::<LayoutDesc>(desc.layout)?;
        }
        for layout_desc in &self.objects.layout_descs {
            enumeration::<OobVal>(layout_desc.oob_val, "OobVal")?;
            layout_desc.core_range_set.iter().try_for_each(verify_core_range)?;
            self.handle::<MemoryDesc>(layout_desc.memory_desc)?;
        }
        for memory_desc in &self.objects.memory_descs {
            required(memory_desc.tile_shape.as_ref(), "MemoryDesc", "tile_shape")?;
            enumeration::<DataType>(memory_desc.data_type, "DataType")?;
            enumeration::<MemorySpace>(memory_desc.memory_space, "MemorySpace")?;
            enumeration::<TensorMemoryLayout>(memory_desc.memory_layout, "TensorMemoryLayout")?;
        }
        for memory_config in &self.objects.memory_configs {
            enumeration::<TensorMemoryLayout>(memory_config.tensor_memory_layout, "TensorMemoryLayout")?;
            enumeration::<BufferType>(memory_config.buffer_type, "BufferType")?;
            if let Some(shard_spec) = memory_config.shard_spec {
                self.handle::<ShardSpec>(shard_spec)?;
            }
        }
        self.objects.debug_infos.iter().try_for_each(verify_debug_info)
    }

    fn verify_program(&self, program: &Program) -> Result<(), SchemaError> {
        self.tensors(&program.inputs)?;
        self.tensors(&program.outputs)?;
        self.handle::<DebugInfo>(program.debug_info)?;
        program.operations.iter().try_for_each(|operation| self.verify_operation(operation))
    }

    fn verify_operation(&self, operation: &Operation) -> Result<(), SchemaError> {
        match required(operation.op_type.as_ref(), "Operation", "op_type")? {
            OpType::GetDevice(op) => {
                required(op.mesh.as_ref(), "GetDeviceOp", "mesh")?;
                self.device(op.out)
            }
            OpType::ToMemoryConfig(op) => {
                self.tensors(&[op.input, op.out])?;
                self.memory_config(op.memcfg)
            }
            OpType::ToLayout(op) => {
                self.tensors(&[op.input, op.out])?;
                enumeration::<TensorLayout>(op.layout, "TensorLayout")?;
                optional_enumeration::<DataType>(op.dtype, "DataType")?;
                self.optional_memory_config(op.memcfg)?;
                self.optional_device(op.device)
            }
            OpType::ToDType(op) | OpType::Typecast(op) => {
                self.tensors(&[op.input, op.out])?;
                enumeration::<DataType>(op.dtype, "DataType")
            }
            OpType::ToDevice(op) => {
                self.tensors(&[op.input, op.out])?;
                self.device(op.device)?;
                self.optional_memory_config(op.memcfg)
            }
            OpType::FromDevice(op) => self.tensors(&[op.input, op.out]),
            OpType::Empty(op) => {
                self.tensor(op.out)?;
                enumeration::<DataType>(op.dtype, "DataType")?;
                enumeration::<TensorLayout>(op.layout, "TensorLayout")?;
                self.optional_device(op.device)?;
                self.memory_config(op.memcfg)?;
                verify_strategy(op.strategy.as_ref(), "EmptyOp")
            }
            OpType::Full(op) => {
                self.tensor(op.out)?;
                self.optional_device(op.device)?;
                verify_strategy(op.strategy.as_ref(), "FullOp")
            }
            OpType::Arange(op) => {
                self.tensor(op.out)?;
                optional_enumeration::<DataType>(op.dtype, "DataType")?;
                self.optional_device(op.device)?;
                self.optional_memory_config(op.memcfg)
            }
            OpType::Zeros(op) | OpType::Ones(op) => {
                self.tensor(op.out)?;
                optional_enumeration::<DataType>(op.dtype, "DataType")?;
                optional_enumeration::<TensorLayout>(op.layout, "TensorLayout")?;
                self.optional_device(op.device)?;
                self.optional_memory_config(op.memcfg)
            }
            OpType::Eltwise(op) => {
                enumeration::<EltwiseOpType>(op.r#type, "EltwiseOpType")?;
                self.tensors(&op.ins)?;
                self.tensor(op.out)
            }
            OpType::Linear(op) => {
                self.tensors(&[op.in0, op.in1, op.out])?;
                self.optional_tensor(op.bias)
            }
            OpType::Matmul(op) => self.tensors(&[op.in0, op.in1, op.out]),
            OpType::MorehCumSum(op) => {
                self.tensors(&[op.input, op.out])?;
                self.optional_memory_config(op.memcfg)
            }
            OpType::Reduction(op) => {
                enumeration::<ReductionOpType>(op.r#type, "ReductionOpType")?;
                self.tensors(&[op.input, op.out])
            }
            OpType::ReductionProd(op) => {
                self.tensors(&[op.input, op.out])?;
                self.optional_memory_config(op.memcfg)
            }
            OpType::Embedding(op) => self.tensors(&[op.input, op.weight, op.out]),
            OpType::EmbeddingBackward(op) => {
                self.tensors(&[op.input, op.weight, op.in_grad, op.out])?;
                optional_enumeration::<DataType>(op.dtype, "DataType")?;
                self.optional_memory_config(op.memcfg)
            }
            OpType::RepeatInterleave(op) => {
                self.tensors(&[op.input, op.out])?;
                self.optional_memory_config(op.memcfg)
            }
            OpType::Softmax(op) => self.tensors(&[op.input, op.out]),
            OpType::Transpose(op) => self.tensors(&[op.input, op.out]),
            OpType::Conv2d(op) => {
                self.tensors(&[op.input, op.weight, op.out])?;
                self.optional_tensor(op.bias)?;
                self.device(op.device)
            }
            OpType::ConvTranspose2d(op) => {
                self.tensors(&[op.input, op.weight, op.out])?;
                self.optional_tensor(op.bias)?;
                self.device(op.device)
            }
            OpType::AllGather(op) => {
                self.tensors(&[op.input, op.out])?;
                self.device(op.device)
            }
            OpType::ReduceScatter(op) => {
                self.tensors(&[op.input, op.out])?;
                self.device(op.device)
            }
            OpType::MeshShard(op) => {
                self.tensors(&[op.input, op.out])?;
                self.device(op.device)?;
                enumeration::<MeshShardDirection>(op.shard_direction, "MeshShardDirection")?;
                enumeration::<MeshShardType>(op.shard_type, "MeshShardType")
            }
            OpType::Concat(op) => {
                self.tensors(&op.inputs)?;
                self.tensor(op.out)?;
                self.optional_memory_config(op.memcfg)
            }
            OpType::Reshape(op) => self.tensors(&[op.input, op.out]),
            OpType::Repeat(op) => self.tensors(&[op.input, op.out]),
            OpType::Pad(op) => {
                self.tensors(&[op.input, op.out])?;
                self.optional_memory_config(op.memcfg)
            }
            OpType::Slice(op) => self.tensors(&[op.input, op.out]),
            OpType::MaxPool2d(op) => {
                self.tensors(&[op.input, op.out])?;
                self.device(op.device)
            }
            OpType::Deallocate(op) => self.tensor(op.input),
            OpType::UpdateCache(op) => self.tensors(&[op.cache, op.input, op.update_index]),
            OpType::FillCache(op) => self.tensors(&[op.cache, op.input]),
            OpType::Permute(op) => {
                self.tensors(&[op.input, op.out])?;
                self.optional_memory_config(op.memcfg)
            }
            OpType::Upsample(op) => {
                self.tensors(&[op.input, op.out])?;
                required(op.scale_factor.as_ref(), "UpsampleOp", "scale_factor")?;
                self.optional_memory_config(op.memcfg)
            }
        }
    }
}

fn verify_core_range(range: &Dim2dRange) -> Result<(), SchemaError> {
    required(range.loc.as_ref(), "Dim2dRange", "loc")?;
    required(range.size.as_ref(), "Dim2dRange", "size").map(|_| ())
}

fn verify_strategy(strategy: Option<&DistributionStrategy>, record: &'static str) -> Result<(), SchemaError> {
    match required(strategy, record, "strategy")?.strategy {
        Some(DistributedTensorConfig::ShardTensor2D(config)) => {
            required(config.shard_mesh.as_ref(), "ShardTensor2D", "shard_mesh").map(|_| ())
        }
        Some(DistributedTensorConfig::ShardTensor(_)) | None => Ok(()),
    }
}

fn verify_debug_info(debug_info: &DebugInfo) -> Result<(), SchemaError> {
    required(debug_info.mlir.as_ref(), "DebugInfo", "mlir")?;
    if let Some(golden_info) = &debug_info.golden_info {
        for entry in &golden_info.golden_map {
            let tensor = required(entry.value.as_ref(), "GoldenKv", "value")?;
            enumeration::<DataType>(tensor.data_type, "DataType")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::operations::{FromDeviceOp, GetDeviceOp};
    use crate::records::{Dim2d, MlirSnapshot, TensorDesc, Version};

    fn valid_binary() -> Binary {
        let objects = ObjectTable {
            tensor_refs: vec![
                TensorRef { global_id: 0, address: 0, size: 0, desc: Some(TensorDesc { shape: vec![4], layout: 0 }) },
                TensorRef { global_id: 1, address: 0, size: 0, desc: Some(TensorDesc { shape: vec![4], layout: 0 }) },
            ],
            device_refs: vec![DeviceRef { global_id: 0 }],
            layout_descs: vec![LayoutDesc {
                oob_val: OobVal::Undef as i32,
                core_range_set: vec![Dim2dRange { loc: Some(Dim2d::new(0, 0)), size: Some(Dim2d::new(1, 1)) }],
                memory_desc: 0,
            }],
            memory_descs: vec![MemoryDesc {
                shape: vec![4],
                tile_shape: Some(Dim2d::new(1, 1)),
                data_type: DataType::Float32 as i32,
                memory_space: MemorySpace::System as i32,
                memory_layout: TensorMemoryLayout::None as i32,
                size: 16,
            }],
            debug_infos: vec![DebugInfo {
                mlir: Some(MlirSnapshot { name: "ttnn".into(), source: "module {}".into() }),
                ..Default::default()
            }],
            ..Default::default()
        };
        let operations = vec![
            Operation {
                op_type: Some(OpType::GetDevice(GetDeviceOp {
                    mesh: Some(Dim2d::new(1, 1)),
                    chip_ids: vec![0],
                    out: 0,
                })),
                ..Default::default()
            },
            Operation { op_type: Some(OpType::FromDevice(FromDeviceOp { input: 0, out: 1 })), ..Default::default() },
        ];
        Binary {
            version: Some(Version { major: 0, minor: 3, patch: 0 }),
            build_identity: "test".into(),
            system_desc: Some(SystemDesc::default()),
            objects: Some(objects),
            programs: vec![Program {
                name: "main".into(),
                inputs: vec![0],
                outputs: vec![1],
                operations,
                debug_info: 0,
            }],
        }
    }

    #[test]
    fn test_verify_valid_binary() {
        assert_eq!(verify_binary(&valid_binary()), Ok(()));
    }

    #[test]
    fn test_verify_missing_fields() {
        let mut binary = valid_binary();
        binary.version = None;
        assert_eq!(verify_binary(&binary), Err(SchemaError::MissingField { record: "Binary", field: "version" }));

        let mut binary = valid_binary();
        binary.programs[0].operations[0].op_type = None;
        assert_eq!(verify_binary(&binary), Err(SchemaError::MissingField { record: "Operation", field: "op_type" }));
    }

    #[test]
    fn test_verify_invalid_handles() {
        let mut binary = valid_binary();
        binary.programs[0].outputs = vec![7];
        assert_eq!(
            verify_binary(&binary),
            Err(SchemaError::InvalidHandle { table: "tensor_refs", handle: 7, length: 2 }),
        );

        let mut binary = valid_binary();
        binary.objects.as_mut().unwrap().layout_descs[0].memory_desc = 3;
        assert_eq!(
            verify_binary(&binary),
            Err(SchemaError::InvalidHandle { table: "memory_descs", handle: 3, length: 1 }),
        );
    }

    #[test]
    fn test_verify_unknown_enum_value() {
        let mut binary = valid_binary();
        binary.objects.as_mut().unwrap().memory_descs[0].memory_space = 42;
        assert_eq!(
            verify_binary(&binary),
            Err(SchemaError::UnknownEnumValue { enumeration: "MemorySpace", value: 42 }),
        );
    }
}
