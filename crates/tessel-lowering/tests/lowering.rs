use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use tessel_ir::{
    BufferType, ChipDesc, DataType, DeviceAttr, DeviceType, EltwiseKind, EltwiseOp, EltwiseParameters, ElementType,
    EmptyOp, FromDeviceOp, GetDeviceOp, GridAttr, Layout, Location, MemRefType, MemoryConfigAttr, MeshShardDirection,
    MeshShardOp, MeshShardType, Module, SystemDesc, TensorLayoutAttr, TensorMemoryLayout, TensorType, ToDeviceOp,
    UnregisteredOp, WorkerGrid, parse_gspmd_sharding,
};
use tessel_lowering::{GoldenTensor, LoweringError, LoweringOptions, lower_module};
use tessel_schema::{
    Binary, Dim2d, DistributedTensorConfig, EltwiseOpType, OpType, SchemaError, ShardTensor2D, verify_size_prefixed,
};

fn tensor_type(shape: Vec<i64>, buffer_type: BufferType) -> TensorType {
    let memory_layout = (buffer_type != BufferType::SystemMemory).then_some(TensorMemoryLayout::Interleaved);
    let memref = MemRefType::new(shape.clone(), ElementType::Scalar(DataType::Float32), buffer_type);
    TensorType::new(shape, DataType::Float32, TensorLayoutAttr::new(GridAttr::new(1, 1), memref, memory_layout))
}

fn single_chip_module() -> Module {
    let device = DeviceAttr::new(WorkerGrid::new(8, 8), vec![0], vec![1, 1]);
    Module::new(SystemDesc::homogeneous(ChipDesc::wormhole_b0(), 1), device)
}

fn mesh_module() -> Module {
    let device = DeviceAttr::new(WorkerGrid::new(8, 8), (0..8).collect(), vec![2, 4]);
    Module::new(SystemDesc::homogeneous(ChipDesc::wormhole_b0(), 8), device)
}

/// Builds `relu(to_device(input))`, writing the result into a `ttnn.empty` destination and copying it back to the host.
fn relu_module() -> Module {
    let mut module = single_chip_module();
    let host = tensor_type(vec![4, 4], BufferType::SystemMemory);
    let dram = tensor_type(vec![4, 4], BufferType::Dram);
    let memory_config = MemoryConfigAttr::new(TensorMemoryLayout::Interleaved, BufferType::Dram);

    let mut builder = module.function_builder("relu");
    let input = builder.argument(host.clone());
    let device = builder.value(DeviceType::new(vec![0], vec![1, 1]));
    let on_device = builder.value(dram.clone());
    let init = builder.value(dram.clone());
    let relu = builder.value(dram);
    let output = builder.value(host);
    builder
        .append(GetDeviceOp { result: device })
        .append(ToDeviceOp { input, device, memory_config: Some(memory_config.clone()), result: on_device })
        .append(EmptyOp {
            shape: vec![4, 4],
            data_type: DataType::Float32,
            layout: Layout::RowMajor,
            device: Some(device),
            memory_config,
            result: init,
        })
        .append_at(EltwiseOp::new(EltwiseKind::Relu, vec![on_device], init, relu), Location::Named("relu_1".into()))
        .append(FromDeviceOp { input: relu, result: output });
    builder.finish(vec![output]).unwrap();
    module
}

fn lower(module: &Module) -> Binary {
    let buffer = lower_module(module, &LoweringOptions::default()).unwrap();
    verify_size_prefixed(&buffer).unwrap()
}

#[test]
fn test_relu_program() {
    let module = relu_module();
    let binary = lower(&module);
    assert_eq!(binary.programs.len(), 1);

    let program = &binary.programs[0];
    assert_eq!(program.name, "relu");
    assert_eq!(program.inputs, vec![0]);
    assert_eq!(program.outputs, vec![3]);
    assert_eq!(program.operations.len(), 5);
    assert!(matches!(program.operations[0].op_type, Some(OpType::GetDevice(_))));
    assert!(matches!(program.operations[1].op_type, Some(OpType::ToDevice(_))));
    assert!(matches!(program.operations[2].op_type, Some(OpType::Empty(_))));
    assert!(matches!(program.operations[4].op_type, Some(OpType::FromDevice(_))));

    let Some(OpType::Eltwise(relu)) = &program.operations[3].op_type else {
        panic!("expected an elementwise operation, got {:?}", program.operations[3].op_type);
    };
    assert_eq!(relu.r#type, EltwiseOpType::Relu as i32);
    assert_eq!(relu.ins, vec![1]);
    assert_eq!(relu.out, 2);
    assert_eq!(relu.params, None);

    let function = module.function("relu").unwrap();
    assert_eq!(program.operations[3].debug_info, module.display_instruction(&function.body()[3]).to_string());
    assert_eq!(program.operations[3].loc_info, "loc(\"relu_1\")");
    assert_eq!(program.operations[0].loc_info, "loc(unknown)");
}

#[test]
fn test_destination_aliasing() {
    let binary = lower(&relu_module());
    let program = &binary.programs[0];
    let Some(OpType::Empty(empty)) = &program.operations[2].op_type else {
        panic!("expected an empty operation");
    };
    let Some(OpType::FromDevice(from_device)) = &program.operations[4].op_type else {
        panic!("expected a from-device operation");
    };
    assert_eq!(empty.num_shards, 1);
    assert_eq!(from_device.input, empty.out);
}

#[test]
fn test_records_are_shared() {
    let binary = lower(&relu_module());
    let objects = binary.objects.unwrap();
    assert_eq!(objects.tensor_refs.len(), 4);
    assert_eq!(objects.device_refs.len(), 1);
    assert_eq!(objects.layout_descs.len(), 2);
    assert_eq!(objects.memory_descs.len(), 2);
    assert_eq!(objects.memory_configs.len(), 1);
    assert_eq!(objects.debug_infos.len(), 1);

    let layouts = objects.tensor_refs.iter().map(|tensor| tensor.desc.as_ref().unwrap().layout).collect::<Vec<_>>();
    assert_eq!(layouts, vec![0, 1, 1, 0]);
    let global_ids = objects.tensor_refs.iter().map(|tensor| tensor.global_id).collect::<BTreeSet<_>>();
    assert_eq!(global_ids.len(), 4);
    assert!(objects.tensor_refs.iter().all(|tensor| tensor.address == 0 && tensor.size == 0));
}

#[test]
fn test_binary_header() {
    let module = relu_module();
    let options = LoweringOptions::default().with_version(1, 4, 2).with_build_identity("5d9e1c3");
    let binary = verify_size_prefixed(&lower_module(&module, &options).unwrap()).unwrap();
    let version = binary.version.unwrap();
    assert_eq!((version.major, version.minor, version.patch), (1, 4, 2));
    assert_eq!(binary.build_identity, "5d9e1c3");
    assert_eq!(binary.system_desc.unwrap().chip_descs.len(), 1);
}

#[test]
fn test_debug_info() {
    let module = relu_module();
    let golden = GoldenTensor::new("relu_1", vec![2], &[0.0f32, 1.5]).unwrap();
    let options = LoweringOptions::default()
        .with_generated_source("void relu() {}")
        .with_golden_tensor(golden)
        .with_pass_snapshot("layout", "module {}");
    let binary = verify_size_prefixed(&lower_module(&module, &options).unwrap()).unwrap();
    let debug_info = &binary.objects.unwrap().debug_infos[0];

    let mlir = debug_info.mlir.as_ref().unwrap();
    assert_eq!(mlir.name, "ttnn");
    assert_eq!(mlir.source, module.to_string());
    assert_eq!(debug_info.cpp, "void relu() {}");
    assert_eq!(debug_info.module_cache.len(), 1);
    assert_eq!(debug_info.module_cache[0].name, "layout");

    let golden_map = &debug_info.golden_info.as_ref().unwrap().golden_map;
    assert_eq!(golden_map.len(), 1);
    assert_eq!(golden_map[0].key, "relu_1");
    let tensor = golden_map[0].value.as_ref().unwrap();
    assert_eq!(tensor.shape, vec![2]);
    assert_eq!(tensor.data.len(), 8);
}

#[test]
fn test_clamp_without_destination() {
    let mut module = single_chip_module();
    let host = tensor_type(vec![4, 4], BufferType::SystemMemory);
    let mut builder = module.function_builder("clamp");
    let input = builder.argument(host.clone());
    let result = builder.value(host);
    builder.append(EltwiseOp::clamp(input, -1.0, 1.0, result));
    builder.finish(vec![result]).unwrap();

    let binary = lower(&module);
    let program = &binary.programs[0];
    let Some(OpType::Eltwise(clamp)) = &program.operations[0].op_type else {
        panic!("expected an elementwise operation");
    };
    assert_eq!(clamp.r#type, EltwiseOpType::Clamp as i32);
    assert_eq!(clamp.ins, vec![0]);
    assert_eq!(clamp.out, 1);
    assert!(clamp.params.is_some());
    assert_eq!(program.outputs, vec![1]);
}

#[test]
fn test_missing_destination() {
    let mut module = single_chip_module();
    let host = tensor_type(vec![4, 4], BufferType::SystemMemory);
    let mut builder = module.function_builder("neg");
    let input = builder.argument(host.clone());
    let result = builder.value(host);
    builder.append(EltwiseOp {
        kind: EltwiseKind::Neg,
        inputs: vec![input],
        output: None,
        parameters: EltwiseParameters::None,
        result,
    });
    builder.finish(vec![result]).unwrap();

    assert_eq!(
        lower_module(&module, &LoweringOptions::default()),
        Err(LoweringError::MissingDestination { operation: "ttnn.neg".into() }),
    );
}

#[test]
fn test_unregistered_operation() {
    let mut module = single_chip_module();
    let host = tensor_type(vec![4, 4], BufferType::SystemMemory);
    let mut builder = module.function_builder("add");
    let input = builder.argument(host.clone());
    let result = builder.value(host);
    let results = vec![result];
    builder.append(UnregisteredOp { name: "stablehlo.add".into(), operands: vec![input, input], results });
    builder.finish(vec![result]).unwrap();

    assert_eq!(
        lower_module(&module, &LoweringOptions::default()),
        Err(LoweringError::UnhandledOperation { name: "stablehlo.add".into() }),
    );
}

#[test]
fn test_distributed_empty() {
    let mut module = mesh_module();
    let dram = tensor_type(vec![64, 128], BufferType::Dram);
    let mut builder = module.function_builder("empty");
    let device = builder.value(DeviceType::new((0..8).collect(), vec![2, 4]));
    let result = builder.value(dram);
    builder.append(GetDeviceOp { result: device }).append(EmptyOp {
        shape: vec![64, 128],
        data_type: DataType::Float32,
        layout: Layout::Tile,
        device: Some(device),
        memory_config: MemoryConfigAttr::new(TensorMemoryLayout::Interleaved, BufferType::Dram),
        result,
    });
    builder.finish(vec![result]).unwrap();

    let binary = lower(&module);
    let program = &binary.programs[0];
    let Some(OpType::GetDevice(get_device)) = &program.operations[0].op_type else {
        panic!("expected a get-device operation");
    };
    assert_eq!(get_device.mesh, Some(Dim2d::new(2, 4)));
    assert_eq!(get_device.chip_ids, (0..8).collect::<Vec<_>>());

    let Some(OpType::Empty(empty)) = &program.operations[1].op_type else {
        panic!("expected an empty operation");
    };
    assert_eq!(empty.num_shards, 8);
    assert_eq!(empty.device, Some(0));
    assert_eq!(
        empty.strategy.as_ref().and_then(|strategy| strategy.strategy.clone()),
        Some(DistributedTensorConfig::ShardTensor2D(ShardTensor2D { shard_mesh: Some(Dim2d::new(2, 4)) })),
    );
}

fn mesh_shard_module(sharding: &str) -> Module {
    let mut module = mesh_module();
    let host = tensor_type(vec![64, 128], BufferType::SystemMemory);
    let shard = tensor_type(vec![32, 32], BufferType::SystemMemory);
    let sharding = parse_gspmd_sharding(sharding).unwrap();
    let mut builder = module.function_builder("shard");
    let input = builder.argument(host);
    let device = builder.argument(DeviceType::new((0..8).collect(), vec![2, 4]));
    let result = builder.value(shard);
    builder.append(MeshShardOp::from_sharding(input, device, MeshShardDirection::FullToShard, &sharding, result));
    builder.finish(vec![result]).unwrap();
    module
}

#[test]
fn test_mesh_shard() {
    let binary = lower(&mesh_shard_module("{devices=[2,4]<=[8]}"));
    let program = &binary.programs[0];
    assert_eq!(program.inputs, vec![0]);
    let Some(OpType::MeshShard(mesh_shard)) = &program.operations[0].op_type else {
        panic!("expected a mesh-shard operation");
    };
    assert_eq!(mesh_shard.input, 0);
    assert_eq!(mesh_shard.device, 0);
    assert_eq!(mesh_shard.shard_type, tessel_schema::MeshShardType::Devices as i32);
    assert_eq!(mesh_shard.shard_direction, tessel_schema::MeshShardDirection::FullToShardShape as i32);
    assert_eq!(mesh_shard.shard_shape, vec![2, 4]);
    assert_eq!(mesh_shard.shard_dims, vec![0, 1]);
}

#[test]
fn test_manual_mesh_shard() {
    assert_eq!(
        lower_module(&mesh_shard_module("{manual}"), &LoweringOptions::default()),
        Err(LoweringError::UnsupportedMeshShardType { shard_type: MeshShardType::Manual }),
    );
}

#[test]
fn test_corrupted_binaries_are_rejected() {
    let buffer = lower_module(&relu_module(), &LoweringOptions::default()).unwrap();

    let mut corrupted = buffer.clone();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0xff;
    assert_eq!(verify_size_prefixed(&corrupted), Err(SchemaError::DigestMismatch));

    let mut corrupted = buffer.clone();
    corrupted[4] = b'X';
    assert!(matches!(verify_size_prefixed(&corrupted), Err(SchemaError::UnknownIdentifier { .. })));

    assert!(matches!(verify_size_prefixed(&buffer[..buffer.len() - 1]), Err(SchemaError::LengthMismatch { .. })));
}

#[test]
fn test_every_corrupted_byte_is_detected() {
    let buffer = lower_module(&relu_module(), &LoweringOptions::default()).unwrap();
    for index in 0..buffer.len() {
        let mut corrupted = buffer.clone();
        corrupted[index] = corrupted[index].wrapping_add(1);
        assert!(verify_size_prefixed(&corrupted).is_err(), "corrupting byte {index} was not detected");
    }
}

#[test]
fn test_oversized_device_mesh() {
    let mut module = single_chip_module();
    let mut builder = module.function_builder("open");
    let device = builder.value(DeviceType::new(vec![0], vec![1 << 62, 4]));
    builder.append(GetDeviceOp { result: device });
    builder.finish(Vec::new()).unwrap();
    assert_eq!(
        lower_module(&module, &LoweringOptions::default()),
        Err(LoweringError::MeshTooLarge { mesh_shape: vec![1 << 62, 4] }),
    );
}

#[test]
fn test_functions_are_lowered_independently() {
    let mut module = relu_module();
    let host = tensor_type(vec![4, 4], BufferType::SystemMemory);
    let mut builder = module.function_builder("negate");
    let input = builder.argument(host.clone());
    let negated = builder.value(host);
    builder.append(EltwiseOp::new(EltwiseKind::Neg, vec![input], input, negated));
    builder.finish(vec![negated]).unwrap();

    let binary = lower(&module);
    assert_eq!(binary.programs.len(), 2);
    let program = &binary.programs[1];
    assert_eq!(program.name, "negate");
    assert_eq!(program.inputs, vec![4]);
    assert_eq!(program.outputs, vec![4]);
    assert_eq!(binary.objects.unwrap().tensor_refs.len(), 5);
}
