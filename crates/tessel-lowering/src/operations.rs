//! Encoders that turn IR [`Operation`]s into binary [`OpType`] records.
//!
//! Dispatch is a total match over [`Operation`], so every registered operation kind has exactly one encoder.
//! Elementwise and reduction operations share a single record type each and are encoded through [`ELTWISE_TABLE`]
//! and [`REDUCTION_TABLE`], which map every IR kind to its record type tag. [`check_encoder_registry`] verifies that
//! those tables cover every kind exactly once.

use std::collections::HashMap;

use tessel_ir::{
    EltwiseKind, EltwiseOp, EltwiseParameters, MeshShardType, Operation, OperationInterface, OperationKind,
    ReduceType, ReductionKind, ScaleFactor,
};
use tessel_schema as schema;
use tessel_schema::{EltwiseOpParams, EltwiseOpType, OpType, ReductionOpType};

use crate::assembler::LoweringContext;
use crate::descriptors::{data_type, mesh_shard_direction, mesh_shard_type, tensor_layout, to_i32};
use crate::distribution::distribution_strategy;
use crate::errors::LoweringError;

// ---------------------------------------------------------------------------
// Elementwise and reduction tables
// ---------------------------------------------------------------------------

/// Encoding of one [`EltwiseKind`].
#[derive(Copy, Clone, Debug)]
pub struct EltwiseEncoding {
    pub kind: EltwiseKind,
    pub op_type: EltwiseOpType,

    /// Converts the scalar parameters of the operation into their record, if the kind has any.
    pub parameters: fn(EltwiseParameters) -> Option<EltwiseOpParams>,

    /// Whether operations of this kind must write into a destination operand. Kinds that do not require one
    /// allocate their own result when no destination is given.
    pub destination: bool,
}

const fn eltwise(kind: EltwiseKind, op_type: EltwiseOpType) -> EltwiseEncoding {
    EltwiseEncoding { kind, op_type, parameters: no_parameters, destination: true }
}

fn no_parameters(_: EltwiseParameters) -> Option<EltwiseOpParams> {
    None
}

fn clamp_parameters(parameters: EltwiseParameters) -> Option<EltwiseOpParams> {
    match parameters {
        EltwiseParameters::Clamp { min, max } => Some(EltwiseOpParams::Clamp(schema::ClampOpParams { min, max })),
        _ => None,
    }
}

fn float_parameters(parameters: EltwiseParameters) -> Option<EltwiseOpParams> {
    match parameters {
        EltwiseParameters::Float { parameter } => {
            Some(EltwiseOpParams::Float(schema::EltwiseOpWithFloatParams { parameter }))
        }
        _ => None,
    }
}

pub const ELTWISE_TABLE: &[EltwiseEncoding] = &[
    eltwise(EltwiseKind::Abs, EltwiseOpType::Abs),
    eltwise(EltwiseKind::Add, EltwiseOpType::Add),
    eltwise(EltwiseKind::BitwiseAnd, EltwiseOpType::BitwiseAnd),
    eltwise(EltwiseKind::BitwiseNot, EltwiseOpType::BitwiseNot),
    eltwise(EltwiseKind::BitwiseOr, EltwiseOpType::BitwiseOr),
    eltwise(EltwiseKind::BitwiseXor, EltwiseOpType::BitwiseXor),
    eltwise(EltwiseKind::Cbrt, EltwiseOpType::Cbrt),
    eltwise(EltwiseKind::Ceil, EltwiseOpType::Ceil),
    EltwiseEncoding {
        kind: EltwiseKind::Clamp,
        op_type: EltwiseOpType::Clamp,
        parameters: clamp_parameters,
        destination: false,
    },
    eltwise(EltwiseKind::Cos, EltwiseOpType::Cos),
    eltwise(EltwiseKind::Div, EltwiseOpType::Div),
    eltwise(EltwiseKind::Equal, EltwiseOpType::Equal),
    eltwise(EltwiseKind::Exp, EltwiseOpType::Exp),
    eltwise(EltwiseKind::Expm1, EltwiseOpType::Expm1),
    eltwise(EltwiseKind::Floor, EltwiseOpType::Floor),
    eltwise(EltwiseKind::Gelu, EltwiseOpType::Gelu),
    eltwise(EltwiseKind::GreaterEqual, EltwiseOpType::GreaterEqual),
    eltwise(EltwiseKind::GreaterThan, EltwiseOpType::GreaterThan),
    eltwise(EltwiseKind::IsFinite, EltwiseOpType::IsFinite),
    EltwiseEncoding {
        kind: EltwiseKind::LeakyRelu,
        op_type: EltwiseOpType::LeakyRelu,
        parameters: float_parameters,
        destination: true,
    },
    eltwise(EltwiseKind::LessEqual, EltwiseOpType::LessEqual),
    eltwise(EltwiseKind::LessThan, EltwiseOpType::LessThan),
    eltwise(EltwiseKind::Log, EltwiseOpType::Log),
    eltwise(EltwiseKind::Log1p, EltwiseOpType::Log1p),
    eltwise(EltwiseKind::LogicalAnd, EltwiseOpType::LogicalAnd),
    eltwise(EltwiseKind::LogicalNot, EltwiseOpType::LogicalNot),
    eltwise(EltwiseKind::LogicalOr, EltwiseOpType::LogicalOr),
    eltwise(EltwiseKind::LogicalXor, EltwiseOpType::LogicalXor),
    eltwise(EltwiseKind::Maximum, EltwiseOpType::Maximum),
    eltwise(EltwiseKind::Minimum, EltwiseOpType::Minimum),
    eltwise(EltwiseKind::Multiply, EltwiseOpType::Multiply),
    eltwise(EltwiseKind::Neg, EltwiseOpType::Neg),
    eltwise(EltwiseKind::NotEqual, EltwiseOpType::NotEqual),
    eltwise(EltwiseKind::Power, EltwiseOpType::Power),
    eltwise(EltwiseKind::Reciprocal, EltwiseOpType::Reciprocal),
    eltwise(EltwiseKind::Relu, EltwiseOpType::Relu),
    eltwise(EltwiseKind::Remainder, EltwiseOpType::Remainder),
    eltwise(EltwiseKind::Rsqrt, EltwiseOpType::Rsqrt),
    eltwise(EltwiseKind::Scatter, EltwiseOpType::Scatter),
    eltwise(EltwiseKind::Sigmoid, EltwiseOpType::Sigmoid),
    eltwise(EltwiseKind::Sign, EltwiseOpType::Sign),
    eltwise(EltwiseKind::Sin, EltwiseOpType::Sin),
    eltwise(EltwiseKind::Sqrt, EltwiseOpType::Sqrt),
    eltwise(EltwiseKind::Subtract, EltwiseOpType::Subtract),
    eltwise(EltwiseKind::Tan, EltwiseOpType::Tan),
    eltwise(EltwiseKind::Tanh, EltwiseOpType::Tanh),
    eltwise(EltwiseKind::Where, EltwiseOpType::Where),
];

pub const REDUCTION_TABLE: &[(ReductionKind, ReductionOpType)] = &[
    (ReductionKind::Sum, ReductionOpType::Sum),
    (ReductionKind::Mean, ReductionOpType::Mean),
    (ReductionKind::Max, ReductionOpType::Max),
    (ReductionKind::Min, ReductionOpType::Min),
];

fn eltwise_encoding(kind: EltwiseKind) -> Result<&'static EltwiseEncoding, LoweringError> {
    ELTWISE_TABLE
        .iter()
        .find(|encoding| encoding.kind == kind)
        .ok_or_else(|| LoweringError::MissingEncoder { kind: format!("{kind:?}") })
}

fn reduction_op_type(kind: ReductionKind) -> Result<ReductionOpType, LoweringError> {
    REDUCTION_TABLE
        .iter()
        .find(|(reduction_kind, _)| *reduction_kind == kind)
        .map(|&(_, op_type)| op_type)
        .ok_or_else(|| LoweringError::MissingEncoder { kind: format!("{kind:?}") })
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Returns the tag of the [`OpType`] variant that operations of the provided kind are encoded as.
pub fn operation_tag(kind: OperationKind) -> u32 {
    let op_type = match kind {
        OperationKind::GetDevice => OpType::GetDevice(Default::default()),
        OperationKind::ToMemoryConfig => OpType::ToMemoryConfig(Default::default()),
        OperationKind::ToLayout => OpType::ToLayout(Default::default()),
        OperationKind::ToDType => OpType::ToDType(Default::default()),
        OperationKind::Typecast => OpType::Typecast(Default::default()),
        OperationKind::ToDevice => OpType::ToDevice(Default::default()),
        OperationKind::FromDevice => OpType::FromDevice(Default::default()),
        OperationKind::Empty => OpType::Empty(Default::default()),
        OperationKind::Full => OpType::Full(Default::default()),
        OperationKind::Arange => OpType::Arange(Default::default()),
        OperationKind::Zeros => OpType::Zeros(Default::default()),
        OperationKind::Ones => OpType::Ones(Default::default()),
        OperationKind::Linear => OpType::Linear(Default::default()),
        OperationKind::Matmul => OpType::Matmul(Default::default()),
        OperationKind::MorehCumSum => OpType::MorehCumSum(Default::default()),
        OperationKind::Prod => OpType::ReductionProd(Default::default()),
        OperationKind::Embedding => OpType::Embedding(Default::default()),
        OperationKind::EmbeddingBackward => OpType::EmbeddingBackward(Default::default()),
        OperationKind::RepeatInterleave => OpType::RepeatInterleave(Default::default()),
        OperationKind::Softmax => OpType::Softmax(Default::default()),
        OperationKind::Transpose => OpType::Transpose(Default::default()),
        OperationKind::Conv2d => OpType::Conv2d(Default::default()),
        OperationKind::ConvTranspose2d => OpType::ConvTranspose2d(Default::default()),
        OperationKind::AllGather => OpType::AllGather(Default::default()),
        OperationKind::ReduceScatter => OpType::ReduceScatter(Default::default()),
        OperationKind::MeshShard => OpType::MeshShard(Default::default()),
        OperationKind::Concat => OpType::Concat(Default::default()),
        OperationKind::Reshape => OpType::Reshape(Default::default()),
        OperationKind::Repeat => OpType::Repeat(Default::default()),
        OperationKind::Pad => OpType::Pad(Default::default()),
        OperationKind::Slice => OpType::Slice(Default::default()),
        OperationKind::MaxPool2d => OpType::MaxPool2d(Default::default()),
        OperationKind::Deallocate => OpType::Deallocate(Default::default()),
        OperationKind::UpdateCache => OpType::UpdateCache(Default::default()),
        OperationKind::FillCache => OpType::FillCache(Default::default()),
        OperationKind::Permute => OpType::Permute(Default::default()),
        OperationKind::Upsample => OpType::Upsample(Default::default()),
        OperationKind::Eltwise(_) => OpType::Eltwise(Default::default()),
        OperationKind::Reduction(_) => OpType::Reduction(Default::default()),
    };
    op_type.tag()
}

/// Checks that every registered [`OperationKind`] has exactly one encoding: every kind maps to a known [`OpType`] tag,
/// kinds other than elementwise and reduction kinds map to distinct tags, and every elementwise and reduction kind has
/// exactly one entry in its table, with a record type that no other kind uses.
pub fn check_encoder_registry() -> Result<(), LoweringError> {
    let missing = |kind: OperationKind| LoweringError::MissingEncoder { kind: format!("{kind:?}") };
    let mut tags = HashMap::new();
    let mut eltwise_types = HashMap::new();
    let mut reduction_types = HashMap::new();
    for kind in OperationKind::all() {
        let tag = operation_tag(kind);
        if !OpType::TAGS.contains(&tag) {
            return Err(missing(kind));
        }
        let unique = match kind {
            OperationKind::Eltwise(eltwise_kind) => {
                if ELTWISE_TABLE.iter().filter(|encoding| encoding.kind == eltwise_kind).count() != 1 {
                    return Err(missing(kind));
                }
                eltwise_types.insert(eltwise_encoding(eltwise_kind)?.op_type, kind).is_none()
            }
            OperationKind::Reduction(reduction_kind) => {
                reduction_types.insert(reduction_op_type(reduction_kind)?, kind).is_none()
            }
            kind => tags.insert(tag, kind).is_none(),
        };
        if !unique {
            return Err(missing(kind));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Encodes `operation`, building (or looking up) the records of its operands and results along the way.
pub fn encode_operation(ctx: &mut LoweringContext<'_>, operation: &Operation) -> Result<OpType, LoweringError> {
    let module = ctx.module();
    Ok(match operation {
        Operation::GetDevice(op) => {
            let device_type = module.device_type(op.result)?;
            let mesh_volume = device_type
                .mesh_volume()
                .ok_or_else(|| LoweringError::MeshTooLarge { mesh_shape: device_type.mesh_shape.clone() })?;
            let mesh = if mesh_volume > 1 {
                match device_type.mesh_shape.as_slice() {
                    &[columns] => schema::Dim2d::new(1, to_i32("mesh columns", columns)?),
                    &[rows, columns] => {
                        schema::Dim2d::new(to_i32("mesh rows", rows)?, to_i32("mesh columns", columns)?)
                    }
                    mesh_shape => return Err(LoweringError::UnsupportedMeshRank { mesh_shape: mesh_shape.to_vec() }),
                }
            } else {
                schema::Dim2d::new(1, 1)
            };
            OpType::GetDevice(schema::GetDeviceOp {
                mesh: Some(mesh),
                chip_ids: device_type.chip_ids.clone(),
                out: ctx.create_device(op.result)?,
            })
        }
        Operation::ToMemoryConfig(op) => OpType::ToMemoryConfig(schema::ToMemoryConfigOp {
            input: ctx.input(op.input)?,
            memcfg: ctx.memory_config(&op.memory_config)?,
            out: ctx.output(op.result)?,
        }),
        Operation::ToLayout(op) => OpType::ToLayout(schema::ToLayoutOp {
            input: ctx.input(op.input)?,
            layout: tensor_layout(op.layout).into(),
            dtype: op.data_type.map(|dt| data_type(dt).into()),
            memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
            device: ctx.optional_device(op.device)?,
            out: ctx.output(op.result)?,
        }),
        Operation::ToDType(op) => OpType::ToDType(schema::DataTypeConversionOp {
            input: ctx.input(op.input)?,
            dtype: data_type(op.data_type).into(),
            out: ctx.output(op.result)?,
        }),
        Operation::Typecast(op) => OpType::Typecast(schema::DataTypeConversionOp {
            input: ctx.input(op.input)?,
            dtype: data_type(op.data_type).into(),
            out: ctx.output(op.result)?,
        }),
        Operation::ToDevice(op) => OpType::ToDevice(schema::ToDeviceOp {
            input: ctx.input(op.input)?,
            device: ctx.device(op.device)?,
            memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
            out: ctx.output(op.result)?,
        }),
        Operation::FromDevice(op) => {
            OpType::FromDevice(schema::FromDeviceOp { input: ctx.input(op.input)?, out: ctx.output(op.result)? })
        }
        Operation::Empty(op) => {
            let device_type = ctx.device_type(op.device)?;
            let (strategy, num_shards) = distribution_strategy(device_type, module.tensor_type(op.result)?)?;
            OpType::Empty(schema::EmptyOp {
                shape: op.shape.clone(),
                dtype: data_type(op.data_type).into(),
                layout: tensor_layout(op.layout).into(),
                num_shards,
                device: ctx.optional_device(op.device)?,
                memcfg: ctx.memory_config(&op.memory_config)?,
                strategy: Some(strategy),
                out: ctx.output(op.result)?,
            })
        }
        Operation::Full(op) => {
            let device_type = ctx.device_type(op.device)?;
            let (strategy, num_shards) = distribution_strategy(device_type, module.tensor_type(op.result)?)?;
            OpType::Full(schema::FullOp {
                device: ctx.optional_device(op.device)?,
                fill_value: op.fill_value,
                num_shards,
                strategy: Some(strategy),
                out: ctx.output(op.result)?,
            })
        }
        Operation::Arange(op) => OpType::Arange(schema::ArangeOp {
            start: op.start as f32,
            end: op.end as f32,
            step: op.step as f32,
            dtype: op.data_type.map(|dt| data_type(dt).into()),
            device: ctx.optional_device(op.device)?,
            memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
            out: ctx.output(op.result)?,
        }),
        Operation::Zeros(op) => OpType::Zeros(encode_constant_fill(ctx, &op.0)?),
        Operation::Ones(op) => OpType::Ones(encode_constant_fill(ctx, &op.0)?),
        Operation::Eltwise(op) => OpType::Eltwise(encode_eltwise(ctx, op)?),
        Operation::Linear(op) => OpType::Linear(schema::LinearOp {
            in0: ctx.input(op.a)?,
            in1: ctx.input(op.b)?,
            bias: ctx.optional_input(op.bias)?,
            out: ctx.destination(op.output, op.result)?,
        }),
        Operation::Matmul(op) => OpType::Matmul(schema::MatmulOp {
            in0: ctx.input(op.a)?,
            in1: ctx.input(op.b)?,
            out: ctx.destination(op.output, op.result)?,
        }),
        Operation::MorehCumSum(op) => OpType::MorehCumSum(schema::MorehCumSumOp {
            input: ctx.input(op.input)?,
            out: ctx.destination(op.output, op.result)?,
            dim: op.dim,
            memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
        }),
        Operation::Reduction(op) => OpType::Reduction(schema::ReductionOp {
            r#type: reduction_op_type(op.kind)?.into(),
            input: ctx.input(op.input)?,
            out: ctx.output(op.result)?,
            dim_arg: op.dim_arg.clone().unwrap_or_default(),
            keep_dim: op.keep_dim,
        }),
        Operation::Prod(op) => OpType::ReductionProd(schema::ReductionProdOp {
            input: ctx.input(op.input)?,
            out: ctx.output(op.result)?,
            all_dimensions: op.all_dimensions,
            dim_arg: op.dim_arg,
            keep_dim: op.keep_dim,
            memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
        }),
        Operation::Embedding(op) => OpType::Embedding(schema::EmbeddingOp {
            input: ctx.input(op.input)?,
            weight: ctx.input(op.weight)?,
            out: ctx.destination(op.output, op.result)?,
        }),
        Operation::EmbeddingBackward(op) => OpType::EmbeddingBackward(schema::EmbeddingBackwardOp {
            input: ctx.input(op.input)?,
            weight: ctx.input(op.weight)?,
            in_grad: ctx.input(op.in_gradient)?,
            dtype: op.data_type.map(|dt| data_type(dt).into()),
            memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
            out: ctx.destination(op.output, op.result)?,
        }),
        Operation::RepeatInterleave(op) => OpType::RepeatInterleave(schema::RepeatInterleaveOp {
            input: ctx.input(op.input)?,
            out: ctx.output(op.result)?,
            repeats: op.repeats,
            dim: op.dim,
            memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
        }),
        Operation::Softmax(op) => OpType::Softmax(schema::SoftmaxOp {
            input: ctx.input(op.input)?,
            out: ctx.output(op.result)?,
            dimension: op.dimension,
        }),
        Operation::Transpose(op) => OpType::Transpose(schema::TransposeOp {
            input: ctx.input(op.input)?,
            out: ctx.output(op.result)?,
            dim0: op.dim0,
            dim1: op.dim1,
        }),
        Operation::Conv2d(op) => OpType::Conv2d(schema::Conv2dOp {
            input: ctx.input(op.input)?,
            weight: ctx.input(op.weight)?,
            bias: ctx.optional_input(op.bias)?,
            out: ctx.destination(op.output, op.result)?,
            device: ctx.device(op.device)?,
            in_channels: op.in_channels,
            out_channels: op.out_channels,
            batch_size: op.batch_size,
            input_height: op.input_height,
            input_width: op.input_width,
            kernel_height: op.kernel_size[0],
            kernel_width: op.kernel_size[1],
            stride_height: op.stride[0],
            stride_width: op.stride[1],
            padding_height: op.padding[0],
            padding_width: op.padding[1],
            dilation_height: op.dilation[0],
            dilation_width: op.dilation[1],
            groups: op.groups,
        }),
        Operation::ConvTranspose2d(op) => OpType::ConvTranspose2d(schema::ConvTranspose2dOp {
            input: ctx.input(op.input)?,
            weight: ctx.input(op.weight)?,
            bias: ctx.optional_input(op.bias)?,
            out: ctx.destination(op.output, op.result)?,
            device: ctx.device(op.device)?,
            in_channels: op.in_channels,
            out_channels: op.out_channels,
            batch_size: op.batch_size,
            input_height: op.input_height,
            input_width: op.input_width,
            kernel_size: op.kernel_size.to_vec(),
            stride: op.stride.to_vec(),
            padding: op.padding.to_vec(),
            output_padding: op.output_padding.to_vec(),
            dilation: op.dilation.to_vec(),
            groups: op.groups,
        }),
        Operation::AllGather(op) => OpType::AllGather(schema::AllGatherOp {
            input: ctx.input(op.input)?,
            out: ctx.output(op.result)?,
            device: ctx.device(op.device)?,
            dim: op.dim,
            num_links: op.num_links,
        }),
        Operation::ReduceScatter(op) => OpType::ReduceScatter(schema::ReduceScatterOp {
            input: ctx.input(op.input)?,
            out: ctx.output(op.result)?,
            device: ctx.device(op.device)?,
            scatter_split_dim: op.scatter_split_dim,
            math_op: reduce_type(op.math_op),
            num_links: op.num_links,
        }),
        Operation::MeshShard(op) => {
            if !matches!(op.shard_type, MeshShardType::Replicate | MeshShardType::Devices) {
                return Err(LoweringError::UnsupportedMeshShardType { shard_type: op.shard_type });
            }
            OpType::MeshShard(schema::MeshShardOp {
                input: ctx.input(op.input)?,
                out: ctx.output(op.result)?,
                device: ctx.device(op.device)?,
                shard_direction: mesh_shard_direction(op.shard_direction).into(),
                shard_type: mesh_shard_type(op.shard_type).into(),
                shard_shape: op.shard_shape.clone(),
                shard_dims: op.shard_dims.clone(),
            })
        }
        Operation::Concat(op) => OpType::Concat(schema::ConcatOp {
            inputs: ctx.inputs(&op.inputs)?,
            out: ctx.destination(op.output, op.result)?,
            dim: op.dim,
            memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
        }),
        Operation::Reshape(op) => OpType::Reshape(schema::ReshapeOp {
            input: ctx.input(op.input)?,
            out: ctx.output(op.result)?,
            shape: op.shape.clone(),
        }),
        Operation::Repeat(op) => OpType::Repeat(schema::RepeatOp {
            input: ctx.input(op.input)?,
            out: ctx.output(op.result)?,
            repeat_dims: op.repeat_dims.clone(),
        }),
        Operation::Pad(op) => OpType::Pad(schema::PadOp {
            input: ctx.input(op.input)?,
            out: ctx.output(op.result)?,
            padding: op.padding.clone(),
            value: op.value,
            use_multicore: op.use_multicore,
            memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
        }),
        Operation::Slice(op) => OpType::Slice(schema::SliceOp {
            input: ctx.input(op.input)?,
            out: ctx.destination(op.output, op.result)?,
            begins: op.begins.clone(),
            ends: op.ends.clone(),
            step: op.step.clone(),
        }),
        Operation::MaxPool2d(op) => OpType::MaxPool2d(schema::MaxPool2dOp {
            input: ctx.input(op.input)?,
            out: ctx.destination(op.output, op.result)?,
            device: ctx.device(op.device)?,
            batch_size: op.batch_size,
            input_height: op.input_height,
            input_width: op.input_width,
            channels: op.channels,
            kernel_height: op.kernel_size[0],
            kernel_width: op.kernel_size[1],
            stride_height: op.stride[0],
            stride_width: op.stride[1],
            dilation_height: op.dilation[0],
            dilation_width: op.dilation[1],
            ceil_mode: op.ceil_mode,
            padding_height: op.padding[0],
            padding_width: op.padding[1],
        }),
        Operation::Deallocate(op) => {
            OpType::Deallocate(schema::DeallocateOp { input: ctx.input(op.input)?, force: op.force })
        }
        Operation::UpdateCache(op) => OpType::UpdateCache(schema::UpdateCacheOp {
            cache: ctx.input(op.cache)?,
            input: ctx.input(op.input)?,
            update_index: ctx.input(op.update_index)?,
            batch_offset: op.batch_offset,
        }),
        Operation::FillCache(op) => OpType::FillCache(schema::FillCacheOp {
            cache: ctx.input(op.cache)?,
            input: ctx.input(op.input)?,
            batch_offset: op.batch_offset,
        }),
        Operation::Permute(op) => OpType::Permute(schema::PermuteOp {
            input: ctx.input(op.input)?,
            permutation: op.permutation.clone(),
            memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
            pad_value: op.pad_value,
            out: ctx.output(op.result)?,
        }),
        Operation::Upsample(op) => OpType::Upsample(schema::UpsampleOp {
            input: ctx.input(op.input)?,
            scale_factor: Some(match &op.scale_factor {
                ScaleFactor::Uniform(scale) => schema::Scale2D::Uniform(schema::UniformScale2D { scale: *scale }),
                ScaleFactor::NonUniform(scale) => {
                    schema::Scale2D::NonUniform(schema::NonUniformScale2D { scale: scale.clone() })
                }
            }),
            mode: op.mode.clone(),
            memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
            out: ctx.output(op.result)?,
        }),
        Operation::Unregistered(op) => return Err(LoweringError::UnhandledOperation { name: op.name().to_string() }),
    })
}

fn encode_constant_fill(
    ctx: &mut LoweringContext<'_>,
    op: &tessel_ir::ConstantFillOp,
) -> Result<schema::ConstantOp, LoweringError> {
    Ok(schema::ConstantOp {
        shape: op.shape.clone(),
        dtype: op.data_type.map(|dt| data_type(dt).into()),
        layout: op.layout.map(|layout| tensor_layout(layout).into()),
        device: ctx.optional_device(op.device)?,
        memcfg: ctx.optional_memory_config(op.memory_config.as_ref())?,
        out: ctx.output(op.result)?,
    })
}

fn encode_eltwise(ctx: &mut LoweringContext<'_>, op: &EltwiseOp) -> Result<schema::EltwiseOp, LoweringError> {
    let encoding = eltwise_encoding(op.kind)?;
    let ins = ctx.inputs(&op.inputs)?;
    let out = match op.output {
        Some(output) => ctx.destination(output, op.result)?,
        None if encoding.destination => {
            return Err(LoweringError::MissingDestination { operation: op.name().to_string() });
        }
        None => ctx.output(op.result)?,
    };
    Ok(schema::EltwiseOp { r#type: encoding.op_type.into(), ins, out, params: (encoding.parameters)(op.parameters) })
}

/// Encodes the reduction of a collective operation as its position in the runtime's reduction enumeration.
fn reduce_type(reduce_type: ReduceType) -> u32 {
    match reduce_type {
        ReduceType::Sum => 0,
        ReduceType::Mean => 1,
        ReduceType::Max => 2,
        ReduceType::Min => 3,
        ReduceType::Std => 4,
        ReduceType::Var => 5,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_check_encoder_registry() {
        assert_eq!(check_encoder_registry(), Ok(()));
    }

    #[test]
    fn test_eltwise_table_covers_every_kind_once() {
        assert_eq!(ELTWISE_TABLE.len(), EltwiseKind::ALL.len());
        for (encoding, kind) in ELTWISE_TABLE.iter().zip(EltwiseKind::ALL) {
            assert_eq!(encoding.kind, *kind);
        }
        let op_types = ELTWISE_TABLE.iter().map(|encoding| encoding.op_type).collect::<HashSet<_>>();
        assert_eq!(op_types.len(), ELTWISE_TABLE.len());
        let without_destination = ELTWISE_TABLE
            .iter()
            .filter(|encoding| !encoding.destination)
            .map(|encoding| encoding.kind)
            .collect::<Vec<_>>();
        assert_eq!(without_destination, vec![EltwiseKind::Clamp]);
    }

    #[test]
    fn test_eltwise_parameters() {
        let clamp = eltwise_encoding(EltwiseKind::Clamp).unwrap();
        assert_eq!(
            (clamp.parameters)(EltwiseParameters::Clamp { min: -1.0, max: 2.0 }),
            Some(EltwiseOpParams::Clamp(schema::ClampOpParams { min: -1.0, max: 2.0 })),
        );
        let leaky_relu = eltwise_encoding(EltwiseKind::LeakyRelu).unwrap();
        assert_eq!(
            (leaky_relu.parameters)(EltwiseParameters::Float { parameter: 0.01 }),
            Some(EltwiseOpParams::Float(schema::EltwiseOpWithFloatParams { parameter: 0.01 })),
        );
        let relu = eltwise_encoding(EltwiseKind::Relu).unwrap();
        assert_eq!((relu.parameters)(EltwiseParameters::None), None);
    }

    #[test]
    fn test_operation_tags() {
        assert_eq!(operation_tag(OperationKind::GetDevice), 1);
        assert_eq!(operation_tag(OperationKind::Eltwise(EltwiseKind::Add)), 13);
        assert_eq!(operation_tag(OperationKind::Eltwise(EltwiseKind::Where)), 13);
        assert_eq!(operation_tag(OperationKind::Reduction(ReductionKind::Max)), 17);
        assert_eq!(operation_tag(OperationKind::Prod), 18);
        assert_eq!(operation_tag(OperationKind::Upsample), 39);
        let tags = OperationKind::all().map(operation_tag).collect::<HashSet<_>>();
        assert_eq!(tags.len(), OpType::TAGS.len());
    }

    #[test]
    fn test_reduce_type_ordinals() {
        let reduce_types =
            [ReduceType::Sum, ReduceType::Mean, ReduceType::Max, ReduceType::Min, ReduceType::Std, ReduceType::Var];
        assert_eq!(reduce_types.map(reduce_type), [0, 1, 2, 3, 4, 5]);
    }
}
