//! Operation records of the binary schema.
//!
//! Every operation of a program is stored as an [`Operation`], whose [`OpType`] holds the kind-specific record. Tensor,
//! device, and memory configuration operands are handles into the [`ObjectTable`](crate::ObjectTable).

use prost::{Enumeration, Message, Oneof};

use crate::records::{Dim2d, DistributionStrategy};

#[derive(Clone, PartialEq, Message)]
pub struct GetDeviceOp {
    #[prost(message, optional, tag = "1")]
    pub mesh: Option<Dim2d>,
    #[prost(uint32, repeated, tag = "2")]
    pub chip_ids: Vec<u32>,
    #[prost(uint32, tag = "3")]
    pub out: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ToMemoryConfigOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub memcfg: u32,
    #[prost(uint32, tag = "3")]
    pub out: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ToLayoutOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(enumeration = "crate::records::TensorLayout", tag = "2")]
    pub layout: i32,
    #[prost(enumeration = "crate::records::DataType", optional, tag = "3")]
    pub dtype: Option<i32>,
    #[prost(uint32, optional, tag = "4")]
    pub memcfg: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub device: Option<u32>,
    #[prost(uint32, tag = "6")]
    pub out: u32,
}

/// Data type conversion, shared by [`OpType::ToDType`] (on the host) and [`OpType::Typecast`] (on the device).
#[derive(Clone, PartialEq, Message)]
pub struct DataTypeConversionOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(enumeration = "crate::records::DataType", tag = "2")]
    pub dtype: i32,
    #[prost(uint32, tag = "3")]
    pub out: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ToDeviceOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub device: u32,
    #[prost(uint32, optional, tag = "3")]
    pub memcfg: Option<u32>,
    #[prost(uint32, tag = "4")]
    pub out: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct FromDeviceOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct EmptyOp {
    #[prost(int64, repeated, tag = "1")]
    pub shape: Vec<i64>,
    #[prost(enumeration = "crate::records::DataType", tag = "2")]
    pub dtype: i32,
    #[prost(enumeration = "crate::records::TensorLayout", tag = "3")]
    pub layout: i32,

    /// Number of devices the tensor is allocated on.
    #[prost(uint32, tag = "4")]
    pub num_shards: u32,

    #[prost(uint32, optional, tag = "5")]
    pub device: Option<u32>,
    #[prost(uint32, tag = "6")]
    pub memcfg: u32,
    #[prost(message, optional, tag = "7")]
    pub strategy: Option<DistributionStrategy>,
    #[prost(uint32, tag = "8")]
    pub out: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct FullOp {
    #[prost(uint32, optional, tag = "1")]
    pub device: Option<u32>,
    #[prost(float, tag = "2")]
    pub fill_value: f32,
    #[prost(uint32, tag = "3")]
    pub num_shards: u32,
    #[prost(message, optional, tag = "4")]
    pub strategy: Option<DistributionStrategy>,
    #[prost(uint32, tag = "5")]
    pub out: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ArangeOp {
    #[prost(float, tag = "1")]
    pub start: f32,
    #[prost(float, tag = "2")]
    pub end: f32,
    #[prost(float, tag = "3")]
    pub step: f32,
    #[prost(enumeration = "crate::records::DataType", optional, tag = "4")]
    pub dtype: Option<i32>,
    #[prost(uint32, optional, tag = "5")]
    pub device: Option<u32>,
    #[prost(uint32, optional, tag = "6")]
    pub memcfg: Option<u32>,
    #[prost(uint32, tag = "7")]
    pub out: u32,
}

/// Tensor creation with a constant fill value implied by the kind of the enclosing [`OpType`] (zeros or ones).
#[derive(Clone, PartialEq, Message)]
pub struct ConstantOp {
    #[prost(int64, repeated, tag = "1")]
    pub shape: Vec<i64>,
    #[prost(enumeration = "crate::records::DataType", optional, tag = "2")]
    pub dtype: Option<i32>,
    #[prost(enumeration = "crate::records::TensorLayout", optional, tag = "3")]
    pub layout: Option<i32>,
    #[prost(uint32, optional, tag = "4")]
    pub device: Option<u32>,
    #[prost(uint32, optional, tag = "5")]
    pub memcfg: Option<u32>,
    #[prost(uint32, tag = "6")]
    pub out: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum EltwiseOpType {
    Abs = 0,
    Add = 1,
    BitwiseAnd = 2,
    BitwiseNot = 3,
    BitwiseOr = 4,
    BitwiseXor = 5,
    Cbrt = 6,
    Ceil = 7,
    Clamp = 8,
    Cos = 9,
    Div = 10,
    Equal = 11,
    Exp = 12,
    Expm1 = 13,
    Floor = 14,
    Gelu = 15,
    GreaterEqual = 16,
    GreaterThan = 17,
    IsFinite = 18,
    LeakyRelu = 19,
    LessEqual = 20,
    LessThan = 21,
    Log = 22,
    Log1p = 23,
    LogicalAnd = 24,
    LogicalNot = 25,
    LogicalOr = 26,
    LogicalXor = 27,
    Maximum = 28,
    Minimum = 29,
    Multiply = 30,
    Neg = 31,
    NotEqual = 32,
    Power = 33,
    Reciprocal = 34,
    Relu = 35,
    Remainder = 36,
    Rsqrt = 37,
    Scatter = 38,
    Sigmoid = 39,
    Sign = 40,
    Sin = 41,
    Sqrt = 42,
    Subtract = 43,
    Tan = 44,
    Tanh = 45,
    Where = 46,
}

#[derive(Clone, Copy, PartialEq, Message)]
pub struct ClampOpParams {
    #[prost(float, tag = "1")]
    pub min: f32,
    #[prost(float, tag = "2")]
    pub max: f32,
}

#[derive(Clone, Copy, PartialEq, Message)]
pub struct EltwiseOpWithFloatParams {
    #[prost(float, tag = "1")]
    pub parameter: f32,
}

#[derive(Clone, Copy, PartialEq, Oneof)]
pub enum EltwiseOpParams {
    #[prost(message, tag = "4")]
    Clamp(ClampOpParams),
    #[prost(message, tag = "5")]
    Float(EltwiseOpWithFloatParams),
}

#[derive(Clone, PartialEq, Message)]
pub struct EltwiseOp {
    #[prost(enumeration = "EltwiseOpType", tag = "1")]
    pub r#type: i32,
    #[prost(uint32, repeated, tag = "2")]
    pub ins: Vec<u32>,
    #[prost(uint32, tag = "3")]
    pub out: u32,
    #[prost(oneof = "EltwiseOpParams", tags = "4, 5")]
    pub params: Option<EltwiseOpParams>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LinearOp {
    #[prost(uint32, tag = "1")]
    pub in0: u32,
    #[prost(uint32, tag = "2")]
    pub in1: u32,
    #[prost(uint32, optional, tag = "3")]
    pub bias: Option<u32>,
    #[prost(uint32, tag = "4")]
    pub out: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct MatmulOp {
    #[prost(uint32, tag = "1")]
    pub in0: u32,
    #[prost(uint32, tag = "2")]
    pub in1: u32,
    #[prost(uint32, tag = "3")]
    pub out: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct MorehCumSumOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(int64, tag = "3")]
    pub dim: i64,
    #[prost(uint32, optional, tag = "4")]
    pub memcfg: Option<u32>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum ReductionOpType {
    Sum = 0,
    Mean = 1,
    Max = 2,
    Min = 3,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReductionOp {
    #[prost(enumeration = "ReductionOpType", tag = "1")]
    pub r#type: i32,
    #[prost(uint32, tag = "2")]
    pub input: u32,
    #[prost(uint32, tag = "3")]
    pub out: u32,

    /// Reduced dimensions. Empty when the reduction is over all dimensions.
    #[prost(int32, repeated, tag = "4")]
    pub dim_arg: Vec<i32>,

    #[prost(bool, tag = "5")]
    pub keep_dim: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReductionProdOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(bool, tag = "3")]
    pub all_dimensions: bool,
    #[prost(int64, tag = "4")]
    pub dim_arg: i64,
    #[prost(bool, tag = "5")]
    pub keep_dim: bool,
    #[prost(uint32, optional, tag = "6")]
    pub memcfg: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EmbeddingOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub weight: u32,
    #[prost(uint32, tag = "3")]
    pub out: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct EmbeddingBackwardOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub weight: u32,
    #[prost(uint32, tag = "3")]
    pub in_grad: u32,
    #[prost(enumeration = "crate::records::DataType", optional, tag = "4")]
    pub dtype: Option<i32>,
    #[prost(uint32, optional, tag = "5")]
    pub memcfg: Option<u32>,
    #[prost(uint32, tag = "6")]
    pub out: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct RepeatInterleaveOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(uint32, tag = "3")]
    pub repeats: u32,
    #[prost(int32, tag = "4")]
    pub dim: i32,
    #[prost(uint32, optional, tag = "5")]
    pub memcfg: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SoftmaxOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(int32, tag = "3")]
    pub dimension: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct TransposeOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(int32, tag = "3")]
    pub dim0: i32,
    #[prost(int32, tag = "4")]
    pub dim1: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct Conv2dOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub weight: u32,
    #[prost(uint32, optional, tag = "3")]
    pub bias: Option<u32>,
    #[prost(uint32, tag = "4")]
    pub out: u32,
    #[prost(uint32, tag = "5")]
    pub device: u32,
    #[prost(uint32, tag = "6")]
    pub in_channels: u32,
    #[prost(uint32, tag = "7")]
    pub out_channels: u32,
    #[prost(uint32, tag = "8")]
    pub batch_size: u32,
    #[prost(uint32, tag = "9")]
    pub input_height: u32,
    #[prost(uint32, tag = "10")]
    pub input_width: u32,
    #[prost(uint32, tag = "11")]
    pub kernel_height: u32,
    #[prost(uint32, tag = "12")]
    pub kernel_width: u32,
    #[prost(uint32, tag = "13")]
    pub stride_height: u32,
    #[prost(uint32, tag = "14")]
    pub stride_width: u32,
    #[prost(uint32, tag = "15")]
    pub padding_height: u32,
    #[prost(uint32, tag = "16")]
    pub padding_width: u32,
    #[prost(uint32, tag = "17")]
    pub dilation_height: u32,
    #[prost(uint32, tag = "18")]
    pub dilation_width: u32,
    #[prost(uint32, tag = "19")]
    pub groups: u32,
}

/// Transposed convolution. Spatial attributes are stored as `[height, width]` pairs.
#[derive(Clone, PartialEq, Message)]
pub struct ConvTranspose2dOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub weight: u32,
    #[prost(uint32, optional, tag = "3")]
    pub bias: Option<u32>,
    #[prost(uint32, tag = "4")]
    pub out: u32,
    #[prost(uint32, tag = "5")]
    pub device: u32,
    #[prost(uint32, tag = "6")]
    pub in_channels: u32,
    #[prost(uint32, tag = "7")]
    pub out_channels: u32,
    #[prost(uint32, tag = "8")]
    pub batch_size: u32,
    #[prost(uint32, tag = "9")]
    pub input_height: u32,
    #[prost(uint32, tag = "10")]
    pub input_width: u32,
    #[prost(int32, repeated, tag = "11")]
    pub kernel_size: Vec<i32>,
    #[prost(int32, repeated, tag = "12")]
    pub stride: Vec<i32>,
    #[prost(int32, repeated, tag = "13")]
    pub padding: Vec<i32>,
    #[prost(int32, repeated, tag = "14")]
    pub output_padding: Vec<i32>,
    #[prost(int32, repeated, tag = "15")]
    pub dilation: Vec<i32>,
    #[prost(uint32, tag = "16")]
    pub groups: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct AllGatherOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(uint32, tag = "3")]
    pub device: u32,
    #[prost(int32, tag = "4")]
    pub dim: i32,
    #[prost(uint32, tag = "5")]
    pub num_links: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReduceScatterOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(uint32, tag = "3")]
    pub device: u32,
    #[prost(int32, tag = "4")]
    pub scatter_split_dim: i32,

    /// Reduction applied to the scattered shards, as the ordinal of the IR reduce type (`sum`, `mean`, `max`, `min`,
    /// `std`, `var`).
    #[prost(uint32, tag = "5")]
    pub math_op: u32,

    #[prost(uint32, tag = "6")]
    pub num_links: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct MeshShardOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(uint32, tag = "3")]
    pub device: u32,
    #[prost(enumeration = "crate::records::MeshShardDirection", tag = "4")]
    pub shard_direction: i32,
    #[prost(enumeration = "crate::records::MeshShardType", tag = "5")]
    pub shard_type: i32,
    #[prost(int64, repeated, tag = "6")]
    pub shard_shape: Vec<i64>,
    #[prost(int64, repeated, tag = "7")]
    pub shard_dims: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ConcatOp {
    #[prost(uint32, repeated, tag = "1")]
    pub inputs: Vec<u32>,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(int32, tag = "3")]
    pub dim: i32,
    #[prost(uint32, optional, tag = "4")]
    pub memcfg: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReshapeOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(int32, repeated, tag = "3")]
    pub shape: Vec<i32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct RepeatOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(int64, repeated, tag = "3")]
    pub repeat_dims: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PadOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(uint32, repeated, tag = "3")]
    pub padding: Vec<u32>,
    #[prost(float, tag = "4")]
    pub value: f32,
    #[prost(bool, tag = "5")]
    pub use_multicore: bool,
    #[prost(uint32, optional, tag = "6")]
    pub memcfg: Option<u32>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SliceOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(int64, repeated, tag = "3")]
    pub begins: Vec<i64>,
    #[prost(int64, repeated, tag = "4")]
    pub ends: Vec<i64>,
    #[prost(int64, repeated, tag = "5")]
    pub step: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MaxPool2dOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(uint32, tag = "2")]
    pub out: u32,
    #[prost(uint32, tag = "3")]
    pub device: u32,
    #[prost(int32, tag = "4")]
    pub batch_size: i32,
    #[prost(int32, tag = "5")]
    pub input_height: i32,
    #[prost(int32, tag = "6")]
    pub input_width: i32,
    #[prost(int32, tag = "7")]
    pub channels: i32,
    #[prost(int32, tag = "8")]
    pub kernel_height: i32,
    #[prost(int32, tag = "9")]
    pub kernel_width: i32,
    #[prost(int32, tag = "10")]
    pub stride_height: i32,
    #[prost(int32, tag = "11")]
    pub stride_width: i32,
    #[prost(int32, tag = "12")]
    pub dilation_height: i32,
    #[prost(int32, tag = "13")]
    pub dilation_width: i32,
    #[prost(bool, tag = "14")]
    pub ceil_mode: bool,
    #[prost(int32, tag = "15")]
    pub padding_height: i32,
    #[prost(int32, tag = "16")]
    pub padding_width: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct DeallocateOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(bool, tag = "2")]
    pub force: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct UpdateCacheOp {
    #[prost(uint32, tag = "1")]
    pub cache: u32,
    #[prost(uint32, tag = "2")]
    pub input: u32,
    #[prost(uint32, tag = "3")]
    pub update_index: u32,
    #[prost(uint32, tag = "4")]
    pub batch_offset: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct FillCacheOp {
    #[prost(uint32, tag = "1")]
    pub cache: u32,
    #[prost(uint32, tag = "2")]
    pub input: u32,
    #[prost(uint32, tag = "3")]
    pub batch_offset: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct PermuteOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(int64, repeated, tag = "2")]
    pub permutation: Vec<i64>,
    #[prost(uint32, optional, tag = "3")]
    pub memcfg: Option<u32>,
    #[prost(float, tag = "4")]
    pub pad_value: f32,
    #[prost(uint32, tag = "5")]
    pub out: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Message)]
pub struct UniformScale2D {
    #[prost(int32, tag = "1")]
    pub scale: i32,
}

#[derive(Clone, PartialEq, Eq, Hash, Message)]
pub struct NonUniformScale2D {
    #[prost(int32, repeated, tag = "1")]
    pub scale: Vec<i32>,
}

#[derive(Clone, PartialEq, Eq, Hash, Oneof)]
pub enum Scale2D {
    #[prost(message, tag = "2")]
    Uniform(UniformScale2D),
    #[prost(message, tag = "3")]
    NonUniform(NonUniformScale2D),
}

#[derive(Clone, PartialEq, Message)]
pub struct UpsampleOp {
    #[prost(uint32, tag = "1")]
    pub input: u32,
    #[prost(oneof = "Scale2D", tags = "2, 3")]
    pub scale_factor: Option<Scale2D>,
    #[prost(string, tag = "4")]
    pub mode: String,
    #[prost(uint32, optional, tag = "5")]
    pub memcfg: Option<u32>,
    #[prost(uint32, tag = "6")]
    pub out: u32,
}

/// Kind-specific record of an [`Operation`].
#[derive(Clone, PartialEq, Oneof)]
pub enum OpType {
    #[prost(message, tag = "1")]
    GetDevice(GetDeviceOp),
    #[prost(message, tag = "2")]
    ToMemoryConfig(ToMemoryConfigOp),
    #[prost(message, tag = "3")]
    ToLayout(ToLayoutOp),
    #[prost(message, tag = "4")]
    ToDType(DataTypeConversionOp),
    #[prost(message, tag = "5")]
    Typecast(DataTypeConversionOp),
    #[prost(message, tag = "6")]
    ToDevice(ToDeviceOp),
    #[prost(message, tag = "7")]
    FromDevice(FromDeviceOp),
    #[prost(message, tag = "8")]
    Empty(EmptyOp),
    #[prost(message, tag = "9")]
    Full(FullOp),
    #[prost(message, tag = "10")]
    Arange(ArangeOp),
    #[prost(message, tag = "11")]
    Zeros(ConstantOp),
    #[prost(message, tag = "12")]
    Ones(ConstantOp),
    #[prost(message, tag = "13")]
    Eltwise(EltwiseOp),
    #[prost(message, tag = "14")]
    Linear(LinearOp),
    #[prost(message, tag = "15")]
    Matmul(MatmulOp),
    #[prost(message, tag = "16")]
    MorehCumSum(MorehCumSumOp),
    #[prost(message, tag = "17")]
    Reduction(ReductionOp),
    #[prost(message, tag = "18")]
    ReductionProd(ReductionProdOp),
    #[prost(message, tag = "19")]
    Embedding(EmbeddingOp),
    #[prost(message, tag = "20")]
    EmbeddingBackward(EmbeddingBackwardOp),
    #[prost(message, tag = "21")]
    RepeatInterleave(RepeatInterleaveOp),
    #[prost(message, tag = "22")]
    Softmax(SoftmaxOp),
    #[prost(message, tag = "23")]
    Transpose(TransposeOp),
    #[prost(message, tag = "24")]
    Conv2d(Conv2dOp),
    #[prost(message, tag = "25")]
    ConvTranspose2d(ConvTranspose2dOp),
    #[prost(message, tag = "26")]
    AllGather(AllGatherOp),
    #[prost(message, tag = "27")]
    ReduceScatter(ReduceScatterOp),
    #[prost(message, tag = "28")]
    MeshShard(MeshShardOp),
    #[prost(message, tag = "29")]
    Concat(ConcatOp),
    #[prost(message, tag = "30")]
    Reshape(ReshapeOp),
    #[prost(message, tag = "31")]
    Repeat(RepeatOp),
    #[prost(message, tag = "32")]
    Pad(PadOp),
    #[prost(message, tag = "33")]
    Slice(SliceOp),
    #[prost(message, tag = "34")]
    MaxPool2d(MaxPool2dOp),
    #[prost(message, tag = "35")]
    Deallocate(DeallocateOp),
    #[prost(message, tag = "36")]
    UpdateCache(UpdateCacheOp),
    #[prost(message, tag = "37")]
    FillCache(FillCacheOp),
    #[prost(message, tag = "38")]
    Permute(PermuteOp),
    #[prost(message, tag = "39")]
    Upsample(UpsampleOp),
}

macro_rules! op_type_tags {
    ($($variant:ident = $tag:literal),* $(,)?) => {
        impl OpType {
            /// Field tags of all operation kinds, in declaration order.
            pub const TAGS: &'static [u32] = &[$($tag,)*];

            /// Field tag of this operation kind.
            pub fn tag(&self) -> u32 {
                match self {
                    $(Self::$variant(_) => $tag,)*
                }
            }

            /// Name of this operation kind, as used in error messages.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => stringify!($variant),)*
                }
            }
        }
    };
}

op_type_tags! {
    GetDevice = 1,
    ToMemoryConfig = 2,
    ToLayout = 3,
    ToDType = 4,
    Typecast = 5,
    ToDevice = 6,
    FromDevice = 7,
    Empty = 8,
    Full = 9,
    Arange = 10,
    Zeros = 11,
    Ones = 12,
    Eltwise = 13,
    Linear = 14,
    Matmul = 15,
    MorehCumSum = 16,
    Reduction = 17,
    ReductionProd = 18,
    Embedding = 19,
    EmbeddingBackward = 20,
    RepeatInterleave = 21,
    Softmax = 22,
    Transpose = 23,
    Conv2d = 24,
    ConvTranspose2d = 25,
    AllGather = 26,
    ReduceScatter = 27,
    MeshShard = 28,
    Concat = 29,
    Reshape = 30,
    Repeat = 31,
    Pad = 32,
    Slice = 33,
    MaxPool2d = 34,
    Deallocate = 35,
    UpdateCache = 36,
    FillCache = 37,
    Permute = 38,
    Upsample = 39,
}

/// Operation of a [`Program`](crate::Program).
#[derive(Clone, PartialEq, Message)]
pub struct Operation {
    #[prost(
        oneof = "OpType",
        tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, 35, 36, 37, 38, 39"
    )]
    pub op_type: Option<OpType>,

    /// Textual form of the IR operation this record was lowered from.
    #[prost(string, tag = "100")]
    pub debug_info: String,

    /// Source location of the IR operation this record was lowered from.
    #[prost(string, tag = "101")]
    pub loc_info: String,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// Returns the field number of the first field encoded in `bytes`.
    fn first_field_tag(bytes: &[u8]) -> u32 {
        let mut key = 0u32;
        for (index, byte) in bytes.iter().enumerate() {
            key |= ((byte & 0x7f) as u32) << (7 * index);
            if byte & 0x80 == 0 {
                break;
            }
        }
        key >> 3
    }

    #[test]
    fn test_op_type_tags_match_encoding() {
        let op_types = [
            OpType::GetDevice(GetDeviceOp::default()),
            OpType::Typecast(DataTypeConversionOp::default()),
            OpType::Ones(ConstantOp::default()),
            OpType::Eltwise(EltwiseOp::default()),
            OpType::Upsample(UpsampleOp::default()),
        ];
        for op_type in op_types {
            let tag = op_type.tag();
            let operation = Operation { op_type: Some(op_type), ..Default::default() };
            assert_eq!(first_field_tag(&operation.encode_to_vec()), tag);
        }
    }

    #[test]
    fn test_op_type_tags_are_unique_and_dense() {
        let mut tags = OpType::TAGS.to_vec();
        tags.sort();
        tags.dedup();
        assert_eq!(tags, (1..=39).collect::<Vec<_>>());
    }

    #[test]
    fn test_operation_round_trip() {
        let operation = Operation {
            op_type: Some(OpType::Eltwise(EltwiseOp {
                r#type: EltwiseOpType::Clamp as i32,
                ins: vec![3],
                out: 4,
                params: Some(EltwiseOpParams::Clamp(ClampOpParams { min: -1.0, max: 1.0 })),
            })),
            debug_info: "%4 = ttnn.clamp(%3)".to_string(),
            loc_info: "loc(unknown)".to_string(),
        };
        let decoded = Operation::decode(operation.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, operation);
        assert!(matches!(
            decoded.op_type,
            Some(OpType::Eltwise(EltwiseOp { params: Some(EltwiseOpParams::Clamp(_)), .. })),
        ));
    }
}
