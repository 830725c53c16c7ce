//! Device-program operations.
//!
//! Every operation kind is a plain struct holding its operands (as [`ValueId`]s), its results, and its attributes.
//! [`Operation`] is the closed sum of all of them, plus [`UnregisteredOp`] for operations coming from dialects that
//! this crate does not know about (those can be printed and verified but not lowered).
//!
//! Some operations follow _destination-passing style_: they receive a pre-allocated _init_ operand and their result
//! is that same buffer once written. [`OperationInterface::destination`] exposes the init operand so that consumers can
//! resolve results back to the buffer they alias.

use std::fmt::{Display, Formatter};

use crate::attributes::MemoryConfigAttr;
use crate::sharding::{MeshShardType, MeshSharding};
use crate::types::{DataType, Layout};
use crate::values::ValueId;

/// Common view over all operation kinds.
pub trait OperationInterface {
    /// Fully-qualified operation name (e.g., `ttnn.matmul`).
    fn name(&self) -> &str;

    /// Operands of this operation, in printing order. Destination operands come last.
    fn operands(&self) -> Vec<ValueId>;

    /// Results of this operation.
    fn results(&self) -> Vec<ValueId>;

    /// Rendered attributes of this operation, in declaration order. Absent optional attributes are omitted.
    fn attributes(&self) -> Vec<(&'static str, String)>;

    /// Init operand whose buffer the (single) result of this operation aliases, if this operation follows
    /// destination-passing style.
    fn destination(&self) -> Option<ValueId>;
}

// ---------------------------------------------------------------------------
// Attribute rendering
// ---------------------------------------------------------------------------

/// Textual rendering of operation attribute values. Returns [`None`] for absent optional values.
pub trait AttributeValue {
    fn render(&self) -> Option<String>;
}

macro_rules! display_attribute_value {
    ($($ty:ty),* $(,)?) => {
        $(impl AttributeValue for $ty {
            fn render(&self) -> Option<String> {
                Some(self.to_string())
            }
        })*
    };
}

display_attribute_value!(
    bool,
    i32,
    i64,
    u32,
    f32,
    DataType,
    Layout,
    MemoryConfigAttr,
    ReduceType,
    MeshShardDirection,
    MeshShardType,
    ScaleFactor,
    EltwiseParameters,
);

impl AttributeValue for String {
    fn render(&self) -> Option<String> {
        Some(format!("\"{self}\""))
    }
}

impl<T: AttributeValue> AttributeValue for Option<T> {
    fn render(&self) -> Option<String> {
        self.as_ref().and_then(AttributeValue::render)
    }
}

impl<T: AttributeValue> AttributeValue for [T] {
    fn render(&self) -> Option<String> {
        let elements = self.iter().map(|element| element.render().unwrap_or_default()).collect::<Vec<_>>();
        Some(format!("[{}]", elements.join(", ")))
    }
}

impl<T: AttributeValue> AttributeValue for Vec<T> {
    fn render(&self) -> Option<String> {
        self.as_slice().render()
    }
}

impl<T: AttributeValue, const N: usize> AttributeValue for [T; N] {
    fn render(&self) -> Option<String> {
        self.as_slice().render()
    }
}

// ---------------------------------------------------------------------------
// Attribute enums
// ---------------------------------------------------------------------------

/// Reduction applied by collective operations.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReduceType {
    Sum,
    Mean,
    Max,
    Min,
    Std,
    Var,
}

impl Display for ReduceType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Max => "max",
            Self::Min => "min",
            Self::Std => "std",
            Self::Var => "var",
        })
    }
}

/// Direction of a [`MeshShardOp`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MeshShardDirection {
    /// Splits a full tensor into per-device shards.
    FullToShard,
    /// Reassembles per-device shards into a full tensor.
    ShardToFull,
}

impl Display for MeshShardDirection {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::FullToShard => "full_to_shard",
            Self::ShardToFull => "shard_to_full",
        })
    }
}

/// Scale factor of an [`UpsampleOp`], either shared by both spatial dimensions or given per dimension.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScaleFactor {
    Uniform(i32),
    NonUniform(Vec<i32>),
}

impl Display for ScaleFactor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uniform(scale) => write!(formatter, "{scale}"),
            Self::NonUniform(scales) => {
                let scales = scales.iter().map(|s| s.to_string()).collect::<Vec<_>>();
                write!(formatter, "[{}]", scales.join(", "))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Elementwise and reduction kinds
// ---------------------------------------------------------------------------

macro_rules! eltwise_kinds {
    ($($kind:ident => $mnemonic:literal),* $(,)?) => {
        /// Kind of an [`EltwiseOp`].
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum EltwiseKind {
            $($kind,)*
        }

        impl EltwiseKind {
            /// All elementwise kinds, in declaration order.
            pub const ALL: &'static [EltwiseKind] = &[$(Self::$kind,)*];

            /// Fully-qualified name of operations of this kind.
            pub fn operation_name(&self) -> &'static str {
                match self {
                    $(Self::$kind => concat!("ttnn.", $mnemonic),)*
                }
            }
        }
    };
}

eltwise_kinds! {
    Abs => "abs",
    Add => "add",
    BitwiseAnd => "bitwise_and",
    BitwiseNot => "bitwise_not",
    BitwiseOr => "bitwise_or",
    BitwiseXor => "bitwise_xor",
    Cbrt => "cbrt",
    Ceil => "ceil",
    Clamp => "clamp",
    Cos => "cos",
    Div => "div",
    Equal => "eq",
    Exp => "exp",
    Expm1 => "expm1",
    Floor => "floor",
    Gelu => "gelu",
    GreaterEqual => "ge",
    GreaterThan => "gt",
    IsFinite => "isfinite",
    LeakyRelu => "leaky_relu",
    LessEqual => "le",
    LessThan => "lt",
    Log => "log",
    Log1p => "log1p",
    LogicalAnd => "logical_and",
    LogicalNot => "logical_not",
    LogicalOr => "logical_or",
    LogicalXor => "logical_xor",
    Maximum => "maximum",
    Minimum => "minimum",
    Multiply => "multiply",
    Neg => "neg",
    NotEqual => "ne",
    Power => "pow",
    Reciprocal => "reciprocal",
    Relu => "relu",
    Remainder => "remainder",
    Rsqrt => "rsqrt",
    Scatter => "scatter",
    Sigmoid => "sigmoid",
    Sign => "sign",
    Sin => "sin",
    Sqrt => "sqrt",
    Subtract => "subtract",
    Tan => "tan",
    Tanh => "tanh",
    Where => "where",
}

/// Extra scalar payload carried by a few elementwise kinds.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum EltwiseParameters {
    #[default]
    None,
    /// Bounds of [`EltwiseKind::Clamp`].
    Clamp { min: f32, max: f32 },
    /// Single scalar parameter (e.g., the negative slope of [`EltwiseKind::LeakyRelu`]).
    Float { parameter: f32 },
}

impl Display for EltwiseParameters {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(formatter, "none"),
            Self::Clamp { min, max } => write!(formatter, "<min = {min}, max = {max}>"),
            Self::Float { parameter } => write!(formatter, "<{parameter}>"),
        }
    }
}

/// Kind of a [`ReductionOp`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReductionKind {
    Sum,
    Mean,
    Max,
    Min,
}

impl ReductionKind {
    /// All reduction kinds, in declaration order.
    pub const ALL: &'static [ReductionKind] = &[Self::Sum, Self::Mean, Self::Max, Self::Min];

    /// Fully-qualified name of operations of this kind.
    pub fn operation_name(&self) -> &'static str {
        match self {
            Self::Sum => "ttnn.sum",
            Self::Mean => "ttnn.mean",
            Self::Max => "ttnn.max",
            Self::Min => "ttnn.min",
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

macro_rules! operation_interface {
    (
        $op:ident,
        name = $name:literal,
        operands = [$($operand:ident),* $(,)?],
        optional_operands = [$($optional_operand:ident),* $(,)?],
        variadic_operands = [$($variadic_operand:ident),* $(,)?],
        results = [$($result:ident),* $(,)?],
        attributes = [$($attribute:ident),* $(,)?]
        $(, destination = $destination:ident)? $(,)?
    ) => {
        impl OperationInterface for $op {
            fn name(&self) -> &str {
                $name
            }

            #[allow(unused_mut)]
            fn operands(&self) -> Vec<ValueId> {
                let mut operands = Vec::new();
                $(operands.extend(self.$variadic_operand.iter().copied());)*
                $(operands.push(self.$operand);)*
                $(operands.extend(self.$optional_operand);)*
                $(operands.push(self.$destination);)?
                operands
            }

            fn results(&self) -> Vec<ValueId> {
                vec![$(self.$result),*]
            }

            #[allow(unused_mut)]
            fn attributes(&self) -> Vec<(&'static str, String)> {
                let mut attributes = Vec::new();
                $(if let Some(value) = self.$attribute.render() {
                    attributes.push((stringify!($attribute), value));
                })*
                attributes
            }

            fn destination(&self) -> Option<ValueId> {
                None $(.or(Some(self.$destination)))?
            }
        }
    };
}

/// Opens the device (or mesh of devices) that subsequent operations run on. The chips and mesh come from the type of
/// the result.
#[derive(Clone, Debug, PartialEq)]
pub struct GetDeviceOp {
    pub result: ValueId,
}

operation_interface!(
    GetDeviceOp,
    name = "ttnn.get_device",
    operands = [],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [],
);

/// Moves a tensor to a different memory configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct ToMemoryConfigOp {
    pub input: ValueId,
    pub memory_config: MemoryConfigAttr,
    pub result: ValueId,
}

operation_interface!(
    ToMemoryConfigOp,
    name = "ttnn.to_memory_config",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [memory_config],
);

/// Converts a tensor between row-major and tiled layouts, optionally changing its data type, memory configuration, or
/// placing it on a device in the same step.
#[derive(Clone, Debug, PartialEq)]
pub struct ToLayoutOp {
    pub input: ValueId,
    pub layout: Layout,
    pub data_type: Option<DataType>,
    pub memory_config: Option<MemoryConfigAttr>,
    pub device: Option<ValueId>,
    pub result: ValueId,
}

operation_interface!(
    ToLayoutOp,
    name = "ttnn.to_layout",
    operands = [input],
    optional_operands = [device],
    variadic_operands = [],
    results = [result],
    attributes = [layout, data_type, memory_config],
);

#[derive(Clone, Debug, PartialEq)]
pub struct ToDTypeOp {
    pub input: ValueId,
    pub data_type: DataType,
    pub result: ValueId,
}

operation_interface!(
    ToDTypeOp,
    name = "ttnn.to_dtype",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [data_type],
);

/// Device-side data type conversion (as opposed to [`ToDTypeOp`], which converts on the host).
#[derive(Clone, Debug, PartialEq)]
pub struct TypecastOp {
    pub input: ValueId,
    pub data_type: DataType,
    pub result: ValueId,
}

operation_interface!(
    TypecastOp,
    name = "ttnn.typecast",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [data_type],
);

#[derive(Clone, Debug, PartialEq)]
pub struct ToDeviceOp {
    pub input: ValueId,
    pub device: ValueId,
    pub memory_config: Option<MemoryConfigAttr>,
    pub result: ValueId,
}

operation_interface!(
    ToDeviceOp,
    name = "ttnn.to_device",
    operands = [input, device],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [memory_config],
);

#[derive(Clone, Debug, PartialEq)]
pub struct FromDeviceOp {
    pub input: ValueId,
    pub result: ValueId,
}

operation_interface!(
    FromDeviceOp,
    name = "ttnn.from_device",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [],
);

/// Allocates an uninitialized tensor. When a device is given, the tensor is allocated on every device of its mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct EmptyOp {
    pub shape: Vec<i64>,
    pub data_type: DataType,
    pub layout: Layout,
    pub device: Option<ValueId>,
    pub memory_config: MemoryConfigAttr,
    pub result: ValueId,
}

operation_interface!(
    EmptyOp,
    name = "ttnn.empty",
    operands = [],
    optional_operands = [device],
    variadic_operands = [],
    results = [result],
    attributes = [shape, data_type, layout, memory_config],
);

#[derive(Clone, Debug, PartialEq)]
pub struct FullOp {
    pub device: Option<ValueId>,
    pub fill_value: f32,
    pub result: ValueId,
}

operation_interface!(
    FullOp,
    name = "ttnn.full",
    operands = [],
    optional_operands = [device],
    variadic_operands = [],
    results = [result],
    attributes = [fill_value],
);

/// Creates a 1-D tensor holding `start, start + step, ...` up to (but excluding) `end`.
#[derive(Clone, Debug, PartialEq)]
pub struct ArangeOp {
    pub start: i64,
    pub end: i64,
    pub step: i64,
    pub data_type: Option<DataType>,
    pub device: Option<ValueId>,
    pub memory_config: Option<MemoryConfigAttr>,
    pub result: ValueId,
}

operation_interface!(
    ArangeOp,
    name = "ttnn.arange",
    operands = [],
    optional_operands = [device],
    variadic_operands = [],
    results = [result],
    attributes = [start, end, step, data_type, memory_config],
);

/// Attributes shared by [`Operation::Zeros`] and [`Operation::Ones`].
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantFillOp {
    pub shape: Vec<i64>,
    pub data_type: Option<DataType>,
    pub layout: Option<Layout>,
    pub device: Option<ValueId>,
    pub memory_config: Option<MemoryConfigAttr>,
    pub result: ValueId,
}

/// Fills a new tensor with zeros.
#[derive(Clone, Debug, PartialEq)]
pub struct ZerosOp(pub ConstantFillOp);

/// Fills a new tensor with ones.
#[derive(Clone, Debug, PartialEq)]
pub struct OnesOp(pub ConstantFillOp);

macro_rules! constant_fill_interface {
    ($op:ident, $name:literal) => {
        impl OperationInterface for $op {
            fn name(&self) -> &str {
                $name
            }

            fn operands(&self) -> Vec<ValueId> {
                self.0.device.into_iter().collect()
            }

            fn results(&self) -> Vec<ValueId> {
                vec![self.0.result]
            }

            fn attributes(&self) -> Vec<(&'static str, String)> {
                [
                    ("shape", self.0.shape.render()),
                    ("data_type", self.0.data_type.render()),
                    ("layout", self.0.layout.render()),
                    ("memory_config", self.0.memory_config.render()),
                ]
                .into_iter()
                .filter_map(|(name, value)| value.map(|value| (name, value)))
                .collect()
            }

            fn destination(&self) -> Option<ValueId> {
                None
            }
        }
    };
}

constant_fill_interface!(ZerosOp, "ttnn.zeros");
constant_fill_interface!(OnesOp, "ttnn.ones");

/// Elementwise unary, binary, or ternary operation.
///
/// All kinds except [`EltwiseKind::Clamp`] write into an init tensor given by [`EltwiseOp::output`].
#[derive(Clone, Debug, PartialEq)]
pub struct EltwiseOp {
    pub kind: EltwiseKind,
    pub inputs: Vec<ValueId>,
    pub output: Option<ValueId>,
    pub parameters: EltwiseParameters,
    pub result: ValueId,
}

impl EltwiseOp {
    /// Creates a destination-passing elementwise operation without parameters.
    pub fn new(kind: EltwiseKind, inputs: Vec<ValueId>, output: ValueId, result: ValueId) -> Self {
        Self { kind, inputs, output: Some(output), parameters: EltwiseParameters::None, result }
    }

    /// Creates a [`EltwiseKind::Clamp`] operation, which allocates its own result.
    pub fn clamp(input: ValueId, min: f32, max: f32, result: ValueId) -> Self {
        Self {
            kind: EltwiseKind::Clamp,
            inputs: vec![input],
            output: None,
            parameters: EltwiseParameters::Clamp { min, max },
            result,
        }
    }

    /// Creates a [`EltwiseKind::LeakyRelu`] operation with the provided negative slope.
    pub fn leaky_relu(input: ValueId, slope: f32, output: ValueId, result: ValueId) -> Self {
        Self {
            kind: EltwiseKind::LeakyRelu,
            inputs: vec![input],
            output: Some(output),
            parameters: EltwiseParameters::Float { parameter: slope },
            result,
        }
    }
}

impl OperationInterface for EltwiseOp {
    fn name(&self) -> &str {
        self.kind.operation_name()
    }

    fn operands(&self) -> Vec<ValueId> {
        self.inputs.iter().copied().chain(self.output).collect()
    }

    fn results(&self) -> Vec<ValueId> {
        vec![self.result]
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        match self.parameters {
            EltwiseParameters::None => Vec::new(),
            parameters => vec![("parameters", parameters.to_string())],
        }
    }

    fn destination(&self) -> Option<ValueId> {
        self.output
    }
}

/// Fully-connected layer: `a × b + bias`.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearOp {
    pub a: ValueId,
    pub b: ValueId,
    pub bias: Option<ValueId>,
    pub output: ValueId,
    pub result: ValueId,
}

operation_interface!(
    LinearOp,
    name = "ttnn.linear",
    operands = [a, b],
    optional_operands = [bias],
    variadic_operands = [],
    results = [result],
    attributes = [],
    destination = output,
);

#[derive(Clone, Debug, PartialEq)]
pub struct MatmulOp {
    pub a: ValueId,
    pub b: ValueId,
    pub output: ValueId,
    pub result: ValueId,
}

operation_interface!(
    MatmulOp,
    name = "ttnn.matmul",
    operands = [a, b],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [],
    destination = output,
);

/// Cumulative sum along one dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct MorehCumSumOp {
    pub input: ValueId,
    pub output: ValueId,
    pub dim: i64,
    pub memory_config: Option<MemoryConfigAttr>,
    pub result: ValueId,
}

operation_interface!(
    MorehCumSumOp,
    name = "ttnn.moreh_cumsum",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [dim, memory_config],
    destination = output,
);

/// Reduction over a set of dimensions, or over all dimensions when [`ReductionOp::dim_arg`] is absent.
#[derive(Clone, Debug, PartialEq)]
pub struct ReductionOp {
    pub kind: ReductionKind,
    pub input: ValueId,
    pub dim_arg: Option<Vec<i32>>,
    pub keep_dim: bool,
    pub result: ValueId,
}

impl OperationInterface for ReductionOp {
    fn name(&self) -> &str {
        self.kind.operation_name()
    }

    fn operands(&self) -> Vec<ValueId> {
        vec![self.input]
    }

    fn results(&self) -> Vec<ValueId> {
        vec![self.result]
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut attributes = Vec::new();
        if let Some(dim_arg) = self.dim_arg.render() {
            attributes.push(("dim_arg", dim_arg));
        }
        attributes.push(("keep_dim", self.keep_dim.to_string()));
        attributes
    }

    fn destination(&self) -> Option<ValueId> {
        None
    }
}

/// Product reduction, which unlike the other reductions takes a single dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct ProdOp {
    pub input: ValueId,
    pub all_dimensions: bool,
    pub dim_arg: i64,
    pub keep_dim: bool,
    pub memory_config: Option<MemoryConfigAttr>,
    pub result: ValueId,
}

operation_interface!(
    ProdOp,
    name = "ttnn.prod",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [all_dimensions, dim_arg, keep_dim, memory_config],
);

#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingOp {
    pub input: ValueId,
    pub weight: ValueId,
    pub output: ValueId,
    pub result: ValueId,
}

operation_interface!(
    EmbeddingOp,
    name = "ttnn.embedding",
    operands = [input, weight],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [],
    destination = output,
);

#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingBackwardOp {
    pub input: ValueId,
    pub weight: ValueId,
    pub in_gradient: ValueId,
    pub data_type: Option<DataType>,
    pub memory_config: Option<MemoryConfigAttr>,
    pub output: ValueId,
    pub result: ValueId,
}

operation_interface!(
    EmbeddingBackwardOp,
    name = "ttnn.embedding_bw",
    operands = [input, weight, in_gradient],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [data_type, memory_config],
    destination = output,
);

#[derive(Clone, Debug, PartialEq)]
pub struct RepeatInterleaveOp {
    pub input: ValueId,
    pub repeats: u32,
    pub dim: i32,
    pub memory_config: Option<MemoryConfigAttr>,
    pub result: ValueId,
}

operation_interface!(
    RepeatInterleaveOp,
    name = "ttnn.repeat_interleave",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [repeats, dim, memory_config],
);

#[derive(Clone, Debug, PartialEq)]
pub struct SoftmaxOp {
    pub input: ValueId,
    pub dimension: i32,
    pub result: ValueId,
}

operation_interface!(
    SoftmaxOp,
    name = "ttnn.softmax",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [dimension],
);

#[derive(Clone, Debug, PartialEq)]
pub struct TransposeOp {
    pub input: ValueId,
    pub dim0: i32,
    pub dim1: i32,
    pub result: ValueId,
}

operation_interface!(
    TransposeOp,
    name = "ttnn.transpose",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [dim0, dim1],
);

/// 2-D convolution over an input flattened to `[1, 1, batch × height × width, channels]`. Spatial attributes are
/// `[height, width]` pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct Conv2dOp {
    pub input: ValueId,
    pub weight: ValueId,
    pub bias: Option<ValueId>,
    pub output: ValueId,
    pub device: ValueId,
    pub in_channels: u32,
    pub out_channels: u32,
    pub batch_size: u32,
    pub input_height: u32,
    pub input_width: u32,
    pub kernel_size: [u32; 2],
    pub stride: [u32; 2],
    pub padding: [u32; 2],
    pub dilation: [u32; 2],
    pub groups: u32,
    pub result: ValueId,
}

operation_interface!(
    Conv2dOp,
    name = "ttnn.conv2d",
    operands = [input, weight, device],
    optional_operands = [bias],
    variadic_operands = [],
    results = [result],
    attributes = [
        in_channels,
        out_channels,
        batch_size,
        input_height,
        input_width,
        kernel_size,
        stride,
        padding,
        dilation,
        groups,
    ],
    destination = output,
);

/// Transposed 2-D convolution. Spatial attributes are `[height, width]` pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct ConvTranspose2dOp {
    pub input: ValueId,
    pub weight: ValueId,
    pub bias: Option<ValueId>,
    pub output: ValueId,
    pub device: ValueId,
    pub in_channels: u32,
    pub out_channels: u32,
    pub batch_size: u32,
    pub input_height: u32,
    pub input_width: u32,
    pub kernel_size: [i32; 2],
    pub stride: [i32; 2],
    pub padding: [i32; 2],
    pub output_padding: [i32; 2],
    pub dilation: [i32; 2],
    pub groups: u32,
    pub result: ValueId,
}

operation_interface!(
    ConvTranspose2dOp,
    name = "ttnn.conv_transpose2d",
    operands = [input, weight, device],
    optional_operands = [bias],
    variadic_operands = [],
    results = [result],
    attributes = [
        in_channels,
        out_channels,
        batch_size,
        input_height,
        input_width,
        kernel_size,
        stride,
        padding,
        output_padding,
        dilation,
        groups,
    ],
    destination = output,
);

/// Gathers the shards of a tensor from all devices of a mesh along one dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct AllGatherOp {
    pub input: ValueId,
    pub device: ValueId,
    pub dim: i32,
    pub num_links: u32,
    pub result: ValueId,
}

operation_interface!(
    AllGatherOp,
    name = "ttnn.all_gather",
    operands = [input, device],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [dim, num_links],
);

#[derive(Clone, Debug, PartialEq)]
pub struct ReduceScatterOp {
    pub input: ValueId,
    pub device: ValueId,
    pub scatter_split_dim: i32,
    pub math_op: ReduceType,
    pub num_links: u32,
    pub result: ValueId,
}

operation_interface!(
    ReduceScatterOp,
    name = "ttnn.reduce_scatter",
    operands = [input, device],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [scatter_split_dim, math_op, num_links],
);

/// Splits a tensor across the devices of a mesh, or reassembles it, according to a decoded GSPMD sharding.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshShardOp {
    pub input: ValueId,
    pub device: ValueId,
    pub shard_direction: MeshShardDirection,
    pub shard_type: MeshShardType,
    pub shard_shape: Vec<i64>,
    pub shard_dims: Vec<i64>,
    pub result: ValueId,
}

impl MeshShardOp {
    /// Creates a [`MeshShardOp`] carrying the geometry of a decoded sharding (see
    /// [`parse_gspmd_sharding`](crate::sharding::parse_gspmd_sharding)).
    pub fn from_sharding(
        input: ValueId,
        device: ValueId,
        shard_direction: MeshShardDirection,
        sharding: &MeshSharding,
        result: ValueId,
    ) -> Self {
        Self {
            input,
            device,
            shard_direction,
            shard_type: sharding.shard_type,
            shard_shape: sharding.shard_shape.clone(),
            shard_dims: sharding.shard_dims.clone(),
            result,
        }
    }
}

operation_interface!(
    MeshShardOp,
    name = "ttnn.mesh_shard",
    operands = [input, device],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [shard_direction, shard_type, shard_shape, shard_dims],
);

#[derive(Clone, Debug, PartialEq)]
pub struct ConcatOp {
    pub inputs: Vec<ValueId>,
    pub dim: i32,
    pub memory_config: Option<MemoryConfigAttr>,
    pub output: ValueId,
    pub result: ValueId,
}

operation_interface!(
    ConcatOp,
    name = "ttnn.concat",
    operands = [],
    optional_operands = [],
    variadic_operands = [inputs],
    results = [result],
    attributes = [dim, memory_config],
    destination = output,
);

#[derive(Clone, Debug, PartialEq)]
pub struct ReshapeOp {
    pub input: ValueId,
    pub shape: Vec<i32>,
    pub result: ValueId,
}

operation_interface!(
    ReshapeOp,
    name = "ttnn.reshape",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [shape],
);

#[derive(Clone, Debug, PartialEq)]
pub struct RepeatOp {
    pub input: ValueId,
    pub repeat_dims: Vec<i64>,
    pub result: ValueId,
}

operation_interface!(
    RepeatOp,
    name = "ttnn.repeat",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [repeat_dims],
);

/// Pads a tensor with a constant. [`PadOp::padding`] holds `[low, high]` pairs, one per dimension.
#[derive(Clone, Debug, PartialEq)]
pub struct PadOp {
    pub input: ValueId,
    pub padding: Vec<u32>,
    pub value: f32,
    pub use_multicore: bool,
    pub memory_config: Option<MemoryConfigAttr>,
    pub result: ValueId,
}

operation_interface!(
    PadOp,
    name = "ttnn.pad",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [padding, value, use_multicore, memory_config],
);

#[derive(Clone, Debug, PartialEq)]
pub struct SliceOp {
    pub input: ValueId,
    pub output: ValueId,
    pub begins: Vec<i64>,
    pub ends: Vec<i64>,
    pub step: Vec<i64>,
    pub result: ValueId,
}

operation_interface!(
    SliceOp,
    name = "ttnn.slice",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [begins, ends, step],
    destination = output,
);

/// 2-D max pooling. Spatial attributes are `[height, width]` pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct MaxPool2dOp {
    pub input: ValueId,
    pub output: ValueId,
    pub device: ValueId,
    pub batch_size: i32,
    pub input_height: i32,
    pub input_width: i32,
    pub channels: i32,
    pub kernel_size: [i32; 2],
    pub stride: [i32; 2],
    pub dilation: [i32; 2],
    pub ceil_mode: bool,
    pub padding: [i32; 2],
    pub result: ValueId,
}

operation_interface!(
    MaxPool2dOp,
    name = "ttnn.max_pool2d",
    operands = [input, device],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [batch_size, input_height, input_width, channels, kernel_size, stride, dilation, ceil_mode, padding],
    destination = output,
);

#[derive(Clone, Debug, PartialEq)]
pub struct DeallocateOp {
    pub input: ValueId,
    pub force: bool,
}

operation_interface!(
    DeallocateOp,
    name = "ttnn.deallocate",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [],
    attributes = [force],
);

/// Writes `input` into a KV cache at the position held by `update_index`.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateCacheOp {
    pub cache: ValueId,
    pub input: ValueId,
    pub update_index: ValueId,
    pub batch_offset: u32,
}

operation_interface!(
    UpdateCacheOp,
    name = "ttnn.update_cache",
    operands = [cache, input, update_index],
    optional_operands = [],
    variadic_operands = [],
    results = [],
    attributes = [batch_offset],
);

#[derive(Clone, Debug, PartialEq)]
pub struct FillCacheOp {
    pub cache: ValueId,
    pub input: ValueId,
    pub batch_offset: u32,
}

operation_interface!(
    FillCacheOp,
    name = "ttnn.fill_cache",
    operands = [cache, input],
    optional_operands = [],
    variadic_operands = [],
    results = [],
    attributes = [batch_offset],
);

#[derive(Clone, Debug, PartialEq)]
pub struct PermuteOp {
    pub input: ValueId,
    pub permutation: Vec<i64>,
    pub memory_config: Option<MemoryConfigAttr>,
    pub pad_value: f32,
    pub result: ValueId,
}

operation_interface!(
    PermuteOp,
    name = "ttnn.permute",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [permutation, memory_config, pad_value],
);

/// Spatial upsampling by an integer scale factor using the given interpolation mode (e.g., `nearest`).
#[derive(Clone, Debug, PartialEq)]
pub struct UpsampleOp {
    pub input: ValueId,
    pub scale_factor: ScaleFactor,
    pub mode: String,
    pub memory_config: Option<MemoryConfigAttr>,
    pub result: ValueId,
}

operation_interface!(
    UpsampleOp,
    name = "ttnn.upsample",
    operands = [input],
    optional_operands = [],
    variadic_operands = [],
    results = [result],
    attributes = [scale_factor, mode, memory_config],
);

/// Operation from a dialect this crate does not model. It takes part in printing and verification but cannot be
/// lowered.
#[derive(Clone, Debug, PartialEq)]
pub struct UnregisteredOp {
    pub name: String,
    pub operands: Vec<ValueId>,
    pub results: Vec<ValueId>,
}

impl OperationInterface for UnregisteredOp {
    fn name(&self) -> &str {
        &self.name
    }

    fn operands(&self) -> Vec<ValueId> {
        self.operands.clone()
    }

    fn results(&self) -> Vec<ValueId> {
        self.results.clone()
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn destination(&self) -> Option<ValueId> {
        None
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

macro_rules! operations {
    ($($variant:ident($op:ident)),* $(,)?) => {
        /// Any operation of a device program.
        #[derive(Clone, Debug, PartialEq)]
        pub enum Operation {
            $($variant($op),)*
            Eltwise(EltwiseOp),
            Reduction(ReductionOp),
            Unregistered(UnregisteredOp),
        }

        /// Kind of a registered [`Operation`].
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub enum OperationKind {
            $($variant,)*
            Eltwise(EltwiseKind),
            Reduction(ReductionKind),
        }

        impl Operation {
            /// Returns this operation as an [`OperationInterface`] trait object.
            pub fn interface(&self) -> &dyn OperationInterface {
                match self {
                    $(Self::$variant(op) => op,)*
                    Self::Eltwise(op) => op,
                    Self::Reduction(op) => op,
                    Self::Unregistered(op) => op,
                }
            }

            /// Kind of this operation, or [`None`] for [`Operation::Unregistered`] operations.
            pub fn kind(&self) -> Option<OperationKind> {
                match self {
                    $(Self::$variant(_) => Some(OperationKind::$variant),)*
                    Self::Eltwise(op) => Some(OperationKind::Eltwise(op.kind)),
                    Self::Reduction(op) => Some(OperationKind::Reduction(op.kind)),
                    Self::Unregistered(_) => None,
                }
            }
        }

        impl OperationKind {
            /// Every registered operation kind, including one entry per elementwise and reduction kind.
            pub fn all() -> impl Iterator<Item = OperationKind> {
                [$(Self::$variant,)*]
                    .into_iter()
                    .chain(EltwiseKind::ALL.iter().copied().map(Self::Eltwise))
                    .chain(ReductionKind::ALL.iter().copied().map(Self::Reduction))
            }
        }

        $(impl From<$op> for Operation {
            fn from(op: $op) -> Self {
                Self::$variant(op)
            }
        })*
    };
}

operations! {
    GetDevice(GetDeviceOp),
    ToMemoryConfig(ToMemoryConfigOp),
    ToLayout(ToLayoutOp),
    ToDType(ToDTypeOp),
    Typecast(TypecastOp),
    ToDevice(ToDeviceOp),
    FromDevice(FromDeviceOp),
    Empty(EmptyOp),
    Full(FullOp),
    Arange(ArangeOp),
    Zeros(ZerosOp),
    Ones(OnesOp),
    Linear(LinearOp),
    Matmul(MatmulOp),
    MorehCumSum(MorehCumSumOp),
    Prod(ProdOp),
    Embedding(EmbeddingOp),
    EmbeddingBackward(EmbeddingBackwardOp),
    RepeatInterleave(RepeatInterleaveOp),
    Softmax(SoftmaxOp),
    Transpose(TransposeOp),
    Conv2d(Conv2dOp),
    ConvTranspose2d(ConvTranspose2dOp),
    AllGather(AllGatherOp),
    ReduceScatter(ReduceScatterOp),
    MeshShard(MeshShardOp),
    Concat(ConcatOp),
    Reshape(ReshapeOp),
    Repeat(RepeatOp),
    Pad(PadOp),
    Slice(SliceOp),
    MaxPool2d(MaxPool2dOp),
    Deallocate(DeallocateOp),
    UpdateCache(UpdateCacheOp),
    FillCache(FillCacheOp),
    Permute(PermuteOp),
    Upsample(UpsampleOp),
}

impl From<EltwiseOp> for Operation {
    fn from(op: EltwiseOp) -> Self {
        Self::Eltwise(op)
    }
}

impl From<ReductionOp> for Operation {
    fn from(op: ReductionOp) -> Self {
        Self::Reduction(op)
    }
}

impl From<UnregisteredOp> for Operation {
    fn from(op: UnregisteredOp) -> Self {
        Self::Unregistered(op)
    }
}

impl OperationInterface for Operation {
    fn name(&self) -> &str {
        self.interface().name()
    }

    fn operands(&self) -> Vec<ValueId> {
        self.interface().operands()
    }

    fn results(&self) -> Vec<ValueId> {
        self.interface().results()
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        self.interface().attributes()
    }

    fn destination(&self) -> Option<ValueId> {
        self.interface().destination()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::sharding::parse_gspmd_sharding;
    use crate::types::{BufferType, TensorMemoryLayout};

    fn value(index: u32) -> ValueId {
        ValueId::from_index(index)
    }

    #[test]
    fn test_operation_kinds_are_unique() {
        let kinds = OperationKind::all().collect::<Vec<_>>();
        assert_eq!(kinds.len(), 37 + EltwiseKind::ALL.len() + ReductionKind::ALL.len());
        assert_eq!(kinds.iter().collect::<HashSet<_>>().len(), kinds.len());
        assert_eq!(EltwiseKind::ALL.len(), 47);
    }

    #[test]
    fn test_destination_passing_operands() {
        let add: Operation = EltwiseOp::new(EltwiseKind::Add, vec![value(0), value(1)], value(2), value(3)).into();
        assert_eq!(add.name(), "ttnn.add");
        assert_eq!(add.operands(), vec![value(0), value(1), value(2)]);
        assert_eq!(add.results(), vec![value(3)]);
        assert_eq!(add.destination(), Some(value(2)));

        let clamp: Operation = EltwiseOp::clamp(value(0), -1.0, 1.0, value(1)).into();
        assert_eq!(clamp.operands(), vec![value(0)]);
        assert_eq!(clamp.destination(), None);
        assert_eq!(clamp.attributes(), vec![("parameters", "<min = -1, max = 1>".to_string())]);

        let linear: Operation =
            LinearOp { a: value(0), b: value(1), bias: Some(value(2)), output: value(3), result: value(4) }.into();
        assert_eq!(linear.operands(), vec![value(0), value(1), value(2), value(3)]);
        assert_eq!(linear.destination(), Some(value(3)));
    }

    #[test]
    fn test_attribute_rendering() {
        let to_layout: Operation = ToLayoutOp {
            input: value(0),
            layout: Layout::Tile,
            data_type: Some(DataType::BFloat16),
            memory_config: Some(MemoryConfigAttr::new(TensorMemoryLayout::Interleaved, BufferType::Dram)),
            device: None,
            result: value(1),
        }
        .into();
        assert_eq!(
            to_layout.attributes(),
            vec![
                ("layout", "tile".to_string()),
                ("data_type", "bf16".to_string()),
                ("memory_config", "#memory_config<interleaved, #dram>".to_string()),
            ],
        );

        let zeros: Operation = ZerosOp(ConstantFillOp {
            shape: vec![2, 3],
            data_type: None,
            layout: Some(Layout::RowMajor),
            device: Some(value(0)),
            memory_config: None,
            result: value(1),
        })
        .into();
        assert_eq!(zeros.operands(), vec![value(0)]);
        assert_eq!(zeros.attributes(), vec![("shape", "[2, 3]".to_string()), ("layout", "row_major".to_string())]);
    }

    #[test]
    fn test_mesh_shard_from_sharding() {
        let sharding = parse_gspmd_sharding("{devices=[1,2,4]<=[8]}").unwrap();
        let op = MeshShardOp::from_sharding(value(0), value(1), MeshShardDirection::FullToShard, &sharding, value(2));
        assert_eq!(op.shard_type, MeshShardType::Devices);
        assert_eq!(op.shard_shape, vec![1, 2, 4]);
        assert_eq!(op.shard_dims, vec![1, 2]);
        assert_eq!(Operation::from(op).kind(), Some(OperationKind::MeshShard));
    }

    #[test]
    fn test_unregistered_operation_has_no_kind() {
        let op: Operation =
            UnregisteredOp { name: "tosa.custom".into(), operands: vec![value(0)], results: vec![value(1)] }.into();
        assert_eq!(op.kind(), None);
        assert_eq!(op.name(), "tosa.custom");
    }
}
