//! Lowering of device-aware tensor programs into verified binary artifacts.
//!
//! Programs are built as [`ir::Module`]s, lowered with [`lower_module`], and read back with
//! [`verify_size_prefixed`]. GSPMD sharding attribute strings are decoded with [`parse_gspmd_sharding`].

pub use tessel_ir as ir;
pub use tessel_lowering as lowering;
pub use tessel_schema as schema;

pub use tessel_ir::errors::IrError;
pub use tessel_ir::sharding::MeshSharding;
pub use tessel_ir::sharding::ShardingError;
pub use tessel_ir::sharding::parse_gspmd_sharding;
pub use tessel_lowering::errors::LoweringError;
pub use tessel_lowering::options::LoweringOptions;
pub use tessel_lowering::lower_module;
pub use tessel_schema::errors::SchemaError;
pub use tessel_schema::verify_size_prefixed;
