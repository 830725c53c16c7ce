//! Intermediate representation of device programs: tensor operations annotated with memory placement, layout, and
//! multi-device distribution, grouped into functions and modules.
//!
//! This crate also decodes GSPMD sharding attribute strings into device-mesh geometry (see [`sharding`]), which is
//! how [`MeshShardOp`](operations::MeshShardOp)s obtain their shard shapes and dimensions.

pub mod attributes;
pub mod errors;
pub mod modules;
pub mod operations;
pub mod sharding;
pub mod types;
pub mod values;

pub use self::attributes::*;
pub use self::errors::*;
pub use self::modules::*;
pub use self::operations::*;
pub use self::sharding::*;
pub use self::types::*;
pub use self::values::*;
