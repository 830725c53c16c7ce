//! Lowering of [`tessel_ir`] modules into [`tessel_schema`] binaries.
//!
//! Each function of a module becomes one [`Program`](tessel_schema::Program) whose operations are encoded in program
//! order. Tensors, devices, layouts, and memory configurations are built once per binary and referenced by handle from
//! every operation that uses them. Operations that write into a destination operand do not get a tensor of their own;
//! their results alias the buffer of that operand.
//!
//! ```ignore
//! let binary = tessel_lowering::lower_module(&module, &LoweringOptions::default())?;
//! let decoded = tessel_schema::verify_size_prefixed(&binary)?;
//! ```

pub mod assembler;
pub mod cache;
pub mod descriptors;
pub mod distribution;
pub mod errors;
pub mod golden;
pub mod operations;
pub mod options;

pub use self::assembler::*;
pub use self::cache::*;
pub use self::distribution::*;
pub use self::errors::*;
pub use self::golden::*;
pub use self::operations::*;
pub use self::options::*;
