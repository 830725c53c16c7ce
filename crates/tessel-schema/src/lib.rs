//! Binary schema of tessel program artifacts.
//!
//! An artifact is a size-prefixed, digest-protected encoding of a [`Binary`]: a version header, the identity of the
//! build that produced it, a [`SystemDesc`], an [`ObjectTable`] of shared records, and one [`Program`] per lowered
//! function. Use [`finish_size_prefixed`] to produce artifacts and [`verify_size_prefixed`] to consume them.

pub mod binary;
pub mod errors;
pub mod framing;
pub mod operations;
pub mod records;
pub mod verifier;

pub use self::binary::*;
pub use self::errors::*;
pub use self::framing::*;
pub use self::operations::*;
pub use self::records::*;
pub use self::verifier::*;
