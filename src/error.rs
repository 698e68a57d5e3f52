//! Error and result types reported by the recompiler.
use std::error;
use std::fmt;

/// Taxonomy of recompile failures. The caller maps each kind to the host
/// API's HRESULT-like convention; see `spec.md` §7.
#[derive(Debug)]
pub enum Error {
    /// Truncated instruction, unknown critical opcode, or an input/output
    /// signature that disagrees with the declarations in the bytecode.
    MalformedBytecode(String),
    /// A DXBC construct has no mapping to the target IR (unhandled resource
    /// dimension, unsupported interpolation mode, relative addressing on a
    /// resource declaration, texel offsets on a sample instruction, ...).
    Unsupported(String),
    /// A register reference has no corresponding entry in the binding
    /// layout, or a push-constant cbuffer's declared size disagrees with the
    /// layout's constant count.
    LayoutMismatch(String),
    /// Root-signature cost exceeded the binding budget, or a stage received
    /// more push-constant ranges than it has room for.
    CapacityExceeded(String),
    /// Caller-supplied parameters are inconsistent (null root signature,
    /// zero-sized shader, unknown range kind, non-zero register space on an
    /// unsupported target).
    InvalidArgument(String),
    /// Stream growth or symbol-table insertion failed.
    OutOfMemory(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;
        match self {
            MalformedBytecode(msg) => write!(f, "malformed DXBC bytecode: {}", msg),
            Unsupported(msg) => write!(f, "unsupported construct: {}", msg),
            LayoutMismatch(msg) => write!(f, "binding layout mismatch: {}", msg),
            CapacityExceeded(msg) => write!(f, "capacity exceeded: {}", msg),
            InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            OutOfMemory(msg) => write!(f, "out of memory: {}", msg),
        }
    }
}
impl error::Error for Error {}

impl From<std::num::TryFromIntError> for Error {
    fn from(_: std::num::TryFromIntError) -> Self {
        Error::MalformedBytecode("word count overflowed a 16-bit field".to_owned())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

macro_rules! bail {
    ($kind:ident, $($arg:tt)*) => {
        return Err($crate::error::Error::$kind(format!($($arg)*)))
    };
}
pub(crate) use bail;
