//! Error and warning types for the translation pipeline.
//!
//! Fatal conditions become `CodegenError` and abort the translation; warnings
//! accumulate in a `Diagnostics` sink and are drained by the driver after
//! emission finishes.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use thiserror::Error;

use crate::ir::IrType;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("failed to parse module: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// Fatal translation errors. There is no local recovery: any precondition
/// violation that cannot be downgraded to an emitted runtime trap ends the
/// translation.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("legalization problem: {0}-bit integer reached the emitter")]
    OversizedInteger(u32),

    #[error("unsupported vector type with {lanes} lanes of {bits} bits")]
    UnsupportedVector { lanes: u32, bits: u32 },

    #[error("invalid SIMD cast between items of different bit sizes")]
    SimdCastWidth,

    #[error("SIMD extract element with non-constant index not implemented")]
    NonConstantLane,

    #[error("unsupported constant kind in {0}")]
    UnsupportedConstant(&'static str),

    #[error("unsupported type {0:?} at {1}")]
    UnsupportedType(IrType, &'static str),

    #[error("cannot find global address {0}")]
    UnknownGlobal(String),

    #[error("invalid vector instruction: {0}")]
    InvalidVectorOp(&'static str),

    #[error("relocatable output requires global-base 0 and emulated function pointers")]
    InvalidOptions,
}

/// Non-fatal diagnostics. These never interrupt emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    NoncanonicalNan { bits: u64, width: u32 },
    UnalignedLoad { func: String },
    UnalignedStore { func: String },
    UnalignedVolatileLoad { func: String },
    UnalignedVolatileStore { func: String },
    WrongTargetTriple { triple: String },
    ManyLocals { count: usize },
}

impl Display for Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Warning::NoncanonicalNan { bits, width } => write!(
                f,
                "cannot represent a {width}-bit NaN literal with custom bit pattern \
                 0x{bits:x} in NaN-canonicalizing engines without erasing bits"
            ),
            Warning::UnalignedLoad { func } => {
                write!(f, "unaligned load in {func}")
            }
            Warning::UnalignedStore { func } => {
                write!(f, "unaligned store in {func}")
            }
            Warning::UnalignedVolatileLoad { func } => {
                write!(f, "unable to implement unaligned volatile load as atomic in {func}")
            }
            Warning::UnalignedVolatileStore { func } => {
                write!(f, "unable to implement unaligned volatile store as atomic in {func}")
            }
            Warning::WrongTargetTriple { triple } => {
                write!(f, "incorrect target triple '{triple}'")
            }
            Warning::ManyLocals { count } => write!(
                f,
                "emitted code will contain a very large number of local variables ({count}), \
                 which is bad for performance (build with optimizations to avoid this)"
            ),
        }
    }
}

/// Warning sink owned by the writer for the lifetime of one translation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}
