//! Types of the pre-legalized SSA IR.
//!
//! Integer widths above 32 bits have been split before the module reaches
//! this crate, so the scalar type set is closed and small. Vector types are
//! restricted to the lane shapes the SIMD lowering understands.

use serde::{Deserialize, Serialize};

use crate::diag::CodegenError;

/// Lane type of a vector. `Bool` lanes only occur as comparison results and
/// are represented as integer lanes of width `128 / lanes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Bool,
}

impl Lane {
    pub fn is_int(self) -> bool {
        !matches!(self, Lane::F32 | Lane::F64)
    }

    /// Primitive size in bits as declared, before boolean widening.
    pub fn bits(self) -> u32 {
        match self {
            Lane::Bool => 1,
            Lane::I8 => 8,
            Lane::I16 => 16,
            Lane::I32 | Lane::F32 => 32,
            Lane::I64 | Lane::F64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrType {
    Void,
    I1,
    I8,
    I16,
    I32,
    Float,
    Double,
    Ptr,
    Vec { lane: Lane, lanes: u8 },
}

impl IrType {
    pub fn int_bits(self) -> Option<u32> {
        match self {
            IrType::I1 => Some(1),
            IrType::I8 => Some(8),
            IrType::I16 => Some(16),
            IrType::I32 => Some(32),
            _ => None,
        }
    }

    pub fn is_int(self) -> bool {
        self.int_bits().is_some()
    }

    pub fn is_int_or_ptr(self) -> bool {
        self.is_int() || self == IrType::Ptr
    }

    pub fn is_float(self) -> bool {
        matches!(self, IrType::Float | IrType::Double)
    }

    pub fn is_vec(self) -> bool {
        matches!(self, IrType::Vec { .. })
    }

    /// Allocation size in bytes, as used for memory access widths.
    pub fn size_bytes(self) -> u32 {
        match self {
            IrType::Void => 0,
            IrType::I1 | IrType::I8 => 1,
            IrType::I16 => 2,
            IrType::I32 | IrType::Float | IrType::Ptr => 4,
            IrType::Double => 8,
            IrType::Vec { .. } => 16,
        }
    }

    /// Lane size in bits after boolean lanes are widened to fill 128 bits.
    pub fn actual_lane_bits(self) -> Result<u32, CodegenError> {
        match self {
            IrType::Vec { lane, lanes } => {
                let bits = lane.bits();
                if bits == 1 {
                    Ok(128 / lanes as u32)
                } else {
                    Ok(bits)
                }
            }
            _ => Err(CodegenError::UnsupportedType(self, "actual_lane_bits")),
        }
    }
}

/// Function signature; parameter and return types only, no varargs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FnSig {
    pub params: Vec<IrType>,
    pub ret: IrType,
}
