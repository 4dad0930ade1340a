//! Type coercions: every value use in the output carries an idiom that pins
//! its type down for the downstream validator.

use std::ops::BitOr;

use crate::codegen::writer::ModuleWriter;
use crate::diag::CodegenError;
use crate::ir::IrType;

/// How a value should be coerced at a use site. `SIGNED` is the empty set;
/// the other flags combine with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastFlags(u8);

impl CastFlags {
    pub const SIGNED: CastFlags = CastFlags(0);
    pub const UNSIGNED: CastFlags = CastFlags(1);
    /// Do not differentiate integer widths; `|0` for all of them.
    pub const NONSPECIFIC: CastFlags = CastFlags(2);
    /// Value comes back from an FFI boundary.
    pub const FFI_IN: CastFlags = CastFlags(4);
    /// Value is passed out across an FFI boundary.
    pub const FFI_OUT: CastFlags = CastFlags(8);
    /// The value must be explicitly cast even where a bare literal would do.
    pub const MUST_CAST: CastFlags = CastFlags(16);
    /// Render float constants as their raw bit pattern instead; NaN
    /// canonicalization would otherwise eat the payload. Incompatible with
    /// `UNSIGNED`.
    pub const FLOAT_AS_INT_BITS: CastFlags = CastFlags(32);

    pub fn has(self, other: CastFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Exactly the unsigned flag and nothing else; the sub-32-bit integer
    /// forms distinguish this from merely containing it.
    pub fn is_exactly_unsigned(self) -> bool {
        self.0 == CastFlags::UNSIGNED.0
    }

    pub fn is_exactly_signed(self) -> bool {
        self.0 == CastFlags::SIGNED.0
    }
}

impl BitOr for CastFlags {
    type Output = CastFlags;

    fn bitor(self, rhs: CastFlags) -> CastFlags {
        CastFlags(self.0 | rhs.0)
    }
}

impl<'m> ModuleWriter<'m> {
    /// Wraps `s` so it evaluates to a statically recognizable value of `ty`.
    pub(super) fn coerce(
        &mut self,
        s: &str,
        ty: IrType,
        flags: CastFlags,
    ) -> Result<String, CodegenError> {
        match ty {
            IrType::Vec { .. } => Ok(format!("SIMD_{}_check({s})", self.simd_tag(ty)?)),
            IrType::Float if self.opts.precise_f32 && !flags.has(CastFlags::FFI_OUT) => {
                if flags.has(CastFlags::FFI_IN) {
                    Ok(format!("Math_fround(+({s}))"))
                } else {
                    Ok(format!("Math_fround({s})"))
                }
            }
            IrType::Float | IrType::Double => Ok(format!("+{s}")),
            IrType::I1 if !flags.has(CastFlags::NONSPECIFIC) => {
                if flags.is_exactly_unsigned() {
                    Ok(format!("{s}&1"))
                } else {
                    Ok(format!("{s}<<31>>31"))
                }
            }
            IrType::I8 if !flags.has(CastFlags::NONSPECIFIC) => {
                if flags.is_exactly_unsigned() {
                    Ok(format!("{s}&255"))
                } else {
                    Ok(format!("{s}<<24>>24"))
                }
            }
            IrType::I16 if !flags.has(CastFlags::NONSPECIFIC) => {
                if flags.is_exactly_unsigned() {
                    Ok(format!("{s}&65535"))
                } else {
                    Ok(format!("{s}<<16>>16"))
                }
            }
            IrType::I1 | IrType::I8 | IrType::I16 | IrType::I32 | IrType::Ptr => {
                if flags.is_exactly_signed() || flags.has(CastFlags::NONSPECIFIC) {
                    Ok(format!("{s}|0"))
                } else {
                    Ok(format!("{s}>>>0"))
                }
            }
            IrType::Void => Err(CodegenError::UnsupportedType(ty, "coerce")),
        }
    }

    pub(super) fn paren_coerce(
        &mut self,
        s: &str,
        ty: IrType,
        flags: CastFlags,
    ) -> Result<String, CodegenError> {
        let wrapped = format!("({s})");
        self.coerce(&wrapped, ty, flags)
    }

    pub(super) fn coerce_if_must(
        &mut self,
        s: String,
        ty: IrType,
        flags: CastFlags,
    ) -> Result<String, CodegenError> {
        if flags.has(CastFlags::MUST_CAST) {
            self.coerce(&s, ty, flags)
        } else {
            Ok(s)
        }
    }

    /// `Math_fround` wrapper under precise float32 semantics.
    pub(super) fn ensure_float(&self, s: String, ty: IrType) -> String {
        if self.opts.precise_f32 && ty == IrType::Float {
            format!("Math_fround({s})")
        } else {
            s
        }
    }
}

/// Unconditional `Math_fround` wrapper; some SIMD constructors require an
/// actual float32 operand whether or not precise mode is on.
pub(super) fn ensure_float_wrap(s: String, wrap: bool) -> String {
    if wrap {
        format!("Math_fround({s})")
    } else {
        s
    }
}
