//! Rendering of IR constants as target expressions.

use crate::codegen::cast::{ensure_float_wrap, CastFlags};
use crate::codegen::writer::ModuleWriter;
use crate::diag::{CodegenError, Warning};
use crate::ir::{Constant, IrType, Operand};

pub(super) const CANONICAL_NAN_32: u32 = 0x7FC0_0000;
pub(super) const CANONICAL_NAN_64: u64 = 0x7FF8_0000_0000_0000;

/// Shortest representation that round-trips; falls back to exponent form
/// when the plain decimal expansion sprawls.
fn float_digits(v: f64) -> String {
    let s = format!("{v}");
    if s.len() > 21 {
        format!("{v:e}")
    } else {
        s
    }
}

fn float32_digits(v: f32) -> String {
    let s = format!("{v}");
    if s.len() > 21 {
        format!("{v:e}")
    } else {
        s
    }
}

impl<'m> ModuleWriter<'m> {
    /// Spells a floating-point literal. Infinities and NaN get the runtime's
    /// own names; integral values get a `+` prefix so downstream rewriting
    /// cannot turn them back into integer literals.
    fn float_literal(&mut self, c: &Constant, flags: CastFlags) -> Result<String, CodegenError> {
        let (value, bits, width, ty) = match c {
            Constant::F32 { bits } => (f32::from_bits(*bits) as f64, *bits as u64, 32, IrType::Float),
            Constant::F64 { bits } => (f64::from_bits(*bits), *bits, 64, IrType::Double),
            _ => return Err(CodegenError::UnsupportedConstant("float literal")),
        };

        if value.is_infinite() {
            let s = if value < 0.0 { "-inf" } else { "inf" };
            return self.coerce_if_must(s.to_string(), ty, flags);
        }
        if value.is_nan() {
            let canonical = match width {
                32 => bits == CANONICAL_NAN_32 as u64,
                _ => bits == CANONICAL_NAN_64,
            };
            if !canonical && self.opts.warn_noncanonical_nans {
                self.diags.warn(Warning::NoncanonicalNan { bits, width });
            }
            return self.coerce_if_must("nan".to_string(), ty, flags);
        }

        let digits = if width == 32 {
            let v32 = f32::from_bits(bits as u32);
            if self.opts.precise_f32 {
                float32_digits(v32)
            } else {
                float_digits(v32 as f64)
            }
        } else {
            float_digits(value)
        };
        if value.fract() == 0.0 {
            Ok(format!("+{digits}"))
        } else {
            Ok(digits)
        }
    }

    pub(super) fn const_expr(
        &mut self,
        c: &Constant,
        flags: CastFlags,
    ) -> Result<String, CodegenError> {
        match c {
            Constant::NullPtr => Ok("0".to_string()),

            Constant::Function(f) => {
                let index = self.function_index(*f)?;
                Ok(self.relocate_function_pointer(index.to_string()))
            }

            Constant::Global(g) => {
                let global = self.module.global(*g);
                if global.is_declaration() {
                    let name = self.js_global_name(*g);
                    self.externals.insert(name.clone());
                    if self.opts.relocatable {
                        // Linked externs are reached through accessor calls
                        // loaded once per function into a temporary.
                        self.func_reloc_externs.insert(name.clone());
                        let temp = format!("t${name}");
                        self.used_vars.insert(temp.clone(), IrType::I32);
                        return Ok(temp);
                    }
                    return Ok(name);
                }
                let addr = self.global_address(&self.global_names[g.index()])?;
                Ok(self.relocate_global(addr.to_string()))
            }

            Constant::Int { value, ty } => {
                let mut flags = flags;
                if !flags.is_exactly_unsigned() && *ty == IrType::I1 {
                    // Bools are always unsigned: either 0 or 1.
                    flags = CastFlags::UNSIGNED;
                }
                let width = ty
                    .int_bits()
                    .ok_or(CodegenError::UnsupportedConstant("integer"))?;
                if flags.is_exactly_unsigned() {
                    let mask = if width >= 64 {
                        u64::MAX
                    } else {
                        (1u64 << width) - 1
                    };
                    Ok(((*value as u64) & mask).to_string())
                } else {
                    Ok(value.to_string())
                }
            }

            Constant::F32 { .. } | Constant::F64 { .. } => {
                if !flags.has(CastFlags::FLOAT_AS_INT_BITS) {
                    let mut s = self.float_literal(c, flags)?;
                    if self.opts.precise_f32
                        && c.ty() == IrType::Float
                        && !flags.has(CastFlags::FFI_OUT)
                    {
                        s = format!("Math_fround({s})");
                    }
                    Ok(s)
                } else {
                    debug_assert!(!flags.has(CastFlags::UNSIGNED));
                    match c {
                        Constant::F32 { bits } => Ok((*bits as i32).to_string()),
                        Constant::F64 { bits } => Ok((*bits as i64).to_string()),
                        _ => unreachable!(),
                    }
                }
            }

            Constant::Undef(ty) | Constant::Zero(ty) => {
                if ty.is_vec() {
                    self.check_vector(*ty)?;
                    let tag = self.simd_tag(*ty)?;
                    let lane_is_float = match ty {
                        IrType::Vec { lane, .. } => !lane.is_int(),
                        _ => false,
                    };
                    let zero = ensure_float_wrap("0".to_string(), lane_is_float);
                    return Ok(format!("SIMD_{tag}_splat({zero})"));
                }
                if matches!(c, Constant::Undef(_)) && ty.is_float() {
                    let mut s = "+0".to_string();
                    if self.opts.precise_f32
                        && *ty == IrType::Float
                        && !flags.has(CastFlags::FFI_OUT)
                    {
                        s = format!("Math_fround({s})");
                    }
                    return Ok(s);
                }
                Ok("0".to_string())
            }

            Constant::Vector { ty, lanes } => self.const_vector(*ty, lanes),

            Constant::BlockAddress { func, block } => {
                Ok(self.block_address(*func, *block).to_string())
            }

            Constant::Expr { kind, ty } => {
                let inner = self.const_expr_code(kind, *ty)?;
                Ok(format!("({inner})"))
            }
        }
    }

    /// Vector constants: splats collapse, everything else becomes a full
    /// constructor padded to 128 bits. Lanes holding NaNs with custom bit
    /// patterns force an integer-lane construction plus a bit cast.
    fn const_vector(&mut self, ty: IrType, lanes: &[Constant]) -> Result<String, CodegenError> {
        self.check_vector(ty)?;
        let (lane, _count) = match ty {
            IrType::Vec { lane, lanes } => (lane, lanes),
            _ => return Err(CodegenError::UnsupportedConstant("vector")),
        };
        let is_int = lane.is_int();

        let has_special_nans = !is_int
            && lanes.iter().any(|c| match c {
                Constant::F32 { bits } => {
                    f32::from_bits(*bits).is_nan() && *bits != CANONICAL_NAN_32
                }
                Constant::F64 { bits } => {
                    f64::from_bits(*bits).is_nan() && *bits != CANONICAL_NAN_64
                }
                _ => false,
            });
        let lane_flags = if has_special_nans {
            CastFlags::FLOAT_AS_INT_BITS
        } else {
            CastFlags::SIGNED
        };

        let first = self.const_expr(&lanes[0], lane_flags)?;
        let mut all_equal = true;
        for c in &lanes[1..] {
            if self.const_expr(c, lane_flags)? != first {
                all_equal = false;
                break;
            }
        }

        let tag = self.simd_tag(ty)?;
        if all_equal {
            if !has_special_nans {
                return Ok(format!(
                    "SIMD_{tag}_splat({})",
                    ensure_float_wrap(first, !is_int)
                ));
            }
            let int_ty = integer_counterpart(ty)?;
            self.check_vector(int_ty)?;
            let int_tag = self.simd_tag(int_ty)?;
            let splat = format!("SIMD_{int_tag}_splat({first})");
            return self.simd_bits_cast(int_ty, ty, splat);
        }

        let pad_lanes = (128 / lane.bits()) as usize;
        if !has_special_nans {
            let mut s = format!("SIMD_{tag}({}", ensure_float_wrap(first, !is_int));
            for c in &lanes[1..] {
                let v = self.const_expr(c, CastFlags::SIGNED)?;
                s.push(',');
                s.push_str(&ensure_float_wrap(v, !is_int));
            }
            for _ in lanes.len()..pad_lanes {
                s.push(',');
                s.push_str(&ensure_float_wrap(
                    if is_int { "0" } else { "+0" }.to_string(),
                    !is_int,
                ));
            }
            s.push(')');
            return Ok(s);
        }

        let int_ty = integer_counterpart(ty)?;
        self.check_vector(int_ty)?;
        let int_tag = self.simd_tag(int_ty)?;
        let mut s = format!("SIMD_{int_tag}({first}");
        for c in &lanes[1..] {
            let v = self.const_expr(c, CastFlags::FLOAT_AS_INT_BITS)?;
            s.push(',');
            s.push_str(&v);
        }
        for _ in lanes.len()..pad_lanes {
            s.push_str(",0");
        }
        s.push(')');
        self.simd_bits_cast(int_ty, ty, s)
    }

    // Operand rendering; constants inline, SSA values by name.

    pub(super) fn op_expr(
        &mut self,
        op: &Operand,
        flags: CastFlags,
    ) -> Result<String, CodegenError> {
        match op {
            Operand::Const(c) => self.const_expr(c, flags),
            Operand::Value(v) => Ok(self.value_name(*v)),
        }
    }

    pub(super) fn op_cast(
        &mut self,
        op: &Operand,
        flags: CastFlags,
    ) -> Result<String, CodegenError> {
        match op {
            Operand::Const(c)
                if matches!(
                    c,
                    Constant::Int { .. } | Constant::F32 { .. } | Constant::F64 { .. }
                ) =>
            {
                self.const_expr(c, flags)
            }
            _ => {
                let ty = self.op_ty(op);
                let s = self.op_expr(op, CastFlags::SIGNED)?;
                self.coerce(&s, ty, flags)
            }
        }
    }

    /// Operand type without touching function state for constants, so the
    /// global passes can render constant expressions too.
    pub(super) fn op_ty(&self, op: &Operand) -> IrType {
        match op {
            Operand::Const(c) => c.ty(),
            Operand::Value(v) => self.func().value_ty(*v),
        }
    }

    pub(super) fn op_paren(&mut self, op: &Operand) -> Result<String, CodegenError> {
        match op {
            Operand::Const(c) => self.const_expr(c, CastFlags::SIGNED),
            Operand::Value(v) => Ok(format!("({})", self.value_name(*v))),
        }
    }

    pub(super) fn op_cast_paren(
        &mut self,
        op: &Operand,
        flags: CastFlags,
    ) -> Result<String, CodegenError> {
        match op {
            Operand::Const(c)
                if matches!(
                    c,
                    Constant::Int { .. }
                        | Constant::F32 { .. }
                        | Constant::F64 { .. }
                        | Constant::Undef(_)
                ) =>
            {
                self.const_expr(c, flags)
            }
            _ => Ok(format!("({})", self.op_cast(op, flags)?)),
        }
    }
}

/// The integer vector type with the same lane layout.
pub(super) fn integer_counterpart(ty: IrType) -> Result<IrType, CodegenError> {
    match ty {
        IrType::Vec {
            lane: crate::ir::Lane::F32,
            lanes,
        } => Ok(IrType::Vec {
            lane: crate::ir::Lane::I32,
            lanes,
        }),
        IrType::Vec {
            lane: crate::ir::Lane::F64,
            lanes,
        } => Ok(IrType::Vec {
            lane: crate::ir::Lane::I64,
            lanes,
        }),
        _ => Err(CodegenError::UnsupportedType(ty, "integer_counterpart")),
    }
}
