//! Per-instruction expression generation.
//!
//! Each non-terminator instruction becomes one statement of the form
//! `<lhs> = <rhs>;`, with the lhs present only when the value has users.
//! Constant expressions reuse the same generator as parenthesized
//! sub-expressions.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::codegen::cast::CastFlags;
use crate::codegen::writer::ModuleWriter;
use crate::diag::CodegenError;
use crate::ir::{
    AllocaElem, BinOp, BlockId, CastOp, Constant, FcmpOp, IcmpOp, Inst, InstKind, IrType,
    Operand, RmwOp, Terminator, ValueDef, ValueId,
};

fn double_to_int(s: &str) -> String {
    format!("~~({s})")
}

/// Appends a constant byte offset to a printed address.
fn add_offset(base: &str, offset: i32) -> String {
    if base.is_empty() {
        return offset.to_string();
    }
    if offset == 0 {
        return base.to_string();
    }
    format!("(({base}) + {offset}|0)")
}

impl<'m> ModuleWriter<'m> {
    pub(super) fn ad_hoc_assign(&mut self, name: &str, ty: IrType) -> String {
        self.used_vars.insert(name.to_string(), ty);
        format!("{name} = ")
    }

    pub(super) fn assign(&mut self, v: ValueId) -> String {
        let name = self.value_name(v);
        let ty = self.func().value_ty(v);
        self.ad_hoc_assign(&name, ty)
    }

    pub(super) fn assign_if_needed(&mut self, result: Option<ValueId>) -> String {
        match result {
            Some(v) if self.func().value(v).uses > 0 => self.assign(v),
            _ => String::new(),
        }
    }

    /// One full statement for an instruction, newline included; empty when
    /// the instruction emits nothing here.
    pub(super) fn inst_stmt(&mut self, inst: &'m Inst) -> Result<String, CodegenError> {
        let code = self.expression(inst)?;
        match code {
            Some(code) if !code.is_empty() => {
                let mut stmt = code;
                stmt.push(';');
                if let Some(dbg) = &inst.dbg {
                    if dbg.line > 0 {
                        stmt.push_str(&format!(" //@line {} \"{}\"", dbg.line, dbg.file));
                    }
                }
                stmt.push('\n');
                Ok(stmt)
            }
            _ => Ok(String::new()),
        }
    }

    /// Statement text for terminators that live in the block body; branch
    /// terminators are handled through the control-flow reconstruction.
    pub(super) fn term_stmt(&mut self, term: &Terminator) -> Result<String, CodegenError> {
        match term {
            Terminator::Ret { value } => {
                let mut code = String::new();
                if self.stack_bumped {
                    code.push_str("STACKTOP = sp;");
                }
                code.push_str("return");
                if let Some(v) = value {
                    let s =
                        self.op_cast_paren(v, CastFlags::NONSPECIFIC | CastFlags::MUST_CAST)?;
                    code.push(' ');
                    code.push_str(&s);
                }
                code.push_str(";\n");
                Ok(code)
            }
            Terminator::Unreachable => {
                // An abort typically precedes this; nothing to execute.
                Ok("// unreachable;\n".to_string())
            }
            _ => Ok(String::new()),
        }
    }

    /// Expression for a nested constant expression.
    pub(super) fn const_expr_code(
        &mut self,
        kind: &InstKind,
        ty: IrType,
    ) -> Result<String, CodegenError> {
        let inst = Inst {
            result: None,
            kind: kind.clone(),
            dbg: None,
        };
        // The borrow of a temporary is fine here: constant expressions never
        // recurse into value-name resolution.
        match self.expression_in(&inst, ty)? {
            Some(code) => Ok(code),
            None => Err(CodegenError::UnsupportedConstant("constant expression")),
        }
    }

    fn expression(&mut self, inst: &'m Inst) -> Result<Option<String>, CodegenError> {
        if let Some(code) = self.simd_expr(inst)? {
            return Ok(Some(code));
        }
        let ty = inst
            .result
            .map(|v| self.func().value_ty(v))
            .unwrap_or(IrType::Void);
        self.expression_in(inst, ty)
    }

    fn expression_in(&mut self, inst: &Inst, ty: IrType) -> Result<Option<String>, CodegenError> {
        let result = inst.result;
        match &inst.kind {
            InstKind::Binary { op, lhs, rhs } => {
                let assign = self.assign_if_needed(result);
                let code = self.binary_code(*op, lhs, rhs, ty)?;
                Ok(Some(format!("{assign}{code}")))
            }

            InstKind::Icmp { op, lhs, rhs } => {
                let sign = if op.is_unsigned() {
                    CastFlags::UNSIGNED
                } else {
                    CastFlags::SIGNED
                };
                let cmp = match op {
                    IcmpOp::Eq => "==",
                    IcmpOp::Ne => "!=",
                    IcmpOp::Ule | IcmpOp::Sle => "<=",
                    IcmpOp::Uge | IcmpOp::Sge => ">=",
                    IcmpOp::Ult | IcmpOp::Slt => "<",
                    IcmpOp::Ugt | IcmpOp::Sgt => ">",
                };
                let assign = self.assign_if_needed(result);
                let a = self.op_cast(lhs, sign)?;
                let b = self.op_cast(rhs, sign)?;
                Ok(Some(format!("{assign}({a}){cmp}({b})")))
            }

            InstKind::Fcmp { op, lhs, rhs } => {
                let assign = self.assign_if_needed(result);
                let a = self.op_expr(lhs, CastFlags::SIGNED)?;
                let b = self.op_expr(rhs, CastFlags::SIGNED)?;
                let code = match op {
                    FcmpOp::Oeq => format!("{a} == {b}"),
                    FcmpOp::Une => format!("{a} != {b}"),
                    FcmpOp::Ogt => format!("{a} > {b}"),
                    FcmpOp::Oge => format!("{a} >= {b}"),
                    FcmpOp::Olt => format!("{a} < {b}"),
                    FcmpOp::Ole => format!("{a} <= {b}"),
                    FcmpOp::Ugt => format!("!({a} <= {b})"),
                    FcmpOp::Uge => format!("!({a} < {b})"),
                    FcmpOp::Ult => format!("!({a} >= {b})"),
                    FcmpOp::Ule => format!("!({a} > {b})"),
                    FcmpOp::Ueq => format!("({a} != {a}) | ({b} != {b}) |({a} == {b})"),
                    FcmpOp::One => format!("({a} == {a}) & ({b} == {b}) &({a} != {b})"),
                    FcmpOp::Ord => format!("({a} == {a}) & ({b} == {b})"),
                    FcmpOp::Uno => format!("({a} != {a}) | ({b} != {b})"),
                    FcmpOp::False => "0".to_string(),
                    FcmpOp::True => "1".to_string(),
                };
                Ok(Some(format!("{assign}{code}")))
            }

            InstKind::Alloca { elem, count, align } => {
                self.alloca_code(result, *elem, count, *align)
            }

            InstKind::Load {
                ptr,
                ty: load_ty,
                align,
                volatile,
            } => {
                let result = result.ok_or(CodegenError::UnsupportedConstant("load result"))?;
                if let Operand::Value(p) = ptr {
                    if self.nativized.contains(p) {
                        let assign = self.assign(result);
                        let name = self.value_name(*p);
                        return Ok(Some(format!("{assign}{name}")));
                    }
                }
                Ok(Some(self.load_code(result, ptr, *load_ty, *align, *volatile)?))
            }

            InstKind::Store {
                ptr,
                value,
                align,
                volatile,
            } => {
                let vs = self.op_expr(value, CastFlags::SIGNED)?;
                if let Operand::Value(p) = ptr {
                    if self.nativized.contains(p) {
                        let name = self.value_name(*p);
                        return Ok(Some(format!("{name} = {vs}")));
                    }
                }
                let value_ty = value.ty(self.func());
                Ok(Some(self.store_code(ptr, value_ty, &vs, *align, *volatile)?))
            }

            InstKind::Gep {
                base,
                offset,
                indices,
            } => {
                let assign = self.assign_if_needed(result);
                let mut constant_offset = *offset;
                let mut text = String::new();
                let folds = match base {
                    Operand::Const(Constant::Global(g)) => {
                        !self.module.global(*g).is_declaration() && !self.opts.relocatable
                    }
                    _ => false,
                };
                if folds {
                    if let Operand::Const(Constant::Global(g)) = base {
                        let addr = self.global_address(&self.global_names[g.index()])?;
                        constant_offset = constant_offset.wrapping_add(addr as i32);
                    }
                } else {
                    text = self.op_paren(base)?;
                }
                for idx in indices {
                    if let Some(c) = idx.index.as_const_int() {
                        constant_offset = constant_offset
                            .wrapping_add((c as i32).wrapping_mul(idx.elem_size as i32));
                    } else {
                        // Add the accumulated offset first to avoid
                        // reassociation widening the wraparound risk.
                        text = add_offset(&text, constant_offset);
                        constant_offset = 0;
                        let scale = Operand::Const(Constant::Int {
                            value: idx.elem_size as i64,
                            ty: IrType::I32,
                        });
                        let mul = self.imul_code(&idx.index, &scale)?;
                        text = if text.is_empty() {
                            mul
                        } else {
                            format!("({text} + ({mul})|0)")
                        };
                    }
                }
                Ok(Some(format!(
                    "{assign}{}",
                    add_offset(&text, constant_offset)
                )))
            }

            InstKind::Phi { .. } => Ok(None),

            InstKind::Cast { op, value } => self.cast_code(result, *op, value, ty),

            InstKind::Select {
                cond,
                if_true,
                if_false,
            } => {
                let assign = self.assign_if_needed(result);
                let c = self.op_expr(cond, CastFlags::SIGNED)?;
                let t = self.op_expr(if_true, CastFlags::SIGNED)?;
                let f = self.op_expr(if_false, CastFlags::SIGNED)?;
                Ok(Some(format!("{assign}{c} ? {t} : {f}")))
            }

            InstKind::Call { callee, args } => self.call_code(result, ty, callee, args),

            InstKind::AtomicRmw { op, ptr, value } => {
                let result =
                    result.ok_or(CodegenError::UnsupportedConstant("atomicrmw result"))?;
                Ok(Some(self.atomic_rmw_code(result, *op, ptr, value, ty)?))
            }

            InstKind::Fence => {
                if self.opts.enable_pthreads {
                    Ok(Some("Atomics_fence()".to_string()))
                } else {
                    // No threads, nothing to order.
                    Ok(Some("/* fence */".to_string()))
                }
            }

            InstKind::LifetimeStart { .. } | InstKind::LifetimeEnd { .. } => Ok(None),

            InstKind::InsertElement { .. }
            | InstKind::ExtractElement { .. }
            | InstKind::Shuffle { .. } => {
                Err(CodegenError::InvalidVectorOp("vector op on scalar type"))
            }
        }
    }

    fn binary_code(
        &mut self,
        op: BinOp,
        lhs: &Operand,
        rhs: &Operand,
        ty: IrType,
    ) -> Result<String, CodegenError> {
        match op {
            BinOp::Add | BinOp::Sub => {
                let a = self.op_paren(lhs)?;
                let b = self.op_paren(rhs)?;
                let sign = if op == BinOp::Add { "+" } else { "-" };
                self.paren_coerce(&format!("{a} {sign} {b}"), ty, CastFlags::SIGNED)
            }
            BinOp::Mul => self.imul_code(lhs, rhs),
            BinOp::UDiv | BinOp::SDiv | BinOp::URem | BinOp::SRem => {
                let sign = if matches!(op, BinOp::SDiv | BinOp::SRem) {
                    CastFlags::SIGNED
                } else {
                    CastFlags::UNSIGNED
                };
                let a = self.op_cast_paren(lhs, sign)?;
                let b = self.op_cast_paren(rhs, sign)?;
                let operator = if matches!(op, BinOp::UDiv | BinOp::SDiv) {
                    " / "
                } else {
                    " % "
                };
                Ok(format!("({a}{operator}{b})&-1"))
            }
            BinOp::And | BinOp::Or | BinOp::Xor => {
                let a = self.op_expr(lhs, CastFlags::SIGNED)?;
                let b = self.op_expr(rhs, CastFlags::SIGNED)?;
                let operator = match op {
                    BinOp::And => " & ",
                    BinOp::Or => " | ",
                    _ => " ^ ",
                };
                Ok(format!("{a}{operator}{b}"))
            }
            BinOp::Shl => {
                let a = self.op_expr(lhs, CastFlags::SIGNED)?;
                let b = self.op_expr(rhs, CastFlags::SIGNED)?;
                let shifted = format!("{a} << {b}");
                if ty.int_bits().unwrap_or(32) < 32 {
                    // Drop the bits shifted past the value's width.
                    self.paren_coerce(&shifted, ty, CastFlags::UNSIGNED)
                } else {
                    Ok(shifted)
                }
            }
            BinOp::LShr | BinOp::AShr => {
                let mut input = self.op_expr(lhs, CastFlags::SIGNED)?;
                if ty.int_bits().unwrap_or(32) < 32 {
                    // Fill in the high bits; the shift happens in 32 bits.
                    let sign = if op == BinOp::AShr {
                        CastFlags::SIGNED
                    } else {
                        CastFlags::UNSIGNED
                    };
                    input = format!("({})", self.coerce(&input, ty, sign)?);
                }
                let b = self.op_expr(rhs, CastFlags::SIGNED)?;
                let operator = if op == BinOp::AShr { " >> " } else { " >>> " };
                Ok(format!("{input}{operator}{b}"))
            }
            BinOp::FAdd | BinOp::FMul | BinOp::FDiv | BinOp::FRem => {
                let a = self.op_expr(lhs, CastFlags::SIGNED)?;
                let b = self.op_expr(rhs, CastFlags::SIGNED)?;
                let operator = match op {
                    BinOp::FAdd => " + ",
                    BinOp::FMul => " * ",
                    BinOp::FDiv => " / ",
                    _ => " % ",
                };
                Ok(self.ensure_float(format!("{a}{operator}{b}"), ty))
            }
            BinOp::FSub => {
                if is_negative_zero(lhs) {
                    let b = self.op_expr(rhs, CastFlags::SIGNED)?;
                    Ok(self.ensure_float(format!("-{b}"), ty))
                } else {
                    let a = self.op_expr(lhs, CastFlags::SIGNED)?;
                    let b = self.op_expr(rhs, CastFlags::SIGNED)?;
                    Ok(self.ensure_float(format!("{a} - {b}"), ty))
                }
            }
        }
    }

    /// Strength-reduced integer multiply.
    pub(super) fn imul_code(
        &mut self,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<String, CodegenError> {
        let (constant, other) = if let Some(c) = lhs.as_const_int() {
            (Some(c), rhs)
        } else if let Some(c) = rhs.as_const_int() {
            (Some(c), lhs)
        } else {
            (None, rhs)
        };
        // Two constant operands would have been folded before we got here.
        if let Some(c) = constant {
            let other_str = self.op_expr(other, CastFlags::SIGNED)?;
            let c = c as u32;
            if c == 0 {
                return Ok("0".to_string());
            }
            if c == 1 {
                return Ok(other_str);
            }
            if c.is_power_of_two() {
                return Ok(format!("{other_str}<<{}", c.trailing_zeros()));
            }
            if c < (1 << 20) {
                // Small enough to stay precise in a double; avoid imul.
                return Ok(format!("({other_str}*{c})|0"));
            }
        }
        let a = self.op_expr(lhs, CastFlags::SIGNED)?;
        let b = self.op_expr(rhs, CastFlags::SIGNED)?;
        Ok(format!("Math_imul({a}, {b})|0"))
    }

    fn alloca_code(
        &mut self,
        result: Option<ValueId>,
        elem: AllocaElem,
        count: &Operand,
        align: u32,
    ) -> Result<Option<String>, CodegenError> {
        let result = result.ok_or(CodegenError::UnsupportedConstant("alloca result"))?;

        // Any alloca bumps the stack, so returns must restore it. Nativized
        // slots are still counted against the frame, so this holds for them
        // too.
        self.stack_bumped = true;

        if self.nativized.contains(&result) {
            let name = self.value_name(result);
            let ty = match elem {
                AllocaElem::Scalar(ty) => ty,
                AllocaElem::Blob { .. } => IrType::I32,
            };
            self.used_vars.insert(name, ty);
            return Ok(None);
        }

        if let Some(offset) = self.plan.frame_offset(result) {
            let assign = self.assign(result);
            let base = if self.plan.max_align() <= crate::config::STACK_ALIGN {
                "sp"
            } else {
                // The aligned base of the frame differs from sp.
                "sp_a"
            };
            let mut code = format!("{assign}{base}");
            if offset != 0 {
                code.push_str(&format!(" + {offset}|0"));
            }
            return Ok(Some(code));
        }
        if self.plan.representative(result).is_some() {
            // Folded into another slot; nothing to print.
            return Ok(None);
        }

        debug_assert!(align <= crate::config::STACK_ALIGN);
        let base_size = elem.size_bytes();
        let size = match count.as_const_int() {
            Some(c) => {
                let total = base_size.saturating_mul(c as u32);
                ((total + crate::config::STACK_ALIGN - 1) & !(crate::config::STACK_ALIGN - 1))
                    .to_string()
            }
            None => {
                let count_str = self.op_expr(count, CastFlags::SIGNED)?;
                format!("(((({base_size}*{count_str})|0)+15)&-16)")
            }
        };
        let assign = self.assign(result);
        let bump = self.stack_bump(&size);
        Ok(Some(format!("{assign}STACKTOP; {bump}")))
    }

    fn cast_code(
        &mut self,
        result: Option<ValueId>,
        op: CastOp,
        value: &Operand,
        ty: IrType,
    ) -> Result<Option<String>, CodegenError> {
        let assign = self.assign_if_needed(result);
        let code = match op {
            CastOp::PtrToInt | CastOp::IntToPtr => self.op_expr(value, CastFlags::SIGNED)?,
            CastOp::Trunc => {
                let bits = ty
                    .int_bits()
                    .ok_or(CodegenError::UnsupportedType(ty, "trunc"))?;
                let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
                format!("{}&{mask}", self.op_expr(value, CastFlags::SIGNED)?)
            }
            CastOp::SExt => {
                let in_bits = value
                    .ty(self.func())
                    .int_bits()
                    .ok_or(CodegenError::UnsupportedType(ty, "sext"))?;
                let bits = 32 - in_bits;
                format!(
                    "{} << {bits} >> {bits}",
                    self.op_expr(value, CastFlags::SIGNED)?
                )
            }
            CastOp::ZExt => self.op_cast(value, CastFlags::UNSIGNED)?,
            CastOp::FpExt => {
                let v = self.op_expr(value, CastFlags::SIGNED)?;
                if self.opts.precise_f32 {
                    format!("+{v}")
                } else {
                    v
                }
            }
            CastOp::FpTrunc => {
                let v = self.op_expr(value, CastFlags::SIGNED)?;
                self.ensure_float(v, ty)
            }
            CastOp::SiToFp => {
                let v = self.op_cast_paren(value, CastFlags::SIGNED)?;
                format!("({})", self.coerce(&v, ty, CastFlags::SIGNED)?)
            }
            CastOp::UiToFp => {
                let v = self.op_cast_paren(value, CastFlags::UNSIGNED)?;
                format!("({})", self.coerce(&v, ty, CastFlags::SIGNED)?)
            }
            CastOp::FpToSi => {
                let v = self.op_paren(value)?;
                format!("({})", double_to_int(&v))
            }
            CastOp::FpToUi => {
                let v = self.op_paren(value)?;
                let truncated = double_to_int(&v);
                format!("({})", self.coerce(&truncated, ty, CastFlags::UNSIGNED)?)
            }
            CastOp::Bitcast => {
                let in_ty = value.ty(self.func());
                let v = self.op_expr(value, CastFlags::SIGNED)?;
                if in_ty.is_int_or_ptr() && ty.is_float() {
                    let read =
                        self.coerce("HEAPF32[tempDoublePtr>>2]", IrType::Float, CastFlags::SIGNED)?;
                    format!("(HEAP32[tempDoublePtr>>2]={v},{read})")
                } else if in_ty.is_float() && ty.is_int_or_ptr() {
                    format!("(HEAPF32[tempDoublePtr>>2]={v},HEAP32[tempDoublePtr>>2]|0)")
                } else {
                    v
                }
            }
        };
        Ok(Some(format!("{assign}{code}")))
    }

    fn atomic_rmw_code(
        &mut self,
        result: ValueId,
        op: RmwOp,
        ptr: &Operand,
        value: &Operand,
        ty: IrType,
    ) -> Result<String, CodegenError> {
        let vs = self.op_expr(value, CastFlags::SIGNED)?;
        if self.opts.enable_pthreads {
            let assign = self.assign(result);
            let (heap, index) = self.heap_name_and_index(ptr, ty.size_bytes(), ty.is_int_or_ptr())?;
            let name = match op {
                RmwOp::Xchg => "exchange",
                RmwOp::Add => "add",
                RmwOp::Sub => "sub",
                RmwOp::And => "and",
                RmwOp::Or => "or",
                RmwOp::Xor => "xor",
                RmwOp::Nand => {
                    return Err(CodegenError::UnsupportedConstant("atomic nand"))
                }
            };
            if heap == "HEAPF32" || heap == "HEAPF64" {
                let fround = self.opts.precise_f32 && heap == "HEAPF32";
                let ps = self.op_expr(ptr, CastFlags::SIGNED)?;
                let kind = if heap == "HEAPF32" { "f32" } else { "f64" };
                return Ok(format!(
                    "{assign}{}_emscripten_atomic_{name}_{kind}({ps}, {vs}{}",
                    if fround { "Math_fround(" } else { "+" },
                    if fround { "))" } else { ")" }
                ));
            }
            if op == RmwOp::Xchg && heap == "HEAP32" {
                let ps = self.op_expr(ptr, CastFlags::SIGNED)?;
                return Ok(format!(
                    "{assign}_emscripten_atomic_exchange_u32({ps}, {vs})|0"
                ));
            }
            return Ok(format!("{assign}Atomics_{name}({heap}, {index}, {vs})"));
        }

        let load = self.load_code(result, ptr, ty, 0, false)?;
        let name = self.value_name(result);
        let new_value = match op {
            RmwOp::Xchg => vs,
            RmwOp::Add => format!("(({name}+{vs})|0)"),
            RmwOp::Sub => format!("(({name}-{vs})|0)"),
            RmwOp::And => format!("({name}&{vs})"),
            RmwOp::Nand => format!("(~({name}&{vs}))"),
            RmwOp::Or => format!("({name}|{vs})"),
            RmwOp::Xor => format!("({name}^{vs})"),
        };
        let store = self.store_code(ptr, ty, &new_value, 0, false)?;
        Ok(format!("{load};{store}"))
    }

    /// The assignments a branch edge owes to the phis of its target, with
    /// intra-edge dependencies ordered and cycles broken through `$phi`
    /// temporaries.
    pub(super) fn phi_epilogue(
        &mut self,
        from: BlockId,
        to: BlockId,
    ) -> Result<String, CodegenError> {
        let func = self.func();

        let mut phi_vars: HashSet<String> = HashSet::new();
        for inst in &func.block(to).insts {
            if !matches!(inst.kind, InstKind::Phi { .. }) {
                break;
            }
            if let Some(r) = inst.result {
                phi_vars.insert(self.value_name(r));
            }
        }

        #[derive(Clone)]
        struct Entry {
            value: Operand,
            ty: IrType,
        }
        let mut assigns: BTreeMap<String, Entry> = BTreeMap::new();
        let mut deps: HashMap<String, String> = HashMap::new();
        for inst in &func.block(to).insts {
            let incoming = match &inst.kind {
                InstKind::Phi { incoming } => incoming,
                _ => break,
            };
            let result = match inst.result {
                Some(r) => r,
                None => continue,
            };
            let operand = match incoming.iter().find(|(b, _)| *b == from) {
                Some((_, op)) => op,
                None => continue,
            };
            let name = self.value_name(result);
            assigns.insert(
                name.clone(),
                Entry {
                    value: operand.clone(),
                    ty: func.value_ty(result),
                },
            );
            let vname = self.op_expr(operand, CastFlags::SIGNED)?;
            if let Operand::Value(v) = operand {
                if let ValueDef::Inst { block, .. } = func.value(*v).def {
                    if block == to && phi_vars.contains(&vname) {
                        deps.insert(name, vname);
                    }
                }
            }
        }

        let mut pre = String::new();
        let mut post = String::new();
        while !assigns.is_empty() {
            let mut emitted = false;
            let keys: Vec<String> = assigns.keys().cloned().collect();
            for (i, curr) in keys.iter().enumerate() {
                let entry = match assigns.get(curr) {
                    Some(e) => e.clone(),
                    None => continue,
                };
                let mut cv = self.op_expr(&entry.value, CastFlags::SIGNED)?;
                let has_dep = deps.contains_key(curr);
                let last = i == keys.len() - 1;
                // Emit anything without pending dependencies; when a full
                // sweep emits nothing we are in a cycle, so break it at the
                // final entry with a temporary.
                if !has_dep || (!emitted && last) {
                    if has_dep {
                        let temp = format!("{curr}$phi");
                        pre.push_str(&self.ad_hoc_assign(&temp, entry.ty));
                        pre.push_str(&cv);
                        pre.push(';');
                        cv = temp;
                        deps.remove(curr);
                    }
                    post.push_str(&self.ad_hoc_assign(curr, entry.ty));
                    post.push_str(&cv);
                    post.push(';');
                    assigns.remove(curr);
                    emitted = true;
                }
            }
        }
        Ok(format!("{pre}{post}"))
    }
}

fn is_negative_zero(op: &Operand) -> bool {
    match op {
        Operand::Const(Constant::F32 { bits }) => *bits == 0x8000_0000,
        Operand::Const(Constant::F64 { bits }) => *bits == 0x8000_0000_0000_0000,
        _ => false,
    }
}
