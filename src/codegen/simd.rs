//! Vector instruction lowering.
//!
//! Vector values map onto the 128-bit SIMD API: a type renders to a tag
//! `Int<W>x<N>` / `Float<W>x<N>` and every operation becomes a call on the
//! `SIMD_<Tag>_<op>` naming scheme. Narrower vectors are padded with zero
//! lanes; boolean vectors are carried as integer vectors of width `128/N`.

use crate::codegen::cast::{ensure_float_wrap, CastFlags};
use crate::codegen::writer::ModuleWriter;
use crate::diag::CodegenError;
use crate::ir::{
    BinOp, CastOp, Constant, FcmpOp, IcmpOp, Inst, InstKind, IrType, Lane, Operand, ValueId,
};

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SimdUses {
    pub int8x16: bool,
    pub int16x8: bool,
    pub int32x4: bool,
    pub float32x4: bool,
    pub float64x2: bool,
}

impl SimdUses {
    pub fn any(self) -> bool {
        self.int8x16 || self.int16x8 || self.int32x4 || self.float32x4 || self.float64x2
    }
}

fn bool_vec_to_int_vec(num_elems: u32, s: &str) -> String {
    let width = 128 / num_elems;
    let ty = format!("SIMD_Int{width}x{num_elems}");
    format!("{ty}_select({s}, {ty}_splat(-1), {ty}_splat(0))")
}

fn int_vec_to_bool_vec(num_elems: u32, s: &str) -> String {
    let width = 128 / num_elems;
    let ty = format!("SIMD_Int{width}x{num_elems}");
    format!("{ty}_notEqual({s}, {ty}_splat(0))")
}

fn lane_scalar_ty(lane: Lane) -> IrType {
    match lane {
        Lane::Bool => IrType::I1,
        Lane::I8 => IrType::I8,
        Lane::I16 => IrType::I16,
        Lane::I32 | Lane::I64 => IrType::I32,
        Lane::F32 => IrType::Float,
        Lane::F64 => IrType::Double,
    }
}

fn vec_parts(ty: IrType) -> Result<(Lane, u32), CodegenError> {
    match ty {
        IrType::Vec { lane, lanes } => Ok((lane, lanes as u32)),
        _ => Err(CodegenError::UnsupportedType(ty, "vector op")),
    }
}

impl<'m> ModuleWriter<'m> {
    /// Validates a vector type and records its usage for the metadata.
    pub(super) fn check_vector(&mut self, ty: IrType) -> Result<(), CodegenError> {
        let (lane, lanes) = vec_parts(ty)?;
        let bits = lane.bits();
        if lanes > 16 || (bits * lanes > 128 && bits != 1) {
            return Err(CodegenError::UnsupportedVector { lanes, bits });
        }
        if lane.is_int() {
            if lanes <= 16 && bits == 8 {
                self.simd.int8x16 = true;
            } else if lanes <= 8 && bits == 16 {
                self.simd.int16x8 = true;
            } else if lanes <= 4 && bits == 32 {
                self.simd.int32x4 = true;
            } else if bits != 1 {
                return Err(CodegenError::UnsupportedVector { lanes, bits });
            }
        } else if lanes <= 4 && bits == 32 {
            self.simd.float32x4 = true;
        } else if lanes <= 2 && bits == 64 {
            self.simd.float64x2 = true;
        } else {
            return Err(CodegenError::UnsupportedVector { lanes, bits });
        }
        Ok(())
    }

    /// `Int32x4`, `Float64x2`, ... after boolean widening and lane padding.
    pub(super) fn simd_tag(&self, ty: IrType) -> Result<String, CodegenError> {
        let (lane, _) = vec_parts(ty)?;
        let bits = ty.actual_lane_bits()?;
        let elems = 128 / bits;
        Ok(format!(
            "{}{}x{}",
            if lane.is_int() { "Int" } else { "Float" },
            bits,
            elems
        ))
    }

    /// Elementwise bit reinterpretation between vector types, including the
    /// boolean special cases.
    pub(super) fn simd_bits_cast(
        &mut self,
        from: IrType,
        to: IrType,
        value: String,
    ) -> Result<String, CodegenError> {
        let (from_lane, _) = vec_parts(from)?;
        let (to_lane, _) = vec_parts(to)?;
        let from_bits = from_lane.bits();
        let to_bits = to_lane.bits();
        if from_lane.is_int() == to_lane.is_int() && from_bits == to_bits {
            return Ok(value);
        }

        let to_elems = 128 / to_bits.max(1);
        let from_is_bool = from_lane.is_int() && from_bits == 1;
        let to_is_bool = to_lane.is_int() && to_bits == 1;
        if from_is_bool && !to_is_bool {
            return Ok(bool_vec_to_int_vec(to_elems, &value));
        }

        let from_width = from_bits * vec_parts(from)?.1;
        let to_width = to_bits * vec_parts(to)?.1;
        if from_width != to_width && !from_is_bool && !to_is_bool {
            return Err(CodegenError::SimdCastWidth);
        }

        Ok(format!(
            "SIMD_{}_from{}Bits({value})",
            self.simd_tag(to)?,
            self.simd_tag(from)?
        ))
    }

    /// Lowers an instruction that produces or consumes a vector. Returns
    /// `None` when the instruction is not a SIMD case after all (calls,
    /// scalar-condition selects).
    pub(super) fn simd_expr(&mut self, inst: &'m Inst) -> Result<Option<String>, CodegenError> {
        let result_ty = inst
            .result
            .map(|v| self.func().value_ty(v))
            .unwrap_or(IrType::Void);

        if result_ty.is_vec() {
            self.check_vector(result_ty)?;
            let tag = self.simd_tag(result_ty)?;
            let code = match &inst.kind {
                InstKind::Call { .. } => return Ok(None),
                // Handled through the branch epilogues.
                InstKind::Phi { .. } => String::new(),
                InstKind::Icmp { op, lhs, rhs } => {
                    self.vec_icmp_code(inst.result, result_ty, *op, lhs, rhs)?
                }
                InstKind::Fcmp { op, lhs, rhs } => {
                    self.vec_fcmp_code(inst.result, result_ty, *op, lhs, rhs)?
                }
                InstKind::Cast {
                    op: CastOp::SExt,
                    value,
                } => {
                    let from = value.ty(self.func());
                    let v = self.op_expr(value, CastFlags::SIGNED)?;
                    let cast = self.simd_bits_cast(from, result_ty, v)?;
                    format!("{}{}", self.assign_if_needed(inst.result), cast)
                }
                InstKind::Cast {
                    op: CastOp::Bitcast | CastOp::SiToFp,
                    value,
                } => {
                    let from = value.ty(self.func());
                    let v = self.op_expr(value, CastFlags::SIGNED)?;
                    let cast = self.simd_bits_cast(from, result_ty, v)?;
                    format!("{}{}", self.assign_if_needed(inst.result), cast)
                }
                InstKind::Select {
                    cond,
                    if_true,
                    if_false,
                } => {
                    if !cond.ty(self.func()).is_vec() {
                        // Scalar condition; plain ternary handles it.
                        return Ok(None);
                    }
                    let c = self.op_expr(cond, CastFlags::SIGNED)?;
                    let t = self.op_expr(if_true, CastFlags::SIGNED)?;
                    let f = self.op_expr(if_false, CastFlags::SIGNED)?;
                    format!(
                        "{}SIMD_{tag}_select({c},{t},{f})",
                        self.assign_if_needed(inst.result)
                    )
                }
                InstKind::Binary { op, lhs, rhs } => match op {
                    BinOp::Add | BinOp::FAdd => self.vec_binop_code(inst.result, &tag, "add", lhs, rhs)?,
                    BinOp::Sub => self.vec_binop_code(inst.result, &tag, "sub", lhs, rhs)?,
                    BinOp::Mul | BinOp::FMul => self.vec_binop_code(inst.result, &tag, "mul", lhs, rhs)?,
                    BinOp::FDiv => self.vec_binop_code(inst.result, &tag, "div", lhs, rhs)?,
                    BinOp::And => self.vec_binop_code(inst.result, &tag, "and", lhs, rhs)?,
                    BinOp::Or => self.vec_binop_code(inst.result, &tag, "or", lhs, rhs)?,
                    BinOp::Xor => {
                        if is_all_ones_vector(rhs) {
                            let v = self.op_expr(lhs, CastFlags::SIGNED)?;
                            format!("{}SIMD_{tag}_not({v})", self.assign_if_needed(inst.result))
                        } else {
                            self.vec_binop_code(inst.result, &tag, "xor", lhs, rhs)?
                        }
                    }
                    BinOp::FSub => {
                        if is_negative_zero_vector(lhs) {
                            let v = self.op_expr(rhs, CastFlags::SIGNED)?;
                            format!("{}SIMD_{tag}_neg({v})", self.assign_if_needed(inst.result))
                        } else {
                            self.vec_binop_code(inst.result, &tag, "sub", lhs, rhs)?
                        }
                    }
                    BinOp::SDiv | BinOp::UDiv | BinOp::SRem | BinOp::URem => {
                        // No native lane division; unroll to scalars.
                        self.unrolled_code(inst.result, result_ty, *op, lhs, rhs)?
                    }
                    BinOp::Shl | BinOp::LShr | BinOp::AShr => {
                        self.vec_shift_code(inst.result, result_ty, *op, lhs, rhs)?
                    }
                    BinOp::FRem => return Err(CodegenError::InvalidVectorOp("frem")),
                },
                InstKind::Load { ptr, ty, .. } => {
                    let (lane, lanes) = vec_parts(*ty)?;
                    let ps = self.op_expr(ptr, CastFlags::SIGNED)?;
                    let suffix = partial_access_suffix(lane, lanes);
                    format!(
                        "{}SIMD_{tag}_load{suffix}(HEAPU8, {ps})",
                        self.assign_if_needed(inst.result)
                    )
                }
                InstKind::InsertElement { .. } => {
                    match self.insert_element_code(inst, result_ty)? {
                        Some(code) => code,
                        None => return Ok(Some(String::new())),
                    }
                }
                InstKind::Shuffle { a, b, mask } => {
                    self.shuffle_code(inst.result, result_ty, a, b, mask)?
                }
                _ => return Err(CodegenError::InvalidVectorOp("vector instruction")),
            };
            return Ok(Some(code));
        }

        // Vector-consuming instructions with scalar (or no) result.
        match &inst.kind {
            InstKind::Store { ptr, value, .. } if value.ty(self.func()).is_vec() => {
                let ty = value.ty(self.func());
                self.check_vector(ty)?;
                let tag = self.simd_tag(ty)?;
                let (lane, lanes) = vec_parts(ty)?;
                let temp = format!("temp_{tag}_ptr");
                let assign = self.ad_hoc_assign(&temp, IrType::Ptr);
                let ps = self.op_expr(ptr, CastFlags::SIGNED)?;
                let vs = self.op_expr(value, CastFlags::SIGNED)?;
                let suffix = partial_access_suffix(lane, lanes);
                Ok(Some(format!(
                    "{assign}{ps};SIMD_{tag}_store{suffix}(HEAPU8, {temp}, {vs})"
                )))
            }
            InstKind::ExtractElement { vec, index } => {
                Ok(Some(self.extract_element_code(inst, vec, index)?))
            }
            _ => Ok(None),
        }
    }

    fn vec_binop_code(
        &mut self,
        result: Option<ValueId>,
        tag: &str,
        op: &str,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<String, CodegenError> {
        let a = self.op_expr(lhs, CastFlags::SIGNED)?;
        let b = self.op_expr(rhs, CastFlags::SIGNED)?;
        Ok(format!(
            "{}SIMD_{tag}_{op}({a},{b})",
            self.assign_if_needed(result)
        ))
    }

    /// Insert chains collapse to a splat, a constructor, or a `replaceLane`
    /// series. Chain interior links and the splat-shuffle idiom emit
    /// nothing; the head emits everything.
    fn insert_element_code(
        &mut self,
        inst: &'m Inst,
        ty: IrType,
    ) -> Result<Option<String>, CodegenError> {
        let result = match inst.result {
            Some(r) => r,
            None => return Ok(None),
        };
        if self.func().value(result).uses == 1 {
            if let Some(user) = self.single_user_kind(result) {
                if matches!(user, InstKind::InsertElement { vec: Operand::Value(v), .. } if *v == result)
                {
                    return Ok(None);
                }
                if let InstKind::Shuffle { a: Operand::Value(v), mask, .. } = user {
                    if *v == result && mask.iter().all(|m| *m == 0) {
                        if let InstKind::InsertElement { vec, index, .. } = &inst.kind {
                            if index.as_const_int() == Some(0)
                                && !self.defined_by_insert_element(vec)
                            {
                                return Ok(None);
                            }
                        }
                    }
                }
            }
        }

        let (lane, lanes) = vec_parts(ty)?;
        let num_elems = lanes as usize;
        let mut operands: Vec<Option<Operand>> = vec![None; num_elems];
        let mut num_inserted = 0usize;
        let mut splat: Option<Operand> = match &inst.kind {
            InstKind::InsertElement { elem, .. } => Some(elem.clone()),
            _ => return Err(CodegenError::InvalidVectorOp("insertelement")),
        };
        let mut base: &'m Inst = inst;
        let base_vec_op: Operand = loop {
            let (vec, elem, index) = match &base.kind {
                InstKind::InsertElement { vec, elem, index } => (vec, elem, index),
                _ => return Err(CodegenError::InvalidVectorOp("insertelement chain")),
            };
            let index = index
                .as_const_int()
                .ok_or(CodegenError::NonConstantLane)? as usize;
            if operands[index].is_none() {
                num_inserted += 1;
                operands[index] = Some(elem.clone());
                if splat.as_ref() != Some(elem) {
                    splat = None;
                }
            }
            match vec {
                Operand::Value(v)
                    if self.func().value(*v).uses == 1 =>
                {
                    match self.def_inst(*v) {
                        Some(def) if matches!(def.kind, InstKind::InsertElement { .. }) => {
                            base = def;
                        }
                        _ => break vec.clone(),
                    }
                }
                other => break other.clone(),
            }
        };

        let tag = self.simd_tag(ty)?;
        let assign = self.assign_if_needed(inst.result);
        let is_float = !lane.is_int();
        if num_inserted == num_elems {
            if let Some(splat) = splat {
                let mut operand = self.op_expr(&splat, CastFlags::SIGNED)?;
                if is_float && !self.opts.precise_f32 {
                    // The splat constructor requires an actual float32 even
                    // when we are otherwise imprecise about it.
                    operand = format!("Math_fround({operand})");
                }
                return Ok(Some(format!("{assign}SIMD_{tag}_splat({operand})")));
            }
            let mut code = format!("{assign}SIMD_{tag}(");
            for (i, op) in operands.iter().enumerate() {
                if i != 0 {
                    code.push_str(", ");
                }
                let op = op.as_ref().ok_or(CodegenError::InvalidVectorOp("insertelement"))?;
                let mut operand = self.op_expr(op, CastFlags::SIGNED)?;
                if lane == Lane::F32 && !self.opts.precise_f32 {
                    operand = format!("Math_fround({operand})");
                }
                code.push_str(&operand);
            }
            code.push(')');
            return Ok(Some(code));
        }

        let mut code = self.op_expr(&base_vec_op, CastFlags::SIGNED)?;
        for (i, op) in operands.iter().enumerate() {
            let op = match op {
                Some(op) => op,
                None => continue,
            };
            let mut operand = self.op_expr(op, CastFlags::SIGNED)?;
            if lane == Lane::F32 && !self.opts.precise_f32 {
                operand = format!("Math_fround({operand})");
            }
            code = format!("SIMD_{tag}_replaceLane({code},{i},{operand})");
        }
        Ok(Some(format!("{assign}{code}")))
    }

    fn extract_element_code(
        &mut self,
        inst: &'m Inst,
        vec: &Operand,
        index: &Operand,
    ) -> Result<String, CodegenError> {
        let vec_ty = vec.ty(self.func());
        self.check_vector(vec_ty)?;
        let (lane, _) = vec_parts(vec_ty)?;
        let index = index.as_const_int().ok_or(CodegenError::NonConstantLane)?;
        let assign = self.assign_if_needed(inst.result);
        let v = self.op_expr(vec, CastFlags::SIGNED)?;
        let tag = self.simd_tag(vec_ty)?;
        let raw = format!("SIMD_{tag}_extractLane({v},{index})");
        let cast = self.coerce(&raw, lane_scalar_ty(lane), CastFlags::SIGNED)?;
        Ok(format!("{assign}{cast}"))
    }

    fn shuffle_code(
        &mut self,
        result: Option<ValueId>,
        ty: IrType,
        a: &Operand,
        b: &Operand,
        mask: &[i32],
    ) -> Result<String, CodegenError> {
        let assign = self.assign_if_needed(result);
        let (lane, _) = vec_parts(ty)?;
        let tag = self.simd_tag(ty)?;

        // An insert at lane zero shuffled with an all-zero mask is how the
        // IR spells a splat.
        if mask.iter().all(|m| *m == 0) {
            if let Operand::Value(v) = a {
                if let Some(def) = self.def_inst(*v) {
                    if let InstKind::InsertElement { elem, index, .. } = &def.kind {
                        if index.as_const_int() == Some(0) {
                            let mut operand = self.op_expr(elem, CastFlags::SIGNED)?;
                            if lane == Lane::F32 && !self.opts.precise_f32 {
                                operand = format!("Math_fround({operand})");
                            }
                            return Ok(format!("{assign}SIMD_{tag}_splat({operand})"));
                        }
                    }
                }
            }
        }

        let a_str = self.op_expr(a, CastFlags::SIGNED)?;
        let b_str = self.op_expr(b, CastFlags::SIGNED)?;
        let a_ty = a.ty(self.func());
        let (a_lane, a_lanes) = vec_parts(a_ty)?;
        let op_num_elements = a_lanes as i32;
        let result_num_elements = mask.len() as i32;
        let ret_pad = (128 / lane.bits()) as i32;
        let op0_pad = (128 / a_lane.bits()) as i32;

        let swizzle_a = mask.iter().all(|m| *m < op_num_elements);
        let swizzle_b = mask.iter().all(|m| *m >= op_num_elements || *m < 0);
        if swizzle_a || swizzle_b {
            let target = if swizzle_a { a_str } else { b_str };
            let mut code = format!("{assign}SIMD_{tag}_swizzle({target}");
            for &m in mask {
                let lane_index = if m < 0 {
                    0
                } else if m < op_num_elements {
                    m
                } else {
                    m - op_num_elements
                };
                code.push_str(&format!(", {lane_index}"));
            }
            for _ in result_num_elements..ret_pad {
                code.push_str(", 0");
            }
            code.push(')');
            return Ok(code);
        }

        let a_cast = self.simd_bits_cast(a_ty, ty, a_str)?;
        let b_cast = self.simd_bits_cast(b.ty(self.func()), ty, b_str)?;
        let mut code = format!("{assign}SIMD_{tag}_shuffle({a_cast}, {b_cast}, ");
        for (i, &m) in mask.iter().enumerate() {
            if i != 0 {
                code.push_str(", ");
            }
            let idx = if m < 0 {
                0
            } else if m < op_num_elements {
                m
            } else {
                // The first operand may have more lanes in the padded
                // representation than in the IR; shift indices over it.
                m + op0_pad - op_num_elements
            };
            code.push_str(&idx.to_string());
        }
        for _ in result_num_elements..ret_pad {
            code.push_str(", 0");
        }
        code.push(')');
        Ok(code)
    }

    fn vec_icmp_code(
        &mut self,
        result: Option<ValueId>,
        ty: IrType,
        op: IcmpOp,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<String, CodegenError> {
        let (name, invert) = match op {
            IcmpOp::Eq => ("equal", false),
            IcmpOp::Ne => ("equal", true),
            IcmpOp::Sle => ("greaterThan", true),
            IcmpOp::Sge => ("lessThan", true),
            IcmpOp::Ule => ("unsignedLessThanOrEqual", false),
            IcmpOp::Uge => ("unsignedGreaterThanOrEqual", false),
            IcmpOp::Ult => ("unsignedLessThan", false),
            IcmpOp::Slt => ("lessThan", false),
            IcmpOp::Ugt => ("unsignedGreaterThan", false),
            IcmpOp::Sgt => ("greaterThan", false),
        };
        let operand_tag = self.simd_tag(lhs.ty(self.func()))?;
        let result_tag = self.simd_tag(ty)?;
        let a = self.op_expr(lhs, CastFlags::SIGNED)?;
        let b = self.op_expr(rhs, CastFlags::SIGNED)?;
        let assign = self.assign_if_needed(result);
        let mut code = format!("SIMD_{operand_tag}_{name}({a},{b})");
        if invert {
            code = format!("SIMD_{result_tag}_not({code})");
        }
        Ok(format!("{assign}{code}"))
    }

    fn vec_fcmp_code(
        &mut self,
        result: Option<ValueId>,
        ty: IrType,
        op: FcmpOp,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<String, CodegenError> {
        let result_tag = self.simd_tag(ty)?;
        let (_, result_lanes) = vec_parts(ty)?;
        let assign = self.assign_if_needed(result);

        match op {
            FcmpOp::False => {
                return Ok(format!(
                    "{assign}SIMD_{result_tag}_splat({})",
                    ensure_float_wrap("0".to_string(), true)
                ));
            }
            FcmpOp::True => {
                return Ok(format!(
                    "{assign}SIMD_{result_tag}_splat({})",
                    ensure_float_wrap("-1".to_string(), true)
                ));
            }
            _ => {}
        }

        let lhs_ty = lhs.ty(self.func());
        let rhs_ty = rhs.ty(self.func());
        self.check_vector(lhs_ty)?;
        self.check_vector(rhs_ty)?;
        let op_tag = self.simd_tag(lhs_ty)?;
        let rhs_tag = self.simd_tag(rhs_ty)?;
        let a = self.op_expr(lhs, CastFlags::SIGNED)?;
        let b = self.op_expr(rhs, CastFlags::SIGNED)?;
        let n = result_lanes;

        // NaN-detecting combinations over (a,a), (b,b) and (a,b).
        let a_ord = int_vec_to_bool_vec(n, &format!("SIMD_{op_tag}_equal({a},{a})"));
        let b_ord = int_vec_to_bool_vec(n, &format!("SIMD_{rhs_tag}_equal({b},{b})"));
        let a_unord = int_vec_to_bool_vec(n, &format!("SIMD_{op_tag}_notEqual({a},{a})"));
        let b_unord = int_vec_to_bool_vec(n, &format!("SIMD_{rhs_tag}_notEqual({b},{b})"));
        match op {
            FcmpOp::One => {
                let ne = int_vec_to_bool_vec(n, &format!("SIMD_{op_tag}_notEqual({a},{b})"));
                let inner = format!(
                    "SIMD_{result_tag}_and(SIMD_{result_tag}_and({},{}),{})",
                    bool_vec_to_int_vec(n, &a_ord),
                    bool_vec_to_int_vec(n, &b_ord),
                    bool_vec_to_int_vec(n, &ne)
                );
                return Ok(format!("{assign}{}", int_vec_to_bool_vec(n, &inner)));
            }
            FcmpOp::Ueq => {
                let eq = int_vec_to_bool_vec(n, &format!("SIMD_{op_tag}_equal({a},{b})"));
                let inner = format!(
                    "SIMD_{result_tag}_or(SIMD_{result_tag}_or({},{}),{})",
                    bool_vec_to_int_vec(n, &a_unord),
                    bool_vec_to_int_vec(n, &b_unord),
                    bool_vec_to_int_vec(n, &eq)
                );
                return Ok(format!("{assign}{}", int_vec_to_bool_vec(n, &inner)));
            }
            FcmpOp::Ord => {
                let inner = format!(
                    "SIMD_{result_tag}_and({},{})",
                    bool_vec_to_int_vec(n, &a_ord),
                    bool_vec_to_int_vec(n, &b_ord)
                );
                return Ok(format!("{assign}{}", int_vec_to_bool_vec(n, &inner)));
            }
            FcmpOp::Uno => {
                let inner = format!(
                    "SIMD_{result_tag}_or({},{})",
                    bool_vec_to_int_vec(n, &a_unord),
                    bool_vec_to_int_vec(n, &b_unord)
                );
                return Ok(format!("{assign}{}", int_vec_to_bool_vec(n, &inner)));
            }
            _ => {}
        }

        let (name, invert) = match op {
            FcmpOp::Oeq => ("equal", false),
            FcmpOp::Ogt => ("greaterThan", false),
            FcmpOp::Oge => ("greaterThanOrEqual", false),
            FcmpOp::Olt => ("lessThan", false),
            FcmpOp::Ole => ("lessThanOrEqual", false),
            FcmpOp::Ugt => ("lessThanOrEqual", true),
            FcmpOp::Uge => ("lessThan", true),
            FcmpOp::Ult => ("greaterThanOrEqual", true),
            FcmpOp::Ule => ("greaterThan", true),
            FcmpOp::Une => ("notEqual", false),
            _ => return Err(CodegenError::InvalidVectorOp("fcmp")),
        };
        let mut code = format!("SIMD_{op_tag}_{name}({a}, {b})");
        if invert {
            code = format!("SIMD_{result_tag}_not({code})");
        }
        Ok(format!("{assign}{code}"))
    }

    fn vec_shift_code(
        &mut self,
        result: Option<ValueId>,
        ty: IrType,
        op: BinOp,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<String, CodegenError> {
        if let Some(splat) = self.splat_value(rhs) {
            let tag = self.simd_tag(ty)?;
            let name = match op {
                BinOp::AShr => "shiftRightArithmeticByScalar",
                BinOp::LShr => "shiftRightLogicalByScalar",
                _ => "shiftLeftByScalar",
            };
            let a = self.op_expr(lhs, CastFlags::SIGNED)?;
            let amount = self.op_expr(&splat, CastFlags::SIGNED)?;
            return Ok(format!(
                "{}SIMD_{tag}_{name}({a}, {amount})",
                self.assign_if_needed(result)
            ));
        }
        // No vector-vector shifts in the API.
        self.unrolled_code(result, ty, op, lhs, rhs)
    }

    /// Per-lane scalar expansion for operations the SIMD API lacks.
    fn unrolled_code(
        &mut self,
        result: Option<ValueId>,
        ty: IrType,
        op: BinOp,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Result<String, CodegenError> {
        let (lane, lanes) = vec_parts(ty)?;
        if lane.bits() == 32 && lanes < 4 {
            return Err(CodegenError::InvalidVectorOp(
                "unrolled lowering of narrow 32-bit vector",
            ));
        }
        let tag = self.simd_tag(ty)?;
        let extract = if lane.is_int() {
            self.simd.int32x4 = true;
            "SIMD_Int32x4_extractLane("
        } else {
            self.simd.float32x4 = true;
            "SIMD_Float32x4_extractLane("
        };
        let a = self.op_expr(lhs, CastFlags::SIGNED)?;
        let b = self.op_expr(rhs, CastFlags::SIGNED)?;
        let fround = lane == Lane::F32 && !self.opts.precise_f32;

        let mut code = format!("{}SIMD_{tag}(", self.assign_if_needed(result));
        for index in 0..lanes {
            if index != 0 {
                code.push_str(", ");
            }
            if fround {
                code.push_str("Math_fround(");
            }
            let lane_expr = match op {
                BinOp::SDiv => format!(
                    "({extract}{a},{index})|0) / ({extract}{b},{index})|0)|0"
                ),
                BinOp::UDiv => format!(
                    "({extract}{a},{index})>>>0) / ({extract}{b},{index})>>>0)>>>0"
                ),
                BinOp::SRem => format!(
                    "({extract}{a},{index})|0) % ({extract}{b},{index})|0)|0"
                ),
                BinOp::URem => format!(
                    "({extract}{a},{index})>>>0) % ({extract}{b},{index})>>>0)>>>0"
                ),
                BinOp::AShr => format!(
                    "({extract}{a},{index})|0) >> ({extract}{b},{index})|0)|0"
                ),
                BinOp::LShr => format!(
                    "({extract}{a},{index})|0) >>> ({extract}{b},{index})|0)|0"
                ),
                BinOp::Shl => format!(
                    "({extract}{a},{index})|0) << ({extract}{b},{index})|0)|0"
                ),
                _ => return Err(CodegenError::InvalidVectorOp("unrolled vector op")),
            };
            code.push_str(&lane_expr);
            if fround {
                code.push(')');
            }
        }
        code.push(')');
        Ok(code)
    }

    /// A per-lane equal shift amount (or any splat operand), recovered from
    /// constants or insert chains.
    pub(super) fn splat_value(&self, op: &Operand) -> Option<Operand> {
        match op {
            Operand::Const(Constant::Vector { lanes, .. }) => {
                let first = lanes.first()?;
                if lanes.iter().all(|c| c == first) {
                    Some(Operand::Const(first.clone()))
                } else {
                    None
                }
            }
            Operand::Const(Constant::Zero(ty)) => match ty {
                IrType::Vec { lane, .. } => Some(Operand::Const(Constant::Int {
                    value: 0,
                    ty: lane_scalar_ty(*lane),
                })),
                _ => None,
            },
            Operand::Value(_) => {
                let ty = op.ty(self.func());
                let (_, lanes) = vec_parts(ty).ok()?;
                let mut found: Option<Operand> = None;
                for i in 0..lanes as i64 {
                    let elem = self.lane_element(op, i)?;
                    match &found {
                        None => found = Some(elem),
                        Some(prev) if *prev == elem => {}
                        Some(_) => return None,
                    }
                }
                found
            }
            _ => None,
        }
    }

    fn lane_element(&self, op: &Operand, index: i64) -> Option<Operand> {
        match op {
            Operand::Value(v) => {
                let def = self.def_inst(*v)?;
                if let InstKind::InsertElement {
                    vec,
                    elem,
                    index: idx,
                } = &def.kind
                {
                    if idx.as_const_int() == Some(index) {
                        return Some(elem.clone());
                    }
                    return self.lane_element(vec, index);
                }
                None
            }
            _ => None,
        }
    }

    /// Finds the instruction that defines a value, if any.
    pub(super) fn def_inst(&self, v: ValueId) -> Option<&'m Inst> {
        let func = self.func();
        let block = match func.value(v).def {
            crate::ir::ValueDef::Inst { block, .. } => block,
            crate::ir::ValueDef::Param(_) => return None,
        };
        func.block(block)
            .insts
            .iter()
            .find(|i| i.result == Some(v))
    }

    /// The kind of the unique user of `v`. Only meaningful when the value
    /// has exactly one use.
    fn single_user_kind(&self, v: ValueId) -> Option<&'m InstKind> {
        let func = self.func();
        for block in &func.blocks {
            for inst in &block.insts {
                let mut used = false;
                crate::ir::for_each_operand(&inst.kind, |op| {
                    if matches!(op, Operand::Value(u) if *u == v) {
                        used = true;
                    }
                });
                if used {
                    return Some(&inst.kind);
                }
            }
        }
        None
    }

    fn defined_by_insert_element(&self, op: &Operand) -> bool {
        match op {
            Operand::Value(v) => self
                .def_inst(*v)
                .map(|i| matches!(i.kind, InstKind::InsertElement { .. }))
                .unwrap_or(false),
            _ => false,
        }
    }
}

fn partial_access_suffix(lane: Lane, lanes: u32) -> &'static str {
    if lane.bits() == 32 {
        match lanes {
            1 => "1",
            2 => "2",
            3 => "3",
            _ => "",
        }
    } else {
        ""
    }
}

fn is_all_ones_vector(op: &Operand) -> bool {
    match op {
        Operand::Const(Constant::Vector { lanes, .. }) => lanes
            .iter()
            .all(|c| matches!(c, Constant::Int { value: -1, .. })),
        _ => false,
    }
}

fn is_negative_zero_vector(op: &Operand) -> bool {
    match op {
        Operand::Const(Constant::Vector { lanes, .. }) => lanes.iter().all(|c| match c {
            Constant::F32 { bits } => *bits == 0x8000_0000,
            Constant::F64 { bits } => *bits == 0x8000_0000_0000_0000,
            _ => false,
        }),
        _ => false,
    }
}
