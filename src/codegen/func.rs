//! Per-function emission.
//!
//! Block bodies are rendered in IR order and handed to the structured
//! control-flow collaborator together with the branch edges and their phi
//! epilogues; the prologue (declarations, stack bump) is written once the
//! body has been rendered and the set of used locals is known.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::codegen::allocas::{calculate_nativized, AllocaPlan};
use crate::codegen::cast::CastFlags;
use crate::codegen::writer::ModuleWriter;
use crate::config::STACK_ALIGN;
use crate::diag::{CodegenError, Warning};
use crate::ir::{Block, BlockId, Constant, FuncId, Function, IrType, Operand, Terminator, ValueId};
use crate::relooper::{LabelSwitch, StructuredCfg};

/// Blocks that dispatch over a value (switches, indirect branches) hand
/// that value to the reconstructor as their condition variable.
fn condition_var(term: &Terminator) -> Option<&Operand> {
    match term {
        Terminator::IndirectBr { address, .. } => Some(address),
        // Switches are trusted as-is; oversized or sparse ones were
        // flattened before this stage.
        Terminator::Switch { value, .. } => Some(value),
        _ => None,
    }
}

fn non_empty(phi: String) -> Option<String> {
    if phi.is_empty() {
        None
    } else {
        Some(phi)
    }
}

impl<'m> ModuleWriter<'m> {
    pub(super) fn emit_function(&mut self, fid: FuncId) -> Result<(), CodegenError> {
        self.cur_func = fid.index();
        let func = self.func();

        self.names = vec![None; func.values.len()];
        self.unique_num = 0;
        self.used_vars.clear();
        self.stack_bumped = false;
        self.func_reloc_externs.clear();
        // The optimizer takes every nativization opportunity itself; only
        // bother below it.
        self.nativized = if self.opts.opt_level == 0 {
            calculate_nativized(func)
        } else {
            HashSet::new()
        };
        self.plan = AllocaPlan::analyze(func, &self.nativized, self.opts.opt_level != 0);

        let name = self.js_fn_name(fid);
        self.out.push_str(&format!("function {name}("));
        for i in 0..func.param_count() {
            if i > 0 {
                self.out.push(',');
            }
            let param = self.value_name(ValueId(i as u32));
            self.out.push_str(&param);
        }
        self.out.push_str(") {\n");
        for (i, ty) in func.sig.params.iter().enumerate() {
            let param = self.value_name(ValueId(i as u32));
            let cast = self.coerce(&param, *ty, CastFlags::NONSPECIFIC)?;
            self.out.push_str(&format!(" {param} = {cast};\n"));
        }

        self.emit_function_body(fid)?;
        self.out.push_str("}\n");
        Ok(())
    }

    fn emit_function_body(&mut self, fid: FuncId) -> Result<(), CodegenError> {
        let func = self.func();
        let mut cfg = LabelSwitch::new();
        cfg.set_min_size(func.min_size);
        // The emulated fallback would be requested here; reloopable is the
        // only answer the check ever gives.
        // if !self.can_reloop(func) { cfg.set_emulate(true); }

        let mut handles = Vec::with_capacity(func.blocks.len());
        for block in &func.blocks {
            let body = self.block_body(block)?;
            let branch_var = match condition_var(&block.term) {
                Some(op) => Some(self.op_cast(op, CastFlags::SIGNED)?),
                None => None,
            };
            handles.push(cfg.add_block(body, branch_var));
        }

        for block in &func.blocks {
            self.add_branches(fid, block, &handles, &mut cfg)?;
        }

        let rendered = cfg.render(handles[0]);

        // Declare the used locals, the stack pointer and the control label.
        self.used_vars.insert("sp".to_string(), IrType::I32);
        if self.plan.max_align() > STACK_ALIGN {
            self.used_vars.insert("sp_a".to_string(), IrType::I32);
        }
        self.used_vars.insert("label".to_string(), IrType::I32);

        let vars: Vec<(String, IrType)> = self
            .used_vars
            .iter()
            .map(|(name, ty)| (name.clone(), *ty))
            .collect();
        let mut count = 0;
        for (name, ty) in &vars {
            if count == 20 {
                self.out.push_str(";\n");
                count = 0;
            }
            if count == 0 {
                self.out.push_str(" var ");
            } else {
                self.out.push_str(", ");
            }
            count += 1;
            let init = self.zero_init(*ty)?;
            self.out.push_str(&format!("{name} = {init}"));
        }
        self.out.push_str(";\n");

        if !self.warned_many_locals && self.opts.opt_level < 2 && vars.len() > 2000 {
            self.diags.warn(Warning::ManyLocals { count: vars.len() });
            self.warned_many_locals = true;
        }

        self.out.push_str(" sp = STACKTOP;");
        let frame_size = self.plan.frame_size();
        if frame_size > 0 {
            let max_align = self.plan.max_align();
            if max_align > STACK_ALIGN {
                // The whole frame needs more than the default alignment.
                self.out.push_str(&format!(
                    "\n sp_a = STACKTOP = (STACKTOP + {})&-{};",
                    max_align - 1,
                    max_align
                ));
            }
            self.out.push_str("\n ");
            let bump = self.stack_bump(&frame_size.to_string());
            self.out.push_str(&bump);
        }

        if self.opts.relocatable && !self.func_reloc_externs.is_empty() {
            self.out.push('\n');
            let externs: Vec<String> = self.func_reloc_externs.drain(..).collect();
            for name in externs {
                self.out
                    .push_str(&format!("t${name} = g${name}() | 0;\n"));
            }
        }

        self.out.push('\n');
        self.out.push_str(&rendered);

        // Paths that fall off a typed function still need a return.
        let ret = func.sig.ret;
        if ret != IrType::Void {
            let tail = rendered.rfind('}').unwrap_or(0);
            if !rendered[tail..].contains("return ") {
                let undef = self.const_expr(&Constant::Undef(ret), CastFlags::SIGNED)?;
                let cast = self.paren_coerce(&undef, ret, CastFlags::NONSPECIFIC)?;
                self.out.push_str(&format!(" return {cast};\n"));
            }
        }

        if self.opts.relocatable && !func.internal {
            let name = self.js_fn_name(fid);
            self.exports.push(name);
        }
        Ok(())
    }

    fn block_body(&mut self, block: &'m Block) -> Result<String, CodegenError> {
        let mut body = String::new();
        for inst in &block.insts {
            body.push_str(&self.inst_stmt(inst)?);
        }
        body.push_str(&self.term_stmt(&block.term)?);
        Ok(body)
    }

    fn add_branches(
        &mut self,
        fid: FuncId,
        block: &'m Block,
        handles: &[usize],
        cfg: &mut LabelSwitch,
    ) -> Result<(), CodegenError> {
        let from = handles[block.id.index()];
        match &block.term {
            Terminator::Br { target } => {
                let phi = self.phi_epilogue(block.id, *target)?;
                cfg.add_branch(from, handles[target.index()], None, non_empty(phi));
            }
            Terminator::CondBr {
                cond,
                then_bb,
                else_bb,
            } => {
                let condition = self.op_expr(cond, CastFlags::SIGNED)?;
                let then_phi = self.phi_epilogue(block.id, *then_bb)?;
                let else_phi = self.phi_epilogue(block.id, *else_bb)?;
                cfg.add_branch(
                    from,
                    handles[then_bb.index()],
                    Some(condition),
                    non_empty(then_phi),
                );
                cfg.add_branch(from, handles[else_bb.index()], None, non_empty(else_phi));
            }
            Terminator::Switch {
                value,
                cases,
                default,
            } => {
                let use_switch = condition_var(&block.term).is_some();
                let phi = self.phi_epilogue(block.id, *default)?;
                cfg.add_branch(from, handles[default.index()], None, non_empty(phi));

                // Several cases can share a successor; fold their tests
                // into one branch per target block.
                let mut conditions: IndexMap<BlockId, String> = IndexMap::new();
                for case in cases {
                    let test = if use_switch {
                        format!("case {}: ", case.value)
                    } else {
                        let cond = self.op_cast_paren(value, CastFlags::SIGNED)?;
                        format!("({cond} == {})", case.value)
                    };
                    let entry = conditions.entry(case.target).or_default();
                    let joined = if !use_switch && !entry.is_empty() {
                        format!("{test} | {entry}")
                    } else {
                        format!("{test}{entry}")
                    };
                    *entry = joined;
                }
                let mut processed: HashSet<BlockId> = HashSet::new();
                for case in cases {
                    if !processed.insert(case.target) {
                        continue;
                    }
                    if case.target == *default {
                        // The default edge gets there anyhow.
                        continue;
                    }
                    let phi = self.phi_epilogue(block.id, case.target)?;
                    cfg.add_branch(
                        from,
                        handles[case.target.index()],
                        conditions.get(&case.target).cloned(),
                        non_empty(phi),
                    );
                }
            }
            Terminator::IndirectBr { destinations, .. } => {
                // The same block may be listed several times; the first
                // unique destination doubles as the default.
                let mut seen: HashSet<BlockId> = HashSet::new();
                let mut have_default = false;
                for dest in destinations {
                    if !seen.insert(*dest) {
                        continue;
                    }
                    let phi = self.phi_epilogue(block.id, *dest)?;
                    let label = if !have_default {
                        have_default = true;
                        None
                    } else {
                        Some(format!("case {}: ", self.block_address(fid, *dest)))
                    };
                    cfg.add_branch(from, handles[dest.index()], label, non_empty(phi));
                }
            }
            Terminator::Ret { .. } | Terminator::Unreachable => {}
        }
        Ok(())
    }

    fn zero_init(&mut self, ty: IrType) -> Result<String, CodegenError> {
        Ok(match ty {
            IrType::Ptr | IrType::I1 | IrType::I8 | IrType::I16 | IrType::I32 => "0".to_string(),
            IrType::Float if self.opts.precise_f32 => "Math_fround(0)".to_string(),
            IrType::Float | IrType::Double => "+0".to_string(),
            IrType::Vec { .. } => {
                let tag = self.simd_tag(ty)?;
                let elems = 128 / ty.actual_lane_bits()?;
                let mut init = format!("SIMD_{tag}(0");
                for _ in 1..elems {
                    init.push_str(",0");
                }
                init.push(')');
                init
            }
            IrType::Void => {
                return Err(CodegenError::UnsupportedType(ty, "variable initializer"))
            }
        })
    }

    /// The reconstruction always runs; the emulated alternative stays
    /// unreachable.
    #[allow(dead_code)]
    fn can_reloop(&self, _func: &Function) -> bool {
        true
    }
}
