//! Call lowering and the per-intrinsic handler table.
//!
//! Named intrinsics dispatch through a registry keyed by name (exact or
//! prefix); everything else takes the default direct or indirect path. New
//! intrinsics extend the registry instead of growing the control flow.

use indexmap::IndexMap;

use crate::codegen::cast::CastFlags;
use crate::codegen::mangle::sanitize_global_name;
use crate::codegen::writer::ModuleWriter;
use crate::diag::CodegenError;
use crate::ir::{Callee, Constant, FuncId, InstKind, IrType, Operand, ValueId};

pub(crate) struct CallCx<'a> {
    pub result: Option<ValueId>,
    pub ret_ty: IrType,
    /// Raw (unsanitized) callee name.
    pub name: String,
    pub args: &'a [Operand],
    /// The callee is only being placed in a function table; there is no
    /// call site to render.
    pub table_index_only: bool,
}

pub(crate) type CallHandler =
    fn(&mut ModuleWriter, &CallCx) -> Result<Option<String>, CodegenError>;

pub(crate) struct CallHandlers {
    exact: IndexMap<&'static str, CallHandler>,
    prefixed: Vec<(&'static str, CallHandler)>,
}

impl CallHandlers {
    pub fn standard() -> Self {
        let mut prefixed: Vec<(&'static str, CallHandler)> = Vec::new();
        prefixed.push(("llvm.memcpy", handle_memcpy));
        prefixed.push(("llvm.memmove", handle_memmove));
        prefixed.push(("llvm.memset", handle_memset));
        prefixed.push(("llvm.lifetime.", handle_noop));
        prefixed.push(("llvm.invariant.", handle_noop));
        prefixed.push(("llvm.dbg.", handle_noop));
        prefixed.push(("llvm.prefetch", handle_noop));
        prefixed.push(("llvm.expect", handle_expect));
        prefixed.push(("llvm.flt.rounds", handle_flt_rounds));
        prefixed.push(("emscripten_asm_const", handle_asm_const));
        Self {
            exact: IndexMap::new(),
            prefixed,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<CallHandler> {
        if let Some(h) = self.exact.get(name) {
            return Some(*h);
        }
        self.prefixed
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|(_, h)| *h)
    }
}

impl<'m> ModuleWriter<'m> {
    pub(super) fn call_code(
        &mut self,
        result: Option<ValueId>,
        ret_ty: IrType,
        callee: &Callee,
        args: &[Operand],
    ) -> Result<Option<String>, CodegenError> {
        match callee {
            Callee::Direct(fid) => {
                let name = self.module.func(*fid).name.clone();
                if let Some(handler) = self.handlers.lookup(&name) {
                    let cx = CallCx {
                        result,
                        ret_ty,
                        name,
                        args,
                        table_index_only: false,
                    };
                    return handler(self, &cx);
                }
                self.direct_call_code(result, ret_ty, *fid, args)
            }
            Callee::Indirect { ptr, sig } => {
                let sig = self.signature_of(sig)?;
                self.ensure_table(&sig);
                let ptr_s = self.op_expr(ptr, CastFlags::SIGNED)?;
                let mut rendered = Vec::with_capacity(args.len());
                for arg in args {
                    rendered.push(self.op_cast(arg, CastFlags::NONSPECIFIC)?);
                }
                let call = if self.opts.emulated_function_pointers {
                    let helper = format!("ftCall_{sig}");
                    self.declares.insert(helper.clone());
                    let mut call = format!("{helper}({ptr_s}|0");
                    for arg in &rendered {
                        call.push_str(", ");
                        call.push_str(arg);
                    }
                    call.push(')');
                    call
                } else {
                    // The table mask is unknown until every function has
                    // been seen; leave a placeholder for the driver.
                    format!(
                        "FUNCTION_TABLE_{sig}[{ptr_s} & #FM_{sig}#]({})",
                        rendered.join(", ")
                    )
                };
                self.finish_call(result, ret_ty, call, false)
            }
        }
    }

    fn direct_call_code(
        &mut self,
        result: Option<ValueId>,
        ret_ty: IrType,
        fid: FuncId,
        args: &[Operand],
    ) -> Result<Option<String>, CodegenError> {
        let ffi = self.module.func(fid).is_declaration();
        let js_name = self.js_fn_name(fid);
        let arg_flags = if ffi {
            CastFlags::NONSPECIFIC | CastFlags::FFI_OUT
        } else {
            CastFlags::NONSPECIFIC
        };
        let mut rendered = Vec::with_capacity(args.len());
        for arg in args {
            rendered.push(self.op_cast(arg, arg_flags)?);
        }
        let call = format!("{js_name}({})", rendered.join(","));
        self.finish_call(result, ret_ty, call, ffi)
    }

    fn finish_call(
        &mut self,
        result: Option<ValueId>,
        ret_ty: IrType,
        call: String,
        ffi: bool,
    ) -> Result<Option<String>, CodegenError> {
        if ret_ty == IrType::Void {
            return Ok(Some(call));
        }
        let flags = if ffi {
            CastFlags::NONSPECIFIC | CastFlags::FFI_IN
        } else {
            CastFlags::NONSPECIFIC
        };
        let assign = self.assign_if_needed(result);
        let cast = self.coerce(&call, ret_ty, flags)?;
        Ok(Some(format!("{assign}{cast}")))
    }

    /// Resolves the JS source text of an `EM_ASM` block and assigns its id.
    fn asm_const_id(&mut self, code: String, arity: u32) -> u32 {
        let next = self.asm_consts.len() as u32;
        let id = *self.asm_consts.entry(code).or_insert(next);
        self.asm_const_arities.entry(id).or_default().insert(arity);
        id
    }

    fn asm_const_source(&mut self, op: &Operand) -> Result<String, CodegenError> {
        let target = resolve_const_target(op)
            .ok_or(CodegenError::UnsupportedConstant("asm const string"))?;
        let global = match target {
            Constant::Global(g) => self.module.global(g),
            _ => return Err(CodegenError::UnsupportedConstant("asm const string")),
        };
        let code = match &global.init {
            Some(crate::ir::Initializer::Bytes(bytes)) => {
                let end = bytes
                    .iter()
                    .rposition(|b| *b != 0)
                    .map(|p| p + 1)
                    .unwrap_or(0);
                String::from_utf8_lossy(&bytes[..end]).into_owned()
            }
            Some(crate::ir::Initializer::Zero(_)) => " ".to_string(),
            _ => return Err(CodegenError::UnsupportedConstant("asm const string")),
        };
        Ok(escape_asm_const(&code))
    }
}

/// Strips pointer-cast wrappers off a constant operand.
fn resolve_const_target(op: &Operand) -> Option<Constant> {
    let mut c = op.as_const()?.clone();
    loop {
        match c {
            Constant::Expr { kind, .. } => match *kind {
                InstKind::Cast { value, .. } | InstKind::Gep { base: value, .. } => {
                    c = value.as_const()?.clone();
                }
                _ => return None,
            },
            other => return Some(other),
        }
    }
}

/// Escapes an `EM_ASM` source string for embedding in the metadata:
/// newline escapes are doubled and quotes escaped (doubly so when already
/// escaped).
fn escape_asm_const(code: &str) -> String {
    let doubled = code.replace("\\n", "\\\\n");
    let mut out = String::with_capacity(doubled.len());
    let mut prev = None;
    for ch in doubled.chars() {
        if ch == '"' {
            if prev == Some('\\') {
                // Already escaped; escape the slash as well.
                out.push_str("\\\\\"");
            } else {
                out.push_str("\\\"");
            }
        } else {
            out.push(ch);
        }
        prev = Some(ch);
    }
    out
}

fn handle_noop(_w: &mut ModuleWriter, _cx: &CallCx) -> Result<Option<String>, CodegenError> {
    Ok(None)
}

fn handle_expect(w: &mut ModuleWriter, cx: &CallCx) -> Result<Option<String>, CodegenError> {
    if cx.table_index_only || cx.args.is_empty() {
        return Ok(None);
    }
    let assign = w.assign_if_needed(cx.result);
    let value = w.op_expr(&cx.args[0], CastFlags::SIGNED)?;
    Ok(Some(format!("{assign}{value}")))
}

fn handle_flt_rounds(w: &mut ModuleWriter, cx: &CallCx) -> Result<Option<String>, CodegenError> {
    if cx.table_index_only {
        return Ok(None);
    }
    // Round-to-nearest is all the runtime does.
    let assign = w.assign_if_needed(cx.result);
    if assign.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!("{assign}1")))
}

fn mem_intrinsic(
    w: &mut ModuleWriter,
    cx: &CallCx,
    runtime: &'static str,
) -> Result<Option<String>, CodegenError> {
    w.declares.insert(runtime.to_string());
    if cx.table_index_only {
        // The metadata spells redirect keys without the global prefix.
        let key = sanitize_global_name(&cx.name)[1..].to_string();
        w.redirects.insert(key, format!("_{runtime}"));
        return Ok(None);
    }
    let mut rendered = Vec::new();
    for arg in cx.args.iter().take(3) {
        rendered.push(w.op_cast(arg, CastFlags::NONSPECIFIC)?);
    }
    let call = format!("_{runtime}({})|0", rendered.join(","));
    let assign = w.assign_if_needed(cx.result);
    Ok(Some(format!("{assign}{call}")))
}

fn handle_memcpy(w: &mut ModuleWriter, cx: &CallCx) -> Result<Option<String>, CodegenError> {
    mem_intrinsic(w, cx, "memcpy")
}

fn handle_memmove(w: &mut ModuleWriter, cx: &CallCx) -> Result<Option<String>, CodegenError> {
    mem_intrinsic(w, cx, "memmove")
}

fn handle_memset(w: &mut ModuleWriter, cx: &CallCx) -> Result<Option<String>, CodegenError> {
    mem_intrinsic(w, cx, "memset")
}

fn handle_asm_const(w: &mut ModuleWriter, cx: &CallCx) -> Result<Option<String>, CodegenError> {
    if cx.table_index_only || cx.args.is_empty() {
        return Ok(None);
    }
    let source = w.asm_const_source(&cx.args[0])?;
    let arity = (cx.args.len() - 1) as u32;
    let id = w.asm_const_id(source, arity);
    w.declares.insert(format!("emscripten_asm_const_{arity}"));
    let mut call = format!("_emscripten_asm_const_{arity}({id}");
    for arg in &cx.args[1..] {
        call.push_str(", ");
        call.push_str(&w.op_cast(arg, CastFlags::NONSPECIFIC)?);
    }
    call.push(')');
    w.finish_call(cx.result, cx.ret_ty, call, false)
}
