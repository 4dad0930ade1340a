//! The metadata document appended after the function bodies; the driver
//! that consumes the output reads everything it needs from here.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::codegen::mangle::sanitize_global_name;
use crate::codegen::writer::ModuleWriter;
use crate::ir::{Callee, Constant, InitField, Initializer, InstKind, Operand, PtrInit};

/// Intrinsics that are always no-ops or expand into other code, so their
/// declarations never surface.
fn is_noop_intrinsic(name: &str) -> bool {
    const STEMS: &[&str] = &[
        "llvm.dbg.",
        "llvm.lifetime.",
        "llvm.invariant.",
        "llvm.prefetch",
        "llvm.memcpy",
        "llvm.memset",
        "llvm.memmove",
        "llvm.expect",
        "llvm.flt.rounds",
    ];
    name.starts_with("llvm.") && STEMS.iter().any(|stem| name.starts_with(stem))
}

fn collect_const_funcs(c: &Constant, used: &mut HashSet<u32>) {
    match c {
        Constant::Function(f) => {
            used.insert(f.0);
        }
        Constant::Vector { lanes, .. } => {
            for lane in lanes {
                collect_const_funcs(lane, used);
            }
        }
        Constant::Expr { kind, .. } => {
            crate::ir::for_each_operand(kind, |op| {
                if let Operand::Const(c) = op {
                    collect_const_funcs(c, used);
                }
            });
        }
        _ => {}
    }
}

fn collect_ptr_init(p: &PtrInit, used: &mut HashSet<u32>) {
    collect_const_funcs(&p.target, used);
}

impl<'m> ModuleWriter<'m> {
    /// Function ids referenced anywhere in the module.
    fn used_functions(&self) -> HashSet<u32> {
        let mut used = HashSet::new();
        for func in &self.module.functions {
            for block in &func.blocks {
                for inst in &block.insts {
                    if let InstKind::Call { callee, .. } = &inst.kind {
                        if let Callee::Direct(f) = callee {
                            used.insert(f.0);
                        }
                    }
                    crate::ir::for_each_operand(&inst.kind, |op| {
                        if let Operand::Const(c) = op {
                            collect_const_funcs(c, &mut used);
                        }
                    });
                }
                crate::ir::for_each_term_operand(&block.term, |op| {
                    if let Operand::Const(c) = op {
                        collect_const_funcs(c, &mut used);
                    }
                });
            }
        }
        for global in &self.module.globals {
            match &global.init {
                Some(Initializer::Ptr(p)) => collect_ptr_init(p, &mut used),
                Some(Initializer::Struct(fields)) => {
                    for field in fields {
                        if let InitField::Ptr(p) = field {
                            collect_ptr_init(p, &mut used);
                        }
                    }
                }
                _ => {}
            }
        }
        used
    }

    pub(super) fn metadata_document(&mut self) -> Value {
        let mut doc = Map::new();

        let used = self.used_functions();
        let mut declares: Vec<Value> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for (i, func) in self.module.functions.iter().enumerate() {
            if func.is_declaration()
                && used.contains(&(i as u32))
                && !is_noop_intrinsic(&func.name)
                && seen.insert(func.name.clone())
            {
                declares.push(Value::String(func.name.clone()));
            }
        }
        for name in &self.declares {
            if seen.insert(name.clone()) {
                declares.push(Value::String(name.clone()));
            }
        }
        doc.insert("declares".to_string(), Value::Array(declares));

        let mut redirects = Map::new();
        for (from, to) in &self.redirects {
            redirects.insert(format!("_{from}"), Value::String(to.clone()));
        }
        doc.insert("redirects".to_string(), Value::Object(redirects));

        doc.insert(
            "externs".to_string(),
            Value::Array(
                self.externals
                    .iter()
                    .map(|e| Value::String(e.clone()))
                    .collect(),
            ),
        );

        let implemented: Vec<Value> = self
            .module
            .functions
            .iter()
            .filter(|f| !f.is_declaration())
            .map(|f| Value::String(sanitize_global_name(&f.name)))
            .collect();
        doc.insert("implementedFunctions".to_string(), Value::Array(implemented));

        let mut tables = Map::new();
        for (sig, table) in &self.function_tables {
            let body = table.join(",");
            tables.insert(
                sig.clone(),
                Value::String(format!("var FUNCTION_TABLE_{sig} = [{body}];")),
            );
        }
        doc.insert("tables".to_string(), Value::Object(tables));

        doc.insert(
            "initializers".to_string(),
            Value::Array(
                self.global_initializers
                    .iter()
                    .map(|i| Value::String(i.clone()))
                    .collect(),
            ),
        );

        doc.insert(
            "exports".to_string(),
            Value::Array(
                self.exports
                    .iter()
                    .map(|e| Value::String(e.clone()))
                    .collect(),
            ),
        );

        let mut aliases = Map::new();
        for (name, target) in &self.aliases {
            aliases.insert(name.clone(), Value::String(target.clone()));
        }
        doc.insert("aliases".to_string(), Value::Object(aliases));

        doc.insert(
            "cantValidate".to_string(),
            Value::String(self.cant_validate.clone()),
        );

        doc.insert("simd".to_string(), Value::from(self.simd.any() as i32));
        doc.insert(
            "simdInt8x16".to_string(),
            Value::from(self.simd.int8x16 as i32),
        );
        doc.insert(
            "simdInt16x8".to_string(),
            Value::from(self.simd.int16x8 as i32),
        );
        doc.insert(
            "simdInt32x4".to_string(),
            Value::from(self.simd.int32x4 as i32),
        );
        doc.insert(
            "simdFloat32x4".to_string(),
            Value::from(self.simd.float32x4 as i32),
        );
        doc.insert(
            "simdFloat64x2".to_string(),
            Value::from(self.simd.float64x2 as i32),
        );

        doc.insert(
            "maxGlobalAlign".to_string(),
            Value::from(self.max_global_align),
        );

        let mut named = Map::new();
        for (name, addr) in &self.named_globals {
            named.insert(name.clone(), Value::String(addr.to_string()));
        }
        doc.insert("namedGlobals".to_string(), Value::Object(named));

        let mut consts = Map::new();
        for (code, id) in &self.asm_consts {
            consts.insert(id.to_string(), Value::String(code.clone()));
        }
        doc.insert("asmConsts".to_string(), Value::Object(consts));

        // Arities can differ between uses of the same source block when it
        // sits inside a template.
        let mut arities = Map::new();
        for (id, set) in &self.asm_const_arities {
            arities.insert(
                id.to_string(),
                Value::Array(set.iter().map(|a| Value::from(*a)).collect()),
            );
        }
        doc.insert("asmConstArities".to_string(), Value::Object(arities));

        Value::Object(doc)
    }
}
