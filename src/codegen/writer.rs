//! The module writer: owns every piece of mutable emission state.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;

use indexmap::{IndexMap, IndexSet};

use crate::codegen::allocas::AllocaPlan;
use crate::codegen::calls::CallHandlers;
use crate::codegen::mangle::sanitize_global_name;
use crate::codegen::postinit::PostInitQueue;
use crate::codegen::simd::SimdUses;
use crate::config::{CodegenOptions, EXPECTED_TRIPLE};
use crate::diag::{CodegenError, Diagnostics, Warning};
use crate::ir::{
    BlockId, Constant, FuncId, Function, GlobalId, IrType, Module, Operand, ValueId,
};

pub struct Output {
    pub code: String,
    pub warnings: Vec<Warning>,
}

/// Translates one module. This is the only entry point; the writer is
/// single use and never escapes.
pub fn translate(module: &Module, opts: &CodegenOptions) -> Result<Output, CodegenError> {
    opts.validate()?;
    let mut writer = ModuleWriter::new(module, opts.clone());
    writer.print_module_body()?;
    Ok(writer.finish())
}

pub(crate) struct ModuleWriter<'m> {
    pub(super) module: &'m Module,
    pub(super) opts: CodegenOptions,
    pub(super) diags: Diagnostics,
    pub(super) out: String,

    /// Global names after unnamed globals received fresh `glb_N` names.
    pub(super) global_names: Vec<String>,

    // Global data layout.
    pub(super) buckets: BTreeMap<u32, Vec<u8>>,
    pub(super) addresses: IndexMap<String, (u32, u32)>,
    pub(super) aligned_starts: Vec<u32>,
    pub(super) max_global_align: u32,
    pub(super) global_base_padding: u32,

    // Module-wide collections surfaced in the metadata.
    pub(super) externals: IndexSet<String>,
    pub(super) declares: IndexSet<String>,
    pub(super) redirects: IndexMap<String, String>,
    pub(super) post_sets: PostInitQueue,
    pub(super) named_globals: IndexMap<String, u32>,
    pub(super) indexed_functions: IndexMap<String, u32>,
    pub(super) function_tables: IndexMap<String, Vec<String>>,
    pub(super) next_function_index: u32,
    pub(super) global_initializers: Vec<String>,
    pub(super) exports: Vec<String>,
    pub(super) aliases: IndexMap<String, String>,
    pub(super) block_addresses: HashMap<u32, IndexMap<BlockId, u32>>,
    pub(super) asm_consts: IndexMap<String, u32>,
    pub(super) asm_const_arities: BTreeMap<u32, BTreeSet<u32>>,
    pub(super) cant_validate: String,
    pub(super) simd: SimdUses,
    pub(super) handlers: CallHandlers,

    // Per-function state, reset at the top of each function.
    pub(super) cur_func: usize,
    pub(super) names: Vec<Option<String>>,
    pub(super) unique_num: u32,
    pub(super) used_vars: BTreeMap<String, IrType>,
    pub(super) plan: AllocaPlan,
    pub(super) nativized: HashSet<ValueId>,
    pub(super) stack_bumped: bool,
    pub(super) func_reloc_externs: IndexSet<String>,
    pub(super) warned_many_locals: bool,
}

impl<'m> ModuleWriter<'m> {
    pub(crate) fn new(module: &'m Module, opts: CodegenOptions) -> Self {
        Self {
            module,
            opts,
            diags: Diagnostics::default(),
            out: String::new(),
            global_names: Vec::new(),
            buckets: BTreeMap::new(),
            addresses: IndexMap::new(),
            aligned_starts: Vec::new(),
            max_global_align: 0,
            global_base_padding: 0,
            externals: IndexSet::new(),
            declares: IndexSet::new(),
            redirects: IndexMap::new(),
            post_sets: PostInitQueue::default(),
            named_globals: IndexMap::new(),
            indexed_functions: IndexMap::new(),
            function_tables: IndexMap::new(),
            next_function_index: 0,
            global_initializers: Vec::new(),
            exports: Vec::new(),
            aliases: IndexMap::new(),
            block_addresses: HashMap::new(),
            asm_consts: IndexMap::new(),
            asm_const_arities: BTreeMap::new(),
            cant_validate: String::new(),
            simd: SimdUses::default(),
            handlers: CallHandlers::standard(),
            cur_func: 0,
            names: Vec::new(),
            unique_num: 0,
            used_vars: BTreeMap::new(),
            plan: AllocaPlan::default(),
            nativized: HashSet::new(),
            stack_bumped: false,
            func_reloc_externs: IndexSet::new(),
            warned_many_locals: false,
        }
    }

    pub(crate) fn finish(self) -> Output {
        Output {
            code: self.out,
            warnings: self.diags.into_warnings(),
        }
    }

    pub(crate) fn print_module_body(&mut self) -> Result<(), CodegenError> {
        if self.module.triple != EXPECTED_TRIPLE {
            self.diags.warn(Warning::WrongTargetTriple {
                triple: self.module.triple.clone(),
            });
        }

        self.resolve_global_names();
        self.process_globals()?;

        if self.opts.relocatable {
            for alias in &self.module.aliases {
                self.aliases.insert(
                    sanitize_global_name(&alias.name),
                    sanitize_global_name(&alias.target),
                );
            }
        }

        self.out.push_str("\n// EMSCRIPTEN_START_FUNCTIONS\n");
        for i in 0..self.module.functions.len() {
            if !self.module.functions[i].is_declaration() {
                self.emit_function(FuncId(i as u32))?;
            }
        }
        let chunks = self.post_sets.render_chunks(self.opts.relocatable);
        self.out.push_str(&chunks);
        self.out.push_str("// EMSCRIPTEN_END_FUNCTIONS\n\n");

        self.print_memory_initializer();

        self.pad_tables_to_pow2();
        self.out.push_str("\n\n// EMSCRIPTEN_METADATA\n");
        let doc = self.metadata_document();
        self.out.push_str(&serde_json::to_string_pretty(&doc).unwrap_or_default());
        self.out.push('\n');

        self.patch_table_masks();
        Ok(())
    }

    /// Ensures every initialized global has a usable name.
    fn resolve_global_names(&mut self) {
        let mut taken: HashSet<String> = self
            .module
            .globals
            .iter()
            .filter(|g| !g.name.is_empty())
            .map(|g| g.name.clone())
            .collect();
        let mut next_id = 1u32;
        self.global_names = self
            .module
            .globals
            .iter()
            .map(|g| {
                if !g.name.is_empty() {
                    return g.name.clone();
                }
                loop {
                    let candidate = format!("glb_{next_id}");
                    next_id += 1;
                    if taken.insert(candidate.clone()) {
                        return candidate;
                    }
                }
            })
            .collect();
    }

    fn print_memory_initializer(&mut self) {
        if self.opts.enable_pthreads {
            self.out.push_str("if (!ENVIRONMENT_IS_PTHREAD) {\n");
        }
        self.out.push_str("/* memory initializer */ allocate([");
        if self.max_global_align > 0 {
            let mut first = true;
            for _ in 0..self.global_base_padding {
                if first {
                    first = false;
                } else {
                    self.out.push(',');
                }
                self.out.push('0');
            }
            let mut align = self.max_global_align;
            while align > 0 {
                if let Some(bytes) = self.buckets.get(&align) {
                    if !bytes.is_empty() {
                        if first {
                            first = false;
                        } else {
                            self.out.push(',');
                        }
                        let mut data = String::new();
                        for (i, b) in bytes.iter().enumerate() {
                            if i > 0 {
                                data.push(',');
                            }
                            let _ = write!(data, "{}", b);
                        }
                        self.out.push_str(&data);
                    }
                }
                align /= 2;
            }
        }
        self.out
            .push_str("], \"i8\", ALLOC_NONE, Runtime.GLOBAL_BASE);\n");
        if self.opts.enable_pthreads {
            self.out.push_str("}\n");
        }
    }

    /// Replaces the deferred `#FM_<sig>#` mask placeholders now that table
    /// sizes are final.
    fn patch_table_masks(&mut self) {
        let masks: Vec<(String, usize)> = self
            .function_tables
            .iter()
            .map(|(sig, table)| (sig.clone(), table.len().saturating_sub(1)))
            .collect();
        for (sig, mask) in masks {
            let placeholder = format!("#FM_{sig}#");
            if self.out.contains(&placeholder) {
                self.out = self.out.replace(&placeholder, &mask.to_string());
            }
        }
    }

    // Shared helpers.

    pub(super) fn func(&self) -> &'m Function {
        let module: &'m Module = self.module;
        &module.functions[self.cur_func]
    }

    pub(super) fn raw_global_name(&self, id: GlobalId) -> &str {
        &self.global_names[id.index()]
    }

    pub(super) fn js_global_name(&self, id: GlobalId) -> String {
        sanitize_global_name(self.raw_global_name(id))
    }

    pub(super) fn js_fn_name(&self, id: FuncId) -> String {
        sanitize_global_name(&self.module.func(id).name)
    }

    pub(super) fn relocate_function_pointer(&self, fp: String) -> String {
        if self.opts.relocatable {
            format!("(fb + ({fp}) | 0)")
        } else {
            fp
        }
    }

    pub(super) fn relocate_global(&self, g: String) -> String {
        if self.opts.relocatable {
            format!("(gb + ({g}) | 0)")
        } else {
            g
        }
    }

    /// Absolute offset of a global within linear memory.
    pub(super) fn global_address(&self, name: &str) -> Result<u32, CodegenError> {
        let (offset, align_bits) = self
            .addresses
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UnknownGlobal(name.to_string()))?;
        let align = align_bits / 8;
        let addr = offset + self.aligned_starts[align as usize];
        debug_assert_eq!(addr % align, 0);
        Ok(addr)
    }

    /// Offset of a global inside its own alignment bucket.
    pub(super) fn relative_global_address(&self, name: &str) -> Result<u32, CodegenError> {
        self.addresses
            .get(name)
            .map(|(offset, _)| *offset)
            .ok_or_else(|| CodegenError::UnknownGlobal(name.to_string()))
    }

    pub(super) fn block_address(&mut self, func: FuncId, block: BlockId) -> u32 {
        let blocks = self.block_addresses.entry(func.0).or_default();
        let next = blocks.len() as u32;
        *blocks.entry(block).or_insert(next)
    }

    pub(super) fn stack_bump(&self, size: &str) -> String {
        let mut s = format!("STACKTOP = STACKTOP + {size}|0;");
        if self.opts.assertions > 0 {
            s.push_str(" if ((STACKTOP|0) >= (STACK_MAX|0)) abort();");
        }
        s
    }

    /// Whether a pointer operand is a known absolute address; loads and
    /// stores through these are intentional traps.
    pub(super) fn is_absolute(ptr: &Operand) -> bool {
        match ptr {
            Operand::Const(Constant::NullPtr)
            | Operand::Const(Constant::Undef(_))
            | Operand::Const(Constant::Int { .. }) => true,
            Operand::Const(Constant::Expr { kind, .. }) => match &**kind {
                crate::ir::InstKind::Cast {
                    op: crate::ir::CastOp::IntToPtr,
                    value,
                } => value.as_const_int().is_some(),
                _ => false,
            },
            _ => false,
        }
    }
}
