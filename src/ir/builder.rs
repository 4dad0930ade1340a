//! Builders for IR modules and functions.
//!
//! Used by the JSON loader and by tests. The function builder always starts
//! with an entry block, tracks use counts as operands are referenced, and
//! records each value's defining block so the emitter can reason about phi
//! dependencies without use lists.

use crate::ir::module::{
    Alias, Block, BlockId, Constant, DebugLoc, FuncId, Function, Global, GlobalId, Initializer,
    Inst, InstKind, Module, Operand, Terminator, ValueDef, ValueId, ValueInfo,
    for_each_operand, for_each_term_operand,
};
use crate::ir::types::{FnSig, IrType};

pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(triple: &str) -> Self {
        Self {
            module: Module {
                triple: triple.to_string(),
                functions: Vec::new(),
                globals: Vec::new(),
                aliases: Vec::new(),
            },
        }
    }

    /// Declares a function without a body; a later `define` fills it in.
    pub fn declare(&mut self, name: &str, sig: FnSig) -> FuncId {
        let id = FuncId(self.module.functions.len() as u32);
        self.module.functions.push(Function {
            name: name.to_string(),
            sig,
            internal: false,
            min_size: false,
            blocks: Vec::new(),
            values: Vec::new(),
        });
        id
    }

    pub fn define(&mut self, id: FuncId, func: Function) {
        debug_assert_eq!(self.module.functions[id.index()].name, func.name);
        self.module.functions[id.index()] = func;
    }

    pub fn add_global(
        &mut self,
        name: &str,
        align: u32,
        init: Option<Initializer>,
    ) -> GlobalId {
        let id = GlobalId(self.module.globals.len() as u32);
        self.module.globals.push(Global {
            name: name.to_string(),
            align,
            internal: false,
            init,
        });
        id
    }

    pub fn add_alias(&mut self, name: &str, target: &str) {
        self.module.aliases.push(Alias {
            name: name.to_string(),
            target: target.to_string(),
        });
    }

    pub fn global_mut(&mut self, id: GlobalId) -> &mut Global {
        &mut self.module.globals[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.module.functions[id.index()]
    }

    pub fn finish(self) -> Module {
        self.module
    }
}

pub struct FunctionBuilder {
    func: Function,
    cur: BlockId,
}

impl FunctionBuilder {
    pub fn new(name: &str, sig: FnSig) -> Self {
        let values = sig
            .params
            .iter()
            .enumerate()
            .map(|(i, ty)| ValueInfo {
                ty: *ty,
                name: None,
                uses: 0,
                def: ValueDef::Param(i as u32),
            })
            .collect();
        let entry = Block {
            id: BlockId(0),
            insts: Vec::new(),
            term: Terminator::Unreachable,
        };
        Self {
            func: Function {
                name: name.to_string(),
                sig,
                internal: false,
                min_size: false,
                blocks: vec![entry],
                values,
            },
            cur: BlockId(0),
        }
    }

    pub fn param(&self, index: usize) -> ValueId {
        debug_assert!(index < self.func.param_count());
        ValueId(index as u32)
    }

    pub fn name_param(&mut self, index: usize, name: &str) {
        self.func.values[index].name = Some(name.to_string());
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.func.blocks.len() as u32);
        self.func.blocks.push(Block {
            id,
            insts: Vec::new(),
            term: Terminator::Unreachable,
        });
        id
    }

    pub fn select(&mut self, block: BlockId) {
        debug_assert!(block.index() < self.func.blocks.len());
        self.cur = block;
    }

    pub fn current(&self) -> BlockId {
        self.cur
    }

    /// Appends an instruction to the selected block; `ty` is the result type
    /// (`Void` for none).
    pub fn push(&mut self, kind: InstKind, ty: IrType) -> Option<ValueId> {
        self.push_full(kind, ty, None, None)
    }

    pub fn push_named(&mut self, kind: InstKind, ty: IrType, name: &str) -> Option<ValueId> {
        self.push_full(kind, ty, Some(name.to_string()), None)
    }

    pub fn push_full(
        &mut self,
        kind: InstKind,
        ty: IrType,
        name: Option<String>,
        dbg: Option<DebugLoc>,
    ) -> Option<ValueId> {
        for_each_operand(&kind, |op| Self::count_use(&mut self.func.values, op));
        let result = if ty != IrType::Void {
            let id = ValueId(self.func.values.len() as u32);
            self.func.values.push(ValueInfo {
                ty,
                name,
                uses: 0,
                def: ValueDef::Inst {
                    block: self.cur,
                    phi: matches!(kind, InstKind::Phi { .. }),
                },
            });
            Some(id)
        } else {
            None
        };
        self.func.blocks[self.cur.index()].insts.push(Inst {
            result,
            kind,
            dbg,
        });
        result
    }

    /// Reserves a value for a phi so later instructions (and the phi's own
    /// incoming list) can refer to it before it is placed.
    pub fn declare_phi(&mut self, block: BlockId, ty: IrType, name: &str) -> ValueId {
        let id = ValueId(self.func.values.len() as u32);
        self.func.values.push(ValueInfo {
            ty,
            name: Some(name.to_string()),
            uses: 0,
            def: ValueDef::Inst { block, phi: true },
        });
        id
    }

    /// Places a declared phi at the front section of its block.
    pub fn place_phi(&mut self, block: BlockId, value: ValueId, incoming: Vec<(BlockId, Operand)>) {
        let kind = InstKind::Phi { incoming };
        for_each_operand(&kind, |op| Self::count_use(&mut self.func.values, op));
        self.func.blocks[block.index()].insts.push(Inst {
            result: Some(value),
            kind,
            dbg: None,
        });
    }

    pub fn terminate(&mut self, term: Terminator) {
        for_each_term_operand(&term, |op| Self::count_use(&mut self.func.values, op));
        self.func.blocks[self.cur.index()].term = term;
    }

    pub fn set_internal(&mut self, internal: bool) {
        self.func.internal = internal;
    }

    pub fn set_min_size(&mut self, min_size: bool) {
        self.func.min_size = min_size;
    }

    pub fn finish(self) -> Function {
        self.func
    }

    fn count_use(values: &mut [ValueInfo], op: &Operand) {
        match op {
            Operand::Value(v) => values[v.index()].uses += 1,
            Operand::Const(Constant::Expr { kind, .. }) => {
                for_each_operand(kind, |inner| Self::count_use(values, inner));
            }
            Operand::Const(_) => {}
        }
    }
}
