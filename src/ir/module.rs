//! SSA IR data model.
//!
//! Functions own their blocks, instructions and value table; the translation
//! borrows the module immutably and keeps all mutable state on its own side.
//! Entities refer to each other through index newtypes, so the mutually
//! recursive structure carries no ownership cycles.

use serde::{Deserialize, Serialize};

use crate::ir::types::{FnSig, IrType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl ValueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FuncId(pub u32);

impl FuncId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GlobalId(pub u32);

impl GlobalId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub triple: String,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
    pub aliases: Vec<Alias>,
}

impl Module {
    pub fn func(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }
}

/// A global alias, already resolved to its ultimate target name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub name: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    /// 0 means the default alignment class.
    pub align: u32,
    pub internal: bool,
    /// `None` marks an external declaration.
    pub init: Option<Initializer>,
}

impl Global {
    pub fn is_declaration(&self) -> bool {
        self.init.is_none()
    }
}

/// Serialized global initializers. The module has been flattened before it
/// reaches this crate, so only these shapes occur.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    /// Raw bytes (string data and the like).
    Bytes(Vec<u8>),
    F32(f32),
    F64(f64),
    Int32(u32),
    Int64(u64),
    /// Zero-initialized region of the given store size.
    Zero(u32),
    /// A packed struct of fields laid out back to back.
    Struct(Vec<InitField>),
    /// A pointer-sized value computed from another entity's address.
    Ptr(PtrInit),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InitField {
    Zero(u32),
    Bytes(Vec<u8>),
    Ptr(PtrInit),
}

/// `target` must be a function, global or block address; the addend is added
/// to the resolved address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtrInit {
    pub target: Constant,
    pub addend: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub sig: FnSig,
    pub internal: bool,
    /// Set when the function is attributed for minimal output size.
    pub min_size: bool,
    /// Empty for declarations.
    pub blocks: Vec<Block>,
    /// Parameters first, then instruction results, in definition order.
    pub values: Vec<ValueInfo>,
}

impl Function {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn value(&self, id: ValueId) -> &ValueInfo {
        &self.values[id.index()]
    }

    pub fn value_ty(&self, id: ValueId) -> IrType {
        self.values[id.index()].ty
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn param_count(&self) -> usize {
        self.sig.params.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueInfo {
    pub ty: IrType,
    /// Source-level name, when one survived to this stage.
    pub name: Option<String>,
    pub uses: u32,
    pub def: ValueDef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueDef {
    Param(u32),
    Inst { block: BlockId, phi: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub insts: Vec<Inst>,
    pub term: Terminator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inst {
    pub result: Option<ValueId>,
    pub kind: InstKind,
    pub dbg: Option<DebugLoc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugLoc {
    pub line: u32,
    pub file: String,
}

/// An instruction operand: either a function-local SSA value or an inline
/// constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Value(ValueId),
    Const(Constant),
}

impl Operand {
    pub fn as_const(&self) -> Option<&Constant> {
        match self {
            Operand::Const(c) => Some(c),
            Operand::Value(_) => None,
        }
    }

    pub fn as_const_int(&self) -> Option<i64> {
        match self {
            Operand::Const(Constant::Int { value, .. }) => Some(*value),
            _ => None,
        }
    }

    pub fn ty(&self, func: &Function) -> IrType {
        match self {
            Operand::Value(v) => func.value_ty(*v),
            Operand::Const(c) => c.ty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    /// Sign-extended value of an integer type (width from `ty`).
    Int { value: i64, ty: IrType },
    F32 { bits: u32 },
    F64 { bits: u64 },
    NullPtr,
    Global(GlobalId),
    Function(FuncId),
    BlockAddress { func: FuncId, block: BlockId },
    Undef(IrType),
    /// Aggregate zero; a zero splat for vector types.
    Zero(IrType),
    Vector { ty: IrType, lanes: Vec<Constant> },
    /// A nested constant expression; operands inside must all be constants.
    Expr { kind: Box<InstKind>, ty: IrType },
}

impl Constant {
    pub fn ty(&self) -> IrType {
        match self {
            Constant::Int { ty, .. } => *ty,
            Constant::F32 { .. } => IrType::Float,
            Constant::F64 { .. } => IrType::Double,
            Constant::NullPtr
            | Constant::Global(_)
            | Constant::Function(_)
            | Constant::BlockAddress { .. } => IrType::Ptr,
            Constant::Undef(ty) | Constant::Zero(ty) => *ty,
            Constant::Vector { ty, .. } => *ty,
            Constant::Expr { ty, .. } => *ty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IcmpOp {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl IcmpOp {
    pub fn is_unsigned(self) -> bool {
        matches!(self, IcmpOp::Ult | IcmpOp::Ule | IcmpOp::Ugt | IcmpOp::Uge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FcmpOp {
    False,
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
    True,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CastOp {
    Trunc,
    ZExt,
    SExt,
    FpTrunc,
    FpExt,
    FpToUi,
    FpToSi,
    UiToFp,
    SiToFp,
    PtrToInt,
    IntToPtr,
    Bitcast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RmwOp {
    Xchg,
    Add,
    Sub,
    And,
    Nand,
    Or,
    Xor,
}

/// What a static alloca reserves space for. Aggregates are opaque blobs at
/// this stage; only their size matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocaElem {
    Scalar(IrType),
    Blob { size: u32 },
}

impl AllocaElem {
    pub fn size_bytes(self) -> u32 {
        match self {
            AllocaElem::Scalar(ty) => ty.size_bytes(),
            AllocaElem::Blob { size } => size,
        }
    }

    pub fn is_aggregate(self) -> bool {
        matches!(self, AllocaElem::Blob { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    Direct(FuncId),
    Indirect { ptr: Operand, sig: FnSig },
}

/// A dynamic getelementptr step: `index * elem_size` bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GepIndex {
    pub index: Operand,
    pub elem_size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstKind {
    Binary {
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    Icmp {
        op: IcmpOp,
        lhs: Operand,
        rhs: Operand,
    },
    Fcmp {
        op: FcmpOp,
        lhs: Operand,
        rhs: Operand,
    },
    Cast {
        op: CastOp,
        value: Operand,
    },
    Select {
        cond: Operand,
        if_true: Operand,
        if_false: Operand,
    },
    Load {
        ptr: Operand,
        ty: IrType,
        align: u32,
        volatile: bool,
    },
    Store {
        ptr: Operand,
        value: Operand,
        align: u32,
        volatile: bool,
    },
    /// Explicit getelementptr: accumulated constant byte offset plus scaled
    /// dynamic indices.
    Gep {
        base: Operand,
        offset: i32,
        indices: Vec<GepIndex>,
    },
    Alloca {
        elem: AllocaElem,
        count: Operand,
        align: u32,
    },
    Call {
        callee: Callee,
        args: Vec<Operand>,
    },
    AtomicRmw {
        op: RmwOp,
        ptr: Operand,
        value: Operand,
    },
    Fence,
    InsertElement {
        vec: Operand,
        elem: Operand,
        index: Operand,
    },
    ExtractElement {
        vec: Operand,
        index: Operand,
    },
    Shuffle {
        a: Operand,
        b: Operand,
        /// -1 marks an undef lane.
        mask: Vec<i32>,
    },
    Phi {
        incoming: Vec<(BlockId, Operand)>,
    },
    LifetimeStart {
        ptr: Operand,
    },
    LifetimeEnd {
        ptr: Operand,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: i64,
    pub target: BlockId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Terminator {
    Ret {
        value: Option<Operand>,
    },
    Br {
        target: BlockId,
    },
    CondBr {
        cond: Operand,
        then_bb: BlockId,
        else_bb: BlockId,
    },
    Switch {
        value: Operand,
        cases: Vec<SwitchCase>,
        default: BlockId,
    },
    IndirectBr {
        address: Operand,
        destinations: Vec<BlockId>,
    },
    Unreachable,
}

/// Visits each operand of an instruction.
pub fn for_each_operand(kind: &InstKind, mut f: impl FnMut(&Operand)) {
    match kind {
        InstKind::Binary { lhs, rhs, .. }
        | InstKind::Icmp { lhs, rhs, .. }
        | InstKind::Fcmp { lhs, rhs, .. }
        | InstKind::AtomicRmw {
            ptr: lhs,
            value: rhs,
            ..
        } => {
            f(lhs);
            f(rhs);
        }
        InstKind::Cast { value, .. }
        | InstKind::Load { ptr: value, .. }
        | InstKind::LifetimeStart { ptr: value }
        | InstKind::LifetimeEnd { ptr: value } => f(value),
        InstKind::Select {
            cond,
            if_true,
            if_false,
        } => {
            f(cond);
            f(if_true);
            f(if_false);
        }
        InstKind::Store { ptr, value, .. } => {
            f(ptr);
            f(value);
        }
        InstKind::Gep { base, indices, .. } => {
            f(base);
            for idx in indices {
                f(&idx.index);
            }
        }
        InstKind::Alloca { count, .. } => f(count),
        InstKind::Call { callee, args } => {
            if let Callee::Indirect { ptr, .. } = callee {
                f(ptr);
            }
            for arg in args {
                f(arg);
            }
        }
        InstKind::Fence => {}
        InstKind::InsertElement { vec, elem, index } => {
            f(vec);
            f(elem);
            f(index);
        }
        InstKind::ExtractElement { vec, index } => {
            f(vec);
            f(index);
        }
        InstKind::Shuffle { a, b, .. } => {
            f(a);
            f(b);
        }
        InstKind::Phi { incoming } => {
            for (_, op) in incoming {
                f(op);
            }
        }
    }
}

/// Visits each operand of a terminator.
pub fn for_each_term_operand(term: &Terminator, mut f: impl FnMut(&Operand)) {
    match term {
        Terminator::Ret { value } => {
            if let Some(v) = value {
                f(v);
            }
        }
        Terminator::CondBr { cond, .. } => f(cond),
        Terminator::Switch { value, .. } => f(value),
        Terminator::IndirectBr { address, .. } => f(address),
        Terminator::Br { .. } | Terminator::Unreachable => {}
    }
}
