//! Shared fixtures for the codegen tests.

use crate::codegen::writer::ModuleWriter;
use crate::codegen::Output;
use crate::config::CodegenOptions;
use crate::ir::builder::ModuleBuilder;
use crate::ir::{Constant, FnSig, IrType, Module, Operand};

pub(crate) const TRIPLE: &str = "asmjs-unknown-emscripten";

pub(crate) fn module() -> ModuleBuilder {
    ModuleBuilder::new(TRIPLE)
}

pub(crate) fn sig(params: &[IrType], ret: IrType) -> FnSig {
    FnSig {
        params: params.to_vec(),
        ret,
    }
}

pub(crate) fn int(v: i64) -> Operand {
    Operand::Const(Constant::Int {
        value: v,
        ty: IrType::I32,
    })
}

pub(crate) fn translate(module: &Module) -> Output {
    translate_with(module, &CodegenOptions::default())
}

pub(crate) fn translate_with(module: &Module, opts: &CodegenOptions) -> Output {
    crate::codegen::translate(module, opts).expect("translation failed")
}

/// A writer over an empty module, for unit tests of the pure emission
/// helpers that never look at function state.
pub(crate) fn bare_writer(opts: CodegenOptions) -> ModuleWriter<'static> {
    let module = Box::leak(Box::new(ModuleBuilder::new(TRIPLE).finish()));
    ModuleWriter::new(module, opts)
}
