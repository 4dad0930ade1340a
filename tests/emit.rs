//! End-to-end translation checks through the public API.

use jsback::codegen;
use jsback::config::CodegenOptions;
use jsback::ir::builder::{FunctionBuilder, ModuleBuilder};
use jsback::ir::{BinOp, FnSig, Initializer, InstKind, IrType, Module, Operand, Terminator};

fn sig(params: &[IrType], ret: IrType) -> FnSig {
    FnSig {
        params: params.to_vec(),
        ret,
    }
}

fn build_add_module() -> Module {
    let mut mb = ModuleBuilder::new("asmjs-unknown-emscripten");
    let fsig = sig(&[IrType::I32, IrType::I32], IrType::I32);
    let f = mb.declare("add", fsig.clone());
    let mut fb = FunctionBuilder::new("add", fsig);
    fb.name_param(0, "a");
    fb.name_param(1, "b");
    let r = fb
        .push_named(
            InstKind::Binary {
                op: BinOp::Add,
                lhs: Operand::Value(fb.param(0)),
                rhs: Operand::Value(fb.param(1)),
            },
            IrType::I32,
            "r",
        )
        .expect("add result");
    fb.terminate(Terminator::Ret {
        value: Some(Operand::Value(r)),
    });
    mb.define(f, fb.finish());
    mb.add_global("answer", 4, Some(Initializer::Int32(42)));
    mb.finish()
}

#[test]
fn test_translates_a_small_module_end_to_end() {
    let module = build_add_module();
    let output = codegen::translate(&module, &CodegenOptions::default()).expect("translation");

    assert!(output.warnings.is_empty());
    assert!(output.code.contains("// EMSCRIPTEN_START_FUNCTIONS"));
    assert!(output.code.contains("function _add($a,$b) {"));
    assert!(output.code.contains("$r = (($a) + ($b))|0;"));
    assert!(output.code.contains("return ($r|0);"));
    assert!(output.code.contains("// EMSCRIPTEN_END_FUNCTIONS"));
    assert!(output
        .code
        .contains("/* memory initializer */ allocate([42,0,0,0], \"i8\", ALLOC_NONE, Runtime.GLOBAL_BASE);"));
    assert!(output.code.contains("// EMSCRIPTEN_METADATA"));
    assert!(output.code.contains("\"implementedFunctions\""));
}

#[test]
fn test_module_round_trips_through_json() {
    let module = build_add_module();
    let json = serde_json::to_string(&module).expect("serialize");
    let parsed: Module = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(parsed, module);

    let a = codegen::translate(&module, &CodegenOptions::default()).expect("translation");
    let b = codegen::translate(&parsed, &CodegenOptions::default()).expect("translation");
    assert_eq!(a.code, b.code);
}

#[test]
fn test_pthread_memory_initializer_guard() {
    let module = build_add_module();
    let opts = CodegenOptions {
        enable_pthreads: true,
        ..CodegenOptions::default()
    };
    let output = codegen::translate(&module, &opts).expect("translation");
    assert!(output.code.contains("if (!ENVIRONMENT_IS_PTHREAD) {"));
}
