use crate::codegen::test_helpers::*;
use crate::config::CodegenOptions;
use crate::ir::builder::FunctionBuilder;
use crate::ir::{Constant, InstKind, IrType, Module, Operand, Terminator};

/// A function that loads an i32 through its pointer argument with the given
/// alignment and returns it.
fn load_module(align: u32, volatile: bool, ty: IrType) -> Module {
    let mut mb = module();
    let f = mb.declare("ld", sig(&[IrType::Ptr], ty));
    let mut fb = FunctionBuilder::new("ld", sig(&[IrType::Ptr], ty));
    fb.name_param(0, "p");
    let p = fb.param(0);
    let r = fb
        .push_named(
            InstKind::Load {
                ptr: Operand::Value(p),
                ty,
                align,
                volatile,
            },
            ty,
            "r",
        )
        .expect("load result");
    fb.terminate(Terminator::Ret {
        value: Some(Operand::Value(r)),
    });
    mb.define(f, fb.finish());
    mb.finish()
}

fn store_module(align: u32, volatile: bool, ty: IrType) -> Module {
    let mut mb = module();
    let params = [IrType::Ptr, ty];
    let f = mb.declare("st", sig(&params, IrType::Void));
    let mut fb = FunctionBuilder::new("st", sig(&params, IrType::Void));
    fb.name_param(0, "p");
    fb.name_param(1, "v");
    let p = fb.param(0);
    let v = fb.param(1);
    fb.push(
        InstKind::Store {
            ptr: Operand::Value(p),
            value: Operand::Value(v),
            align,
            volatile,
        },
        IrType::Void,
    );
    fb.terminate(Terminator::Ret { value: None });
    mb.define(f, fb.finish());
    mb.finish()
}

#[test]
fn test_aligned_load() {
    let m = load_module(4, false, IrType::I32);
    let out = translate(&m);
    assert!(out.code.contains("$r = HEAP32[$p>>2]|0;"), "{}", out.code);
}

#[test]
fn test_aligned_double_load() {
    let m = load_module(8, false, IrType::Double);
    let out = translate(&m);
    assert!(out.code.contains("$r = +HEAPF64[$p>>3];"), "{}", out.code);
}

#[test]
fn test_byte_misaligned_load() {
    let m = load_module(1, false, IrType::I32);
    let out = translate(&m);
    assert!(
        out.code.contains(
            "$r = HEAPU8[$p>>0]|(HEAPU8[$p+1>>0]<<8)|(HEAPU8[$p+2>>0]<<16)|(HEAPU8[$p+3>>0]<<24);"
        ),
        "{}",
        out.code
    );
}

#[test]
fn test_byte_misaligned_store_uses_shift_pattern() {
    let m = store_module(1, false, IrType::I32);
    let out = translate(&m);
    assert!(
        out.code.contains(
            "HEAP8[$p>>0]=$v&255;HEAP8[$p+1>>0]=($v>>8)&255;\
             HEAP8[$p+2>>0]=($v>>16)&255;HEAP8[$p+3>>0]=$v>>24;"
        ),
        "{}",
        out.code
    );
}

#[test]
fn test_halfword_misaligned_double_store_stages_through_scratch() {
    let m = store_module(2, false, IrType::Double);
    let out = translate(&m);
    assert!(out.code.contains("HEAPF64[tempDoublePtr>>3]=$v;"), "{}", out.code);
    assert!(
        out.code
            .contains("HEAP16[$p>>1]=HEAP16[tempDoublePtr>>1];"),
        "{}",
        out.code
    );
    assert!(
        out.code
            .contains("HEAP16[$p+6>>1]=HEAP16[tempDoublePtr+6>>1];"),
        "{}",
        out.code
    );
}

#[test]
fn test_misaligned_double_load_reads_scratch() {
    let m = load_module(4, false, IrType::Double);
    let out = translate(&m);
    assert!(
        out.code
            .contains("HEAP32[tempDoublePtr>>2]=HEAP32[$p>>2];"),
        "{}",
        out.code
    );
    assert!(out.code.contains("$r = +HEAPF64[tempDoublePtr>>3];"), "{}", out.code);
}

#[test]
fn test_unaligned_warning() {
    let m = load_module(1, false, IrType::I32);
    let opts = CodegenOptions {
        warn_unaligned: true,
        ..CodegenOptions::default()
    };
    let out = translate_with(&m, &opts);
    assert_eq!(out.warnings.len(), 1);
}

#[test]
fn test_volatile_becomes_atomic_under_pthreads() {
    let m = load_module(4, true, IrType::I32);
    let opts = CodegenOptions {
        enable_pthreads: true,
        ..CodegenOptions::default()
    };
    let out = translate_with(&m, &opts);
    assert!(
        out.code.contains("$r = Atomics_load(HEAP32,$p>>2);"),
        "{}",
        out.code
    );

    let m = store_module(4, true, IrType::I32);
    let out = translate_with(&m, &opts);
    assert!(
        out.code.contains("Atomics_store(HEAP32,$p>>2,$v);"),
        "{}",
        out.code
    );
}

#[test]
fn test_volatile_float_uses_emulated_atomics() {
    let m = load_module(4, true, IrType::Float);
    let opts = CodegenOptions {
        enable_pthreads: true,
        ..CodegenOptions::default()
    };
    let out = translate_with(&m, &opts);
    assert!(
        out.code
            .contains("$r = +_emscripten_atomic_load_f32($p)"),
        "{}",
        out.code
    );
}

#[test]
fn test_volatile_without_pthreads_is_plain() {
    let m = load_module(4, true, IrType::I32);
    let out = translate(&m);
    assert!(out.code.contains("$r = HEAP32[$p>>2]|0;"), "{}", out.code);
    assert!(!out.code.contains("Atomics_load"), "{}", out.code);
}

#[test]
fn test_load_from_absolute_address_traps() {
    let mut mb = module();
    let f = mb.declare("ld0", sig(&[], IrType::I32));
    let mut fb = FunctionBuilder::new("ld0", sig(&[], IrType::I32));
    let r = fb
        .push_named(
            InstKind::Load {
                ptr: Operand::Const(Constant::NullPtr),
                ty: IrType::I32,
                align: 4,
                volatile: false,
            },
            IrType::I32,
            "r",
        )
        .expect("load result");
    fb.terminate(Terminator::Ret {
        value: Some(Operand::Value(r)),
    });
    mb.define(f, fb.finish());
    let out = translate(&mb.finish());
    assert!(
        out.code
            .contains("; abort() /* segfault, load from absolute addr */"),
        "{}",
        out.code
    );
}
