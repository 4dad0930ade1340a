use crate::codegen::test_helpers::*;
use crate::codegen::CastFlags;
use crate::config::CodegenOptions;
use crate::ir::{IrType, Lane};

fn coerced(ty: IrType, flags: CastFlags) -> String {
    let mut w = bare_writer(CodegenOptions::default());
    w.coerce("x", ty, flags).expect("coerce")
}

fn coerced_precise(ty: IrType, flags: CastFlags) -> String {
    let opts = CodegenOptions {
        precise_f32: true,
        ..CodegenOptions::default()
    };
    let mut w = bare_writer(opts);
    w.coerce("x", ty, flags).expect("coerce")
}

#[test]
fn test_int32_and_pointer() {
    assert_eq!(coerced(IrType::I32, CastFlags::SIGNED), "x|0");
    assert_eq!(coerced(IrType::I32, CastFlags::UNSIGNED), "x>>>0");
    assert_eq!(coerced(IrType::I32, CastFlags::NONSPECIFIC), "x|0");
    assert_eq!(coerced(IrType::Ptr, CastFlags::SIGNED), "x|0");
    assert_eq!(coerced(IrType::Ptr, CastFlags::UNSIGNED), "x>>>0");
}

#[test]
fn test_narrow_ints() {
    assert_eq!(coerced(IrType::I8, CastFlags::SIGNED), "x<<24>>24");
    assert_eq!(coerced(IrType::I8, CastFlags::UNSIGNED), "x&255");
    assert_eq!(coerced(IrType::I16, CastFlags::SIGNED), "x<<16>>16");
    assert_eq!(coerced(IrType::I16, CastFlags::UNSIGNED), "x&65535");
    assert_eq!(coerced(IrType::I1, CastFlags::SIGNED), "x<<31>>31");
    assert_eq!(coerced(IrType::I1, CastFlags::UNSIGNED), "x&1");
}

#[test]
fn test_nonspecific_collapses_narrow_ints() {
    assert_eq!(coerced(IrType::I8, CastFlags::NONSPECIFIC), "x|0");
    assert_eq!(coerced(IrType::I16, CastFlags::NONSPECIFIC), "x|0");
    assert_eq!(coerced(IrType::I1, CastFlags::NONSPECIFIC), "x|0");
}

#[test]
fn test_floats() {
    assert_eq!(coerced(IrType::Double, CastFlags::SIGNED), "+x");
    // Without precise float32, floats fall through to double handling.
    assert_eq!(coerced(IrType::Float, CastFlags::SIGNED), "+x");
}

#[test]
fn test_precise_float32() {
    assert_eq!(
        coerced_precise(IrType::Float, CastFlags::SIGNED),
        "Math_fround(x)"
    );
    assert_eq!(
        coerced_precise(IrType::Float, CastFlags::FFI_IN),
        "Math_fround(+(x))"
    );
    // Values leaving across an FFI boundary are never frounded.
    assert_eq!(coerced_precise(IrType::Float, CastFlags::FFI_OUT), "+x");
    assert_eq!(coerced_precise(IrType::Double, CastFlags::SIGNED), "+x");
}

#[test]
fn test_vector_check() {
    let ty = IrType::Vec {
        lane: Lane::I32,
        lanes: 4,
    };
    assert_eq!(coerced(ty, CastFlags::SIGNED), "SIMD_Int32x4_check(x)");
    let fty = IrType::Vec {
        lane: Lane::F32,
        lanes: 4,
    };
    assert_eq!(coerced(fty, CastFlags::SIGNED), "SIMD_Float32x4_check(x)");
}
