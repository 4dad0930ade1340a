use crate::codegen::test_helpers::*;
use crate::ir::builder::FunctionBuilder;
use crate::ir::{
    BinOp, Constant, IcmpOp, InstKind, IrType, Lane, Module, Operand, Terminator, ValueId,
};

const I32X4: IrType = IrType::Vec {
    lane: Lane::I32,
    lanes: 4,
};
const BOOLX4: IrType = IrType::Vec {
    lane: Lane::Bool,
    lanes: 4,
};

/// Stores `value` through the function's first (pointer) parameter.
fn store_vec(fb: &mut FunctionBuilder, value: ValueId) {
    let ptr = fb.param(0);
    fb.push(
        InstKind::Store {
            ptr: Operand::Value(ptr),
            value: Operand::Value(value),
            align: 16,
            volatile: false,
        },
        IrType::Void,
    );
}

/// Builds `fn f(p: ptr, xs...)` whose body fills all four lanes of an
/// <4 x i32> from the given operands and stores the result.
fn insert_chain_module(names: &[&str]) -> Module {
    let mut params = vec![IrType::Ptr];
    params.extend(std::iter::repeat(IrType::I32).take(names.len()));
    let fsig = sig(&params, IrType::Void);
    let mut mb = module();
    let f = mb.declare("fill", fsig.clone());
    let mut fb = FunctionBuilder::new("fill", fsig);
    fb.name_param(0, "p");
    for (i, name) in names.iter().enumerate() {
        fb.name_param(i + 1, name);
    }
    let mut vec = Operand::Const(Constant::Undef(I32X4));
    let mut last = None;
    for lane in 0..4 {
        let elem = if names.len() == 1 {
            fb.param(1)
        } else {
            fb.param(1 + lane)
        };
        let v = fb
            .push_named(
                InstKind::InsertElement {
                    vec,
                    elem: Operand::Value(elem),
                    index: int(lane as i64),
                },
                I32X4,
                &format!("v{lane}"),
            )
            .expect("insert result");
        vec = Operand::Value(v);
        last = Some(v);
    }
    store_vec(&mut fb, last.expect("chain"));
    fb.terminate(Terminator::Ret { value: None });
    mb.define(f, fb.finish());
    mb.finish()
}

#[test]
fn test_insert_chain_of_one_value_is_a_splat() {
    let out = translate(&insert_chain_module(&["x"]));
    assert!(out.code.contains("SIMD_Int32x4_splat($x)"), "{}", out.code);
    assert!(!out.code.contains("replaceLane"), "{}", out.code);
}

#[test]
fn test_insert_chain_of_distinct_values_is_a_constructor() {
    let out = translate(&insert_chain_module(&["x", "y", "z", "w"]));
    assert!(
        out.code.contains("SIMD_Int32x4($x, $y, $z, $w)"),
        "{}",
        out.code
    );
}

#[test]
fn test_simd_usage_flag_is_reported() {
    let out = translate(&insert_chain_module(&["x"]));
    assert!(out.code.contains("\"simd\": 1"), "{}", out.code);
    assert!(out.code.contains("\"simdInt32x4\": 1"), "{}", out.code);
    assert!(out.code.contains("\"simdFloat64x2\": 0"), "{}", out.code);
}

fn binop_module(op: BinOp) -> Module {
    let fsig = sig(&[IrType::Ptr, I32X4, I32X4], IrType::Void);
    let mut mb = module();
    let f = mb.declare("bin", fsig.clone());
    let mut fb = FunctionBuilder::new("bin", fsig);
    fb.name_param(0, "p");
    fb.name_param(1, "a");
    fb.name_param(2, "b");
    let r = fb
        .push_named(
            InstKind::Binary {
                op,
                lhs: Operand::Value(fb.param(1)),
                rhs: Operand::Value(fb.param(2)),
            },
            I32X4,
            "r",
        )
        .expect("binop result");
    store_vec(&mut fb, r);
    fb.terminate(Terminator::Ret { value: None });
    mb.define(f, fb.finish());
    mb.finish()
}

#[test]
fn test_vector_arithmetic() {
    let out = translate(&binop_module(BinOp::Add));
    assert!(out.code.contains("$r = SIMD_Int32x4_add($a,$b);"), "{}", out.code);
}

#[test]
fn test_vector_division_unrolls_per_lane() {
    let out = translate(&binop_module(BinOp::SDiv));
    assert!(
        out.code
            .contains("(SIMD_Int32x4_extractLane($a,0)|0) / (SIMD_Int32x4_extractLane($b,0)|0)|0"),
        "{}",
        out.code
    );
    assert!(out.code.contains("extractLane($a,3)"), "{}", out.code);
}

#[test]
fn test_vector_store_goes_through_a_temp_pointer() {
    let out = translate(&binop_module(BinOp::Add));
    assert!(
        out.code
            .contains("temp_Int32x4_ptr = $p;SIMD_Int32x4_store(HEAPU8, temp_Int32x4_ptr, $r);"),
        "{}",
        out.code
    );
}

#[test]
fn test_shift_by_splat_amount_uses_by_scalar() {
    let fsig = sig(&[IrType::Ptr, I32X4], IrType::Void);
    let mut mb = module();
    let f = mb.declare("sh", fsig.clone());
    let mut fb = FunctionBuilder::new("sh", fsig);
    fb.name_param(0, "p");
    fb.name_param(1, "a");
    let two = Constant::Int {
        value: 2,
        ty: IrType::I32,
    };
    let amount = Constant::Vector {
        ty: I32X4,
        lanes: vec![two.clone(), two.clone(), two.clone(), two],
    };
    let r = fb
        .push_named(
            InstKind::Binary {
                op: BinOp::Shl,
                lhs: Operand::Value(fb.param(1)),
                rhs: Operand::Const(amount),
            },
            I32X4,
            "r",
        )
        .expect("shift result");
    store_vec(&mut fb, r);
    fb.terminate(Terminator::Ret { value: None });
    mb.define(f, fb.finish());
    let out = translate(&mb.finish());
    assert!(
        out.code.contains("$r = SIMD_Int32x4_shiftLeftByScalar($a, 2);"),
        "{}",
        out.code
    );
}

#[test]
fn test_extract_lane_with_constant_index() {
    let fsig = sig(&[I32X4], IrType::I32);
    let mut mb = module();
    let f = mb.declare("ex", fsig.clone());
    let mut fb = FunctionBuilder::new("ex", fsig);
    fb.name_param(0, "a");
    let r = fb
        .push_named(
            InstKind::ExtractElement {
                vec: Operand::Value(fb.param(0)),
                index: int(2),
            },
            IrType::I32,
            "r",
        )
        .expect("extract result");
    fb.terminate(Terminator::Ret {
        value: Some(Operand::Value(r)),
    });
    mb.define(f, fb.finish());
    let out = translate(&mb.finish());
    assert!(
        out.code.contains("$r = SIMD_Int32x4_extractLane($a,2)|0;"),
        "{}",
        out.code
    );
}

#[test]
fn test_extract_lane_with_dynamic_index_is_fatal() {
    let fsig = sig(&[I32X4, IrType::I32], IrType::I32);
    let mut mb = module();
    let f = mb.declare("ex", fsig.clone());
    let mut fb = FunctionBuilder::new("ex", fsig);
    let r = fb
        .push(
            InstKind::ExtractElement {
                vec: Operand::Value(fb.param(0)),
                index: Operand::Value(fb.param(1)),
            },
            IrType::I32,
        )
        .expect("extract result");
    fb.terminate(Terminator::Ret {
        value: Some(Operand::Value(r)),
    });
    mb.define(f, fb.finish());
    let m = mb.finish();
    let err = crate::codegen::translate(&m, &crate::config::CodegenOptions::default());
    assert!(err.is_err());
}

#[test]
fn test_vector_icmp_ne_synthesizes_not_equal() {
    let fsig = sig(&[IrType::Ptr, I32X4, I32X4], IrType::Void);
    let mut mb = module();
    let f = mb.declare("ne", fsig.clone());
    let mut fb = FunctionBuilder::new("ne", fsig);
    fb.name_param(0, "p");
    fb.name_param(1, "a");
    fb.name_param(2, "b");
    let r = fb
        .push_named(
            InstKind::Icmp {
                op: IcmpOp::Ne,
                lhs: Operand::Value(fb.param(1)),
                rhs: Operand::Value(fb.param(2)),
            },
            BOOLX4,
            "r",
        )
        .expect("icmp result");
    // Keep the comparison alive through a select.
    let s = fb
        .push_named(
            InstKind::Select {
                cond: Operand::Value(r),
                if_true: Operand::Value(fb.param(1)),
                if_false: Operand::Value(fb.param(2)),
            },
            I32X4,
            "s",
        )
        .expect("select result");
    store_vec(&mut fb, s);
    fb.terminate(Terminator::Ret { value: None });
    mb.define(f, fb.finish());
    let out = translate(&mb.finish());
    assert!(
        out.code
            .contains("$r = SIMD_Int32x4_not(SIMD_Int32x4_equal($a,$b));"),
        "{}",
        out.code
    );
    assert!(
        out.code.contains("$s = SIMD_Int32x4_select($r,$a,$b);"),
        "{}",
        out.code
    );
}
