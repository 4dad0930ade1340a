use crate::codegen::test_helpers::*;
use crate::config::CodegenOptions;
use crate::ir::builder::FunctionBuilder;
use crate::ir::{
    AllocaElem, BinOp, InstKind, IrType, Module, Operand, SwitchCase, Terminator,
};

fn add_module() -> Module {
    let fsig = sig(&[IrType::I32, IrType::I32], IrType::I32);
    let mut mb = module();
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
    mb.finish()
}

#[test]
fn test_simple_add_function() {
    let out = translate(&add_module());
    assert!(out.code.contains("function _add($a,$b) {"), "{}", out.code);
    assert!(out.code.contains(" $a = $a|0;"), "{}", out.code);
    assert!(out.code.contains(" $b = $b|0;"), "{}", out.code);
    assert!(out.code.contains("$r = (($a) + ($b))|0;"), "{}", out.code);
    assert!(out.code.contains("return ($r|0);"), "{}", out.code);
}

#[test]
fn test_output_markers_and_framing() {
    let out = translate(&add_module());
    let start = out.code.find("// EMSCRIPTEN_START_FUNCTIONS").unwrap();
    let end = out.code.find("// EMSCRIPTEN_END_FUNCTIONS").unwrap();
    let meta = out.code.find("// EMSCRIPTEN_METADATA").unwrap();
    let meminit = out.code.find("/* memory initializer */ allocate([").unwrap();
    assert!(start < end && end < meminit && meminit < meta);
    // A postsets chain exists even when it is empty.
    assert!(out.code.contains("function runPostSets() {"), "{}", out.code);
}

#[test]
fn test_locals_declared_with_typed_zero_initializers() {
    let out = translate(&add_module());
    assert!(out.code.contains(" var "), "{}", out.code);
    assert!(out.code.contains("$r = 0"), "{}", out.code);
    assert!(out.code.contains("label = 0"), "{}", out.code);
    assert!(out.code.contains("sp = 0"), "{}", out.code);
    assert!(out.code.contains(" sp = STACKTOP;"), "{}", out.code);
}

fn frame_module(assertions: u32) -> (Module, CodegenOptions) {
    let fsig = sig(&[], IrType::I32);
    let mut mb = module();
    let f = mb.declare("stacky", fsig.clone());
    let mut fb = FunctionBuilder::new("stacky", fsig);
    let slot = fb
        .push_named(
            InstKind::Alloca {
                elem: AllocaElem::Scalar(IrType::I32),
                count: int(1),
                align: 4,
            },
            IrType::Ptr,
            "slot",
        )
        .expect("alloca result");
    fb.push(
        InstKind::Store {
            ptr: Operand::Value(slot),
            value: int(7),
            align: 4,
            volatile: false,
        },
        IrType::Void,
    );
    let r = fb
        .push_named(
            InstKind::Load {
                ptr: Operand::Value(slot),
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
    let opts = CodegenOptions {
        assertions,
        ..CodegenOptions::default()
    };
    (mb.finish(), opts)
}

#[test]
fn test_stack_frame_bump_and_restore() {
    let (m, opts) = frame_module(0);
    let out = translate_with(&m, &opts);
    assert!(out.code.contains("$slot = sp;"), "{}", out.code);
    assert!(
        out.code.contains("STACKTOP = STACKTOP + 16|0;"),
        "{}",
        out.code
    );
    assert!(out.code.contains("STACKTOP = sp;return"), "{}", out.code);
    assert!(!out.code.contains("STACK_MAX"), "{}", out.code);
}

#[test]
fn test_stack_overflow_guard_under_assertions() {
    let (m, opts) = frame_module(1);
    let out = translate_with(&m, &opts);
    assert!(
        out.code
            .contains("STACKTOP = STACKTOP + 16|0; if ((STACKTOP|0) >= (STACK_MAX|0)) abort();"),
        "{}",
        out.code
    );
}

#[test]
fn test_phi_swap_cycle_is_broken_with_a_temporary() {
    let fsig = sig(&[IrType::I1], IrType::I32);
    let mut mb = module();
    let f = mb.declare("spin", fsig.clone());
    let mut fb = FunctionBuilder::new("spin", fsig);
    fb.name_param(0, "c");
    let entry = fb.current();
    let loop_bb = fb.add_block();
    let exit_bb = fb.add_block();
    fb.terminate(Terminator::Br { target: loop_bb });

    let p1 = fb.declare_phi(loop_bb, IrType::I32, "p1");
    let p2 = fb.declare_phi(loop_bb, IrType::I32, "p2");
    fb.select(loop_bb);
    fb.place_phi(
        loop_bb,
        p1,
        vec![(entry, int(1)), (loop_bb, Operand::Value(p2))],
    );
    fb.place_phi(
        loop_bb,
        p2,
        vec![(entry, int(2)), (loop_bb, Operand::Value(p1))],
    );
    fb.terminate(Terminator::CondBr {
        cond: Operand::Value(fb.param(0)),
        then_bb: loop_bb,
        else_bb: exit_bb,
    });

    fb.select(exit_bb);
    fb.terminate(Terminator::Ret {
        value: Some(Operand::Value(p1)),
    });
    mb.define(f, fb.finish());
    let out = translate(&mb.finish());

    // Neither assignment may read the other's already-updated value; the
    // cycle is resolved through $phi temporaries.
    assert!(out.code.contains("$p2$phi = $p1;"), "{}", out.code);
    assert!(out.code.contains("$p2 = $p2$phi;"), "{}", out.code);
    assert!(!out.code.contains("$p1 = $p2;$p2 = $p1;"), "{}", out.code);
}

#[test]
fn test_straight_line_phis_assign_directly() {
    let fsig = sig(&[IrType::I1], IrType::I32);
    let mut mb = module();
    let f = mb.declare("pick", fsig.clone());
    let mut fb = FunctionBuilder::new("pick", fsig);
    fb.name_param(0, "c");
    let entry = fb.current();
    let then_bb = fb.add_block();
    let join = fb.add_block();
    fb.terminate(Terminator::CondBr {
        cond: Operand::Value(fb.param(0)),
        then_bb,
        else_bb: join,
    });
    fb.select(then_bb);
    fb.terminate(Terminator::Br { target: join });
    let p = fb.declare_phi(join, IrType::I32, "p");
    fb.place_phi(join, p, vec![(entry, int(5)), (then_bb, int(9))]);
    fb.select(join);
    fb.terminate(Terminator::Ret {
        value: Some(Operand::Value(p)),
    });
    mb.define(f, fb.finish());
    let out = translate(&mb.finish());
    assert!(out.code.contains("$p = 5;"), "{}", out.code);
    assert!(out.code.contains("$p = 9;"), "{}", out.code);
    assert!(!out.code.contains("$phi"), "{}", out.code);
}

#[test]
fn test_switch_cases_sharing_a_successor_are_deduplicated() {
    let fsig = sig(&[IrType::I32], IrType::I32);
    let mut mb = module();
    let f = mb.declare("sw", fsig.clone());
    let mut fb = FunctionBuilder::new("sw", fsig);
    fb.name_param(0, "x");
    let shared = fb.add_block();
    let other = fb.add_block();
    fb.terminate(Terminator::Switch {
        value: Operand::Value(fb.param(0)),
        cases: vec![
            SwitchCase { value: 1, target: shared },
            SwitchCase { value: 2, target: shared },
            SwitchCase { value: 3, target: shared },
        ],
        default: other,
    });
    fb.select(shared);
    fb.terminate(Terminator::Ret { value: Some(int(10)) });
    fb.select(other);
    fb.terminate(Terminator::Ret { value: Some(int(20)) });
    mb.define(f, fb.finish());
    let out = translate(&mb.finish());

    // One branch carries all three case labels, so the shared successor is
    // targeted exactly once.
    assert!(
        out.code.contains("case 3: case 2: case 1: "),
        "{}",
        out.code
    );
    assert_eq!(
        out.code.matches("label = 2; break;").count(),
        1,
        "{}",
        out.code
    );
    assert!(out.code.contains("switch ($x|0)"), "{}", out.code);
}

#[test]
fn test_label_dispatch_loop_shape() {
    let out = translate(&add_module());
    assert!(
        out.code.contains("while (1) switch (label | 0) {"),
        "{}",
        out.code
    );
}

#[test]
fn test_fall_off_return_is_synthesized() {
    let fsig = sig(&[], IrType::Double);
    let mut mb = module();
    let f = mb.declare("dangle", fsig.clone());
    let mut fb = FunctionBuilder::new("dangle", fsig);
    fb.terminate(Terminator::Unreachable);
    mb.define(f, fb.finish());
    let out = translate(&mb.finish());
    assert!(out.code.contains(" return +(+0);\n"), "{}", out.code);
}
