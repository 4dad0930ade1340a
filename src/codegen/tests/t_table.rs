use crate::codegen::test_helpers::*;
use crate::codegen::ModuleWriter;
use crate::config::CodegenOptions;
use crate::ir::{FuncId, IrType, Module};

fn three_function_module() -> Module {
    let mut mb = module();
    mb.declare("a", sig(&[IrType::I32], IrType::I32));
    mb.declare("b", sig(&[IrType::I32], IrType::I32));
    mb.declare("c", sig(&[], IrType::Void));
    mb.finish()
}

#[test]
fn test_indices_are_stable() {
    let m = three_function_module();
    let mut w = ModuleWriter::new(&m, CodegenOptions::default());
    let first = w.function_index(FuncId(0)).unwrap();
    let second = w.function_index(FuncId(1)).unwrap();
    assert_ne!(first, second);
    assert_eq!(w.function_index(FuncId(0)).unwrap(), first);
    assert_eq!(w.function_index(FuncId(1)).unwrap(), second);
}

#[test]
fn test_first_index_skips_the_null_slot() {
    let m = three_function_module();
    let mut w = ModuleWriter::new(&m, CodegenOptions::default());
    assert_eq!(w.function_index(FuncId(0)).unwrap(), 1);
    assert_eq!(w.function_index(FuncId(1)).unwrap(), 2);
}

#[test]
fn test_reserved_slots_occupy_aligned_pairs() {
    let m = three_function_module();
    let opts = CodegenOptions {
        reserved_function_pointers: 2,
        ..CodegenOptions::default()
    };
    let mut w = ModuleWriter::new(&m, opts);
    // 2*(R+1) leading null entries.
    assert_eq!(w.function_index(FuncId(0)).unwrap(), 6);
    let table = &w.function_tables["ii"];
    assert!(table[..6].iter().all(|slot| slot == "0"));
}

#[test]
fn test_no_aliasing_indices_increase_across_tables() {
    let m = three_function_module();
    let opts = CodegenOptions {
        no_aliasing_function_pointers: true,
        ..CodegenOptions::default()
    };
    let mut w = ModuleWriter::new(&m, opts);
    let first = w.function_index(FuncId(0)).unwrap();
    let third = w.function_index(FuncId(2)).unwrap();
    assert!(third > first, "indices must not alias: {first} vs {third}");
}

#[test]
fn test_signature_depends_on_precise_float_mode() {
    let fsig = sig(&[IrType::Float, IrType::Double, IrType::Ptr], IrType::Float);
    let m = three_function_module();

    let mut w = ModuleWriter::new(&m, CodegenOptions::default());
    assert_eq!(w.signature_of(&fsig).unwrap(), "dddi");

    let opts = CodegenOptions {
        precise_f32: true,
        ..CodegenOptions::default()
    };
    let mut w = ModuleWriter::new(&m, opts);
    assert_eq!(w.signature_of(&fsig).unwrap(), "ffdi");
}

#[test]
fn test_void_and_int_signatures() {
    let m = three_function_module();
    let mut w = ModuleWriter::new(&m, CodegenOptions::default());
    assert_eq!(w.signature_of(&sig(&[], IrType::Void)).unwrap(), "v");
    assert_eq!(
        w.signature_of(&sig(&[IrType::I32, IrType::I8], IrType::Ptr))
            .unwrap(),
        "iii"
    );
}

#[test]
fn test_tables_pad_to_a_power_of_two() {
    let mut mb = module();
    mb.declare("a", sig(&[], IrType::Void));
    mb.declare("b", sig(&[], IrType::Void));
    mb.declare("c", sig(&[], IrType::Void));
    let m = mb.finish();
    let mut w = ModuleWriter::new(&m, CodegenOptions::default());
    for i in 0..3 {
        w.function_index(FuncId(i)).unwrap();
    }
    w.pad_tables_to_pow2();
    assert_eq!(w.function_tables["v"].len(), 4);
}
