use crate::codegen::test_helpers::*;
use crate::codegen::ModuleWriter;
use crate::config::CodegenOptions;
use crate::ir::{Constant, InitField, Initializer, IrType, Module, PtrInit};

fn layout(module: &Module, opts: CodegenOptions) -> ModuleWriter<'_> {
    let mut w = ModuleWriter::new(module, opts);
    w.print_module_body().expect("translation failed");
    w
}

#[test]
fn test_global_at_base_address() {
    let mut mb = module();
    mb.add_global("g", 4, Some(Initializer::Int32(42)));
    let m = mb.finish();
    let w = layout(&m, CodegenOptions::default());
    assert_eq!(w.global_address("g").unwrap(), 8);
    let out = w.finish();
    assert!(
        out.code
            .contains("/* memory initializer */ allocate([42,0,0,0], \"i8\", ALLOC_NONE, Runtime.GLOBAL_BASE);"),
        "{}",
        out.code
    );
}

#[test]
fn test_addresses_are_aligned() {
    let mut mb = module();
    mb.add_global("a", 1, Some(Initializer::Bytes(b"abc".to_vec())));
    mb.add_global("b", 4, Some(Initializer::Int32(7)));
    mb.add_global("c", 8, Some(Initializer::F64(1.5)));
    mb.add_global("d", 2, Some(Initializer::Bytes(b"x".to_vec())));
    let m = mb.finish();
    let w = layout(&m, CodegenOptions::default());
    for (name, align) in [("a", 1u32), ("b", 4), ("c", 8), ("d", 2)] {
        let addr = w.global_address(name).unwrap();
        assert_eq!(addr % align, 0, "global {name} misaligned at {addr}");
    }
}

#[test]
fn test_buckets_are_laid_out_largest_alignment_first() {
    let mut mb = module();
    mb.add_global("small", 1, Some(Initializer::Bytes(b"a".to_vec())));
    mb.add_global("mid", 4, Some(Initializer::Int32(1)));
    mb.add_global("big", 8, Some(Initializer::F64(0.5)));
    let m = mb.finish();
    let w = layout(&m, CodegenOptions::default());
    assert!(w.aligned_starts[8] < w.aligned_starts[4]);
    assert!(w.aligned_starts[4] < w.aligned_starts[1]);
}

#[test]
fn test_global_base_is_padded_up_to_max_alignment() {
    let mut mb = module();
    mb.add_global("g", 16, Some(Initializer::Int32(1)));
    let m = mb.finish();
    let w = layout(&m, CodegenOptions::default());
    assert_eq!(w.global_base_padding, 8);
    assert_eq!(w.global_address("g").unwrap(), 16);
    let out = w.finish();
    assert!(
        out.code.contains("allocate([0,0,0,0,0,0,0,0,1,0,0,0]"),
        "{}",
        out.code
    );
    assert!(out.code.contains("\"maxGlobalAlign\": 16"), "{}", out.code);
}

#[test]
fn test_extern_reference_defers_to_post_init() {
    let mut mb = module();
    let ext = mb.add_global("ext", 4, None);
    mb.add_global(
        "p",
        4,
        Some(Initializer::Ptr(PtrInit {
            target: Constant::Global(ext),
            addend: 0,
        })),
    );
    let m = mb.finish();
    let out = translate(&m);
    assert!(out.code.contains("function runPostSets() {"), "{}", out.code);
    assert!(out.code.contains(" HEAP32[8 >> 2] = _ext;"), "{}", out.code);
    assert!(out.code.contains("\"_ext\""), "{}", out.code);
}

#[test]
fn test_function_pointer_initializer_gets_a_table_slot() {
    let mut mb = module();
    let f = mb.declare("cb", sig(&[], IrType::Void));
    mb.add_global(
        "handler",
        4,
        Some(Initializer::Struct(vec![
            InitField::Bytes(vec![1, 0, 0, 0]),
            InitField::Ptr(PtrInit {
                target: Constant::Function(f),
                addend: 0,
            }),
        ])),
    );
    let m = mb.finish();
    let w = layout(&m, CodegenOptions::default());
    // The reserved zero slot comes first, so the function lands at 1.
    let out = w.finish();
    assert!(
        out.code.contains("allocate([1,0,0,0,1,0,0,0]"),
        "{}",
        out.code
    );
    assert!(
        out.code.contains("\"v\": \"var FUNCTION_TABLE_v = [0,_cb];\""),
        "{}",
        out.code
    );
}

#[test]
fn test_init_array_start_records_initializers() {
    let mut mb = module();
    let ctor = mb.declare("ctor", sig(&[], IrType::Void));
    mb.add_global(
        "__init_array_start",
        4,
        Some(Initializer::Struct(vec![InitField::Ptr(PtrInit {
            target: Constant::Function(ctor),
            addend: 0,
        })])),
    );
    mb.add_global("__fini_array_start", 4, Some(Initializer::Zero(4)));
    let m = mb.finish();
    let out = translate(&m);
    assert!(
        out.code.contains("\"initializers\": [\n    \"_ctor\"\n  ]"),
        "{}",
        out.code
    );
    // Neither special global occupies memory.
    assert!(out.code.contains("allocate([]"), "{}", out.code);
}

#[test]
fn test_unnamed_globals_get_fresh_names() {
    let mut mb = module();
    mb.add_global("", 4, Some(Initializer::Int32(3)));
    let m = mb.finish();
    let w = layout(&m, CodegenOptions::default());
    assert_eq!(w.global_address("glb_1").unwrap(), 8);
}
