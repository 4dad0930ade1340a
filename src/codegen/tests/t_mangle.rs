use std::collections::HashSet;

use crate::codegen::mangle::{sanitize_global_name, sanitize_local_name};

#[test]
fn test_global_names() {
    assert_eq!(sanitize_global_name("foo"), "_foo");
    assert_eq!(sanitize_global_name("foo.bar"), "_foo_bar");
    assert_eq!(sanitize_global_name("llvm.memcpy.p0i8"), "_llvm_memcpy_p0i8");
    assert_eq!(sanitize_global_name("a$b"), "_a_b");
}

#[test]
fn test_global_names_can_collide() {
    // A documented limitation of the global namespace; the local namespace
    // stays injective instead.
    assert_eq!(sanitize_global_name("x.a"), sanitize_global_name("x_a"));
}

#[test]
fn test_local_names_pass_through() {
    assert_eq!(sanitize_local_name("x"), "$x");
    assert_eq!(sanitize_local_name("x_a"), "$x_a");
    assert_eq!(sanitize_local_name("add12"), "$add12");
}

#[test]
fn test_local_dots_without_other_illegals() {
    assert_eq!(sanitize_local_name("x.a"), "$x$a");
    assert_eq!(sanitize_local_name("x..a"), "$x$$a");
    // Trailing dots never force a suffix.
    assert_eq!(sanitize_local_name("x.a."), "$x$a$");
}

#[test]
fn test_local_hex_escapes() {
    assert_eq!(sanitize_local_name("x#"), "$x$23");
    // A queued dot flushes as Z before the hex of the later illegal byte.
    assert_eq!(sanitize_local_name("x.a#"), "$x$a$Z23");
    assert_eq!(sanitize_local_name("x..a#"), "$x$$a$ZZ23");
}

#[test]
fn test_local_dollar_is_escaped() {
    // "$" in the input must not collide with the separator.
    assert_eq!(sanitize_local_name("x$a"), "$x$a24");
    assert_ne!(sanitize_local_name("x$a"), sanitize_local_name("x.a"));
}

#[test]
fn test_local_mangling_is_injective() {
    let alphabet = ['a', 'b', '_', '.', '#', '$'];
    let mut names = Vec::new();
    for &a in &alphabet {
        names.push(a.to_string());
        for &b in &alphabet {
            names.push(format!("{a}{b}"));
            for &c in &alphabet {
                names.push(format!("{a}{b}{c}"));
            }
        }
    }
    let mangled: HashSet<String> = names.iter().map(|n| sanitize_local_name(n)).collect();
    assert_eq!(mangled.len(), names.len(), "local mangling collided");
}

#[test]
fn test_local_mangling_of_multibyte_names() {
    // Multi-byte characters escape byte by byte and stay distinct.
    let a = sanitize_local_name("héllo");
    let b = sanitize_local_name("h_llo");
    assert_ne!(a, b);
    assert!(a.starts_with("$h$$llo"), "got {a}");
}
