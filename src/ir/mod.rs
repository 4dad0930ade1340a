//! Pre-legalized SSA IR: the input side of the translation.
//!
//! ## Concepts
//!
//! - A module owns functions, globals and aliases; the code generator only
//!   ever borrows it.
//! - Functions own blocks and a value table; parameters come first, then
//!   instruction results in definition order.
//! - Blocks hold instructions and end in exactly one terminator. Phi nodes
//!   lead their block.
//! - Operands are either SSA values or inline constants, so lowering rules
//!   that depend on constant operands can match directly.
//!
//! The model assumes legalization has already run: integer widths above 32
//! bits are split, `insertelement`/`extractelement` indices are constants,
//! and getelementptr chains carry explicit byte offsets and element sizes.

pub mod builder;
pub mod module;
pub mod types;

pub use module::*;
pub use types::{FnSig, IrType, Lane};
