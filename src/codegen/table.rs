//! Function-pointer tables, one per signature.

use crate::codegen::calls::CallCx;
use crate::codegen::writer::ModuleWriter;
use crate::diag::CodegenError;
use crate::ir::{FnSig, FuncId, IrType};

impl<'m> ModuleWriter<'m> {
    fn signature_letter(&mut self, ty: IrType) -> Result<char, CodegenError> {
        match ty {
            IrType::Void => Ok('v'),
            IrType::Float if self.opts.precise_f32 => Ok('f'),
            IrType::Float | IrType::Double => Ok('d'),
            IrType::Vec { lane, .. } => {
                self.check_vector(ty)?;
                Ok(if lane.is_int() { 'I' } else { 'F' })
            }
            _ => Ok('i'),
        }
    }

    /// Single-letter-per-type signature; depends only on the function type
    /// and the precise-float configuration.
    pub(super) fn signature_of(&mut self, sig: &FnSig) -> Result<String, CodegenError> {
        let mut out = String::with_capacity(sig.params.len() + 1);
        out.push(self.signature_letter(sig.ret)?);
        for param in &sig.params {
            out.push(self.signature_letter(*param)?);
        }
        Ok(out)
    }

    /// Makes sure a table exists for the signature, with the reserved slots
    /// blocked out in front.
    pub(super) fn ensure_table(&mut self, sig: &str) {
        let reserved = self.opts.reserved_function_pointers;
        let min_size = if reserved > 0 {
            // Each reserved slot must be 2-aligned.
            2 * (reserved as usize + 1)
        } else {
            1
        };
        let table = self
            .function_tables
            .entry(sig.to_string())
            .or_default();
        while table.len() < min_size {
            table.push("0".to_string());
        }
    }

    /// The slot of a function within its signature's table, allocating one
    /// on first use.
    pub(super) fn function_index(&mut self, fid: FuncId) -> Result<u32, CodegenError> {
        let name = self.js_fn_name(fid);
        if let Some(index) = self.indexed_functions.get(&name) {
            return Ok(*index);
        }
        let func = self.module.func(fid);
        let sig = self.signature_of(&func.sig)?;
        self.ensure_table(&sig);

        let next_function_index = self.next_function_index as usize;
        let table = self.function_tables.get_mut(&sig).expect("table exists");
        if self.opts.no_aliasing_function_pointers {
            while table.len() < next_function_index {
                table.push("0".to_string());
            }
        }
        // XXX this is wrong, it's always 1. but, that's fine in the ARM-like
        // ABI we have which allows unaligned functions; the one risk is code
        // that forces a function alignment and relies on it.
        let alignment: usize = 1;
        while table.len() % alignment != 0 {
            table.push("0".to_string());
        }
        let index = table.len() as u32;
        table.push(name.clone());
        self.indexed_functions.insert(name, index);
        if self.opts.no_aliasing_function_pointers {
            self.next_function_index = index + 1;
        }

        // The function may be indexed without ever being called directly;
        // its handler may still need to record things.
        let raw_name = func.name.clone();
        if let Some(handler) = self.handlers.lookup(&raw_name) {
            let cx = CallCx {
                result: None,
                ret_ty: func.sig.ret,
                name: raw_name,
                args: &[],
                table_index_only: true,
            };
            handler(self, &cx)?;
        }

        Ok(index)
    }

    /// Pads every table to a power-of-two size before emission so index
    /// masking is valid.
    pub(super) fn pad_tables_to_pow2(&mut self) {
        for table in self.function_tables.values_mut() {
            let mut size = 1;
            while size < table.len() {
                size <<= 1;
            }
            while table.len() < size {
                table.push("0".to_string());
            }
        }
    }
}
