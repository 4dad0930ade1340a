//! Memory access lowering onto the typed heap views.
//!
//! Accesses whose width fits their alignment index a heap view directly.
//! Misaligned accesses decompose into alignment-sized pieces, staged
//! through the `tempDoublePtr` scratch slot where a float value has to be
//! reassembled. Volatile accesses become atomic operations when threads
//! are enabled.

use crate::codegen::cast::CastFlags;
use crate::codegen::writer::ModuleWriter;
use crate::diag::{CodegenError, Warning};
use crate::ir::{Constant, IrType, Operand, ValueId};

pub(super) fn heap_name(bytes: u32, integer: bool) -> Result<&'static str, CodegenError> {
    match bytes {
        8 => Ok("HEAPF64"),
        4 => Ok(if integer { "HEAP32" } else { "HEAPF32" }),
        2 => Ok("HEAP16"),
        1 => Ok("HEAP8"),
        _ => Err(CodegenError::UnsupportedType(IrType::Void, "heap width")),
    }
}

pub(super) fn heap_shift(bytes: u32) -> u32 {
    match bytes {
        8 => 3,
        4 => 2,
        2 => 1,
        _ => 0,
    }
}

pub(super) fn heap_shift_str(bytes: u32) -> &'static str {
    match bytes {
        8 => ">>3",
        4 => ">>2",
        2 => ">>1",
        _ => ">>0",
    }
}

fn atomic_type_name(heap: &str) -> &'static str {
    match heap {
        "HEAPF32" => "f32",
        "HEAPF64" => "f64",
        _ => "",
    }
}

impl<'m> ModuleWriter<'m> {
    /// The heap view and index expression for a pointer operand. Pointers to
    /// initialized globals fold to a constant index.
    pub(super) fn heap_name_and_index(
        &mut self,
        ptr: &Operand,
        bytes: u32,
        integer: bool,
    ) -> Result<(&'static str, String), CodegenError> {
        let heap = heap_name(bytes, integer)?;
        if let Operand::Const(Constant::Global(g)) = ptr {
            if !self.module.global(*g).is_declaration() {
                let addr = self.global_address(&self.global_names[g.index()])?;
                let index = if !self.opts.relocatable {
                    (addr >> heap_shift(bytes)).to_string()
                } else {
                    format!(
                        "{}{}",
                        self.relocate_global(addr.to_string()),
                        heap_shift_str(bytes)
                    )
                };
                return Ok((heap, index));
            }
        }
        let ps = self.op_expr(ptr, CastFlags::SIGNED)?;
        Ok((heap, format!("{ps}{}", heap_shift_str(bytes))))
    }

    pub(super) fn ptr_use(
        &mut self,
        ptr: &Operand,
        bytes: u32,
        integer: bool,
    ) -> Result<String, CodegenError> {
        let (heap, index) = self.heap_name_and_index(ptr, bytes, integer)?;
        Ok(format!("{heap}[{index}]"))
    }

    fn ptr_load(&mut self, ptr: &Operand, ty: IrType) -> Result<String, CodegenError> {
        let access = self.ptr_use(ptr, ty.size_bytes(), ty.is_int_or_ptr())?;
        self.coerce(&access, ty, CastFlags::NONSPECIFIC)
    }

    pub(super) fn load_code(
        &mut self,
        result: ValueId,
        ptr: &Operand,
        ty: IrType,
        align: u32,
        volatile: bool,
    ) -> Result<String, CodegenError> {
        let assign = self.assign(result);
        let bytes = ty.size_bytes();
        if bytes <= align || align == 0 {
            let mut text = if self.opts.enable_pthreads && volatile {
                let (heap, index) = self.heap_name_and_index(ptr, bytes, ty.is_int_or_ptr())?;
                if heap == "HEAPF32" || heap == "HEAPF64" {
                    // No float atomics; go through the emulation helpers.
                    let fround = self.opts.precise_f32 && heap == "HEAPF32";
                    let ps = self.op_expr(ptr, CastFlags::SIGNED)?;
                    format!(
                        "{assign}{}_emscripten_atomic_load_{}({ps}{}",
                        if fround { "Math_fround(" } else { "+" },
                        atomic_type_name(heap),
                        if fround { "))" } else { ")" }
                    )
                } else {
                    format!("{assign}Atomics_load({heap},{index})")
                }
            } else {
                format!("{assign}{}", self.ptr_load(ptr, ty)?)
            };
            if Self::is_absolute(ptr) {
                // Loads from absolute constants are either intentional
                // segfaults or code problems.
                text.push_str("; abort() /* segfault, load from absolute addr */");
            }
            return Ok(text);
        }

        let func_name = self.func().name.clone();
        if self.opts.enable_pthreads && volatile {
            self.diags
                .warn(Warning::UnalignedVolatileLoad { func: func_name.clone() });
        }
        if self.opts.warn_unaligned {
            self.diags.warn(Warning::UnalignedLoad { func: func_name });
        }

        let ps = self.op_expr(ptr, CastFlags::SIGNED)?;
        let text = match bytes {
            8 => {
                let mut text = match align {
                    4 => format!(
                        "HEAP32[tempDoublePtr>>2]=HEAP32[{ps}>>2];\
                         HEAP32[tempDoublePtr+4>>2]=HEAP32[{ps}+4>>2]"
                    ),
                    2 => format!(
                        "HEAP16[tempDoublePtr>>1]=HEAP16[{ps}>>1];\
                         HEAP16[tempDoublePtr+2>>1]=HEAP16[{ps}+2>>1];\
                         HEAP16[tempDoublePtr+4>>1]=HEAP16[{ps}+4>>1];\
                         HEAP16[tempDoublePtr+6>>1]=HEAP16[{ps}+6>>1]"
                    ),
                    _ => format!(
                        "HEAP8[tempDoublePtr>>0]=HEAP8[{ps}>>0];\
                         HEAP8[tempDoublePtr+1>>0]=HEAP8[{ps}+1>>0];\
                         HEAP8[tempDoublePtr+2>>0]=HEAP8[{ps}+2>>0];\
                         HEAP8[tempDoublePtr+3>>0]=HEAP8[{ps}+3>>0];\
                         HEAP8[tempDoublePtr+4>>0]=HEAP8[{ps}+4>>0];\
                         HEAP8[tempDoublePtr+5>>0]=HEAP8[{ps}+5>>0];\
                         HEAP8[tempDoublePtr+6>>0]=HEAP8[{ps}+6>>0];\
                         HEAP8[tempDoublePtr+7>>0]=HEAP8[{ps}+7>>0]"
                    ),
                };
                text.push_str(&format!(";{assign}+HEAPF64[tempDoublePtr>>3]"));
                text
            }
            4 => {
                if ty.is_int_or_ptr() {
                    match align {
                        2 => format!(
                            "{assign}HEAPU16[{ps}>>1]|(HEAPU16[{ps}+2>>1]<<16)"
                        ),
                        _ => format!(
                            "{assign}HEAPU8[{ps}>>0]|(HEAPU8[{ps}+1>>0]<<8)|\
                             (HEAPU8[{ps}+2>>0]<<16)|(HEAPU8[{ps}+3>>0]<<24)"
                        ),
                    }
                } else {
                    let mut text = match align {
                        2 => format!(
                            "HEAP16[tempDoublePtr>>1]=HEAP16[{ps}>>1];\
                             HEAP16[tempDoublePtr+2>>1]=HEAP16[{ps}+2>>1]"
                        ),
                        _ => format!(
                            "HEAP8[tempDoublePtr>>0]=HEAP8[{ps}>>0];\
                             HEAP8[tempDoublePtr+1>>0]=HEAP8[{ps}+1>>0];\
                             HEAP8[tempDoublePtr+2>>0]=HEAP8[{ps}+2>>0];\
                             HEAP8[tempDoublePtr+3>>0]=HEAP8[{ps}+3>>0]"
                        ),
                    };
                    let value = self.coerce("HEAPF32[tempDoublePtr>>2]", IrType::Float, CastFlags::SIGNED)?;
                    text.push_str(&format!(";{assign}{value}"));
                    text
                }
            }
            2 => format!("{assign}HEAPU8[{ps}>>0]|(HEAPU8[{ps}+1>>0]<<8)"),
            _ => return Err(CodegenError::UnsupportedType(ty, "unaligned load")),
        };
        Ok(text)
    }

    pub(super) fn store_code(
        &mut self,
        ptr: &Operand,
        ty: IrType,
        value_str: &str,
        align: u32,
        volatile: bool,
    ) -> Result<String, CodegenError> {
        let bytes = ty.size_bytes();
        if bytes <= align || align == 0 {
            let mut text = if self.opts.enable_pthreads && volatile {
                let (heap, index) = self.heap_name_and_index(ptr, bytes, ty.is_int_or_ptr())?;
                if heap == "HEAPF32" || heap == "HEAPF64" {
                    let ps = self.op_expr(ptr, CastFlags::SIGNED)?;
                    let call = format!(
                        "_emscripten_atomic_store_{}({ps},{value_str})",
                        atomic_type_name(heap)
                    );
                    if self.opts.precise_f32 && heap == "HEAPF32" {
                        format!("Math_fround({call})")
                    } else {
                        format!("+{call}")
                    }
                } else {
                    format!("Atomics_store({heap},{index},{value_str})")
                }
            } else {
                format!("{} = {value_str}", self.ptr_use(ptr, bytes, ty.is_int_or_ptr())?)
            };
            if Self::is_absolute(ptr) {
                text.push_str("; abort() /* segfault */");
            }
            return Ok(text);
        }

        let func_name = self.func().name.clone();
        if self.opts.enable_pthreads && volatile {
            self.diags
                .warn(Warning::UnalignedVolatileStore { func: func_name.clone() });
        }
        if self.opts.warn_unaligned {
            self.diags.warn(Warning::UnalignedStore { func: func_name });
        }

        let ps = self.op_expr(ptr, CastFlags::SIGNED)?;
        let vs = value_str;
        let text = match bytes {
            8 => {
                let mut text = format!("HEAPF64[tempDoublePtr>>3]={vs};");
                text.push_str(&match align {
                    4 => format!(
                        "HEAP32[{ps}>>2]=HEAP32[tempDoublePtr>>2];\
                         HEAP32[{ps}+4>>2]=HEAP32[tempDoublePtr+4>>2]"
                    ),
                    2 => format!(
                        "HEAP16[{ps}>>1]=HEAP16[tempDoublePtr>>1];\
                         HEAP16[{ps}+2>>1]=HEAP16[tempDoublePtr+2>>1];\
                         HEAP16[{ps}+4>>1]=HEAP16[tempDoublePtr+4>>1];\
                         HEAP16[{ps}+6>>1]=HEAP16[tempDoublePtr+6>>1]"
                    ),
                    _ => format!(
                        "HEAP8[{ps}>>0]=HEAP8[tempDoublePtr>>0];\
                         HEAP8[{ps}+1>>0]=HEAP8[tempDoublePtr+1>>0];\
                         HEAP8[{ps}+2>>0]=HEAP8[tempDoublePtr+2>>0];\
                         HEAP8[{ps}+3>>0]=HEAP8[tempDoublePtr+3>>0];\
                         HEAP8[{ps}+4>>0]=HEAP8[tempDoublePtr+4>>0];\
                         HEAP8[{ps}+5>>0]=HEAP8[tempDoublePtr+5>>0];\
                         HEAP8[{ps}+6>>0]=HEAP8[tempDoublePtr+6>>0];\
                         HEAP8[{ps}+7>>0]=HEAP8[tempDoublePtr+7>>0]"
                    ),
                });
                text
            }
            4 => {
                if ty.is_int_or_ptr() {
                    match align {
                        2 => format!(
                            "HEAP16[{ps}>>1]={vs}&65535;\
                             HEAP16[{ps}+2>>1]={vs}>>>16"
                        ),
                        _ => format!(
                            "HEAP8[{ps}>>0]={vs}&255;\
                             HEAP8[{ps}+1>>0]=({vs}>>8)&255;\
                             HEAP8[{ps}+2>>0]=({vs}>>16)&255;\
                             HEAP8[{ps}+3>>0]={vs}>>24"
                        ),
                    }
                } else {
                    let mut text = format!("HEAPF32[tempDoublePtr>>2]={vs};");
                    text.push_str(&match align {
                        2 => format!(
                            "HEAP16[{ps}>>1]=HEAP16[tempDoublePtr>>1];\
                             HEAP16[{ps}+2>>1]=HEAP16[tempDoublePtr+2>>1]"
                        ),
                        _ => format!(
                            "HEAP8[{ps}>>0]=HEAP8[tempDoublePtr>>0];\
                             HEAP8[{ps}+1>>0]=HEAP8[tempDoublePtr+1>>0];\
                             HEAP8[{ps}+2>>0]=HEAP8[tempDoublePtr+2>>0];\
                             HEAP8[{ps}+3>>0]=HEAP8[tempDoublePtr+3>>0]"
                        ),
                    });
                    text
                }
            }
            2 => format!(
                "HEAP8[{ps}>>0]={vs}&255;\
                 HEAP8[{ps}+1>>0]={vs}>>8"
            ),
            _ => return Err(CodegenError::UnsupportedType(ty, "unaligned store")),
        };
        Ok(text)
    }
}
