//! Global data layout and serialization.
//!
//! Two passes over the module's initialized globals: *calculate* reserves
//! space in the bucket for each global's alignment class, *emit* fills in
//! the bytes. Between the passes the bucket start addresses are fixed so
//! that larger alignment classes come first. Values that cannot be known at
//! emission time (function table slots in relocatable mode, extern
//! addresses, self-relocations) are written as zeros and patched by
//! post-init statements.

use crate::config::DEFAULT_MEM_ALIGN;
use crate::codegen::writer::ModuleWriter;
use crate::diag::CodegenError;
use crate::ir::{Constant, GlobalId, InitField, Initializer, PtrInit};

impl<'m> ModuleWriter<'m> {
    pub(super) fn process_globals(&mut self) -> Result<(), CodegenError> {
        // Calculate: reserve addresses.
        for i in 0..self.module.globals.len() {
            if self.module.globals[i].init.is_some() {
                self.parse_constant(GlobalId(i as u32), true)?;
            }
        }

        // Fix bucket layout: pad each bucket to its own alignment, place
        // buckets in decreasing alignment order after the (padded) base.
        debug_assert_eq!(self.max_global_align, 0);
        let aligns: Vec<u32> = self.buckets.keys().copied().collect();
        for &align in &aligns {
            self.max_global_align = self.max_global_align.max(align);
            let bucket = self.buckets.get_mut(&align).expect("bucket exists");
            while bucket.len() as u32 & (align - 1) != 0 {
                bucket.push(0);
            }
        }
        if !self.opts.relocatable && self.max_global_align > 0 {
            while (self.opts.global_base + self.global_base_padding) % self.max_global_align != 0 {
                self.global_base_padding += 1;
            }
        }
        self.aligned_starts = vec![0; self.max_global_align as usize + 1];
        for &align in &aligns {
            let mut curr = self.opts.global_base + self.global_base_padding;
            for (&other, bytes) in &self.buckets {
                if other > align {
                    curr += bytes.len() as u32;
                }
            }
            self.aligned_starts[align as usize] = curr;
        }

        // Emit: serialize the bytes.
        for i in 0..self.module.globals.len() {
            if self.module.globals[i].init.is_some() {
                self.parse_constant(GlobalId(i as u32), false)?;
            }
        }

        if self.opts.relocatable {
            for i in 0..self.module.globals.len() {
                let global = &self.module.globals[i];
                if global.init.is_none() || global.internal {
                    continue;
                }
                let name = self.global_names[i].clone();
                if self.addresses.contains_key(&name) {
                    let js_name = self.js_global_name(GlobalId(i as u32));
                    // Skip names C could not dlsym anyhow.
                    if js_name.len() > 1 && name == js_name[1..] {
                        let addr = self.global_address(&name)?;
                        self.named_globals.insert(name, addr);
                    }
                }
            }
        }
        Ok(())
    }

    fn allocate_address(&mut self, name: &str, align: u32) {
        debug_assert!(align.is_power_of_two());
        let bucket = self.buckets.entry(align).or_default();
        while bucket.len() as u32 & (align - 1) != 0 {
            bucket.push(0);
        }
        self.addresses
            .insert(name.to_string(), (bucket.len() as u32, align * 8));
    }

    fn parse_constant(&mut self, id: GlobalId, calculate: bool) -> Result<(), CodegenError> {
        let global = self.module.global(id);
        let init = match &global.init {
            Some(init) => init,
            None => return Ok(()),
        };
        let align = if global.align == 0 {
            DEFAULT_MEM_ALIGN
        } else {
            global.align
        };
        let name = self.global_names[id.index()].clone();

        // Special initializer names never occupy memory.
        if name == "__init_array_start" {
            if calculate {
                for p in ptr_fields(init) {
                    if let Constant::Function(f) = &p.target {
                        let js = self.js_fn_name(*f);
                        self.global_initializers.push(js);
                    }
                }
            }
            return Ok(());
        }
        if name == "__fini_array_start" {
            return Ok(());
        }
        if name == "llvm.used" {
            if calculate {
                for p in ptr_fields(init) {
                    if let Constant::Function(f) = &p.target {
                        let js = self.js_fn_name(*f);
                        self.exports.push(js);
                    }
                }
            }
            return Ok(());
        }

        match init {
            Initializer::Bytes(bytes) => {
                if calculate {
                    self.allocate_address(&name, align);
                    self.bucket_extend(align, bytes);
                }
            }
            Initializer::F32(v) => {
                if calculate {
                    self.allocate_address(&name, align);
                    self.bucket_extend(align, &v.to_le_bytes());
                }
            }
            Initializer::F64(v) => {
                if calculate {
                    self.allocate_address(&name, align);
                    self.bucket_extend(align, &v.to_le_bytes());
                }
            }
            Initializer::Int32(v) => {
                if calculate {
                    self.allocate_address(&name, align);
                    self.bucket_extend(align, &v.to_le_bytes());
                }
            }
            Initializer::Int64(v) => {
                if calculate {
                    self.allocate_address(&name, align);
                    self.bucket_extend(align, &v.to_le_bytes());
                }
            }
            Initializer::Zero(size) => {
                if calculate {
                    self.allocate_address(&name, align);
                    let bucket = self.buckets.entry(align).or_default();
                    bucket.resize(bucket.len() + *size as usize, 0);
                }
            }
            Initializer::Struct(fields) => {
                if calculate {
                    self.allocate_address(&name, align);
                    let total: u32 = fields
                        .iter()
                        .map(|f| match f {
                            InitField::Zero(size) => *size,
                            InitField::Bytes(bytes) => bytes.len() as u32,
                            InitField::Ptr(_) => 4,
                        })
                        .sum();
                    let bucket = self.buckets.entry(align).or_default();
                    bucket.resize(bucket.len() + total as usize, 0);
                } else {
                    let mut offset = self.relative_global_address(&name)?;
                    let absolute = self.global_address(&name)?;
                    let offset_start = offset;
                    for field in fields {
                        match field {
                            InitField::Zero(size) => offset += size,
                            InitField::Bytes(bytes) => {
                                self.bucket_write(align, offset, bytes)?;
                                offset += bytes.len() as u32;
                            }
                            InitField::Ptr(p) => {
                                let base = self
                                    .const_as_offset(&p.target, absolute + offset - offset_start)?;
                                let data = base.wrapping_add(p.addend as u32);
                                self.bucket_write(align, offset, &data.to_le_bytes())?;
                                offset += 4;
                            }
                        }
                    }
                }
            }
            Initializer::Ptr(p) => {
                if calculate {
                    self.allocate_address(&name, align);
                    self.bucket_extend(align, &[0, 0, 0, 0]);
                } else {
                    let absolute = self.global_address(&name)?;
                    let base = self.const_as_offset(&p.target, absolute)?;
                    let data = base.wrapping_add(p.addend as u32);
                    let offset = self.relative_global_address(&name)?;
                    self.bucket_write(align, offset, &data.to_le_bytes())?;
                }
            }
        }
        Ok(())
    }

    fn bucket_extend(&mut self, align: u32, bytes: &[u8]) {
        self.buckets.entry(align).or_default().extend_from_slice(bytes);
    }

    fn bucket_write(
        &mut self,
        align: u32,
        offset: u32,
        bytes: &[u8],
    ) -> Result<(), CodegenError> {
        let bucket = self.buckets.entry(align).or_default();
        let offset = offset as usize;
        if offset + bytes.len() > bucket.len() {
            return Err(CodegenError::UnsupportedConstant("global write out of range"));
        }
        bucket[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// The value to serialize for a pointer-typed global field. When it is
    /// not computable now, a post-init statement patches the target address
    /// and zero is written instead.
    pub(super) fn const_as_offset(
        &mut self,
        target: &Constant,
        absolute_target: u32,
    ) -> Result<u32, CodegenError> {
        match target {
            Constant::Function(f) => {
                if self.opts.relocatable {
                    let slot = self.relocate_global(absolute_target.to_string());
                    let index = self.function_index(*f)?.to_string();
                    let index = self.relocate_function_pointer(index);
                    self.post_sets
                        .push(format!(" HEAP32[{slot} >> 2] = {index};"));
                    return Ok(0);
                }
                self.function_index(*f)
            }
            Constant::BlockAddress { func, block } => Ok(self.block_address(*func, *block)),
            Constant::Global(g) => {
                let global = self.module.global(*g);
                if global.is_declaration() {
                    // An external value; all postsets are pointers, hence
                    // 32-bit.
                    let name = self.js_global_name(*g);
                    self.externals.insert(name.clone());
                    let slot = self.relocate_global(absolute_target.to_string());
                    if self.opts.relocatable {
                        self.post_sets.push(format!(" temp = g${name}() | 0;"));
                        let access = format!("HEAP32[{slot} >> 2]");
                        self.post_sets
                            .push(format!(" {access} = ({access} | 0) + temp;"));
                    } else {
                        self.post_sets.push(format!(" HEAP32[{slot} >> 2] = {name};"));
                    }
                    return Ok(0);
                }
                if self.opts.relocatable {
                    // One of ours, but it moves with the data base; add it
                    // in at post-init time.
                    let slot = self.relocate_global(absolute_target.to_string());
                    let access = format!("HEAP32[{slot} >> 2]");
                    let addr = self.global_address(&self.global_names[g.index()])?;
                    let value = self.relocate_global(addr.to_string());
                    self.post_sets
                        .push(format!(" {access} = ({access} | 0) + {value};"));
                    return Ok(0);
                }
                self.global_address(&self.global_names[g.index()])
            }
            _ => Err(CodegenError::UnsupportedConstant("pointer initializer")),
        }
    }
}

fn ptr_fields(init: &Initializer) -> Vec<&PtrInit> {
    match init {
        Initializer::Struct(fields) => fields
            .iter()
            .filter_map(|f| match f {
                InitField::Ptr(p) => Some(p),
                _ => None,
            })
            .collect(),
        Initializer::Ptr(p) => vec![p],
        _ => Vec::new(),
    }
}
