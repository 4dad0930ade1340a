//! Statements run after the static data image is loaded.
//!
//! Relocations and external-symbol addresses that cannot be serialized into
//! the memory initializer are resolved here. Emission order is insertion
//! order. The statements are split over `runPostSets`, `runPostSets1`, ...
//! so no single function grows slow to compile; each chunk tail-calls the
//! next.

#[derive(Debug, Default)]
pub(crate) struct PostInitQueue {
    stmts: Vec<String>,
}

impl PostInitQueue {
    pub fn push(&mut self, stmt: String) {
        self.stmts.push(stmt);
    }

    pub fn render_chunks(&mut self, relocatable: bool) -> String {
        const CHUNK: usize = 100;
        let stmts = std::mem::take(&mut self.stmts);
        let num = stmts.len();
        let mut out = String::new();
        let mut i = 0;
        let mut chunk = 0;
        loop {
            if chunk == 0 {
                out.push_str("function runPostSets() {\n");
            } else {
                out.push_str(&format!("function runPostSets{chunk}() {{\n"));
            }
            if relocatable {
                // Relocation calls go through a temp for heap-growth
                // validation.
                out.push_str(" var temp = 0;\n");
            }
            let j = (i + CHUNK).min(num);
            while i < j {
                out.push_str(&stmts[i]);
                out.push('\n');
                i += 1;
            }
            chunk += 1;
            if i < num {
                out.push_str(&format!(" runPostSets{chunk}();\n"));
            }
            out.push_str("}\n");
            if i >= num {
                break;
            }
        }
        out
    }
}
