//! Contract with the structured-control-flow reconstructor.
//!
//! The reconstruction algorithm itself is an external collaborator; the code
//! generator only depends on this interface: register blocks with their body
//! text (and optional switch variable), register branches with optional
//! condition and phi-epilogue text, then render the structured body.
//!
//! `LabelSwitch` is the in-tree implementation of the contract: a label
//! variable dispatched in a `while (1) switch (label | 0)` loop. It produces
//! correct (if unoptimized) structure for any graph, which keeps the crate
//! usable end to end without the external reconstructor.

pub type BlockHandle = usize;

pub trait StructuredCfg {
    /// Hint that the enclosing function is optimized for size.
    fn set_min_size(&mut self, min_size: bool);

    /// Registers a block body. `branch_var` is the rendered condition
    /// variable for blocks that dispatch over one (switch, indirect branch).
    fn add_block(&mut self, body: String, branch_var: Option<String>) -> BlockHandle;

    /// Registers an outgoing edge. `condition` is either a boolean
    /// expression, a `case N: ` label sequence (when the source block has a
    /// branch variable), or `None` for the default edge. `phi_code` runs
    /// when the edge is taken, before control transfers.
    fn add_branch(
        &mut self,
        from: BlockHandle,
        to: BlockHandle,
        condition: Option<String>,
        phi_code: Option<String>,
    );

    /// Renders the structured body starting from `entry`. Uses the `label`
    /// variable, which the caller declares.
    fn render(&mut self, entry: BlockHandle) -> String;
}

struct Branch {
    to: BlockHandle,
    condition: Option<String>,
    phi_code: Option<String>,
}

struct BlockInfo {
    body: String,
    branch_var: Option<String>,
    branches: Vec<Branch>,
}

#[derive(Default)]
pub struct LabelSwitch {
    blocks: Vec<BlockInfo>,
    min_size: bool,
}

impl LabelSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    fn indent(&self) -> &'static str {
        if self.min_size {
            ""
        } else {
            " "
        }
    }

    fn render_jump(&self, out: &mut String, branch: &Branch) {
        out.push_str("{ ");
        if let Some(phi) = &branch.phi_code {
            out.push_str(phi);
            if !phi.ends_with(';') {
                out.push(';');
            }
            out.push(' ');
        }
        out.push_str(&format!("label = {}; break; }}", branch.to + 1));
    }
}

impl StructuredCfg for LabelSwitch {
    fn set_min_size(&mut self, min_size: bool) {
        self.min_size = min_size;
    }

    fn add_block(&mut self, body: String, branch_var: Option<String>) -> BlockHandle {
        self.blocks.push(BlockInfo {
            body,
            branch_var,
            branches: Vec::new(),
        });
        self.blocks.len() - 1
    }

    fn add_branch(
        &mut self,
        from: BlockHandle,
        to: BlockHandle,
        condition: Option<String>,
        phi_code: Option<String>,
    ) {
        self.blocks[from].branches.push(Branch {
            to,
            condition,
            phi_code,
        });
    }

    fn render(&mut self, entry: BlockHandle) -> String {
        let ind = self.indent();
        let mut out = String::new();
        out.push_str(&format!("{}label = {};\n", ind, entry + 1));
        out.push_str(&format!("{}while (1) switch (label | 0) {{\n", ind));
        for (i, block) in self.blocks.iter().enumerate() {
            out.push_str(&format!("{}case {}: {{\n", ind, i + 1));
            out.push_str(&block.body);
            if let Some(var) = &block.branch_var {
                // Dispatch over the block's condition variable; conditions
                // arrive as "case N: " label sequences.
                out.push_str(&format!("{}switch ({}) {{\n", ind, var));
                for branch in block.branches.iter().filter(|b| b.condition.is_some()) {
                    out.push_str(ind);
                    out.push_str(branch.condition.as_deref().unwrap_or(""));
                    self.render_jump(&mut out, branch);
                    out.push('\n');
                }
                for branch in block.branches.iter().filter(|b| b.condition.is_none()) {
                    out.push_str(ind);
                    out.push_str("default: ");
                    self.render_jump(&mut out, branch);
                    out.push('\n');
                }
                out.push_str(&format!("{}}}\n{}break;\n", ind, ind));
            } else {
                let mut wrote_default = false;
                for branch in block.branches.iter().filter(|b| b.condition.is_some()) {
                    out.push_str(&format!(
                        "{}if ({}) ",
                        ind,
                        branch.condition.as_deref().unwrap_or("")
                    ));
                    self.render_jump(&mut out, branch);
                    out.push('\n');
                }
                for branch in block.branches.iter().filter(|b| b.condition.is_none()) {
                    out.push_str(ind);
                    self.render_jump(&mut out, branch);
                    out.push('\n');
                    wrote_default = true;
                }
                if !wrote_default {
                    // Terminal block (return or unreachable); keep the case
                    // from falling through.
                    out.push_str(&format!("{}break;\n", ind));
                }
            }
            out.push_str(&format!("{}}}\n", ind));
        }
        out.push_str(&format!("{}}}\n", ind));
        out
    }
}
