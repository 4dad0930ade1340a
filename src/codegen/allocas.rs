//! Stack frame planning for static allocas.
//!
//! Entry-block, constant-size allocas are packed into one frame reserved in
//! the prologue. Allocas of the same alignment whose lifetimes (from the
//! lifetime markers, widened by any use outside them) do not overlap share
//! an offset; the later one resolves to the earlier one's name. Allocas
//! whose address never escapes and whose type is a plain scalar are
//! "nativized" into ordinary locals instead.

use std::collections::{HashMap, HashSet};

use crate::config::STACK_ALIGN;
use crate::ir::{
    for_each_operand, for_each_term_operand, AllocaElem, Function, InstKind, Operand, ValueId,
};

fn align_up(value: u32, align: u32) -> u32 {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    start: usize,
    end: usize,
}

impl Interval {
    fn overlaps(self, other: Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Default)]
pub(crate) struct AllocaPlan {
    offsets: HashMap<ValueId, u32>,
    reps: HashMap<ValueId, ValueId>,
    frame_size: u32,
    max_align: u32,
}

impl AllocaPlan {
    /// Frame offset of an alloca that owns its slot.
    pub fn frame_offset(&self, v: ValueId) -> Option<u32> {
        self.offsets.get(&v).copied()
    }

    /// The alloca this one was folded into, if any.
    pub fn representative(&self, v: ValueId) -> Option<ValueId> {
        self.reps.get(&v).copied()
    }

    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    pub fn max_align(&self) -> u32 {
        self.max_align
    }

    pub fn analyze(func: &Function, nativized: &HashSet<ValueId>, coalesce: bool) -> AllocaPlan {
        let mut plan = AllocaPlan::default();
        if func.blocks.is_empty() {
            return plan;
        }

        // Static allocas: entry block, constant size.
        struct Static {
            value: ValueId,
            size: u32,
            align: u32,
        }
        let mut statics = Vec::new();
        for inst in &func.blocks[0].insts {
            if let InstKind::Alloca { elem, count, align } = &inst.kind {
                let (result, count) = match (inst.result, count.as_const_int()) {
                    (Some(r), Some(c)) => (r, c),
                    _ => continue,
                };
                let align = (*align).max(1);
                plan.max_align = plan.max_align.max(align);
                if nativized.contains(&result) {
                    continue;
                }
                statics.push(Static {
                    value: result,
                    size: elem.size_bytes().saturating_mul(count as u32),
                    align,
                });
            }
        }
        if statics.is_empty() {
            return plan;
        }

        let intervals = live_intervals(func, statics.iter().map(|s| s.value).collect());

        // Greedy packing: reuse a slot when alignment matches, the slot is
        // large enough, and no member's lifetime overlaps.
        struct Slot {
            rep: ValueId,
            size: u32,
            align: u32,
            members: Vec<Interval>,
        }
        let mut slots: Vec<Slot> = Vec::new();
        for s in &statics {
            let interval = intervals[&s.value];
            let mut placed = false;
            if coalesce {
                for slot in slots.iter_mut() {
                    if slot.align == s.align
                        && slot.size >= s.size
                        && slot.members.iter().all(|m| !m.overlaps(interval))
                    {
                        slot.members.push(interval);
                        plan.reps.insert(s.value, slot.rep);
                        placed = true;
                        break;
                    }
                }
            }
            if !placed {
                slots.push(Slot {
                    rep: s.value,
                    size: s.size,
                    align: s.align,
                    members: vec![interval],
                });
            }
        }

        let mut cur = 0u32;
        for slot in &slots {
            cur = align_up(cur, slot.align);
            plan.offsets.insert(slot.rep, cur);
            cur += slot.size;
        }
        plan.frame_size = align_up(cur, STACK_ALIGN);
        plan
    }
}

/// Live intervals over a block-major linearization. A marker pair narrows
/// the interval; any use outside the markers widens it back.
fn live_intervals(
    func: &Function,
    tracked: HashSet<ValueId>,
) -> HashMap<ValueId, Interval> {
    struct Obs {
        marker_start: Option<usize>,
        marker_end: Option<usize>,
        first_use: Option<usize>,
        last_use: Option<usize>,
    }
    let mut observed: HashMap<ValueId, Obs> = tracked
        .iter()
        .map(|v| {
            (
                *v,
                Obs {
                    marker_start: None,
                    marker_end: None,
                    first_use: None,
                    last_use: None,
                },
            )
        })
        .collect();

    let mut pos = 0usize;
    for block in &func.blocks {
        for inst in &block.insts {
            match &inst.kind {
                InstKind::LifetimeStart { ptr: Operand::Value(v) } if tracked.contains(v) => {
                    if let Some(obs) = observed.get_mut(v) {
                        if obs.marker_start.is_none() {
                            obs.marker_start = Some(pos);
                        }
                    }
                }
                InstKind::LifetimeEnd { ptr: Operand::Value(v) } if tracked.contains(v) => {
                    if let Some(obs) = observed.get_mut(v) {
                        obs.marker_end = Some(pos);
                    }
                }
                kind => {
                    for_each_operand(kind, |op| {
                        if let Operand::Value(v) = op {
                            if let Some(obs) = observed.get_mut(v) {
                                if obs.first_use.is_none() {
                                    obs.first_use = Some(pos);
                                }
                                obs.last_use = Some(pos);
                            }
                        }
                    });
                }
            }
            pos += 1;
        }
        for_each_term_operand(&block.term, |op| {
            if let Operand::Value(v) = op {
                if let Some(obs) = observed.get_mut(v) {
                    if obs.first_use.is_none() {
                        obs.first_use = Some(pos);
                    }
                    obs.last_use = Some(pos);
                }
            }
        });
        pos += 1;
    }

    observed
        .into_iter()
        .map(|(v, obs)| {
            let start = match (obs.marker_start, obs.first_use) {
                (Some(m), Some(u)) => m.min(u),
                (Some(m), None) => m,
                (None, _) => 0,
            };
            let end = match (obs.marker_end, obs.last_use) {
                (Some(m), Some(u)) => m.max(u),
                (Some(m), None) => m,
                (None, _) => usize::MAX,
            };
            (v, Interval { start, end })
        })
        .collect()
}

/// Allocas that can live in a scalar local: the address is only ever loaded
/// from or stored to (never stored itself, never anything else), and the
/// allocated type is a non-vector scalar.
pub(super) fn calculate_nativized(func: &Function) -> HashSet<ValueId> {
    let mut candidates: HashSet<ValueId> = HashSet::new();
    for block in &func.blocks {
        for inst in &block.insts {
            if let InstKind::Alloca { elem, .. } = &inst.kind {
                let ok = match elem {
                    AllocaElem::Scalar(ty) => !ty.is_vec(),
                    AllocaElem::Blob { .. } => false,
                };
                if ok {
                    if let Some(result) = inst.result {
                        candidates.insert(result);
                    }
                }
            }
        }
    }
    if candidates.is_empty() {
        return candidates;
    }

    let mut failed: HashSet<ValueId> = HashSet::new();
    for block in &func.blocks {
        for inst in &block.insts {
            match &inst.kind {
                InstKind::Load { ptr: Operand::Value(_), .. } => {}
                InstKind::Store { value, .. } => {
                    // A store *to* the slot is fine; a store *of* its
                    // address escapes it.
                    if let Operand::Value(v) = value {
                        failed.insert(*v);
                    }
                }
                kind => {
                    for_each_operand(kind, |op| {
                        if let Operand::Value(v) = op {
                            failed.insert(*v);
                        }
                    });
                }
            }
        }
        for_each_term_operand(&block.term, |op| {
            if let Operand::Value(v) = op {
                failed.insert(*v);
            }
        });
    }
    candidates.retain(|v| !failed.contains(v));
    candidates
}
