//! Predecessors, block order and dominators of a function's blocks.

use std::collections::HashMap;

use super::{function::BasicBlock, operand::Label};

/// The control flow graph of a list of blocks whose first block is the entry.
///
/// Branches to labels that are not in the list are ignored.
#[derive(Debug)]
pub(crate) struct ControlFlowGraph<'a> {
    blocks: &'a [BasicBlock],
    index: HashMap<&'a Label, usize>,
    /// One entry per incoming edge, so a block reached twice from the same
    /// terminator lists that predecessor twice.
    predecessors: Vec<Vec<usize>>,
    reverse_postorder: Vec<usize>,
    /// `None` for blocks unreachable from the entry.
    idom: Vec<Option<usize>>,
}

impl<'a> ControlFlowGraph<'a> {
    pub(crate) fn new(blocks: &'a [BasicBlock]) -> Self {
        let index: HashMap<&Label, usize> = blocks
            .iter()
            .enumerate()
            .map(|(i, block)| (block.label(), i))
            .collect();

        let successors: Vec<Vec<usize>> = blocks
            .iter()
            .map(|block| {
                block
                    .terminator()
                    .successors()
                    .into_iter()
                    .filter_map(|label| index.get(label).copied())
                    .collect()
            })
            .collect();

        let mut predecessors = vec![Vec::new(); blocks.len()];
        for (block, targets) in successors.iter().enumerate() {
            for &target in targets {
                predecessors[target].push(block);
            }
        }

        let reverse_postorder = reverse_postorder(&successors);
        let idom = immediate_dominators(&predecessors, &reverse_postorder);

        Self {
            blocks,
            index,
            predecessors,
            reverse_postorder,
            idom,
        }
    }

    pub(crate) fn block(&self, block: usize) -> &'a BasicBlock {
        &self.blocks[block]
    }

    pub(crate) fn index(&self, label: &Label) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub(crate) fn predecessors(&self, block: usize) -> &[usize] {
        &self.predecessors[block]
    }

    /// Reachable blocks, each after the blocks dominating it.
    pub(crate) fn reverse_postorder(&self) -> &[usize] {
        &self.reverse_postorder
    }

    pub(crate) fn is_reachable(&self, block: usize) -> bool {
        self.idom[block].is_some()
    }

    /// Whether every path from the entry to `b` goes through `a`. A block dominates itself.
    pub(crate) fn dominates(&self, a: usize, b: usize) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom[current] {
                Some(dom) if dom != current => current = dom,
                _ => return false,
            }
        }
    }
}

fn reverse_postorder(successors: &[Vec<usize>]) -> Vec<usize> {
    let mut order = Vec::with_capacity(successors.len());
    if successors.is_empty() {
        return order;
    }

    let mut visited = vec![false; successors.len()];
    visited[0] = true;
    let mut stack = vec![(0, 0)];

    while let Some((block, next)) = stack.pop() {
        if let Some(&target) = successors[block].get(next) {
            stack.push((block, next + 1));
            if !visited[target] {
                visited[target] = true;
                stack.push((target, 0));
            }
        } else {
            order.push(block);
        }
    }

    order.reverse();
    order
}

/// Cooper, Harvey and Kennedy, "A Simple, Fast Dominance Algorithm".
fn immediate_dominators(predecessors: &[Vec<usize>], rpo: &[usize]) -> Vec<Option<usize>> {
    let mut idom = vec![None; predecessors.len()];
    let Some(&entry) = rpo.first() else {
        return idom;
    };
    idom[entry] = Some(entry);

    let mut rpo_position = vec![usize::MAX; predecessors.len()];
    for (position, &block) in rpo.iter().enumerate() {
        rpo_position[block] = position;
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &block in &rpo[1..] {
            let mut processed = predecessors[block]
                .iter()
                .copied()
                .filter(|&pred| idom[pred].is_some());
            let Some(first) = processed.next() else {
                continue;
            };
            let new_idom =
                processed.fold(first, |a, b| intersect(a, b, &idom, &rpo_position));

            if idom[block] != Some(new_idom) {
                idom[block] = Some(new_idom);
                changed = true;
            }
        }
    }

    idom
}

fn intersect(mut a: usize, mut b: usize, idom: &[Option<usize>], rpo_position: &[usize]) -> usize {
    while a != b {
        while rpo_position[a] > rpo_position[b] {
            let Some(next) = idom[a] else {
                return a;
            };
            a = next;
        }
        while rpo_position[b] > rpo_position[a] {
            let Some(next) = idom[b] else {
                return b;
            };
            b = next;
        }
    }
    a
}
