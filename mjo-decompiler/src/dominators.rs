//! Immediate dominators by the Cooper-Harvey-Kennedy iteration over reverse
//! post-order.
use mjo_ir::{BlockId, Function};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dominators {
    /// Immediate dominator per block; the entry maps to itself and
    /// unreachable blocks to `None`.
    idom: Vec<Option<BlockId>>,
}

impl Dominators {
    pub fn compute(function: &Function) -> Self {
        let count = function.blocks.len();
        if count == 0 {
            return Self { idom: Vec::new() };
        }
        let rpo = reverse_post_order(function);
        let mut position = vec![usize::MAX; count];
        for (i, &b) in rpo.iter().enumerate() {
            position[b] = i;
        }

        let mut idom: Vec<Option<BlockId>> = vec![None; count];
        idom[rpo[0]] = Some(rpo[0]);
        let mut changed = true;
        while changed {
            changed = false;
            for &b in &rpo[1..] {
                let mut new_idom: Option<BlockId> = None;
                for &p in &function.blocks[b].preds {
                    if idom[p].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => p,
                        Some(current) => intersect(&idom, &position, p, current),
                    });
                }
                if new_idom.is_some() && idom[b] != new_idom {
                    idom[b] = new_idom;
                    changed = true;
                }
            }
        }
        Self { idom }
    }

    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(block).copied().flatten()
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.immediate_dominator(block).is_some()
    }

    /// Whether every path from the entry to `b` passes through `a`.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.immediate_dominator(current) {
                Some(next) if next != current => current = next,
                _ => return false,
            }
        }
    }
}

fn intersect(idom: &[Option<BlockId>], position: &[usize], mut a: BlockId, mut b: BlockId) -> BlockId {
    while a != b {
        while position[a] > position[b] {
            a = idom[a].unwrap_or(a);
        }
        while position[b] > position[a] {
            b = idom[b].unwrap_or(b);
        }
    }
    a
}

/// Blocks reachable from the entry, in reverse post-order.
pub fn reverse_post_order(function: &Function) -> Vec<BlockId> {
    let count = function.blocks.len();
    let mut order = Vec::with_capacity(count);
    if count == 0 {
        return order;
    }
    let mut seen = vec![false; count];
    let mut stack = vec![(0usize, 0usize)];
    seen[0] = true;
    while let Some((block, next)) = stack.pop() {
        match function.blocks[block].succs.get(next) {
            Some(&succ) => {
                stack.push((block, next + 1));
                if !seen[succ] {
                    seen[succ] = true;
                    stack.push((succ, 0));
                }
            }
            None => order.push(block),
        }
    }
    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use mjo_ir::BasicBlock;

    fn function(edges: &[&[BlockId]]) -> Function {
        let mut f = Function::new(1);
        for (id, succs) in edges.iter().enumerate() {
            let mut b = BasicBlock::new(id, format!("b{id}"));
            b.succs = succs.to_vec();
            f.blocks.push(b);
        }
        for id in 0..edges.len() {
            for s in f.blocks[id].succs.clone() {
                f.blocks[s].preds.push(id);
            }
        }
        f
    }

    #[test]
    fn diamond() {
        let f = function(&[&[1, 2], &[3], &[3], &[]]);
        let doms = Dominators::compute(&f);
        assert_eq!(doms.immediate_dominator(0), Some(0));
        assert_eq!(doms.immediate_dominator(1), Some(0));
        assert_eq!(doms.immediate_dominator(2), Some(0));
        assert_eq!(doms.immediate_dominator(3), Some(0));
        assert!(!doms.dominates(1, 3));
    }

    #[test]
    fn loop_with_exit() {
        // 0 -> 1 -> 2 -> 1, 1 -> 3
        let f = function(&[&[1], &[2, 3], &[1], &[]]);
        let doms = Dominators::compute(&f);
        assert_eq!(doms.immediate_dominator(2), Some(1));
        assert_eq!(doms.immediate_dominator(3), Some(1));
        assert!(doms.dominates(1, 2));
        assert!(!doms.dominates(2, 3));
    }

    #[test]
    fn unreachable_blocks_have_no_dominator() {
        let f = function(&[&[], &[0]]);
        let doms = Dominators::compute(&f);
        assert!(doms.is_reachable(0));
        assert!(!doms.is_reachable(1));
        assert!(!doms.dominates(0, 1));
        assert_eq!(reverse_post_order(&f), vec![0]);
    }
}
