//! Child-to-parent links for one program snapshot.

use std::collections::HashMap;
use treemut_ir::{NodeIndex, NodeKind, NodeTag, Program};

#[derive(Debug, Clone, Default)]
pub struct ParentMap {
    parents: HashMap<NodeIndex, NodeIndex>,
}

impl ParentMap {
    /// Link every reachable node to the first parent that reaches it in pre-order
    pub fn new(program: &Program) -> Self {
        let mut parents = HashMap::new();
        for idx in program.reachable_nodes() {
            for child in program.kind(idx).children() {
                parents.entry(child).or_insert(idx);
            }
        }
        Self { parents }
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.parents.get(&idx).copied()
    }

    /// Strict ancestors, innermost first
    pub fn ancestors(&self, idx: NodeIndex) -> Ancestors<'_> {
        Ancestors {
            parents: self,
            current: idx,
        }
    }

    /// Innermost statement that is or contains `idx`, stopping at function boundaries
    pub fn enclosing_statement(&self, program: &Program, idx: NodeIndex) -> Option<NodeIndex> {
        std::iter::once(idx)
            .chain(self.ancestors(idx))
            .take_while(|n| !matches!(program.kind(*n).tag(), NodeTag::Function | NodeTag::Module))
            .find(|n| program.kind(*n).is_statement())
    }

    pub fn enclosing_function(&self, program: &Program, idx: NodeIndex) -> Option<NodeIndex> {
        std::iter::once(idx)
            .chain(self.ancestors(idx))
            .find(|n| program.kind(*n).tag() == NodeTag::Function)
    }

    /// True if `expr` is written to or addressed as a memory location.
    ///
    /// Covers assignment targets and the objects of member and index accesses on such
    /// targets. Wrapping one of these in an operator would turn it into a value.
    pub fn is_reference_position(&self, program: &Program, expr: NodeIndex) -> bool {
        let Some(parent) = self.parent(expr) else {
            return false;
        };
        match program.kind(parent) {
            NodeKind::Assign { lhs, .. } | NodeKind::CompoundAssign { lhs, .. } => *lhs == expr,
            NodeKind::Increment { target, .. } => *target == expr,
            NodeKind::Member { object, .. } | NodeKind::Index { object, .. } if *object == expr => {
                self.is_reference_position(program, parent)
            }
            _ => false,
        }
    }
}

pub struct Ancestors<'a> {
    parents: &'a ParentMap,
    current: NodeIndex,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let parent = self.parents.parent(self.current)?;
        self.current = parent;
        Some(parent)
    }
}
