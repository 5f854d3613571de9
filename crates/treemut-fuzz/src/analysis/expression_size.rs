//! Node counts of expression subtrees.

use std::collections::HashMap;
use treemut_ir::{NodeIndex, Program};

/// Memoized size of every expression in a program
#[derive(Debug, Clone, Default)]
pub struct ExpressionSize {
    sizes: HashMap<NodeIndex, usize>,
}

impl ExpressionSize {
    pub fn new(program: &Program) -> Self {
        let mut this = Self::default();
        for idx in program.reachable_nodes() {
            if program.kind(idx).is_expression() {
                this.measure(program, idx);
            }
        }
        this
    }

    fn measure(&mut self, program: &Program, expr: NodeIndex) -> usize {
        if let Some(size) = self.sizes.get(&expr) {
            return *size;
        }
        let size = 1 + program
            .kind(expr)
            .children()
            .into_iter()
            .map(|c| self.measure(program, c))
            .sum::<usize>();
        self.sizes.insert(expr, size);
        size
    }

    /// Number of nodes in the subtree rooted at `expr`, or 0 if `expr` is not an expression
    pub fn size(&self, expr: NodeIndex) -> usize {
        self.sizes.get(&expr).copied().unwrap_or(0)
    }
}
