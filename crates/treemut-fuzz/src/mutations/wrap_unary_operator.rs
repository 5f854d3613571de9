//! Wrap an expression in a type-preserving unary operator.

use crate::analysis::operators::wrap_operators;
use crate::analysis::{ExpressionSize, ParentMap};
use crate::finders::MutationFinder;
use crate::mutation::{source_node, Mutation};
use crate::random::{pick, RandomSource};
use serde::{Deserialize, Serialize};
use treemut_core::{MutationKind, NodeId};
use treemut_ir::{CloneContext, NodeIdMap, NodeIndex, NodeKind, Program, UnaryOp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapUnaryOperator {
    pub expression_id: NodeId,
    /// Id given to the new unary node
    pub fresh_id: NodeId,
    pub unary_op: UnaryOp,
}

/// Operators that may wrap `expr` where it stands
fn wrappers(program: &Program, parents: &ParentMap, expr: NodeIndex) -> Vec<UnaryOp> {
    if !program.kind(expr).is_expression() || parents.is_reference_position(program, expr) {
        return Vec::new();
    }
    // call statements need a bare call; selectors and attribute arguments stay literal
    let pinned = parents.parent(expr).map_or(true, |parent| {
        matches!(
            program.kind(parent),
            NodeKind::CallStmt { .. } | NodeKind::Case { .. } | NodeKind::Attribute { .. }
        )
    });
    if pinned {
        return Vec::new();
    }
    program
        .semantics()
        .type_of(expr)
        .map(wrap_operators)
        .unwrap_or_default()
}

impl WrapUnaryOperator {
    pub fn is_applicable(&self, program: &Program, ids: &NodeIdMap) -> bool {
        let Some(expr) = ids.get_node(self.expression_id) else {
            return false;
        };
        if !ids.is_fresh(self.fresh_id) {
            return false;
        }
        let parents = ParentMap::new(program);
        wrappers(program, &parents, expr).contains(&self.unary_op)
    }

    pub fn apply(&self, ctx: &mut CloneContext<'_>) {
        let expr = source_node(ctx, self.expression_id);
        let op = self.unary_op;
        let fresh_id = self.fresh_id;
        ctx.replace_with(expr, move |ctx| {
            let operand = ctx.clone_without_transform(expr);
            let span = ctx.src().node(expr).span;
            let wrapper = ctx.dst().push_spanned(NodeKind::Unary { op, operand }, span);
            // a shared expression is wrapped once per slot; the first wrapper takes the pinned id
            // and the rest get ids minted at finish
            if ctx.dst_ids().is_fresh(fresh_id) {
                ctx.dst_ids().add(wrapper, fresh_id);
            }
            wrapper
        });
    }
}

/// Proposes a wrapper for every expression that stays within the size bound
pub struct WrapUnaryOperatorFinder {
    pub max_expression_size: usize,
}

impl MutationFinder for WrapUnaryOperatorFinder {
    fn kind(&self) -> MutationKind {
        MutationKind::WrapUnaryOperator
    }

    fn find_mutations(
        &self,
        program: &Program,
        ids: &NodeIdMap,
        rng: &mut dyn RandomSource,
    ) -> Vec<Mutation> {
        let parents = ParentMap::new(program);
        let sizes = ExpressionSize::new(program);
        let mut reserved = ids.clone();
        let mut found = Vec::new();
        for expr in program.reachable_nodes() {
            if sizes.size(expr) + 1 > self.max_expression_size {
                continue;
            }
            let ops = wrappers(program, &parents, expr);
            if let Some(op) = pick(rng, &ops) {
                found.push(Mutation::WrapUnaryOperator(WrapUnaryOperator {
                    expression_id: ids.get_id(expr),
                    fresh_id: reserved.take_fresh_id(),
                    unary_op: *op,
                }));
            }
        }
        found
    }
}
