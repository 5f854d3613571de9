//! Swap the operator of a binary expression.

use crate::analysis::operators::{binary_operator_replacements, can_replace_binary_operator};
use crate::finders::MutationFinder;
use crate::mutation::{source_node, Mutation};
use crate::random::{pick, RandomSource};
use serde::{Deserialize, Serialize};
use treemut_core::{MutationKind, NodeId};
use treemut_ir::{BinaryOp, CloneContext, NodeIdMap, NodeKind, NodeTag, Program};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBinaryOperator {
    pub binary_expr_id: NodeId,
    pub new_operator: BinaryOp,
}

impl ChangeBinaryOperator {
    pub fn is_applicable(&self, program: &Program, ids: &NodeIdMap) -> bool {
        ids.get_node(self.binary_expr_id)
            .map_or(false, |expr| can_replace_binary_operator(program, expr, self.new_operator))
    }

    pub fn apply(&self, ctx: &mut CloneContext<'_>) {
        let expr = source_node(ctx, self.binary_expr_id);
        let op = self.new_operator;
        ctx.replace_with(expr, move |ctx| {
            let src = ctx.src();
            let NodeKind::Binary { lhs, rhs, .. } = src.kind(expr) else {
                panic!("{} is not a binary expression", expr);
            };
            let lhs = ctx.clone_node(*lhs);
            let rhs = ctx.clone_node(*rhs);
            ctx.dst()
                .push_spanned(NodeKind::Binary { op, lhs, rhs }, src.node(expr).span)
        });
    }
}

/// Proposes one random type-preserving operator for every binary expression
pub struct ChangeBinaryOperatorFinder;

impl MutationFinder for ChangeBinaryOperatorFinder {
    fn kind(&self) -> MutationKind {
        MutationKind::ChangeBinaryOperator
    }

    fn find_mutations(
        &self,
        program: &Program,
        ids: &NodeIdMap,
        rng: &mut dyn RandomSource,
    ) -> Vec<Mutation> {
        let mut found = Vec::new();
        for expr in program.reachable_nodes() {
            if program.kind(expr).tag() != NodeTag::Binary {
                continue;
            }
            let candidates = binary_operator_replacements(program, expr);
            if let Some(op) = pick(rng, &candidates) {
                found.push(Mutation::ChangeBinaryOperator(ChangeBinaryOperator {
                    binary_expr_id: ids.get_id(expr),
                    new_operator: *op,
                }));
            }
        }
        found
    }
}
