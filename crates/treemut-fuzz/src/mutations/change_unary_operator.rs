//! Toggle the operator of a unary expression.

use crate::analysis::operators::{can_replace_unary_operator, unary_operator_replacements};
use crate::finders::MutationFinder;
use crate::mutation::{source_node, Mutation};
use crate::random::{pick, RandomSource};
use serde::{Deserialize, Serialize};
use treemut_core::{MutationKind, NodeId};
use treemut_ir::{CloneContext, NodeIdMap, NodeKind, NodeTag, Program, UnaryOp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeUnaryOperator {
    pub unary_expr_id: NodeId,
    pub new_operator: UnaryOp,
}

impl ChangeUnaryOperator {
    pub fn is_applicable(&self, program: &Program, ids: &NodeIdMap) -> bool {
        ids.get_node(self.unary_expr_id)
            .map_or(false, |expr| can_replace_unary_operator(program, expr, self.new_operator))
    }

    pub fn apply(&self, ctx: &mut CloneContext<'_>) {
        let expr = source_node(ctx, self.unary_expr_id);
        let op = self.new_operator;
        ctx.replace_with(expr, move |ctx| {
            let src = ctx.src();
            let NodeKind::Unary { operand, .. } = src.kind(expr) else {
                panic!("{} is not a unary expression", expr);
            };
            let operand = ctx.clone_node(*operand);
            ctx.dst()
                .push_spanned(NodeKind::Unary { op, operand }, src.node(expr).span)
        });
    }
}

pub struct ChangeUnaryOperatorFinder;

impl MutationFinder for ChangeUnaryOperatorFinder {
    fn kind(&self) -> MutationKind {
        MutationKind::ChangeUnaryOperator
    }

    fn find_mutations(
        &self,
        program: &Program,
        ids: &NodeIdMap,
        rng: &mut dyn RandomSource,
    ) -> Vec<Mutation> {
        program
            .reachable_nodes()
            .into_iter()
            .filter(|expr| program.kind(*expr).tag() == NodeTag::Unary)
            .filter_map(|expr| {
                let candidates = unary_operator_replacements(program, expr);
                pick(rng, &candidates).map(|op| {
                    Mutation::ChangeUnaryOperator(ChangeUnaryOperator {
                        unary_expr_id: ids.get_id(expr),
                        new_operator: *op,
                    })
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::fixtures::{apply, id, ids_of, print};
    use crate::random::ChaChaSource;
    use treemut_ir::{ProgramBuilder, Resolver, ScalarType, Type};

    #[test]
    fn test_negation_becomes_complement() {
        let mut b = ProgramBuilder::new();
        let x = b.ident("x");
        let neg = b.unary(UnaryOp::Negation, x);
        let ret = b.return_stmt(Some(neg));
        let body = b.block(vec![ret]);
        let px = b.param("x", Type::vec(2, ScalarType::I32));
        let f = b.function("f", vec![px], Some(Type::vec(2, ScalarType::I32)), body);
        let program = b.build(vec![f], &Resolver::new());
        let ids = ids_of(&program);

        let m = Mutation::ChangeUnaryOperator(ChangeUnaryOperator {
            unary_expr_id: id(&ids, neg),
            new_operator: UnaryOp::Complement,
        });
        let (out, _) = apply(&program, &ids, &m);
        assert!(print(&out).contains("return ~(x);"), "{}", print(&out));

        let back = ChangeUnaryOperator {
            unary_expr_id: id(&ids, neg),
            new_operator: UnaryOp::Negation,
        };
        assert!(!back.is_applicable(&program, &ids));
    }

    #[test]
    fn test_float_and_bool_operators_stay() {
        let mut b = ProgramBuilder::new();
        let one = b.lit_f32(1.0);
        let neg = b.unary(UnaryOp::Negation, one);
        let v = b.let_decl("v", neg);
        let t = b.lit_bool(true);
        let not = b.unary(UnaryOp::Not, t);
        let w = b.let_decl("w", not);
        let body = b.block(vec![v, w]);
        let f = b.function("f", vec![], None, body);
        let program = b.build(vec![f], &Resolver::new());
        let ids = ids_of(&program);

        let mut rng = ChaChaSource::seeded(9);
        assert!(ChangeUnaryOperatorFinder
            .find_mutations(&program, &ids, &mut rng)
            .is_empty());
        let to_complement = ChangeUnaryOperator {
            unary_expr_id: id(&ids, neg),
            new_operator: UnaryOp::Complement,
        };
        assert!(!to_complement.is_applicable(&program, &ids));
    }
}
