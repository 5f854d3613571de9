//! The closed set of program edits.

use crate::mutations::{
    ChangeBinaryOperator, ChangeUnaryOperator, DeleteStatement, ReplaceIdentifier,
    WrapUnaryOperator,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use treemut_core::{MutationKind, NodeId};
use treemut_ir::{CloneContext, NodeIdMap, NodeIndex, Program};

/// One edit, naming its targets by [`NodeId`] so it survives cloning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    ChangeBinaryOperator(ChangeBinaryOperator),
    ChangeUnaryOperator(ChangeUnaryOperator),
    DeleteStatement(DeleteStatement),
    ReplaceIdentifier(ReplaceIdentifier),
    WrapUnaryOperator(WrapUnaryOperator),
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::ChangeBinaryOperator(_) => MutationKind::ChangeBinaryOperator,
            Mutation::ChangeUnaryOperator(_) => MutationKind::ChangeUnaryOperator,
            Mutation::DeleteStatement(_) => MutationKind::DeleteStatement,
            Mutation::ReplaceIdentifier(_) => MutationKind::ReplaceIdentifier,
            Mutation::WrapUnaryOperator(_) => MutationKind::WrapUnaryOperator,
        }
    }

    /// True if applying to `program` would produce a valid program.
    ///
    /// Pure: probing a candidate never changes `program` or `ids`.
    pub fn is_applicable(&self, program: &Program, ids: &NodeIdMap) -> bool {
        match self {
            Mutation::ChangeBinaryOperator(m) => m.is_applicable(program, ids),
            Mutation::ChangeUnaryOperator(m) => m.is_applicable(program, ids),
            Mutation::DeleteStatement(m) => m.is_applicable(program, ids),
            Mutation::ReplaceIdentifier(m) => m.is_applicable(program, ids),
            Mutation::WrapUnaryOperator(m) => m.is_applicable(program, ids),
        }
    }

    /// Register this edit on a clone of the program it was checked against
    pub fn apply(&self, ctx: &mut CloneContext<'_>) {
        match self {
            Mutation::ChangeBinaryOperator(m) => m.apply(ctx),
            Mutation::ChangeUnaryOperator(m) => m.apply(ctx),
            Mutation::DeleteStatement(m) => m.apply(ctx),
            Mutation::ReplaceIdentifier(m) => m.apply(ctx),
            Mutation::WrapUnaryOperator(m) => m.apply(ctx),
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::ChangeBinaryOperator(m) => {
                write!(f, "{} {} -> {}", self.kind().name(), m.binary_expr_id, m.new_operator)
            }
            Mutation::ChangeUnaryOperator(m) => {
                write!(f, "{} {} -> {}", self.kind().name(), m.unary_expr_id, m.new_operator)
            }
            Mutation::DeleteStatement(m) => write!(f, "{} {}", self.kind().name(), m.statement_id),
            Mutation::ReplaceIdentifier(m) => {
                write!(f, "{} {} -> {}", self.kind().name(), m.use_id, m.replacement_id)
            }
            Mutation::WrapUnaryOperator(m) => write!(
                f,
                "{} {} in {} as {}",
                self.kind().name(),
                m.expression_id,
                m.unary_op,
                m.fresh_id
            ),
        }
    }
}

/// Node named by `id` in the source of `ctx`.
///
/// # Panics
///
/// If the id is unknown: the mutation was applied without checking applicability.
pub(crate) fn source_node(ctx: &CloneContext<'_>, id: NodeId) -> NodeIndex {
    match ctx.src_ids().get_node(id) {
        Some(node) => node,
        None => panic!(
            "mutation target {} does not exist in {}; applicability was not checked",
            id,
            ctx.src().id()
        ),
    }
}
