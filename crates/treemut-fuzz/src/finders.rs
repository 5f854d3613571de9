//! Scanners that enumerate applicable mutations of one kind.

use crate::mutation::Mutation;
use crate::mutations::{
    ChangeBinaryOperatorFinder, ChangeUnaryOperatorFinder, DeleteStatementFinder,
    ReplaceIdentifierFinder, WrapUnaryOperatorFinder,
};
use crate::probability::ProbabilityContext;
use crate::random::RandomSource;
use treemut_core::{MutationKind, MutatorConfig};
use treemut_ir::{NodeIdMap, Program};

/// Finds every mutation of one kind that currently applies to a program.
///
/// Finders never change `ids`; any fresh ids they put into a mutation are reserved on a
/// private copy of the map, so the same ids come out again when the mutation is applied.
pub trait MutationFinder {
    fn kind(&self) -> MutationKind;

    fn find_mutations(
        &self,
        program: &Program,
        ids: &NodeIdMap,
        rng: &mut dyn RandomSource,
    ) -> Vec<Mutation>;

    /// Percent chance, `0..=100`, that each found mutation is attempted
    fn chance_of_applying(&self, probabilities: &ProbabilityContext) -> u32 {
        probabilities.chance_of(self.kind())
    }
}

/// The finder for `kind`, configured from `config`
pub fn finder_for(kind: MutationKind, config: &MutatorConfig) -> Box<dyn MutationFinder> {
    match kind {
        MutationKind::ChangeBinaryOperator => Box::new(ChangeBinaryOperatorFinder),
        MutationKind::ChangeUnaryOperator => Box::new(ChangeUnaryOperatorFinder),
        MutationKind::DeleteStatement => Box::new(DeleteStatementFinder),
        MutationKind::ReplaceIdentifier => Box::new(ReplaceIdentifierFinder),
        MutationKind::WrapUnaryOperator => Box::new(WrapUnaryOperatorFinder {
            max_expression_size: config.max_expression_size,
        }),
    }
}
