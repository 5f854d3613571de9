//! Point an identifier at a different variable.

use crate::analysis::{declaration_name, visible_declarations, ParentMap};
use crate::finders::MutationFinder;
use crate::mutation::{source_node, Mutation};
use crate::random::{pick, RandomSource};
use serde::{Deserialize, Serialize};
use treemut_core::{MutationKind, NodeId};
use treemut_ir::{
    CloneContext, Mutability, NodeIdMap, NodeIndex, NodeKind, Program, StorageClass, Type,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaceIdentifier {
    /// The identifier expression to rewrite
    pub use_id: NodeId,
    /// The variable or parameter declaration it should name instead
    pub replacement_id: NodeId,
}

/// Type, mutability and storage of a declaration; parameters behave like function-scope `let`
fn declaration_class(
    program: &Program,
    decl: NodeIndex,
) -> Option<(Type, Mutability, StorageClass)> {
    let ty = program.semantics().decl_type(decl)?;
    match program.kind(decl) {
        NodeKind::Variable {
            mutability,
            storage,
            ..
        } => Some((ty, *mutability, *storage)),
        NodeKind::Param { .. } => Some((ty, Mutability::Let, StorageClass::Function)),
        _ => None,
    }
}

/// True if an identifier naming `current` may name `candidate` instead
fn interchangeable(program: &Program, current: NodeIndex, candidate: NodeIndex) -> bool {
    current != candidate
        && declaration_class(program, current).is_some()
        && declaration_class(program, current) == declaration_class(program, candidate)
}

/// Declarations the identifier `ident` may be switched to
fn replacement_candidates(
    program: &Program,
    parents: &ParentMap,
    ident: NodeIndex,
) -> Vec<NodeIndex> {
    if !matches!(program.kind(ident), NodeKind::Ident { .. }) {
        return Vec::new();
    }
    let Some(current) = program.semantics().declaration_of(ident) else {
        return Vec::new();
    };
    visible_declarations(program, parents, ident, |d| interchangeable(program, current, d))
}

impl ReplaceIdentifier {
    pub fn is_applicable(&self, program: &Program, ids: &NodeIdMap) -> bool {
        let (Some(ident), Some(replacement)) =
            (ids.get_node(self.use_id), ids.get_node(self.replacement_id))
        else {
            return false;
        };
        let parents = ParentMap::new(program);
        replacement_candidates(program, &parents, ident).contains(&replacement)
    }

    pub fn apply(&self, ctx: &mut CloneContext<'_>) {
        let ident = source_node(ctx, self.use_id);
        let replacement = source_node(ctx, self.replacement_id);
        let Some(name) = declaration_name(ctx.src(), replacement).map(str::to_string) else {
            panic!("{} does not name a declaration", self.replacement_id);
        };
        ctx.replace_with(ident, move |ctx| {
            let span = ctx.src().node(ident).span;
            ctx.dst().push_spanned(NodeKind::Ident { name: name.clone() }, span)
        });
    }
}

/// Proposes one random interchangeable variable for every identifier
pub struct ReplaceIdentifierFinder;

impl MutationFinder for ReplaceIdentifierFinder {
    fn kind(&self) -> MutationKind {
        MutationKind::ReplaceIdentifier
    }

    fn find_mutations(
        &self,
        program: &Program,
        ids: &NodeIdMap,
        rng: &mut dyn RandomSource,
    ) -> Vec<Mutation> {
        let parents = ParentMap::new(program);
        let mut found = Vec::new();
        for ident in program.reachable_nodes() {
            let candidates = replacement_candidates(program, &parents, ident);
            if let Some(replacement) = pick(rng, &candidates) {
                found.push(Mutation::ReplaceIdentifier(ReplaceIdentifier {
                    use_id: ids.get_id(ident),
                    replacement_id: ids.get_id(*replacement),
                }));
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::fixtures::{apply, id, ids_of, print};
    use crate::random::ChaChaSource;
    use treemut_ir::{ProgramBuilder, Resolver};

    struct Sample {
        program: Program,
        a_var: NodeIndex,
        b_var: NodeIndex,
        f_var: NodeIndex,
        p: NodeIndex,
        g: NodeIndex,
        lhs: NodeIndex,
        rhs: NodeIndex,
    }

    fn variable_of(program: &Program, decl_stmt: NodeIndex) -> NodeIndex {
        match program.kind(decl_stmt) {
            NodeKind::VarDecl { variable } => *variable,
            other => panic!("not a declaration: {:?}", other),
        }
    }

    // var<private> g : i32;
    // fn f(p : i32) {
    //   var a = 1i; var b = 2i; let c = 3i; var h = 1.0f;
    //   a = b;
    // }
    fn sample() -> Sample {
        let mut b = ProgramBuilder::new();
        let g = b.global_var("g", Type::I32, None);
        let p = b.param("p", Type::I32);
        let one = b.lit_i32(1);
        let a_decl = b.var_decl("a", one);
        let two = b.lit_i32(2);
        let b_decl = b.var_decl("b", two);
        let three = b.lit_i32(3);
        let c_decl = b.let_decl("c", three);
        let fl = b.lit_f32(1.0);
        let h_decl = b.var_decl("h", fl);
        let lhs = b.ident("a");
        let rhs = b.ident("b");
        let assign = b.assign(lhs, rhs);
        let body = b.block(vec![a_decl, b_decl, c_decl, h_decl, assign]);
        let f = b.function("f", vec![p], None, body);
        let program = b.build(vec![g, f], &Resolver::new());
        let a_var = variable_of(&program, a_decl);
        let b_var = variable_of(&program, b_decl);
        let f_var = variable_of(&program, h_decl);
        Sample {
            program,
            a_var,
            b_var,
            f_var,
            p,
            g,
            lhs,
            rhs,
        }
    }

    #[test]
    fn test_candidates_match_type_and_class() {
        let s = sample();
        let parents = ParentMap::new(&s.program);
        // `a` on the left may become `b` only: `c` is a let, `h` an f32, `g` private
        assert_eq!(replacement_candidates(&s.program, &parents, s.lhs), vec![s.b_var]);
        assert_eq!(replacement_candidates(&s.program, &parents, s.rhs), vec![s.a_var]);
        let ids = ids_of(&s.program);
        for decl in [s.f_var, s.p, s.g, s.b_var] {
            let m = ReplaceIdentifier {
                use_id: id(&ids, s.rhs),
                replacement_id: id(&ids, decl),
            };
            assert!(!m.is_applicable(&s.program, &ids));
        }
    }

    #[test]
    fn test_replace_rhs() {
        let s = sample();
        let ids = ids_of(&s.program);
        let m = Mutation::ReplaceIdentifier(ReplaceIdentifier {
            use_id: id(&ids, s.rhs),
            replacement_id: id(&ids, s.a_var),
        });
        let (out, _) = apply(&s.program, &ids, &m);
        assert!(print(&out).contains("  a = a;\n"), "{}", print(&out));
    }

    #[test]
    fn test_later_declarations_are_invisible() {
        let mut b = ProgramBuilder::new();
        let one = b.lit_i32(1);
        let x_decl = b.var_decl("x", one);
        let x = b.ident("x");
        let two = b.lit_i32(2);
        let assign = b.assign(x, two);
        let three = b.lit_i32(3);
        let y_decl = b.var_decl("y", three);
        let body = b.block(vec![x_decl, assign, y_decl]);
        let f = b.function("f", vec![], None, body);
        let program = b.build(vec![f], &Resolver::new());
        let ids = ids_of(&program);

        let mut rng = ChaChaSource::seeded(2);
        assert!(ReplaceIdentifierFinder
            .find_mutations(&program, &ids, &mut rng)
            .is_empty());
        let m = ReplaceIdentifier {
            use_id: id(&ids, x),
            replacement_id: id(&ids, variable_of(&program, y_decl)),
        };
        assert!(!m.is_applicable(&program, &ids));
    }
}
