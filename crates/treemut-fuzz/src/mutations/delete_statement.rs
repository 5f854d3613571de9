//! Remove a statement.

use crate::analysis::{can_delete, deletion_site, DeletionSite, JumpTracker, ParentMap};
use crate::finders::MutationFinder;
use crate::mutation::{source_node, Mutation};
use crate::random::RandomSource;
use serde::{Deserialize, Serialize};
use treemut_core::{MutationKind, NodeId};
use treemut_ir::{CloneContext, NodeIdMap, Program};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteStatement {
    pub statement_id: NodeId,
}

impl DeleteStatement {
    pub fn is_applicable(&self, program: &Program, ids: &NodeIdMap) -> bool {
        let Some(stmt) = ids.get_node(self.statement_id) else {
            return false;
        };
        let parents = ParentMap::new(program);
        let jumps = JumpTracker::new(program, &parents);
        can_delete(program, &parents, &jumps, stmt)
    }

    pub fn apply(&self, ctx: &mut CloneContext<'_>) {
        let stmt = source_node(ctx, self.statement_id);
        let parents = ParentMap::new(ctx.src());
        match deletion_site(ctx.src(), &parents, stmt) {
            Some(DeletionSite::List { owner, field }) => ctx.remove(owner, field, stmt),
            Some(DeletionSite::Omit) => ctx.omit(stmt),
            None => panic!("statement {} sits in a required slot", stmt),
        }
    }
}

/// Proposes every statement that can be removed
pub struct DeleteStatementFinder;

impl MutationFinder for DeleteStatementFinder {
    fn kind(&self) -> MutationKind {
        MutationKind::DeleteStatement
    }

    fn find_mutations(
        &self,
        program: &Program,
        ids: &NodeIdMap,
        _rng: &mut dyn RandomSource,
    ) -> Vec<Mutation> {
        let parents = ParentMap::new(program);
        let jumps = JumpTracker::new(program, &parents);
        program
            .reachable_nodes()
            .into_iter()
            .filter(|stmt| can_delete(program, &parents, &jumps, *stmt))
            .map(|stmt| {
                Mutation::DeleteStatement(DeleteStatement {
                    statement_id: ids.get_id(stmt),
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
    use treemut_ir::{ProgramBuilder, Resolver, Type};

    #[test]
    fn test_delete_from_block_and_else() {
        let mut b = ProgramBuilder::new();
        let zero = b.lit_i32(0);
        let decl = b.var_decl("x", zero);
        let x = b.ident("x");
        let one = b.lit_i32(1);
        let assign = b.assign(x, one);
        let cond = b.lit_bool(true);
        let then_b = b.block(vec![]);
        let x2 = b.ident("x");
        let inc = b.increment(x2);
        let else_b = b.block(vec![inc]);
        let iff = b.if_stmt(cond, then_b, Some(else_b));
        let body = b.block(vec![decl, assign, iff]);
        let f = b.function("f", vec![], None, body);
        let program = b.build(vec![f], &Resolver::new());
        let ids = ids_of(&program);

        let del_assign = Mutation::DeleteStatement(DeleteStatement {
            statement_id: id(&ids, assign),
        });
        let (out, _) = apply(&program, &ids, &del_assign);
        let expected = "\
fn f() {
  var x = 0i;
  if (true) {
  } else {
    x++;
  }
}
";
        assert_eq!(print(&out), expected);

        let del_else = Mutation::DeleteStatement(DeleteStatement {
            statement_id: id(&ids, else_b),
        });
        let (out, out_ids) = apply(&program, &ids, &del_else);
        assert!(!print(&out).contains("else"));
        assert!(out_ids.get_node(id(&ids, inc)).is_none());
        assert!(out_ids.get_node(id(&ids, assign)).is_some());
    }

    #[test]
    fn test_required_statements_are_not_deleted() {
        let mut b = ProgramBuilder::new();
        let one = b.lit_i32(1);
        let decl = b.let_decl("a", one);
        let a = b.ident("a");
        let ret = b.return_stmt(Some(a));
        let body = b.block(vec![decl, ret]);
        let f = b.function("f", vec![], Some(Type::I32), body);
        let program = b.build(vec![f], &Resolver::new());
        let ids = ids_of(&program);

        for stmt in [decl, ret, body] {
            let m = DeleteStatement {
                statement_id: id(&ids, stmt),
            };
            assert!(!m.is_applicable(&program, &ids), "{}", stmt);
        }
        let mut rng = ChaChaSource::seeded(0);
        assert!(DeleteStatementFinder
            .find_mutations(&program, &ids, &mut rng)
            .is_empty());
    }

    #[test]
    fn test_delete_case_and_continuing() {
        let mut b = ProgramBuilder::new();
        let sel = b.lit_u32(3);
        let one = b.lit_u32(1);
        let case_body = b.block(vec![]);
        let case = b.case(vec![one], case_body);
        let def_body = b.block(vec![]);
        let def = b.default_case(def_body);
        let sw = b.switch(sel, vec![case, def]);
        let brk = b.break_stmt();
        let loop_body = b.block(vec![brk]);
        let c = b.lit_bool(true);
        let cont_if_body = b.block(vec![]);
        let cont_if = b.if_stmt(c, cont_if_body, None);
        let continuing = b.block(vec![cont_if]);
        let lp = b.loop_stmt(loop_body, Some(continuing));
        let body = b.block(vec![sw, lp]);
        let f = b.function("f", vec![], None, body);
        let program = b.build(vec![f], &Resolver::new());
        let ids = ids_of(&program);

        let mut rng = ChaChaSource::seeded(1);
        let found = DeleteStatementFinder.find_mutations(&program, &ids, &mut rng);
        let targets: Vec<_> = found
            .iter()
            .map(|m| match m {
                Mutation::DeleteStatement(d) => d.statement_id,
                other => panic!("unexpected {}", other),
            })
            .collect();
        assert!(targets.contains(&id(&ids, case)));
        assert!(targets.contains(&id(&ids, continuing)));
        assert!(!targets.contains(&id(&ids, def)));
        assert!(!targets.contains(&id(&ids, brk)));

        let (out, _) = apply(
            &program,
            &ids,
            &Mutation::DeleteStatement(DeleteStatement {
                statement_id: id(&ids, continuing),
            }),
        );
        assert!(!print(&out).contains("continuing"));
        let (out, _) = apply(
            &program,
            &ids,
            &Mutation::DeleteStatement(DeleteStatement {
                statement_id: id(&ids, case),
            }),
        );
        assert!(!print(&out).contains("case 1u"));
    }
}
