//! Which statements can be removed without breaking the program.

use super::jump_tracker::JumpTracker;
use super::parents::ParentMap;
use treemut_ir::{ListField, NodeIndex, NodeKind, Program};

/// How a statement is detached from its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionSite {
    /// Drop the statement from a list field of `owner`
    List { owner: NodeIndex, field: ListField },
    /// Empty the optional slot holding the statement
    Omit,
}

/// Where `stmt` sits, if it sits somewhere it can be removed from.
///
/// Bodies of functions, loops, branches and cases are required slots and yield `None`.
pub fn deletion_site(
    program: &Program,
    parents: &ParentMap,
    stmt: NodeIndex,
) -> Option<DeletionSite> {
    let parent = parents.parent(stmt)?;
    match program.kind(parent) {
        NodeKind::Block { .. } => Some(DeletionSite::List {
            owner: parent,
            field: ListField::Statements,
        }),
        NodeKind::Switch { cases, .. } if cases.contains(&stmt) => Some(DeletionSite::List {
            owner: parent,
            field: ListField::Cases,
        }),
        NodeKind::If {
            else_branch: Some(e),
            ..
        } if *e == stmt => Some(DeletionSite::Omit),
        NodeKind::Loop {
            continuing: Some(c),
            ..
        } if *c == stmt => Some(DeletionSite::Omit),
        NodeKind::For {
            initializer,
            update,
            ..
        } if *initializer == Some(stmt) || *update == Some(stmt) => Some(DeletionSite::Omit),
        _ => None,
    }
}

/// True if removing `stmt` keeps the program valid.
///
/// Declarations stay because later code may name them. A default case stays because
/// every switch needs one. Statements holding a return or a break out of their loop
/// stay because removing them changes which paths reach the end of the function. A
/// loop nothing breaks out of stays for the same reason.
pub fn can_delete(
    program: &Program,
    parents: &ParentMap,
    jumps: &JumpTracker,
    stmt: NodeIndex,
) -> bool {
    let kind = program.kind(stmt);
    if !kind.is_statement() || deletion_site(program, parents, stmt).is_none() {
        return false;
    }
    match kind {
        NodeKind::VarDecl { .. } => return false,
        NodeKind::Case { default: true, .. } => return false,
        NodeKind::Loop { .. }
        | NodeKind::For {
            condition: None, ..
        } if !jumps.loop_has_break(stmt) => return false,
        _ => {}
    }
    !jumps.contains_break_for_innermost_loop(stmt) && !jumps.contains_return(stmt)
}
