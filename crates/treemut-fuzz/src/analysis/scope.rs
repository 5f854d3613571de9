//! Declarations visible at a point in a function.

use super::parents::ParentMap;
use std::collections::HashSet;
use treemut_ir::{NodeIndex, NodeKind, Program};

/// Name of a variable or parameter declaration
pub fn declaration_name(program: &Program, decl: NodeIndex) -> Option<&str> {
    match program.kind(decl) {
        NodeKind::Variable { name, .. } | NodeKind::Param { name, .. } => Some(name),
        _ => None,
    }
}

/// Variables and parameters that `at` can name, innermost first.
///
/// A declaration hidden by a nearer one with the same name is never returned, even
/// when the nearer one is rejected by `filter`. Module-scope variables count only if
/// they precede the enclosing function. Outside of any function the result is empty.
pub fn visible_declarations(
    program: &Program,
    parents: &ParentMap,
    at: NodeIndex,
    filter: impl Fn(NodeIndex) -> bool,
) -> Vec<NodeIndex> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();
    let mut offer = |decl: NodeIndex| {
        let Some(name) = declaration_name(program, decl) else {
            return;
        };
        if seen.insert(name.to_string()) && filter(decl) {
            found.push(decl);
        }
    };

    let mut child = at;
    for parent in parents.ancestors(at) {
        match program.kind(parent) {
            NodeKind::Block { statements } => {
                let end = statements.iter().position(|s| *s == child).unwrap_or(0);
                for stmt in statements[..end].iter().rev() {
                    if let Some(var) = declared_variable(program, *stmt) {
                        offer(var);
                    }
                }
            }
            NodeKind::Loop {
                body,
                continuing: Some(c),
            } if *c == child => {
                if let NodeKind::Block { statements } = program.kind(*body) {
                    for stmt in statements.iter().rev() {
                        if let Some(var) = declared_variable(program, *stmt) {
                            offer(var);
                        }
                    }
                }
            }
            NodeKind::For {
                initializer: Some(init),
                ..
            } if *init != child => {
                if let Some(var) = declared_variable(program, *init) {
                    offer(var);
                }
            }
            NodeKind::Function { params, .. } => {
                for p in params.iter().rev() {
                    offer(*p);
                }
                let globals = program.globals();
                let end = globals.iter().position(|g| *g == parent).unwrap_or(0);
                for g in globals[..end].iter().rev() {
                    if matches!(program.kind(*g), NodeKind::Variable { .. }) {
                        offer(*g);
                    }
                }
                return found;
            }
            NodeKind::Module { .. } => return Vec::new(),
            _ => {}
        }
        child = parent;
    }
    Vec::new()
}

fn declared_variable(program: &Program, stmt: NodeIndex) -> Option<NodeIndex> {
    match program.kind(stmt) {
        NodeKind::VarDecl { variable } => Some(*variable),
        _ => None,
    }
}
