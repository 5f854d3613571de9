//! Program snapshots.

use crate::node::{Node, NodeIndex, NodeKind, NodeTag};
use crate::validation::{Diagnostic, Semantics, ValidationReport, Validator};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use treemut_core::{Error, ProgramId, Result};

/// A node arena plus its root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ast {
    pub nodes: Vec<Node>,
    pub root: NodeIndex,
}

impl Ast {
    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx.index()]
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(idx.index())
    }

    pub fn kind(&self, idx: NodeIndex) -> &NodeKind {
        &self.node(idx).kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node reachable from the root, depth-first pre-order, each distinct node once
    pub fn reachable_nodes(&self) -> Vec<NodeIndex> {
        self.reachable_from(self.root)
    }

    pub fn reachable_from(&self, start: NodeIndex) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            order.push(idx);
            let children = self.kind(idx).children();
            stack.extend(children.into_iter().rev());
        }
        order
    }

    /// Compare the subtree at `a` in `self` with the subtree at `b` in `other`,
    /// ignoring arena positions, spans and sharing
    pub fn subtree_eq(&self, a: NodeIndex, other: &Ast, b: NodeIndex) -> bool {
        let ka = self.kind(a);
        let kb = other.kind(b);
        if ka.shell() != kb.shell() {
            return false;
        }
        let ca = ka.children();
        let cb = kb.children();
        ca.len() == cb.len()
            && ca
                .iter()
                .zip(cb.iter())
                .all(|(x, y)| self.subtree_eq(*x, other, *y))
    }

    pub fn structurally_eq(&self, other: &Ast) -> bool {
        self.subtree_eq(self.root, other, other.root)
    }

    /// Check that every child reference points into the arena and the root is a module
    pub fn check_well_formed(&self) -> Result<()> {
        let root = self
            .get(self.root)
            .ok_or_else(|| Error::Validation(format!("root {} is out of bounds", self.root)))?;
        if root.kind.tag() != NodeTag::Module {
            return Err(Error::Validation(format!(
                "root {} is a {:?}, expected a module",
                self.root,
                root.kind.tag()
            )));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            for child in node.kind.children() {
                if child.index() >= self.nodes.len() {
                    return Err(Error::Validation(format!(
                        "node #{} refers to missing child {}",
                        i, child
                    )));
                }
            }
        }
        self.check_acyclic()
    }

    fn check_acyclic(&self) -> Result<()> {
        // 0 = unvisited, 1 = on the current path, 2 = done
        let mut state = vec![0u8; self.nodes.len()];
        let mut stack = vec![(self.root, false)];
        while let Some((idx, exiting)) = stack.pop() {
            if exiting {
                state[idx.index()] = 2;
                continue;
            }
            match state[idx.index()] {
                1 => {
                    return Err(Error::Validation(format!("cycle through node {}", idx)));
                }
                2 => continue,
                _ => {}
            }
            state[idx.index()] = 1;
            stack.push((idx, true));
            for child in self.kind(idx).children() {
                if state[child.index()] == 1 {
                    return Err(Error::Validation(format!("cycle through node {}", child)));
                }
                if state[child.index()] == 0 {
                    stack.push((child, false));
                }
            }
        }
        Ok(())
    }

    /// Serialize the arena to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize an arena from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let ast: Ast =
            bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        ast.check_well_formed()?;
        Ok(ast)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let ast: Ast = serde_json::from_str(text)?;
        ast.check_well_formed()?;
        Ok(ast)
    }
}

/// An immutable, validated program snapshot
#[derive(Debug)]
pub struct Program {
    id: ProgramId,
    ast: Ast,
    report: ValidationReport,
}

impl Program {
    /// Validate `ast` and wrap it.
    ///
    /// Invalid programs are still constructed; check [`Program::is_valid`].
    pub fn new(ast: Ast, validator: &dyn Validator) -> Self {
        let report = validator.validate(&ast);
        Self {
            id: ProgramId::next(),
            ast,
            report,
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn root(&self) -> NodeIndex {
        self.ast.root
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        self.ast.node(idx)
    }

    pub fn kind(&self, idx: NodeIndex) -> &NodeKind {
        self.ast.kind(idx)
    }

    pub fn is_valid(&self) -> bool {
        self.report.is_valid()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.report.diagnostics
    }

    pub fn semantics(&self) -> &Semantics {
        &self.report.semantics
    }

    /// Module-level declarations in order
    pub fn globals(&self) -> &[NodeIndex] {
        match self.kind(self.root()) {
            NodeKind::Module { globals } => globals,
            _ => &[],
        }
    }

    /// Function declarations in order
    pub fn functions(&self) -> Vec<NodeIndex> {
        self.globals()
            .iter()
            .copied()
            .filter(|g| self.kind(*g).tag() == NodeTag::Function)
            .collect()
    }

    pub fn find_function(&self, name: &str) -> Option<NodeIndex> {
        self.functions().into_iter().find(
            |f| matches!(self.kind(*f), NodeKind::Function { name: n, .. } if n == name),
        )
    }

    pub fn reachable_nodes(&self) -> Vec<NodeIndex> {
        self.ast.reachable_nodes()
    }

    pub fn structurally_eq(&self, other: &Program) -> bool {
        self.ast.structurally_eq(&other.ast)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.ast.to_bytes()
    }

    pub fn to_json(&self) -> Result<String> {
        self.ast.to_json()
    }

    pub fn into_ast(self) -> Ast {
        self.ast
    }
}
