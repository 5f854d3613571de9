//! Arena-appending program construction.

use crate::node::{Literal, Mutability, Node, NodeIndex, NodeKind, StorageClass};
use crate::ops::{BinaryOp, UnaryOp};
use crate::program::{Ast, Program};
use crate::types::Type;
use crate::validation::Validator;
use treemut_core::Span;

/// Appends nodes to a fresh arena.
///
/// Every helper returns the index of the node it pushed. Nothing is linked until a parent
/// constructor consumes the index, so unreferenced nodes are simply unreachable.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    nodes: Vec<Node>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NodeKind) -> NodeIndex {
        self.push_node(Node::new(kind))
    }

    pub fn push_node(&mut self, node: Node) -> NodeIndex {
        self.nodes.push(node);
        NodeIndex((self.nodes.len() - 1) as u32)
    }

    pub fn push_spanned(&mut self, kind: NodeKind, span: Span) -> NodeIndex {
        self.push_node(Node::new(kind).with_span(span))
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx.index()]
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

    /// Finish with an existing root
    pub fn into_ast(self, root: NodeIndex) -> Ast {
        Ast {
            nodes: self.nodes,
            root,
        }
    }

    /// Wrap `globals` in a module and validate the result
    pub fn build(mut self, globals: Vec<NodeIndex>, validator: &dyn Validator) -> Program {
        let root = self.module(globals);
        Program::new(self.into_ast(root), validator)
    }

    // Declarations

    pub fn module(&mut self, globals: Vec<NodeIndex>) -> NodeIndex {
        self.push(NodeKind::Module { globals })
    }

    pub fn function(
        &mut self,
        name: &str,
        params: Vec<NodeIndex>,
        return_type: Option<Type>,
        body: NodeIndex,
    ) -> NodeIndex {
        self.push(NodeKind::Function {
            name: name.to_string(),
            params,
            return_type,
            attributes: Vec::new(),
            body,
        })
    }

    pub fn entry_point(&mut self, name: &str, stage: &str, body: NodeIndex) -> NodeIndex {
        let attr = self.attribute(stage, vec![]);
        self.push(NodeKind::Function {
            name: name.to_string(),
            params: Vec::new(),
            return_type: None,
            attributes: vec![attr],
            body,
        })
    }

    pub fn attribute(&mut self, name: &str, args: Vec<NodeIndex>) -> NodeIndex {
        self.push(NodeKind::Attribute {
            name: name.to_string(),
            args,
        })
    }

    pub fn param(&mut self, name: &str, ty: Type) -> NodeIndex {
        self.push(NodeKind::Param {
            name: name.to_string(),
            ty,
        })
    }

    pub fn variable(
        &mut self,
        name: &str,
        mutability: Mutability,
        storage: StorageClass,
        ty: Option<Type>,
        initializer: Option<NodeIndex>,
    ) -> NodeIndex {
        self.push(NodeKind::Variable {
            name: name.to_string(),
            mutability,
            storage,
            ty,
            initializer,
        })
    }

    /// Module-scope `var<private>`
    pub fn global_var(
        &mut self,
        name: &str,
        ty: Type,
        initializer: Option<NodeIndex>,
    ) -> NodeIndex {
        self.variable(
            name,
            Mutability::Var,
            StorageClass::Private,
            Some(ty),
            initializer,
        )
    }

    /// Module-scope `const`
    pub fn global_const(&mut self, name: &str, initializer: NodeIndex) -> NodeIndex {
        self.variable(
            name,
            Mutability::Const,
            StorageClass::Function,
            None,
            Some(initializer),
        )
    }

    // Statements

    pub fn block(&mut self, statements: Vec<NodeIndex>) -> NodeIndex {
        self.push(NodeKind::Block { statements })
    }

    pub fn decl(&mut self, variable: NodeIndex) -> NodeIndex {
        self.push(NodeKind::VarDecl { variable })
    }

    /// `var name = init;`
    pub fn var_decl(&mut self, name: &str, init: NodeIndex) -> NodeIndex {
        let v = self.variable(
            name,
            Mutability::Var,
            StorageClass::Function,
            None,
            Some(init),
        );
        self.decl(v)
    }

    /// `var name: ty;`
    pub fn var_decl_typed(&mut self, name: &str, ty: Type) -> NodeIndex {
        let v = self.variable(name, Mutability::Var, StorageClass::Function, Some(ty), None);
        self.decl(v)
    }

    /// `let name = init;`
    pub fn let_decl(&mut self, name: &str, init: NodeIndex) -> NodeIndex {
        let v = self.variable(
            name,
            Mutability::Let,
            StorageClass::Function,
            None,
            Some(init),
        );
        self.decl(v)
    }

    pub fn assign(&mut self, lhs: NodeIndex, rhs: NodeIndex) -> NodeIndex {
        self.push(NodeKind::Assign { lhs, rhs })
    }

    pub fn compound_assign(&mut self, op: BinaryOp, lhs: NodeIndex, rhs: NodeIndex) -> NodeIndex {
        self.push(NodeKind::CompoundAssign { op, lhs, rhs })
    }

    pub fn increment(&mut self, target: NodeIndex) -> NodeIndex {
        self.push(NodeKind::Increment {
            target,
            increment: true,
        })
    }

    pub fn decrement(&mut self, target: NodeIndex) -> NodeIndex {
        self.push(NodeKind::Increment {
            target,
            increment: false,
        })
    }

    pub fn if_stmt(
        &mut self,
        condition: NodeIndex,
        body: NodeIndex,
        else_branch: Option<NodeIndex>,
    ) -> NodeIndex {
        self.push(NodeKind::If {
            condition,
            body,
            else_branch,
        })
    }

    pub fn loop_stmt(&mut self, body: NodeIndex, continuing: Option<NodeIndex>) -> NodeIndex {
        self.push(NodeKind::Loop { body, continuing })
    }

    pub fn for_stmt(
        &mut self,
        initializer: Option<NodeIndex>,
        condition: Option<NodeIndex>,
        update: Option<NodeIndex>,
        body: NodeIndex,
    ) -> NodeIndex {
        self.push(NodeKind::For {
            initializer,
            condition,
            update,
            body,
        })
    }

    pub fn while_stmt(&mut self, condition: NodeIndex, body: NodeIndex) -> NodeIndex {
        self.push(NodeKind::While { condition, body })
    }

    pub fn switch(&mut self, selector: NodeIndex, cases: Vec<NodeIndex>) -> NodeIndex {
        self.push(NodeKind::Switch { selector, cases })
    }

    pub fn case(&mut self, selectors: Vec<NodeIndex>, body: NodeIndex) -> NodeIndex {
        self.push(NodeKind::Case {
            selectors,
            default: false,
            body,
        })
    }

    pub fn default_case(&mut self, body: NodeIndex) -> NodeIndex {
        self.push(NodeKind::Case {
            selectors: Vec::new(),
            default: true,
            body,
        })
    }

    pub fn break_stmt(&mut self) -> NodeIndex {
        self.push(NodeKind::Break)
    }

    pub fn continue_stmt(&mut self) -> NodeIndex {
        self.push(NodeKind::Continue)
    }

    pub fn break_if(&mut self, condition: NodeIndex) -> NodeIndex {
        self.push(NodeKind::BreakIf { condition })
    }

    pub fn return_stmt(&mut self, value: Option<NodeIndex>) -> NodeIndex {
        self.push(NodeKind::Return { value })
    }

    pub fn discard(&mut self) -> NodeIndex {
        self.push(NodeKind::Discard)
    }

    pub fn call_stmt(&mut self, function: &str, args: Vec<NodeIndex>) -> NodeIndex {
        let call = self.call(function, args);
        self.push(NodeKind::CallStmt { call })
    }

    // Expressions

    pub fn lit(&mut self, lit: Literal) -> NodeIndex {
        self.push(NodeKind::Literal(lit))
    }

    pub fn lit_bool(&mut self, v: bool) -> NodeIndex {
        self.lit(Literal::Bool(v))
    }

    pub fn lit_i32(&mut self, v: i32) -> NodeIndex {
        self.lit(Literal::I32(v))
    }

    pub fn lit_u32(&mut self, v: u32) -> NodeIndex {
        self.lit(Literal::U32(v))
    }

    pub fn lit_f32(&mut self, v: f32) -> NodeIndex {
        self.lit(Literal::F32(v))
    }

    pub fn ident(&mut self, name: &str) -> NodeIndex {
        self.push(NodeKind::Ident {
            name: name.to_string(),
        })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeIndex) -> NodeIndex {
        self.push(NodeKind::Unary { op, operand })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: NodeIndex, rhs: NodeIndex) -> NodeIndex {
        self.push(NodeKind::Binary { op, lhs, rhs })
    }

    pub fn add(&mut self, lhs: NodeIndex, rhs: NodeIndex) -> NodeIndex {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn less_than(&mut self, lhs: NodeIndex, rhs: NodeIndex) -> NodeIndex {
        self.binary(BinaryOp::LessThan, lhs, rhs)
    }

    pub fn call(&mut self, function: &str, args: Vec<NodeIndex>) -> NodeIndex {
        self.push(NodeKind::Call {
            function: function.to_string(),
            args,
        })
    }

    pub fn construct(&mut self, ty: Type, args: Vec<NodeIndex>) -> NodeIndex {
        self.push(NodeKind::Construct { ty, args })
    }

    pub fn member(&mut self, object: NodeIndex, member: &str) -> NodeIndex {
        self.push(NodeKind::Member {
            object,
            member: member.to_string(),
        })
    }

    pub fn index(&mut self, object: NodeIndex, index: NodeIndex) -> NodeIndex {
        self.push(NodeKind::Index { object, index })
    }
}
