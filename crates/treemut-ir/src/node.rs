//! Tree nodes.
//!
//! Nodes live in an arena owned by a single [`Ast`](crate::program::Ast) and refer to
//! their children by [`NodeIndex`]. The same index may appear in more than one parent
//! slot; cloning breaks that sharing (see [`crate::clone`]).

use crate::ops::{BinaryOp, UnaryOp};
use crate::types::{ScalarType, Type};
use serde::{Deserialize, Serialize};
use std::fmt;
use treemut_core::Span;

/// Arena handle of a node within one program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Literal value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    I32(i32),
    U32(u32),
    F32(f32),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Bool(_) => Type::BOOL,
            Literal::I32(_) => Type::I32,
            Literal::U32(_) => Type::U32,
            Literal::F32(_) => Type::F32,
        }
    }

    pub fn scalar(&self) -> ScalarType {
        match self {
            Literal::Bool(_) => ScalarType::Bool,
            Literal::I32(_) => ScalarType::I32,
            Literal::U32(_) => ScalarType::U32,
            Literal::F32(_) => ScalarType::F32,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(v) => write!(f, "{}", v),
            Literal::I32(v) => write!(f, "{}i", v),
            Literal::U32(v) => write!(f, "{}u", v),
            Literal::F32(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{:.1}f", v),
            Literal::F32(v) => write!(f, "{}f", v),
        }
    }
}

/// Declaration keyword of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mutability {
    Var,
    Let,
    Const,
}

impl Mutability {
    pub fn keyword(&self) -> &'static str {
        match self {
            Mutability::Var => "var",
            Mutability::Let => "let",
            Mutability::Const => "const",
        }
    }
}

/// Where a variable's storage lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    Function,
    Private,
    Workgroup,
}

impl StorageClass {
    pub fn name(&self) -> &'static str {
        match self {
            StorageClass::Function => "function",
            StorageClass::Private => "private",
            StorageClass::Workgroup => "workgroup",
        }
    }
}

/// Coarse node family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeFamily {
    Module,
    Declaration,
    Attribute,
    Statement,
    Expression,
}

/// Concrete node kind without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeTag {
    Module,
    Function,
    Param,
    Variable,
    Attribute,
    Block,
    VarDecl,
    Assign,
    CompoundAssign,
    Increment,
    If,
    Loop,
    For,
    While,
    Switch,
    Case,
    Break,
    Continue,
    BreakIf,
    Return,
    Discard,
    CallStmt,
    Literal,
    Ident,
    Unary,
    Binary,
    Call,
    Construct,
    Member,
    Index,
}

impl NodeTag {
    pub fn family(&self) -> NodeFamily {
        match self {
            NodeTag::Module => NodeFamily::Module,
            NodeTag::Function | NodeTag::Param | NodeTag::Variable => NodeFamily::Declaration,
            NodeTag::Attribute => NodeFamily::Attribute,
            NodeTag::Block
            | NodeTag::VarDecl
            | NodeTag::Assign
            | NodeTag::CompoundAssign
            | NodeTag::Increment
            | NodeTag::If
            | NodeTag::Loop
            | NodeTag::For
            | NodeTag::While
            | NodeTag::Switch
            | NodeTag::Case
            | NodeTag::Break
            | NodeTag::Continue
            | NodeTag::BreakIf
            | NodeTag::Return
            | NodeTag::Discard
            | NodeTag::CallStmt => NodeFamily::Statement,
            NodeTag::Literal
            | NodeTag::Ident
            | NodeTag::Unary
            | NodeTag::Binary
            | NodeTag::Call
            | NodeTag::Construct
            | NodeTag::Member
            | NodeTag::Index => NodeFamily::Expression,
        }
    }

    /// Loop-like statements a `break` or `continue` can target
    pub fn is_loop(&self) -> bool {
        matches!(self, NodeTag::Loop | NodeTag::For | NodeTag::While)
    }
}

/// A list-valued field of some node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListField {
    Globals,
    Params,
    Attributes,
    AttributeArgs,
    Statements,
    Cases,
    Selectors,
    Args,
}

impl ListField {
    /// Family every element of this list must belong to
    pub fn element_family(&self) -> NodeFamily {
        match self {
            ListField::Globals | ListField::Params => NodeFamily::Declaration,
            ListField::Attributes => NodeFamily::Attribute,
            ListField::Statements | ListField::Cases => NodeFamily::Statement,
            ListField::AttributeArgs | ListField::Selectors | ListField::Args => {
                NodeFamily::Expression
            }
        }
    }
}

/// The payload of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // Root
    Module {
        globals: Vec<NodeIndex>,
    },

    // Declarations
    Function {
        name: String,
        params: Vec<NodeIndex>,
        return_type: Option<Type>,
        attributes: Vec<NodeIndex>,
        body: NodeIndex,
    },
    Param {
        name: String,
        ty: Type,
    },
    Variable {
        name: String,
        mutability: Mutability,
        storage: StorageClass,
        ty: Option<Type>,
        initializer: Option<NodeIndex>,
    },

    // Attributes
    Attribute {
        name: String,
        args: Vec<NodeIndex>,
    },

    // Statements
    Block {
        statements: Vec<NodeIndex>,
    },
    VarDecl {
        variable: NodeIndex,
    },
    Assign {
        lhs: NodeIndex,
        rhs: NodeIndex,
    },
    CompoundAssign {
        op: BinaryOp,
        lhs: NodeIndex,
        rhs: NodeIndex,
    },
    Increment {
        target: NodeIndex,
        increment: bool,
    },
    If {
        condition: NodeIndex,
        body: NodeIndex,
        else_branch: Option<NodeIndex>,
    },
    Loop {
        body: NodeIndex,
        continuing: Option<NodeIndex>,
    },
    For {
        initializer: Option<NodeIndex>,
        condition: Option<NodeIndex>,
        update: Option<NodeIndex>,
        body: NodeIndex,
    },
    While {
        condition: NodeIndex,
        body: NodeIndex,
    },
    Switch {
        selector: NodeIndex,
        cases: Vec<NodeIndex>,
    },
    Case {
        selectors: Vec<NodeIndex>,
        default: bool,
        body: NodeIndex,
    },
    Break,
    Continue,
    BreakIf {
        condition: NodeIndex,
    },
    Return {
        value: Option<NodeIndex>,
    },
    Discard,
    CallStmt {
        call: NodeIndex,
    },

    // Expressions
    Literal(Literal),
    Ident {
        name: String,
    },
    Unary {
        op: UnaryOp,
        operand: NodeIndex,
    },
    Binary {
        op: BinaryOp,
        lhs: NodeIndex,
        rhs: NodeIndex,
    },
    Call {
        function: String,
        args: Vec<NodeIndex>,
    },
    Construct {
        ty: Type,
        args: Vec<NodeIndex>,
    },
    Member {
        object: NodeIndex,
        member: String,
    },
    Index {
        object: NodeIndex,
        index: NodeIndex,
    },
}

/// Rewrites the child references of a node
pub trait ChildMapper {
    fn map_child(&mut self, child: NodeIndex) -> NodeIndex;

    /// Map the occupant of an optional slot; `None` empties the slot
    fn map_optional(&mut self, child: NodeIndex) -> Option<NodeIndex> {
        Some(self.map_child(child))
    }

    fn map_list(&mut self, field: ListField, items: &[NodeIndex]) -> Vec<NodeIndex> {
        let _ = field;
        items.iter().map(|c| self.map_child(*c)).collect()
    }
}

struct Collect(Vec<NodeIndex>);

impl ChildMapper for Collect {
    fn map_child(&mut self, child: NodeIndex) -> NodeIndex {
        self.0.push(child);
        child
    }
}

impl NodeKind {
    pub fn tag(&self) -> NodeTag {
        match self {
            NodeKind::Module { .. } => NodeTag::Module,
            NodeKind::Function { .. } => NodeTag::Function,
            NodeKind::Param { .. } => NodeTag::Param,
            NodeKind::Variable { .. } => NodeTag::Variable,
            NodeKind::Attribute { .. } => NodeTag::Attribute,
            NodeKind::Block { .. } => NodeTag::Block,
            NodeKind::VarDecl { .. } => NodeTag::VarDecl,
            NodeKind::Assign { .. } => NodeTag::Assign,
            NodeKind::CompoundAssign { .. } => NodeTag::CompoundAssign,
            NodeKind::Increment { .. } => NodeTag::Increment,
            NodeKind::If { .. } => NodeTag::If,
            NodeKind::Loop { .. } => NodeTag::Loop,
            NodeKind::For { .. } => NodeTag::For,
            NodeKind::While { .. } => NodeTag::While,
            NodeKind::Switch { .. } => NodeTag::Switch,
            NodeKind::Case { .. } => NodeTag::Case,
            NodeKind::Break => NodeTag::Break,
            NodeKind::Continue => NodeTag::Continue,
            NodeKind::BreakIf { .. } => NodeTag::BreakIf,
            NodeKind::Return { .. } => NodeTag::Return,
            NodeKind::Discard => NodeTag::Discard,
            NodeKind::CallStmt { .. } => NodeTag::CallStmt,
            NodeKind::Literal(_) => NodeTag::Literal,
            NodeKind::Ident { .. } => NodeTag::Ident,
            NodeKind::Unary { .. } => NodeTag::Unary,
            NodeKind::Binary { .. } => NodeTag::Binary,
            NodeKind::Call { .. } => NodeTag::Call,
            NodeKind::Construct { .. } => NodeTag::Construct,
            NodeKind::Member { .. } => NodeTag::Member,
            NodeKind::Index { .. } => NodeTag::Index,
        }
    }

    pub fn family(&self) -> NodeFamily {
        self.tag().family()
    }

    pub fn is_statement(&self) -> bool {
        self.family() == NodeFamily::Statement
    }

    pub fn is_expression(&self) -> bool {
        self.family() == NodeFamily::Expression
    }

    /// Rebuild this node with every child reference passed through `mapper`.
    ///
    /// Children are visited in field order; this order defines pre-order traversal.
    pub fn map_children<M: ChildMapper + ?Sized>(&self, mapper: &mut M) -> NodeKind {
        match self {
            NodeKind::Module { globals } => NodeKind::Module {
                globals: mapper.map_list(ListField::Globals, globals),
            },
            NodeKind::Function {
                name,
                params,
                return_type,
                attributes,
                body,
            } => NodeKind::Function {
                name: name.clone(),
                attributes: mapper.map_list(ListField::Attributes, attributes),
                params: mapper.map_list(ListField::Params, params),
                return_type: *return_type,
                body: mapper.map_child(*body),
            },
            NodeKind::Param { name, ty } => NodeKind::Param {
                name: name.clone(),
                ty: *ty,
            },
            NodeKind::Variable {
                name,
                mutability,
                storage,
                ty,
                initializer,
            } => NodeKind::Variable {
                name: name.clone(),
                mutability: *mutability,
                storage: *storage,
                ty: *ty,
                initializer: initializer.and_then(|c| mapper.map_optional(c)),
            },
            NodeKind::Attribute { name, args } => NodeKind::Attribute {
                name: name.clone(),
                args: mapper.map_list(ListField::AttributeArgs, args),
            },
            NodeKind::Block { statements } => NodeKind::Block {
                statements: mapper.map_list(ListField::Statements, statements),
            },
            NodeKind::VarDecl { variable } => NodeKind::VarDecl {
                variable: mapper.map_child(*variable),
            },
            NodeKind::Assign { lhs, rhs } => NodeKind::Assign {
                lhs: mapper.map_child(*lhs),
                rhs: mapper.map_child(*rhs),
            },
            NodeKind::CompoundAssign { op, lhs, rhs } => NodeKind::CompoundAssign {
                op: *op,
                lhs: mapper.map_child(*lhs),
                rhs: mapper.map_child(*rhs),
            },
            NodeKind::Increment { target, increment } => NodeKind::Increment {
                target: mapper.map_child(*target),
                increment: *increment,
            },
            NodeKind::If {
                condition,
                body,
                else_branch,
            } => NodeKind::If {
                condition: mapper.map_child(*condition),
                body: mapper.map_child(*body),
                else_branch: else_branch.and_then(|c| mapper.map_optional(c)),
            },
            NodeKind::Loop { body, continuing } => NodeKind::Loop {
                body: mapper.map_child(*body),
                continuing: continuing.and_then(|c| mapper.map_optional(c)),
            },
            NodeKind::For {
                initializer,
                condition,
                update,
                body,
            } => NodeKind::For {
                initializer: initializer.and_then(|c| mapper.map_optional(c)),
                condition: condition.and_then(|c| mapper.map_optional(c)),
                update: update.and_then(|c| mapper.map_optional(c)),
                body: mapper.map_child(*body),
            },
            NodeKind::While { condition, body } => NodeKind::While {
                condition: mapper.map_child(*condition),
                body: mapper.map_child(*body),
            },
            NodeKind::Switch { selector, cases } => NodeKind::Switch {
                selector: mapper.map_child(*selector),
                cases: mapper.map_list(ListField::Cases, cases),
            },
            NodeKind::Case {
                selectors,
                default,
                body,
            } => NodeKind::Case {
                selectors: mapper.map_list(ListField::Selectors, selectors),
                default: *default,
                body: mapper.map_child(*body),
            },
            NodeKind::Break => NodeKind::Break,
            NodeKind::Continue => NodeKind::Continue,
            NodeKind::BreakIf { condition } => NodeKind::BreakIf {
                condition: mapper.map_child(*condition),
            },
            NodeKind::Return { value } => NodeKind::Return {
                value: value.and_then(|c| mapper.map_optional(c)),
            },
            NodeKind::Discard => NodeKind::Discard,
            NodeKind::CallStmt { call } => NodeKind::CallStmt {
                call: mapper.map_child(*call),
            },
            NodeKind::Literal(lit) => NodeKind::Literal(*lit),
            NodeKind::Ident { name } => NodeKind::Ident { name: name.clone() },
            NodeKind::Unary { op, operand } => NodeKind::Unary {
                op: *op,
                operand: mapper.map_child(*operand),
            },
            NodeKind::Binary { op, lhs, rhs } => NodeKind::Binary {
                op: *op,
                lhs: mapper.map_child(*lhs),
                rhs: mapper.map_child(*rhs),
            },
            NodeKind::Call { function, args } => NodeKind::Call {
                function: function.clone(),
                args: mapper.map_list(ListField::Args, args),
            },
            NodeKind::Construct { ty, args } => NodeKind::Construct {
                ty: *ty,
                args: mapper.map_list(ListField::Args, args),
            },
            NodeKind::Member { object, member } => NodeKind::Member {
                object: mapper.map_child(*object),
                member: member.clone(),
            },
            NodeKind::Index { object, index } => NodeKind::Index {
                object: mapper.map_child(*object),
                index: mapper.map_child(*index),
            },
        }
    }

    /// Child references in field order
    pub fn children(&self) -> Vec<NodeIndex> {
        let mut collect = Collect(Vec::new());
        self.map_children(&mut collect);
        collect.0
    }

    /// The list stored in `field`, if this kind has one
    pub fn list(&self, field: ListField) -> Option<&[NodeIndex]> {
        match (self, field) {
            (NodeKind::Module { globals }, ListField::Globals) => Some(globals),
            (NodeKind::Function { params, .. }, ListField::Params) => Some(params),
            (NodeKind::Function { attributes, .. }, ListField::Attributes) => Some(attributes),
            (NodeKind::Attribute { args, .. }, ListField::AttributeArgs) => Some(args),
            (NodeKind::Block { statements }, ListField::Statements) => Some(statements),
            (NodeKind::Switch { cases, .. }, ListField::Cases) => Some(cases),
            (NodeKind::Case { selectors, .. }, ListField::Selectors) => Some(selectors),
            (NodeKind::Call { args, .. }, ListField::Args) => Some(args),
            (NodeKind::Construct { args, .. }, ListField::Args) => Some(args),
            _ => None,
        }
    }

    /// This node with every child reference replaced by a placeholder.
    ///
    /// Two nodes with equal shells differ only in their children.
    pub fn shell(&self) -> NodeKind {
        struct Blank;
        impl ChildMapper for Blank {
            fn map_child(&mut self, _child: NodeIndex) -> NodeIndex {
                NodeIndex(u32::MAX)
            }
        }
        self.map_children(&mut Blank)
    }
}

/// One arena entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub span: Span,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            span: Span::default(),
            kind,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}
