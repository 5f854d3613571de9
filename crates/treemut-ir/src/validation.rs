//! Validation for tree programs.
//!
//! [`Resolver`] is the bundled oracle: it resolves names, types every expression, and
//! checks the statement placement rules. Besides the verdict it returns the
//! [`Semantics`] the fuzzer's analyses read (expression types, what each identifier
//! refers to, declaration types and call targets).

use crate::node::{Literal, Mutability, NodeIndex, NodeKind, NodeTag, StorageClass};
use crate::ops::{BinaryOp, UnaryOp};
use crate::program::Ast;
use crate::types::{ScalarType, Type};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

const KNOWN_ATTRIBUTES: [&str; 5] = ["compute", "fragment", "vertex", "workgroup_size", "must_use"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub node: Option<NodeIndex>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match self.node {
            Some(node) => write!(f, "{} at {}: {}", level, node, self.message),
            None => write!(f, "{}: {}", level, self.message),
        }
    }
}

/// Facts about a valid program
#[derive(Debug, Clone, Default)]
pub struct Semantics {
    expr_types: HashMap<NodeIndex, Type>,
    resolved: HashMap<NodeIndex, NodeIndex>,
    decl_types: HashMap<NodeIndex, Type>,
    call_targets: HashMap<NodeIndex, NodeIndex>,
}

impl Semantics {
    /// Value type of an expression
    pub fn type_of(&self, expr: NodeIndex) -> Option<Type> {
        self.expr_types.get(&expr).copied()
    }

    /// Variable or parameter an identifier refers to
    pub fn declaration_of(&self, ident: NodeIndex) -> Option<NodeIndex> {
        self.resolved.get(&ident).copied()
    }

    /// Store type of a variable or parameter
    pub fn decl_type(&self, decl: NodeIndex) -> Option<Type> {
        self.decl_types.get(&decl).copied()
    }

    /// Function a call expression invokes
    pub fn call_target(&self, call: NodeIndex) -> Option<NodeIndex> {
        self.call_targets.get(&call).copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
    pub semantics: Semantics,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

/// Decides whether a program is well-formed
pub trait Validator {
    fn validate(&self, ast: &Ast) -> ValidationReport;
}

/// Reference validator for the tree language
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver;

impl Resolver {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for Resolver {
    fn validate(&self, ast: &Ast) -> ValidationReport {
        let mut checker = Checker::new(ast);
        checker.check_module();
        let report = ValidationReport {
            diagnostics: checker.diagnostics,
            semantics: checker.sem,
        };
        if !report.is_valid() {
            debug!(
                "Rejected program with {} diagnostics, first: {}",
                report.diagnostics.len(),
                report.diagnostics[0]
            );
        }
        report
    }
}

/// Result type of `op operand`, if the operation is defined
pub fn unary_result_type(op: UnaryOp, operand: Type) -> Option<Type> {
    let ok = match op {
        UnaryOp::Negation => {
            operand.is_signed_integer_scalar_or_vector() || operand.is_float_scalar_or_vector()
        }
        UnaryOp::Not => operand.is_bool_scalar_or_vector(),
        UnaryOp::Complement => operand.is_integer_scalar_or_vector(),
    };
    ok.then_some(operand)
}

/// Result type of `lhs op rhs`, if the operation is defined
pub fn binary_result_type(op: BinaryOp, lhs: Type, rhs: Type) -> Option<Type> {
    match op {
        BinaryOp::Add | BinaryOp::Subtract => {
            if lhs == rhs && lhs.is_float_matrix() {
                return Some(lhs);
            }
            arithmetic(lhs, rhs)
        }
        BinaryOp::Multiply => {
            if let Some(t) = arithmetic(lhs, rhs) {
                return Some(t);
            }
            match (lhs, rhs) {
                (Type::Matrix { .. }, Type::F32) | (Type::F32, Type::Matrix { .. }) => {
                    Some(if lhs.is_float_matrix() { lhs } else { rhs })
                }
                (
                    Type::Matrix { columns: k, rows: r },
                    Type::Matrix {
                        columns: c,
                        rows: k2,
                    },
                ) if k == k2 => Some(Type::mat(c, r)),
                (
                    Type::Matrix { columns: c, rows: r },
                    Type::Vector {
                        width,
                        elem: ScalarType::F32,
                    },
                ) if width == c => Some(Type::vec(r, ScalarType::F32)),
                (
                    Type::Vector {
                        width,
                        elem: ScalarType::F32,
                    },
                    Type::Matrix { columns: c, rows: r },
                ) if width == r => Some(Type::vec(c, ScalarType::F32)),
                _ => None,
            }
        }
        BinaryOp::Divide | BinaryOp::Modulo => arithmetic(lhs, rhs),
        BinaryOp::And | BinaryOp::Or => (lhs == rhs
            && (lhs.is_bool_scalar_or_vector() || lhs.is_integer_scalar_or_vector()))
        .then_some(lhs),
        BinaryOp::Xor => (lhs == rhs && lhs.is_integer_scalar_or_vector()).then_some(lhs),
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => (lhs.is_integer_scalar_or_vector()
            && rhs.is_unsigned_integer_scalar_or_vector()
            && lhs.is_vector() == rhs.is_vector()
            && lhs.width() == rhs.width())
        .then_some(lhs),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            (lhs == Type::BOOL && rhs == Type::BOOL).then_some(Type::BOOL)
        }
        BinaryOp::Equal | BinaryOp::NotEqual => {
            (lhs == rhs && lhs.scalar_elem().is_some()).then(|| lhs.with_elem(ScalarType::Bool))
        }
        BinaryOp::LessThan
        | BinaryOp::LessThanEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanEqual => (lhs == rhs && lhs.is_numeric_scalar_or_vector())
            .then(|| lhs.with_elem(ScalarType::Bool)),
    }
}

/// Component-wise numeric operation, allowing a scalar on either side of a vector
fn arithmetic(lhs: Type, rhs: Type) -> Option<Type> {
    if !lhs.is_numeric_scalar_or_vector() || !rhs.is_numeric_scalar_or_vector() {
        return None;
    }
    if lhs == rhs {
        return Some(lhs);
    }
    match (lhs, rhs) {
        (Type::Vector { elem, .. }, Type::Scalar(s)) if elem == s => Some(lhs),
        (Type::Scalar(s), Type::Vector { elem, .. }) if elem == s => Some(rhs),
        _ => None,
    }
}

fn type_is_well_formed(ty: Type) -> bool {
    match ty {
        Type::Scalar(_) => true,
        Type::Vector { width, .. } => (2..=4).contains(&width),
        Type::Matrix { columns, rows } => (2..=4).contains(&columns) && (2..=4).contains(&rows),
    }
}

/// Component index of a swizzle letter
fn swizzle_index(c: char) -> Option<(u8, bool)> {
    match c {
        'x' => Some((0, true)),
        'y' => Some((1, true)),
        'z' => Some((2, true)),
        'w' => Some((3, true)),
        'r' => Some((0, false)),
        'g' => Some((1, false)),
        'b' => Some((2, false)),
        'a' => Some((3, false)),
        _ => None,
    }
}

/// What a `break` or `continue` would hit first walking outward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Loop,
    Switch,
    Continuing,
}

struct FunctionContext {
    position: usize,
    return_type: Option<Type>,
}

struct Checker<'a> {
    ast: &'a Ast,
    sem: Semantics,
    diagnostics: Vec<Diagnostic>,
    /// Module-scope name -> (declaration, position in the module)
    globals: HashMap<String, (NodeIndex, usize)>,
    scopes: Vec<HashMap<String, NodeIndex>>,
    flow: Vec<Flow>,
    function: Option<FunctionContext>,
    /// Position of the module-scope variable whose initializer is being resolved
    global_initializer: Option<usize>,
    references: HashSet<NodeIndex>,
    const_exprs: HashSet<NodeIndex>,
}

impl<'a> Checker<'a> {
    fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            sem: Semantics::default(),
            diagnostics: Vec::new(),
            globals: HashMap::new(),
            scopes: Vec::new(),
            flow: Vec::new(),
            function: None,
            global_initializer: None,
            references: HashSet::new(),
            const_exprs: HashSet::new(),
        }
    }

    fn error(&mut self, node: NodeIndex, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            node: Some(node),
        });
    }

    fn check_type(&mut self, node: NodeIndex, ty: Type) {
        if !type_is_well_formed(ty) {
            self.error(node, format!("malformed type {}", ty));
        }
    }

    // Module scope

    fn check_module(&mut self) {
        let ast = self.ast;
        let globals = match ast.kind(ast.root) {
            NodeKind::Module { globals } => globals,
            other => {
                self.error(ast.root, format!("root must be a module, found {:?}", other.tag()));
                return;
            }
        };

        for (pos, g) in globals.iter().enumerate() {
            let name = match ast.kind(*g) {
                NodeKind::Function { name, .. } | NodeKind::Variable { name, .. } => name,
                other => {
                    self.error(*g, format!("{:?} is not a module-scope declaration", other.tag()));
                    continue;
                }
            };
            if self.globals.contains_key(name) {
                self.error(*g, format!("redeclaration of '{}'", name));
                continue;
            }
            self.globals.insert(name.clone(), (*g, pos));
        }

        for (pos, g) in globals.iter().enumerate() {
            if ast.kind(*g).tag() == NodeTag::Variable {
                self.check_global_variable(*g, pos);
            }
        }
        for (pos, g) in globals.iter().enumerate() {
            if ast.kind(*g).tag() == NodeTag::Function {
                self.check_function(*g, pos);
            }
        }
    }

    fn check_global_variable(&mut self, idx: NodeIndex, pos: usize) {
        let ast = self.ast;
        let NodeKind::Variable {
            name,
            mutability,
            storage,
            ty,
            initializer,
        } = ast.kind(idx)
        else {
            return;
        };

        match mutability {
            Mutability::Let => {
                self.error(idx, format!("'let {}' is not allowed at module scope", name))
            }
            Mutability::Var if *storage == StorageClass::Function => self.error(
                idx,
                format!("module-scope var '{}' cannot use function storage", name),
            ),
            Mutability::Var if *storage == StorageClass::Workgroup && initializer.is_some() => {
                self.error(idx, format!("workgroup var '{}' cannot have an initializer", name))
            }
            _ => {}
        }

        self.global_initializer = Some(pos);
        let init_ty = initializer.and_then(|init| {
            let t = self.resolve_expr(init);
            if !self.const_exprs.contains(&init) {
                self.error(
                    init,
                    format!("initializer of module-scope '{}' must be a constant expression", name),
                );
            }
            t
        });
        self.global_initializer = None;

        self.finish_declaration(idx, name, *mutability, *ty, *initializer, init_ty);
    }

    fn check_function(&mut self, idx: NodeIndex, pos: usize) {
        let ast = self.ast;
        let NodeKind::Function {
            name,
            params,
            return_type,
            attributes,
            body,
        } = ast.kind(idx)
        else {
            return;
        };

        for attr in attributes {
            self.check_attribute(*attr);
        }
        if let Some(rt) = return_type {
            self.check_type(idx, *rt);
        }

        self.function = Some(FunctionContext {
            position: pos,
            return_type: *return_type,
        });
        self.scopes.push(HashMap::new());
        for p in params {
            match ast.kind(*p) {
                NodeKind::Param { name, ty } => {
                    self.check_type(*p, *ty);
                    self.sem.decl_types.insert(*p, *ty);
                    self.declare(*p, name);
                }
                other => self.error(*p, format!("expected a parameter, found {:?}", other.tag())),
            }
        }

        match ast.kind(*body) {
            NodeKind::Block { statements } => {
                for s in statements {
                    self.resolve_stmt(*s);
                }
            }
            other => self.error(
                *body,
                format!("function body must be a block, found {:?}", other.tag()),
            ),
        }
        self.scopes.pop();
        self.function = None;

        if return_type.is_some() && !self.always_returns(*body) {
            self.error(idx, format!("function '{}' must return a value on every path", name));
        }
    }

    fn check_attribute(&mut self, idx: NodeIndex) {
        let ast = self.ast;
        match ast.kind(idx) {
            NodeKind::Attribute { name, args } => {
                if !KNOWN_ATTRIBUTES.contains(&name.as_str()) {
                    self.error(idx, format!("unknown attribute '{}'", name));
                }
                for a in args {
                    self.resolve_expr(*a);
                    if !self.const_exprs.contains(a) {
                        self.error(*a, "attribute arguments must be constant expressions");
                    }
                }
            }
            other => self.error(idx, format!("expected an attribute, found {:?}", other.tag())),
        }
    }

    // Names

    fn declare(&mut self, decl: NodeIndex, name: &str) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.contains_key(name) {
            self.error(decl, format!("redeclaration of '{}'", name));
            return;
        }
        scope.insert(name.to_string(), decl);
    }

    fn lookup(&self, name: &str) -> Option<NodeIndex> {
        for scope in self.scopes.iter().rev() {
            if let Some(decl) = scope.get(name) {
                return Some(*decl);
            }
        }
        let (decl, pos) = self.globals.get(name)?;
        match self.global_initializer {
            Some(current) if *pos >= current => None,
            _ => Some(*decl),
        }
    }

    /// Record a variable's type and bring it into scope
    fn finish_declaration(
        &mut self,
        idx: NodeIndex,
        name: &str,
        mutability: Mutability,
        declared: Option<Type>,
        initializer: Option<NodeIndex>,
        init_ty: Option<Type>,
    ) {
        if let Some(t) = declared {
            self.check_type(idx, t);
        }
        if declared.is_none() && initializer.is_none() {
            self.error(idx, format!("'{}' needs a type or an initializer", name));
        }
        if mutability != Mutability::Var && initializer.is_none() {
            self.error(
                idx,
                format!("'{} {}' must be initialized", mutability.keyword(), name),
            );
        }
        if let (Some(d), Some(i)) = (declared, init_ty) {
            if d != i {
                self.error(
                    idx,
                    format!(
                        "cannot initialize '{}' of type {} with a value of type {}",
                        name, d, i
                    ),
                );
            }
        }
        if let Some(t) = declared.or(init_ty) {
            self.sem.decl_types.insert(idx, t);
        }
        if !self.scopes.is_empty() {
            self.declare(idx, name);
        }
    }

    fn check_local_variable(&mut self, idx: NodeIndex) {
        let ast = self.ast;
        let NodeKind::Variable {
            name,
            mutability,
            storage,
            ty,
            initializer,
        } = ast.kind(idx)
        else {
            self.error(idx, format!("expected a variable, found {:?}", ast.kind(idx).tag()));
            return;
        };
        if *mutability == Mutability::Var && *storage != StorageClass::Function {
            self.error(
                idx,
                format!("function-scope var '{}' must use function storage", name),
            );
        }
        let init_ty = initializer.and_then(|init| {
            let t = self.resolve_expr(init);
            if *mutability == Mutability::Const && !self.const_exprs.contains(&init) {
                self.error(
                    init,
                    format!("initializer of 'const {}' must be a constant expression", name),
                );
            }
            t
        });
        self.finish_declaration(idx, name, *mutability, *ty, *initializer, init_ty);
    }

    // Statements

    fn resolve_stmt(&mut self, idx: NodeIndex) {
        let ast = self.ast;
        match ast.kind(idx) {
            NodeKind::Block { statements } => {
                self.scopes.push(HashMap::new());
                for s in statements {
                    self.resolve_stmt(*s);
                }
                self.scopes.pop();
            }
            NodeKind::VarDecl { variable } => self.check_local_variable(*variable),
            NodeKind::Assign { lhs, rhs } => {
                let lt = self.resolve_expr(*lhs);
                let rt = self.resolve_expr(*rhs);
                self.expect_reference(*lhs);
                if let (Some(l), Some(r)) = (lt, rt) {
                    if l != r {
                        self.error(idx, format!("cannot assign {} to {}", r, l));
                    }
                }
            }
            NodeKind::CompoundAssign { op, lhs, rhs } => {
                if !op.is_compound_assignable() {
                    self.error(idx, format!("'{}=' is not a compound assignment", op));
                }
                let lt = self.resolve_expr(*lhs);
                let rt = self.resolve_expr(*rhs);
                self.expect_reference(*lhs);
                if let (Some(l), Some(r)) = (lt, rt) {
                    if binary_result_type(*op, l, r) != Some(l) {
                        self.error(idx, format!("'{} {}= {}' does not produce {}", l, op, r, l));
                    }
                }
            }
            NodeKind::Increment { target, .. } => {
                let t = self.resolve_expr(*target);
                self.expect_reference(*target);
                if let Some(t) = t {
                    if !t.is_integer_scalar() {
                        self.error(idx, format!("cannot increment a value of type {}", t));
                    }
                }
            }
            NodeKind::If {
                condition,
                body,
                else_branch,
            } => {
                self.expect_condition(*condition);
                self.expect_block(*body);
                if let Some(e) = else_branch {
                    match ast.kind(*e).tag() {
                        NodeTag::Block | NodeTag::If => self.resolve_stmt(*e),
                        other => self.error(
                            *e,
                            format!("else branch must be a block or if, found {:?}", other),
                        ),
                    }
                }
            }
            NodeKind::Loop { body, continuing } => {
                // the continuing block sees the body's declarations
                self.scopes.push(HashMap::new());
                self.flow.push(Flow::Loop);
                match ast.kind(*body) {
                    NodeKind::Block { statements } => {
                        for s in statements {
                            self.resolve_stmt(*s);
                        }
                    }
                    other => self.error(
                        *body,
                        format!("loop body must be a block, found {:?}", other.tag()),
                    ),
                }
                if let Some(c) = continuing {
                    self.resolve_continuing(*c);
                }
                self.flow.pop();
                self.scopes.pop();
            }
            NodeKind::For {
                initializer,
                condition,
                update,
                body,
            } => {
                self.scopes.push(HashMap::new());
                if let Some(init) = initializer {
                    match ast.kind(*init).tag() {
                        NodeTag::VarDecl
                        | NodeTag::Assign
                        | NodeTag::CompoundAssign
                        | NodeTag::Increment
                        | NodeTag::CallStmt => self.resolve_stmt(*init),
                        other => {
                            self.error(*init, format!("{:?} cannot initialize a for loop", other))
                        }
                    }
                }
                if let Some(c) = condition {
                    self.expect_condition(*c);
                }
                if let Some(u) = update {
                    match ast.kind(*u).tag() {
                        NodeTag::Assign
                        | NodeTag::CompoundAssign
                        | NodeTag::Increment
                        | NodeTag::CallStmt => self.resolve_stmt(*u),
                        other => self.error(*u, format!("{:?} cannot update a for loop", other)),
                    }
                }
                self.flow.push(Flow::Loop);
                self.expect_block(*body);
                self.flow.pop();
                self.scopes.pop();
            }
            NodeKind::While { condition, body } => {
                self.expect_condition(*condition);
                self.flow.push(Flow::Loop);
                self.expect_block(*body);
                self.flow.pop();
            }
            NodeKind::Switch { selector, cases } => self.resolve_switch(idx, *selector, cases),
            NodeKind::Case { .. } => self.error(idx, "case clause outside of a switch"),
            NodeKind::Break => {
                if !matches!(self.flow.last(), Some(Flow::Loop | Flow::Switch)) {
                    self.error(idx, "break must be inside a loop or switch");
                }
            }
            NodeKind::Continue => {
                let target = self.flow.iter().rev().find(|f| **f != Flow::Switch);
                if target != Some(&Flow::Loop) {
                    self.error(idx, "continue must be inside a loop body");
                }
            }
            NodeKind::BreakIf { condition } => {
                self.resolve_expr(*condition);
                self.error(idx, "break-if must be the last statement of a continuing block");
            }
            NodeKind::Return { value } => {
                let expected = self.function.as_ref().and_then(|f| f.return_type);
                let got = value.and_then(|v| self.resolve_expr(v));
                match (expected, value, got) {
                    (None, Some(_), _) => self.error(idx, "void function cannot return a value"),
                    (Some(t), None, _) => {
                        self.error(idx, format!("return needs a value of type {}", t))
                    }
                    (Some(t), Some(_), Some(g)) if t != g => {
                        self.error(idx, format!("returning {} from a function returning {}", g, t))
                    }
                    _ => {}
                }
            }
            NodeKind::Discard => {}
            NodeKind::CallStmt { call } => {
                if ast.kind(*call).tag() == NodeTag::Call {
                    self.resolve_call(*call, true);
                } else {
                    self.error(*call, "call statement must hold a call");
                }
            }
            other => self.error(idx, format!("expected a statement, found {:?}", other.tag())),
        }
    }

    fn expect_block(&mut self, idx: NodeIndex) {
        if self.ast.kind(idx).tag() == NodeTag::Block {
            self.resolve_stmt(idx);
        } else {
            self.error(idx, format!("expected a block, found {:?}", self.ast.kind(idx).tag()));
        }
    }

    fn expect_condition(&mut self, idx: NodeIndex) {
        if let Some(t) = self.resolve_expr(idx) {
            if t != Type::BOOL {
                self.error(idx, format!("condition must be bool, found {}", t));
            }
        }
    }

    fn expect_reference(&mut self, idx: NodeIndex) {
        if !self.references.contains(&idx) {
            self.error(idx, "left side of assignment must be a reference to a var");
        }
    }

    fn resolve_continuing(&mut self, idx: NodeIndex) {
        let ast = self.ast;
        let NodeKind::Block { statements } = ast.kind(idx) else {
            self.error(idx, "continuing must be a block");
            return;
        };
        self.scopes.push(HashMap::new());
        self.flow.push(Flow::Continuing);
        for (i, s) in statements.iter().enumerate() {
            match ast.kind(*s) {
                NodeKind::BreakIf { condition } if i + 1 == statements.len() => {
                    self.expect_condition(*condition);
                }
                _ => self.resolve_stmt(*s),
            }
        }
        self.flow.pop();
        self.scopes.pop();
    }

    fn resolve_switch(&mut self, idx: NodeIndex, selector: NodeIndex, cases: &[NodeIndex]) {
        let ast = self.ast;
        let sel_ty = self.resolve_expr(selector);
        if let Some(t) = sel_ty {
            if !t.is_integer_scalar() {
                self.error(selector, format!("switch selector must be i32 or u32, found {}", t));
            }
        }

        self.flow.push(Flow::Switch);
        let mut defaults = 0;
        let mut seen = Vec::new();
        for case in cases {
            let NodeKind::Case {
                selectors,
                default,
                body,
            } = ast.kind(*case)
            else {
                self.error(*case, "switch may only contain case clauses");
                continue;
            };
            if *default {
                defaults += 1;
            } else if selectors.is_empty() {
                self.error(*case, "case clause needs a selector or the default label");
            }
            for s in selectors {
                let t = self.resolve_expr(*s);
                if !self.const_exprs.contains(s) {
                    self.error(*s, "case selector must be a constant expression");
                }
                if let (Some(t), Some(sel)) = (t, sel_ty) {
                    if t != sel {
                        let msg = format!("case selector of type {} in a switch on {}", t, sel);
                        self.error(*s, msg);
                    }
                }
                if let NodeKind::Literal(lit) = ast.kind(*s) {
                    if seen.contains(lit) {
                        self.error(*s, format!("duplicate case selector {}", lit));
                    }
                    seen.push(*lit);
                }
            }
            self.expect_block(*body);
        }
        self.flow.pop();

        if defaults != 1 {
            let msg = format!("switch must have exactly one default clause, found {}", defaults);
            self.error(idx, msg);
        }
    }

    // Expressions

    fn resolve_expr(&mut self, idx: NodeIndex) -> Option<Type> {
        let ast = self.ast;
        let ty = match ast.kind(idx) {
            NodeKind::Literal(lit) => {
                self.const_exprs.insert(idx);
                Some(lit.ty())
            }
            NodeKind::Ident { name } => self.resolve_ident(idx, name),
            NodeKind::Unary { op, operand } => {
                let t = self.resolve_expr(*operand)?;
                if self.const_exprs.contains(operand) {
                    self.const_exprs.insert(idx);
                }
                let r = unary_result_type(*op, t);
                if r.is_none() {
                    self.error(idx, format!("no operator {} for {}", op, t));
                }
                r
            }
            NodeKind::Binary { op, lhs, rhs } => {
                let lt = self.resolve_expr(*lhs);
                let rt = self.resolve_expr(*rhs);
                let (lt, rt) = (lt?, rt?);
                if self.const_exprs.contains(lhs) && self.const_exprs.contains(rhs) {
                    self.const_exprs.insert(idx);
                }
                let r = binary_result_type(*op, lt, rt);
                if r.is_none() {
                    self.error(idx, format!("no operator {} for {} and {}", op, lt, rt));
                }
                r
            }
            NodeKind::Call { .. } => self.resolve_call(idx, false),
            NodeKind::Construct { ty, args } => self.resolve_construct(idx, *ty, args),
            NodeKind::Member { object, member } => {
                let t = self.resolve_expr(*object)?;
                if self.const_exprs.contains(object) {
                    self.const_exprs.insert(idx);
                }
                self.resolve_swizzle(idx, *object, t, member)
            }
            NodeKind::Index { object, index } => {
                let ot = self.resolve_expr(*object);
                let it = self.resolve_expr(*index);
                let (ot, it) = (ot?, it?);
                if !it.is_integer_scalar() {
                    self.error(*index, format!("index must be i32 or u32, found {}", it));
                }
                if self.const_exprs.contains(object) && self.const_exprs.contains(index) {
                    self.const_exprs.insert(idx);
                }
                let (len, elem) = match ot {
                    Type::Vector { width, elem } => (width, Type::Scalar(elem)),
                    Type::Matrix { columns, rows } => (columns, Type::vec(rows, ScalarType::F32)),
                    Type::Scalar(_) => {
                        self.error(idx, format!("cannot index a value of type {}", ot));
                        return None;
                    }
                };
                let literal = match ast.kind(*index) {
                    NodeKind::Literal(Literal::I32(v)) => Some(*v as i64),
                    NodeKind::Literal(Literal::U32(v)) => Some(*v as i64),
                    _ => None,
                };
                if let Some(v) = literal {
                    if v < 0 || v >= len as i64 {
                        self.error(*index, format!("index {} out of bounds for {}", v, ot));
                    }
                }
                if self.references.contains(object) {
                    self.references.insert(idx);
                }
                Some(elem)
            }
            other => {
                self.error(idx, format!("expected an expression, found {:?}", other.tag()));
                None
            }
        };
        if let Some(t) = ty {
            self.sem.expr_types.insert(idx, t);
        }
        ty
    }

    fn resolve_ident(&mut self, idx: NodeIndex, name: &str) -> Option<Type> {
        let ast = self.ast;
        let Some(decl) = self.lookup(name) else {
            self.error(idx, format!("unresolved identifier '{}'", name));
            return None;
        };
        match ast.kind(decl) {
            NodeKind::Variable { mutability, .. } => {
                match mutability {
                    Mutability::Var => {
                        self.references.insert(idx);
                    }
                    Mutability::Const => {
                        self.const_exprs.insert(idx);
                    }
                    Mutability::Let => {}
                }
                if self.global_initializer.is_some() && *mutability == Mutability::Var {
                    self.error(idx, format!("module-scope initializer cannot read var '{}'", name));
                }
            }
            NodeKind::Param { .. } => {}
            other => {
                self.error(idx, format!("'{}' is a {:?}, not a value", name, other.tag()));
                return None;
            }
        }
        self.sem.resolved.insert(idx, decl);
        self.sem.decl_types.get(&decl).copied()
    }

    fn resolve_call(&mut self, idx: NodeIndex, as_statement: bool) -> Option<Type> {
        let ast = self.ast;
        let NodeKind::Call { function, args } = ast.kind(idx) else {
            return None;
        };
        let arg_types: Vec<Option<Type>> = args.iter().map(|a| self.resolve_expr(*a)).collect();

        let Some((callee, pos)) = self.globals.get(function).copied() else {
            self.error(idx, format!("call to undeclared function '{}'", function));
            return None;
        };
        let NodeKind::Function {
            params,
            return_type,
            ..
        } = ast.kind(callee)
        else {
            self.error(idx, format!("'{}' is not a function", function));
            return None;
        };
        match &self.function {
            Some(ctx) if pos < ctx.position => {}
            Some(_) => self.error(
                idx,
                format!("'{}' must be declared before the function that calls it", function),
            ),
            None => self.error(idx, format!("cannot call '{}' outside a function", function)),
        }
        self.sem.call_targets.insert(idx, callee);

        if params.len() != args.len() {
            self.error(
                idx,
                format!("'{}' takes {} arguments, {} given", function, params.len(), args.len()),
            );
        } else {
            for ((p, a), at) in params.iter().zip(args.iter()).zip(arg_types) {
                let pt = match ast.kind(*p) {
                    NodeKind::Param { ty, .. } => *ty,
                    _ => continue,
                };
                if let Some(at) = at {
                    if at != pt {
                        self.error(*a, format!("argument of type {} where {} is expected", at, pt));
                    }
                }
            }
        }

        if return_type.is_none() && !as_statement {
            self.error(idx, format!("'{}' does not return a value", function));
        }
        *return_type
    }

    fn resolve_construct(&mut self, idx: NodeIndex, ty: Type, args: &[NodeIndex]) -> Option<Type> {
        self.check_type(idx, ty);
        let types: Vec<Option<Type>> = args.iter().map(|a| self.resolve_expr(*a)).collect();
        let types: Option<Vec<Type>> = types.into_iter().collect();
        let types = types?;
        if args.iter().all(|a| self.const_exprs.contains(a)) {
            self.const_exprs.insert(idx);
        }

        let ok = match ty {
            _ if types.is_empty() => true,
            Type::Scalar(_) => types.len() == 1 && types[0].is_scalar(),
            Type::Vector { width, elem } => {
                let splat = types.len() == 1 && types[0] == Type::Scalar(elem);
                let convert = types.len() == 1 && types[0].is_vector() && types[0].width() == width;
                let components = types
                    .iter()
                    .all(|t| t.scalar_elem() == Some(elem) && !t.is_float_matrix())
                    && types.iter().map(|t| t.width() as u32).sum::<u32>() == width as u32;
                splat || convert || components
            }
            Type::Matrix { columns, rows } => {
                let by_column = types.len() == columns as usize
                    && types.iter().all(|t| *t == Type::vec(rows, ScalarType::F32));
                let by_element = types.len() == (columns * rows) as usize
                    && types.iter().all(|t| *t == Type::F32);
                by_column || by_element
            }
        };
        if !ok {
            let given: Vec<String> = types.iter().map(|t| t.to_string()).collect();
            self.error(idx, format!("cannot construct {} from ({})", ty, given.join(", ")));
            return None;
        }
        Some(ty)
    }

    fn resolve_swizzle(
        &mut self,
        idx: NodeIndex,
        object: NodeIndex,
        ty: Type,
        member: &str,
    ) -> Option<Type> {
        let Type::Vector { width, elem } = ty else {
            self.error(idx, format!("no member '{}' on {}", member, ty));
            return None;
        };
        let letters: Option<Vec<(u8, bool)>> = member.chars().map(swizzle_index).collect();
        let valid = match &letters {
            Some(l) if (1..=4).contains(&l.len()) => {
                let xyzw = l[0].1;
                l.iter().all(|(i, set)| *set == xyzw && *i < width)
            }
            _ => false,
        };
        if !valid {
            self.error(idx, format!("invalid swizzle '{}' on {}", member, ty));
            return None;
        }
        let len = member.len() as u8;
        if len == 1 {
            if self.references.contains(&object) {
                self.references.insert(idx);
            }
            Some(Type::Scalar(elem))
        } else {
            Some(Type::vec(len, elem))
        }
    }

    // Behaviour

    /// True if control cannot fall off the end of `idx`
    fn always_returns(&self, idx: NodeIndex) -> bool {
        match self.ast.kind(idx) {
            NodeKind::Return { .. } => true,
            NodeKind::Block { statements } => {
                for s in statements {
                    if self.always_returns(*s) {
                        return true;
                    }
                    if self.may_escape(*s) {
                        return false;
                    }
                }
                false
            }
            NodeKind::If {
                body,
                else_branch: Some(e),
                ..
            } => self.always_returns(*body) && self.always_returns(*e),
            NodeKind::Switch { cases, .. } => {
                !cases.is_empty()
                    && cases.iter().all(|c| match self.ast.kind(*c) {
                        NodeKind::Case { body, .. } => self.always_returns(*body),
                        _ => false,
                    })
            }
            NodeKind::Loop { body, continuing } => {
                !self.may_escape(*body) && !continuing.map_or(false, |c| self.may_escape(c))
            }
            NodeKind::For {
                condition: None,
                body,
                ..
            } => !self.may_escape(*body),
            _ => false,
        }
    }

    /// True if `idx` contains a break, break-if or continue that leaves it
    fn may_escape(&self, idx: NodeIndex) -> bool {
        match self.ast.kind(idx) {
            NodeKind::Break | NodeKind::BreakIf { .. } | NodeKind::Continue => true,
            NodeKind::Loop { .. } | NodeKind::For { .. } | NodeKind::While { .. } => false,
            NodeKind::Switch { cases, .. } => cases.iter().any(|c| match self.ast.kind(*c) {
                // a break inside a case leaves the switch only
                NodeKind::Case { body, .. } => self.contains_continue(*body),
                _ => false,
            }),
            NodeKind::Block { statements } => statements.iter().any(|s| self.may_escape(*s)),
            NodeKind::If {
                body, else_branch, ..
            } => self.may_escape(*body) || else_branch.map_or(false, |e| self.may_escape(e)),
            _ => false,
        }
    }

    fn contains_continue(&self, idx: NodeIndex) -> bool {
        match self.ast.kind(idx) {
            NodeKind::Continue => true,
            NodeKind::Loop { .. } | NodeKind::For { .. } | NodeKind::While { .. } => false,
            other => other
                .children()
                .into_iter()
                .filter(|c| self.ast.kind(*c).is_statement())
                .any(|c| self.contains_continue(c)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ProgramBuilder;
    use crate::program::Program;

    fn validate(build: impl FnOnce(&mut ProgramBuilder) -> Vec<NodeIndex>) -> Program {
        let mut b = ProgramBuilder::new();
        let globals = build(&mut b);
        b.build(globals, &Resolver::new())
    }

    fn main_with(b: &mut ProgramBuilder, statements: Vec<NodeIndex>) -> Vec<NodeIndex> {
        let body = b.block(statements);
        vec![b.function("main", vec![], None, body)]
    }

    fn has_error(program: &Program, needle: &str) -> bool {
        program.diagnostics().iter().any(|d| d.message.contains(needle))
    }

    #[test]
    fn test_binary_result_types() {
        let v3 = Type::vec(3, ScalarType::F32);
        let u2 = Type::vec(2, ScalarType::U32);
        assert_eq!(binary_result_type(BinaryOp::Add, Type::I32, Type::I32), Some(Type::I32));
        assert_eq!(binary_result_type(BinaryOp::LessThan, Type::I32, Type::I32), Some(Type::BOOL));
        assert_eq!(binary_result_type(BinaryOp::Add, Type::I32, Type::U32), None);
        assert_eq!(binary_result_type(BinaryOp::Multiply, v3, Type::F32), Some(v3));
        assert_eq!(
            binary_result_type(BinaryOp::Multiply, Type::mat(3, 2), v3),
            Some(Type::vec(2, ScalarType::F32))
        );
        assert_eq!(
            binary_result_type(BinaryOp::Multiply, Type::mat(2, 3), Type::mat(4, 2)),
            Some(Type::mat(4, 3))
        );
        assert_eq!(binary_result_type(BinaryOp::Divide, Type::mat(2, 2), Type::mat(2, 2)), None);
        assert_eq!(binary_result_type(BinaryOp::ShiftLeft, Type::I32, Type::U32), Some(Type::I32));
        assert_eq!(binary_result_type(BinaryOp::ShiftLeft, Type::I32, Type::I32), None);
        assert_eq!(binary_result_type(BinaryOp::ShiftLeft, u2, Type::U32), None);
        assert_eq!(binary_result_type(BinaryOp::Xor, Type::BOOL, Type::BOOL), None);
        assert_eq!(
            binary_result_type(BinaryOp::Equal, u2, u2),
            Some(Type::vec(2, ScalarType::Bool))
        );
        assert_eq!(
            binary_result_type(BinaryOp::LogicalAnd, Type::BOOL, Type::BOOL),
            Some(Type::BOOL)
        );
    }

    #[test]
    fn test_unary_result_types() {
        assert_eq!(unary_result_type(UnaryOp::Negation, Type::U32), None);
        assert_eq!(unary_result_type(UnaryOp::Complement, Type::U32), Some(Type::U32));
        assert_eq!(unary_result_type(UnaryOp::Not, Type::I32), None);
        assert_eq!(unary_result_type(UnaryOp::Negation, Type::mat(2, 2)), None);
    }

    #[test]
    fn test_valid_program_records_semantics() {
        let mut ident = NodeIndex(0);
        let mut decl_var = NodeIndex(0);
        let program = validate(|b| {
            let five = b.lit_i32(5);
            let decl = b.var_decl("a", five);
            decl_var = match b.kind(decl) {
                NodeKind::VarDecl { variable } => *variable,
                _ => unreachable!(),
            };
            ident = b.ident("a");
            let six = b.lit_i32(6);
            let assign = b.assign(ident, six);
            main_with(b, vec![decl, assign])
        });
        assert!(program.is_valid(), "{:?}", program.diagnostics());
        let sem = program.semantics();
        assert_eq!(sem.declaration_of(ident), Some(decl_var));
        assert_eq!(sem.type_of(ident), Some(Type::I32));
        assert_eq!(sem.decl_type(decl_var), Some(Type::I32));
    }

    #[test]
    fn test_assign_to_let_rejected() {
        let program = validate(|b| {
            let five = b.lit_i32(5);
            let decl = b.let_decl("a", five);
            let a = b.ident("a");
            let six = b.lit_i32(6);
            let assign = b.assign(a, six);
            main_with(b, vec![decl, assign])
        });
        assert!(!program.is_valid());
        assert!(has_error(&program, "reference to a var"));
    }

    #[test]
    fn test_use_before_declaration_rejected() {
        let program = validate(|b| {
            let a = b.ident("a");
            let use_a = b.let_decl("b", a);
            let one = b.lit_i32(1);
            let decl = b.var_decl("a", one);
            main_with(b, vec![use_a, decl])
        });
        assert!(has_error(&program, "unresolved identifier 'a'"));
    }

    #[test]
    fn test_shadowing_and_redeclaration() {
        let shadow = validate(|b| {
            let one = b.lit_i32(1);
            let outer = b.var_decl("a", one);
            let t = b.lit_bool(true);
            let inner = b.let_decl("a", t);
            let block = b.block(vec![inner]);
            main_with(b, vec![outer, block])
        });
        assert!(shadow.is_valid(), "{:?}", shadow.diagnostics());

        let redeclared = validate(|b| {
            let one = b.lit_i32(1);
            let first = b.var_decl("a", one);
            let two = b.lit_i32(2);
            let second = b.var_decl("a", two);
            main_with(b, vec![first, second])
        });
        assert!(has_error(&redeclared, "redeclaration of 'a'"));
    }

    #[test]
    fn test_break_placement() {
        let outside = validate(|b| {
            let brk = b.break_stmt();
            main_with(b, vec![brk])
        });
        assert!(has_error(&outside, "break must be inside"));

        let inside = validate(|b| {
            let brk = b.break_stmt();
            let body = b.block(vec![brk]);
            let lp = b.loop_stmt(body, None);
            main_with(b, vec![lp])
        });
        assert!(inside.is_valid(), "{:?}", inside.diagnostics());
    }

    #[test]
    fn test_break_if_must_end_continuing() {
        let good = validate(|b| {
            let body = b.block(vec![]);
            let t = b.lit_bool(true);
            let bi = b.break_if(t);
            let cont = b.block(vec![bi]);
            let lp = b.loop_stmt(body, Some(cont));
            main_with(b, vec![lp])
        });
        assert!(good.is_valid(), "{:?}", good.diagnostics());

        let bad = validate(|b| {
            let t = b.lit_bool(true);
            let bi = b.break_if(t);
            let body = b.block(vec![bi]);
            let lp = b.loop_stmt(body, None);
            main_with(b, vec![lp])
        });
        assert!(has_error(&bad, "break-if must be the last statement"));
    }

    #[test]
    fn test_missing_return_rejected() {
        let program = validate(|b| {
            let body = b.block(vec![]);
            vec![b.function("f", vec![], Some(Type::I32), body)]
        });
        assert!(has_error(&program, "must return a value on every path"));

        let both_branches = validate(|b| {
            let c = b.lit_bool(true);
            let one = b.lit_i32(1);
            let r1 = b.return_stmt(Some(one));
            let then_b = b.block(vec![r1]);
            let two = b.lit_i32(2);
            let r2 = b.return_stmt(Some(two));
            let else_b = b.block(vec![r2]);
            let iff = b.if_stmt(c, then_b, Some(else_b));
            let body = b.block(vec![iff]);
            vec![b.function("f", vec![], Some(Type::I32), body)]
        });
        assert!(both_branches.is_valid(), "{:?}", both_branches.diagnostics());
    }

    #[test]
    fn test_switch_needs_one_default() {
        let program = validate(|b| {
            let sel = b.lit_i32(1);
            let s1 = b.lit_i32(1);
            let body = b.block(vec![]);
            let case = b.case(vec![s1], body);
            let sw = b.switch(sel, vec![case]);
            main_with(b, vec![sw])
        });
        assert!(has_error(&program, "exactly one default"));
    }

    #[test]
    fn test_call_order_and_arity() {
        let program = validate(|b| {
            let x = b.param("x", Type::I32);
            let xr = b.ident("x");
            let ret = b.return_stmt(Some(xr));
            let helper_body = b.block(vec![ret]);
            let helper = b.function("helper", vec![x], Some(Type::I32), helper_body);

            let one = b.lit_i32(1);
            let call = b.call("helper", vec![one]);
            let decl = b.let_decl("r", call);
            let main_body = b.block(vec![decl]);
            let main = b.function("main", vec![], None, main_body);
            vec![helper, main]
        });
        assert!(program.is_valid(), "{:?}", program.diagnostics());

        let backwards = validate(|b| {
            let call = b.call_stmt("later", vec![]);
            let main_body = b.block(vec![call]);
            let main = b.function("main", vec![], None, main_body);
            let later_body = b.block(vec![]);
            let later = b.function("later", vec![], None, later_body);
            vec![main, later]
        });
        assert!(has_error(&backwards, "must be declared before"));
    }

    #[test]
    fn test_globals_and_swizzles() {
        let program = validate(|b| {
            let zero = b.lit_f32(0.0);
            let v = b.construct(Type::vec(3, ScalarType::F32), vec![zero]);
            let g = b.global_var("g", Type::vec(3, ScalarType::F32), Some(v));

            let gx = b.ident("g");
            let x = b.member(gx, "x");
            let one = b.lit_f32(1.0);
            let assign = b.assign(x, one);

            let gy = b.ident("g");
            let yz = b.member(gy, "yz");
            let decl = b.let_decl("p", yz);
            let mut globals = vec![g];
            globals.extend(main_with(b, vec![assign, decl]));
            globals
        });
        assert!(program.is_valid(), "{:?}", program.diagnostics());

        let bad = validate(|b| {
            let v = b.construct(Type::vec(2, ScalarType::F32), vec![]);
            let decl = b.let_decl("v", v);
            let vr = b.ident("v");
            let z = b.member(vr, "z");
            let use_z = b.let_decl("z", z);
            main_with(b, vec![decl, use_z])
        });
        assert!(has_error(&bad, "invalid swizzle"));
    }

    #[test]
    fn test_global_initializer_must_be_const() {
        let program = validate(|b| {
            let one = b.lit_i32(1);
            let a = b.global_var("a", Type::I32, Some(one));
            let ar = b.ident("a");
            let bvar = b.global_var("b", Type::I32, Some(ar));
            let mut globals = vec![a, bvar];
            globals.extend(main_with(b, vec![]));
            globals
        });
        assert!(has_error(&program, "constant expression"));
    }
}
