//! Printer from tree programs to WGSL-like source text.

use crate::node::{Mutability, NodeIndex, NodeKind, StorageClass};
use crate::program::{Ast, Program};

pub struct Printer {
    config: PrinterConfig,
}

#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub indent_width: usize,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self { indent_width: 2 }
    }
}

impl Default for Printer {
    fn default() -> Self {
        Self::new(PrinterConfig::default())
    }
}

impl Printer {
    pub fn new(config: PrinterConfig) -> Self {
        Self { config }
    }

    pub fn print(&self, program: &Program) -> String {
        self.print_ast(program.ast())
    }

    pub fn print_ast(&self, ast: &Ast) -> String {
        let mut out = Output {
            ast,
            text: String::new(),
            depth: 0,
            indent_width: self.config.indent_width,
        };
        out.module();
        out.text
    }

    /// Source text of a single expression
    pub fn print_expr(&self, ast: &Ast, expr: NodeIndex) -> String {
        let out = Output {
            ast,
            text: String::new(),
            depth: 0,
            indent_width: self.config.indent_width,
        };
        out.expr(expr)
    }
}

struct Output<'a> {
    ast: &'a Ast,
    text: String,
    depth: usize,
    indent_width: usize,
}

impl<'a> Output<'a> {
    fn line(&mut self, s: &str) {
        for _ in 0..self.depth * self.indent_width {
            self.text.push(' ');
        }
        self.text.push_str(s);
        self.text.push('\n');
    }

    fn module(&mut self) {
        let ast = self.ast;
        let NodeKind::Module { globals } = ast.kind(ast.root) else {
            return;
        };
        for (i, g) in globals.iter().enumerate() {
            if i > 0 {
                self.text.push('\n');
            }
            match ast.kind(*g) {
                NodeKind::Function { .. } => self.function(*g),
                _ => {
                    let decl = self.declaration(*g);
                    self.line(&format!("{};", decl));
                }
            }
        }
    }

    fn function(&mut self, idx: NodeIndex) {
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

        if !attributes.is_empty() {
            let attrs: Vec<String> = attributes.iter().map(|a| self.attribute(*a)).collect();
            self.line(&attrs.join(" "));
        }
        let params: Vec<String> = params
            .iter()
            .map(|p| match ast.kind(*p) {
                NodeKind::Param { name, ty } => format!("{} : {}", name, ty),
                other => format!("/* {:?} */", other.tag()),
            })
            .collect();
        let ret = return_type
            .map(|t| format!(" -> {}", t))
            .unwrap_or_default();
        self.line(&format!("fn {}({}){} {{", name, params.join(", "), ret));
        self.block_body(*body);
        self.line("}");
    }

    fn attribute(&self, idx: NodeIndex) -> String {
        match self.ast.kind(idx) {
            NodeKind::Attribute { name, args } if args.is_empty() => format!("@{}", name),
            NodeKind::Attribute { name, args } => format!("@{}({})", name, self.expr_list(args)),
            other => format!("/* {:?} */", other.tag()),
        }
    }

    /// `var<private> x : i32 = 1i` without the trailing semicolon
    fn declaration(&self, idx: NodeIndex) -> String {
        let NodeKind::Variable {
            name,
            mutability,
            storage,
            ty,
            initializer,
        } = self.ast.kind(idx)
        else {
            return format!("/* {:?} */", self.ast.kind(idx).tag());
        };
        let mut s = match (mutability, storage) {
            (Mutability::Var, StorageClass::Function) => "var".to_string(),
            (Mutability::Var, storage) => format!("var<{}>", storage.name()),
            (m, _) => m.keyword().to_string(),
        };
        s.push(' ');
        s.push_str(name);
        if let Some(t) = ty {
            s.push_str(&format!(" : {}", t));
        }
        if let Some(init) = initializer {
            s.push_str(" = ");
            s.push_str(&self.expr(*init));
        }
        s
    }

    fn block_body(&mut self, block: NodeIndex) {
        self.depth += 1;
        match self.ast.kind(block) {
            NodeKind::Block { statements } => {
                for s in statements {
                    self.stmt(*s);
                }
            }
            _ => self.stmt(block),
        }
        self.depth -= 1;
    }

    fn stmt(&mut self, idx: NodeIndex) {
        let ast = self.ast;
        match ast.kind(idx) {
            NodeKind::Block { .. } => {
                self.line("{");
                self.block_body(idx);
                self.line("}");
            }
            NodeKind::If { .. } => {
                self.if_chain(idx, "");
                self.line("}");
            }
            NodeKind::Loop { body, continuing } => {
                self.line("loop {");
                self.block_body(*body);
                if let Some(c) = continuing {
                    self.depth += 1;
                    self.line("continuing {");
                    self.block_body(*c);
                    self.line("}");
                    self.depth -= 1;
                }
                self.line("}");
            }
            NodeKind::For {
                initializer,
                condition,
                update,
                body,
            } => {
                let init = initializer.map(|i| self.simple_stmt(i)).unwrap_or_default();
                let cond = condition.map(|c| self.expr(c)).unwrap_or_default();
                let upd = update.map(|u| self.simple_stmt(u)).unwrap_or_default();
                self.line(&format!("for({}; {}; {}) {{", init, cond, upd));
                self.block_body(*body);
                self.line("}");
            }
            NodeKind::While { condition, body } => {
                let cond = self.expr(*condition);
                self.line(&format!("while({}) {{", cond));
                self.block_body(*body);
                self.line("}");
            }
            NodeKind::Switch { selector, cases } => {
                let sel = self.expr(*selector);
                self.line(&format!("switch({}) {{", sel));
                self.depth += 1;
                for case in cases {
                    let NodeKind::Case {
                        selectors,
                        default,
                        body,
                    } = ast.kind(*case)
                    else {
                        continue;
                    };
                    let mut labels: Vec<String> = selectors.iter().map(|s| self.expr(*s)).collect();
                    if *default {
                        labels.push("default".to_string());
                    }
                    let head = if selectors.is_empty() {
                        "default: {".to_string()
                    } else {
                        format!("case {}: {{", labels.join(", "))
                    };
                    self.line(&head);
                    self.block_body(*body);
                    self.line("}");
                }
                self.depth -= 1;
                self.line("}");
            }
            _ => {
                let s = self.simple_stmt(idx);
                self.line(&format!("{};", s));
            }
        }
    }

    fn if_chain(&mut self, idx: NodeIndex, prefix: &str) {
        let ast = self.ast;
        let NodeKind::If {
            condition,
            body,
            else_branch,
        } = ast.kind(idx)
        else {
            return;
        };
        let cond = self.expr(*condition);
        self.line(&format!("{}if ({}) {{", prefix, cond));
        self.block_body(*body);
        match else_branch.map(|e| (e, ast.kind(e))) {
            Some((e, NodeKind::If { .. })) => self.if_chain(e, "} else "),
            Some((e, _)) => {
                self.line("} else {");
                self.block_body(e);
            }
            None => {}
        }
    }

    /// A statement that fits on one line, without the semicolon
    fn simple_stmt(&self, idx: NodeIndex) -> String {
        match self.ast.kind(idx) {
            NodeKind::VarDecl { variable } => self.declaration(*variable),
            NodeKind::Assign { lhs, rhs } => format!("{} = {}", self.expr(*lhs), self.expr(*rhs)),
            NodeKind::CompoundAssign { op, lhs, rhs } => {
                format!("{} {}= {}", self.expr(*lhs), op, self.expr(*rhs))
            }
            NodeKind::Increment { target, increment } => {
                format!("{}{}", self.expr(*target), if *increment { "++" } else { "--" })
            }
            NodeKind::Break => "break".to_string(),
            NodeKind::Continue => "continue".to_string(),
            NodeKind::BreakIf { condition } => format!("break if {}", self.expr(*condition)),
            NodeKind::Return { value: None } => "return".to_string(),
            NodeKind::Return { value: Some(v) } => format!("return {}", self.expr(*v)),
            NodeKind::Discard => "discard".to_string(),
            NodeKind::CallStmt { call } => self.expr(*call),
            other => format!("/* {:?} */", other.tag()),
        }
    }

    fn expr_list(&self, items: &[NodeIndex]) -> String {
        let parts: Vec<String> = items.iter().map(|i| self.expr(*i)).collect();
        parts.join(", ")
    }

    fn expr(&self, idx: NodeIndex) -> String {
        match self.ast.kind(idx) {
            NodeKind::Literal(lit) => lit.to_string(),
            NodeKind::Ident { name } => name.clone(),
            NodeKind::Unary { op, operand } => format!("{}({})", op, self.expr(*operand)),
            NodeKind::Binary { op, lhs, rhs } => {
                format!("({} {} {})", self.expr(*lhs), op, self.expr(*rhs))
            }
            NodeKind::Call { function, args } => format!("{}({})", function, self.expr_list(args)),
            NodeKind::Construct { ty, args } => format!("{}({})", ty, self.expr_list(args)),
            NodeKind::Member { object, member } => format!("{}.{}", self.expr(*object), member),
            NodeKind::Index { object, index } => {
                format!("{}[{}]", self.expr(*object), self.expr(*index))
            }
            other => format!("/* {:?} */", other.tag()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ProgramBuilder;
    use crate::ops::UnaryOp;
    use crate::types::Type;
    use crate::validation::Resolver;

    #[test]
    fn test_print_function() {
        let mut b = ProgramBuilder::new();
        let a = b.ident("a");
        let five = b.lit_i32(5);
        let cmp = b.less_than(a, five);
        let not = b.unary(UnaryOp::Not, cmp);
        let ret_t = b.lit_i32(1);
        let ret = b.return_stmt(Some(ret_t));
        let then_b = b.block(vec![ret]);
        let iff = b.if_stmt(not, then_b, None);
        let zero = b.lit_i32(0);
        let ret0 = b.return_stmt(Some(zero));
        let body = b.block(vec![iff, ret0]);
        let param = b.param("a", Type::I32);
        let f = b.function("f", vec![param], Some(Type::I32), body);
        let program = b.build(vec![f], &Resolver::new());
        assert!(program.is_valid(), "{:?}", program.diagnostics());

        let text = Printer::default().print(&program);
        let expected = "\
fn f(a : i32) -> i32 {
  if (!((a < 5i))) {
    return 1i;
  }
  return 0i;
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_print_loops_and_globals() {
        let mut b = ProgramBuilder::new();
        let init = b.lit_u32(0);
        let g = b.global_var("counter", Type::U32, Some(init));

        let c = b.ident("counter");
        let inc = b.increment(c);
        let t = b.lit_bool(true);
        let bi = b.break_if(t);
        let body = b.block(vec![inc]);
        let cont = b.block(vec![bi]);
        let lp = b.loop_stmt(body, Some(cont));
        let main_body = b.block(vec![lp]);
        let main = b.entry_point("main", "compute", main_body);
        let program = b.build(vec![g, main], &Resolver::new());
        assert!(program.is_valid(), "{:?}", program.diagnostics());

        let text = Printer::default().print(&program);
        let expected = "\
var<private> counter : u32 = 0u;

@compute
fn main() {
  loop {
    counter++;
    continuing {
      break if true;
    }
  }
}
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_print_switch_and_else_if() {
        let mut b = ProgramBuilder::new();
        let sel = b.lit_i32(1);
        let one = b.lit_i32(1);
        let two = b.lit_i32(2);
        let brk = b.break_stmt();
        let case_body = b.block(vec![brk]);
        let case = b.case(vec![one, two], case_body);
        let def_body = b.block(vec![]);
        let def = b.default_case(def_body);
        let sw = b.switch(sel, vec![case, def]);

        let c1 = b.lit_bool(false);
        let c2 = b.lit_bool(true);
        let inner_body = b.block(vec![]);
        let else_body = b.block(vec![]);
        let inner = b.if_stmt(c2, inner_body, Some(else_body));
        let outer_body = b.block(vec![]);
        let outer = b.if_stmt(c1, outer_body, Some(inner));

        let body = b.block(vec![sw, outer]);
        let main = b.function("main", vec![], None, body);
        let program = b.build(vec![main], &Resolver::new());
        assert!(program.is_valid(), "{:?}", program.diagnostics());

        let text = Printer::default().print(&program);
        let expected = "\
fn main() {
  switch(1i) {
    case 1i, 2i: {
      break;
    }
    default: {
    }
  }
  if (false) {
  } else if (true) {
  } else {
  }
}
";
        assert_eq!(text, expected);
    }
}
