//! Type-preserving operator substitutions.

use treemut_ir::validation::{binary_result_type, unary_result_type};
use treemut_ir::{BinaryOp, NodeIndex, NodeKind, Program, Type, UnaryOp};

/// True if `lhs new_op rhs` is well-typed and has the type of `lhs old_op rhs`
pub fn binary_operator_allowed(old_op: BinaryOp, new_op: BinaryOp, lhs: Type, rhs: Type) -> bool {
    if old_op == new_op {
        return false;
    }
    let by_family = match old_op {
        BinaryOp::Add | BinaryOp::Subtract => replaces_add_subtract(lhs, rhs, new_op),
        BinaryOp::Multiply => replaces_multiply(lhs, rhs, new_op),
        BinaryOp::Divide | BinaryOp::Modulo => replaces_divide_modulo(lhs, rhs, new_op),
        BinaryOp::And | BinaryOp::Or => replaces_and_or(lhs, rhs, new_op),
        BinaryOp::Xor => replaces_xor(lhs, rhs, new_op),
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => replaces_shift(lhs, rhs, new_op),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => matches!(
            new_op,
            BinaryOp::LogicalAnd
                | BinaryOp::LogicalOr
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Equal
                | BinaryOp::NotEqual
        ),
        BinaryOp::Equal | BinaryOp::NotEqual => replaces_equality(lhs, new_op),
        BinaryOp::LessThan
        | BinaryOp::LessThanEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanEqual => new_op.is_comparison(),
    };
    by_family && {
        let before = binary_result_type(old_op, lhs, rhs);
        before.is_some() && binary_result_type(new_op, lhs, rhs) == before
    }
}

fn suits_shift(lhs: Type, rhs: Type) -> bool {
    if rhs.is_unsigned_integer_scalar() {
        return lhs.is_integer_scalar();
    }
    if rhs.is_unsigned_integer_vector() {
        return lhs.is_unsigned_integer_vector();
    }
    false
}

fn homogeneous_integers(lhs: Type, rhs: Type) -> bool {
    lhs == rhs && lhs.is_integer_scalar_or_vector()
}

fn replaces_add_subtract(lhs: Type, rhs: Type, new_op: BinaryOp) -> bool {
    match new_op {
        BinaryOp::Add | BinaryOp::Subtract => true,
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => homogeneous_integers(lhs, rhs),
        // matrix sums only become products when square
        BinaryOp::Multiply => !lhs.is_float_matrix() || lhs.is_square_float_matrix(),
        BinaryOp::Divide | BinaryOp::Modulo => {
            lhs.is_numeric_scalar_or_vector() && rhs.is_numeric_scalar_or_vector()
        }
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => suits_shift(lhs, rhs),
        _ => false,
    }
}

fn replaces_multiply(lhs: Type, rhs: Type, new_op: BinaryOp) -> bool {
    match new_op {
        BinaryOp::Multiply => true,
        BinaryOp::Add | BinaryOp::Subtract => {
            (lhs.is_square_float_matrix() && rhs.is_square_float_matrix())
                || (lhs.is_numeric_scalar_or_vector() && rhs.is_numeric_scalar_or_vector())
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => homogeneous_integers(lhs, rhs),
        BinaryOp::Divide | BinaryOp::Modulo => {
            lhs.is_numeric_scalar_or_vector() && rhs.is_numeric_scalar_or_vector()
        }
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => suits_shift(lhs, rhs),
        _ => false,
    }
}

fn replaces_divide_modulo(lhs: Type, rhs: Type, new_op: BinaryOp) -> bool {
    match new_op {
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => true,
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => homogeneous_integers(lhs, rhs),
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => suits_shift(lhs, rhs),
        _ => false,
    }
}

fn replaces_and_or(lhs: Type, rhs: Type, new_op: BinaryOp) -> bool {
    match new_op {
        BinaryOp::And | BinaryOp::Or => true,
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo
        | BinaryOp::Xor => !lhs.is_bool_scalar_or_vector(),
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => suits_shift(lhs, rhs),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => lhs.is_bool_scalar(),
        BinaryOp::Equal | BinaryOp::NotEqual => lhs.is_bool_scalar_or_vector(),
        _ => false,
    }
}

fn replaces_xor(lhs: Type, rhs: Type, new_op: BinaryOp) -> bool {
    match new_op {
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo
        | BinaryOp::And
        | BinaryOp::Or
        | BinaryOp::Xor => true,
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => suits_shift(lhs, rhs),
        _ => false,
    }
}

fn replaces_shift(lhs: Type, rhs: Type, new_op: BinaryOp) -> bool {
    match new_op {
        BinaryOp::ShiftLeft | BinaryOp::ShiftRight => true,
        // shifts mix signedness; other integer operators need matching operands
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo
        | BinaryOp::And
        | BinaryOp::Or
        | BinaryOp::Xor => lhs == rhs,
        _ => false,
    }
}

fn replaces_equality(lhs: Type, new_op: BinaryOp) -> bool {
    match new_op {
        BinaryOp::Equal | BinaryOp::NotEqual => true,
        BinaryOp::LessThan
        | BinaryOp::LessThanEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanEqual => lhs.is_numeric_scalar_or_vector(),
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => lhs.is_bool_scalar(),
        BinaryOp::And | BinaryOp::Or => lhs.is_bool_scalar_or_vector(),
        _ => false,
    }
}

fn binary_operand_types(program: &Program, expr: NodeIndex) -> Option<(BinaryOp, Type, Type)> {
    let NodeKind::Binary { op, lhs, rhs } = program.kind(expr) else {
        return None;
    };
    let sem = program.semantics();
    Some((*op, sem.type_of(*lhs)?, sem.type_of(*rhs)?))
}

/// True if the binary expression `expr` may switch to `new_op`
pub fn can_replace_binary_operator(program: &Program, expr: NodeIndex, new_op: BinaryOp) -> bool {
    binary_operand_types(program, expr)
        .map_or(false, |(op, lhs, rhs)| binary_operator_allowed(op, new_op, lhs, rhs))
}

/// Every operator the binary expression `expr` may switch to
pub fn binary_operator_replacements(program: &Program, expr: NodeIndex) -> Vec<BinaryOp> {
    let Some((op, lhs, rhs)) = binary_operand_types(program, expr) else {
        return Vec::new();
    };
    BinaryOp::ALL
        .into_iter()
        .filter(|new_op| binary_operator_allowed(op, *new_op, lhs, rhs))
        .collect()
}

/// Negation and complement swap on signed integers; nothing else changes.
pub fn unary_operator_allowed(old_op: UnaryOp, new_op: UnaryOp, operand: Type) -> bool {
    old_op != new_op
        && operand.is_signed_integer_scalar_or_vector()
        && matches!(old_op, UnaryOp::Negation | UnaryOp::Complement)
        && matches!(new_op, UnaryOp::Negation | UnaryOp::Complement)
}

pub fn can_replace_unary_operator(program: &Program, expr: NodeIndex, new_op: UnaryOp) -> bool {
    let NodeKind::Unary { op, operand } = program.kind(expr) else {
        return false;
    };
    program
        .semantics()
        .type_of(*operand)
        .map_or(false, |t| unary_operator_allowed(*op, new_op, t))
}

pub fn unary_operator_replacements(program: &Program, expr: NodeIndex) -> Vec<UnaryOp> {
    UnaryOp::ALL
        .into_iter()
        .filter(|new_op| can_replace_unary_operator(program, expr, *new_op))
        .collect()
}

/// Unary operators that can wrap a value of type `ty` without changing its type
pub fn wrap_operators(ty: Type) -> Vec<UnaryOp> {
    let ops: &[UnaryOp] = if ty.is_bool_scalar_or_vector() {
        &[UnaryOp::Not]
    } else if ty.is_signed_integer_scalar_or_vector() {
        &[UnaryOp::Negation, UnaryOp::Complement]
    } else if ty.is_unsigned_integer_scalar_or_vector() {
        &[UnaryOp::Complement]
    } else if ty.is_float_scalar_or_vector() {
        &[UnaryOp::Negation]
    } else {
        &[]
    };
    ops.iter()
        .copied()
        .filter(|op| unary_result_type(*op, ty) == Some(ty))
        .collect()
}
