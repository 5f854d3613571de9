//! Mutation kinds and their finders.

mod change_binary_operator;
mod change_unary_operator;
mod delete_statement;
mod replace_identifier;
mod wrap_unary_operator;

pub use change_binary_operator::{ChangeBinaryOperator, ChangeBinaryOperatorFinder};
pub use change_unary_operator::{ChangeUnaryOperator, ChangeUnaryOperatorFinder};
pub use delete_statement::{DeleteStatement, DeleteStatementFinder};
pub use replace_identifier::{ReplaceIdentifier, ReplaceIdentifierFinder};
pub use wrap_unary_operator::{WrapUnaryOperator, WrapUnaryOperatorFinder};
