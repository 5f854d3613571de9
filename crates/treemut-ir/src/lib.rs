//! Tree program representation, identity tracking and the clone engine.

pub mod builder;
pub mod clone;
pub mod node;
pub mod node_id_map;
pub mod ops;
pub mod printer;
pub mod program;
pub mod types;
pub mod validation;

pub use builder::ProgramBuilder;
pub use clone::{CloneContext, Insertion, KindFilter, Replacement};
pub use node::{
    ListField, Literal, Mutability, Node, NodeFamily, NodeIndex, NodeKind, NodeTag, StorageClass,
};
pub use node_id_map::NodeIdMap;
pub use ops::{BinaryOp, UnaryOp};
pub use printer::{Printer, PrinterConfig};
pub use program::{Ast, Program};
pub use types::{ScalarType, Type};
pub use validation::{Diagnostic, Resolver, Semantics, Severity, ValidationReport, Validator};
