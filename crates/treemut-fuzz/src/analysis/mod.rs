//! Read-only analyses over a program snapshot.
//!
//! Each analysis is computed once per program and queried by the mutation finders and
//! by the applicability checks of individual mutations.

pub mod deletion;
pub mod expression_size;
pub mod jump_tracker;
pub mod operators;
pub mod parents;
pub mod scope;

pub use deletion::{can_delete, deletion_site, DeletionSite};
pub use expression_size::ExpressionSize;
pub use jump_tracker::JumpTracker;
pub use parents::ParentMap;
pub use scope::{declaration_name, visible_declarations};
