//! Brio: a reactive runtime for a small business-oriented expression
//! language. Values (money, dates, percentages, records with inheritance)
//! live in an arena; a tree-walking evaluator drives every write through a
//! constraint-checked assignment protocol; a moment scheduler batches
//! changes and fires affected triggers once per moment.

pub mod algebra;
pub mod ast;
pub mod diagnostics;
pub mod literal;
pub mod store;
pub mod values;

mod runtime;

pub use runtime::environment::Env;
pub use runtime::events::{EventHook, EventKind, RuntimeEvent};
pub use runtime::{Runtime, RuntimeOptions, StopHandle};
