//! Entity metadata catalog.
//!
//! Table, column, index and reference descriptors plus the [`Registry`] that
//! validates and publishes them.

mod column;
mod reference;
mod registry;
mod table;
mod types;

pub use column::ColumnDescriptor;
pub use reference::{JoinColumn, ReferenceDescriptor};
pub use registry::{RegisterOutcome, Registry};
pub use table::{IndexDescriptor, TableDescriptor};
pub use types::{Cascade, Connective, DropPolicy, GeneratorPolicy, LockPolicy, SqlType};
