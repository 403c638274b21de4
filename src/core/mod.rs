pub mod group;
pub mod specification;

pub use group::SpecificationGroup;
pub use specification::{Specification, format_value};
