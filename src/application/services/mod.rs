//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on the FileSystem boundary trait
//! but are themselves concrete structs, not traits.

mod hierarchy;
mod importance;
mod layout;

pub use hierarchy::{HierarchyService, LoadedTree};
pub use importance::{
    ImportanceRequest, ImportanceRun, ImportanceService, METADATA_FILE, SUMMARY_FILE,
    VALIDATION_FILE,
};
pub use layout::{LayoutCheck, LayoutService};
