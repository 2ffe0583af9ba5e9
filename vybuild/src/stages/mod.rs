//! Stage records, the stage registry and recipe discovery.
//!
//! A stage is one buildable recipe: its name, recipe file, build context,
//! declared arguments, required secrets and the other stages it references.

mod record;
mod registry;
mod scanner;

pub use record::{StageName, StageRecord, StageRecordBuilder};
pub use registry::{RegistryBuilder, StageRegistry};
pub use scanner::{DirectoryScanner, RecipeScanner};
