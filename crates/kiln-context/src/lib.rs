//! Recipe and build-context sourcing.
//!
//! A build reads its recipe and context either from local paths or from a
//! single stdin stream. Stream input is materialized into temporary storage
//! whose lifetime is tied to the returned guards.

pub use error::{Error, Result};
pub use materialize::{MaterializedContext, MaterializedRecipe, context_from_reader, recipe_from_reader};
pub use kiln_archive::DEFAULT_RECIPE_NAME;
pub use source::{BuildSources, ContextSource, RecipeSource, StagedSources, StdinOutcome, StdinRead};

mod error;
mod materialize;
mod source;
