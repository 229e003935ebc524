//! Package descriptors and where they come from.

pub mod options;
pub mod recipe;
pub mod types;

pub use options::{BuildVariant, OptionValue, PackageOptions, cmake_args, option_fingerprint};
pub use recipe::{DescriptorSource, MemorySource, RecipeRepository};
pub use types::{BuildKind, CopyRule, LinkSpec, PackageDescriptor, PackageId, PackageRef, SourceLocator};
