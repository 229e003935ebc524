//! nativeforge-lib: dependency build orchestration for native C/C++ projects.
//!
//! - `package`: package descriptors and the recipe repository that provides them
//! - `graph`: the dependency graph resolved from a project descriptor
//! - `schedule`: build plans and the scheduler that runs them
//! - `lifecycle`: per-node Fetch, Configure, Build and Package steps
//! - `artifact`: the artifact store, its index and its lock
//! - `shader`: shader discovery and compilation
//! - `orchestrate`: the end-to-end build flow driven by `forge.toml`

pub mod artifact;
pub mod config;
pub mod consts;
pub mod graph;
pub mod lifecycle;
pub mod orchestrate;
pub mod package;
pub mod platform;
pub mod schedule;
pub mod shader;
pub mod util;
