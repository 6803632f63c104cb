//! dpm-core: configurable edits for zip-packaged datapacks
//!
//! This crate focuses on a small, well-factored surface:
//! - Datapack loading (pack.mcmeta identity, module detection, dpconfig)
//! - Typed configuration: widgets, methods, accessors, transformer trees
//! - Change queue with value/method type checking
//! - Patch cache & applier (each source file read at most once per run)
//! - Export packer (combine, passthrough copies, compression settings)
//!
pub mod config;
pub mod edit;
pub mod error;
pub mod export;
pub mod modifier;
pub mod pack;
pub mod transform;

pub use config::{Accessor, MethodDef, PackConfig, Widget};
pub use edit::{EditMethod, ScalarValue, apply_to_value, value_matches_method};
pub use error::{Error, Result};
pub use export::{
    ExportSettings, ExportedPack, NoProgress, Progress, compression_level_or_default,
};
pub use modifier::{Change, Modifier, RunStats};
pub use pack::{Datapack, Module, PackDescription, PackStore, find_pack_files};
pub use transform::Transformer;
