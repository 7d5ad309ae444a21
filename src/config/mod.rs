//! Configuration: the module's go.mod and the optional gopkgview.toml

pub mod gomod;
pub mod settings;

pub use gomod::{is_path_prefix, GoMod, ManifestError};
pub use settings::Settings;
