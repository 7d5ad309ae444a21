//! Go toolchain integration: environment discovery, source scanning and
//! import resolution

pub mod env;
pub mod resolver;
pub mod source;

pub use env::GoEnv;
pub use resolver::GoResolver;
