pub mod audit;
pub mod caster;
pub mod catalog;
pub mod config;
pub mod directory;
pub mod document;
pub mod error;
pub mod io;
pub mod mutator;
pub mod permissions;
pub mod progress;
pub mod resolver;
pub mod scope;
pub mod service;
pub mod store;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{BrsrError, Result};
