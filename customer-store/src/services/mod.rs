//! Services - caller-facing operations on top of the stores

pub mod directory;

pub use directory::{CustomerDirectory, DirectoryPage};
