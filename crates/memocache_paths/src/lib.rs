//! Path plumbing for the file hasher: flattening directory arguments into file
//! lists and filtering them with glob patterns.

pub mod expand;
pub mod pattern;

pub use expand::{collect_files, expand_directories};
pub use pattern::PathPatterns;
