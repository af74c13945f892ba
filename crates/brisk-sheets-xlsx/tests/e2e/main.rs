//! End-to-end tests for brisk-sheets-xlsx.
//!
//! Packages are checked against the `zip` crate in both directions: it
//! reads what the writer produces, and it builds the "foreign" packages the
//! reader and edit-mode saves start from.

mod archive;
mod common;
mod conformance;
mod edit;
mod limits;

pub use common::*;
