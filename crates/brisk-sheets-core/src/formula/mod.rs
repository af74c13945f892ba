//! Formula text handling
//!
//! Formulas are stored as text and never evaluated. This module rebases
//! A1 references and manages shared formula groups.

mod rebase;
mod shared;

pub use rebase::{rebase, relative_key, transform, RefPart, RefVisitor};
pub use shared::{
    EmissionPlan, EmittedGroup, FormulaPattern, MemberEmission, SharedFormula,
    SharedFormulaManager, SharedFormulaStats,
};
