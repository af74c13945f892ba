//! Cell styling types
//!
//! - [`Color`], [`Font`], [`Fill`], [`Border`], [`Alignment`], [`NumberFormat`] - value types
//! - [`FormatDescriptor`] / [`StyleBuilder`] - an immutable complete format and its builder
//! - [`FormatRepository`] - the workbook's content-addressed descriptor pool

mod alignment;
mod border;
mod color;
mod descriptor;
mod fill;
mod font;
mod number_format;
mod repository;

pub use alignment::{
    rotation_from_wire, rotation_to_wire, validate_rotation, Alignment, HorizontalAlignment,
    ReadingOrder, VerticalAlignment,
};
pub use border::{Border, BorderEdge, BorderLineStyle};
pub use color::{Color, Tint};
pub use descriptor::{FormatDescriptor, Protection, StyleBuilder};
pub use fill::{Fill, PatternType};
pub use font::{Font, FontScheme, FontScript, Underline};
pub use number_format::{builtin_code, is_builtin_date, is_date_code, NumberFormat, FIRST_CUSTOM_FORMAT_ID};
pub use repository::{CopiedStyles, FormatRepository, RepositoryStats, StyleId};
