//! XML emit and parse primitives shared by the part codecs.

pub mod reader;
pub mod writer;

pub use reader::{decode_excel_escapes, parse_part, Flow, PartHandler};
pub use writer::{NumberBuffer, XmlWriter};

/// Namespaces used across the package
pub mod ns {
    pub const MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
    pub const REL: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    pub const PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
    pub const CONTENT_TYPES: &str =
        "http://schemas.openxmlformats.org/package/2006/content-types";
    pub const DRAWING: &str =
        "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
    pub const DRAWING_MAIN: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
    pub const CORE_PROPS: &str =
        "http://schemas.openxmlformats.org/package/2006/metadata/core-properties";
    pub const APP_PROPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties";
    pub const CUSTOM_PROPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/custom-properties";
    pub const VT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes";
    pub const DC: &str = "http://purl.org/dc/elements/1.1/";
    pub const DC_TERMS: &str = "http://purl.org/dc/terms/";
    pub const DCMI_TYPE: &str = "http://purl.org/dc/dcmitype/";
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
}
