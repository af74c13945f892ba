//! `xl/workbook.xml`: sheet list, defined names, workbook settings.

use std::io::Write;

use brisk_sheets_core::cell::{quote_sheet_name, split_sheet_qualifier};
use brisk_sheets_core::defined_name::BUILTIN_PREFIX;
use brisk_sheets_core::worksheet::RawElement;
use brisk_sheets_core::{CellRange, DefinedName, NameScope, SheetVisibility, Workbook, WorkbookSettings};
use quick_xml::events::BytesStart;

use crate::error::XlsxResult;
use crate::parts::{write_extra_root_attrs, write_preserved, write_unplaced};
use crate::xml::reader::{attr, attr_bool, attr_u32, parse_part, qualified_attrs, Flow, PartHandler};
use crate::xml::{ns, XmlWriter};

pub const PRINT_AREA: &str = "_xlnm.Print_Area";
pub const FILTER_DATABASE: &str = "_xlnm._FilterDatabase";

/// Children of `<workbook>` in schema order
const ELEMENT_ORDER: &[&str] = &[
    "fileVersion",
    "fileSharing",
    "workbookPr",
    "workbookProtection",
    "bookViews",
    "sheets",
    "functionGroups",
    "externalReferences",
    "definedNames",
    "calcPr",
    "oleSize",
    "customWorkbookViews",
    "pivotCaches",
    "smartTagPr",
    "smartTagTypes",
    "webPublishing",
    "fileRecoveryPr",
    "webPublishObjects",
    "extLst",
];

/// Elements the codec writes itself
const MODELED: &[&str] = &["workbookPr", "bookViews", "sheets", "definedNames", "calcPr"];

/// One `<sheet>` entry as written
#[derive(Debug, Clone)]
pub struct SheetEntry<'a> {
    pub name: &'a str,
    pub sheet_id: u32,
    pub rel_id: &'a str,
    pub visibility: SheetVisibility,
}

/// Write the workbook part. `root_attrs` are extra root attributes of the
/// source part (namespace declarations used by preserved markup).
pub fn write_workbook<W: Write>(
    workbook: &Workbook,
    sheets: &[SheetEntry<'_>],
    root_attrs: &[(String, String)],
    sink: W,
) -> XlsxResult<W> {
    let mut xml = XmlWriter::new(sink);
    xml.declaration();
    xml.start("workbook")
        .attr_raw("xmlns", ns::MAIN)
        .attr_raw("xmlns:r", ns::REL);
    write_extra_root_attrs(&mut xml, root_attrs, &["xmlns", "xmlns:r"]);

    let preserved = workbook.preserved_elements();
    let settings = workbook.settings();
    for &element in ELEMENT_ORDER {
        match element {
            "workbookPr" => {
                xml.start("workbookPr").attr_flag("date1904", settings.date_1904).end();
            }
            "bookViews" => {
                xml.start("bookViews").start("workbookView");
                if workbook.active_sheet() > 0 {
                    xml.attr_int("activeTab", workbook.active_sheet());
                }
                xml.end().end();
            }
            "sheets" => {
                xml.start("sheets");
                for sheet in sheets {
                    xml.start("sheet")
                        .attr("name", sheet.name)
                        .attr_int("sheetId", sheet.sheet_id);
                    if let Some(state) = sheet.visibility.as_str() {
                        xml.attr_raw("state", state);
                    }
                    xml.attr("r:id", sheet.rel_id).end();
                }
                xml.end();
            }
            "definedNames" => write_defined_names(&mut xml, workbook),
            "calcPr" => {
                let calc = &settings.calc;
                if calc.calc_id.is_some() || calc.full_calc_on_load {
                    xml.start("calcPr");
                    if let Some(id) = calc.calc_id {
                        xml.attr_int("calcId", id);
                    }
                    xml.attr_flag("fullCalcOnLoad", calc.full_calc_on_load).end();
                }
            }
            other => write_preserved(&mut xml, preserved, other),
        }
    }
    write_unplaced(&mut xml, preserved, ELEMENT_ORDER);
    xml.end();
    xml.finish()
}

/// User names plus the built-ins derived from sheet state. A derived
/// built-in replaces a stored name with the same key.
fn collect_names(workbook: &Workbook) -> Vec<DefinedName> {
    let mut derived = Vec::new();
    for (index, sheet) in workbook.worksheets().enumerate() {
        let qualifier = quote_sheet_name(sheet.name());
        if let Some(area) = sheet.print_area() {
            derived.push(DefinedName::new(
                PRINT_AREA,
                format!("{}!{}", qualifier, area.to_absolute_string()),
                NameScope::Sheet(index),
            ));
        }
        if let Some(filter) = sheet.autofilter() {
            derived.push(
                DefinedName::new(
                    FILTER_DATABASE,
                    format!("{}!{}", qualifier, filter.to_absolute_string()),
                    NameScope::Sheet(index),
                )
                .hidden(),
            );
        }
    }
    let mut names: Vec<DefinedName> = workbook
        .defined_names()
        .iter()
        .filter(|n| {
            !derived
                .iter()
                .any(|d| d.scope == n.scope && d.name.eq_ignore_ascii_case(&n.name))
        })
        .cloned()
        .collect();
    names.extend(derived);
    names
}

fn write_defined_names<W: Write>(xml: &mut XmlWriter<W>, workbook: &Workbook) {
    let names = collect_names(workbook);
    if names.is_empty() {
        return;
    }
    xml.start("definedNames");
    for name in &names {
        xml.start("definedName").attr("name", &name.name);
        if let Some(comment) = &name.comment {
            xml.attr("comment", comment);
        }
        if let NameScope::Sheet(index) = name.scope {
            xml.attr_int("localSheetId", index);
        }
        xml.attr_flag("hidden", name.hidden);
        xml.text(&name.formula).end();
    }
    xml.end();
}

/// A `<sheet>` entry as read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub name: String,
    pub sheet_id: u32,
    pub rel_id: String,
    pub visibility: SheetVisibility,
}

/// A `<definedName>` as read; built-ins included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameInfo {
    pub name: String,
    pub local_sheet: Option<usize>,
    pub formula: String,
    pub comment: Option<String>,
    pub hidden: bool,
}

impl NameInfo {
    pub fn is_builtin(&self) -> bool {
        self.name
            .get(..BUILTIN_PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(BUILTIN_PREFIX))
    }

    /// The single range a built-in such as `'Q1 data'!$A$1:$C$9` refers to,
    /// when it names exactly one range on `sheet`
    pub fn single_range_on(&self, sheet: &str) -> Option<CellRange> {
        let (qualifier, reference) = split_sheet_qualifier(&self.formula).ok()?;
        if !qualifier.is_some_and(|q| q.eq_ignore_ascii_case(sheet)) || reference.contains(',') {
            return None;
        }
        CellRange::parse(reference).ok().map(|r| r.relative())
    }

    pub fn into_defined_name(self) -> DefinedName {
        let scope = match self.local_sheet {
            Some(i) => NameScope::Sheet(i),
            None => NameScope::Workbook,
        };
        let mut name = DefinedName::new(self.name, &self.formula, scope);
        name.comment = self.comment;
        name.hidden = self.hidden;
        name
    }
}

/// Everything the workbook part declares
#[derive(Debug, Clone, Default)]
pub struct WorkbookInfo {
    pub sheets: Vec<SheetInfo>,
    pub names: Vec<NameInfo>,
    pub settings: WorkbookSettings,
    pub active_tab: usize,
    /// Unmodeled top-level elements
    pub preserved: Vec<RawElement>,
    /// Root attributes other than the default namespace
    pub root_attrs: Vec<(String, String)>,
}

pub fn parse_workbook(part: &str, xml: &[u8]) -> XlsxResult<WorkbookInfo> {
    let mut handler = WorkbookHandler::default();
    parse_part(part, xml, &mut handler)?;
    Ok(handler.info)
}

#[derive(Default)]
struct WorkbookHandler {
    info: WorkbookInfo,
    depth: usize,
    /// Defined name whose formula text is being read
    pending: Option<NameInfo>,
}

impl PartHandler for WorkbookHandler {
    fn start(&mut self, e: &BytesStart<'_>, _empty: bool) -> XlsxResult<Flow> {
        let local = e.local_name();
        let name = local.as_ref();
        if self.depth == 0 {
            self.info.root_attrs = qualified_attrs(e);
        } else if self.depth == 1 {
            let modeled = std::str::from_utf8(name).is_ok_and(|n| MODELED.contains(&n));
            if !modeled {
                return Ok(Flow::Capture);
            }
        }
        self.depth += 1;
        match name {
            b"workbookPr" => {
                self.info.settings.date_1904 = attr_bool(e, b"date1904").unwrap_or(false);
            }
            b"workbookView" => {
                if let Some(tab) = attr_u32(e, b"activeTab") {
                    self.info.active_tab = tab as usize;
                }
            }
            b"sheet" => {
                self.info.sheets.push(SheetInfo {
                    name: attr(e, b"name").unwrap_or_default().into_owned(),
                    sheet_id: attr_u32(e, b"sheetId").unwrap_or(0),
                    rel_id: attr(e, b"id").unwrap_or_default().into_owned(),
                    visibility: attr(e, b"state")
                        .map_or(SheetVisibility::Visible, |s| SheetVisibility::parse(&s)),
                });
            }
            b"definedName" => {
                self.pending = Some(NameInfo {
                    name: attr(e, b"name").unwrap_or_default().into_owned(),
                    local_sheet: attr_u32(e, b"localSheetId").map(|i| i as usize),
                    formula: String::new(),
                    comment: attr(e, b"comment").map(|c| c.into_owned()),
                    hidden: attr_bool(e, b"hidden").unwrap_or(false),
                });
            }
            b"calcPr" => {
                self.info.settings.calc.calc_id = attr_u32(e, b"calcId");
                self.info.settings.calc.full_calc_on_load =
                    attr_bool(e, b"fullCalcOnLoad").unwrap_or(false);
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }

    fn end(&mut self, name: &[u8]) -> XlsxResult<()> {
        self.depth = self.depth.saturating_sub(1);
        if name == b"definedName" {
            if let Some(pending) = self.pending.take() {
                if !pending.name.is_empty() {
                    self.info.names.push(pending);
                }
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> XlsxResult<()> {
        if let Some(pending) = &mut self.pending {
            pending.formula.push_str(text);
        }
        Ok(())
    }

    fn captured(&mut self, name: &[u8], xml: &[u8]) -> XlsxResult<()> {
        self.info.preserved.push(RawElement {
            name: String::from_utf8_lossy(name).into_owned(),
            xml: xml.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entries(workbook: &Workbook) -> Vec<(String, String)> {
        workbook
            .worksheets()
            .enumerate()
            .map(|(i, ws)| (ws.name().to_string(), format!("rId{}", i + 1)))
            .collect()
    }

    fn write(workbook: &Workbook) -> String {
        let ids = entries(workbook);
        let sheets: Vec<SheetEntry<'_>> = workbook
            .worksheets()
            .zip(&ids)
            .enumerate()
            .map(|(i, (ws, (_, id)))| SheetEntry {
                name: ws.name(),
                sheet_id: i as u32 + 1,
                rel_id: id,
                visibility: ws.visibility(),
            })
            .collect();
        let bytes = write_workbook(workbook, &sheets, &[], Vec::new()).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_write_sheets_and_builtins() {
        let mut wb = Workbook::new();
        wb.add_sheet("Data").unwrap();
        {
            let mut sheet = wb.add_sheet("Q1 Report").unwrap();
            sheet.set_print_area("A1:C10").unwrap();
            sheet.set_autofilter("A1:C1").unwrap();
        }
        wb.set_sheet_visibility(1, SheetVisibility::Hidden).unwrap();
        wb.define_name("Total", "Data!$B$10").unwrap();

        let text = write(&wb);
        assert!(text.contains(r#"<sheet name="Data" sheetId="1" r:id="rId1"/>"#));
        assert!(text.contains(r#"<sheet name="Q1 Report" sheetId="2" state="hidden" r:id="rId2"/>"#));
        assert!(text.contains(
            r#"<definedName name="_xlnm.Print_Area" localSheetId="1">'Q1 Report'!$A$1:$C$10</definedName>"#
        ));
        assert!(text.contains(
            r#"<definedName name="_xlnm._FilterDatabase" localSheetId="1" hidden="1">'Q1 Report'!$A$1:$C$1</definedName>"#
        ));
        assert!(text.contains(r#"<definedName name="Total">Data!$B$10</definedName>"#));
        assert!(text.find("<sheets>").unwrap() < text.find("<definedNames>").unwrap());
    }

    #[test]
    fn test_parse_round_trip() {
        let mut wb = Workbook::new();
        wb.add_sheet("One").unwrap();
        wb.add_sheet("Two").unwrap();
        wb.set_active_sheet(1).unwrap();
        wb.settings_mut().date_1904 = true;
        wb.settings_mut().calc.calc_id = Some(191029);
        wb.define_name_with_scope("Local", "Two!$A$1", NameScope::Sheet(1))
            .unwrap();

        let text = write(&wb);
        let info = parse_workbook("xl/workbook.xml", text.as_bytes()).unwrap();
        assert_eq!(info.sheets.len(), 2);
        assert_eq!(info.sheets[1].name, "Two");
        assert_eq!(info.sheets[1].rel_id, "rId2");
        assert_eq!(info.active_tab, 1);
        assert!(info.settings.date_1904);
        assert_eq!(info.settings.calc.calc_id, Some(191029));
        assert_eq!(info.names.len(), 1);
        assert_eq!(info.names[0].local_sheet, Some(1));
        assert_eq!(info.names[0].formula, "Two!$A$1");
        assert!(info.preserved.is_empty());
    }

    #[test]
    fn test_unmodeled_elements_survive() {
        let source = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:x15="http://schemas.microsoft.com/office/spreadsheetml/2010/11/main"><fileVersion appName="xl" lastEdited="7"/><sheets><sheet name="S" sheetId="4" r:id="rId7"/></sheets><extLst><ext uri="{X}"><x15:workbookPr chartTrackingRefBase="1"/></ext></extLst></workbook>"#;
        let info = parse_workbook("xl/workbook.xml", source).unwrap();
        let names: Vec<&str> = info.preserved.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["fileVersion", "extLst"]);
        assert_eq!(info.sheets[0].sheet_id, 4);
        assert!(info
            .root_attrs
            .iter()
            .any(|(k, _)| k == "xmlns:x15"));

        let mut parts = brisk_sheets_core::WorkbookParts::default();
        parts.worksheets.push(brisk_sheets_core::Worksheet::new("S"));
        parts.preserved = info.preserved.clone();
        let wb = Workbook::from_parts(parts, Default::default());
        let sheets = [SheetEntry {
            name: "S",
            sheet_id: 1,
            rel_id: "rId7",
            visibility: SheetVisibility::Visible,
        }];
        let bytes = write_workbook(&wb, &sheets, &info.root_attrs, Vec::new()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains(r#"xmlns:x15="http://schemas.microsoft.com/office/spreadsheetml/2010/11/main""#));
        let file_version = text.find("<fileVersion").unwrap();
        let workbook_pr = text.find("<workbookPr").unwrap();
        let ext = text.find("<extLst>").unwrap();
        let sheets_at = text.find("<sheets>").unwrap();
        assert!(file_version < workbook_pr && sheets_at < ext);
        assert_eq!(text.matches("xmlns:r=").count(), 1);
    }

    #[test]
    fn test_single_range_on() {
        let name = NameInfo {
            name: PRINT_AREA.into(),
            local_sheet: Some(0),
            formula: "'Q1 data'!$A$1:$C$9".into(),
            comment: None,
            hidden: false,
        };
        assert!(name.is_builtin());
        assert_eq!(
            name.single_range_on("Q1 Data"),
            Some(CellRange::parse("A1:C9").unwrap())
        );
        assert_eq!(name.single_range_on("Other"), None);
    }
}
