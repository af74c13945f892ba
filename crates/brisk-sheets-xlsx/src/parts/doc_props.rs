//! `docProps/core.xml`, `docProps/app.xml` and `docProps/custom.xml`

use std::io::Write;

use brisk_sheets_core::{CustomProperties, CustomValue, DocProperties};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::BytesStart;

use crate::error::XlsxResult;
use crate::xml::reader::{attr, parse_part, Flow, PartHandler};
use crate::xml::{ns, NumberBuffer, XmlWriter};

/// Format id every custom property carries
pub const CUSTOM_FMTID: &str = "{D5CDD505-2E9C-101B-9397-08002B2CF9AE}";

const DEFAULT_APPLICATION: &str = "Microsoft Excel";

fn w3cdtf(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn write_core<W: Write>(props: &DocProperties, sink: W) -> XlsxResult<W> {
    let mut xml = XmlWriter::new(sink);
    xml.declaration();
    xml.start("cp:coreProperties")
        .attr_raw("xmlns:cp", ns::CORE_PROPS)
        .attr_raw("xmlns:dc", ns::DC)
        .attr_raw("xmlns:dcterms", ns::DC_TERMS)
        .attr_raw("xmlns:dcmitype", ns::DCMI_TYPE)
        .attr_raw("xmlns:xsi", ns::XSI);
    let text_fields: [(&'static str, &Option<String>); 6] = [
        ("dc:title", &props.title),
        ("dc:subject", &props.subject),
        ("dc:creator", &props.creator),
        ("cp:keywords", &props.keywords),
        ("dc:description", &props.description),
        ("cp:lastModifiedBy", &props.last_modified_by),
    ];
    for (tag, value) in text_fields {
        if let Some(v) = value {
            xml.text_element(tag, v);
        }
    }
    for (tag, value) in [("dcterms:created", &props.created), ("dcterms:modified", &props.modified)] {
        if let Some(dt) = value {
            xml.start(tag)
                .attr_raw("xsi:type", "dcterms:W3CDTF")
                .text_raw(&w3cdtf(dt))
                .end();
        }
    }
    if let Some(category) = &props.category {
        xml.text_element("cp:category", category);
    }
    xml.end();
    xml.finish()
}

pub fn write_app<W: Write>(props: &DocProperties, sheet_names: &[&str], sink: W) -> XlsxResult<W> {
    let mut xml = XmlWriter::new(sink);
    xml.declaration();
    xml.start("Properties")
        .attr_raw("xmlns", ns::APP_PROPS)
        .attr_raw("xmlns:vt", ns::VT);
    xml.text_element(
        "Application",
        props.application.as_deref().unwrap_or(DEFAULT_APPLICATION),
    );
    xml.start("DocSecurity").text_raw("0").end();
    xml.start("ScaleCrop").text_raw("false").end();

    xml.start("HeadingPairs")
        .start("vt:vector")
        .attr_raw("size", "2")
        .attr_raw("baseType", "variant");
    xml.start("vt:variant").text_element("vt:lpstr", "Worksheets").end();
    xml.start("vt:variant").start("vt:i4").int(sheet_names.len()).end().end();
    xml.end().end();

    xml.start("TitlesOfParts")
        .start("vt:vector")
        .attr_int("size", sheet_names.len())
        .attr_raw("baseType", "lpstr");
    for name in sheet_names {
        xml.text_element("vt:lpstr", name);
    }
    xml.end().end();

    if let Some(manager) = &props.manager {
        xml.text_element("Manager", manager);
    }
    if let Some(company) = &props.company {
        xml.text_element("Company", company);
    }
    xml.start("LinksUpToDate").text_raw("false").end();
    xml.start("SharedDoc").text_raw("false").end();
    xml.start("HyperlinksChanged").text_raw("false").end();
    xml.start("AppVersion").text_raw("16.0300").end();
    xml.end();
    xml.finish()
}

pub fn write_custom<W: Write>(custom: &CustomProperties, sink: W) -> XlsxResult<W> {
    let mut xml = XmlWriter::new(sink);
    let mut num = NumberBuffer::new();
    xml.declaration();
    xml.start("Properties")
        .attr_raw("xmlns", ns::CUSTOM_PROPS)
        .attr_raw("xmlns:vt", ns::VT);
    // pids 0 and 1 are reserved
    for (pid, (name, value)) in (2u32..).zip(custom.iter()) {
        xml.start("property")
            .attr_raw("fmtid", CUSTOM_FMTID)
            .attr_int("pid", pid)
            .attr("name", name);
        match value {
            CustomValue::Text(t) => {
                xml.text_element("vt:lpwstr", t);
            }
            CustomValue::Number(n) => {
                xml.start("vt:r8").text_raw(num.format(*n)).end();
            }
            CustomValue::Int(i) => {
                xml.start("vt:i4").int(*i).end();
            }
            CustomValue::Bool(b) => {
                xml.start("vt:bool").text_raw(if *b { "true" } else { "false" }).end();
            }
            CustomValue::DateTime(dt) => {
                xml.start("vt:filetime").text_raw(&w3cdtf(dt)).end();
            }
        }
        xml.end();
    }
    xml.end();
    xml.finish()
}

fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Read core properties into `props`
pub fn parse_core(part: &str, xml: &[u8], props: &mut DocProperties) -> XlsxResult<()> {
    let mut handler = TextFields::default();
    parse_part(part, xml, &mut handler)?;
    for (name, text) in handler.fields {
        let slot = match name.as_str() {
            "title" => &mut props.title,
            "subject" => &mut props.subject,
            "creator" => &mut props.creator,
            "keywords" => &mut props.keywords,
            "description" => &mut props.description,
            "lastModifiedBy" => &mut props.last_modified_by,
            "category" => &mut props.category,
            "created" => {
                props.created = parse_datetime(&text);
                continue;
            }
            "modified" => {
                props.modified = parse_datetime(&text);
                continue;
            }
            _ => continue,
        };
        *slot = Some(text);
    }
    Ok(())
}

/// Read the extended properties the model keeps into `props`
pub fn parse_app(part: &str, xml: &[u8], props: &mut DocProperties) -> XlsxResult<()> {
    let mut handler = TextFields::default();
    parse_part(part, xml, &mut handler)?;
    for (name, text) in handler.fields {
        match name.as_str() {
            "Application" => props.application = Some(text),
            "Company" => props.company = Some(text),
            "Manager" => props.manager = Some(text),
            _ => {}
        }
    }
    Ok(())
}

/// Text of the root's direct children, by local name
#[derive(Default)]
struct TextFields {
    depth: usize,
    current: Option<(String, String)>,
    fields: Vec<(String, String)>,
}

impl PartHandler for TextFields {
    fn start(&mut self, e: &BytesStart<'_>, _empty: bool) -> XlsxResult<Flow> {
        self.depth += 1;
        if self.depth == 2 {
            let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
            self.current = Some((name, String::new()));
        }
        Ok(Flow::Continue)
    }

    fn end(&mut self, _name: &[u8]) -> XlsxResult<()> {
        if self.depth == 2 {
            if let Some(field) = self.current.take() {
                self.fields.push(field);
            }
        }
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    fn text(&mut self, text: &str) -> XlsxResult<()> {
        if let Some((_, value)) = self.current.as_mut() {
            value.push_str(text);
        }
        Ok(())
    }
}

/// Read custom properties. Values of unsupported variant types are
/// reported and skipped.
pub fn parse_custom(part: &str, xml: &[u8]) -> XlsxResult<(CustomProperties, Vec<String>)> {
    let mut handler = CustomHandler::default();
    parse_part(part, xml, &mut handler)?;
    let mut custom = CustomProperties::new();
    for (name, value) in handler.values {
        if let Err(err) = custom.set(name.as_str(), value) {
            handler.issues.push(format!("custom property '{}' dropped: {}", name, err));
        }
    }
    Ok((custom, handler.issues))
}

#[derive(Default)]
struct CustomHandler {
    name: Option<String>,
    value_type: Option<String>,
    text: String,
    values: Vec<(String, CustomValue)>,
    issues: Vec<String>,
}

impl CustomHandler {
    fn convert(&mut self, name: &str, ty: &str, text: &str) -> Option<CustomValue> {
        let text = text.trim_matches(|c: char| c == '\n' || c == '\r');
        let value = match ty {
            "lpwstr" | "lpstr" | "bstr" => Some(CustomValue::Text(text.to_string())),
            "r8" | "r4" | "decimal" => text.trim().parse().ok().map(CustomValue::Number),
            "i1" | "i2" | "i4" | "int" | "ui1" | "ui2" => text.trim().parse().ok().map(CustomValue::Int),
            "i8" | "ui4" | "ui8" | "uint" => text.trim().parse::<f64>().ok().map(CustomValue::Number),
            "bool" => Some(CustomValue::Bool(matches!(text.trim(), "true" | "1"))),
            "filetime" | "date" => parse_datetime(text).map(CustomValue::DateTime),
            _ => {
                self.issues
                    .push(format!("custom property '{}' has unsupported type vt:{}", name, ty));
                return None;
            }
        };
        if value.is_none() {
            self.issues
                .push(format!("custom property '{}' has an unreadable vt:{} value", name, ty));
        }
        value
    }
}

impl PartHandler for CustomHandler {
    fn start(&mut self, e: &BytesStart<'_>, _empty: bool) -> XlsxResult<Flow> {
        match e.local_name().as_ref() {
            b"property" => {
                self.name = attr(e, b"name").map(|n| n.into_owned());
                self.value_type = None;
            }
            other if self.name.is_some() && self.value_type.is_none() => {
                self.value_type = Some(String::from_utf8_lossy(other).into_owned());
                self.text.clear();
            }
            _ => {}
        }
        Ok(Flow::Continue)
    }

    fn end(&mut self, name: &[u8]) -> XlsxResult<()> {
        if name == b"property" {
            if let (Some(prop), Some(ty)) = (self.name.take(), self.value_type.take()) {
                let text = std::mem::take(&mut self.text);
                if let Some(value) = self.convert(&prop, &ty, &text) {
                    self.values.push((prop, value));
                }
            }
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> XlsxResult<()> {
        if self.value_type.is_some() {
            self.text.push_str(text);
        }
        Ok(())
    }
}
