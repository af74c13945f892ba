//! Document metadata: core, extended and custom properties

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Core (`docProps/core.xml`) and extended (`docProps/app.xml`) properties
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocProperties {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub last_modified_by: Option<String>,
    pub category: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    /// Producing application
    pub application: Option<String>,
    pub company: Option<String>,
    pub manager: Option<String>,
}

/// Value of a custom property
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    Text(String),
    Number(f64),
    /// 32-bit integer; only produced when reading files that use `vt:i4`
    Int(i32),
    Bool(bool),
    DateTime(DateTime<Utc>),
}

impl From<&str> for CustomValue {
    fn from(s: &str) -> Self {
        CustomValue::Text(s.to_string())
    }
}

impl From<String> for CustomValue {
    fn from(s: String) -> Self {
        CustomValue::Text(s)
    }
}

impl From<f64> for CustomValue {
    fn from(n: f64) -> Self {
        CustomValue::Number(n)
    }
}

impl From<i32> for CustomValue {
    fn from(n: i32) -> Self {
        CustomValue::Int(n)
    }
}

impl From<bool> for CustomValue {
    fn from(b: bool) -> Self {
        CustomValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for CustomValue {
    fn from(d: DateTime<Utc>) -> Self {
        CustomValue::DateTime(d)
    }
}

/// Named, typed custom properties in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomProperties {
    entries: Vec<(String, CustomValue)>,
}

impl CustomProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property. Names compare case-insensitively.
    pub fn set<N: Into<String>, V: Into<CustomValue>>(&mut self, name: N, value: V) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid_value("custom property name", "must not be empty"));
        }
        let value = value.into();
        if let CustomValue::Number(n) = value {
            if !n.is_finite() {
                return Err(Error::invalid_value("custom property value", "number is not finite"));
            }
        }
        match self.position(&name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name, value)),
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<&CustomValue> {
        self.position(name).map(|i| &self.entries[i].1)
    }

    pub fn remove(&mut self, name: &str) -> Result<CustomValue> {
        match self.position(name) {
            Some(i) => Ok(self.entries.remove(i).1),
            None => Err(Error::NameNotFound(name.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CustomValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
