//! Data model
//!
//! Domain types flow Parser -> Aggregator -> Evaluator. Everything the CLI prints is
//! mapped to the unified [`ResultItem`] model before rendering.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use url::Url;

use crate::core::error::ProviderError;
use crate::core::paths::{canonical_path, file_url};

/// Variable name under which the matched tag is reported
pub const IMAGE_TAG_VARIABLE: &str = "imageTag";

/// Canonical `file://` identifier of a scanned file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileLocation(Url);

impl FileLocation {
    /// Resolve `path` to its canonical absolute form and express it as a file URL
    pub fn from_path(path: &Path) -> Result<Self, ProviderError> {
        let canonical = canonical_path(path);
        file_url(&canonical)
            .map(FileLocation)
            .ok_or(ProviderError::InvalidLocation { path: canonical })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// One value extracted from one file by the query engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRecord {
    /// Scalar value after the first colon of the engine's first line
    pub value: String,
    /// Line number exactly as the engine printed it
    pub line_number: String,
    pub location: FileLocation,
}

/// A single reported match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    #[serde(rename = "fileURI")]
    pub file_uri: String,

    #[serde(rename = "lineNumber")]
    pub line_number: u32,

    /// Ordered so that serialization is canonical
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,
}

impl Incident {
    pub fn new(location: &FileLocation, line_number: u32) -> Self {
        Self {
            file_uri: location.as_str().to_string(),
            line_number,
            variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

/// Terminal output of one evaluation call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub matched: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incidents: Vec<Incident>,
}

impl EvaluationResult {
    pub fn no_match() -> Self {
        Self::default()
    }

    /// `matched` is derived from whether any incident survived
    pub fn from_incidents(incidents: Vec<Incident>) -> Self {
        if incidents.is_empty() {
            return Self::no_match();
        }
        Self {
            matched: true,
            incidents,
        }
    }
}

/// The kind of result item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    File,
    Record,
    Incident,
    Summary,
    Error,
}

/// Error information for a result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemError {
    pub code: String,
    pub message: String,
}

impl ItemError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The unified result item that all commands produce
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    pub kind: Kind,

    /// Filesystem path or `file://` URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    /// Captured value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,

    /// Structured payload (incident variables, summary counters)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ItemError>,
}

impl ResultItem {
    fn empty(kind: Kind) -> Self {
        Self {
            kind,
            path: None,
            line: None,
            excerpt: None,
            data: None,
            errors: Vec::new(),
        }
    }

    /// Create a new file result
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::empty(Kind::File)
        }
    }

    /// Create a raw record result; the engine's line text is kept in `data`
    pub fn record(record: &QueryRecord) -> Self {
        Self {
            path: Some(record.location.to_string()),
            line: record.line_number.trim().parse().ok(),
            excerpt: Some(record.value.clone()),
            data: Some(serde_json::json!({ "lineNumber": record.line_number })),
            ..Self::empty(Kind::Record)
        }
    }

    /// Create an incident result
    pub fn incident(incident: &Incident) -> Self {
        Self {
            path: Some(incident.file_uri.clone()),
            line: Some(incident.line_number),
            excerpt: incident
                .variables
                .get(IMAGE_TAG_VARIABLE)
                .and_then(|v| v.as_str())
                .map(str::to_string),
            data: Some(serde_json::json!({ "variables": incident.variables })),
            ..Self::empty(Kind::Incident)
        }
    }

    /// Create the summary item closing an evaluation
    pub fn summary(result: &EvaluationResult) -> Self {
        Self {
            data: Some(serde_json::json!({
                "matched": result.matched,
                "incidents": result.incidents.len(),
            })),
            ..Self::empty(Kind::Summary)
        }
    }

    /// Create a new error result
    pub fn error(error: ItemError) -> Self {
        Self {
            errors: vec![error],
            ..Self::empty(Kind::Error)
        }
    }
}

/// Result set containing multiple result items
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub items: Vec<ResultItem>,
}

impl ResultSet {
    pub fn push(&mut self, item: ResultItem) {
        self.items.push(item);
    }

    /// Sort items by path and line for stable output; pathless items go last
    pub fn sort(&mut self) {
        self.items.sort_by(|a, b| match (&a.path, &b.path) {
            (Some(pa), Some(pb)) => pa.cmp(pb).then_with(|| match (a.line, b.line) {
                (Some(la), Some(lb)) => la.cmp(&lb),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
    }
}

impl From<&EvaluationResult> for ResultSet {
    fn from(result: &EvaluationResult) -> Self {
        let mut set: ResultSet = result.incidents.iter().map(ResultItem::incident).collect();
        set.sort();
        set.push(ResultItem::summary(result));
        set
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultItem;
    type IntoIter = std::vec::IntoIter<ResultItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<ResultItem> for ResultSet {
    fn from_iter<T: IntoIterator<Item = ResultItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(path: &str) -> FileLocation {
        FileLocation(Url::parse(&format!("file://{}", path)).unwrap())
    }

    #[test]
    fn test_incident_serializes_with_host_field_names() {
        let incident =
            Incident::new(&location("/repo/a.yaml"), 10).with_variable(IMAGE_TAG_VARIABLE, "latest");
        let json = serde_json::to_string(&incident).unwrap();
        assert_eq!(
            json,
            r#"{"fileURI":"file:///repo/a.yaml","lineNumber":10,"variables":{"imageTag":"latest"}}"#
        );
    }

    #[test]
    fn test_incident_variables_serialize_in_key_order() {
        let a = Incident::new(&location("/a.yaml"), 1)
            .with_variable("zeta", "1")
            .with_variable("alpha", "2");
        let b = Incident::new(&location("/a.yaml"), 1)
            .with_variable("alpha", "2")
            .with_variable("zeta", "1");
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_evaluation_result_from_incidents() {
        assert!(!EvaluationResult::from_incidents(Vec::new()).matched);
        let result = EvaluationResult::from_incidents(vec![Incident::new(&location("/a.yaml"), 3)]);
        assert!(result.matched);
        assert_eq!(result.incidents.len(), 1);
    }

    #[test]
    fn test_no_match_omits_incidents() {
        let json = serde_json::to_string(&EvaluationResult::no_match()).unwrap();
        assert_eq!(json, r#"{"matched":false}"#);
    }

    #[test]
    fn test_result_item_record_keeps_engine_line_text() {
        let record = QueryRecord {
            value: "latest".to_string(),
            line_number: "12".to_string(),
            location: location("/a.yaml"),
        };
        let item = ResultItem::record(&record);
        assert_eq!(item.kind, Kind::Record);
        assert_eq!(item.line, Some(12));
        assert_eq!(item.excerpt.as_deref(), Some("latest"));
        assert_eq!(item.data.unwrap()["lineNumber"], "12");
    }

    #[test]
    fn test_result_item_incident_exposes_tag() {
        let incident =
            Incident::new(&location("/a.yaml"), 4).with_variable(IMAGE_TAG_VARIABLE, "latest");
        let item = ResultItem::incident(&incident);
        assert_eq!(item.kind, Kind::Incident);
        assert_eq!(item.path.as_deref(), Some("file:///a.yaml"));
        assert_eq!(item.excerpt.as_deref(), Some("latest"));
    }

    #[test]
    fn test_result_set_from_evaluation_sorts_and_appends_summary() {
        let result = EvaluationResult::from_incidents(vec![
            Incident::new(&location("/b.yaml"), 1),
            Incident::new(&location("/a.yaml"), 9),
            Incident::new(&location("/a.yaml"), 2),
        ]);
        let set = ResultSet::from(&result);
        assert_eq!(set.items.len(), 4);
        assert_eq!(set.items[0].path.as_deref(), Some("file:///a.yaml"));
        assert_eq!(set.items[0].line, Some(2));
        assert_eq!(set.items[1].line, Some(9));
        assert_eq!(set.items[2].path.as_deref(), Some("file:///b.yaml"));
        assert_eq!(set.items[3].kind, Kind::Summary);
        assert_eq!(set.items[3].data.as_ref().unwrap()["matched"], true);
    }

    #[test]
    fn test_result_set_sort_with_none_paths() {
        let mut set = ResultSet::default();
        set.push(ResultItem::error(ItemError::new("ERR", "error")));
        set.push(ResultItem::file("a.yaml"));
        set.sort();
        assert!(set.items[0].path.is_some());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ResultItem::file("a.yaml")).unwrap();
        assert!(json.contains("\"kind\":\"file\""));
    }
}
