//! Result parser
//!
//! Each engine segment is two lines: `<key>:<value>` then the line number. Malformed
//! segments are logged and skipped; they never abort the rest of the file's output.

use tracing::warn;

use crate::backends::engine::EngineOutput;
use crate::core::model::{FileLocation, QueryRecord};

/// Why a segment was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    /// Fewer than two lines
    TooShort,
    /// First line carries no `:` so there is no value part
    MissingSeparator,
}

/// Split one segment into `(value, line_number)`
pub fn parse_segment(segment: &str) -> Result<(String, String), SegmentError> {
    let mut lines = segment.trim().lines().map(str::trim_end);

    let (Some(first), Some(second)) = (lines.next(), lines.next()) else {
        return Err(SegmentError::TooShort);
    };

    let (_, value) = first.split_once(':').ok_or(SegmentError::MissingSeparator)?;
    Ok((value.to_string(), second.trim().to_string()))
}

/// Parse one file's engine output into records attached to `location`
pub fn parse_output(output: &EngineOutput, location: &FileLocation) -> Vec<QueryRecord> {
    let mut records = Vec::new();

    for segment in output.segments() {
        match parse_segment(&segment) {
            Ok((value, line_number)) => records.push(QueryRecord {
                value,
                line_number,
                location: location.clone(),
            }),
            Err(err) => warn!(
                file = %location,
                segment = %segment.trim(),
                reason = ?err,
                "skipping malformed engine output"
            ),
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn output(stdout: &str) -> EngineOutput {
        EngineOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn location() -> FileLocation {
        FileLocation::from_path(Path::new("/manifests/app.yaml")).unwrap()
    }

    #[test]
    fn test_parse_segment_value_after_first_colon() {
        assert_eq!(
            parse_segment("nginx:latest\n10\n"),
            Ok(("latest".to_string(), "10".to_string()))
        );
    }

    #[test]
    fn test_parse_segment_keeps_later_colons() {
        assert_eq!(
            parse_segment("registry.local:5000/nginx:1.21\n7"),
            Ok(("5000/nginx:1.21".to_string(), "7".to_string()))
        );
    }

    #[test]
    fn test_parse_segment_too_short() {
        assert_eq!(parse_segment("nginx:latest\n"), Err(SegmentError::TooShort));
        assert_eq!(parse_segment(""), Err(SegmentError::TooShort));
    }

    #[test]
    fn test_parse_segment_without_colon() {
        assert_eq!(parse_segment("null\n0"), Err(SegmentError::MissingSeparator));
    }

    #[test]
    fn test_parse_segment_ignores_extra_lines() {
        assert_eq!(
            parse_segment("nginx:latest\n4\ntrailing"),
            Ok(("latest".to_string(), "4".to_string()))
        );
    }

    #[test]
    fn test_parse_output_attaches_location() {
        let records = parse_output(&output("nginx:latest\n10\n"), &location());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, "latest");
        assert_eq!(records[0].line_number, "10");
        assert_eq!(records[0].location.as_str(), "file:///manifests/app.yaml");
    }

    #[test]
    fn test_parse_output_skips_malformed_and_continues() {
        let stdout = "nginx:latest\n3\n---\nbroken\n---\nredis:7\n20\n";
        let records = parse_output(&output(stdout), &location());
        let values: Vec<_> = records.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["latest", "7"]);
    }

    #[test]
    fn test_parse_output_empty() {
        assert!(parse_output(&output(""), &location()).is_empty());
    }

    #[test]
    fn test_parse_output_keeps_line_text_verbatim() {
        let records = parse_output(&output("nginx:latest\nabc\n"), &location());
        assert_eq!(records[0].line_number, "abc");
    }
}
