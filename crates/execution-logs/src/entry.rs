// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// Severity attached to every entry, serialized with its upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    pub const ALL: [Severity; 9] = [
        Severity::Default,
        Severity::Debug,
        Severity::Info,
        Severity::Notice,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
        Severity::Alert,
        Severity::Emergency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Notice => "NOTICE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Alert => "ALERT",
            Severity::Emergency => "EMERGENCY",
        }
    }

    /// First letter of the name, used as the local output tag.
    pub fn initial(&self) -> char {
        self.as_str().chars().next().unwrap_or('D')
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Severity::ALL
            .iter()
            .find(|severity| severity.as_str() == wanted)
            .copied()
            .ok_or_else(|| ConfigError::InvalidConfig(format!("unknown severity '{s}'")))
    }
}

/// One unit of log content. Never modified once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Entry {
    text_payload: String,
    severity: Severity,
    time: DateTime<Utc>,
    #[serde(rename = "ExecutionID")]
    execution_id: String,
}

impl Entry {
    /// Builds an entry stamped with the current time. An absent execution id
    /// is stored as the empty string.
    pub fn new(text_payload: String, severity: Severity, execution_id: Option<&str>) -> Self {
        Self::with_time(text_payload, severity, execution_id, Utc::now())
    }

    pub fn with_time(
        text_payload: String,
        severity: Severity,
        execution_id: Option<&str>,
        time: DateTime<Utc>,
    ) -> Self {
        Entry {
            text_payload,
            severity,
            time,
            execution_id: execution_id.unwrap_or_default().to_string(),
        }
    }

    pub fn text_payload(&self) -> &str {
        &self.text_payload
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn execution_id(&self) -> Option<&str> {
        if self.execution_id.is_empty() {
            None
        } else {
            Some(&self.execution_id)
        }
    }

    /// Payload length in bytes, the unit the batch size limit is expressed in.
    pub fn len(&self) -> usize {
        self.text_payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text_payload.is_empty()
    }

    /// Formats the entry for the local fallback stream:
    /// `[<severity initial>][<execution id>] <text>` with exactly one
    /// trailing newline. The execution id block is omitted when absent.
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.text_payload.len() + self.execution_id.len() + 8);
        out.push(b'[');
        let mut initial = [0u8; 4];
        out.extend_from_slice(self.severity.initial().encode_utf8(&mut initial).as_bytes());
        out.push(b']');
        if let Some(id) = self.execution_id() {
            out.push(b'[');
            out.extend_from_slice(id.as_bytes());
            out.push(b']');
        }
        out.push(b' ');
        out.extend_from_slice(self.text_payload.as_bytes());
        if !self.text_payload.ends_with('\n') {
            out.push(b'\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_render_without_execution_id() {
        let entry = Entry::new("hello".to_string(), Severity::Info, None);
        assert_eq!(entry.render(), b"[I] hello\n");
    }

    #[test]
    fn test_render_does_not_double_newline() {
        let entry = Entry::new("hello\n".to_string(), Severity::Info, None);
        assert_eq!(entry.render(), b"[I] hello\n");
    }

    #[test]
    fn test_render_with_execution_id() {
        let entry = Entry::new("disk full".to_string(), Severity::Error, Some("evt-42"));
        assert_eq!(entry.render(), b"[E][evt-42] disk full\n");
    }

    #[test]
    fn test_render_empty_payload() {
        let entry = Entry::new(String::new(), Severity::Warning, None);
        assert_eq!(entry.render(), b"[W] \n");
    }

    #[test]
    fn test_empty_execution_id_is_absent() {
        let entry = Entry::new("x".to_string(), Severity::Debug, Some(""));
        assert_eq!(entry.execution_id(), None);
        assert_eq!(entry.render(), b"[D] x\n");
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("info".parse::<Severity>(), Ok(Severity::Info));
        assert_eq!(" EMERGENCY ".parse::<Severity>(), Ok(Severity::Emergency));
        assert!("verbose".parse::<Severity>().is_err());
        for severity in Severity::ALL {
            assert_eq!(severity.as_str().parse::<Severity>(), Ok(severity));
        }
    }

    #[test]
    fn test_serialized_field_names() {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let entry = Entry::with_time("boot".to_string(), Severity::Notice, Some("e1"), time);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["TextPayload"], "boot");
        assert_eq!(json["Severity"], "NOTICE");
        assert_eq!(json["ExecutionID"], "e1");
        assert_eq!(json["Time"], "2024-05-01T12:00:00Z");
    }
}
