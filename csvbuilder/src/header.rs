//! Header reconciliation.
//!
//! Compares the headers a schema expects with the header row observed on an
//! input. Headers are matched by formatted text, never by column name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How observed header text is compared with expected header text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderMatch {
    /// Byte-equal after trimming.
    Exact,
    /// Equal after trimming and lowercasing.
    #[default]
    CaseInsensitive,
    /// Header text is not checked; cells map to columns by position.
    Ignore,
}

impl HeaderMatch {
    pub fn normalize(&self, header: &str) -> String {
        match self {
            HeaderMatch::CaseInsensitive => header.trim().to_lowercase(),
            HeaderMatch::Exact | HeaderMatch::Ignore => header.trim().to_string(),
        }
    }
}

/// One header a schema expects to find.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpectedHeader {
    pub column: String,
    pub text: String,
    pub required: bool,
    /// `false` for columns bound from the observed row itself.
    pub reconciled: bool,
}

impl ExpectedHeader {
    pub fn new(column: impl Into<String>, text: impl Into<String>, required: bool) -> Self {
        Self {
            column: column.into(),
            text: text.into(),
            required,
            reconciled: true,
        }
    }

    pub fn inferred(column: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            text: text.into(),
            required: false,
            reconciled: false,
        }
    }
}

/// Outcome of comparing expected and observed headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderReconciliation {
    pub given: Vec<String>,
    pub expected: Vec<String>,
    /// Required expected headers not found.
    pub missing: Vec<String>,
    /// Every expected header not found, required or not.
    pub absent: Vec<String>,
    /// Observed headers no column claims.
    pub unrecognized: Vec<String>,
    /// Column name -> index of its cell in each data row.
    #[serde(skip)]
    pub positions: HashMap<String, usize>,
}

impl HeaderReconciliation {
    pub fn is_mismatch(&self) -> bool {
        !self.unrecognized.is_empty() || !self.missing.is_empty()
    }

    /// The aggregate "Headers mismatch" message, if the headers do not match.
    pub fn error_message(&self) -> Option<String> {
        if !self.is_mismatch() {
            return None;
        }
        let mut message = format!(
            "Headers mismatch. Given headers ({}). Expected headers ({}). Unrecognized headers ({}).",
            self.given.join(", "),
            self.expected.join(", "),
            self.unrecognized.join(", ")
        );
        if !self.absent.is_empty() {
            message.push_str(&format!(" Missing headers ({}).", self.absent.join(", ")));
        }
        Some(message)
    }
}

/// Match `given` against `expected`.
pub fn reconcile(expected: &[ExpectedHeader], given: &[String], mode: HeaderMatch) -> HeaderReconciliation {
    let mut report = HeaderReconciliation {
        given: given.to_vec(),
        expected: expected.iter().map(|e| e.text.clone()).collect(),
        ..Default::default()
    };

    if mode == HeaderMatch::Ignore {
        for (index, header) in expected.iter().enumerate().take(given.len()) {
            report.positions.insert(header.column.clone(), index);
        }
        return report;
    }

    let normalized: Vec<String> = given.iter().map(|g| mode.normalize(g)).collect();
    let mut claimed = vec![false; given.len()];

    for header in expected {
        let wanted = mode.normalize(&header.text);
        let found = normalized
            .iter()
            .enumerate()
            .position(|(i, g)| !claimed[i] && *g == wanted);
        match found {
            Some(index) => {
                claimed[index] = true;
                report.positions.insert(header.column.clone(), index);
            }
            None if header.reconciled => {
                report.absent.push(header.text.clone());
                if header.required {
                    report.missing.push(header.text.clone());
                }
            }
            None => {}
        }
    }

    report.unrecognized = given
        .iter()
        .zip(&claimed)
        .filter(|(_, claimed)| !**claimed)
        .map(|(g, _)| g.clone())
        .collect();
    report
}
