//! Target catalog
//!
//! A target is one HTTP request template (method, URL, body, headers) that is
//! replayed over and over during the attack. Targets are read once, before the
//! run starts, from a newline-delimited JSON source:
//!
//! ```text
//! {"method": "GET", "url": "http://localhost:8080/health"}
//! {"method": "POST", "url": "http://localhost:8080/items", "body": "eyJpZCI6MX0=", "header": {"Content-Type": ["application/json"]}}
//! ```
//!
//! `body` is base64 encoded. Blank lines are skipped. A line that is not valid
//! JSON, or that has no method or no URL, is recorded as a [`TargetError`] and
//! skipped; reading carries on to the end of the stream.
//!
//! # Example
//!
//! ```
//! use stairload::target::{read_targets, TargetDefaults};
//!
//! let src = "{\"method\":\"GET\"}\n{\"method\":\"GET\",\"url\":\"http://localhost/\"}\n";
//! let (catalog, errors) = read_targets(src.as_bytes(), &TargetDefaults::default());
//!
//! assert_eq!(catalog.len(), 1);
//! assert_eq!(errors.len(), 1);
//! ```

use crate::Result;
use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Header name to ordered list of values
pub type Header = BTreeMap<String, Vec<String>>;

/// A single request template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub method: String,
    pub url: String,
    pub body: Vec<u8>,
    pub header: Header,
}

/// Body and headers applied to every target at load time
///
/// The default body is used only when a line carries no body of its own.
/// Default headers are appended after the line's own values for the same name.
#[derive(Debug, Clone, Default)]
pub struct TargetDefaults {
    pub body: Vec<u8>,
    pub header: Header,
}

/// Per-line error while reading targets
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("line {line}: invalid target: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: target has no method")]
    NoMethod { line: usize },
    #[error("line {line}: target has no URL")]
    NoUrl { line: usize },
    #[error("line {line}: read failed: {source}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },
}

impl TargetError {
    /// 1-based line number the error refers to
    pub fn line(&self) -> usize {
        match self {
            TargetError::Json { line, .. }
            | TargetError::NoMethod { line }
            | TargetError::NoUrl { line }
            | TargetError::Io { line, .. } => *line,
        }
    }
}

/// Wire shape of one target line
#[derive(Debug, Deserialize)]
struct TargetLine {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, deserialize_with = "decode_body")]
    body: Vec<u8>,
    #[serde(default)]
    header: Option<Header>,
}

fn decode_body<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(encoded) => BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom),
        None => Ok(Vec::new()),
    }
}

/// Parse one non-blank line into a target
fn parse_target(
    line: &[u8],
    line_no: usize,
    defaults: &TargetDefaults,
) -> std::result::Result<Target, TargetError> {
    let parsed: TargetLine = serde_json::from_slice(line).map_err(|source| TargetError::Json {
        line: line_no,
        source,
    })?;

    let method = parsed
        .method
        .filter(|m| !m.is_empty())
        .ok_or(TargetError::NoMethod { line: line_no })?;
    let url = parsed
        .url
        .filter(|u| !u.is_empty())
        .ok_or(TargetError::NoUrl { line: line_no })?;

    let body = if parsed.body.is_empty() {
        defaults.body.clone()
    } else {
        parsed.body
    };

    let mut header = parsed.header.unwrap_or_default();
    for (name, values) in &defaults.header {
        header
            .entry(name.clone())
            .or_default()
            .extend(values.iter().cloned());
    }

    Ok(Target {
        method,
        url,
        body,
        header,
    })
}

/// Read every target from a line-delimited JSON source
///
/// Never fails as a whole: bad lines are collected into the returned error list
/// and skipped. A read error ends the stream early and is recorded too. Reaching
/// the end of the stream is not an error.
pub fn read_targets<R: BufRead>(
    mut src: R,
    defaults: &TargetDefaults,
) -> (TargetCatalog, Vec<TargetError>) {
    let mut targets = Vec::new();
    let mut errors = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        match src.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(source) => {
                errors.push(TargetError::Io {
                    line: line_no + 1,
                    source,
                });
                break;
            }
        }
        line_no += 1;

        let line = buf.trim_ascii();
        if line.is_empty() {
            continue;
        }

        match parse_target(line, line_no, defaults) {
            Ok(target) => targets.push(target),
            Err(e) => errors.push(e),
        }
    }

    (TargetCatalog::new(targets), errors)
}

/// Open a targets file and read it
///
/// Failing to open the file is fatal; per-line problems are returned alongside
/// the catalog.
pub fn load_targets_file(
    path: &Path,
    defaults: &TargetDefaults,
) -> Result<(TargetCatalog, Vec<TargetError>)> {
    let file = File::open(path)
        .with_context(|| format!("Unable to open targets file: {}", path.display()))?;

    Ok(read_targets(BufReader::new(file), defaults))
}

/// Immutable set of targets with a round-robin selector
///
/// Selection is lock-free, so a catalog can be shared behind an `Arc` by every
/// in-flight request of a phase.
#[derive(Debug, Default)]
pub struct TargetCatalog {
    targets: Vec<Target>,
    cursor: AtomicUsize,
}

impl TargetCatalog {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Next target in round-robin order, or `None` for an empty catalog
    pub fn next(&self) -> Option<&Target> {
        if self.targets.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.targets.get(i % self.targets.len())
    }
}
