//! The `${...}` placeholder substitution engine.
//!
//! Strings in workload documents may embed placeholder expressions like
//! `${metadata.name}` or `${resources.db.host}`. This module detects those
//! expressions, hands their content to a caller-supplied replacer, and splices
//! the result back into the surrounding text. A literal dollar is written by
//! doubling it: `$${resources.db.host}` renders as the text
//! `${resources.db.host}` and a bare `$$` collapses to `$`.
//!
//! The same machinery runs in two modes. In resolution mode the replacer looks
//! values up and returns the final text. In collection mode (used by
//! dependency extraction) the replacer records every reference it sees and
//! echoes the content back, so a document can be scanned for references
//! without any outputs existing yet.
//!
//! All placeholder failures within one string are reported together rather
//! than stopping at the first, see [`PlaitError::aggregate`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::{PlaitError, Result};
use crate::state::OutputLookupFn;

/// Matches `${...}` placeholders as well as the `$${...}` and `$$` escape
/// forms. Group 1 distinguishes escapes (it starts with `$`), group 2 captures
/// the placeholder content.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$((?:\$?\{([^}]*)\})|\$)").expect("placeholder regex is valid"));

/// Split placeholder content on `.` into path segments.
///
/// A literal dot inside a segment is written `\.` and a literal backslash
/// `\\`. Escapes are masked with sentinel bytes that cannot appear in the
/// input before the split and restored per segment afterwards.
pub fn split_ref_parts(reference: &str) -> Vec<String> {
    let masked = reference.replace("\\\\", "\u{1}").replace("\\.", "\u{0}");
    masked
        .split('.')
        .map(|part| part.replace('\u{0}', ".").replace('\u{1}', "\\"))
        .collect()
}

/// The default un-escaper: drops the leading `$` of an escape sequence, so
/// `$$` becomes `$` and `$${x}` becomes `${x}`.
pub fn default_un_escaper(original: &str) -> Result<String> {
    Ok(original[1..].to_string())
}

/// A configured placeholder substituter.
///
/// The replacer is required; the un-escaper defaults to
/// [`default_un_escaper`] and only needs overriding when `$$` sequences must
/// be preserved for a later expansion pass.
pub struct Substituter<'a> {
    replacer: Box<dyn FnMut(&str) -> Result<String> + 'a>,
    un_escaper: Box<dyn FnMut(&str) -> Result<String> + 'a>,
}

impl<'a> Substituter<'a> {
    /// Build a substituter with the default un-escaper.
    pub fn new(replacer: impl FnMut(&str) -> Result<String> + 'a) -> Self {
        Self {
            replacer: Box::new(replacer),
            un_escaper: Box::new(default_un_escaper),
        }
    }

    /// Override the un-escaper. The function receives the whole matched
    /// escape sequence including both dollars.
    #[must_use]
    pub fn with_un_escaper(mut self, un_escaper: impl FnMut(&str) -> Result<String> + 'a) -> Self {
        self.un_escaper = Box::new(un_escaper);
        self
    }

    /// Replace every placeholder and escape occurrence in `src` left to
    /// right. Failures from individual placeholders are aggregated into one
    /// error; the returned string is only valid when the result is `Ok`.
    pub fn substitute_string(&mut self, src: &str) -> Result<String> {
        let mut out = String::with_capacity(src.len());
        let mut errors = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER_RE.captures_iter(src) {
            let whole = caps.get(0).expect("capture 0 is the whole match");
            out.push_str(&src[last..whole.start()]);
            last = whole.end();

            let inner = caps.get(1).map_or("", |m| m.as_str());
            if inner.starts_with('$') {
                // escape form: $${...} or $$
                match (self.un_escaper)(whole.as_str()) {
                    Ok(replacement) => out.push_str(&replacement),
                    Err(err) => errors.push(PlaitError::UnEscape {
                        fragment: whole.as_str().to_string(),
                        source: Box::new(err),
                    }),
                }
            } else {
                let content = caps.get(2).map_or("", |m| m.as_str());
                match (self.replacer)(content) {
                    Ok(replacement) => out.push_str(&replacement),
                    Err(err) => errors.push(err),
                }
            }
        }
        out.push_str(&src[last..]);
        match PlaitError::aggregate(errors) {
            Some(err) => Err(err),
            None => Ok(out),
        }
    }

    /// Apply [`Self::substitute_string`] to every string leaf of a nested
    /// value. Maps and arrays are rebuilt (the input is never modified),
    /// non-string scalars pass through unchanged. Errors inside a container
    /// are wrapped with the key or index they occurred under.
    pub fn substitute(&mut self, source: &Value) -> Result<Value> {
        match source {
            Value::String(s) => self.substitute_string(s).map(Value::String),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    let substituted =
                        self.substitute(value).map_err(|e| e.context(key.clone()))?;
                    out.insert(key.clone(), substituted);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.substitute(item).map_err(|e| e.context(i.to_string())))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }
}

/// Replace all `${...}` placeholders in `src` using `replacer`, with default
/// `$$` un-escaping.
pub fn substitute_string(
    src: &str,
    replacer: impl FnMut(&str) -> Result<String>,
) -> Result<String> {
    Substituter::new(replacer).substitute_string(src)
}

/// Recursively substitute placeholders through a nested value, with default
/// `$$` un-escaping. Returns a new value.
pub fn substitute(source: &Value, replacer: impl FnMut(&str) -> Result<String>) -> Result<Value> {
    Substituter::new(replacer).substitute(source)
}

/// Walk a map by successive keys. With no keys the whole map is returned.
pub(crate) fn lookup_path<S: AsRef<str>>(ctx: &Map<String, Value>, keys: &[S]) -> Result<Value> {
    let mut current: Option<&Value> = None;
    for key in keys {
        let key = key.as_ref();
        let map = match current {
            None => ctx,
            Some(Value::Object(m)) => m,
            Some(_) => {
                return Err(PlaitError::LookupNotAMap {
                    key: key.to_string(),
                });
            }
        };
        current = Some(map.get(key).ok_or_else(|| PlaitError::LookupKeyNotFound {
            key: key.to_string(),
        })?);
    }
    Ok(match current {
        Some(v) => v.clone(),
        None => Value::Object(ctx.clone()),
    })
}

/// Build a replacer that resolves `metadata.*` references against a metadata
/// tree and `resources.<name>.*` references against a per-resource table of
/// output lookup functions.
///
/// A resolved non-string value is rendered to its compact JSON text form
/// since placeholders always substitute into string contexts.
pub fn build_substitution_function(
    metadata: Map<String, Value>,
    resources: BTreeMap<String, OutputLookupFn>,
) -> impl Fn(&str) -> Result<String> {
    move |reference: &str| {
        let parts = split_ref_parts(reference);
        let resolved = match parts[0].as_str() {
            "metadata" => {
                if parts.len() < 2 {
                    return Err(PlaitError::ReferenceMissingKey {
                        reference: reference.to_string(),
                        what: "metadata key",
                    });
                }
                lookup_path(&metadata, &parts[1..]).map_err(|e| PlaitError::InvalidReference {
                    reference: reference.to_string(),
                    source: Box::new(e),
                })?
            }
            "resources" => {
                if parts.len() < 2 {
                    return Err(PlaitError::ReferenceMissingKey {
                        reference: reference.to_string(),
                        what: "resource name",
                    });
                }
                let lookup =
                    resources
                        .get(&parts[1])
                        .ok_or_else(|| PlaitError::UnknownResource {
                            reference: reference.to_string(),
                            name: parts[1].clone(),
                        })?;
                let keys: Vec<&str> = parts[2..].iter().map(String::as_str).collect();
                lookup(&keys).map_err(|e| PlaitError::InvalidReference {
                    reference: reference.to_string(),
                    source: Box::new(e),
                })?
            }
            _ => {
                return Err(PlaitError::UnsupportedReferenceRoot {
                    reference: reference.to_string(),
                });
            }
        };
        match resolved {
            Value::String(s) => Ok(s),
            other => Ok(serde_json::to_string(&other)?),
        }
    }
}
