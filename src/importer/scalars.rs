//! Typed scalar extraction from XML nodes.
//!
//! Each function converts a node's text into one target type, recording a
//! breadcrumb-qualified diagnostic on failure and returning the type's
//! zero value so callers can keep walking siblings.

use super::diagnostics::Diagnostics;
use crate::model::Duration;
use crate::unit::{self, Unit};
use chrono::NaiveDateTime;

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DATE_FORMAT2: &str = "%Y-%m-%d %H:%M:%S";

/// Whether a unit token should be validated against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckUnit {
    Check,
    DoNotCheck,
}

/// The node's own text, trimmed. Concatenates all text children so CDATA
/// sections and plain text read the same.
pub fn node_text(node: roxmltree::Node) -> String {
    let mut out = String::new();
    for child in node.children() {
        if let Some(t) = child.text() {
            out.push_str(t);
        }
    }
    out.trim().to_string()
}

pub fn extract_string(node: roxmltree::Node) -> String {
    node_text(node)
}

/// Full-token double parse; trailing garbage is an error.
pub fn extract_double(node: roxmltree::Node, diags: &mut Diagnostics) -> f64 {
    match node_text(node).parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            diags.node_error(node);
            0.0
        }
    }
}

/// Full-token integer parse; a decimal point is an error.
pub fn extract_int(node: roxmltree::Node, diags: &mut Diagnostics) -> i32 {
    match node_text(node).parse::<i32>() {
        Ok(v) => v,
        Err(_) => {
            diags.node_error(node);
            0
        }
    }
}

/// Accepts case-insensitive `true`/`false` and `1`/`0`.
pub fn extract_bool(node: roxmltree::Node, diags: &mut Diagnostics) -> bool {
    let value = node_text(node);
    if value.eq_ignore_ascii_case("true") || value == "1" {
        return true;
    }
    if value.eq_ignore_ascii_case("false") || value == "0" {
        return false;
    }
    diags.node_error(node);
    false
}

/// Accepts `HH:MM:SS` with minutes and seconds below 60. Hours may use any
/// number of digits; minutes and seconds are one or two.
pub fn extract_duration(node: roxmltree::Node, diags: &mut Diagnostics) -> Duration {
    let value = node_text(node);
    let fields: Vec<&str> = value.split(':').collect();
    let well_formed = fields.len() == 3
        && !fields[0].is_empty()
        && fields
            .iter()
            .all(|f| f.chars().all(|c| c.is_ascii_digit()))
        && (1..=2).contains(&fields[1].len())
        && (1..=2).contains(&fields[2].len());
    if !well_formed {
        diags.node_error(node);
        return Duration::zero();
    }

    // All-digit fields can still overflow the integer type.
    let parsed = (
        fields[0].parse::<i64>(),
        fields[1].parse::<i64>(),
        fields[2].parse::<i64>(),
    );
    let (Ok(hours), Ok(minutes), Ok(seconds)) = parsed else {
        diags.node_error(node);
        return Duration::zero();
    };
    if minutes >= 60 || seconds >= 60 {
        diags.node_error(node);
        return Duration::zero();
    }
    Duration::from_hms(hours, minutes, seconds)
}

/// Accepts `%Y-%m-%dT%H:%M:%S`, then `%Y-%m-%d %H:%M:%S` as a fallback.
pub fn extract_datetime(node: roxmltree::Node, diags: &mut Diagnostics) -> Option<NaiveDateTime> {
    let value = node_text(node);
    NaiveDateTime::parse_from_str(&value, DATE_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(&value, DATE_FORMAT2))
        .map_or_else(
            |_| {
                diags.node_error(node);
                None
            },
            Some,
        )
}

/// Unit tokens are opaque strings. In `Check` mode a token that is neither
/// a tolerated alternate spelling nor a known registry entry is an error.
/// The empty token always passes, matching the registry's no-unit entry.
pub fn extract_unit(node: roxmltree::Node, check: CheckUnit, diags: &mut Diagnostics) -> Unit {
    let mut value = node_text(node);
    if check == CheckUnit::Check && !unit::tolerate(&mut value) && !unit::is_known(&Unit::new(&value))
    {
        diags.node_error(node);
    }
    Unit::new(&value)
}

/// First child element with the given tag name.
pub fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn missing_child(name: &str, diags: &mut Diagnostics) {
    tracing::warn!(tag = name, "tag not found in xml input");
    diags.error(format!("<{}> not found in xml input", name));
}

pub fn child_double(node: roxmltree::Node, name: &str, diags: &mut Diagnostics) -> f64 {
    match child(node, name) {
        Some(c) => extract_double(c, diags),
        None => {
            missing_child(name, diags);
            0.0
        }
    }
}

pub fn child_double_optional(
    node: roxmltree::Node,
    name: &str,
    default: f64,
    diags: &mut Diagnostics,
) -> f64 {
    match child(node, name) {
        Some(c) => extract_double(c, diags),
        None => default,
    }
}

pub fn child_int(node: roxmltree::Node, name: &str, diags: &mut Diagnostics) -> i32 {
    match child(node, name) {
        Some(c) => extract_int(c, diags),
        None => {
            missing_child(name, diags);
            0
        }
    }
}

pub fn child_bool(node: roxmltree::Node, name: &str, diags: &mut Diagnostics) -> bool {
    match child(node, name) {
        Some(c) => extract_bool(c, diags),
        None => {
            missing_child(name, diags);
            false
        }
    }
}

pub fn child_bool_optional(
    node: roxmltree::Node,
    name: &str,
    default: bool,
    diags: &mut Diagnostics,
) -> bool {
    match child(node, name) {
        Some(c) => extract_bool(c, diags),
        None => default,
    }
}

pub fn child_duration(node: roxmltree::Node, name: &str, diags: &mut Diagnostics) -> Duration {
    match child(node, name) {
        Some(c) => extract_duration(c, diags),
        None => {
            missing_child(name, diags);
            Duration::zero()
        }
    }
}

pub fn child_datetime(
    node: roxmltree::Node,
    name: &str,
    diags: &mut Diagnostics,
) -> Option<NaiveDateTime> {
    match child(node, name) {
        Some(c) => extract_datetime(c, diags),
        None => {
            missing_child(name, diags);
            None
        }
    }
}

/// A missing child yields the empty string without an error.
pub fn child_string(node: roxmltree::Node, name: &str) -> String {
    child(node, name).map(extract_string).unwrap_or_default()
}

/// A missing child yields the empty unit without an error.
pub fn child_unit(
    node: roxmltree::Node,
    name: &str,
    check: CheckUnit,
    diags: &mut Diagnostics,
) -> Unit {
    match child(node, name) {
        Some(c) => extract_unit(c, check, diags),
        None => Unit::empty(),
    }
}
