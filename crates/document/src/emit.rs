use crate::node::{GenericNode, Mapping, Scalar};
use crate::parser::resolve_plain;
use std::fmt::Write;

const INDENT: usize = 2;

/// Serialize a tree back to block-style document text.
///
/// Output is deterministic (mapping entries in insertion order) and parses
/// back to an equal tree. Empty collections are written as `[]` and `{}`.
pub fn emit(node: &GenericNode) -> String {
    let mut out = String::new();
    match node {
        GenericNode::Mapping(map) if !map.is_empty() => write_mapping(&mut out, map, 0),
        GenericNode::Sequence(items) if !items.is_empty() => write_sequence(&mut out, items, 0),
        _ => {
            out.push_str(&inline(node));
            out.push('\n');
        }
    }
    out
}

fn pad(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat_n(' ', indent));
}

fn is_block(node: &GenericNode) -> bool {
    match node {
        GenericNode::Mapping(map) => !map.is_empty(),
        GenericNode::Sequence(items) => !items.is_empty(),
        GenericNode::Scalar(_) => false,
    }
}

fn write_block(out: &mut String, node: &GenericNode, indent: usize) {
    match node {
        GenericNode::Mapping(map) => write_mapping(out, map, indent),
        GenericNode::Sequence(items) => write_sequence(out, items, indent),
        GenericNode::Scalar(_) => {}
    }
}

fn write_mapping(out: &mut String, map: &Mapping, indent: usize) {
    for (key, value) in map.iter() {
        pad(out, indent);
        out.push_str(&key_text(key));
        out.push(':');
        if is_block(value) {
            out.push('\n');
            write_block(out, value, indent + INDENT);
        } else {
            out.push(' ');
            out.push_str(&inline(value));
            out.push('\n');
        }
    }
}

fn write_sequence(out: &mut String, items: &[GenericNode], indent: usize) {
    for item in items {
        pad(out, indent);
        out.push_str("- ");
        if is_block(item) {
            // Write the child one level deeper, then fold its first line
            // onto the dash.
            let mut child = String::new();
            write_block(&mut child, item, indent + INDENT);
            out.push_str(&child[indent + INDENT..]);
        } else {
            out.push_str(&inline(item));
            out.push('\n');
        }
    }
}

fn inline(node: &GenericNode) -> String {
    match node {
        GenericNode::Scalar(scalar) => scalar_text(scalar),
        GenericNode::Sequence(_) => "[]".to_string(),
        GenericNode::Mapping(_) => "{}".to_string(),
    }
}

fn scalar_text(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null => "null".to_string(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Integer(i) => i.to_string(),
        Scalar::Float(f) => float_text(*f),
        Scalar::String(s) if is_plain_string(s) => s.clone(),
        Scalar::String(s) => quote(s),
    }
}

fn float_text(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { ".inf" } else { "-.inf" }.to_string()
    } else {
        // Debug formatting always keeps a `.` or an exponent, so the text
        // reads back as a float rather than an integer.
        format!("{f:?}")
    }
}

const INDICATORS: &[char] = &[
    '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%', '@',
    '`', '~', '.', '\u{feff}',
];

fn has_plain_hazards(s: &str) -> bool {
    s.is_empty()
        || s.trim_matches(' ') != s
        || s.starts_with(INDICATORS)
        || s.ends_with(':')
        || s.contains(": ")
        || s.contains(" #")
        || s.contains(|c: char| c.is_control() || matches!(c, ',' | '[' | ']' | '{' | '}' | '"' | '\'' | '\\'))
}

/// A string may be written unquoted if it reads back as the same string.
fn is_plain_string(s: &str) -> bool {
    !has_plain_hazards(s) && matches!(resolve_plain(s), Scalar::String(ref r) if r == s)
}

fn key_text(key: &str) -> String {
    if has_plain_hazards(key) {
        quote(key)
    } else {
        key.to_string()
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
