use crate::error::{ParseError, ParseErrorReason};
use crate::node::{GenericNode, Mapping, Scalar};

/// Collections nested deeper than this, block and flow levels combined,
/// are rejected.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Parse document text into a generic tree.
///
/// Block structure is carried by indentation (spaces only): `key: value`
/// lines form mappings, `- item` lines form sequences. Single-line flow
/// collections (`[1, 2]`, `{x: 0, y: 1}`) are accepted as values. An empty
/// document parses to null.
pub fn parse(text: &str) -> Result<GenericNode, ParseError> {
    let _span = tracing::debug_span!("parse_document", bytes = text.len()).entered();
    let lines = scan_lines(text)?;
    let mut parser = BlockParser {
        lines,
        pos: 0,
        depth: 0,
    };

    let Some(first) = parser.peek() else {
        return Ok(GenericNode::null());
    };
    let root = parser.block(first.indent)?;

    if let Some(line) = parser.peek() {
        let reason = if line.indent == first.indent {
            ParseErrorReason::UnexpectedContent("content after the end of the document".into())
        } else {
            ParseErrorReason::BadIndentation
        };
        return Err(ParseError::new(line.number, line.indent + 1, reason));
    }
    tracing::trace!(root = root.type_name(), "document parsed");
    Ok(root)
}

/// One content line: comments and trailing spaces stripped, blank lines
/// dropped.
#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: usize,
    /// 0-based column of the first content character.
    indent: usize,
    text: &'a str,
}

impl Line<'_> {
    /// 1-based column of byte `offset` within `text`.
    fn column(&self, offset: usize) -> usize {
        self.indent + self.text[..offset].chars().count() + 1
    }
}

fn scan_lines(source: &str) -> Result<Vec<Line<'_>>, ParseError> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut lines = Vec::new();
    for (idx, raw) in source.split('\n').enumerate() {
        let number = idx + 1;
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let indent = raw.len() - raw.trim_start_matches(' ').len();
        let content = strip_comment(&raw[indent..], number, indent)?;
        let text = content.trim_end_matches(' ');
        if text.is_empty() {
            continue;
        }
        if lines.is_empty() && indent == 0 && text == "---" {
            continue;
        }
        lines.push(Line {
            number,
            indent,
            text,
        });
    }
    Ok(lines)
}

/// Cut a trailing comment, rejecting tabs and unterminated quotes on the way.
fn strip_comment(content: &str, line: usize, indent: usize) -> Result<&str, ParseError> {
    let mut quote: Option<(char, usize)> = None;
    let mut prev: Option<char> = None;
    let mut last_significant: Option<char> = None;
    let mut column = indent + 1;
    let mut chars = content.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match quote {
            Some(('"', _)) => {
                if c == '\\' {
                    chars.next();
                    column += 1;
                } else if c == '"' {
                    quote = None;
                }
            }
            Some(_) => {
                if c == '\'' {
                    if chars.peek().is_some_and(|&(_, n)| n == '\'') {
                        chars.next();
                        column += 1;
                    } else {
                        quote = None;
                    }
                }
            }
            None => {
                if c == '\t' {
                    return Err(ParseError::new(line, column, ParseErrorReason::TabCharacter));
                }
                if c == '#' && matches!(prev, None | Some(' ')) {
                    return Ok(&content[..i]);
                }
                if (c == '"' || c == '\'') && opens_quote(prev, last_significant) {
                    quote = Some((c, column));
                }
            }
        }
        if c != ' ' {
            last_significant = Some(c);
        }
        prev = Some(c);
        column += 1;
    }

    match quote {
        Some((_, start)) => Err(ParseError::new(
            line,
            start,
            ParseErrorReason::UnterminatedQuote,
        )),
        None => Ok(content),
    }
}

/// A quote starts a quoted scalar only where a scalar may start.
fn opens_quote(prev: Option<char>, last_significant: Option<char>) -> bool {
    match prev {
        None | Some('[' | '{' | ',') => true,
        Some(' ') => matches!(
            last_significant,
            None | Some(':' | '-' | '?' | ',' | '[' | '{')
        ),
        _ => false,
    }
}

fn is_sequence_item(text: &str) -> bool {
    text == "-" || text.starts_with("- ")
}

fn bad_indentation(line: &Line<'_>) -> ParseError {
    ParseError::new(line.number, line.indent + 1, ParseErrorReason::BadIndentation)
}

struct Entry<'a> {
    key: String,
    value: &'a str,
    value_column: usize,
}

/// Byte index of the `:` separating a mapping key from its value.
fn find_key_separator(text: &str) -> Option<usize> {
    if text.starts_with('[') || text.starts_with('{') {
        return None;
    }
    let separator_at = |i: usize| {
        let next = text[i + 1..].chars().next();
        matches!(next, None | Some(' '))
    };
    if text.starts_with('"') || text.starts_with('\'') {
        let end = quoted_end(text)?;
        let rest = &text[end..];
        let trimmed = rest.trim_start_matches(' ');
        let idx = end + (rest.len() - trimmed.len());
        return (trimmed.starts_with(':') && separator_at(idx)).then_some(idx);
    }
    text.char_indices()
        .find(|&(i, c)| c == ':' && separator_at(i))
        .map(|(i, _)| i)
}

/// Byte index just past the closing quote of the quoted scalar `text` opens.
fn quoted_end(text: &str) -> Option<usize> {
    let mut chars = text.char_indices();
    let (_, quote) = chars.next()?;
    while let Some((i, c)) = chars.next() {
        match (quote, c) {
            ('"', '\\') => {
                chars.next();
            }
            ('"', '"') => return Some(i + 1),
            ('\'', '\'') => {
                if text[i + 1..].starts_with('\'') {
                    chars.next();
                } else {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_entry<'a>(line: &Line<'a>) -> Result<Option<Entry<'a>>, ParseError> {
    let Some(colon) = find_key_separator(line.text) else {
        return Ok(None);
    };
    let raw_key = line.text[..colon].trim_end_matches(' ');
    let key = if raw_key.starts_with('"') || raw_key.starts_with('\'') {
        let (key, used) = parse_quoted(raw_key, line.number, line.indent + 1)?;
        if used != raw_key.len() {
            return Err(ParseError::unexpected(
                line.number,
                line.column(used),
                "text after quoted key",
            ));
        }
        key
    } else if raw_key.is_empty() {
        return Err(ParseError::unexpected(
            line.number,
            line.indent + 1,
            "empty mapping key",
        ));
    } else {
        raw_key.to_string()
    };

    let after = &line.text[colon + 1..];
    let value = after.trim_start_matches(' ');
    let value_offset = colon + 1 + (after.len() - value.len());
    Ok(Some(Entry {
        key,
        value,
        value_column: line.column(value_offset),
    }))
}

fn too_deep(line: usize, column: usize) -> ParseError {
    ParseError::new(line, column, ParseErrorReason::NestingTooDeep(MAX_NESTING_DEPTH))
}

struct BlockParser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
    /// Open block collections around the current line.
    depth: usize,
}

impl<'a> BlockParser<'a> {
    fn peek(&self) -> Option<Line<'a>> {
        self.lines.get(self.pos).copied()
    }

    /// Open one more collection level at `line`.
    fn descend(&mut self, line: &Line<'_>) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(too_deep(line.number, line.indent + 1));
        }
        self.depth += 1;
        Ok(())
    }

    /// Parse the block whose first line is the current line at `indent`.
    fn block(&mut self, indent: usize) -> Result<GenericNode, ParseError> {
        let Some(line) = self.peek() else {
            return Ok(GenericNode::null());
        };
        if is_sequence_item(line.text) {
            return self.sequence(indent);
        }
        if split_entry(&line)?.is_some() {
            return self.mapping(indent);
        }
        self.pos += 1;
        parse_inline(line.text, line.number, line.indent + 1, self.depth)
    }

    fn mapping(&mut self, indent: usize) -> Result<GenericNode, ParseError> {
        if let Some(line) = self.peek() {
            self.descend(&line)?;
        }
        let mut map = Mapping::new();
        while let Some(line) = self.peek() {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(bad_indentation(&line));
            }
            if is_sequence_item(line.text) {
                return Err(ParseError::unexpected(
                    line.number,
                    line.indent + 1,
                    "sequence item where a mapping key was expected",
                ));
            }
            let Some(entry) = split_entry(&line)? else {
                return Err(ParseError::unexpected(
                    line.number,
                    line.indent + 1,
                    "expected `key: value`",
                ));
            };
            if map.contains_key(&entry.key) {
                return Err(ParseError::new(
                    line.number,
                    line.indent + 1,
                    ParseErrorReason::DuplicateKey(entry.key),
                ));
            }
            self.pos += 1;
            let value = if entry.value.is_empty() {
                self.nested(indent, true)?
            } else {
                parse_inline(entry.value, line.number, entry.value_column, self.depth)?
            };
            map.insert(entry.key, value);
        }
        self.depth -= 1;
        Ok(GenericNode::Mapping(map))
    }

    fn sequence(&mut self, indent: usize) -> Result<GenericNode, ParseError> {
        if let Some(line) = self.peek() {
            self.descend(&line)?;
        }
        let mut items = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(bad_indentation(&line));
            }
            if !is_sequence_item(line.text) {
                break;
            }
            let rest = line.text[1..].trim_start_matches(' ');
            if rest.is_empty() {
                self.pos += 1;
                items.push(self.nested(indent, false)?);
            } else {
                // Re-read the remainder of `- ...` as a line of its own at a
                // deeper indent, so compact `- key: value` items work.
                let inner = line.indent + (line.text.len() - rest.len());
                self.lines[self.pos] = Line {
                    number: line.number,
                    indent: inner,
                    text: rest,
                };
                items.push(self.block(inner)?);
            }
        }
        self.depth -= 1;
        Ok(GenericNode::Sequence(items))
    }

    /// Value of a key or item whose inline part is empty.
    fn nested(&mut self, parent: usize, allow_same_level_sequence: bool) -> Result<GenericNode, ParseError> {
        match self.peek() {
            Some(next) if next.indent > parent => self.block(next.indent),
            Some(next)
                if allow_same_level_sequence
                    && next.indent == parent
                    && is_sequence_item(next.text) =>
            {
                self.sequence(parent)
            }
            _ => Ok(GenericNode::null()),
        }
    }
}

/// Parse the inline part of a line: a flow collection, a quoted scalar or a
/// plain scalar. `column` is the 1-based column of `text`'s first character;
/// `depth` counts the block collections already open around it.
fn parse_inline(
    text: &str,
    line: usize,
    column: usize,
    depth: usize,
) -> Result<GenericNode, ParseError> {
    match text.chars().next() {
        Some('[' | '{') => {
            let mut flow = Flow {
                text,
                pos: 0,
                line,
                column,
                depth,
            };
            let node = flow.value()?;
            flow.skip_spaces();
            if flow.pos < text.len() {
                return Err(flow.unexpected(flow.pos, "text after flow collection"));
            }
            Ok(node)
        }
        Some('"' | '\'') => {
            let (value, used) = parse_quoted(text, line, column)?;
            if !text[used..].trim_start_matches(' ').is_empty() {
                let at = column + text[..used].chars().count();
                return Err(ParseError::unexpected(line, at, "text after quoted scalar"));
            }
            Ok(GenericNode::string(value))
        }
        Some('|' | '>') => Err(ParseError::unexpected(
            line,
            column,
            "block scalars are not supported",
        )),
        Some('&' | '*' | '!') => Err(ParseError::unexpected(
            line,
            column,
            "anchors, aliases and tags are not supported",
        )),
        Some(c @ ('%' | '@' | '`')) => Err(ParseError::unexpected(
            line,
            column,
            format!("reserved indicator `{c}`"),
        )),
        _ => {
            if let Some(i) = text.find(": ") {
                let at = column + text[..i].chars().count();
                return Err(ParseError::unexpected(
                    line,
                    at,
                    "mapping value on the same line as another key",
                ));
            }
            Ok(GenericNode::Scalar(resolve_plain(text)))
        }
    }
}

/// Parse a single-line quoted scalar at the start of `text`. Returns the
/// decoded value and the number of bytes consumed, closing quote included.
fn parse_quoted(text: &str, line: usize, column: usize) -> Result<(String, usize), ParseError> {
    let mut chars = text.char_indices().peekable();
    let Some((_, quote)) = chars.next() else {
        return Err(ParseError::new(line, column, ParseErrorReason::UnterminatedQuote));
    };
    let mut out = String::new();
    let mut col = column + 1;

    while let Some((i, c)) = chars.next() {
        if quote == '\'' {
            if c == '\'' {
                if chars.peek().is_some_and(|&(_, n)| n == '\'') {
                    chars.next();
                    out.push('\'');
                    col += 2;
                    continue;
                }
                return Ok((out, i + 1));
            }
            out.push(c);
            col += 1;
            continue;
        }

        match c {
            '"' => return Ok((out, i + 1)),
            '\\' => {
                let escape_column = col;
                let Some((_, e)) = chars.next() else {
                    break;
                };
                col += 1;
                let decoded = match e {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    '"' => '"',
                    '\\' => '\\',
                    '/' => '/',
                    'u' => {
                        let hex: String = (0..4).filter_map(|_| chars.next().map(|(_, h)| h)).collect();
                        col += hex.chars().count();
                        u32::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|_| hex.len() == 4)
                            .and_then(char::from_u32)
                            .ok_or_else(|| {
                                ParseError::new(
                                    line,
                                    escape_column,
                                    ParseErrorReason::InvalidEscape(format!("\\u{hex}")),
                                )
                            })?
                    }
                    other => {
                        return Err(ParseError::new(
                            line,
                            escape_column,
                            ParseErrorReason::InvalidEscape(format!("\\{other}")),
                        ));
                    }
                };
                out.push(decoded);
            }
            _ => out.push(c),
        }
        col += 1;
    }

    Err(ParseError::new(line, column, ParseErrorReason::UnterminatedQuote))
}

/// Resolve an unquoted scalar to its kind.
pub(crate) fn resolve_plain(text: &str) -> Scalar {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => return Scalar::Null,
        "true" | "True" | "TRUE" => return Scalar::Bool(true),
        "false" | "False" | "FALSE" => return Scalar::Bool(false),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            return Scalar::Float(f64::INFINITY);
        }
        "-.inf" | "-.Inf" | "-.INF" => return Scalar::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Scalar::Float(f64::NAN),
        _ => {}
    }

    let unsigned = text.strip_prefix(&['+', '-'][..]).unwrap_or(text);
    if !unsigned.is_empty() && unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return match text.parse::<i64>() {
            Ok(i) => Scalar::Integer(i),
            // Out of i64 range: keep the magnitude as a float.
            Err(_) => text
                .parse::<f64>()
                .map(Scalar::Float)
                .unwrap_or_else(|_| Scalar::String(text.to_string())),
        };
    }
    if looks_like_float(unsigned) {
        if let Ok(f) = text.parse::<f64>() {
            return Scalar::Float(f);
        }
    }
    Scalar::String(text.to_string())
}

fn looks_like_float(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && s.bytes().any(|b| b.is_ascii_digit())
        && s.bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
}

/// Recursive-descent parser for one line of flow syntax.
struct Flow<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    depth: usize,
}

impl Flow<'_> {
    fn column_at(&self, pos: usize) -> usize {
        self.column + self.text[..pos].chars().count()
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
    }

    fn unexpected(&self, pos: usize, what: impl Into<String>) -> ParseError {
        ParseError::unexpected(self.line, self.column_at(pos), what)
    }

    fn unclosed(&self, open: usize, close: char) -> ParseError {
        ParseError::new(
            self.line,
            self.column_at(open),
            ParseErrorReason::UnclosedFlow(close),
        )
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(too_deep(self.line, self.column_at(self.pos)));
        }
        self.depth += 1;
        Ok(())
    }

    fn value(&mut self) -> Result<GenericNode, ParseError> {
        self.skip_spaces();
        match self.peek() {
            Some('[') => self.sequence(),
            Some('{') => self.mapping(),
            Some('"' | '\'') => self.quoted().map(GenericNode::string),
            Some(',' | ']' | '}') | None => Err(self.unexpected(self.pos, "expected a value")),
            Some(_) => {
                let raw = self.plain(false);
                Ok(GenericNode::Scalar(resolve_plain(raw)))
            }
        }
    }

    fn quoted(&mut self) -> Result<String, ParseError> {
        let (value, used) =
            parse_quoted(&self.text[self.pos..], self.line, self.column_at(self.pos))?;
        self.pos += used;
        Ok(value)
    }

    fn plain(&mut self, key: bool) -> &str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ',' | '[' | ']' | '{' | '}') || (key && c == ':') {
                break;
            }
            self.bump();
        }
        self.text[start..self.pos].trim_end_matches(' ')
    }

    fn sequence(&mut self) -> Result<GenericNode, ParseError> {
        self.descend()?;
        let open = self.pos;
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_spaces();
            match self.peek() {
                None => return Err(self.unclosed(open, ']')),
                Some(']') => {
                    self.bump();
                    break;
                }
                Some(_) => {}
            }
            items.push(self.value()?);
            self.skip_spaces();
            let at = self.pos;
            match self.bump() {
                Some(',') => continue,
                Some(']') => break,
                None => return Err(self.unclosed(open, ']')),
                Some(c) => return Err(self.unexpected(at, format!("`{c}` in flow sequence"))),
            }
        }
        self.depth -= 1;
        Ok(GenericNode::Sequence(items))
    }

    fn mapping(&mut self) -> Result<GenericNode, ParseError> {
        self.descend()?;
        let open = self.pos;
        self.bump();
        let mut map = Mapping::new();
        loop {
            self.skip_spaces();
            match self.peek() {
                None => return Err(self.unclosed(open, '}')),
                Some('}') => {
                    self.bump();
                    break;
                }
                Some(_) => {}
            }

            let key_pos = self.pos;
            let key = match self.peek() {
                Some('"' | '\'') => self.quoted()?,
                _ => self.plain(true).to_string(),
            };
            if key.is_empty() {
                return Err(self.unexpected(key_pos, "empty mapping key"));
            }
            self.skip_spaces();
            let at = self.pos;
            match self.bump() {
                Some(':') => {}
                None => return Err(self.unclosed(open, '}')),
                Some(_) => return Err(self.unexpected(at, "expected `:` after flow mapping key")),
            }
            self.skip_spaces();
            let value = match self.peek() {
                None => return Err(self.unclosed(open, '}')),
                Some(',' | '}') => GenericNode::null(),
                Some(_) => self.value()?,
            };
            if map.contains_key(&key) {
                return Err(ParseError::new(
                    self.line,
                    self.column_at(key_pos),
                    ParseErrorReason::DuplicateKey(key),
                ));
            }
            map.insert(key, value);

            self.skip_spaces();
            let at = self.pos;
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                None => return Err(self.unclosed(open, '}')),
                Some(c) => return Err(self.unexpected(at, format!("`{c}` in flow mapping"))),
            }
        }
        self.depth -= 1;
        Ok(GenericNode::Mapping(map))
    }
}
