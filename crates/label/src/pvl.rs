//! PVL text form of the label tree.
//!
//! Reading is permissive: comments (`/* */` and `#`), quoted strings that
//! span lines, arrays `(a, b)` and sets `{a, b}`, units `<km>`, pointer
//! keywords (`^IMAGE`), `END_OBJECT = X` / `End_Group`, and a terminating
//! `END` after which any bytes are ignored. Writing is canonical: two-space
//! indentation, `=` aligned within each container.

use crate::tree::{Container, Keyword, Node, Value};
use cube_common::{CubeError, Result};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_until, take_while1};
use nom::character::complete::{char, multispace1, not_line_ending, space0};
use nom::combinator::{map, opt, recognize};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;
use tracing::debug;

// ============================================================================
// Tokens
// ============================================================================

fn block_comment(input: &str) -> IResult<&str, String> {
    map(delimited(tag("/*"), take_until("*/"), tag("*/")), |c: &str| {
        c.trim().to_string()
    })(input)
}

fn hash_comment(input: &str) -> IResult<&str, String> {
    map(preceded(char('#'), not_line_ending), |c: &str| c.trim().to_string())(input)
}

/// Whitespace and comments; returns the comments seen.
fn filler(input: &str) -> IResult<&str, Vec<String>> {
    map(
        many0(alt((
            map(multispace1, |_| None),
            map(block_comment, Some),
            map(hash_comment, Some),
        ))),
        |items| items.into_iter().flatten().collect(),
    )(input)
}

/// Whitespace and comments, discarded.
fn sp(input: &str) -> IResult<&str, ()> {
    map(filler, |_| ())(input)
}

fn name(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        opt(char('^')),
        take_while1(|c: char| c.is_ascii_alphanumeric() || "_:.-".contains(c)),
    ))(input)
}

fn is_bare_char(c: char) -> bool {
    !c.is_whitespace() && !"(){},<>\"=".contains(c)
}

fn bare(input: &str) -> IResult<&str, Value> {
    map(take_while1(is_bare_char), Value::new)(input)
}

/// Collapse line breaks inside a quoted string: a trailing `-` joins the
/// lines directly, otherwise they are joined with one space.
fn unwrap_quoted(raw: &str) -> String {
    if !raw.contains('\n') {
        return raw.to_string();
    }
    let mut out = String::new();
    for (i, line) in raw.lines().enumerate() {
        let line = if i == 0 { line.trim_end() } else { line.trim() };
        if i > 0 && !out.is_empty() {
            if out.ends_with('-') {
                out.pop();
            } else {
                out.push(' ');
            }
        }
        out.push_str(line);
    }
    out
}

fn double_quoted(input: &str) -> IResult<&str, Value> {
    map(delimited(char('"'), take_until("\""), char('"')), |s: &str| {
        Value::quoted(unwrap_quoted(s))
    })(input)
}

fn single_quoted(input: &str) -> IResult<&str, Value> {
    map(delimited(char('\''), take_until("'"), char('\'')), |s: &str| {
        Value::quoted(s.to_string())
    })(input)
}

fn unit(input: &str) -> IResult<&str, String> {
    map(delimited(char('<'), take_until(">"), char('>')), |u: &str| {
        u.trim().to_string()
    })(input)
}

fn scalar(input: &str) -> IResult<&str, Value> {
    map(
        pair(
            alt((double_quoted, single_quoted, bare)),
            opt(preceded(space0, unit)),
        ),
        |(mut value, unit)| {
            if unit.is_some() {
                value.unit = unit;
            }
            value
        },
    )(input)
}

/// A nested array kept as a single value holding its canonical text.
fn nested(input: &str) -> IResult<&str, Value> {
    map(array, |values| Value::new(format_array(&values)))(input)
}

fn element(input: &str) -> IResult<&str, Value> {
    alt((nested, scalar))(input)
}

fn array_body(open: char, close: char) -> impl FnMut(&str) -> IResult<&str, Vec<Value>> {
    move |input| {
        delimited(
            pair(char(open), sp),
            separated_list0(tuple((sp, char(','), sp)), element),
            pair(sp, char(close)),
        )(input)
    }
}

fn array(input: &str) -> IResult<&str, Vec<Value>> {
    map(
        pair(
            alt((array_body('(', ')'), array_body('{', '}'))),
            opt(preceded(space0, unit)),
        ),
        |(mut values, unit)| {
            if let Some(u) = unit {
                for v in values.iter_mut().filter(|v| v.unit.is_none()) {
                    v.unit = Some(u.clone());
                }
            }
            values
        },
    )(input)
}

fn values(input: &str) -> IResult<&str, Vec<Value>> {
    alt((array, map(scalar, |v| vec![v])))(input)
}

/// `NAME [= VALUE]`
fn statement(input: &str) -> IResult<&str, (&str, Option<Vec<Value>>)> {
    pair(
        name,
        opt(preceded(tuple((space0, char('='), sp)), values)),
    )(input)
}

// ============================================================================
// Parsing
// ============================================================================

fn line_of(source: &str, rest: &str) -> usize {
    let offset = source.len() - rest.len();
    source[..offset].matches('\n').count() + 1
}

enum Frame {
    Group(Container),
    Object(Container),
}

/// Parse PVL text into a root container.
pub fn parse(text: &str) -> Result<Container> {
    let mut stack: Vec<Frame> = Vec::new();
    let mut root = Container::root();
    let mut rest = text;

    loop {
        let (after_fill, comments) = filler(rest).map_err(|e| CubeError::parse(e.to_string()))?;
        rest = after_fill;
        if rest.is_empty() {
            break;
        }

        let (after, (key, vals)) = statement(rest).map_err(|_| {
            let snippet: String = rest.chars().take(40).collect();
            CubeError::parse(format!("line {}: cannot parse '{}'", line_of(text, rest), snippet))
        })?;
        let line = line_of(text, rest);
        rest = after;

        let lower = key.to_ascii_lowercase();
        match (lower.as_str(), vals) {
            ("end", None) => break,
            ("object" | "begin_object", Some(v)) | ("group" | "begin_group", Some(v)) => {
                let name = v.first().map(|v| v.text.clone()).unwrap_or_default();
                let mut container = Container::new(name);
                container.comments = comments;
                if lower.ends_with("object") {
                    stack.push(Frame::Object(container));
                } else {
                    stack.push(Frame::Group(container));
                }
            }
            ("end_object" | "end_group", _) => {
                let frame = stack.pop().ok_or_else(|| {
                    CubeError::parse(format!("line {line}: {key} without an open block"))
                })?;
                let node = match (frame, lower.as_str()) {
                    (Frame::Object(c), "end_object") => Node::Object(c),
                    (Frame::Group(c), "end_group") => Node::Group(c),
                    _ => {
                        return Err(CubeError::parse(format!(
                            "line {line}: {key} does not close the open block"
                        )))
                    }
                };
                push_node(&mut stack, &mut root, node);
            }
            (_, Some(v)) => {
                let mut keyword = Keyword::array(key, v);
                keyword.comments = comments;
                push_node(&mut stack, &mut root, Node::Keyword(keyword));
            }
            (_, None) => {
                return Err(CubeError::parse(format!(
                    "line {line}: keyword {key} has no value"
                )))
            }
        }
    }

    if let Some(open) = stack.last() {
        let name = match open {
            Frame::Group(c) | Frame::Object(c) => c.name.clone(),
        };
        return Err(CubeError::parse(format!("block {name} is never closed")));
    }
    debug!(nodes = root.children().len(), bytes = text.len() - rest.len(), "Parsed PVL label");
    Ok(root)
}

fn push_node(stack: &mut [Frame], root: &mut Container, node: Node) {
    let target = match stack.last_mut() {
        Some(Frame::Group(c)) | Some(Frame::Object(c)) => c,
        None => root,
    };
    match node {
        Node::Keyword(k) => target.add_keyword(k),
        Node::Group(g) => target.add_group(g),
        Node::Object(o) => target.add_object(o),
    }
}

/// Byte offset just past the `END` statement, when present. Used to find
/// where attached binary data may begin.
pub fn end_offset(text: &str) -> Option<usize> {
    let mut rest = text;
    loop {
        let (after_fill, _) = filler(rest).ok()?;
        rest = after_fill;
        if rest.is_empty() {
            return None;
        }
        let (after, (key, vals)) = terminated(statement, space0)(rest).ok()?;
        if vals.is_none() && key.eq_ignore_ascii_case("end") {
            return Some(text.len() - after.len());
        }
        rest = after;
    }
}

// ============================================================================
// Emission
// ============================================================================

fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text.contains("/*")
        || text.chars().any(|c| c.is_whitespace() || "(){},<>\"'=#".contains(c))
}

fn format_value(value: &Value) -> String {
    let nested_array = !value.quoted && value.text.starts_with('(') && value.text.ends_with(')');
    let text = if !nested_array && (value.quoted || needs_quotes(&value.text)) {
        match (value.text.contains('"'), value.text.contains('\'')) {
            (true, false) => format!("'{}'", value.text),
            // No PVL quoting can hold both marks.
            (true, true) => {
                tracing::warn!(value = %value.text, "Replacing double quotes inside a mixed-quote PVL string");
                format!("\"{}\"", value.text.replace('"', "'"))
            }
            (false, _) => format!("\"{}\"", value.text),
        }
    } else {
        value.text.clone()
    };
    match &value.unit {
        Some(u) => format!("{text} <{u}>"),
        None => text,
    }
}

fn format_array(values: &[Value]) -> String {
    let shared_unit = values.first().and_then(|v| v.unit.clone()).filter(|u| {
        values.len() > 1 && values.iter().all(|v| v.unit.as_deref() == Some(u.as_str()))
    });
    let items: Vec<String> = values
        .iter()
        .map(|v| match &shared_unit {
            Some(_) => format_value(&Value {
                text: v.text.clone(),
                unit: None,
                quoted: v.quoted,
            }),
            None => format_value(v),
        })
        .collect();
    let body = format!("({})", items.join(", "));
    match shared_unit {
        Some(u) => format!("{body} <{u}>"),
        None => body,
    }
}

fn format_values(values: &[Value]) -> String {
    match values {
        [] => "Null".to_string(),
        [single] if !single.text.starts_with('(') => format_value(single),
        many => format_array(many),
    }
}

fn write_comments(out: &mut String, comments: &[String], pad: &str) {
    for c in comments {
        out.push_str(&format!("{pad}/* {c} */\n"));
    }
}

fn write_container(out: &mut String, container: &Container, depth: usize) {
    let pad = "  ".repeat(depth);
    let width = container.keywords().map(|k| k.name.len()).max().unwrap_or(0);

    for (i, node) in container.children().iter().enumerate() {
        match node {
            Node::Keyword(k) => {
                write_comments(out, &k.comments, &pad);
                out.push_str(&format!(
                    "{pad}{:<width$} = {}\n",
                    k.name,
                    format_values(&k.values),
                    width = width
                ));
            }
            Node::Group(c) | Node::Object(c) => {
                let (open, close) = match node {
                    Node::Group(_) => ("Group", "End_Group"),
                    _ => ("Object", "End_Object"),
                };
                if i > 0 {
                    out.push('\n');
                }
                write_comments(out, &c.comments, &pad);
                out.push_str(&format!("{pad}{open} = {}\n", format_value(&Value::new(c.name.clone()))));
                write_container(out, c, depth + 1);
                out.push_str(&format!("{pad}{close}\n"));
            }
        }
    }
}

/// Emit canonical PVL text, terminated by `End`.
pub fn emit(root: &Container) -> String {
    let mut out = String::new();
    write_comments(&mut out, &root.comments, "");
    write_container(&mut out, root, 0);
    out.push_str("End\n");
    out
}
