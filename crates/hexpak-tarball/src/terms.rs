//! Safe reader and writer for the configuration term format.
//!
//! `metadata.config` stores the package metadata as one key/value pair per
//! line, each rendered as a term literal terminated by `.`:
//!
//! ```text
//! {<<"app">>,<<"ecto">>}.
//! {<<"version">>,<<"1.0.0">>}.
//! ```
//!
//! The reader accepts atoms, binaries, numbers, strings, lists and tuples,
//! and nothing else: the grammar has no production for calls, funs or
//! comprehensions, so code-carrying input fails to tokenize. The writer
//! renders the same subset, normalizing values first (maps become key-sorted
//! pair lists, atoms other than `true`/`false`/`undefined` become binaries).

use std::collections::BTreeMap;

use crate::error::MetadataError;

/// A term value as stored in `metadata.config`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A binary, the common string shape (`<<"...">>`).
    Binary(String),
    /// A bare or quoted atom.
    Atom(String),
    Int(i64),
    Float(f64),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    /// A string-keyed mapping. Never produced by the reader (the wire form
    /// is a pair list); exists so callers and the normalizer can work with
    /// mappings directly.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Shorthand for a binary value.
    pub fn binary(s: impl Into<String>) -> Self {
        Self::Binary(s.into())
    }

    /// The string inside a binary, if this is one.
    pub fn as_binary(&self) -> Option<&str> {
        match self {
            Self::Binary(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding

/// Render a metadata mapping to the text term form.
pub fn encode_metadata(metadata: &BTreeMap<String, Value>) -> String {
    let mut out = String::new();
    for (key, value) in metadata {
        out.push('{');
        render_binary(&mut out, key);
        out.push(',');
        render(&mut out, &normalize_for_encoding(value));
        out.push_str("}.\n");
    }
    out
}

/// Atoms other than `true`/`false`/`undefined` become binaries; maps become
/// key-sorted lists of 2-tuples; nested structures recurse.
fn normalize_for_encoding(value: &Value) -> Value {
    match value {
        Value::Atom(name) if matches!(name.as_str(), "true" | "false" | "undefined") => {
            value.clone()
        }
        Value::Atom(name) => Value::Binary(name.clone()),
        Value::Map(map) => Value::List(
            map.iter()
                .map(|(k, v)| {
                    Value::Tuple(vec![Value::Binary(k.clone()), normalize_for_encoding(v)])
                })
                .collect(),
        ),
        Value::List(items) => Value::List(items.iter().map(normalize_for_encoding).collect()),
        Value::Tuple(items) => Value::Tuple(items.iter().map(normalize_for_encoding).collect()),
        other => other.clone(),
    }
}

fn render(out: &mut String, value: &Value) {
    match value {
        Value::Binary(s) => render_binary(out, s),
        Value::Atom(name) => render_atom(out, name),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Float(f) => out.push_str(&format!("{f:?}")),
        Value::List(items) => render_seq(out, items, '[', ']'),
        Value::Tuple(items) => render_seq(out, items, '{', '}'),
        // Maps are normalized away before rendering; handle one anyway.
        Value::Map(_) => render(out, &normalize_for_encoding(value)),
    }
}

fn render_seq(out: &mut String, items: &[Value], open: char, close: char) {
    out.push(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        render(out, item);
    }
    out.push(close);
}

fn render_binary(out: &mut String, s: &str) {
    out.push_str("<<\"");
    push_escaped(out, s, '"');
    out.push_str("\">>");
}

fn render_atom(out: &mut String, name: &str) {
    let bare = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@');
    if bare {
        out.push_str(name);
    } else {
        out.push('\'');
        push_escaped(out, name, '\'');
        out.push('\'');
    }
}

fn push_escaped(out: &mut String, s: &str, quote: char) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding

/// Parse `metadata.config` bytes into a metadata mapping.
///
/// The bytes are read as UTF-8, falling back to Latin-1 when that fails.
/// Top-level terms must be dot-terminated 2-tuples whose first element is a
/// binary or atom key.
pub fn decode_metadata(bytes: &[u8]) -> Result<BTreeMap<String, Value>, MetadataError> {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        // Latin-1: every byte maps to the code point of the same value.
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    };

    let tokens = tokenize(&text).map_err(MetadataError::Parse)?;
    let terms = parse_terms(&tokens).map_err(|_| MetadataError::InvalidTerms)?;

    let mut metadata = BTreeMap::new();
    for term in terms {
        let Value::Tuple(pair) = term else {
            return Err(MetadataError::NotKeyValue);
        };
        let [key, value]: [Value; 2] =
            pair.try_into().map_err(|_| MetadataError::NotKeyValue)?;
        let key = match key {
            Value::Binary(s) | Value::Atom(s) => s,
            _ => return Err(MetadataError::NotKeyValue),
        };
        metadata.insert(key, value);
    }
    Ok(metadata)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    Comma,
    Dot,
    Binary(String),
    Atom(String),
    Int(i64),
    Float(f64),
    Str(String),
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '%' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '{' => {
                tokens.push(Token::OpenBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::CloseBrace);
                i += 1;
            }
            '[' => {
                tokens.push(Token::OpenBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::CloseBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '<' => {
                let (token, next) = scan_binary(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            '"' => {
                let (s, next) = scan_string(&chars, i + 1, '"')?;
                tokens.push(Token::Str(s));
                i = next;
            }
            '\'' => {
                let (s, next) = scan_string(&chars, i + 1, '\'')?;
                tokens.push(Token::Atom(s));
                i = next;
            }
            '-' => {
                if chars.get(i + 1).is_some_and(char::is_ascii_digit) {
                    let (token, next) = scan_number(&chars, i)?;
                    tokens.push(token);
                    i = next;
                } else {
                    return Err("unexpected '-'".to_string());
                }
            }
            c if c.is_ascii_digit() => {
                let (token, next) = scan_number(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            c if c.is_ascii_lowercase() => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '@')
                {
                    i += 1;
                }
                tokens.push(Token::Atom(chars[start..i].iter().collect()));
            }
            // No production exists for calls, funs, maps, records or
            // character literals; their lead-in characters are rejected.
            other => return Err(format!("unexpected character {other:?}")),
        }
    }

    Ok(tokens)
}

/// Scan a binary literal: `<<>>`, `<<"seg", "seg"/utf8>>` or byte values
/// such as `<<104,105>>`. Segments concatenate.
fn scan_binary(chars: &[char], start: usize) -> Result<(Token, usize), String> {
    let mut i = start;
    if chars.get(i) != Some(&'<') || chars.get(i + 1) != Some(&'<') {
        return Err("unexpected '<'".to_string());
    }
    i += 2;

    let mut contents = String::new();
    loop {
        i = skip_ws(chars, i);
        match chars.get(i) {
            Some('>') if chars.get(i + 1) == Some(&'>') => return Ok((Token::Binary(contents), i + 2)),
            Some('"') => {
                let (s, next) = scan_string(chars, i + 1, '"')?;
                contents.push_str(&s);
                i = next;
            }
            Some(c) if c.is_ascii_digit() => {
                let digit_start = i;
                while chars.get(i).is_some_and(char::is_ascii_digit) {
                    i += 1;
                }
                let digits: String = chars[digit_start..i].iter().collect();
                let byte: u8 = digits
                    .parse()
                    .map_err(|_| format!("invalid byte value {digits} in binary"))?;
                contents.push(char::from(byte));
            }
            _ => return Err("unterminated binary".to_string()),
        }

        // Optional type suffix such as /utf8; ignored.
        i = skip_ws(chars, i);
        if chars.get(i) == Some(&'/') {
            i += 1;
            while chars
                .get(i)
                .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '-')
            {
                i += 1;
            }
        }

        i = skip_ws(chars, i);
        match chars.get(i) {
            Some(',') => i += 1,
            Some('>') if chars.get(i + 1) == Some(&'>') => return Ok((Token::Binary(contents), i + 2)),
            _ => return Err("unterminated binary".to_string()),
        }
    }
}

fn skip_ws(chars: &[char], mut i: usize) -> usize {
    while chars.get(i).is_some_and(|c| c.is_whitespace()) {
        i += 1;
    }
    i
}

/// Scan a quoted string or atom starting after the opening quote.
fn scan_string(chars: &[char], start: usize, quote: char) -> Result<(String, usize), String> {
    let mut out = String::new();
    let mut i = start;

    while let Some(&c) = chars.get(i) {
        if c == quote {
            return Ok((out, i + 1));
        }
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }

        i += 1;
        let Some(&escaped) = chars.get(i) else {
            break;
        };
        i += 1;
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'f' => out.push('\u{c}'),
            'b' => out.push('\u{8}'),
            'e' => out.push('\u{1b}'),
            'v' => out.push('\u{b}'),
            's' => out.push(' '),
            'x' => {
                let mut hex = String::new();
                while hex.len() < 2 && chars.get(i).is_some_and(char::is_ascii_hexdigit) {
                    hex.push(chars[i]);
                    i += 1;
                }
                let byte =
                    u8::from_str_radix(&hex, 16).map_err(|_| "invalid \\x escape".to_string())?;
                out.push(char::from(byte));
            }
            '0'..='7' => {
                let mut octal = String::from(escaped);
                while octal.len() < 3 && chars.get(i).is_some_and(|c| ('0'..='7').contains(c)) {
                    octal.push(chars[i]);
                    i += 1;
                }
                let byte =
                    u8::from_str_radix(&octal, 8).map_err(|_| "invalid octal escape".to_string())?;
                out.push(char::from(byte));
            }
            other => out.push(other),
        }
    }

    Err("unterminated string".to_string())
}

fn scan_number(chars: &[char], start: usize) -> Result<(Token, usize), String> {
    let mut i = start;
    if chars.get(i) == Some(&'-') {
        i += 1;
    }
    while chars.get(i).is_some_and(char::is_ascii_digit) {
        i += 1;
    }

    if chars.get(i) == Some(&'#') {
        return Err("base notation is not allowed".to_string());
    }

    let mut is_float = false;
    if chars.get(i) == Some(&'.') && chars.get(i + 1).is_some_and(char::is_ascii_digit) {
        is_float = true;
        i += 1;
        while chars.get(i).is_some_and(char::is_ascii_digit) {
            i += 1;
        }
    }
    if matches!(chars.get(i), Some('e') | Some('E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+') | Some('-')) {
            j += 1;
        }
        if chars.get(j).is_some_and(char::is_ascii_digit) {
            is_float = true;
            i = j;
            while chars.get(i).is_some_and(char::is_ascii_digit) {
                i += 1;
            }
        }
    }

    let literal: String = chars[start..i].iter().collect();
    if is_float {
        let value: f64 = literal
            .parse()
            .map_err(|_| format!("invalid float {literal}"))?;
        Ok((Token::Float(value), i))
    } else {
        let value: i64 = literal
            .parse()
            .map_err(|_| format!("invalid integer {literal}"))?;
        Ok((Token::Int(value), i))
    }
}

fn parse_terms(tokens: &[Token]) -> Result<Vec<Value>, String> {
    let mut terms = Vec::new();
    let mut pos = 0;

    while pos < tokens.len() {
        let (value, next) = parse_value(tokens, pos)?;
        match tokens.get(next) {
            Some(Token::Dot) => {
                terms.push(value);
                pos = next + 1;
            }
            _ => return Err("expected '.' after term".to_string()),
        }
    }

    Ok(terms)
}

fn parse_value(tokens: &[Token], pos: usize) -> Result<(Value, usize), String> {
    match tokens.get(pos) {
        Some(Token::OpenBrace) => {
            let (items, next) = parse_seq(tokens, pos + 1, &Token::CloseBrace)?;
            Ok((Value::Tuple(items), next))
        }
        Some(Token::OpenBracket) => {
            let (items, next) = parse_seq(tokens, pos + 1, &Token::CloseBracket)?;
            Ok((Value::List(items), next))
        }
        Some(Token::Binary(s)) => Ok((Value::Binary(s.clone()), pos + 1)),
        // Plain strings carry the same textual payload as binaries.
        Some(Token::Str(s)) => Ok((Value::Binary(s.clone()), pos + 1)),
        Some(Token::Atom(s)) => Ok((Value::Atom(s.clone()), pos + 1)),
        Some(Token::Int(i)) => Ok((Value::Int(*i), pos + 1)),
        Some(Token::Float(f)) => Ok((Value::Float(*f), pos + 1)),
        _ => Err("expected a term".to_string()),
    }
}

fn parse_seq(
    tokens: &[Token],
    mut pos: usize,
    close: &Token,
) -> Result<(Vec<Value>, usize), String> {
    let mut items = Vec::new();
    if tokens.get(pos) == Some(close) {
        return Ok((items, pos + 1));
    }

    loop {
        let (value, next) = parse_value(tokens, pos)?;
        items.push(value);
        pos = next;
        match tokens.get(pos) {
            Some(Token::Comma) => pos += 1,
            Some(t) if t == close => return Ok((items, pos + 1)),
            _ => return Err("expected ',' or a closing delimiter".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn encode_renders_one_pair_per_line() {
        let metadata = meta(&[
            ("app", Value::binary("ecto")),
            ("version", Value::binary("1.0.0")),
        ]);
        assert_eq!(
            encode_metadata(&metadata),
            "{<<\"app\">>,<<\"ecto\">>}.\n{<<\"version\">>,<<\"1.0.0\">>}.\n"
        );
    }

    #[test]
    fn encode_binarifies_atoms_except_reserved() {
        let metadata = meta(&[
            ("flag", Value::Atom("true".to_string())),
            ("missing", Value::Atom("undefined".to_string())),
            ("other", Value::Atom("ecto".to_string())),
        ]);
        let encoded = encode_metadata(&metadata);
        assert!(encoded.contains("{<<\"flag\">>,true}."));
        assert!(encoded.contains("{<<\"missing\">>,undefined}."));
        assert!(encoded.contains("{<<\"other\">>,<<\"ecto\">>}."));
    }

    #[test]
    fn encode_turns_maps_into_sorted_pair_lists() {
        let mut links = BTreeMap::new();
        links.insert("github".to_string(), Value::binary("https://github.com/x"));
        links.insert("docs".to_string(), Value::binary("https://hexdocs.pm/x"));
        let metadata = meta(&[("links", Value::Map(links))]);

        assert_eq!(
            encode_metadata(&metadata),
            "{<<\"links\">>,[{<<\"docs\">>,<<\"https://hexdocs.pm/x\">>},\
             {<<\"github\">>,<<\"https://github.com/x\">>}]}.\n"
        );
    }

    #[test]
    fn decode_roundtrips_encoded_metadata() {
        let metadata = meta(&[
            ("app", Value::binary("ecto")),
            ("count", Value::Int(3)),
            ("ratio", Value::Float(0.5)),
            (
                "files",
                Value::List(vec![Value::binary("mix.exs"), Value::binary("src/a.erl")]),
            ),
        ]);
        let decoded = decode_metadata(encode_metadata(&metadata).as_bytes()).unwrap();
        assert_eq!(decoded, metadata);
    }

    #[test]
    fn decode_handles_escapes_and_quoted_atoms() {
        let decoded =
            decode_metadata(b"{<<\"desc\">>,<<\"line\\nbreak \\\"quoted\\\"\">>}.\n{'Key',ok}.")
                .unwrap();
        assert_eq!(
            decoded.get("desc"),
            Some(&Value::binary("line\nbreak \"quoted\""))
        );
        assert_eq!(decoded.get("Key"), Some(&Value::Atom("ok".to_string())));
    }

    #[test]
    fn decode_concatenates_binary_segments() {
        let decoded = decode_metadata(b"{<<\"name\">>,<<\"ec\",\"to\"/utf8>>}.").unwrap();
        assert_eq!(decoded.get("name"), Some(&Value::binary("ecto")));
        let decoded = decode_metadata(b"{<<\"raw\">>,<<104,105>>}.").unwrap();
        assert_eq!(decoded.get("raw"), Some(&Value::binary("hi")));
    }

    #[test]
    fn decode_falls_back_to_latin1() {
        let mut bytes = b"{<<\"name\">>,<<\"caf".to_vec();
        bytes.push(0xe9); // é in Latin-1, invalid UTF-8 on its own
        bytes.extend_from_slice(b"\">>}.");
        let decoded = decode_metadata(&bytes).unwrap();
        assert_eq!(decoded.get("name"), Some(&Value::binary("caf\u{e9}")));
    }

    #[test]
    fn decode_refuses_call_syntax() {
        let err = decode_metadata(b"{<<\"name\">>,erlang:halt()}.").unwrap_err();
        assert!(matches!(err, MetadataError::Parse(_)));

        let err = decode_metadata(b"{<<\"name\">>,fun() -> ok end}.").unwrap_err();
        assert!(matches!(err, MetadataError::Parse(_)));
    }

    #[test]
    fn decode_refuses_maps_and_char_literals() {
        assert!(matches!(
            decode_metadata(b"{<<\"k\">>,#{a => 1}}.").unwrap_err(),
            MetadataError::Parse(_)
        ));
        assert!(matches!(
            decode_metadata(b"{<<\"k\">>,$a}.").unwrap_err(),
            MetadataError::Parse(_)
        ));
    }

    #[test]
    fn decode_reports_invalid_terms() {
        let err = decode_metadata(b"{<<\"name\">>,}.").unwrap_err();
        assert_eq!(err, MetadataError::InvalidTerms);

        let err = decode_metadata(b"{<<\"name\">>,<<\"x\">>}").unwrap_err();
        assert_eq!(err, MetadataError::InvalidTerms);
    }

    #[test]
    fn decode_reports_not_key_value() {
        let err = decode_metadata(b"[<<\"name\">>].").unwrap_err();
        assert_eq!(err, MetadataError::NotKeyValue);

        let err = decode_metadata(b"{<<\"a\">>,<<\"b\">>,<<\"c\">>}.").unwrap_err();
        assert_eq!(err, MetadataError::NotKeyValue);

        let err = decode_metadata(b"{1,<<\"b\">>}.").unwrap_err();
        assert_eq!(err, MetadataError::NotKeyValue);
    }

    #[test]
    fn decode_skips_comments() {
        let decoded =
            decode_metadata(b"% generated file\n{<<\"app\">>,<<\"ecto\">>}. % trailing\n").unwrap();
        assert_eq!(decoded.get("app"), Some(&Value::binary("ecto")));
    }

    #[test]
    fn negative_numbers_parse() {
        let decoded = decode_metadata(b"{<<\"a\">>,-12}.\n{<<\"b\">>,-1.5}.").unwrap();
        assert_eq!(decoded.get("a"), Some(&Value::Int(-12)));
        assert_eq!(decoded.get("b"), Some(&Value::Float(-1.5)));
    }
}
