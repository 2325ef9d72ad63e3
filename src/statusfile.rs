//! Parser for the legacy status file format
//!
//! The host processes rewrite per-component status files in the old
//! NeXT-style property list text format:
//!
//! ```text
//! {
//!     CurrentVolume = 42;
//!     PowerState = ON;
//!     Sources = (Tuner, "CD Player", 3);
//!     Nested = { Treble = 0.5; };
//! }
//! ```
//!
//! Dictionaries become JSON objects, lists become arrays, and bare tokens
//! that read as numbers become JSON numbers. Quoted strings always stay
//! strings, so a component can force `"007"` through verbatim. Parsing the
//! same text twice yields the same value, which is what lets the watcher
//! skip no-op rewrites.

use crate::error::{RelayError, Result};
use serde_json::{Map, Value};

/// Parse one status file into a JSON value
pub fn parse(input: &str) -> Result<Value> {
    let mut parser = Parser {
        input: input.as_bytes(),
        pos: 0,
    };
    parser.skip_ws()?;
    let value = parser.value()?;
    parser.skip_ws()?;
    if parser.pos != parser.input.len() {
        return Err(parser.err("trailing content after top-level value"));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn err(&self, msg: &str) -> RelayError {
        RelayError::parsing(format!("{msg} at offset {}", self.pos))
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Skip whitespace and `//` / `/* */` comments
    fn skip_ws(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'/') => match self.input.get(self.pos + 1) {
                    Some(b'/') => {
                        while let Some(b) = self.peek() {
                            self.pos += 1;
                            if b == b'\n' {
                                break;
                            }
                        }
                    }
                    Some(b'*') => {
                        self.pos += 2;
                        loop {
                            match self.bump() {
                                Some(b'*') if self.peek() == Some(b'/') => {
                                    self.pos += 1;
                                    break;
                                }
                                Some(_) => {}
                                None => return Err(self.err("unterminated comment")),
                            }
                        }
                    }
                    _ => return Ok(()),
                },
                _ => return Ok(()),
            }
        }
    }

    fn value(&mut self) -> Result<Value> {
        match self.peek() {
            Some(b'{') => self.dict(),
            Some(b'(') => self.array(),
            Some(b'"') => Ok(Value::String(self.quoted()?)),
            Some(_) => Ok(coerce(self.bareword()?)),
            None => Err(self.err("expected a value")),
        }
    }

    fn dict(&mut self) -> Result<Value> {
        self.pos += 1; // '{'
        let mut map = Map::new();
        loop {
            self.skip_ws()?;
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(_) => {
                    let key = self.key()?;
                    self.skip_ws()?;
                    if self.bump() != Some(b'=') {
                        return Err(self.err("expected '=' after key"));
                    }
                    self.skip_ws()?;
                    let value = self.value()?;
                    self.skip_ws()?;
                    if self.bump() != Some(b';') {
                        return Err(self.err("expected ';' after entry"));
                    }
                    map.insert(key, value);
                }
                None => return Err(self.err("unterminated dictionary")),
            }
        }
    }

    fn array(&mut self) -> Result<Value> {
        self.pos += 1; // '('
        let mut items = Vec::new();
        loop {
            self.skip_ws()?;
            match self.peek() {
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(_) => {
                    items.push(self.value()?);
                    self.skip_ws()?;
                    match self.peek() {
                        Some(b',') => {
                            self.pos += 1;
                        }
                        Some(b')') => {}
                        _ => return Err(self.err("expected ',' or ')' in list")),
                    }
                }
                None => return Err(self.err("unterminated list")),
            }
        }
    }

    fn key(&mut self) -> Result<String> {
        if self.peek() == Some(b'"') {
            self.quoted()
        } else {
            self.bareword()
        }
    }

    fn quoted(&mut self) -> Result<String> {
        self.pos += 1; // '"'
        let mut out = Vec::new();
        loop {
            match self.bump() {
                Some(b'"') => return Ok(String::from_utf8_lossy(&out).into_owned()),
                Some(b'\\') => match self.bump() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b) => out.push(b),
                    None => return Err(self.err("unterminated string escape")),
                },
                Some(b) => out.push(b),
                None => return Err(self.err("unterminated string")),
            }
        }
    }

    fn bareword(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || matches!(b, b'=' | b';' | b',' | b'(' | b')' | b'{' | b'}' | b'"') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.err("expected a token"));
        }
        // Status files are written by GNUstep tooling and are ASCII in
        // practice; lossy conversion keeps a mangled file from wedging the
        // whole directory scan.
        Ok(String::from_utf8_lossy(&self.input[start..self.pos]).into_owned())
    }
}

/// Bare tokens that read as numbers become JSON numbers
fn coerce(token: String) -> Value {
    if let Ok(n) = token.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = token.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_flat_dictionary() {
        let value = parse("{ CurrentVolume = 42; PowerState = ON; }").unwrap();
        assert_eq!(value, json!({"CurrentVolume": 42, "PowerState": "ON"}));
    }

    #[test]
    fn parses_nested_structures() {
        let text = r#"
        {
            Name = "Living Room Amp";
            Levels = { Bass = -2; Treble = 0.5; };
            Sources = (Tuner, "CD Player", 3);
        }
        "#;
        let value = parse(text).unwrap();
        assert_eq!(
            value,
            json!({
                "Name": "Living Room Amp",
                "Levels": {"Bass": -2, "Treble": 0.5},
                "Sources": ["Tuner", "CD Player", 3],
            })
        );
    }

    #[test]
    fn quoted_numbers_stay_strings() {
        let value = parse(r#"{ Preset = "007"; }"#).unwrap();
        assert_eq!(value, json!({"Preset": "007"}));
    }

    #[test]
    fn empty_collections() {
        assert_eq!(parse("{}").unwrap(), json!({}));
        assert_eq!(parse("()").unwrap(), json!([]));
    }

    #[test]
    fn comments_are_skipped() {
        let text = "{ /* written by sms */ Volume = 10; // last\n }";
        assert_eq!(parse(text).unwrap(), json!({"Volume": 10}));
    }

    #[test]
    fn string_escapes() {
        let value = parse(r#"{ Label = "line\none \"two\""; }"#).unwrap();
        assert_eq!(value, json!({"Label": "line\none \"two\""}));
    }

    #[test]
    fn reparse_is_identical() {
        let text = r#"{ A = 1; B = (x, 2.5); C = { D = off; }; }"#;
        assert_eq!(parse(text).unwrap(), parse(text).unwrap());
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("{ Volume = 10 }").is_err()); // missing ';'
        assert!(parse("{ Volume = ; }").is_err());
        assert!(parse(r#"{ Label = "open; }"#).is_err());
        assert!(parse("{} trailing").is_err());
        assert!(parse("( 1, 2").is_err());
    }
}
