use crate::core::error::{Error, Result};
use crate::filter::ast::Filter;

/// Parse a filter string into an AST.
///
/// Grammar (LDAP-style, single-byte charset):
///
/// ```text
/// filter := "(" body ")"
/// body   := "&" filter+ | "|" filter+ | "!" filter | item
/// item   := key "=" ( "*" | value )
/// key    := [A-Za-z0-9_.:/-]+
/// value  := ( "\" escapable | non-paren-char )*   -- trailing whitespace trimmed
/// ```
///
/// Only `\ * ( )` may be escaped. A value consisting of a single unescaped
/// `*` is a presence test; `\*` (and `*` mixed with other characters) is a
/// literal star. Whitespace is tolerated between structural tokens. Every
/// rejection carries the byte offset of the offending input.
pub fn parse(input: &str) -> Result<Filter> {
    let mut parser = Parser {
        bytes: input.as_bytes(),
        pos: 0,
    };
    let filter = parser.parse_filter()?;
    parser.skip_ws();
    if parser.pos < parser.bytes.len() {
        return Err(Error::invalid_filter(
            parser.pos,
            "unexpected trailing characters after filter",
        ));
    }
    Ok(filter)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':' | b'/' | b'-')
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(Error::invalid_filter(
                self.pos,
                format!("expected '{}'", byte as char),
            ))
        }
    }

    fn parse_filter(&mut self) -> Result<Filter> {
        self.skip_ws();
        self.expect(b'(')?;
        self.skip_ws();
        let node = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                Filter::And(self.parse_children()?)
            }
            Some(b'|') => {
                self.pos += 1;
                Filter::Or(self.parse_children()?)
            }
            Some(b'!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.parse_filter()?))
            }
            _ => self.parse_item()?,
        };
        self.skip_ws();
        self.expect(b')')?;
        Ok(node)
    }

    /// One or more nested filters after `&` or `|`
    fn parse_children(&mut self) -> Result<Vec<Filter>> {
        let mut children = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'(') {
                children.push(self.parse_filter()?);
            } else {
                break;
            }
        }
        if children.is_empty() {
            return Err(Error::invalid_filter(
                self.pos,
                "expected at least one nested filter",
            ));
        }
        Ok(children)
    }

    fn parse_item(&mut self) -> Result<Filter> {
        let key_pos = self.pos;
        let key_start = self.pos;
        while matches!(self.peek(), Some(b) if is_key_byte(b)) {
            self.pos += 1;
        }
        if self.pos == key_start {
            return Err(Error::invalid_filter(self.pos, "expected key"));
        }
        let key = std::str::from_utf8(&self.bytes[key_start..self.pos])
            .map_err(|_| Error::invalid_filter(key_start, "key is not valid UTF-8"))?
            .to_string();

        self.expect(b'=')?;
        let value_pos = self.pos;
        let (value, escaped) = self.parse_value()?;
        if value == "*" && !escaped {
            Ok(Filter::Present { key, key_pos })
        } else {
            Ok(Filter::Eq {
                key,
                key_pos,
                value,
                value_pos,
            })
        }
    }

    /// Unescaped value text, plus whether any escape occurred
    fn parse_value(&mut self) -> Result<(String, bool)> {
        let mut value = Vec::new();
        let mut escaped = false;
        loop {
            match self.peek() {
                None => {
                    return Err(Error::invalid_filter(self.pos, "unexpected end of input"));
                }
                Some(b')') => break,
                Some(b'(') => {
                    return Err(Error::invalid_filter(self.pos, "unescaped '(' in value"));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b @ (b'\\' | b'*' | b'(' | b')')) => {
                            value.push(b);
                            escaped = true;
                            self.pos += 1;
                        }
                        Some(_) => {
                            return Err(Error::invalid_filter(self.pos, "invalid escape"));
                        }
                        None => {
                            return Err(Error::invalid_filter(
                                self.pos,
                                "unexpected end of input after '\\'",
                            ));
                        }
                    }
                }
                Some(b) => {
                    value.push(b);
                    self.pos += 1;
                }
            }
        }
        // Escapes cover only \ * ( ), so trailing whitespace is always literal
        while matches!(value.last(), Some(b) if b.is_ascii_whitespace()) {
            value.pop();
        }
        let value = String::from_utf8(value)
            .map_err(|_| Error::invalid_filter(self.pos, "value is not valid UTF-8"))?;
        Ok((value, escaped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn eq(key: &str, value: &str) -> Filter {
        match parse(&format!("({}={})", key, value)).unwrap() {
            f @ Filter::Eq { .. } => f,
            other => panic!("expected eq, got {:?}", other),
        }
    }

    fn parse_err(input: &str) -> Error {
        let err = parse(input).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidFilter);
        err
    }

    #[test]
    fn parses_equality() {
        let f = parse("(type=skill)").unwrap();
        assert_eq!(
            f,
            Filter::Eq {
                key: "type".into(),
                key_pos: 1,
                value: "skill".into(),
                value_pos: 6,
            }
        );
    }

    #[test]
    fn parses_presence() {
        assert_eq!(
            parse("(endpoint=*)").unwrap(),
            Filter::Present {
                key: "endpoint".into(),
                key_pos: 1,
            }
        );
    }

    #[test]
    fn escaped_star_is_literal() {
        match eq("k", "\\*") {
            Filter::Eq { value, .. } => assert_eq!(value, "*"),
            _ => unreachable!(),
        }
        // A star mixed with other characters is also literal
        match eq("k", "a*b") {
            Filter::Eq { value, .. } => assert_eq!(value, "a*b"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn unescapes_all_four() {
        match eq("k", "a\\\\b\\(c\\)d\\*e") {
            Filter::Eq { value, .. } => assert_eq!(value, "a\\b(c)d*e"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn parses_nested_boolean_structure() {
        let f = parse("(&(type=skill)(|(tag=nlp)(tag=ocr))(!(status=deprecated)))").unwrap();
        match f {
            Filter::And(children) => {
                assert_eq!(children.len(), 3);
                assert!(matches!(children[1], Filter::Or(ref or) if or.len() == 2));
                assert!(matches!(children[2], Filter::Not(_)));
            }
            other => panic!("expected and, got {:?}", other),
        }
    }

    #[test]
    fn tolerates_whitespace_between_structural_tokens() {
        let f = parse("( & (type=skill) ( tag=nlp ) )").unwrap();
        match f {
            Filter::And(children) => assert_eq!(children.len(), 2),
            other => panic!("expected and, got {:?}", other),
        }
    }

    #[test]
    fn trims_trailing_value_whitespace() {
        match parse("(name=hello world  )").unwrap() {
            Filter::Eq { value, .. } => assert_eq!(value, "hello world"),
            other => panic!("expected eq, got {:?}", other),
        }
    }

    #[test]
    fn allows_empty_value() {
        match parse("(version=)").unwrap() {
            Filter::Eq { value, .. } => assert_eq!(value, ""),
            other => panic!("expected eq, got {:?}", other),
        }
    }

    #[test]
    fn key_charset_covers_ids_and_attr_paths() {
        eq("attrs.tag", "v");
        eq("id", "rag:acme:sec");
        eq("ns/sub-key_1", "v");
    }

    #[test]
    fn rev_with_text_value_still_parses() {
        // Compilation against the index rejects it later, not the parser
        let f = parse("(rev=abc)").unwrap();
        assert!(matches!(f, Filter::Eq { .. }));
    }

    #[test]
    fn rejects_unescaped_paren_in_value() {
        let err = parse_err("(name=a(b)");
        assert_eq!(err.position, Some(7));
    }

    #[test]
    fn rejects_empty_and_or() {
        let err = parse_err("(&)");
        assert_eq!(err.position, Some(2));
        parse_err("(|)");
    }

    #[test]
    fn rejects_trailing_characters() {
        let err = parse_err("(a=b))");
        assert_eq!(err.position, Some(5));
    }

    #[test]
    fn rejects_unknown_escape() {
        let err = parse_err("(a=b\\n)");
        assert_eq!(err.position, Some(5));
    }

    #[test]
    fn rejects_missing_key_and_missing_open() {
        parse_err("(=b)");
        parse_err("a=b");
        parse_err("");
    }

    #[test]
    fn rejects_truncated_input() {
        parse_err("(a=b");
        parse_err("(a=b\\");
        parse_err("(&(a=b)");
    }
}
