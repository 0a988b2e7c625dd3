use super::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

pub fn parse(text: &str) -> Result<Value, ParseError> {
    let mut p = Parser::new(text);
    p.skip_trivia()?;
    let value = p.value()?;
    p.skip_trivia()?;
    if p.peek().is_some() {
        return Err(p.error("unexpected content after root value"));
    }
    Ok(value)
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

fn is_unquoted_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '+' | '/' | ':' | '.' | '-' | '<' | '>')
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut it = self.text[self.pos..].chars();
        it.next();
        it.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn expect(&mut self, want: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(c) if c == want => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected `{want}`, found `{c}`"))),
            None => Err(self.error(format!("expected `{want}`, found end of input"))),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        if c == '*' && self.peek() == Some('/') {
                            self.bump();
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(ParseError {
                            line,
                            column,
                            message: "unterminated comment".to_string(),
                        });
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn value(&mut self) -> Result<Value, ParseError> {
        match self.peek() {
            Some('{') => self.dict(),
            Some('(') => self.array(),
            Some(_) => self.string().map(Value::String),
            None => Err(self.error("expected a value, found end of input")),
        }
    }

    fn dict(&mut self) -> Result<Value, ParseError> {
        self.expect('{')?;
        let mut map = BTreeMap::new();
        loop {
            self.skip_trivia()?;
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Dict(map));
            }
            let key = self.string()?;
            self.skip_trivia()?;
            self.expect('=')?;
            self.skip_trivia()?;
            let value = self.value()?;
            self.skip_trivia()?;
            self.expect(';')?;
            map.insert(key, value);
        }
    }

    fn array(&mut self) -> Result<Value, ParseError> {
        self.expect('(')?;
        let mut items = vec![];
        loop {
            self.skip_trivia()?;
            if self.peek() == Some(')') {
                self.bump();
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_trivia()?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') => {}
                Some(c) => return Err(self.error(format!("expected `,` or `)`, found `{c}`"))),
                None => return Err(self.error("unterminated array")),
            }
        }
    }

    fn string(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(q @ ('"' | '\'')) => self.quoted(q),
            Some(c) if is_unquoted_char(c) => {
                let start = self.pos;
                while self.peek().is_some_and(is_unquoted_char) {
                    self.bump();
                }
                Ok(self.text[start..self.pos].to_string())
            }
            Some(c) => Err(self.error(format!("unexpected character `{c}`"))),
            None => Err(self.error("expected a string, found end of input")),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, ParseError> {
        let (line, column) = (self.line, self.column);
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(ParseError {
                        line,
                        column,
                        message: "unterminated quoted string".to_string(),
                    });
                }
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.error("dangling escape at end of input"))?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        'U' => out.push(self.unicode_escape()?),
                        other => out.push(other),
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, ParseError> {
        let mut code = 0u32;
        let mut digits = 0;
        while digits < 4 {
            match self.peek().and_then(|c| c.to_digit(16)) {
                Some(d) => {
                    code = code * 16 + d;
                    self.bump();
                    digits += 1;
                }
                None => break,
            }
        }
        if digits == 0 {
            return Err(self.error("`\\U` escape without hex digits"));
        }
        char::from_u32(code).ok_or_else(|| self.error(format!("invalid code point U+{code:04X}")))
    }
}
