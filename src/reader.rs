// ABOUTME: Lexer and recursive parser turning source text into heap-allocated datums

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, multispace1, one_of},
    combinator::{opt, value},
    multi::many0,
    IResult, Parser,
};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

use crate::heap::Heap;
use crate::symbol::SymbolTable;
use crate::value::Value;

/// 1-based line and column in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadErrorKind {
    #[error("unclosed list")]
    UnclosedList,
    #[error("unexpected `)`")]
    UnexpectedRightParen,
    #[error("misplaced `.`")]
    MalformedDot,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid number literal")]
    InvalidNumber,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} at {position}")]
pub struct ReadError {
    pub kind: ReadErrorKind,
    pub position: Position,
}

impl ReadError {
    fn new(kind: ReadErrorKind, position: Position) -> Self {
        ReadError { kind, position }
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Dot,
    Quote,
    Bool(bool),
    Number(f64),
    Str(String),
    Ident(String),
}

/// Characters that end an atom. A token must run up against one of these
/// (or end of input) to be complete.
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '\'' | '"' | ';')
}

fn starts_delimiter(input: &str) -> bool {
    input.chars().next().is_none_or(is_delimiter)
}

/// Skip a `;` comment through end of line.
fn comment(input: &str) -> IResult<&str, ()> {
    let (input, _) = char(';')(input)?;
    let (input, _) = take_while(|c| c != '\n')(input)?;
    Ok((input, ()))
}

/// Skip whitespace and comments.
fn skip_atmosphere(input: &str) -> &str {
    let result: IResult<&str, ()> =
        value((), many0(alt((value((), multispace1), comment)))).parse(input);
    match result {
        Ok((rest, ())) => rest,
        Err(_) => input,
    }
}

/// Line/column of the first unconsumed character.
fn position_of(source: &str, rest: &str) -> Position {
    let consumed = &source[..source.len() - rest.len()];
    let line = consumed.matches('\n').count() as u32 + 1;
    let column = match consumed.rfind('\n') {
        Some(newline) => consumed[newline + 1..].chars().count() as u32 + 1,
        None => consumed.chars().count() as u32 + 1,
    };
    Position { line, column }
}

fn lex_bool(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Bool(true), tag("#t")),
        value(Token::Bool(false), tag("#f")),
    ))
    .parse(input)
}

/// Optional sign, digits, optional fraction, optional decimal exponent.
/// No radix prefixes. The literal must run up against a delimiter, so
/// `12abc` and `1.2.3` are rejected rather than split.
fn lex_number(input: &str, position: Position) -> Result<(&str, Token), ReadError> {
    // `nom::combinator::recognize` mis-tracks the consumed span when the wrapped
    // tuple contains a `digit0`-style parser in this nom version, so the matched
    // text is computed directly from the tuple's own (correct) remainder instead.
    let parsed: IResult<&str, _> = (
        opt(one_of("+-")),
        digit1,
        opt((char('.'), digit0)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    )
        .parse(input);

    match parsed {
        Ok((rest, _)) if starts_delimiter(rest) => {
            let text = &input[..input.len() - rest.len()];
            match text.parse::<f64>() {
                Ok(number) => Ok((rest, Token::Number(number))),
                Err(_) => Err(ReadError::new(ReadErrorKind::InvalidNumber, position)),
            }
        }
        _ => Err(ReadError::new(ReadErrorKind::InvalidNumber, position)),
    }
}

/// A number starts with a digit, or a sign immediately followed by a digit
/// (so bare `+` and `-` stay identifiers).
fn starts_number(input: &str) -> bool {
    let mut chars = input.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+') | Some('-') => matches!(chars.next(), Some(c) if c.is_ascii_digit()),
        _ => false,
    }
}

/// Double-quoted string with `\\` and `\"` escapes; any other backslash pair
/// passes through untouched.
fn lex_string(input: &str, position: Position) -> Result<(&str, Token), ReadError> {
    let mut out = String::new();
    let mut chars = input.char_indices();
    chars.next(); // opening quote

    while let Some((index, c)) = chars.next() {
        match c {
            '"' => return Ok((&input[index + 1..], Token::Str(out))),
            '\\' => match chars.next() {
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            other => out.push(other),
        }
    }
    Err(ReadError::new(ReadErrorKind::UnterminatedString, position))
}

fn lex_token(input: &str, position: Position) -> Result<(&str, Token), ReadError> {
    if let Some(rest) = input.strip_prefix('(') {
        return Ok((rest, Token::LParen));
    }
    if let Some(rest) = input.strip_prefix(')') {
        return Ok((rest, Token::RParen));
    }
    if let Some(rest) = input.strip_prefix('\'') {
        return Ok((rest, Token::Quote));
    }
    if input.starts_with('"') {
        return lex_string(input, position);
    }
    if let Ok((rest, token)) = lex_bool(input) {
        if starts_delimiter(rest) {
            return Ok((rest, token));
        }
    }
    if let Some(rest) = input.strip_prefix('.') {
        // A lone dot is the dotted-pair marker; `.` may still begin an
        // identifier such as `...`.
        if starts_delimiter(rest) {
            return Ok((rest, Token::Dot));
        }
    }
    if starts_number(input) {
        return lex_number(input, position);
    }

    let parsed: IResult<&str, &str> = take_while1(|c: char| !is_delimiter(c)).parse(input);
    match parsed {
        Ok((rest, text)) => Ok((rest, Token::Ident(text.to_string()))),
        // Unreachable for non-empty input, but the lexer stays total.
        Err(_) => Err(ReadError::new(ReadErrorKind::InvalidNumber, position)),
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, Position)>, ReadError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    loop {
        rest = skip_atmosphere(rest);
        if rest.is_empty() {
            break;
        }
        let position = position_of(source, rest);
        let (next, token) = lex_token(rest, position)?;
        tokens.push((token, position));
        rest = next;
    }
    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

struct Cursor<'t> {
    tokens: &'t [(Token, Position)],
    index: usize,
    end: Position,
}

impl Cursor<'_> {
    fn next(&mut self) -> Option<(Token, Position)> {
        let entry = self.tokens.get(self.index).cloned();
        if entry.is_some() {
            self.index += 1;
        }
        entry
    }

    fn peek(&self) -> Option<&(Token, Position)> {
        self.tokens.get(self.index)
    }

    fn at_end(&self) -> bool {
        self.index >= self.tokens.len()
    }
}

/// Turns source text into datums. Pairs go on the same heap the evaluator
/// allocates from and symbols into the same intern table, so read output is
/// indistinguishable from runtime data.
pub struct Reader<'a> {
    heap: &'a mut Heap,
    symbols: &'a mut SymbolTable,
}

impl<'a> Reader<'a> {
    pub fn new(heap: &'a mut Heap, symbols: &'a mut SymbolTable) -> Self {
        Reader { heap, symbols }
    }

    /// Read every top-level datum in `source`.
    pub fn read_all(&mut self, source: &str) -> Result<Vec<Value>, ReadError> {
        let tokens = tokenize(source)?;
        let mut cursor = Cursor {
            tokens: &tokens,
            index: 0,
            end: position_of(source, ""),
        };
        let mut datums = Vec::new();
        while !cursor.at_end() {
            datums.push(self.read_datum(&mut cursor)?);
        }
        Ok(datums)
    }

    fn read_datum(&mut self, cursor: &mut Cursor) -> Result<Value, ReadError> {
        let (token, position) = match cursor.next() {
            Some(entry) => entry,
            None => return Err(ReadError::new(ReadErrorKind::UnclosedList, cursor.end)),
        };
        match token {
            Token::Number(n) => Ok(Value::Number(n)),
            Token::Bool(b) => Ok(Value::Bool(b)),
            Token::Str(s) => Ok(Value::Str(Rc::from(s.as_str()))),
            Token::Ident(name) => Ok(Value::Symbol(self.symbols.intern(&name))),
            Token::Quote => {
                // 'X reads as the two-pair list (quote X).
                let quoted = self.read_datum(cursor)?;
                let quote = Value::Symbol(self.symbols.intern("quote"));
                let inner = self.heap.alloc_pair(quoted, Value::Nil);
                let outer = self.heap.alloc_pair(quote, Value::Pair(inner));
                Ok(Value::Pair(outer))
            }
            Token::LParen => self.read_list(cursor, position),
            Token::RParen => Err(ReadError::new(
                ReadErrorKind::UnexpectedRightParen,
                position,
            )),
            Token::Dot => Err(ReadError::new(ReadErrorKind::MalformedDot, position)),
        }
    }

    /// Elements up to `)` build a proper list; a dot before the final element
    /// builds a dotted pair.
    fn read_list(&mut self, cursor: &mut Cursor, open: Position) -> Result<Value, ReadError> {
        let mut items = Vec::new();
        let mut tail = Value::Nil;
        loop {
            match cursor.peek() {
                None => return Err(ReadError::new(ReadErrorKind::UnclosedList, open)),
                Some((Token::RParen, _)) => {
                    cursor.next();
                    break;
                }
                Some((Token::Dot, position)) => {
                    let position = *position;
                    cursor.next();
                    if items.is_empty() {
                        return Err(ReadError::new(ReadErrorKind::MalformedDot, position));
                    }
                    if matches!(cursor.peek(), Some((Token::RParen, _))) {
                        return Err(ReadError::new(ReadErrorKind::MalformedDot, position));
                    }
                    tail = self.read_datum(cursor)?;
                    match cursor.next() {
                        Some((Token::RParen, _)) => break,
                        Some((_, trailing)) => {
                            return Err(ReadError::new(ReadErrorKind::MalformedDot, trailing));
                        }
                        None => return Err(ReadError::new(ReadErrorKind::UnclosedList, open)),
                    }
                }
                Some(_) => items.push(self.read_datum(cursor)?),
            }
        }

        let mut result = tail;
        for item in items.into_iter().rev() {
            result = Value::Pair(self.heap.alloc_pair(item, result));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one(src: &str) -> (Heap, SymbolTable, Value) {
        let mut heap = Heap::new();
        let mut symbols = SymbolTable::new();
        let datums = Reader::new(&mut heap, &mut symbols)
            .read_all(src)
            .expect("read should succeed");
        assert_eq!(datums.len(), 1, "expected a single datum in {src:?}");
        let datum = datums.into_iter().next().expect("one datum");
        (heap, symbols, datum)
    }

    fn read_err(src: &str) -> ReadError {
        let mut heap = Heap::new();
        let mut symbols = SymbolTable::new();
        Reader::new(&mut heap, &mut symbols)
            .read_all(src)
            .expect_err("read should fail")
    }

    /// Collect a proper list into a Vec for structural assertions.
    fn elements(heap: &Heap, value: &Value) -> Vec<Value> {
        let mut items = Vec::new();
        let mut rest = value.clone();
        loop {
            match rest {
                Value::Nil => return items,
                Value::Pair(h) => {
                    let cell = heap.pair(h);
                    items.push(cell.first.clone());
                    rest = cell.rest.clone();
                }
                other => panic!("improper list tail: {other:?}"),
            }
        }
    }

    #[test]
    fn test_read_numbers() {
        assert!(matches!(read_one("42").2, Value::Number(n) if n == 42.0));
        assert!(matches!(read_one("-42").2, Value::Number(n) if n == -42.0));
        assert!(matches!(read_one("+7").2, Value::Number(n) if n == 7.0));
        assert!(matches!(read_one("2.5").2, Value::Number(n) if (n - 2.5).abs() < 1e-9));
        assert!(matches!(read_one("42.").2, Value::Number(n) if n == 42.0));
        assert!(matches!(read_one("1e3").2, Value::Number(n) if n == 1000.0));
        assert!(matches!(read_one("1.5e-2").2, Value::Number(n) if (n - 0.015).abs() < 1e-12));
    }

    #[test]
    fn test_read_bools() {
        assert!(matches!(read_one("#t").2, Value::Bool(true)));
        assert!(matches!(read_one("#f").2, Value::Bool(false)));
    }

    #[test]
    fn test_read_symbols() {
        for name in ["x", "foo-bar", "set-car!", "pair?", "+", "-", "<", ">=", "a.b:c"] {
            let (_, symbols, datum) = read_one(name);
            match datum {
                Value::Symbol(id) => assert_eq!(symbols.name(id), name),
                other => panic!("expected symbol, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_symbols_are_interned() {
        let (heap, _, datum) = read_one("(foo foo)");
        let items = elements(&heap, &datum);
        match (&items[0], &items[1]) {
            (Value::Symbol(a), Value::Symbol(b)) => assert_eq!(a, b),
            _ => panic!("expected symbols"),
        }
    }

    #[test]
    fn test_read_strings() {
        assert!(matches!(read_one(r#""hello""#).2, Value::Str(s) if &*s == "hello"));
        assert!(matches!(read_one(r#""""#).2, Value::Str(s) if s.is_empty()));
        assert!(matches!(read_one(r#""say \"hi\"""#).2, Value::Str(s) if &*s == r#"say "hi""#));
        assert!(matches!(read_one(r#""back\\slash""#).2, Value::Str(s) if &*s == r"back\slash"));
    }

    #[test]
    fn test_read_empty_list() {
        assert!(matches!(read_one("()").2, Value::Nil));
        assert!(matches!(read_one("(  )").2, Value::Nil));
    }

    #[test]
    fn test_read_proper_list() {
        let (heap, _, datum) = read_one("(1 2 3)");
        let items = elements(&heap, &datum);
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], Value::Number(n) if n == 1.0));
        assert!(matches!(items[2], Value::Number(n) if n == 3.0));
    }

    #[test]
    fn test_read_nested_list() {
        let (heap, _, datum) = read_one("(1 (2 3) 4)");
        let items = elements(&heap, &datum);
        assert_eq!(items.len(), 3);
        let inner = elements(&heap, &items[1]);
        assert_eq!(inner.len(), 2);
    }

    #[test]
    fn test_read_dotted_pair() {
        let (heap, _, datum) = read_one("(1 . 2)");
        match datum {
            Value::Pair(h) => {
                let cell = heap.pair(h);
                assert!(matches!(cell.first, Value::Number(n) if n == 1.0));
                assert!(matches!(cell.rest, Value::Number(n) if n == 2.0));
            }
            other => panic!("expected pair, got {other:?}"),
        }
    }

    #[test]
    fn test_read_dotted_tail() {
        // (a b . c) is two pairs whose final rest is the symbol c.
        let (heap, symbols, datum) = read_one("(a b . c)");
        let Value::Pair(first) = datum else {
            panic!("expected pair");
        };
        let Value::Pair(second) = heap.pair(first).rest.clone() else {
            panic!("expected second pair");
        };
        match heap.pair(second).rest.clone() {
            Value::Symbol(id) => assert_eq!(symbols.name(id), "c"),
            other => panic!("expected symbol tail, got {other:?}"),
        }
    }

    #[test]
    fn test_quote_expands_to_list() {
        let (heap, symbols, datum) = read_one("'x");
        let items = elements(&heap, &datum);
        assert_eq!(items.len(), 2);
        match (&items[0], &items[1]) {
            (Value::Symbol(q), Value::Symbol(x)) => {
                assert_eq!(symbols.name(*q), "quote");
                assert_eq!(symbols.name(*x), "x");
            }
            _ => panic!("expected (quote x)"),
        }
    }

    #[test]
    fn test_read_comments() {
        assert!(matches!(read_one("; a comment\n42").2, Value::Number(n) if n == 42.0));
        let (heap, _, datum) = read_one("(1 2 ; trailing\n 3)");
        assert_eq!(elements(&heap, &datum).len(), 3);
    }

    #[test]
    fn test_read_multiple_datums() {
        let mut heap = Heap::new();
        let mut symbols = SymbolTable::new();
        let datums = Reader::new(&mut heap, &mut symbols)
            .read_all("1 2 (3)")
            .expect("read should succeed");
        assert_eq!(datums.len(), 3);
    }

    #[test]
    fn test_read_empty_input() {
        let mut heap = Heap::new();
        let mut symbols = SymbolTable::new();
        let datums = Reader::new(&mut heap, &mut symbols)
            .read_all("  ; only a comment\n")
            .expect("read should succeed");
        assert!(datums.is_empty());
    }

    #[test]
    fn test_error_unclosed_list() {
        let err = read_err("(1 2");
        assert_eq!(err.kind, ReadErrorKind::UnclosedList);
        assert_eq!(err.position, Position { line: 1, column: 1 });
    }

    #[test]
    fn test_error_unexpected_right_paren() {
        let err = read_err(")");
        assert_eq!(err.kind, ReadErrorKind::UnexpectedRightParen);
    }

    #[test]
    fn test_error_malformed_dot() {
        assert_eq!(read_err("(. 1)").kind, ReadErrorKind::MalformedDot);
        assert_eq!(read_err("(1 . 2 3)").kind, ReadErrorKind::MalformedDot);
        assert_eq!(read_err("(1 .)").kind, ReadErrorKind::MalformedDot);
        assert_eq!(read_err(".").kind, ReadErrorKind::MalformedDot);
    }

    #[test]
    fn test_error_unterminated_string() {
        let err = read_err("\"oops");
        assert_eq!(err.kind, ReadErrorKind::UnterminatedString);
    }

    #[test]
    fn test_error_invalid_number() {
        assert_eq!(read_err("12abc").kind, ReadErrorKind::InvalidNumber);
        assert_eq!(read_err("1.2.3").kind, ReadErrorKind::InvalidNumber);
    }

    #[test]
    fn test_error_positions_track_lines() {
        let err = read_err("(a b)\n  )");
        assert_eq!(err.kind, ReadErrorKind::UnexpectedRightParen);
        assert_eq!(err.position, Position { line: 2, column: 3 });
    }
}
