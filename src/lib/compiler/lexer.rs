// Copyright (c) 2019 King's College London created by the Software Development Team
// <http://soft-dev.org/>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, or the UPL-1.0 license <http://opensource.org/licenses/UPL>
// at your option. This file may not be copied, modified, or distributed except according to those
// terms.

//! Turn class source text into tokens. Any token can be pushed back and read again: pushed back
//! tokens are turned back into characters on a pushback stack, so the character level and token
//! level views of the input always agree.

use crate::compiler::{
    error::ErrorKind,
    tokens::{Tok, Token},
};

/// Characters which always end the current word (outside of quoted strings).
const SPECIAL_CHARS: &[char] = &[
    '&', '\'', '*', '^', ']', ')', ':', ',', '=', '!', '/', '>', '-', '<', '[', '(', '%', '.', '+',
    '"', ';', '|',
];

fn is_special(c: char) -> bool {
    SPECIAL_CHARS.contains(&c)
}

/// A token pushed back onto the character stack. Once the stack shrinks to `depth` the token has
/// been reread, and the position is that after the original token.
struct Replay {
    depth: usize,
    end_line: u32,
    end_col: u32,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    /// Pushed back characters: the top of the stack is the next character to be read.
    stack: Vec<char>,
    replays: Vec<Replay>,
    line: u32,
    /// The column of the next character to be read.
    col: u32,
    /// The column at the end of the previous line, so that a newline can be pushed back. Zero if
    /// no newline can be pushed back.
    last_len: u32,
    save_line: u32,
    save_col: u32,
    debug_mode: bool,
    /// How deeply nested in `#BeginDebug` blocks we are.
    cond_count: u32,
}

impl Lexer {
    pub fn new(src: &str, debug_mode: bool) -> Self {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            stack: Vec::new(),
            replays: Vec::new(),
            line: 1,
            col: 1,
            last_len: 0,
            save_line: 1,
            save_col: 1,
            debug_mode,
            cond_count: 0,
        }
    }

    /// The line of the most recently read token.
    pub fn line(&self) -> u32 {
        self.save_line
    }

    /// The column of the most recently read token.
    pub fn col(&self) -> u32 {
        self.save_col
    }

    pub fn save_pos(&mut self) {
        self.save_line = self.line;
        self.save_col = self.col;
    }

    fn spool_char(&mut self) -> Option<char> {
        if let Some(c) = self.stack.pop() {
            return Some(c);
        }
        let c = self.chars.get(self.pos).cloned();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    /// Read the next character, normalising CR and CRLF to LF.
    pub fn next_char(&mut self) -> Option<char> {
        let mut c = self.spool_char()?;
        if c == '\r' || c == '\n' {
            if c == '\r' && self.peek_char() == Some('\n') {
                self.spool_char();
            }
            c = '\n';
            self.last_len = self.col;
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        while let Some(r) = self.replays.last() {
            if self.stack.len() > r.depth {
                break;
            }
            self.line = r.end_line;
            self.col = r.end_col;
            self.replays.pop();
        }
        Some(c)
    }

    /// Look at the next character without consuming it. Line endings are not normalised.
    pub fn peek_char(&mut self) -> Option<char> {
        if let Some(c) = self.stack.last() {
            return Some(*c);
        }
        let c = self.chars.get(self.pos).cloned()?;
        self.pos += 1;
        self.stack.push(c);
        Some(c)
    }

    /// Push `c` back so it will be the next character read. Only one newline can be pushed back
    /// at a time.
    pub fn push_back_char(&mut self, c: char) -> Result<(), ErrorKind> {
        if c == '\n' {
            if self.last_len == 0 || self.line == 1 {
                return Err(ErrorKind::Internal(
                    "can't push back more than one newline".to_owned(),
                ));
            }
            self.line -= 1;
            self.col = self.last_len;
            self.last_len = 0;
        } else {
            self.col -= 1;
        }
        self.stack.push(c);
        Ok(())
    }

    /// Push `tok` back so it will be the next token read.
    pub fn push_back_token(&mut self, tok: &Token) {
        let quote = match tok.kind {
            Tok::CharLiteral => Some('\''),
            Tok::QuotedString => Some('"'),
            _ => None,
        };
        let depth = self.stack.len();
        self.stack.extend(quote);
        self.stack.extend(tok.text.chars().rev());
        self.stack.extend(quote);
        // The text of a continued string is shorter than its source, so rereading it can't be
        // relied upon to bring the position back to where it was.
        if self.stack.len() > depth {
            self.replays.push(Replay {
                depth,
                end_line: tok.end_line,
                end_col: tok.end_col,
            });
            self.line = tok.line;
            self.col = tok.col;
        } else {
            self.line = tok.end_line;
            self.col = tok.end_col;
        }
    }

    /// Discard everything up to and including the next newline.
    pub fn eat_line_remainder(&mut self) {
        while let Some(c) = self.next_char() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Discard whitespace and comments.
    pub fn eat_whitespace(&mut self) -> Result<(), ErrorKind> {
        loop {
            match self.next_char() {
                None => return Ok(()),
                Some(c) if c.is_whitespace() => (),
                Some('/') if self.peek_char() == Some('/') => self.eat_line_remainder(),
                Some(c) => return self.push_back_char(c),
            }
        }
    }

    /// Read the next token. Hitting the end of the input when `eof_ok` is false is an error.
    pub fn next_token(&mut self, eof_ok: bool) -> Result<Token, ErrorKind> {
        let (mut kind, mut text) = self.extract(eof_ok)?;
        if kind == Tok::BeginDebug {
            if self.debug_mode {
                self.cond_count += 1;
                let r = self.process_begin_debug(eof_ok)?;
                kind = r.0;
                text = r.1;
            } else {
                while kind == Tok::BeginDebug {
                    self.cond_count += 1;
                    while self.cond_count > 0 {
                        match self.extract(false)?.0 {
                            Tok::BeginDebug => self.cond_count += 1,
                            Tok::EndDebug => self.cond_count -= 1,
                            _ => (),
                        }
                    }
                    let r = self.extract(eof_ok)?;
                    kind = r.0;
                    text = r.1;
                }
            }
        } else {
            while kind == Tok::EndDebug {
                if self.cond_count == 0 {
                    return Err(ErrorKind::CondUnderflow);
                }
                self.cond_count -= 1;
                let r = self.extract(eof_ok)?;
                kind = r.0;
                text = r.1;
            }
            if kind == Tok::BeginDebug {
                self.cond_count += 1;
                let r = self.process_begin_debug(eof_ok)?;
                kind = r.0;
                text = r.1;
            }
        }
        Ok(Token {
            kind,
            text,
            line: self.save_line,
            col: self.save_col,
            end_line: self.line,
            end_col: self.col,
        })
    }

    /// In debug mode, skip over the markers of (possibly nested, possibly empty) debug blocks,
    /// returning the first real token.
    fn process_begin_debug(&mut self, eof_ok: bool) -> Result<(Tok, String), ErrorKind> {
        let mut r = (Tok::BeginDebug, String::new());
        while r.0 == Tok::BeginDebug {
            while self.cond_count > 0 {
                r = self.extract(eof_ok)?;
                match r.0 {
                    Tok::BeginDebug => self.cond_count += 1,
                    Tok::EndDebug => self.cond_count -= 1,
                    _ => break,
                }
            }
            if self.cond_count == 0 {
                r = self.extract(eof_ok)?;
            }
        }
        Ok(r)
    }

    pub fn peek_token(&mut self) -> Result<Token, ErrorKind> {
        let tok = self.next_token(true)?;
        self.push_back_token(&tok);
        Ok(tok)
    }

    /// If the next token is `kind`, consume it and return true. Otherwise leave it in place.
    pub fn if_peeked(&mut self, kind: Tok) -> Result<bool, ErrorKind> {
        let tok = self.next_token(true)?;
        if tok.kind == kind {
            Ok(true)
        } else {
            self.push_back_token(&tok);
            Ok(false)
        }
    }

    fn at_eof(&self, quoted: bool, eof_ok: bool, text: String) -> Result<(Tok, String), ErrorKind> {
        if self.cond_count > 0 {
            Err(ErrorKind::EofInConditional)
        } else if quoted {
            Err(ErrorKind::UnterminatedStr)
        } else if !eof_ok {
            Err(ErrorKind::UnexpectedEof)
        } else {
            Ok(map_word(text))
        }
    }

    fn need_char(&mut self) -> Result<char, ErrorKind> {
        match self.next_char() {
            Some(c) => Ok(c),
            None if self.cond_count > 0 => Err(ErrorKind::EofInConditional),
            None => Err(ErrorKind::UnexpectedEof),
        }
    }

    fn extract(&mut self, eof_ok: bool) -> Result<(Tok, String), ErrorKind> {
        let mut text = String::new();
        self.eat_whitespace()?;
        if self.peek_char().is_none() {
            return self.at_eof(false, eof_ok, text);
        }
        self.save_pos();

        if self.peek_char() == Some('\'') {
            self.next_char();
            let c = self.need_char()?;
            if c == '\\' {
                let c2 = self.need_char()?;
                text.push('\\');
                text.push(c2);
                if c2 == 'x' {
                    for _ in 0..4 {
                        text.push(self.need_char()?);
                    }
                }
            } else {
                text.push(c);
            }
            if self.need_char()? != '\'' {
                return Err(ErrorKind::BadCharLiteral);
            }
            return Ok((Tok::CharLiteral, text));
        }

        let quoted = self.peek_char() == Some('"');
        if quoted {
            self.next_char();
        }
        let mut in_escape = false;
        let mut sym = None;
        loop {
            let c = match self.next_char() {
                Some(c) => c,
                None => return self.at_eof(quoted, eof_ok, text),
            };
            if quoted {
                if c == '\n' {
                    if !in_escape {
                        return Err(ErrorKind::NewLineInStr);
                    }
                    // A line continuation: drop the backslash and any leading whitespace.
                    in_escape = false;
                    text.pop();
                    self.skip_blanks()?;
                    continue;
                }
                if c == '"' && !in_escape {
                    return Ok((Tok::QuotedString, text));
                }
                if in_escape {
                    in_escape = false;
                } else if c == '\\' {
                    in_escape = true;
                }
                text.push(c);
            } else if c.is_whitespace() {
                self.push_back_char(c)?;
                break;
            } else if is_special(c) {
                if text.is_empty() {
                    let is_digit = |c: Option<char>| c.map_or(false, |c| c.is_ascii_digit());
                    sym = match c {
                        '&' => Some(Tok::And),
                        '*' => Some(Tok::Multiply),
                        ']' => Some(Tok::CloseBracket),
                        '^' => Some(Tok::Xor),
                        ')' => Some(Tok::CloseParen),
                        ':' => Some(Tok::Colon),
                        ',' => Some(Tok::Comma),
                        '=' => Some(Tok::EqualSign),
                        '!' => Some(Tok::Exclaim),
                        '/' => Some(Tok::Divide),
                        '>' => Some(Tok::GtThan),
                        '<' => Some(Tok::LsThan),
                        '[' => Some(Tok::OpenBracket),
                        '(' => Some(Tok::OpenParen),
                        '%' => Some(Tok::ModDiv),
                        '.' => Some(Tok::Period),
                        ';' => Some(Tok::SemiColon),
                        '|' => Some(Tok::Or),
                        '-' if !is_digit(self.peek_char()) => Some(Tok::Subtract),
                        '+' if !is_digit(self.peek_char()) => Some(Tok::Add),
                        '-' | '+' => None,
                        _ => return Err(ErrorKind::UnexpectedToken(c.to_string())),
                    };
                    text.push(c);
                    if sym.is_some() {
                        break;
                    }
                } else if c == '.'
                    && text
                        .chars()
                        .next()
                        .map_or(false, |f| f == '+' || f == '-' || f.is_ascii_digit())
                {
                    text.push(c);
                } else {
                    self.push_back_char(c)?;
                    break;
                }
            } else {
                text.push(c);
            }
        }

        let kind = match sym {
            Some(k) => k,
            None => return Ok(map_word(text)),
        };
        let next = self.peek_char();
        let two = match (kind, next) {
            (Tok::And, Some('&')) => Some(Tok::LogAnd),
            (Tok::And, Some('=')) => Some(Tok::AndEq),
            (Tok::Add, Some('+')) => Some(Tok::Inc),
            (Tok::Add, Some('=')) => Some(Tok::PlusEq),
            (Tok::Colon, Some('=')) => Some(Tok::Assign),
            (Tok::Divide, Some('=')) => Some(Tok::DivideEq),
            (Tok::Exclaim, Some('=')) => Some(Tok::NotEqual),
            (Tok::GtThan, Some('=')) => Some(Tok::GtThanEq),
            (Tok::LsThan, Some('=')) => Some(Tok::LsThanEq),
            (Tok::ModDiv, Some('=')) => Some(Tok::ModDivEq),
            (Tok::Multiply, Some('=')) => Some(Tok::MultiplyEq),
            (Tok::Or, Some('|')) => Some(Tok::LogOr),
            (Tok::Or, Some('=')) => Some(Tok::OrEq),
            (Tok::Subtract, Some('-')) => Some(Tok::Dec),
            (Tok::Subtract, Some('=')) => Some(Tok::MinusEq),
            (Tok::Xor, Some('^')) => Some(Tok::LogXor),
            (Tok::Xor, Some('=')) => Some(Tok::XorEq),
            _ => None,
        };
        match two {
            Some(k) => {
                if let Some(c) = self.next_char() {
                    text.push(c);
                }
                Ok((k, text))
            }
            None => Ok((kind, text)),
        }
    }

    /// Skip whitespace only (comments are not recognised inside quoted strings).
    fn skip_blanks(&mut self) -> Result<(), ErrorKind> {
        while let Some(c) = self.next_char() {
            if !c.is_whitespace() {
                return self.push_back_char(c);
            }
        }
        Ok(())
    }
}

/// Classify a complete word: a keyword, a numeric literal, or a name.
fn map_word(text: String) -> (Tok, String) {
    if text.is_empty() {
        return (Tok::Eof, text);
    }
    if let Some(k) = Tok::keyword(&text) {
        return (k, text);
    }
    let numeric = text
        .chars()
        .next()
        .map_or(false, |c| c == '-' || c == '+' || c.is_ascii_digit());
    if numeric {
        (Tok::NumericLiteral, text)
    } else {
        (Tok::NoMatch, text)
    }
}

fn escape(c: char) -> Option<char> {
    Some(match c {
        'a' => '\x07',
        'b' => '\x08',
        'f' => '\x0c',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\x0b',
        '\\' => '\\',
        _ => return None,
    })
}

/// Process the escapes in the raw text of a quoted string. An unrecognised escape is left as is.
pub fn escape_str(raw: &str) -> String {
    let mut s = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            s.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => s.push('"'),
            Some(e) => match escape(e) {
                Some(r) => s.push(r),
                None => {
                    s.push('\\');
                    s.push(e);
                }
            },
            None => s.push('\\'),
        }
    }
    s
}

/// Convert the raw text of a char literal (`c`, `\c`, or `\xHHHH`) to a char.
pub fn escape_char(raw: &str) -> Result<char, ErrorKind> {
    let chars = raw.chars().collect::<Vec<_>>();
    match chars.as_slice() {
        [c] => Ok(*c),
        ['\\', '\''] => Ok('\''),
        ['\\', e] => escape(*e).ok_or(ErrorKind::BadCharLiteral),
        ['\\', 'x', hex @ ..] if hex.len() == 4 => {
            let hex = hex.iter().collect::<String>();
            u32::from_str_radix(&hex, 16)
                .ok()
                .and_then(std::char::from_u32)
                .ok_or(ErrorKind::BadCharLiteral)
        }
        _ => Err(ErrorKind::BadCharLiteral),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok> {
        let mut lx = Lexer::new(src, false);
        let mut v = Vec::new();
        loop {
            let t = lx.next_token(true).unwrap();
            if t.kind == Tok::Eof {
                break;
            }
            v.push(t.kind);
        }
        v
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a:=b&&c||d^^e != f >= g <= h"),
            vec![
                Tok::NoMatch,
                Tok::Assign,
                Tok::NoMatch,
                Tok::LogAnd,
                Tok::NoMatch,
                Tok::LogOr,
                Tok::NoMatch,
                Tok::LogXor,
                Tok::NoMatch,
                Tok::NotEqual,
                Tok::NoMatch,
                Tok::GtThanEq,
                Tok::NoMatch,
                Tok::LsThanEq,
                Tok::NoMatch
            ]
        );
        assert_eq!(
            kinds("x++ y-- += -= *= /= %= &= |= ^="),
            vec![
                Tok::NoMatch,
                Tok::Inc,
                Tok::NoMatch,
                Tok::Dec,
                Tok::PlusEq,
                Tok::MinusEq,
                Tok::MultiplyEq,
                Tok::DivideEq,
                Tok::ModDivEq,
                Tok::AndEq,
                Tok::OrEq,
                Tok::XorEq
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let mut lx = Lexer::new("-4.5 + 3 x-1 0x1F#C1", false);
        let t = lx.next_token(true).unwrap();
        assert_eq!((t.kind, t.text.as_str()), (Tok::NumericLiteral, "-4.5"));
        assert_eq!(lx.next_token(true).unwrap().kind, Tok::Add);
        assert_eq!(lx.next_token(true).unwrap().text, "3");
        assert_eq!(lx.next_token(true).unwrap().text, "x");
        let t = lx.next_token(true).unwrap();
        assert_eq!((t.kind, t.text.as_str()), (Tok::NumericLiteral, "-1"));
        assert_eq!(lx.next_token(true).unwrap().text, "0x1F#C1");
    }

    #[test]
    fn test_keywords_and_names() {
        assert_eq!(
            kinds("Class= ClassPath MEng.User.Foo; $Parent"),
            vec![
                Tok::Class,
                Tok::EqualSign,
                Tok::ClassPath,
                Tok::NoMatch,
                Tok::Period,
                Tok::NoMatch,
                Tok::Period,
                Tok::NoMatch,
                Tok::SemiColon,
                Tok::Parent
            ]
        );
    }

    #[test]
    fn test_positions_and_comments() {
        let mut lx = Lexer::new("  Begin // a comment\n\tEndMethod;\r\nx", false);
        let t = lx.next_token(true).unwrap();
        assert_eq!((t.line, t.col), (1, 3));
        let t = lx.next_token(true).unwrap();
        assert_eq!((t.kind, t.line, t.col), (Tok::EndMethod, 2, 2));
        let t = lx.next_token(true).unwrap();
        assert_eq!((t.kind, t.line, t.col), (Tok::SemiColon, 2, 11));
        let t = lx.next_token(true).unwrap();
        assert_eq!((t.text.as_str(), t.line, t.col), ("x", 3, 1));
        assert!(lx.next_token(false).is_err());
    }

    #[test]
    fn test_peek_and_pushback() {
        let mut lx = Lexer::new("If (a)\n  b := \"s\\\"t\";\n  c := 'x';", false);
        let mut seen = Vec::new();
        loop {
            let p = lx.peek_token().unwrap();
            let t = lx.next_token(true).unwrap();
            assert_eq!(p, t);
            if t.kind == Tok::Eof {
                break;
            }
            seen.push(t);
        }
        let s = seen.iter().find(|t| t.kind == Tok::QuotedString).unwrap();
        assert_eq!((s.text.as_str(), s.line, s.col), ("s\\\"t", 2, 8));
        let c = seen.iter().find(|t| t.kind == Tok::CharLiteral).unwrap();
        assert_eq!((c.text.as_str(), c.line, c.col), ("x", 3, 8));
        assert!(!lx.if_peeked(Tok::SemiColon).unwrap());
    }

    #[test]
    fn test_strings() {
        let mut lx = Lexer::new("\"abc\\\n     def\"", false);
        let t = lx.next_token(true).unwrap();
        assert_eq!((t.kind, t.text.as_str()), (Tok::QuotedString, "abcdef"));

        let mut lx = Lexer::new("\"abc\ndef\"", false);
        assert_eq!(lx.next_token(true), Err(ErrorKind::NewLineInStr));
        let mut lx = Lexer::new("\"abc", false);
        assert_eq!(lx.next_token(true), Err(ErrorKind::UnterminatedStr));
    }

    #[test]
    fn test_continued_string_pushback() {
        let mut lx = Lexer::new("\"abc\\\n   def\" x\ny", false);
        let p = lx.peek_token().unwrap();
        let t = lx.next_token(true).unwrap();
        assert_eq!(p, t);
        assert_eq!(
            (t.text.as_str(), t.line, t.col, t.end_line, t.end_col),
            ("abcdef", 1, 1, 2, 8)
        );
        let x = lx.peek_token().unwrap();
        assert_eq!((x.text.as_str(), x.line, x.col), ("x", 2, 9));
        assert_eq!(lx.next_token(true).unwrap(), x);
        let y = lx.next_token(true).unwrap();
        assert_eq!((y.text.as_str(), y.line, y.col), ("y", 3, 1));
    }

    #[test]
    fn test_escapes() {
        assert_eq!(escape_str("a\\tb\\n\\\"\\q\\"), "a\tb\n\"\\q\\");
        assert_eq!(escape_char("a"), Ok('a'));
        assert_eq!(escape_char("\\n"), Ok('\n'));
        assert_eq!(escape_char("\\'"), Ok('\''));
        assert_eq!(escape_char("\\x0041"), Ok('A'));
        assert_eq!(escape_char("\\q"), Err(ErrorKind::BadCharLiteral));
        assert_eq!(escape_char("\\x00G1"), Err(ErrorKind::BadCharLiteral));
        let mut lx = Lexer::new("'ab'", false);
        assert_eq!(lx.next_token(true), Err(ErrorKind::BadCharLiteral));
    }

    #[test]
    fn test_debug_blocks() {
        let src = "a #BeginDebug b #BeginDebug c #EndDebug #EndDebug d";
        assert_eq!(kinds(src).len(), 2);
        let mut lx = Lexer::new(src, true);
        let mut words = Vec::new();
        loop {
            let t = lx.next_token(true).unwrap();
            if t.kind == Tok::Eof {
                break;
            }
            words.push(t.text);
        }
        assert_eq!(words, vec!["a", "b", "c", "d"]);

        let mut lx = Lexer::new("#EndDebug a", false);
        assert_eq!(lx.next_token(true), Err(ErrorKind::CondUnderflow));
        let mut lx = Lexer::new("a #BeginDebug b", false);
        lx.next_token(true).unwrap();
        assert_eq!(lx.next_token(true), Err(ErrorKind::EofInConditional));
    }

    #[test]
    fn test_push_back_newlines() {
        let mut lx = Lexer::new("a\n\nb", false);
        assert_eq!(lx.next_char(), Some('a'));
        assert_eq!(lx.next_char(), Some('\n'));
        assert_eq!(lx.next_char(), Some('\n'));
        lx.push_back_char('\n').unwrap();
        assert!(lx.push_back_char('\n').is_err());
    }
}
