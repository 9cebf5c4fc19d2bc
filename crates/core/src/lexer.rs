//! Expression lexer.
//!
//! A maximal-munch DFA over the expression alphabet. Scanning starts in
//! [`State::Start`], follows character-class transitions while any apply,
//! and emits the token of the last accepting state it passed through.
//! Whitespace is recognized as a token but filtered by [`Lexer`].

use std::fmt;

use serde::Serialize;

// ──────────────────────────────────────────────
// Tokens
// ──────────────────────────────────────────────

/// Terminal symbols of the expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Whitespace,
    LParen,
    RParen,
    Int,
    Float,
    /// Rewritten function parameter, `__x`
    Param,
    Var,
    /// HTML entity, `&pi;`
    Html,
    Str,
    /// Command reference, `Name[A]`
    Command,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Comma,
    Le,
    Ge,
    EqEq,
    Neq,
    Lt,
    Gt,
    Bang,
    OrOr,
    AndAnd,
    EndOfInput,
    /// No accepting state was reachable from the cursor.
    Invalid,
}

impl TokenKind {
    /// Human-readable label used in syntax error messages.
    pub fn label(self) -> &'static str {
        match self {
            TokenKind::Whitespace => "whitespace",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Int => "integer",
            TokenKind::Float => "float",
            TokenKind::Param => "parameter",
            TokenKind::Var => "identifier",
            TokenKind::Html => "html entity",
            TokenKind::Str => "string",
            TokenKind::Command => "command",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Caret => "'^'",
            TokenKind::Comma => "','",
            TokenKind::Le => "'<='",
            TokenKind::Ge => "'>='",
            TokenKind::EqEq => "'=='",
            TokenKind::Neq => "'!='",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Bang => "'!'",
            TokenKind::OrOr => "'||'",
            TokenKind::AndAnd => "'&&'",
            TokenKind::EndOfInput => "end of input",
            TokenKind::Invalid => "invalid character",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A token borrowed from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub lexeme: &'src str,
    /// Byte offset of the first character of the lexeme.
    pub offset: usize,
}

impl<'src> Token<'src> {
    /// Byte offset just past the lexeme.
    pub fn end(&self) -> usize {
        self.offset + self.lexeme.len()
    }
}

/// Result of a single scan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan<'src> {
    Token(Token<'src>),
    EndOfInput,
    Invalid { offset: usize },
}

// ──────────────────────────────────────────────
// Automaton
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Blank,
    Bang,
    Digits,
    Fraction,
    Less,
    Greater,
    Word,
    WordTail,
    WordUnderscore,
    CommandOpen,
    CommandBody,
    StrBody,
    Amp,
    HtmlBody,
    Dot,
    Assign,
    Underscore,
    ParamStart,
    ParamBody,
    Pipe,
    /// A single-step token: no further transitions.
    Done(TokenKind),
}

fn is_string_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '=' | 'ß' | 'ä' | 'ö' | 'ü')
}

fn step(state: State, c: char) -> Option<State> {
    use State::*;
    let next = match state {
        Start => match c {
            ' ' | '\t' => Blank,
            '!' => Bang,
            '(' => Done(TokenKind::LParen),
            ')' => Done(TokenKind::RParen),
            '*' => Done(TokenKind::Star),
            '+' => Done(TokenKind::Plus),
            ',' => Done(TokenKind::Comma),
            '-' => Done(TokenKind::Minus),
            '/' => Done(TokenKind::Slash),
            '^' => Done(TokenKind::Caret),
            '0'..='9' => Digits,
            '<' => Less,
            '>' => Greater,
            'A'..='Z' | 'a'..='z' => Word,
            '"' => StrBody,
            '&' => Amp,
            '.' => Dot,
            '=' => Assign,
            '_' => Underscore,
            '|' => Pipe,
            _ => return None,
        },
        Blank => match c {
            ' ' | '\t' => Blank,
            _ => return None,
        },
        Bang => match c {
            '=' => Done(TokenKind::Neq),
            _ => return None,
        },
        Digits => match c {
            '0'..='9' => Digits,
            '.' => Fraction,
            _ => return None,
        },
        Fraction | Dot => match c {
            '0'..='9' => Fraction,
            _ => return None,
        },
        Less => match c {
            '=' => Done(TokenKind::Le),
            _ => return None,
        },
        Greater => match c {
            '=' => Done(TokenKind::Ge),
            _ => return None,
        },
        Word => match c {
            'A'..='Z' | 'a'..='z' => Word,
            '0'..='9' => WordTail,
            '[' => CommandOpen,
            '_' => WordUnderscore,
            _ => return None,
        },
        WordTail => match c {
            '0'..='9' | 'A'..='Z' | 'a'..='z' => WordTail,
            '_' => WordUnderscore,
            _ => return None,
        },
        WordUnderscore => match c {
            '0'..='9' | 'A'..='Z' | 'a'..='z' => WordTail,
            '_' => WordUnderscore,
            _ => return None,
        },
        CommandOpen | CommandBody => match c {
            'A'..='Z' | 'a'..='z' => CommandBody,
            ']' if state == CommandBody => Done(TokenKind::Command),
            _ => return None,
        },
        StrBody => match c {
            '"' => Done(TokenKind::Str),
            c if is_string_char(c) => StrBody,
            _ => return None,
        },
        Amp => match c {
            '&' => Done(TokenKind::AndAnd),
            'A'..='Z' | 'a'..='z' => HtmlBody,
            _ => return None,
        },
        HtmlBody => match c {
            ';' => Done(TokenKind::Html),
            'A'..='Z' | 'a'..='z' => HtmlBody,
            _ => return None,
        },
        Assign => match c {
            '=' => Done(TokenKind::EqEq),
            _ => return None,
        },
        Underscore => match c {
            '_' => ParamStart,
            _ => return None,
        },
        ParamStart | ParamBody => match c {
            '0'..='9' | 'A'..='Z' | 'a'..='z' => ParamBody,
            _ => return None,
        },
        Pipe => match c {
            '|' => Done(TokenKind::OrOr),
            _ => return None,
        },
        Done(_) => return None,
    };
    Some(next)
}

fn accepting(state: State) -> Option<TokenKind> {
    match state {
        State::Blank => Some(TokenKind::Whitespace),
        State::Bang => Some(TokenKind::Bang),
        State::Digits => Some(TokenKind::Int),
        State::Fraction => Some(TokenKind::Float),
        State::Less => Some(TokenKind::Lt),
        State::Greater => Some(TokenKind::Gt),
        State::Word | State::WordTail => Some(TokenKind::Var),
        State::ParamBody => Some(TokenKind::Param),
        State::Done(kind) => Some(kind),
        _ => None,
    }
}

/// Scan one token starting at byte offset `cursor`.
///
/// Whitespace is returned as a [`TokenKind::Whitespace`] token; callers that
/// want the parser's view of the stream should use [`Lexer`].
pub fn scan(src: &str, cursor: usize) -> Scan<'_> {
    let Some(rest) = src.get(cursor..) else {
        return Scan::EndOfInput;
    };
    if rest.is_empty() {
        return Scan::EndOfInput;
    }

    let mut state = State::Start;
    let mut matched: Option<(TokenKind, usize)> = None;
    for (i, c) in rest.char_indices() {
        match step(state, c) {
            Some(next) => {
                state = next;
                if let Some(kind) = accepting(state) {
                    matched = Some((kind, i + c.len_utf8()));
                }
            }
            None => break,
        }
    }

    match matched {
        Some((kind, len)) => Scan::Token(Token {
            kind,
            lexeme: &rest[..len],
            offset: cursor,
        }),
        None => Scan::Invalid { offset: cursor },
    }
}

// ──────────────────────────────────────────────
// Lexer
// ──────────────────────────────────────────────

/// Lazy token stream over one expression, with whitespace filtered.
#[derive(Debug, Clone)]
pub struct Lexer<'src> {
    src: &'src str,
    cursor: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Lexer { src, cursor: 0 }
    }

    pub fn source(&self) -> &'src str {
        self.src
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Produce the next non-whitespace token.
    ///
    /// End of input yields a zero-length [`TokenKind::EndOfInput`] token at
    /// the end of the source. A character no token can start with yields a
    /// zero-length [`TokenKind::Invalid`] token and leaves the cursor in
    /// place; see [`Lexer::skip_char`].
    pub fn next_token(&mut self) -> Token<'src> {
        loop {
            match scan(self.src, self.cursor) {
                Scan::Token(token) => {
                    self.cursor = token.end();
                    if token.kind != TokenKind::Whitespace {
                        return token;
                    }
                }
                Scan::EndOfInput => {
                    return Token {
                        kind: TokenKind::EndOfInput,
                        lexeme: "",
                        offset: self.src.len(),
                    }
                }
                Scan::Invalid { offset } => {
                    return Token {
                        kind: TokenKind::Invalid,
                        lexeme: "",
                        offset,
                    }
                }
            }
        }
    }

    /// Step over one character without producing a token.
    pub fn skip_char(&mut self) {
        if let Some(c) = self.src[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }
}

/// Collect every non-whitespace token of `src`, stopping at the first
/// invalid character or end of input (which is included).
pub fn tokens(src: &str) -> Vec<Token<'_>> {
    let mut lexer = Lexer::new(src);
    let mut out = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = matches!(token.kind, TokenKind::EndOfInput | TokenKind::Invalid);
        out.push(token);
        if done {
            return out;
        }
    }
}

/// True when `src` is exactly one identifier token.
pub fn is_identifier(src: &str) -> bool {
    matches!(
        scan(src, 0),
        Scan::Token(Token { kind: TokenKind::Var, lexeme, .. }) if lexeme.len() == src.len()
    )
}
