//! Function definitions, `f(x, y) = body`.
//!
//! Parameters are rewritten to `__name` tokens so the lexer reports them as
//! [`TokenKind::Param`] and code generation never resolves them against the
//! scene.

use crate::lexer::{tokens, Lexer, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub name: String,
    pub params: Vec<String>,
    /// Body source with parameters rewritten.
    pub body: String,
}

/// Split a definition into head and rewritten body. Returns `None` when
/// `src` has no assignment or its head is not `name(param, ...)`.
pub fn split_definition(src: &str) -> Option<FunctionDefinition> {
    let at = assignment_offset(src)?;
    let (head, body) = (&src[..at], &src[at + 1..]);

    let toks = tokens(head);
    let mut iter = toks.iter();
    let name = match iter.next() {
        Some(t) if t.kind == TokenKind::Var => t.lexeme.to_owned(),
        _ => return None,
    };
    if iter.next()?.kind != TokenKind::LParen {
        return None;
    }
    let mut params = Vec::new();
    loop {
        let param = iter.next()?;
        if param.kind != TokenKind::Var {
            return None;
        }
        params.push(param.lexeme.to_owned());
        match iter.next()?.kind {
            TokenKind::Comma => continue,
            TokenKind::RParen => break,
            _ => return None,
        }
    }
    if iter.next()?.kind != TokenKind::EndOfInput {
        return None;
    }

    let body = rewrite_params(body.trim(), &params);
    Some(FunctionDefinition { name, params, body })
}

/// Prefix every use of a parameter name in `body` with `__`.
///
/// An identifier immediately followed by `(` is a call head and is left
/// alone. Text after an unlexable character is copied verbatim.
pub fn rewrite_params(body: &str, params: &[String]) -> String {
    let mut out = String::with_capacity(body.len() + 2 * params.len());
    let mut lexer = Lexer::new(body);
    let mut copied = 0;
    let mut current = lexer.next_token();
    loop {
        if matches!(current.kind, TokenKind::EndOfInput | TokenKind::Invalid) {
            break;
        }
        let next = lexer.next_token();
        if current.kind == TokenKind::Var
            && next.kind != TokenKind::LParen
            && params.iter().any(|p| p == current.lexeme)
        {
            out.push_str(&body[copied..current.offset]);
            out.push_str("__");
            out.push_str(current.lexeme);
            copied = current.end();
        }
        current = next;
    }
    out.push_str(&body[copied..]);
    out
}

/// Byte offset of the first lone `=`, skipping `==`, `<=`, `>=` and `!=`.
fn assignment_offset(src: &str) -> Option<usize> {
    let bytes = src.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b != b'=' {
            continue;
        }
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        let next = bytes.get(i + 1).copied();
        if matches!(prev, Some(b'=' | b'<' | b'>' | b'!')) || next == Some(b'=') {
            continue;
        }
        return Some(i);
    }
    None
}
