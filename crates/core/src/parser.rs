//! Table-driven shift/reduce parser with panic-mode recovery.
//!
//! The engine owns only the automaton stack and the lexer; everything an
//! expression *means* is decided by the [`SemanticActions`] passed in.

use serde::Serialize;

use crate::ast::{Expr, ExprValue};
use crate::error::SyntaxError;
use crate::grammar::{Action, GrammarTables, Rule};
use crate::lexer::{Lexer, Token, TokenKind};

/// Maximum syntax errors recorded per parse. Further errors are counted.
pub const DEFAULT_MAX_ERRORS: usize = 10;

/// Deepest reduction tree a parse may build. Deeper input degrades.
pub const MAX_NESTING: usize = 500;

/// A value on the parser stack.
#[derive(Debug, Clone, PartialEq)]
pub enum StackValue<'src> {
    /// Bottom-of-stack marker.
    Sentinel,
    /// A shifted terminal.
    Token(Token<'src>),
    /// The result of a reduction.
    Value(ExprValue),
}

impl<'src> StackValue<'src> {
    /// The lexeme of a shifted terminal, or `""`.
    pub fn lexeme(&self) -> &'src str {
        match self {
            StackValue::Token(token) => token.lexeme,
            _ => "",
        }
    }

    /// Coerce into an expression value. A stray terminal becomes text.
    pub fn into_value(self) -> ExprValue {
        match self {
            StackValue::Value(value) => value,
            StackValue::Token(token) => ExprValue::scalar(Expr::text(token.lexeme)),
            StackValue::Sentinel => ExprValue::scalar(Expr::number(0.0)),
        }
    }
}

/// Callbacks invoked once per reduction.
pub trait SemanticActions {
    /// Combine the popped right-hand side of `rule` into one value.
    /// `operands[0]` is the leftmost symbol.
    fn reduce(&mut self, rule: Rule, operands: Vec<StackValue<'_>>) -> ExprValue;
}

// ──────────────────────────────────────────────
// Outcome
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Parsed {
    Value { value: ExprValue },
    /// Recovery failed; the input text is returned untouched.
    Degraded { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutcome {
    pub result: Parsed,
    pub errors: Vec<SyntaxError>,
    /// Errors beyond the recording limit.
    #[serde(skip_serializing_if = "is_zero")]
    pub suppressed_errors: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl ParseOutcome {
    pub fn value(&self) -> Option<&ExprValue> {
        match &self.result {
            Parsed::Value { value } => Some(value),
            Parsed::Degraded { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<ExprValue> {
        match self.result {
            Parsed::Value { value } => Some(value),
            Parsed::Degraded { .. } => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.result, Parsed::Degraded { .. })
    }

    pub fn is_clean(&self) -> bool {
        !self.is_degraded() && self.errors.is_empty()
    }
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

/// Parse `src`, reporting reductions to `actions`.
pub fn parse_with<A: SemanticActions + ?Sized>(src: &str, actions: &mut A) -> ParseOutcome {
    parse_with_limit(src, actions, DEFAULT_MAX_ERRORS)
}

pub fn parse_with_limit<A: SemanticActions + ?Sized>(
    src: &str,
    actions: &mut A,
    max_errors: usize,
) -> ParseOutcome {
    let mut engine = Engine {
        src,
        lexer: Lexer::new(src),
        tables: GrammarTables::get(),
        errors: Vec::new(),
        suppressed: 0,
        max_errors,
    };
    let result = match engine.run(actions) {
        Some(value) => Parsed::Value { value },
        None => {
            tracing::debug!(
                errors = engine.errors.len() + engine.suppressed,
                "unrecoverable syntax error, returning input unchanged"
            );
            Parsed::Degraded {
                text: src.to_owned(),
            }
        }
    };
    ParseOutcome {
        result,
        errors: engine.errors,
        suppressed_errors: engine.suppressed,
    }
}

/// Automaton state, stack value, and height of the tree reduced into it.
type Stack<'src> = Vec<(u8, StackValue<'src>, usize)>;

struct Engine<'src> {
    src: &'src str,
    lexer: Lexer<'src>,
    tables: &'static GrammarTables,
    errors: Vec<SyntaxError>,
    suppressed: usize,
    max_errors: usize,
}

impl<'src> Engine<'src> {
    fn run<A: SemanticActions + ?Sized>(&mut self, actions: &mut A) -> Option<ExprValue> {
        let mut stack: Stack<'src> = vec![(0, StackValue::Sentinel, 0)];
        let mut lookahead = self.lexer.next_token();

        loop {
            let top = stack.last()?.0;
            let action = match self.tables.action(top, lookahead.kind) {
                Some(action) => action,
                None => {
                    let (action, recovered) = self.recover(&mut stack, lookahead)?;
                    lookahead = recovered;
                    action
                }
            };

            match action {
                Action::Shift(state) => {
                    stack.push((state, StackValue::Token(lookahead), 0));
                    lookahead = self.lexer.next_token();
                }
                Action::Reduce(Rule::Accept) => {
                    let (_, value, _) = stack.pop()?;
                    return Some(value.into_value());
                }
                Action::Reduce(rule) => {
                    let arity = rule.arity();
                    if stack.len() <= arity {
                        return None;
                    }
                    let split = stack.len() - arity;
                    let mut height = 0;
                    let operands: Vec<StackValue<'src>> = stack
                        .drain(split..)
                        .map(|(_, value, h)| {
                            height = height.max(h);
                            value
                        })
                        .collect();
                    height += 1;
                    if height > MAX_NESTING {
                        self.record(lookahead.offset, Vec::new());
                        tracing::debug!(
                            offset = lookahead.offset,
                            limit = MAX_NESTING,
                            "expression nested too deeply"
                        );
                        return None;
                    }
                    let value = actions.reduce(rule, operands);
                    let below = stack.last()?.0;
                    let target = self.tables.goto(below, rule.lhs())?;
                    stack.push((target, StackValue::Value(value), height));
                }
            }
        }
    }

    /// Panic-mode recovery. Returns the action to resume with and the
    /// lookahead it applies to, or `None` once input is exhausted.
    fn recover(
        &mut self,
        stack: &mut Stack<'src>,
        mut lookahead: Token<'src>,
    ) -> Option<(Action, Token<'src>)> {
        let top = stack.last().map_or(0, |(state, _, _)| *state);
        self.record(lookahead.offset, self.tables.expected(top));
        tracing::debug!(
            offset = lookahead.offset,
            found = %lookahead.kind,
            state = top,
            "syntax error, recovering"
        );

        let snapshot = stack.clone();
        loop {
            if lookahead.kind == TokenKind::EndOfInput {
                return None;
            }
            if lookahead.kind == TokenKind::Invalid {
                self.lexer.skip_char();
            }

            // Discard states until one can act on the lookahead.
            while stack.pop().is_some() {
                let Some((state, _, _)) = stack.last() else {
                    break;
                };
                if let Some(action) = self.tables.action(*state, lookahead.kind) {
                    return Some((action, lookahead));
                }
            }

            // Nothing on the stack fits: restore it and drop the token.
            *stack = snapshot.clone();
            lookahead = self.lexer.next_token();
            if let Some(action) = self.tables.action(top, lookahead.kind) {
                return Some((action, lookahead));
            }
        }
    }

    fn record(&mut self, offset: usize, expected: Vec<TokenKind>) {
        if self.errors.len() < self.max_errors {
            self.errors.push(SyntaxError::new(self.src, offset, expected));
        } else {
            self.suppressed += 1;
        }
    }
}
