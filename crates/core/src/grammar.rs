//! LALR(1) tables for the expression grammar.
//!
//! ```text
//! p' → p                               (accept)
//! p  → e
//! e  → ( e , e )
//!    | e <= e | e >= e | e == e | e != e | e < e | e > e
//!    | e + e | e - e | ! e | e ^ e | e || e | e && e | e * e | e / e
//!    | - e | ( e ) | STRING + e
//!    | INT | FLOAT | PARAM | HTML | STRING | COMMAND
//!    | VAR ( e ) | VAR
//! ```
//!
//! The tables are generated once per process. Operator precedence lives
//! entirely in which lookaheads a state shifts on versus reduces on.

use std::sync::OnceLock;

use crate::lexer::TokenKind;

// ──────────────────────────────────────────────
// Symbols and rules
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonTerminal {
    /// `p`: the whole program
    Program,
    /// `e`: an expression
    Expr,
}

/// Grammar productions, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Accept,
    Finish,
    Coord,
    Le,
    Ge,
    Eq,
    Neq,
    Lt,
    Gt,
    Add,
    Sub,
    Not,
    Pow,
    Or,
    And,
    Mul,
    Div,
    Negate,
    Group,
    Concat,
    Int,
    Float,
    Param,
    Html,
    Str,
    Command,
    VarCall,
    Var,
}

impl Rule {
    pub fn lhs(self) -> NonTerminal {
        match self {
            Rule::Accept => NonTerminal::Program,
            Rule::Finish => NonTerminal::Program,
            _ => NonTerminal::Expr,
        }
    }

    /// Number of right-hand-side symbols popped on reduction.
    pub fn arity(self) -> usize {
        match self {
            Rule::Accept | Rule::Finish => 1,
            Rule::Coord => 5,
            Rule::VarCall => 4,
            Rule::Le
            | Rule::Ge
            | Rule::Eq
            | Rule::Neq
            | Rule::Lt
            | Rule::Gt
            | Rule::Add
            | Rule::Sub
            | Rule::Pow
            | Rule::Or
            | Rule::And
            | Rule::Mul
            | Rule::Div
            | Rule::Group
            | Rule::Concat => 3,
            Rule::Not | Rule::Negate => 2,
            Rule::Int
            | Rule::Float
            | Rule::Param
            | Rule::Html
            | Rule::Str
            | Rule::Command
            | Rule::Var => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Shift(u8),
    Reduce(Rule),
}

// ──────────────────────────────────────────────
// Terminal columns
// ──────────────────────────────────────────────

/// Terminals that appear in the action table, in column order.
pub const TERMINALS: [TokenKind; 25] = [
    TokenKind::LParen,
    TokenKind::RParen,
    TokenKind::Int,
    TokenKind::Float,
    TokenKind::Param,
    TokenKind::Var,
    TokenKind::Html,
    TokenKind::Str,
    TokenKind::Command,
    TokenKind::Plus,
    TokenKind::Minus,
    TokenKind::Star,
    TokenKind::Slash,
    TokenKind::Caret,
    TokenKind::Comma,
    TokenKind::Le,
    TokenKind::Ge,
    TokenKind::EqEq,
    TokenKind::Neq,
    TokenKind::Lt,
    TokenKind::Gt,
    TokenKind::Bang,
    TokenKind::OrOr,
    TokenKind::AndAnd,
    TokenKind::EndOfInput,
];

fn column(kind: TokenKind) -> Option<usize> {
    TERMINALS.iter().position(|k| *k == kind)
}

pub const STATE_COUNT: usize = 51;

/// Shifts available wherever an expression may begin.
const EXPR_START: [(TokenKind, u8); 10] = [
    (TokenKind::LParen, 3),
    (TokenKind::Bang, 4),
    (TokenKind::Minus, 5),
    (TokenKind::Str, 6),
    (TokenKind::Int, 7),
    (TokenKind::Float, 8),
    (TokenKind::Param, 9),
    (TokenKind::Html, 10),
    (TokenKind::Command, 11),
    (TokenKind::Var, 12),
];

/// Binary operators and the state reached by shifting each one.
const OPERATORS: [(TokenKind, u8); 13] = [
    (TokenKind::Slash, 13),
    (TokenKind::Star, 14),
    (TokenKind::AndAnd, 15),
    (TokenKind::OrOr, 16),
    (TokenKind::Caret, 17),
    (TokenKind::Minus, 18),
    (TokenKind::Plus, 19),
    (TokenKind::Gt, 20),
    (TokenKind::Lt, 21),
    (TokenKind::Neq, 22),
    (TokenKind::EqEq, 23),
    (TokenKind::Ge, 24),
    (TokenKind::Le, 25),
];

const COMPARISONS: [TokenKind; 6] = [
    TokenKind::Gt,
    TokenKind::Lt,
    TokenKind::Neq,
    TokenKind::EqEq,
    TokenKind::Ge,
    TokenKind::Le,
];

const LOGICAL: [TokenKind; 2] = [TokenKind::AndAnd, TokenKind::OrOr];

// ──────────────────────────────────────────────
// Tables
// ──────────────────────────────────────────────

type ActionRow = [Option<Action>; TERMINALS.len()];

#[derive(Debug)]
pub struct GrammarTables {
    actions: Vec<ActionRow>,
    gotos: Vec<[Option<u8>; 2]>,
}

impl GrammarTables {
    /// The process-wide tables.
    pub fn get() -> &'static GrammarTables {
        static TABLES: OnceLock<GrammarTables> = OnceLock::new();
        TABLES.get_or_init(GrammarTables::build)
    }

    pub fn action(&self, state: u8, lookahead: TokenKind) -> Option<Action> {
        let col = column(lookahead)?;
        self.actions.get(state as usize)?[col]
    }

    pub fn goto(&self, state: u8, nonterminal: NonTerminal) -> Option<u8> {
        let col = match nonterminal {
            NonTerminal::Program => 0,
            NonTerminal::Expr => 1,
        };
        self.gotos.get(state as usize)?[col]
    }

    /// Terminals with a defined action in `state`.
    pub fn expected(&self, state: u8) -> Vec<TokenKind> {
        match self.actions.get(state as usize) {
            Some(row) => TERMINALS
                .iter()
                .zip(row.iter())
                .filter(|(_, action)| action.is_some())
                .map(|(kind, _)| *kind)
                .collect(),
            None => Vec::new(),
        }
    }

    fn build() -> GrammarTables {
        let mut t = GrammarTables {
            actions: vec![[None; TERMINALS.len()]; STATE_COUNT],
            gotos: vec![[None; 2]; STATE_COUNT],
        };

        // States where an operand is expected.
        for state in [0, 3, 4, 5, 29, 30, 44].into_iter().chain(13..=25) {
            for (kind, target) in EXPR_START {
                t.set(state, kind, Action::Shift(target));
            }
        }

        t.set(1, TokenKind::EndOfInput, Action::Reduce(Rule::Accept));
        t.shift_operators(2, &[]);
        t.set(2, TokenKind::EndOfInput, Action::Reduce(Rule::Finish));

        // Leaf productions.
        t.set(6, TokenKind::Plus, Action::Shift(29));
        t.reduce_row(6, Rule::Str);
        for (state, rule) in [
            (7, Rule::Int),
            (8, Rule::Float),
            (9, Rule::Param),
            (10, Rule::Html),
            (11, Rule::Command),
        ] {
            t.reduce_row(state, rule);
        }
        t.set(12, TokenKind::LParen, Action::Shift(30));
        t.reduce_row(12, Rule::Var);

        // Parenthesized forms.
        t.shift_operators(26, &[]);
        t.set(26, TokenKind::Comma, Action::Shift(44));
        t.set(26, TokenKind::RParen, Action::Shift(45));
        t.reduce_row(45, Rule::Group);
        t.shift_operators(47, &[]);
        t.set(47, TokenKind::RParen, Action::Shift(49));
        t.reduce_row(49, Rule::VarCall);
        t.shift_operators(48, &[]);
        t.set(48, TokenKind::RParen, Action::Shift(50));
        t.reduce_row(50, Rule::Coord);

        // Operator states: shift on tighter operators, reduce on the rest.
        let tight_for_product: Vec<TokenKind> = LOGICAL
            .iter()
            .chain(COMPARISONS.iter())
            .copied()
            .chain([TokenKind::Caret])
            .collect();
        let tight_for_pow: Vec<TokenKind> =
            LOGICAL.iter().chain(COMPARISONS.iter()).copied().collect();
        let tight_for_sum: Vec<TokenKind> = tight_for_product
            .iter()
            .copied()
            .chain([TokenKind::Slash, TokenKind::Star])
            .collect();

        t.precedence_row(27, Rule::Not, &LOGICAL);
        t.precedence_row(28, Rule::Negate, &tight_for_product);
        t.precedence_row(31, Rule::Div, &tight_for_product);
        t.precedence_row(32, Rule::Mul, &tight_for_product);
        t.precedence_row(33, Rule::And, &[]);
        t.precedence_row(34, Rule::Or, &[]);
        t.precedence_row(35, Rule::Pow, &tight_for_pow);
        t.precedence_row(36, Rule::Sub, &tight_for_sum);
        t.precedence_row(37, Rule::Add, &tight_for_sum);
        t.precedence_row(38, Rule::Gt, &LOGICAL);
        t.precedence_row(39, Rule::Lt, &LOGICAL);
        t.precedence_row(40, Rule::Neq, &LOGICAL);
        t.precedence_row(41, Rule::Eq, &LOGICAL);
        t.precedence_row(42, Rule::Ge, &LOGICAL);
        t.precedence_row(43, Rule::Le, &LOGICAL);
        t.precedence_row(46, Rule::Concat, &tight_for_sum);

        t.gotos[0] = [Some(1), Some(2)];
        for (state, target) in [(3, 26), (4, 27), (5, 28), (29, 46), (30, 47), (44, 48)] {
            t.gotos[state][1] = Some(target);
        }
        for (offset, state) in (13..=25).enumerate() {
            t.gotos[state][1] = Some(31 + offset as u8);
        }

        t
    }

    fn set(&mut self, state: usize, kind: TokenKind, action: Action) {
        if let Some(col) = column(kind) {
            self.actions[state][col] = Some(action);
        }
    }

    /// Shift every binary operator except those in `except`.
    fn shift_operators(&mut self, state: usize, except: &[TokenKind]) {
        for (kind, target) in OPERATORS {
            if !except.contains(&kind) {
                self.set(state, kind, Action::Shift(target));
            }
        }
    }

    /// Reduce `rule` on every lookahead that may follow an expression and
    /// has no action yet.
    fn reduce_row(&mut self, state: usize, rule: Rule) {
        let follow = OPERATORS.iter().map(|(kind, _)| *kind).chain([
            TokenKind::EndOfInput,
            TokenKind::Comma,
            TokenKind::RParen,
        ]);
        for kind in follow {
            if let Some(col) = column(kind) {
                if self.actions[state][col].is_none() {
                    self.actions[state][col] = Some(Action::Reduce(rule));
                }
            }
        }
    }

    fn precedence_row(&mut self, state: usize, rule: Rule, shifts: &[TokenKind]) {
        for (kind, target) in OPERATORS {
            if shifts.contains(&kind) {
                self.set(state, kind, Action::Shift(target));
            }
        }
        self.reduce_row(state, rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_state_expects_an_operand() {
        let t = GrammarTables::get();
        let expected = t.expected(0);
        assert!(expected.contains(&TokenKind::Int));
        assert!(expected.contains(&TokenKind::LParen));
        assert!(!expected.contains(&TokenKind::RParen));
        assert!(!expected.contains(&TokenKind::EndOfInput));
    }

    #[test]
    fn sum_yields_to_product() {
        let t = GrammarTables::get();
        assert_eq!(t.action(37, TokenKind::Star), Some(Action::Shift(14)));
        assert_eq!(t.action(37, TokenKind::Plus), Some(Action::Reduce(Rule::Add)));
        assert_eq!(t.action(32, TokenKind::Plus), Some(Action::Reduce(Rule::Mul)));
    }

    #[test]
    fn string_state_prefers_concatenation() {
        let t = GrammarTables::get();
        assert_eq!(t.action(6, TokenKind::Plus), Some(Action::Shift(29)));
        assert_eq!(t.action(6, TokenKind::Minus), Some(Action::Reduce(Rule::Str)));
    }

    #[test]
    fn operator_states_goto_their_reduction_states() {
        let t = GrammarTables::get();
        assert_eq!(t.goto(13, NonTerminal::Expr), Some(31));
        assert_eq!(t.goto(25, NonTerminal::Expr), Some(43));
        assert_eq!(t.goto(0, NonTerminal::Program), Some(1));
        assert_eq!(t.goto(7, NonTerminal::Expr), None);
    }

    #[test]
    fn whitespace_and_invalid_have_no_column() {
        let t = GrammarTables::get();
        for state in 0..STATE_COUNT as u8 {
            assert_eq!(t.action(state, TokenKind::Whitespace), None);
            assert_eq!(t.action(state, TokenKind::Invalid), None);
        }
    }

    #[test]
    fn rule_arity_matches_right_hand_sides() {
        assert_eq!(Rule::Coord.arity(), 5);
        assert_eq!(Rule::VarCall.arity(), 4);
        assert_eq!(Rule::Negate.arity(), 2);
        assert_eq!(Rule::Var.arity(), 1);
        assert_eq!(Rule::Finish.lhs(), NonTerminal::Program);
    }
}
