//! Lock-string parser.
//!
//! A lock-string holds one or more clauses separated by `;`:
//!
//! ```text
//! get: perm(Builder) OR holds('brass key'); delete: id(1) AND NOT false()
//! ```
//!
//! Each clause is `access_type: expression`. An expression is a chain of
//! function calls joined by `AND`/`OR`, read strictly left to right with no
//! precedence: `a() OR b() AND c()` means `(a() OR b()) AND c()`. `NOT`
//! negates only the call right after it. Keywords ignore case. Arguments
//! are literals: bare words, numbers, dbrefs, or quoted strings. Calls
//! never nest.

use std::fmt;

use crate::LockError;

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// How a term combines with everything to its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joiner {
    And,
    Or,
}

impl fmt::Display for Joiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
        }
    }
}

/// One `name(arg, ...)` call. The name is stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncCall {
    pub name: String,
    pub args: Vec<String>,
}

impl fmt::Display for FuncCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let bare = !arg.is_empty()
                && arg.chars().all(|c| c.is_alphanumeric() || "_#.-".contains(c));
            if bare {
                f.write_str(arg)?;
            } else {
                write!(f, "'{}'", arg.replace('\\', "\\\\").replace('\'', "\\'"))?;
            }
        }
        f.write_str(")")
    }
}

/// A call, possibly negated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub negated: bool,
    pub call: FuncCall,
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("NOT ")?;
        }
        write!(f, "{}", self.call)
    }
}

/// A compiled lock expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockExpr {
    first: Term,
    rest: Vec<(Joiner, Term)>,
}

impl LockExpr {
    /// Parses a single expression (the part after `access_type:`).
    pub fn parse(access_type: &str, source: &str) -> Result<Self, LockError> {
        if source.trim().is_empty() {
            return Err(LockError::EmptyExpression(access_type.to_string()));
        }
        Parser::new(access_type, source).expression()
    }

    /// Joins two expressions: `self <joiner> other`.
    ///
    /// Because evaluation is left to right, the result behaves as
    /// `(self) <joiner> (other)` only when `other` is a single term; longer
    /// right-hand sides keep folding from the left.
    pub fn join(mut self, joiner: Joiner, other: LockExpr) -> Self {
        self.rest.push((joiner, other.first));
        self.rest.extend(other.rest);
        self
    }

    /// Every call in the expression, in order.
    pub fn calls(&self) -> impl Iterator<Item = &FuncCall> {
        std::iter::once(&self.first.call).chain(self.rest.iter().map(|(_, t)| &t.call))
    }

    /// Folds the chain from the left, skipping calls whose result cannot
    /// change the outcome (`false AND ...`, `true OR ...`).
    pub fn evaluate(&self, mut call: impl FnMut(&FuncCall) -> bool) -> bool {
        let mut acc = apply(&self.first, &mut call);
        for (joiner, term) in &self.rest {
            acc = match (joiner, acc) {
                (Joiner::And, false) => false,
                (Joiner::Or, true) => true,
                _ => apply(term, &mut call),
            };
        }
        acc
    }
}

fn apply(term: &Term, call: &mut impl FnMut(&FuncCall) -> bool) -> bool {
    call(&term.call) != term.negated
}

impl fmt::Display for LockExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (joiner, term) in &self.rest {
            write!(f, " {joiner} {term}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lock-string splitting
// ---------------------------------------------------------------------------

/// Splits a lock-string into clauses on `;` outside quotes. Blank
/// clauses are dropped.
pub fn split_clauses(lockstring: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, ch) in lockstring.char_indices() {
        match (quote, ch) {
            (Some(_), _) if escaped => escaped = false,
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(ch),
            (None, ';') => {
                clauses.push(&lockstring[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    clauses.push(&lockstring[start..]);
    clauses.retain(|c| !c.trim().is_empty());
    clauses
}

/// Splits one clause into its access type and expression source.
pub fn split_clause(clause: &str) -> Result<(&str, &str), LockError> {
    let (access_type, source) = clause
        .split_once(':')
        .ok_or_else(|| LockError::MissingAccessType(clause.trim().to_string()))?;
    let access_type = access_type.trim();
    if access_type.is_empty() || access_type.contains(char::is_whitespace) {
        return Err(LockError::MissingAccessType(clause.trim().to_string()));
    }
    Ok((access_type, source.trim()))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    access_type: &'a str,
    input: Vec<char>,
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(access_type: &'a str, source: &str) -> Self {
        Self {
            access_type,
            input: source.chars().collect(),
            position: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        self.position += 1;
        ch
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(char::is_whitespace) {
            self.position += 1;
        }
    }

    fn error(&self, reason: impl Into<String>) -> LockError {
        LockError::Syntax {
            access_type: self.access_type.to_string(),
            column: self.position + 1,
            reason: reason.into(),
        }
    }

    fn expression(&mut self) -> Result<LockExpr, LockError> {
        let first = self.term()?;
        let mut rest = Vec::new();
        loop {
            self.skip_whitespace();
            if self.current().is_none() {
                break;
            }
            let joiner = self.joiner()?;
            rest.push((joiner, self.term()?));
        }
        Ok(LockExpr { first, rest })
    }

    fn joiner(&mut self) -> Result<Joiner, LockError> {
        let mark = self.position;
        let word = self.identifier();
        match word.to_ascii_lowercase().as_str() {
            "and" => Ok(Joiner::And),
            "or" => Ok(Joiner::Or),
            other => {
                self.position = mark;
                if other.is_empty() {
                    Err(self.error("expected AND or OR"))
                } else {
                    Err(self.error(format!("expected AND or OR, found {other:?}")))
                }
            }
        }
    }

    fn term(&mut self) -> Result<Term, LockError> {
        let mut negated = false;
        loop {
            self.skip_whitespace();
            let mark = self.position;
            let word = self.identifier();
            if word.is_empty() {
                return Err(match self.current() {
                    Some('(') => self.error("grouping with parentheses is not supported"),
                    Some(c) => self.error(format!("expected a lock function, found {c:?}")),
                    None => self.error("expected a lock function after operator"),
                });
            }
            self.skip_whitespace();
            if word.eq_ignore_ascii_case("not") && self.current() != Some('(') {
                negated = !negated;
                continue;
            }
            if word.eq_ignore_ascii_case("and") || word.eq_ignore_ascii_case("or") {
                self.position = mark;
                return Err(self.error(format!("operator {word:?} without a left-hand call")));
            }
            let args = self.arguments()?;
            return Ok(Term {
                negated,
                call: FuncCall {
                    name: word.to_lowercase(),
                    args,
                },
            });
        }
    }

    fn identifier(&mut self) -> String {
        let mut word = String::new();
        if self.current().is_some_and(|c| c.is_alphabetic() || c == '_') {
            while let Some(c) = self.current() {
                if c.is_alphanumeric() || c == '_' {
                    word.push(c);
                    self.position += 1;
                } else {
                    break;
                }
            }
        }
        word
    }

    fn arguments(&mut self) -> Result<Vec<String>, LockError> {
        if self.advance() != Some('(') {
            self.position -= 1;
            return Err(self.error("expected '(' after lock function name"));
        }
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.current() == Some(')') {
            self.position += 1;
            return Ok(args);
        }
        loop {
            self.skip_whitespace();
            args.push(self.argument()?);
            self.skip_whitespace();
            match self.advance() {
                Some(',') => continue,
                Some(')') => return Ok(args),
                Some(c) => {
                    self.position -= 1;
                    return Err(self.error(format!("expected ',' or ')', found {c:?}")));
                }
                None => return Err(self.error("unclosed argument list")),
            }
        }
    }

    fn argument(&mut self) -> Result<String, LockError> {
        match self.current() {
            Some(q @ ('\'' | '"')) => {
                self.position += 1;
                self.quoted(q)
            }
            _ => {
                let mut arg = String::new();
                while let Some(c) = self.current() {
                    match c {
                        ',' | ')' => break,
                        '(' => return Err(self.error("nested lock function calls are not supported")),
                        '\'' | '"' => return Err(self.error("quote inside an unquoted argument")),
                        _ => {
                            arg.push(c);
                            self.position += 1;
                        }
                    }
                }
                let arg = arg.trim().to_string();
                if arg.is_empty() {
                    return Err(self.error("empty argument"));
                }
                Ok(arg)
            }
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, LockError> {
        let mut out = String::new();
        while let Some(c) = self.advance() {
            if c == quote {
                return Ok(out);
            }
            if c == '\\' {
                match self.advance() {
                    Some(escaped) => out.push(escaped),
                    None => break,
                }
            } else {
                out.push(c);
            }
        }
        Err(self.error("unterminated string literal"))
    }
}
