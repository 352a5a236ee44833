//! Boolean category-expression normalization.
//!
//! Turns free-form input such as `cs.AI or (cs.LG not cs.CV)` into a fully
//! parenthesized expression with explicit operators:
//! `(cat:cs.AI+OR+(cat:cs.LG+NOT+cat:cs.CV))`.
//!
//! Grammar (permissive, no precedence):
//! - `AND` / `+`, `OR` / `|`, `NOT` / `-` (keywords are case-insensitive)
//! - `(` ... `)` for grouping; unbalanced parens are tolerated
//! - juxtaposed terms get an implicit `AND`
//!
//! Anything that is not a keyword or a paren is an identifier and keeps its case.
//! An identifier spelled `and`/`or`/`not` cannot be expressed: it always lexes as
//! an operator.

/// The only way normalization can fail.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty expression")]
    EmptyExpression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
}

impl Operator {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Op(Operator),
    LParen,
    RParen,
    Ident(String),
    Eof,
}

impl Token {
    fn starts_term(&self) -> bool {
        matches!(self, Self::Ident(_) | Self::LParen)
    }
}

/// What to do when the input holds no tokens at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyPolicy {
    /// Fail with [`ParseError::EmptyExpression`].
    #[default]
    Reject,
    /// Return `()`.
    Allow,
}

const META_CHARS: [char; 5] = ['(', ')', '+', '-', '|'];

pub(crate) fn lex(input: &str) -> Vec<Token> {
    let mut padded = String::with_capacity(input.len() + 8);
    for ch in input.chars() {
        if META_CHARS.contains(&ch) {
            padded.push(' ');
            padded.push(ch);
            padded.push(' ');
        } else {
            padded.push(ch);
        }
    }

    let mut tokens: Vec<Token> = padded
        .split_whitespace()
        .map(|field| {
            if field == "+" || field.eq_ignore_ascii_case("and") {
                Token::Op(Operator::And)
            } else if field == "|" || field.eq_ignore_ascii_case("or") {
                Token::Op(Operator::Or)
            } else if field == "-" || field.eq_ignore_ascii_case("not") {
                Token::Op(Operator::Not)
            } else if field == "(" {
                Token::LParen
            } else if field == ")" {
                Token::RParen
            } else {
                Token::Ident(field.to_string())
            }
        })
        .collect();
    tokens.push(Token::Eof);
    tokens
}

enum Part {
    /// A decorated identifier or a parenthesized group.
    Term(String),
    Op(Operator),
}

impl Part {
    fn as_str(&self) -> &str {
        match self {
            Self::Term(s) => s,
            Self::Op(op) => op.keyword(),
        }
    }
}

/// Normalizer configuration: identifier decoration, join separator, and empty-input policy.
///
/// The default is the category-search flavour (`cat:` prefix, `+` separator, strict).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionParser {
    prefix: String,
    suffix: String,
    separator: String,
    empty_policy: EmptyPolicy,
}

impl Default for ExpressionParser {
    fn default() -> Self {
        Self::category()
    }
}

impl ExpressionParser {
    /// arXiv `search_query` flavour: `cat:<ident>` joined by `+`.
    pub fn category() -> Self {
        Self {
            prefix: "cat:".to_string(),
            suffix: String::new(),
            separator: "+".to_string(),
            empty_policy: EmptyPolicy::Reject,
        }
    }

    /// `<prefix><ident><suffix>` joined by a single space.
    pub fn general(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            separator: " ".to_string(),
            empty_policy: EmptyPolicy::Reject,
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_empty_policy(mut self, policy: EmptyPolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn parse(&self, input: &str) -> Result<String, ParseError> {
        let tokens = lex(input);
        let mut cursor = Cursor {
            tokens: &tokens,
            pos: 0,
            cfg: self,
        };
        let parts = cursor.parse_group();
        if parts.is_empty() && self.empty_policy == EmptyPolicy::Reject {
            return Err(ParseError::EmptyExpression);
        }
        Ok(format!("({})", self.join(&parts)))
    }

    fn decorate(&self, ident: &str) -> String {
        format!("{}{}{}", self.prefix, ident, self.suffix)
    }

    fn join(&self, parts: &[Part]) -> String {
        parts
            .iter()
            .map(Part::as_str)
            .collect::<Vec<_>>()
            .join(&self.separator)
    }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    cfg: &'a ExpressionParser,
}

impl Cursor<'_> {
    /// Accumulate parts until `)` or EOF. A terminating `)` is consumed, which is what
    /// makes stray closing parens harmless.
    fn parse_group(&mut self) -> Vec<Part> {
        let tokens = self.tokens;
        let mut parts: Vec<Part> = Vec::new();

        while let Some(tok) = tokens.get(self.pos) {
            if matches!(tok, Token::RParen | Token::Eof) {
                break;
            }

            // Implicit AND: term followed by term.
            if matches!(parts.last(), Some(Part::Term(_))) && tok.starts_term() {
                parts.push(Part::Op(Operator::And));
            }

            self.pos += 1;
            match tok {
                Token::LParen => {
                    let inner = self.parse_group();
                    parts.push(Part::Term(format!("({})", self.cfg.join(&inner))));
                }
                Token::Ident(v) => parts.push(Part::Term(self.cfg.decorate(v))),
                Token::Op(op) => parts.push(Part::Op(*op)),
                Token::RParen | Token::Eof => {}
            }
        }

        if matches!(tokens.get(self.pos), Some(Token::RParen)) {
            self.pos += 1;
        }
        parts
    }
}

/// Normalize a category expression for arXiv's `search_query` (`cat:` prefix, `+` separator).
///
/// `-` is always NOT, so a hyphenated archive such as `hep-th` lexes as `hep NOT th`.
pub fn parse_category_expression(input: &str) -> Result<String, ParseError> {
    ExpressionParser::category().parse(input)
}

/// Normalize an expression decorating each identifier as `<prefix><ident><suffix>`,
/// joined by single spaces.
pub fn parse_general_expression(
    input: &str,
    prefix: &str,
    suffix: &str,
) -> Result<String, ParseError> {
    ExpressionParser::general(prefix, suffix).parse(input)
}
