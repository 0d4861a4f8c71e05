//! SQL-like predicate evaluation for the in-memory store.
//!
//! Supports the subset of LanceDB filter syntax the retriever issues:
//! string comparisons (`=`, `!=`, `<>`), `LIKE` / `NOT LIKE` with `%` and `_`
//! wildcards, `AND`, `OR`, `NOT` and parentheses. `AND` binds tighter than `OR`.

use anyhow::{anyhow, bail, Result};

use crate::Document;

/// A parsed filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare { field: Field, op: CompareOp, value: String },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
}

/// Document fields a filter can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Filename,
    Filepath,
    Content,
    Collection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Like,
    NotLike,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Eq,
    Ne,
    LParen,
    RParen,
}

impl Filter {
    /// Parse a predicate such as `filename LIKE '%2022%' AND NOT content = ''`.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let filter = parser.parse_or()?;
        if parser.pos != parser.tokens.len() {
            bail!("unexpected trailing input in filter '{}'", input);
        }
        Ok(filter)
    }

    /// Evaluate the predicate against a document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Compare { field, op, value } => {
                let actual = match field {
                    Field::Filename => &doc.filename,
                    Field::Filepath => &doc.filepath,
                    Field::Content => &doc.content,
                    Field::Collection => &doc.collection,
                };
                match op {
                    CompareOp::Eq => actual == value,
                    CompareOp::Ne => actual != value,
                    CompareOp::Like => like_match(value, actual),
                    CompareOp::NotLike => !like_match(value, actual),
                }
            }
            Filter::And(a, b) => a.matches(doc) && b.matches(doc),
            Filter::Or(a, b) => a.matches(doc) || b.matches(doc),
            Filter::Not(inner) => !inner.matches(doc),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    bail!("expected '=' after '!' in filter");
                }
                tokens.push(Token::Ne);
            }
            '<' => {
                chars.next();
                if chars.next() != Some('>') {
                    bail!("only '<>' is supported after '<' in filter");
                }
                tokens.push(Token::Ne);
            }
            '\'' => {
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        // '' is an escaped quote
                        Some('\'') if chars.peek() == Some(&'\'') => {
                            chars.next();
                            literal.push('\'');
                        }
                        Some('\'') => break,
                        Some(ch) => literal.push(ch),
                        None => bail!("unterminated string literal in filter"),
                    }
                }
                tokens.push(Token::Str(literal));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => bail!("unexpected character '{}' in filter", other),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Ident(s)) if s.eq_ignore_ascii_case(keyword))
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse_or(&mut self) -> Result<Filter> {
        let mut left = self.parse_and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Filter::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Filter> {
        let mut left = self.parse_term()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let right = self.parse_term()?;
            left = Filter::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Filter> {
        if self.peek_keyword("not") {
            self.pos += 1;
            return Ok(Filter::Not(Box::new(self.parse_term()?)));
        }

        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => bail!("missing ')' in filter"),
                }
            }
            Some(Token::Ident(name)) => {
                let field = match name.to_lowercase().as_str() {
                    "filename" => Field::Filename,
                    "filepath" => Field::Filepath,
                    "content" => Field::Content,
                    "collection" => Field::Collection,
                    other => bail!("unknown filter field '{}'", other),
                };
                let op = match self.next() {
                    Some(Token::Eq) => CompareOp::Eq,
                    Some(Token::Ne) => CompareOp::Ne,
                    Some(Token::Ident(kw)) if kw.eq_ignore_ascii_case("like") => CompareOp::Like,
                    Some(Token::Ident(kw)) if kw.eq_ignore_ascii_case("not") => match self.next() {
                        Some(Token::Ident(kw)) if kw.eq_ignore_ascii_case("like") => CompareOp::NotLike,
                        _ => bail!("expected LIKE after NOT in filter"),
                    },
                    other => bail!("expected comparison operator after '{}', found {:?}", name, other),
                };
                match self.next() {
                    Some(Token::Str(value)) => Ok(Filter::Compare { field, op, value }),
                    other => Err(anyhow!("expected string literal, found {:?}", other)),
                }
            }
            other => bail!("unexpected token {:?} in filter", other),
        }
    }
}

/// SQL LIKE matching (`%` = any run, `_` = exactly one character).
///
/// Iterative with backtracking to the last `%`, so long texts and patterns
/// with many `%` stay linear in stack and O(n·m) in time.
fn like_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // pattern index after the last `%`, and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                p += 1;
                backtrack = Some((p, t));
            }
            Some('_') => {
                p += 1;
                t += 1;
            }
            Some(&c) if c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((after_wildcard, tried)) => {
                    p = after_wildcard;
                    t = tried + 1;
                    backtrack = Some((after_wildcard, t));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(filename: &str) -> Document {
        Document {
            filename: filename.to_string(),
            filepath: format!("dataset/annual_reports/{}", filename),
            content: "Net profit rose in 2022".to_string(),
            vector: vec![],
            collection: "annual_reports".to_string(),
        }
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("%2022%", "AnnualReport_2022.pdf"));
        assert!(like_match("Annual%", "AnnualReport_2022.pdf"));
        assert!(!like_match("Annual%", "QuarterlyReport.pdf"));
        assert!(like_match("Q_.pdf", "Q3.pdf"));
        assert!(!like_match("Q_.pdf", "Q12.pdf"));
        assert!(like_match("%", ""));
        assert!(like_match("%%_", "x"));
        assert!(!like_match("_", ""));
        assert!(like_match("a%b%c", "aXbYbZc"));
        assert!(!like_match("a%b%c", "aXbYbZ"));
    }

    #[test]
    fn test_like_match_long_text_and_many_wildcards() {
        let long = "a".repeat(400_000);
        assert!(!like_match("%zzz", &long));
        assert!(like_match("%aaa", &long));

        let short = "a".repeat(60);
        assert!(!like_match("%a%a%a%a%a%a%a%b", &short));
        assert!(like_match("%a%a%a%a%a%a%a%", &short));
    }

    #[test]
    fn test_long_content_filter() {
        let mut d = doc("big.txt");
        d.content = "a".repeat(400_000);
        let filter = Filter::parse("content LIKE '%zzz'").unwrap();
        assert!(!filter.matches(&d));
        let filter = Filter::parse("content NOT LIKE '%a%a%a%b'").unwrap();
        assert!(filter.matches(&d));
    }

    #[test]
    fn test_parse_and_evaluate() {
        let filter = Filter::parse("filename LIKE '%2022%'").unwrap();
        assert!(filter.matches(&doc("report_2022.pdf")));
        assert!(!filter.matches(&doc("report_2021.pdf")));

        let filter = Filter::parse("filename like '%2022%' and not (collection = 'store_reports')").unwrap();
        assert!(filter.matches(&doc("report_2022.pdf")));

        let filter = Filter::parse("filename = 'a.pdf' OR filename = 'b.pdf' AND content != ''").unwrap();
        assert!(filter.matches(&doc("a.pdf")));
        assert!(filter.matches(&doc("b.pdf")));
        assert!(!filter.matches(&doc("c.pdf")));

        let filter = Filter::parse("filename NOT LIKE '%.pdf'").unwrap();
        assert!(!filter.matches(&doc("x.pdf")));
    }

    #[test]
    fn test_escaped_quote() {
        let filter = Filter::parse("filename = 'o''brien.pdf'").unwrap();
        assert!(filter.matches(&doc("o'brien.pdf")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Filter::parse("vector = 'x'").is_err());
        assert!(Filter::parse("filename LIKE").is_err());
        assert!(Filter::parse("filename = 'unterminated").is_err());
        assert!(Filter::parse("(filename = 'a'").is_err());
        assert!(Filter::parse("filename = 'a' filename").is_err());
    }
}
