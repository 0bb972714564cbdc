//! Statement parser. Walks the token stream with position/peek/rewind and
//! populates a [`Query`] through the builder, so every builder invariant
//! (alias binding, duplicate names, join/ON pairing) also guards parsed
//! statements.

use serde_json::Value;

use super::lexer::{Lexer, Token};
use crate::error::{FqlError, FqlResult};
use crate::functions::Arg;
use crate::query::{ComparisonOp, LogicalOp, Query, SortMode};
use crate::value::coerce_scalar;

/// Parse a statement into a query. Parsing never touches the filesystem;
/// file sources are opened at execute time.
pub fn parse(input: &str) -> FqlResult<Query> {
    let tokens = Lexer::new(input).tokenize()?;
    Parser { tokens, position: 0 }.parse_statement()
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn rewind(&mut self) {
        self.position = self.position.saturating_sub(1);
    }

    fn take(&mut self) -> Token {
        let token = self.current().clone();
        self.advance();
        token
    }

    fn expect(&mut self, expected: Token) -> FqlResult<()> {
        if *self.current() == expected {
            self.advance();
            Ok(())
        } else {
            Err(FqlError::ParseError(format!(
                "expected {:?}, found {:?}",
                expected,
                self.current()
            )))
        }
    }

    fn expect_identifier(&mut self) -> FqlResult<String> {
        match self.take() {
            Token::Identifier(name) => Ok(name),
            other => Err(FqlError::ParseError(format!(
                "expected identifier, found {:?}",
                other
            ))),
        }
    }

    fn expect_integer(&mut self) -> FqlResult<i64> {
        match self.take() {
            Token::Integer(n) => Ok(n),
            other => Err(FqlError::ParseError(format!(
                "expected integer, found {:?}",
                other
            ))),
        }
    }

    fn parse_statement(&mut self) -> FqlResult<Query> {
        let mut query = Query::new();

        self.expect(Token::Select)?;
        self.parse_select_list(&mut query)?;

        self.expect(Token::From)?;
        self.parse_source(&mut query)?;
        self.parse_joins(&mut query)?;

        if *self.current() == Token::Where {
            self.advance();
            self.parse_conditions(&mut query, false)?;
        }
        if *self.current() == Token::Group {
            self.advance();
            self.expect(Token::By)?;
            loop {
                let field = self.expect_identifier()?;
                query.group_by(&field);
                if *self.current() == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if *self.current() == Token::Having {
            self.advance();
            self.parse_conditions(&mut query, true)?;
        }
        if *self.current() == Token::Order {
            self.advance();
            self.expect(Token::By)?;
            self.parse_order_list(&mut query)?;
        }
        self.parse_window(&mut query)?;

        match self.current() {
            Token::Eof => Ok(query),
            other => Err(FqlError::ParseError(format!(
                "unexpected token at end of statement: {:?}",
                other
            ))),
        }
    }

    fn parse_select_list(&mut self, query: &mut Query) -> FqlResult<()> {
        if *self.current() == Token::Distinct {
            self.advance();
            query.distinct();
        }
        loop {
            match self.take() {
                Token::Star => {
                    query.select_all();
                }
                Token::Identifier(field) => {
                    query.select(&field)?;
                }
                Token::Function { name, args } => {
                    query.call(&name, parse_call_args(&args)?)?;
                }
                other => {
                    return Err(FqlError::ParseError(format!(
                        "unexpected token in select list: {:?}",
                        other
                    )))
                }
            }
            if *self.current() == Token::As {
                self.advance();
                let alias = self.expect_identifier()?;
                query.alias(&alias)?;
            }
            if *self.current() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        Ok(())
    }

    fn parse_source(&mut self, query: &mut Query) -> FqlResult<()> {
        match self.take() {
            Token::Paren { content, selector } => {
                query.source_path = Some(content);
                if let Some(sel) = selector {
                    query.from(&sel);
                }
                Ok(())
            }
            // A bare selector; the caller binds the source separately.
            Token::Identifier(selector) => {
                query.from(&selector);
                Ok(())
            }
            Token::Star => Ok(()),
            other => Err(FqlError::ParseError(format!(
                "expected a source after FROM, found {:?}",
                other
            ))),
        }
    }

    fn parse_joins(&mut self, query: &mut Query) -> FqlResult<()> {
        loop {
            let kind = match self.current() {
                Token::Inner => {
                    self.advance();
                    self.expect(Token::Join)?;
                    true
                }
                Token::Left => {
                    self.advance();
                    self.expect(Token::Join)?;
                    false
                }
                _ => break,
            };

            let mut right = Query::new();
            self.parse_source(&mut right)?;

            let alias = if *self.current() == Token::As {
                self.advance();
                Some(self.expect_identifier()?)
            } else {
                None
            };

            self.expect(Token::On)?;
            let left_key = self.expect_identifier()?;
            let op = self.parse_operator()?;
            let right_key = match self.take() {
                Token::Identifier(name) => name,
                Token::Str(name) => name,
                other => {
                    return Err(FqlError::ParseError(format!(
                        "expected a join key after the operator, found {:?}",
                        other
                    )))
                }
            };

            if kind {
                query.inner_join(right, alias.as_deref());
            } else {
                query.left_join(right, alias.as_deref());
            }
            query.on(&left_key, op, &right_key)?;
        }
        Ok(())
    }

    fn parse_conditions(&mut self, query: &mut Query, having: bool) -> FqlResult<()> {
        let mut first = true;
        loop {
            let link = if first {
                first = false;
                LogicalOp::And
            } else {
                match self.current() {
                    Token::And => {
                        self.advance();
                        LogicalOp::And
                    }
                    Token::Or => {
                        self.advance();
                        LogicalOp::Or
                    }
                    Token::Xor => {
                        self.advance();
                        LogicalOp::Xor
                    }
                    _ => break,
                }
            };

            let field = self.expect_identifier()?;
            let op = self.parse_operator()?;
            let value = self.parse_literal()?;

            match (having, link) {
                (false, LogicalOp::And) => {
                    query.where_(&field, op, value);
                }
                (false, LogicalOp::Or) => {
                    query.or(&field, op, value);
                }
                (false, LogicalOp::Xor) => {
                    query.xor(&field, op, value);
                }
                (true, LogicalOp::And) => {
                    query.having(&field, op, value);
                }
                (true, LogicalOp::Or) => {
                    query.or(&field, op, value);
                }
                (true, LogicalOp::Xor) => {
                    query.xor(&field, op, value);
                }
            }
        }
        Ok(())
    }

    fn parse_operator(&mut self) -> FqlResult<ComparisonOp> {
        match self.take() {
            Token::Eq => Ok(ComparisonOp::Eq),
            Token::NotEq => Ok(ComparisonOp::NotEq),
            Token::LessThan => Ok(ComparisonOp::Lt),
            Token::LessThanEq => Ok(ComparisonOp::LtEq),
            Token::GreaterThan => Ok(ComparisonOp::Gt),
            Token::GreaterThanEq => Ok(ComparisonOp::GtEq),
            Token::Like => Ok(ComparisonOp::Like),
            Token::In => Ok(ComparisonOp::In),
            Token::Is => {
                if *self.current() == Token::Not {
                    self.advance();
                    Ok(ComparisonOp::IsNot)
                } else {
                    Ok(ComparisonOp::Is)
                }
            }
            Token::Not => match self.take() {
                Token::Like => Ok(ComparisonOp::NotLike),
                Token::In => Ok(ComparisonOp::NotIn),
                other => Err(FqlError::ParseError(format!(
                    "expected LIKE or IN after NOT, found {:?}",
                    other
                ))),
            },
            other => Err(FqlError::ParseError(format!(
                "expected a comparison operator, found {:?}",
                other
            ))),
        }
    }

    fn parse_literal(&mut self) -> FqlResult<Value> {
        match self.take() {
            Token::Integer(n) => Ok(Value::from(n)),
            Token::Float(f) => Ok(Value::from(f)),
            Token::Str(s) => Ok(Value::String(s)),
            Token::True => Ok(Value::Bool(true)),
            Token::False => Ok(Value::Bool(false)),
            Token::Null => Ok(Value::Null),
            // IN list: (1, 2, 3) or ('a', 'b')
            Token::Paren { content, selector } if selector.is_none() => {
                let items = split_top_level(&content)
                    .into_iter()
                    .map(|item| literal_from_raw(item.trim()))
                    .collect::<FqlResult<Vec<_>>>()?;
                Ok(Value::Array(items))
            }
            other => Err(FqlError::ParseError(format!(
                "expected a literal, found {:?}",
                other
            ))),
        }
    }

    fn parse_order_list(&mut self, query: &mut Query) -> FqlResult<()> {
        loop {
            let field = self.expect_identifier()?;
            let mode = match self.take() {
                Token::Asc => SortMode::Asc,
                Token::Desc => SortMode::Desc,
                Token::Natsort => SortMode::Natsort,
                Token::Shuffle => SortMode::Shuffle,
                Token::Identifier(word) => {
                    // keyword-looking identifiers surface as sort errors
                    return Err(FqlError::SortError(format!("unknown sort mode '{}'", word)));
                }
                _ => {
                    self.rewind();
                    SortMode::Asc
                }
            };
            query.order_by(&field, mode);
            if *self.current() == Token::Comma {
                self.advance();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// `LIMIT n [OFFSET m]`, `LIMIT offset,n` or a bare `OFFSET n`.
    fn parse_window(&mut self, query: &mut Query) -> FqlResult<()> {
        if *self.current() == Token::Limit {
            self.advance();
            let first = self.expect_integer()?;
            if *self.current() == Token::Comma {
                self.advance();
                let count = self.expect_integer()?;
                query.limit_offset(count.max(0) as usize, first.max(0) as usize);
            } else if *self.current() == Token::Offset {
                self.advance();
                let offset = self.expect_integer()?;
                query.limit_offset(first.max(0) as usize, offset.max(0) as usize);
            } else {
                query.limit(first.max(0) as usize);
            }
        } else if *self.current() == Token::Offset {
            self.advance();
            let offset = self.expect_integer()?;
            query.offset(offset.max(0) as usize);
        }
        Ok(())
    }
}

/// Split raw argument text on commas outside quotes and parentheses.
fn split_top_level(raw: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in raw.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '(' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                ',' if depth == 0 => {
                    parts.push(std::mem::take(&mut current));
                }
                _ => current.push(ch),
            },
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

fn literal_from_raw(raw: &str) -> FqlResult<Value> {
    if raw.len() >= 2
        && ((raw.starts_with('\'') && raw.ends_with('\''))
            || (raw.starts_with('"') && raw.ends_with('"')))
    {
        return Ok(Value::String(raw[1..raw.len() - 1].to_string()));
    }
    Ok(coerce_scalar(raw))
}

/// Function-call arguments: quoted strings and numbers are literals,
/// everything else is a field reference.
fn parse_call_args(raw: &str) -> FqlResult<Vec<Arg>> {
    let mut args = Vec::new();
    for part in split_top_level(raw) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let quoted = part.len() >= 2
            && ((part.starts_with('\'') && part.ends_with('\''))
                || (part.starts_with('"') && part.ends_with('"')));
        if quoted {
            args.push(Arg::Literal(Value::String(
                part[1..part.len() - 1].to_string(),
            )));
        } else if part == "*" {
            args.push(Arg::Field("*".to_string()));
        } else {
            match coerce_scalar(part) {
                Value::String(_) => args.push(Arg::Field(part.to_string())),
                literal => args.push(Arg::Literal(literal)),
            }
        }
    }
    Ok(args)
}
