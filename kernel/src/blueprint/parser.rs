//! Recursive-descent parser over the Blueprint surface syntax (spec §4.2).
//!
//! Grounded on the teacher's `physics/canonical_json.rs` parser shape (a
//! `Parser` struct walking a token/byte stream with `peek`/`advance`/
//! `expect` helpers, reporting a structured error rather than panicking) —
//! generalized from a single fixed grammar to the richer Blueprint grammar,
//! and extended with statement-boundary error recovery per spec §4.2
//! ("the parser recovers at statement boundaries and continues to report
//! additional errors").

use super::ast::*;
use super::lexer::{Lexer, Pos, Spanned, Token};
use crate::value::Dimension;

/// A single recovered parse error: `{line, column, phase, message}` (spec §4.2).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub phase: String,
    pub message: String,
}

pub struct Parser {
    tokens: Vec<Spanned>,
    idx: usize,
    errors: Vec<ParseError>,
}

/// Parse a Blueprint source string. Always returns the accumulated errors;
/// the AST is `Some` only if the top-level structure parsed well enough to
/// produce a complete blueprint (spec §4.2: "partial blueprints are not
/// admitted").
pub fn parse_blueprint(source: &str) -> (Option<BlueprintAst>, Vec<ParseError>) {
    let tokens = match Lexer::new(source).tokenize() {
        Ok(t) => t,
        Err(e) => {
            return (
                None,
                vec![ParseError {
                    line: e.pos.line,
                    column: e.pos.column,
                    phase: "lex".into(),
                    message: e.message,
                }],
            );
        }
    };
    let mut parser = Parser { tokens, idx: 0, errors: Vec::new() };
    let ast = parser.parse_top();
    (ast, parser.errors)
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.idx.min(self.tokens.len() - 1)].token
    }

    fn pos(&self) -> Pos {
        self.tokens[self.idx.min(self.tokens.len() - 1)].pos
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.idx < self.tokens.len() - 1 {
            self.idx += 1;
        }
        t
    }

    fn at_ident(&self, text: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s == text)
    }

    fn error(&mut self, phase: &str, message: impl Into<String>) {
        let pos = self.pos();
        self.errors.push(ParseError {
            line: pos.line,
            column: pos.column,
            phase: phase.into(),
            message: message.into(),
        });
    }

    fn expect_ident(&mut self, text: &str, phase: &str) -> bool {
        if self.at_ident(text) {
            self.advance();
            true
        } else {
            self.error(phase, format!("expected `{text}`, found {:?}", self.peek()));
            false
        }
    }

    fn expect_token(&mut self, tok: Token, phase: &str) -> bool {
        if *self.peek() == tok {
            self.advance();
            true
        } else {
            self.error(phase, format!("expected {:?}, found {:?}", tok, self.peek()));
            false
        }
    }

    fn take_ident_name(&mut self, phase: &str) -> Option<String> {
        match self.peek().clone() {
            Token::Ident(s) => {
                self.advance();
                Some(s)
            }
            _ => {
                self.error(phase, format!("expected identifier, found {:?}", self.peek()));
                None
            }
        }
    }

    fn parse_type_name(&mut self, phase: &str) -> Option<Dimension> {
        let name = self.take_ident_name(phase)?;
        match Dimension::from_type_name(&name) {
            Some(d) => Some(d),
            None => {
                self.error(phase, format!("unknown type `{name}`"));
                None
            }
        }
    }

    /// Skip tokens until the next top-level section keyword or the
    /// blueprint's closing `end`, to resynchronize after an error.
    fn recover_to_top_level(&mut self) {
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::Ident(s) if matches!(s.as_str(), "field" | "law" | "forge" | "end") => {
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip tokens until the next statement boundary inside a forge body.
    fn recover_to_stmt_boundary(&mut self) {
        loop {
            match self.peek() {
                Token::Eof => return,
                Token::Ident(s) if s == "end" => return,
                Token::Field(_) => return,
                Token::Ident(s) if matches!(s.as_str(), "memo" | "request" | "reply") => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_top(&mut self) -> Option<BlueprintAst> {
        if !self.expect_ident("blueprint", "blueprint") {
            self.recover_to_top_level();
        }
        let name = self.take_ident_name("blueprint").unwrap_or_else(|| "unnamed".to_string());

        let mut fields = Vec::new();
        let mut laws = Vec::new();
        let mut forges = Vec::new();

        loop {
            match self.peek().clone() {
                Token::Ident(s) if s == "field" => {
                    if let Some(f) = self.parse_field() {
                        fields.push(f);
                    }
                }
                Token::Ident(s) if s == "law" => {
                    if let Some(l) = self.parse_law() {
                        laws.push(l);
                    }
                }
                Token::Ident(s) if s == "forge" => {
                    if let Some(f) = self.parse_forge() {
                        forges.push(f);
                    }
                }
                Token::Ident(s) if s == "end" => {
                    self.advance();
                    break;
                }
                Token::Eof => {
                    self.error("blueprint", "unexpected end of input before `end`");
                    break;
                }
                _ => {
                    self.error("blueprint", format!("unexpected token {:?}", self.peek()));
                    self.advance();
                    self.recover_to_top_level();
                }
            }
        }

        if self.errors.is_empty() {
            Some(BlueprintAst { name, fields, laws, forges })
        } else {
            None
        }
    }

    fn parse_field(&mut self) -> Option<Field> {
        let line = self.pos().line;
        self.expect_ident("field", "field");
        let field_name = match self.peek().clone() {
            Token::Field(name) => {
                self.advance();
                name
            }
            _ => {
                self.error("field", "expected `@name` after `field`");
                self.recover_to_top_level();
                return None;
            }
        };
        if !self.expect_token(Token::Colon, "field") {
            self.recover_to_top_level();
            return None;
        }
        let dimension = match self.parse_type_name("field") {
            Some(d) => d,
            None => {
                self.recover_to_top_level();
                return None;
            }
        };
        let default = if self.at_ident("default") {
            self.advance();
            self.parse_expr()
        } else {
            None
        };
        Some(Field { name: field_name, dimension, default, line })
    }

    fn parse_law(&mut self) -> Option<Law> {
        let line = self.pos().line;
        self.expect_ident("law", "law");
        let name = self.take_ident_name("law").unwrap_or_default();
        let mut clauses = Vec::new();
        loop {
            let keyword = if self.at_ident("when") {
                self.advance();
                ClauseKeyword::When
            } else if self.at_ident("and") {
                self.advance();
                ClauseKeyword::And
            } else {
                break;
            };
            let clause_line = self.pos().line;
            match self.parse_cond() {
                Some(cond) => clauses.push(Clause { keyword, cond, line: clause_line }),
                None => {
                    self.recover_to_top_level();
                    return None;
                }
            }
        }
        let outcome = if self.at_ident("fin") {
            self.advance();
            Outcome::Fin
        } else if self.at_ident("finfr") {
            self.advance();
            Outcome::Finfr
        } else {
            self.error("law", "expected `fin` or `finfr`");
            self.recover_to_top_level();
            return None;
        };
        if !self.expect_ident("end", "law") {
            self.recover_to_top_level();
            return None;
        }
        Some(Law { name, clauses, outcome, line })
    }

    fn parse_cond(&mut self) -> Option<Cond> {
        if self.at_ident("request") {
            self.advance();
            if !self.expect_ident("is", "law") {
                return None;
            }
            match self.peek().clone() {
                Token::Symbol(s) => {
                    self.advance();
                    Some(Cond::RequestIs(s))
                }
                _ => {
                    self.error("law", "expected `:symbol` after `is`");
                    None
                }
            }
        } else {
            let expr = self.parse_expr()?;
            Some(Cond::Bool(expr))
        }
    }

    fn parse_forge(&mut self) -> Option<Forge> {
        let line = self.pos().line;
        self.expect_ident("forge", "forge");
        let name = self.take_ident_name("forge").unwrap_or_default();
        if !self.expect_token(Token::LParen, "forge") {
            self.recover_to_top_level();
            return None;
        }
        let mut params = Vec::new();
        if *self.peek() != Token::RParen {
            loop {
                let pname = self.take_ident_name("forge")?;
                if !self.expect_token(Token::Colon, "forge") {
                    return None;
                }
                let dim = self.parse_type_name("forge")?;
                params.push(Param { name: pname, dimension: dim });
                if *self.peek() == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if !self.expect_token(Token::RParen, "forge") {
            self.recover_to_top_level();
            return None;
        }
        let result_dimension = if *self.peek() == Token::Arrow {
            self.advance();
            self.parse_type_name("forge")
        } else {
            None
        };

        let mut body = Vec::new();
        loop {
            match self.peek().clone() {
                Token::Ident(s) if s == "end" => {
                    self.advance();
                    break;
                }
                Token::Eof => {
                    self.error("forge", "unexpected end of input before `end`");
                    break;
                }
                _ => match self.parse_stmt() {
                    Some(stmt) => body.push(stmt),
                    None => self.recover_to_stmt_boundary(),
                },
            }
        }
        Some(Forge { name, params, result_dimension, body, line })
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        let line = self.pos().line;
        match self.peek().clone() {
            Token::Field(name) => {
                self.advance();
                if !self.expect_token(Token::Eq, "forge") {
                    return None;
                }
                let expr = self.parse_expr()?;
                Some(Stmt::FieldAssign { field: name, expr, line })
            }
            Token::Ident(s) if s == "memo" => {
                self.advance();
                let name = self.take_ident_name("forge")?;
                if !self.expect_token(Token::Eq, "forge") {
                    return None;
                }
                let expr = self.parse_expr()?;
                Some(Stmt::Memo { name, expr, line })
            }
            Token::Ident(s) if s == "request" => {
                self.advance();
                if !self.expect_token(Token::Eq, "forge") {
                    return None;
                }
                match self.peek().clone() {
                    Token::Symbol(sym) => {
                        self.advance();
                        Some(Stmt::RequestSet { symbol: sym, line })
                    }
                    _ => {
                        self.error("forge", "expected `:symbol` after `request =`");
                        None
                    }
                }
            }
            Token::Ident(s) if s == "reply" => {
                self.advance();
                let expr = self.parse_expr()?;
                Some(Stmt::Reply { expr, line })
            }
            _ => {
                let expr = self.parse_expr()?;
                Some(Stmt::Expr { expr, line })
            }
        }
    }

    // ── Expression parsing (precedence climbing) ──────────────────────────

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Ge,
            Token::EqEq => BinOp::Eq,
            _ => return Some(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Some(Expr::BinOp(Box::new(lhs), op, Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::BinOp(Box::new(lhs), op, Box::new(rhs));
        }
        Some(lhs)
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_primary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_primary()?;
            lhs = Expr::BinOp(Box::new(lhs), op, Box::new(rhs));
        }
        Some(lhs)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Some(Expr::Number(n))
            }
            Token::Str(s) => {
                self.advance();
                Some(Expr::StringLit(s))
            }
            Token::Symbol(s) => {
                self.advance();
                Some(Expr::SymbolLit(s))
            }
            Token::Field(name) => {
                self.advance();
                Some(Expr::Field(name))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_token(Token::RParen, "expr");
                Some(inner)
            }
            Token::Ident(name) => {
                self.advance();
                if *self.peek() == Token::LParen {
                    self.advance();
                    let mut args = Vec::new();
                    if *self.peek() != Token::RParen {
                        loop {
                            args.push(self.parse_expr()?);
                            if *self.peek() == Token::Comma {
                                self.advance();
                            } else {
                                break;
                            }
                        }
                    }
                    self.expect_token(Token::RParen, "expr");
                    Some(Expr::Call(name, args))
                } else {
                    Some(Expr::Ident(name))
                }
            }
            _ => {
                self.error("expr", format!("unexpected token {:?}", self.peek()));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bank_account_blueprint() {
        let src = r#"
            blueprint BankAccount
                field @balance: Money default Money(100)

                law NoOverdraft
                    when @balance < Money(0)
                    finfr
                end

                forge withdraw(amount: Money) -> Text
                    @balance = @balance - amount
                    reply "Withdrew"
                end
            end
        "#;
        let (ast, errors) = parse_blueprint(src);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        let ast = ast.expect("blueprint should parse");
        assert_eq!(ast.name, "BankAccount");
        assert_eq!(ast.fields.len(), 1);
        assert_eq!(ast.laws.len(), 1);
        assert_eq!(ast.forges.len(), 1);
        assert_eq!(ast.laws[0].outcome, Outcome::Finfr);
    }

    #[test]
    fn parses_request_is_clause() {
        let src = r#"
            blueprint StatsSovereign
                field @count: Count default Count(0)
                field @sum: Real default Real(0)

                law NoDivByZero
                    when request is :mean
                    and @count == Count(0)
                    finfr
                end

                forge mean() -> Real
                    request = :mean
                    reply @sum / @count
                end
            end
        "#;
        let (ast, errors) = parse_blueprint(src);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        let ast = ast.unwrap();
        assert_eq!(ast.laws[0].clauses.len(), 2);
        assert_eq!(ast.laws[0].clauses[0].cond, Cond::RequestIs("mean".into()));
    }

    #[test]
    fn reports_multiple_errors_and_recovers() {
        let src = r#"
            blueprint Broken
                field @x: NotARealType
                law L
                    when @x <
                    finfr
                end
            end
        "#;
        let (ast, errors) = parse_blueprint(src);
        assert!(ast.is_none());
        assert!(errors.len() >= 2, "expected multiple recovered errors, got {errors:?}");
    }

    #[test]
    fn parses_ratio_law() {
        let src = r#"
            blueprint Leverage
                field @debt: Money default Money(0)
                field @equity: Money default Money(1000)

                law MaxLeverage
                    when ratio(@debt, @equity) > 3.0
                    finfr
                end

                forge take_loan(amount: Money)
                    @debt = @debt + amount
                end
            end
        "#;
        let (ast, errors) = parse_blueprint(src);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        let ast = ast.unwrap();
        match &ast.laws[0].clauses[0].cond {
            Cond::Bool(Expr::BinOp(lhs, BinOp::Gt, rhs)) => {
                assert!(matches!(**lhs, Expr::Call(ref name, _) if name == "ratio"));
                assert_eq!(**rhs, Expr::Number(3.0));
            }
            other => panic!("unexpected cond: {other:?}"),
        }
    }
}
