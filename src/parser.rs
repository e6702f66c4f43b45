// Precedence-climbing parser. Consumes the lexer's token stream and produces
// the atom tree. Each infix operator carries a pair of binding powers in the
// Pratt style; postfix member/index/call binds tighter than any infix, and
// the keyword constructs (if/case/each/first/define/do) parse as primaries.

use std::rc::Rc;

use crate::ast::{BinOp, CompiledExpression, Node, Qualifier, UnOp};
use crate::error::ParseError;
use crate::lexer::{Lexer, Tok, Token};
use crate::scope::assignable;
use crate::value::Value;

/// Cap on parser recursion so pathological nesting fails cleanly instead of
/// overflowing the stack.
const MAX_NESTING: usize = 200;

/// Binding power of prefix operators (operand side).
const UNARY_BP: u8 = 170;
/// Right-side binding power of the ternary else branch (right-associative).
const TERNARY_RBP: u8 = 39;
/// Right-side binding power of assignment (right-associative).
const ASSIGN_RBP: u8 = 29;

/// Compile source text into a reusable expression.
pub fn compile(source: &str) -> Result<CompiledExpression, ParseError> {
    let mut parser = Parser::new(source)?;
    let root = parser.parse_program()?;
    Ok(CompiledExpression::new(root, source))
}

pub struct Parser {
    lexer: Lexer,
    current: Token,
    depth: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current,
            depth: 0,
        })
    }

    fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn describe(tok: &Tok) -> String {
        format!("{:?}", tok)
    }

    fn expect(&mut self, expected: Tok, what: &str) -> Result<(), ParseError> {
        if self.current.tok == expected {
            self.advance()
        } else if self.current.tok == Tok::Eof {
            Err(ParseError::UnexpectedEnd)
        } else {
            Err(ParseError::Expected {
                expected: what.to_string(),
                found: Self::describe(&self.current.tok),
                offset: self.current.offset,
            })
        }
    }

    fn expect_ident(&mut self) -> Result<(String, usize), ParseError> {
        match &self.current.tok {
            Tok::Ident(name) => {
                let name = name.clone();
                let offset = self.current.offset;
                self.advance()?;
                Ok((name, offset))
            }
            Tok::Eof => Err(ParseError::UnexpectedEnd),
            other => Err(ParseError::Expected {
                expected: "identifier".to_string(),
                found: Self::describe(other),
                offset: self.current.offset,
            }),
        }
    }

    fn eat(&mut self, tok: Tok) -> Result<bool, ParseError> {
        if self.current.tok == tok {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// The whole source is a List of separator-joined expressions.
    fn parse_program(&mut self) -> Result<Node, ParseError> {
        let items = self.parse_list(&[Tok::Eof])?;
        if self.current.tok != Tok::Eof {
            return Err(ParseError::Expected {
                expected: "end of expression".to_string(),
                found: Self::describe(&self.current.tok),
                offset: self.current.offset,
            });
        }
        Ok(Node::List(items))
    }

    /// Parse expressions separated by `,`/`;` until one of `terms` (or end of
    /// input) is next. The terminator itself is left for the caller.
    fn parse_list(&mut self, terms: &[Tok]) -> Result<Vec<Node>, ParseError> {
        let mut items = Vec::new();
        loop {
            while matches!(self.current.tok, Tok::Comma | Tok::Semicolon) {
                self.advance()?;
            }
            if self.current.tok == Tok::Eof || terms.contains(&self.current.tok) {
                break;
            }
            items.push(self.parse_expression(0)?);
            if !matches!(self.current.tok, Tok::Comma | Tok::Semicolon) {
                break;
            }
        }
        Ok(items)
    }

    /// Left and right binding powers of the infix operators, tightest first.
    fn infix_power(tok: &Tok) -> Option<(u8, u8)> {
        Some(match tok {
            Tok::StarStar => (160, 159), // right-associative
            Tok::Star | Tok::Slash | Tok::Percent => (150, 151),
            Tok::Plus | Tok::Minus => (140, 141),
            Tok::Shl | Tok::Shr | Tok::Ushr => (130, 131),
            Tok::In | Tok::DotDot | Tok::Lt | Tok::Le | Tok::Gt | Tok::Ge => (120, 121),
            Tok::EqEq | Tok::EqEqEq | Tok::Ne | Tok::NeStrict | Tok::LtGt => (110, 111),
            Tok::Amp => (100, 101),
            Tok::Caret => (90, 91),
            Tok::Pipe => (80, 81),
            Tok::AmpAmp => (70, 71),
            Tok::PipePipe => (60, 61),
            Tok::Coalesce | Tok::NumCoalesce => (50, 51),
            Tok::Question => (40, TERNARY_RBP),
            Tok::Assign => (30, ASSIGN_RBP),
            _ => return None,
        })
    }

    fn binop_for(tok: &Tok) -> BinOp {
        match tok {
            Tok::StarStar => BinOp::Pow,
            Tok::Star => BinOp::Mul,
            Tok::Slash => BinOp::Div,
            Tok::Percent => BinOp::Mod,
            Tok::Plus => BinOp::Add,
            Tok::Minus => BinOp::Sub,
            Tok::Shl => BinOp::Shl,
            Tok::Shr => BinOp::Shr,
            Tok::Ushr => BinOp::Ushr,
            Tok::In => BinOp::In,
            Tok::DotDot => BinOp::Range,
            Tok::Lt => BinOp::Lt,
            Tok::Le => BinOp::Le,
            Tok::Gt => BinOp::Gt,
            Tok::Ge => BinOp::Ge,
            Tok::EqEq => BinOp::Eq,
            Tok::EqEqEq => BinOp::StrictEq,
            Tok::Ne => BinOp::Ne,
            Tok::NeStrict => BinOp::StrictNe,
            Tok::LtGt => BinOp::Ne,
            Tok::Amp => BinOp::BitAnd,
            Tok::Caret => BinOp::BitXor,
            Tok::Pipe => BinOp::BitOr,
            Tok::AmpAmp => BinOp::And,
            Tok::PipePipe => BinOp::Or,
            Tok::Coalesce => BinOp::Coalesce,
            Tok::NumCoalesce => BinOp::NumCoalesce,
            other => unreachable!("no binary operator for {:?}", other),
        }
    }

    fn parse_expression(&mut self, min_bp: u8) -> Result<Node, ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            self.depth -= 1;
            return Err(ParseError::TooDeep { max: MAX_NESTING });
        }
        let result = self.parse_expression_inner(min_bp);
        self.depth -= 1;
        result
    }

    fn parse_expression_inner(&mut self, min_bp: u8) -> Result<Node, ParseError> {
        let mut lhs = self.parse_primary()?;

        loop {
            match &self.current.tok {
                // Postfix member access binds tighter than any infix operator.
                Tok::Dot | Tok::QuestionDot => {
                    let null_safe = self.current.tok == Tok::QuestionDot;
                    self.advance()?;
                    let (name, _) = self.expect_ident()?;
                    lhs = Node::Deref {
                        scope: Box::new(lhs),
                        member: Box::new(Node::Literal(Value::string(name))),
                        null_safe,
                    };
                }
                Tok::LBracket | Tok::QuestionBracket => {
                    let null_safe = self.current.tok == Tok::QuestionBracket;
                    let open = self.current.offset;
                    self.advance()?;
                    let member = self.parse_expression(0)?;
                    self.close_group(Tok::RBracket, '[', open)?;
                    lhs = Node::Deref {
                        scope: Box::new(lhs),
                        member: Box::new(member),
                        null_safe,
                    };
                }
                Tok::LParen => {
                    let open = self.current.offset;
                    let name = match &lhs {
                        Node::VarRef(name) => name.clone(),
                        _ => {
                            return Err(ParseError::Expected {
                                expected: "function name before argument list".to_string(),
                                found: "'('".to_string(),
                                offset: open,
                            })
                        }
                    };
                    self.advance()?;
                    let mut args = Vec::new();
                    if self.current.tok != Tok::RParen {
                        loop {
                            args.push(self.parse_expression(0)?);
                            if !self.eat(Tok::Comma)? {
                                break;
                            }
                        }
                    }
                    self.close_group(Tok::RParen, '(', open)?;
                    lhs = Node::Call { name, args };
                }
                _ => {
                    let Some((lbp, rbp)) = Self::infix_power(&self.current.tok) else {
                        break;
                    };
                    if lbp < min_bp {
                        break;
                    }

                    match self.current.tok {
                        // Ternary sugar: folded into an If atom.
                        Tok::Question => {
                            self.advance()?;
                            let then = self.parse_expression(0)?;
                            self.expect(Tok::Colon, "':'")?;
                            let otherwise = self.parse_expression(rbp)?;
                            lhs = Node::If {
                                test: Box::new(lhs),
                                then: Box::new(then),
                                elifs: Vec::new(),
                                otherwise: Some(Box::new(otherwise)),
                            };
                        }
                        Tok::Assign => {
                            let offset = self.current.offset;
                            self.advance()?;
                            self.check_target(&lhs, offset)?;
                            let value = self.parse_expression(rbp)?;
                            lhs = Node::Assign {
                                target: Box::new(lhs),
                                value: Box::new(value),
                                qualifier: Qualifier::None,
                            };
                        }
                        _ => {
                            let op = Self::binop_for(&self.current.tok);
                            self.advance()?;
                            let rhs = self.parse_expression(rbp)?;
                            lhs = Node::Binary {
                                op,
                                lhs: Box::new(lhs),
                                rhs: Box::new(rhs),
                            };
                        }
                    }
                }
            }
        }

        Ok(lhs)
    }

    /// Close a bracketed group, reporting an unmatched-group error when the
    /// input ends first.
    fn close_group(&mut self, closer: Tok, open: char, open_offset: usize) -> Result<(), ParseError> {
        if self.current.tok == Tok::Eof {
            return Err(ParseError::UnmatchedGroup {
                open,
                offset: open_offset,
            });
        }
        let what = match open {
            '(' => "')'",
            '[' => "']'",
            _ => "'}'",
        };
        self.expect(closer, what)
    }

    fn check_target(&self, target: &Node, offset: usize) -> Result<(), ParseError> {
        match target {
            Node::VarRef(name) => {
                if assignable(name) {
                    Ok(())
                } else {
                    Err(ParseError::ReservedName {
                        name: name.clone(),
                        offset,
                    })
                }
            }
            Node::Deref { .. } => Ok(()),
            _ => Err(ParseError::InvalidTarget { offset }),
        }
    }

    fn parse_primary(&mut self) -> Result<Node, ParseError> {
        let offset = self.current.offset;
        match self.current.tok.clone() {
            Tok::Number(n) => {
                self.advance()?;
                Ok(Node::Literal(Value::Number(n)))
            }
            Tok::Str(s) => {
                self.advance()?;
                Ok(Node::Literal(Value::string(s)))
            }
            Tok::True => {
                self.advance()?;
                Ok(Node::Literal(Value::Bool(true)))
            }
            Tok::False => {
                self.advance()?;
                Ok(Node::Literal(Value::Bool(false)))
            }
            Tok::Null => {
                self.advance()?;
                Ok(Node::Literal(Value::Null))
            }
            Tok::Ident(name) => {
                self.advance()?;
                Ok(Node::VarRef(name))
            }
            Tok::Minus => {
                self.advance()?;
                let operand = self.parse_expression(UNARY_BP)?;
                // Negative number literals fold directly.
                if let Node::Literal(Value::Number(n)) = operand {
                    Ok(Node::Literal(Value::Number(-n)))
                } else {
                    Ok(Node::Unary {
                        op: UnOp::Neg,
                        operand: Box::new(operand),
                    })
                }
            }
            // Unary plus is the identity.
            Tok::Plus => {
                self.advance()?;
                self.parse_expression(UNARY_BP)
            }
            Tok::Bang => {
                self.advance()?;
                let operand = self.parse_expression(UNARY_BP)?;
                Ok(Node::Unary {
                    op: UnOp::Not,
                    operand: Box::new(operand),
                })
            }
            Tok::Tilde => {
                self.advance()?;
                let operand = self.parse_expression(UNARY_BP)?;
                Ok(Node::Unary {
                    op: UnOp::BitNot,
                    operand: Box::new(operand),
                })
            }
            Tok::LParen => {
                self.advance()?;
                let mut items = self.parse_list(&[Tok::RParen])?;
                self.close_group(Tok::RParen, '(', offset)?;
                if items.len() == 1 {
                    Ok(items.remove(0))
                } else {
                    Ok(Node::List(items))
                }
            }
            Tok::LBracket => {
                self.advance()?;
                let mut items = Vec::new();
                if self.current.tok != Tok::RBracket {
                    loop {
                        items.push(self.parse_expression(0)?);
                        if !self.eat(Tok::Comma)? {
                            break;
                        }
                        if self.current.tok == Tok::RBracket {
                            break;
                        }
                    }
                }
                self.close_group(Tok::RBracket, '[', offset)?;
                Ok(Node::ArrayLit(items))
            }
            Tok::LBrace => {
                self.advance()?;
                let mut pairs = Vec::new();
                if self.current.tok != Tok::RBrace {
                    loop {
                        let key = self.parse_object_key()?;
                        self.expect(Tok::Colon, "':'")?;
                        let value = self.parse_expression(0)?;
                        pairs.push((key, value));
                        if !self.eat(Tok::Comma)? {
                            break;
                        }
                        if self.current.tok == Tok::RBrace {
                            break;
                        }
                    }
                }
                self.close_group(Tok::RBrace, '{', offset)?;
                Ok(Node::ObjectLit(pairs))
            }
            Tok::If => self.parse_if(),
            Tok::Case => self.parse_case(),
            Tok::Each => self.parse_each(),
            Tok::First => self.parse_first(),
            Tok::Define => self.parse_define(),
            Tok::Do => self.parse_do(),
            Tok::Local => self.parse_qualified_assign(Qualifier::Local),
            Tok::Global => self.parse_qualified_assign(Qualifier::Global),
            Tok::Eof => Err(ParseError::UnexpectedEnd),
            other => Err(ParseError::UnexpectedToken {
                found: Self::describe(&other),
                offset,
            }),
        }
    }

    /// Object keys: a bare identifier, a quoted string, or a computed
    /// `[expr]` key.
    fn parse_object_key(&mut self) -> Result<Node, ParseError> {
        match self.current.tok.clone() {
            Tok::Ident(name) => {
                self.advance()?;
                Ok(Node::Literal(Value::string(name)))
            }
            Tok::Str(s) => {
                self.advance()?;
                Ok(Node::Literal(Value::string(s)))
            }
            Tok::LBracket => {
                let open = self.current.offset;
                self.advance()?;
                let key = self.parse_expression(0)?;
                self.close_group(Tok::RBracket, '[', open)?;
                Ok(key)
            }
            Tok::Eof => Err(ParseError::UnexpectedEnd),
            other => Err(ParseError::Expected {
                expected: "object key".to_string(),
                found: Self::describe(&other),
                offset: self.current.offset,
            }),
        }
    }

    fn parse_if(&mut self) -> Result<Node, ParseError> {
        self.advance()?; // if
        let test = self.parse_expression(0)?;
        self.expect(Tok::Then, "'then'")?;
        let then = Node::List(self.parse_list(&[Tok::Elif, Tok::Else, Tok::Endif])?);

        let mut elifs = Vec::new();
        while self.eat(Tok::Elif)? {
            let t = self.parse_expression(0)?;
            self.expect(Tok::Then, "'then'")?;
            let body = Node::List(self.parse_list(&[Tok::Elif, Tok::Else, Tok::Endif])?);
            elifs.push((t, body));
        }

        let otherwise = if self.eat(Tok::Else)? {
            Some(Box::new(Node::List(self.parse_list(&[Tok::Endif])?)))
        } else {
            None
        };
        self.expect(Tok::Endif, "'endif'")?;

        Ok(Node::If {
            test: Box::new(test),
            then: Box::new(then),
            elifs,
            otherwise,
        })
    }

    fn parse_case(&mut self) -> Result<Node, ParseError> {
        self.advance()?; // case
        if self.current.tok != Tok::When {
            return Err(ParseError::Expected {
                expected: "'when'".to_string(),
                found: Self::describe(&self.current.tok),
                offset: self.current.offset,
            });
        }

        let mut whens = Vec::new();
        while self.eat(Tok::When)? {
            let test = self.parse_expression(0)?;
            self.expect(Tok::Colon, "':'")?;
            let body = Node::List(self.parse_list(&[Tok::When, Tok::Else, Tok::End])?);
            whens.push((test, body));
        }

        let otherwise = if self.eat(Tok::Else)? {
            Some(Box::new(Node::List(self.parse_list(&[Tok::End])?)))
        } else {
            None
        };
        self.expect(Tok::End, "'end'")?;

        Ok(Node::Case { whens, otherwise })
    }

    fn parse_each(&mut self) -> Result<Node, ParseError> {
        self.advance()?; // each
        let (value_name, _) = self.expect_ident()?;
        let key_name = if self.eat(Tok::Comma)? {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        self.expect(Tok::In, "'in'")?;
        let collection = self.parse_expression(0)?;
        self.expect(Tok::Colon, "':'")?;
        let body = self.parse_expression(0)?;

        Ok(Node::Iterate {
            value_name,
            key_name,
            collection: Box::new(collection),
            body: Box::new(body),
        })
    }

    fn parse_first(&mut self) -> Result<Node, ParseError> {
        self.advance()?; // first
        let (value_name, _) = self.expect_ident()?;
        let key_name = if self.eat(Tok::Comma)? {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        self.expect(Tok::In, "'in'")?;
        let collection = self.parse_expression(0)?;
        self.expect(Tok::With, "'with'")?;
        let predicate = self.parse_expression(0)?;
        let result = if self.eat(Tok::Colon)? {
            Some(Box::new(self.parse_expression(0)?))
        } else {
            None
        };

        Ok(Node::Search {
            value_name,
            key_name,
            collection: Box::new(collection),
            predicate: Box::new(predicate),
            result,
        })
    }

    fn parse_define(&mut self) -> Result<Node, ParseError> {
        self.advance()?; // define
        let (name, name_offset) = self.expect_ident()?;
        if !assignable(&name) {
            return Err(ParseError::ReservedName {
                name,
                offset: name_offset,
            });
        }

        let open = self.current.offset;
        self.expect(Tok::LParen, "'('")?;
        let mut params = Vec::new();
        if self.current.tok != Tok::RParen {
            loop {
                params.push(self.expect_ident()?.0);
                if !self.eat(Tok::Comma)? {
                    break;
                }
            }
        }
        self.close_group(Tok::RParen, '(', open)?;

        let body = self.parse_expression(0)?;
        Ok(Node::FuncDef {
            name,
            params,
            body: Rc::new(body),
        })
    }

    fn parse_do(&mut self) -> Result<Node, ParseError> {
        self.advance()?; // do
        let body = self.parse_list(&[Tok::Done])?;
        self.expect(Tok::Done, "'done'")?;
        Ok(Node::Block(body))
    }

    /// `local NAME = expr` / `global NAME = expr` assignment prefixes.
    fn parse_qualified_assign(&mut self, qualifier: Qualifier) -> Result<Node, ParseError> {
        self.advance()?; // local / global
        let (name, name_offset) = self.expect_ident()?;
        if !assignable(&name) {
            return Err(ParseError::ReservedName {
                name,
                offset: name_offset,
            });
        }
        self.expect(Tok::Assign, "'='")?;
        let value = self.parse_expression(ASSIGN_RBP)?;
        Ok(Node::Assign {
            target: Box::new(Node::VarRef(name)),
            value: Box::new(value),
            qualifier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(src: &str) -> Node {
        let ce = compile(src).unwrap();
        match ce.root() {
            Node::List(items) if items.len() == 1 => items[0].clone(),
            other => panic!("expected single-expression list, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_one("42"), Node::literal(42.0));
        assert_eq!(parse_one("'hi'"), Node::literal("hi"));
        assert_eq!(parse_one("true"), Node::Literal(Value::Bool(true)));
        assert_eq!(parse_one("null"), Node::Literal(Value::Null));
        assert_eq!(parse_one("-5"), Node::literal(-5.0));
    }

    #[test]
    fn test_precedence_mul_over_add() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let node = parse_one("1 + 2 * 3");
        assert_eq!(
            node,
            Node::Binary {
                op: BinOp::Add,
                lhs: Box::new(Node::literal(1.0)),
                rhs: Box::new(Node::Binary {
                    op: BinOp::Mul,
                    lhs: Box::new(Node::literal(2.0)),
                    rhs: Box::new(Node::literal(3.0)),
                }),
            }
        );
    }

    #[test]
    fn test_pow_right_associative() {
        // 2 ** 3 ** 2 parses as 2 ** (3 ** 2)
        let node = parse_one("2 ** 3 ** 2");
        assert_eq!(
            node,
            Node::Binary {
                op: BinOp::Pow,
                lhs: Box::new(Node::literal(2.0)),
                rhs: Box::new(Node::Binary {
                    op: BinOp::Pow,
                    lhs: Box::new(Node::literal(3.0)),
                    rhs: Box::new(Node::literal(2.0)),
                }),
            }
        );
    }

    #[test]
    fn test_parenthesized_grouping() {
        let node = parse_one("(1 + 2) * 3");
        assert!(matches!(
            node,
            Node::Binary {
                op: BinOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_member_access_chain() {
        let node = parse_one("a.b.c");
        // ((a.b).c)
        let Node::Deref { scope, member, null_safe } = node else {
            panic!("expected deref");
        };
        assert!(!null_safe);
        assert_eq!(*member, Node::literal("c"));
        assert!(matches!(*scope, Node::Deref { .. }));
    }

    #[test]
    fn test_null_safe_access() {
        let node = parse_one("a?.b?[0]");
        let Node::Deref { scope, null_safe, .. } = node else {
            panic!("expected deref");
        };
        assert!(null_safe);
        let Node::Deref { null_safe, .. } = *scope else {
            panic!("expected inner deref");
        };
        assert!(null_safe);
    }

    #[test]
    fn test_postfix_binds_tighter_than_infix() {
        // a.b + 1 is (a.b) + 1
        let node = parse_one("a.b + 1");
        let Node::Binary { op: BinOp::Add, lhs, .. } = node else {
            panic!("expected add");
        };
        assert!(matches!(*lhs, Node::Deref { .. }));
    }

    #[test]
    fn test_call_and_args() {
        let node = parse_one("min(5, 4, 6 * 9)");
        let Node::Call { name, args } = node else {
            panic!("expected call");
        };
        assert_eq!(name, "min");
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn test_call_requires_name() {
        assert!(matches!(
            compile("(1 + 2)(3)"),
            Err(ParseError::Expected { .. })
        ));
    }

    #[test]
    fn test_ternary_desugars_to_if() {
        let node = parse_one("true ? 123 : 456");
        let Node::If { test, then, elifs, otherwise } = node else {
            panic!("expected if");
        };
        assert_eq!(*test, Node::Literal(Value::Bool(true)));
        assert_eq!(*then, Node::literal(123.0));
        assert!(elifs.is_empty());
        assert_eq!(otherwise, Some(Box::new(Node::literal(456.0))));
    }

    #[test]
    fn test_if_elif_else() {
        let node = parse_one("if a then 1 elif b then 2 else 3 endif");
        let Node::If { elifs, otherwise, .. } = node else {
            panic!("expected if");
        };
        assert_eq!(elifs.len(), 1);
        assert!(otherwise.is_some());
    }

    #[test]
    fn test_case() {
        let node = parse_one("case when a : 1 when b : 2 else 3 end");
        let Node::Case { whens, otherwise } = node else {
            panic!("expected case");
        };
        assert_eq!(whens.len(), 2);
        assert!(otherwise.is_some());
    }

    #[test]
    fn test_each_with_key() {
        let node = parse_one("each v, k in coll: k");
        let Node::Iterate { value_name, key_name, .. } = node else {
            panic!("expected iterate");
        };
        assert_eq!(value_name, "v");
        assert_eq!(key_name.as_deref(), Some("k"));
    }

    #[test]
    fn test_each_body_ends_at_separator() {
        // the trailing `v` is a sibling list item, not part of the body
        let ce = compile("each n in 1..3: v = n, v").unwrap();
        let Node::List(items) = ce.root() else {
            panic!("expected list root");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Node::Iterate { .. }));
        assert_eq!(items[1], Node::var("v"));
    }

    #[test]
    fn test_first_with_result() {
        let node = parse_one("first m in t with m <= 4 : 2 * m");
        let Node::Search { predicate, result, .. } = node else {
            panic!("expected search");
        };
        assert!(matches!(*predicate, Node::Binary { op: BinOp::Le, .. }));
        assert!(result.is_some());
    }

    #[test]
    fn test_define() {
        let node = parse_one("define square(a) a * a");
        let Node::FuncDef { name, params, .. } = node else {
            panic!("expected funcdef");
        };
        assert_eq!(name, "square");
        assert_eq!(params, vec!["a".to_string()]);
    }

    #[test]
    fn test_do_block_and_qualifiers() {
        let ce = compile("x = 1, do local x = 2, global y = 3 done, x").unwrap();
        let Node::List(items) = ce.root() else {
            panic!("expected list root");
        };
        assert_eq!(items.len(), 3);
        let Node::Block(body) = &items[1] else {
            panic!("expected block");
        };
        assert!(matches!(
            body[0],
            Node::Assign {
                qualifier: Qualifier::Local,
                ..
            }
        ));
        assert!(matches!(
            body[1],
            Node::Assign {
                qualifier: Qualifier::Global,
                ..
            }
        ));
    }

    #[test]
    fn test_object_literal_key_forms() {
        let node = parse_one("{ first_key: 1, 'strange id': 2, ['a' + 'b']: 3 }");
        let Node::ObjectLit(pairs) = node else {
            panic!("expected object literal");
        };
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].0, Node::literal("first_key"));
        assert_eq!(pairs[1].0, Node::literal("strange id"));
        assert!(matches!(pairs[2].0, Node::Binary { .. }));
    }

    #[test]
    fn test_separators_equivalent() {
        let a = compile("1, 2; 3").unwrap();
        let Node::List(items) = a.root() else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_assignment_right_associative() {
        let node = parse_one("a = b = 1");
        let Node::Assign { value, .. } = node else {
            panic!("expected assign");
        };
        assert!(matches!(*value, Node::Assign { .. }));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert!(matches!(
            compile("1 + 2 = 3"),
            Err(ParseError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_reserved_assignment_target() {
        assert!(matches!(
            compile("__secret = 1"),
            Err(ParseError::ReservedName { .. })
        ));
        assert!(matches!(
            compile("_func = 1"),
            Err(ParseError::ReservedName { .. })
        ));
    }

    #[test]
    fn test_member_assignment_target_allowed() {
        let node = parse_one("o.a = 9");
        assert!(matches!(node, Node::Assign { .. }));
    }

    #[test]
    fn test_unmatched_paren() {
        assert!(matches!(
            compile("(1 + 2"),
            Err(ParseError::UnmatchedGroup { open: '(', .. })
        ));
    }

    #[test]
    fn test_nesting_cap() {
        let mut deep = String::new();
        for _ in 0..300 {
            deep.push('(');
        }
        deep.push('1');
        for _ in 0..300 {
            deep.push(')');
        }
        assert!(matches!(
            compile(&deep),
            Err(ParseError::TooDeep { .. })
        ));
    }

    #[test]
    fn test_recompile_is_structurally_equal() {
        let src = "t = each item in arr: item.name, if t then len(t) else 0 endif";
        let a = compile(src).unwrap();
        let b = compile(src).unwrap();
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn test_unary_binds_tighter_than_pow() {
        // -2 ** 2 is (-2) ** 2 under the published precedence table
        let node = parse_one("-2 ** 2");
        let Node::Binary { op: BinOp::Pow, lhs, .. } = node else {
            panic!("expected pow");
        };
        assert_eq!(*lhs, Node::literal(-2.0));
    }
}
