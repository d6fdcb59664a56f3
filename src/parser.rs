use std::rc::Rc;

use crate::ast::{AssignmentOp, BinaryOp, Block, Expr, Parameter, Program, Stmt, UnaryOp};
use crate::error::{ParseError, ParseResult};
use crate::scanner::Token;
use crate::scanner::TokenType;

type StmtResult = ParseResult<Stmt>;
type ExprResult = ParseResult<Expr>;

pub fn parse(tokens: &[Token]) -> ParseResult<Program> {
    let mut cursor = TokenCursor::new(tokens);
    let mut statements = Vec::new();

    while !cursor.at_end() {
        statements.push(statement(&mut cursor)?);
    }

    Ok(Program {
        body: Block { statements },
    })
}

fn statement(cursor: &mut TokenCursor) -> StmtResult {
    let statement = match cursor.peek().token_type {
        TokenType::If => if_statement(cursor),
        TokenType::While => while_statement(cursor),
        TokenType::Do => do_while_statement(cursor),
        TokenType::For => for_statement(cursor),
        TokenType::Return => return_statement(cursor),
        TokenType::Break => {
            cursor.advance();
            Ok(Stmt::Break)
        }
        TokenType::Continue => {
            cursor.advance();
            Ok(Stmt::Continue)
        }
        TokenType::Throw => {
            cursor.advance();
            Ok(Stmt::Throw {
                argument: expression(cursor)?,
            })
        }
        TokenType::Try => try_statement(cursor),
        TokenType::Global => global_statement(cursor),
        TokenType::Export => {
            cursor.advance();
            Ok(Stmt::Export {
                argument: expression(cursor)?,
            })
        }
        _ => expression_statement(cursor),
    }?;

    // any statement may carry an optional terminating semicolon
    cursor.advance_if_match(&TokenType::Semicolon);
    Ok(statement)
}

// parse statements up to (but not including) one of the given terminator tokens
fn block(cursor: &mut TokenCursor, terminators: &[TokenType]) -> ParseResult<Block> {
    let mut statements = Vec::new();
    loop {
        let next = &cursor.peek().token_type;
        if terminators.iter().any(|terminator| terminator == next) {
            break;
        }
        if matches!(next, TokenType::Eof) {
            return Err(build_error(
                "Unexpected end of input inside block.",
                cursor.peek().line,
            ));
        }
        statements.push(statement(cursor)?);
    }
    Ok(Block { statements })
}

fn if_statement(cursor: &mut TokenCursor) -> StmtResult {
    cursor.advance();
    let test = expression(cursor)?;
    cursor
        .advance_if_match(&TokenType::Then)
        .ok_or_else(|| build_error("Expect 'then' after if condition.", cursor.peek().line))?;
    let consequent = block(cursor, &[TokenType::Else, TokenType::End])?;
    let alternate = if cursor.advance_if_match(&TokenType::Else).is_some() {
        Some(block(cursor, &[TokenType::End])?)
    } else {
        None
    };
    cursor
        .advance_if_match(&TokenType::End)
        .ok_or_else(|| build_error("Expect 'end' after if statement.", cursor.peek().line))?;

    Ok(Stmt::If {
        test,
        consequent,
        alternate,
    })
}

fn while_statement(cursor: &mut TokenCursor) -> StmtResult {
    cursor.advance();
    let test = expression(cursor)?;
    cursor
        .advance_if_match(&TokenType::Do)
        .ok_or_else(|| build_error("Expect 'do' after while condition.", cursor.peek().line))?;
    let body = block(cursor, &[TokenType::End])?;
    cursor
        .advance_if_match(&TokenType::End)
        .ok_or_else(|| build_error("Expect 'end' after while body.", cursor.peek().line))?;

    Ok(Stmt::While { test, body })
}

// do <stmts> end while <expr>
fn do_while_statement(cursor: &mut TokenCursor) -> StmtResult {
    cursor.advance();
    let body = block(cursor, &[TokenType::End])?;
    cursor
        .advance_if_match(&TokenType::End)
        .ok_or_else(|| build_error("Expect 'end' after do body.", cursor.peek().line))?;
    cursor
        .advance_if_match(&TokenType::While)
        .ok_or_else(|| build_error("Expect 'while' after do body.", cursor.peek().line))?;
    let test = expression(cursor)?;

    Ok(Stmt::DoWhile { test, body })
}

// for [init], [test], [update] do <stmts> end
fn for_statement(cursor: &mut TokenCursor) -> StmtResult {
    cursor.advance();

    let init = if matches!(cursor.peek().token_type, TokenType::Comma) {
        None
    } else {
        Some(expression(cursor)?)
    };
    cursor
        .advance_if_match(&TokenType::Comma)
        .ok_or_else(|| build_error("Expect ',' after loop initializer.", cursor.peek().line))?;

    let test = if matches!(cursor.peek().token_type, TokenType::Comma) {
        None
    } else {
        Some(expression(cursor)?)
    };
    cursor
        .advance_if_match(&TokenType::Comma)
        .ok_or_else(|| build_error("Expect ',' after loop condition.", cursor.peek().line))?;

    let update = if matches!(cursor.peek().token_type, TokenType::Do) {
        None
    } else {
        Some(expression(cursor)?)
    };
    cursor
        .advance_if_match(&TokenType::Do)
        .ok_or_else(|| build_error("Expect 'do' after for clauses.", cursor.peek().line))?;

    let body = block(cursor, &[TokenType::End])?;
    cursor
        .advance_if_match(&TokenType::End)
        .ok_or_else(|| build_error("Expect 'end' after for body.", cursor.peek().line))?;

    Ok(Stmt::For {
        init,
        test,
        update,
        body,
    })
}

fn return_statement(cursor: &mut TokenCursor) -> StmtResult {
    cursor.advance();
    // a return argument is absent when the next token can't start an expression
    let argument = match cursor.peek().token_type {
        TokenType::Semicolon
        | TokenType::End
        | TokenType::Else
        | TokenType::Catch
        | TokenType::Finally
        | TokenType::While
        | TokenType::Eof => None,
        _ => Some(expression(cursor)?),
    };
    Ok(Stmt::Return { argument })
}

// try <stmts> catch <ident> do <stmts> [finally <stmts>] end
fn try_statement(cursor: &mut TokenCursor) -> StmtResult {
    cursor.advance();
    let block_body = block(cursor, &[TokenType::Catch])?;
    cursor
        .advance_if_match(&TokenType::Catch)
        .ok_or_else(|| build_error("Expect 'catch' after try block.", cursor.peek().line))?;
    let param = identifier_name(cursor)?;
    cursor
        .advance_if_match(&TokenType::Do)
        .ok_or_else(|| build_error("Expect 'do' after catch parameter.", cursor.peek().line))?;
    let handler = block(cursor, &[TokenType::Finally, TokenType::End])?;
    let finalizer = if cursor.advance_if_match(&TokenType::Finally).is_some() {
        Some(block(cursor, &[TokenType::End])?)
    } else {
        None
    };
    cursor
        .advance_if_match(&TokenType::End)
        .ok_or_else(|| build_error("Expect 'end' after try statement.", cursor.peek().line))?;

    Ok(Stmt::Try {
        block: block_body,
        param,
        handler,
        finalizer,
    })
}

fn global_statement(cursor: &mut TokenCursor) -> StmtResult {
    cursor.advance();
    let line = cursor.peek().line;
    let assignment = expression(cursor)?;
    if !matches!(assignment, Expr::Assignment { .. }) {
        return Err(build_error("Expect assignment after 'global'.", line));
    }
    Ok(Stmt::Global { assignment })
}

fn expression_statement(cursor: &mut TokenCursor) -> StmtResult {
    Ok(Stmt::Expression {
        expression: expression(cursor)?,
    })
}

fn expression(cursor: &mut TokenCursor) -> ExprResult {
    assignment(cursor)
}

fn assignment(cursor: &mut TokenCursor) -> ExprResult {
    let expr = or(cursor)?;

    let operator = cursor.advance_if_any_match(&[
        TokenType::Equal,
        TokenType::PlusEqual,
        TokenType::MinusEqual,
        TokenType::StarEqual,
        TokenType::SlashEqual,
        TokenType::LessLessEqual,
        TokenType::GreaterGreaterEqual,
        TokenType::DotDotEqual,
    ]);
    if let Some(operator) = operator {
        let rhs = assignment(cursor)?;
        return match expr {
            Expr::Identifier { .. } | Expr::Member { .. } => Ok(Expr::Assignment {
                op: to_assignment_op(&operator.token_type),
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            }),
            _ => Err(build_error("Invalid assignment target.", operator.line)),
        };
    }

    Ok(expr)
}

fn or(cursor: &mut TokenCursor) -> ExprResult {
    binary_left_associative(cursor, and, &[TokenType::Or])
}

fn and(cursor: &mut TokenCursor) -> ExprResult {
    binary_left_associative(cursor, xor, &[TokenType::And])
}

fn xor(cursor: &mut TokenCursor) -> ExprResult {
    binary_left_associative(cursor, equality, &[TokenType::Xor])
}

fn equality(cursor: &mut TokenCursor) -> ExprResult {
    binary_left_associative(
        cursor,
        comparison,
        &[TokenType::EqualEqual, TokenType::NotEqual],
    )
}

fn comparison(cursor: &mut TokenCursor) -> ExprResult {
    binary_left_associative(
        cursor,
        concat,
        &[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ],
    )
}

fn concat(cursor: &mut TokenCursor) -> ExprResult {
    binary_left_associative(cursor, shift, &[TokenType::DotDot])
}

fn shift(cursor: &mut TokenCursor) -> ExprResult {
    binary_left_associative(
        cursor,
        addition,
        &[TokenType::LessLess, TokenType::GreaterGreater],
    )
}

fn addition(cursor: &mut TokenCursor) -> ExprResult {
    binary_left_associative(cursor, multiplication, &[TokenType::Minus, TokenType::Plus])
}

fn multiplication(cursor: &mut TokenCursor) -> ExprResult {
    binary_left_associative(
        cursor,
        power,
        &[TokenType::Slash, TokenType::Star, TokenType::Percent],
    )
}

// exponentiation is right associative
fn power(cursor: &mut TokenCursor) -> ExprResult {
    let expr = unary(cursor)?;
    if cursor.advance_if_match(&TokenType::StarStar).is_some() {
        let rhs = power(cursor)?;
        return Ok(Expr::Binary {
            op: BinaryOp::Pow,
            lhs: Box::new(expr),
            rhs: Box::new(rhs),
        });
    }
    Ok(expr)
}

// Parse a binary left associative expression as long as the current token matches one of the given types
fn binary_left_associative(
    cursor: &mut TokenCursor,
    higher_precedence: fn(&mut TokenCursor) -> ExprResult,
    types: &[TokenType],
) -> ExprResult {
    let mut expr = higher_precedence(cursor)?;

    while let Some(operator) = cursor.advance_if_any_match(types) {
        let right = higher_precedence(cursor)?;
        expr = Expr::Binary {
            op: to_binary_op(&operator.token_type),
            lhs: Box::new(expr),
            rhs: Box::new(right),
        };
    }

    Ok(expr)
}

fn unary(cursor: &mut TokenCursor) -> ExprResult {
    let operator =
        cursor.advance_if_any_match(&[TokenType::Not, TokenType::Minus, TokenType::Hash]);
    if let Some(operator) = operator {
        let operand = unary(cursor)?;
        let op = match operator.token_type {
            TokenType::Not => UnaryOp::Not,
            TokenType::Minus => UnaryOp::Negate,
            TokenType::Hash => UnaryOp::Length,
            // the operator was just matched against this exact set
            _ => panic!("Unhandled unary operator type: {:?}", operator.token_type),
        };
        return Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        });
    }

    postfix(cursor)
}

// calls, member accesses, and computed indexing chain onto a primary expression
fn postfix(cursor: &mut TokenCursor) -> ExprResult {
    let mut expr = primary(cursor)?;

    loop {
        if cursor.advance_if_match(&TokenType::LeftParen).is_some() {
            let mut arguments = Vec::new();
            if cursor.peek().token_type != TokenType::RightParen {
                loop {
                    arguments.push(expression(cursor)?);
                    // keep grabbing the next argument as long as the following token is a comma
                    if cursor.advance_if_match(&TokenType::Comma).is_none() {
                        break;
                    }
                }
            }
            cursor
                .advance_if_match(&TokenType::RightParen)
                .ok_or_else(|| build_error("Expect ')' after arguments.", cursor.peek().line))?;
            expr = Expr::Call {
                callee: Box::new(expr),
                arguments,
            };
        } else if cursor.advance_if_match(&TokenType::Dot).is_some() {
            let name = identifier_name(cursor)?;
            expr = Expr::Member {
                object: Box::new(expr),
                property: Box::new(Expr::Identifier { name }),
                computed: false,
            };
        } else if cursor.advance_if_match(&TokenType::LeftBracket).is_some() {
            let property = expression(cursor)?;
            cursor
                .advance_if_match(&TokenType::RightBracket)
                .ok_or_else(|| build_error("Expect ']' after index.", cursor.peek().line))?;
            expr = Expr::Member {
                object: Box::new(expr),
                property: Box::new(property),
                computed: true,
            };
        } else {
            break;
        }
    }

    Ok(expr)
}

fn primary(cursor: &mut TokenCursor) -> ExprResult {
    let current = cursor.peek();

    match &current.token_type {
        TokenType::Number(value) => {
            let value = *value;
            cursor.advance();
            Ok(Expr::NumberLiteral { value })
        }
        TokenType::String(value) => {
            let value = value.clone();
            cursor.advance();
            Ok(Expr::StringLiteral { value })
        }
        TokenType::True => {
            cursor.advance();
            Ok(Expr::BooleanLiteral { value: true })
        }
        TokenType::False => {
            cursor.advance();
            Ok(Expr::BooleanLiteral { value: false })
        }
        TokenType::Nil => {
            cursor.advance();
            Ok(Expr::NilLiteral)
        }
        TokenType::Identifier(name) => {
            let name = name.clone();
            cursor.advance();
            Ok(Expr::Identifier { name })
        }
        TokenType::LeftParen => {
            cursor.advance();
            let expr = expression(cursor)?;
            cursor.advance_if_match(&TokenType::RightParen).ok_or_else(|| {
                build_error("Expect ')' after grouping expression.", cursor.peek().line)
            })?;
            // grouping exists only in the source; it produces no node of its own
            Ok(expr)
        }
        TokenType::LeftBracket => array_expression(cursor),
        TokenType::LeftBrace => object_expression(cursor),
        TokenType::Fn => function_expression(cursor),
        _ => Err(build_error("Expect expression.", current.line)),
    }
}

fn array_expression(cursor: &mut TokenCursor) -> ExprResult {
    cursor.advance();
    let mut elements = Vec::new();
    if cursor.peek().token_type != TokenType::RightBracket {
        loop {
            elements.push(expression(cursor)?);
            if cursor.advance_if_match(&TokenType::Comma).is_none() {
                break;
            }
        }
    }
    cursor
        .advance_if_match(&TokenType::RightBracket)
        .ok_or_else(|| build_error("Expect ']' after array elements.", cursor.peek().line))?;
    Ok(Expr::ArrayExpression { elements })
}

fn object_expression(cursor: &mut TokenCursor) -> ExprResult {
    cursor.advance();
    let mut properties = Vec::new();
    if cursor.peek().token_type != TokenType::RightBrace {
        loop {
            let key = match &cursor.peek().token_type {
                TokenType::Identifier(name) => {
                    let key = name.clone();
                    cursor.advance();
                    key
                }
                TokenType::String(value) => {
                    let key = value.clone();
                    cursor.advance();
                    key
                }
                _ => return Err(build_error("Expect property name.", cursor.peek().line)),
            };
            cursor
                .advance_if_match(&TokenType::Colon)
                .ok_or_else(|| build_error("Expect ':' after property name.", cursor.peek().line))?;
            properties.push((key, expression(cursor)?));
            if cursor.advance_if_match(&TokenType::Comma).is_none() {
                break;
            }
        }
    }
    cursor
        .advance_if_match(&TokenType::RightBrace)
        .ok_or_else(|| build_error("Expect '}' after object properties.", cursor.peek().line))?;
    Ok(Expr::ObjectExpression { properties })
}

// fn [name]( params ) <stmts> end
fn function_expression(cursor: &mut TokenCursor) -> ExprResult {
    cursor.advance();

    let name = match &cursor.peek().token_type {
        TokenType::Identifier(name) => {
            let name = name.clone();
            cursor.advance();
            Some(name)
        }
        _ => None,
    };

    cursor
        .advance_if_match(&TokenType::LeftParen)
        .ok_or_else(|| build_error("Expect '(' after 'fn'.", cursor.peek().line))?;
    let mut parameters = Vec::new();
    if cursor.peek().token_type != TokenType::RightParen {
        loop {
            let param_name = identifier_name(cursor)?;
            let default_value = if cursor.advance_if_match(&TokenType::Equal).is_some() {
                Some(expression(cursor)?)
            } else {
                None
            };
            parameters.push(Parameter {
                name: param_name,
                default_value,
            });
            if cursor.advance_if_match(&TokenType::Comma).is_none() {
                break;
            }
        }
    }
    cursor
        .advance_if_match(&TokenType::RightParen)
        .ok_or_else(|| build_error("Expect ')' after parameters.", cursor.peek().line))?;

    let body = block(cursor, &[TokenType::End])?;
    cursor
        .advance_if_match(&TokenType::End)
        .ok_or_else(|| build_error("Expect 'end' after function body.", cursor.peek().line))?;

    Ok(Expr::FunctionDeclaration {
        name,
        parameters: Rc::new(parameters),
        body: Rc::new(body),
    })
}

fn identifier_name(cursor: &mut TokenCursor) -> ParseResult<String> {
    match &cursor.peek().token_type {
        TokenType::Identifier(name) => {
            let name = name.clone();
            cursor.advance();
            Ok(name)
        }
        _ => Err(build_error("Expect identifier.", cursor.peek().line)),
    }
}

fn to_binary_op(token_type: &TokenType) -> BinaryOp {
    match token_type {
        TokenType::Plus => BinaryOp::Add,
        TokenType::Minus => BinaryOp::Sub,
        TokenType::Star => BinaryOp::Mult,
        TokenType::Slash => BinaryOp::Div,
        TokenType::StarStar => BinaryOp::Pow,
        TokenType::Percent => BinaryOp::Modulo,
        TokenType::LessLess => BinaryOp::ShiftLeft,
        TokenType::GreaterGreater => BinaryOp::ShiftRight,
        TokenType::EqualEqual => BinaryOp::Equals,
        TokenType::NotEqual => BinaryOp::NotEquals,
        TokenType::Greater => BinaryOp::GreaterThan,
        TokenType::Less => BinaryOp::LessThan,
        TokenType::GreaterEqual => BinaryOp::GreaterThanOrEquals,
        TokenType::LessEqual => BinaryOp::LessThanOrEquals,
        TokenType::And => BinaryOp::And,
        TokenType::Or => BinaryOp::Or,
        TokenType::Xor => BinaryOp::Xor,
        TokenType::DotDot => BinaryOp::StringConcat,
        // unhandled case here indicates a bug in the parser
        _ => panic!("Unhandled binary operator type: {token_type:?}"),
    }
}

fn to_assignment_op(token_type: &TokenType) -> AssignmentOp {
    match token_type {
        TokenType::Equal => AssignmentOp::Assign,
        TokenType::PlusEqual => AssignmentOp::Add,
        TokenType::MinusEqual => AssignmentOp::Sub,
        TokenType::StarEqual => AssignmentOp::Mult,
        TokenType::SlashEqual => AssignmentOp::Div,
        TokenType::LessLessEqual => AssignmentOp::ShiftLeft,
        TokenType::GreaterGreaterEqual => AssignmentOp::ShiftRight,
        TokenType::DotDotEqual => AssignmentOp::Concat,
        // unhandled case here indicates a bug in the parser
        _ => panic!("Unhandled assignment operator type: {token_type:?}"),
    }
}

fn build_error(message: &str, line: u32) -> ParseError {
    ParseError::new(&format!("Parse error at line {line}: {message}"))
}

struct TokenCursor<'a> {
    tokens: &'a [Token],
    index: usize,
}

impl<'a> TokenCursor<'a> {
    fn new(tokens: &[Token]) -> TokenCursor {
        TokenCursor { tokens, index: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.index]
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    fn at_end(&self) -> bool {
        matches!(self.tokens[self.index].token_type, TokenType::Eof)
    }

    fn advance_if_match(&mut self, token_type: &TokenType) -> Option<Token> {
        let token = self.peek();
        if token.token_type == *token_type {
            let cloned = token.clone();
            self.advance();
            Some(cloned)
        } else {
            None
        }
    }

    // TokenType also wraps literal values which could affect equality comparisons in here, don't use this for literal type tokens
    fn advance_if_any_match(&mut self, types: &[TokenType]) -> Option<Token> {
        let token = self.peek();
        if types.contains(&token.token_type) {
            let cloned = token.clone();
            self.advance();
            Some(cloned)
        } else {
            None
        }
    }
}
