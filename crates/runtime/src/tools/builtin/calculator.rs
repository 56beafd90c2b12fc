//! Arithmetic on untrusted expressions.

use crate::tools::{Arguments, ParamSpec, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Evaluates `+ - * / % **` over decimal numbers and parentheses.
///
/// Nothing but arithmetic is accepted, so the expression can come straight
/// from the model.
#[derive(Debug, Default, Clone, Copy)]
pub struct Calculator;

#[async_trait]
impl Tool for Calculator {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            "calculator",
            "Evaluate a mathematical expression. Supports +, -, *, /, %, ** and parentheses.",
        )
        .param(ParamSpec::string(
            "expression",
            "The mathematical expression to evaluate (e.g. '2 + 2', '10 * 5').",
        ))
    }

    async fn execute(&self, args: Arguments) -> Result<Value, ToolError> {
        let expression = args.str("expression")?;
        match evaluate(expression) {
            Ok(value) => Ok(Value::String(format_number(value))),
            Err(CalcError::DivisionByZero) => Err(ToolError::execution("division by zero")),
            Err(CalcError::NotFinite) => Err(ToolError::execution("result is not a finite number")),
            Err(err) => Err(ToolError::validation("expression", err.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("invalid character '{0}'; only numbers and + - * / % ** ( ) are allowed")]
    InvalidCharacter(char),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected '{0}'")]
    Unexpected(String),
    #[error("expression ended unexpectedly")]
    UnexpectedEnd,
    #[error("empty expression")]
    Empty,
    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not finite")]
    NotFinite,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    LParen,
    RParen,
}

impl Token {
    fn symbol(self) -> String {
        match self {
            Self::Num(n) => n.to_string(),
            Self::Plus => "+".into(),
            Self::Minus => "-".into(),
            Self::Star => "*".into(),
            Self::Slash => "/".into(),
            Self::Percent => "%".into(),
            Self::Pow => "**".into(),
            Self::LParen => "(".into(),
            Self::RParen => ")".into(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| CalcError::InvalidNumber(text.clone()))?;
                tokens.push(Token::Num(n));
            }
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::Pow);
                i += 2;
            }
            '+' | '-' | '*' | '/' | '%' | '(' | ')' => {
                tokens.push(match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    _ => Token::RParen,
                });
                i += 1;
            }
            other => return Err(CalcError::InvalidCharacter(other)),
        }
    }
    Ok(tokens)
}

/// Nesting limit for parentheses, signs and exponents combined.
const MAX_DEPTH: usize = 64;

/// Recursive descent, lowest precedence first:
/// sum -> product -> unary -> power -> atom.
///
/// Every cycle through the grammar passes `unary`, so that is where depth
/// is counted.
struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn sum(&mut self) -> Result<f64, CalcError> {
        let mut value = self.product()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.product()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn product(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash | Token::Percent)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                Token::Star => value * rhs,
                _ if rhs == 0.0 => return Err(CalcError::DivisionByZero),
                Token::Slash => value / rhs,
                // floored modulo, sign follows the divisor
                _ => value - rhs * (value / rhs).floor(),
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, CalcError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CalcError::TooDeep(MAX_DEPTH));
        }
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.atom()?;
        if self.peek() == Some(Token::Pow) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, CalcError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.sum()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    Some(other) => Err(CalcError::Unexpected(other.symbol())),
                    None => Err(CalcError::UnexpectedEnd),
                }
            }
            Some(other) => Err(CalcError::Unexpected(other.symbol())),
            None => Err(CalcError::UnexpectedEnd),
        }
    }
}

pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(CalcError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.sum()?;
    if let Some(extra) = parser.peek() {
        return Err(CalcError::Unexpected(extra.symbol()));
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

/// Whole numbers print without a fractional part.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::executor::validate;
    use serde_json::json;

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(evaluate("25 * 4").unwrap(), 100.0);
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("2 ** 3 ** 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ** 2").unwrap(), -4.0);
        assert_eq!(evaluate("100 / 8").unwrap(), 12.5);
        assert_eq!(evaluate("-7 % 3").unwrap(), 2.0);
        assert_eq!(evaluate(" 1.5 + .5 ").unwrap(), 2.0);
    }

    #[test]
    fn rejects_non_arithmetic_input() {
        assert_eq!(
            evaluate("__import__('os')").unwrap_err(),
            CalcError::InvalidCharacter('_')
        );
        assert_eq!(evaluate("sqrt(16)").unwrap_err(), CalcError::InvalidCharacter('s'));
        assert_eq!(evaluate("1 +").unwrap_err(), CalcError::UnexpectedEnd);
        assert_eq!(evaluate("(1 + 2").unwrap_err(), CalcError::UnexpectedEnd);
        assert_eq!(evaluate("1 2").unwrap_err(), CalcError::Unexpected("2".into()));
        assert_eq!(evaluate("1..2").unwrap_err(), CalcError::InvalidNumber("1..2".into()));
        assert_eq!(evaluate("   ").unwrap_err(), CalcError::Empty);
    }

    #[test]
    fn deep_nesting_is_rejected_without_recursing() {
        let parens = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        assert_eq!(evaluate(&parens).unwrap_err(), CalcError::TooDeep(MAX_DEPTH));

        let signs = format!("{}1", "-".repeat(20_000));
        assert_eq!(evaluate(&signs).unwrap_err(), CalcError::TooDeep(MAX_DEPTH));

        let powers = vec!["2"; 20_000].join(" ** ");
        assert_eq!(evaluate(&powers).unwrap_err(), CalcError::TooDeep(MAX_DEPTH));

        let shallow = format!("{}7{}", "(".repeat(30), ")".repeat(30));
        assert_eq!(evaluate(&shallow).unwrap(), 7.0);
        assert_eq!(evaluate(&vec!["1"; 5_000].join(" + ")).unwrap(), 5_000.0);
    }

    #[test]
    fn division_by_zero_is_reported() {
        assert_eq!(evaluate("1 / 0").unwrap_err(), CalcError::DivisionByZero);
        assert_eq!(evaluate("5 % (2 - 2)").unwrap_err(), CalcError::DivisionByZero);
    }

    #[test]
    fn whole_results_print_as_integers() {
        assert_eq!(format_number(100.0), "100");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(12.5), "12.5");
    }

    #[tokio::test]
    async fn tool_returns_formatted_result() {
        let calc = Calculator;
        let args = validate(&calc.spec(), &json!({"expression": "25 * 4"})).unwrap();
        assert_eq!(calc.execute(args).await.unwrap(), json!("100"));

        let args = validate(&calc.spec(), &json!({"expression": "1/0"})).unwrap();
        assert_eq!(
            calc.execute(args).await.unwrap_err(),
            ToolError::Execution("division by zero".into())
        );

        let nested = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        let args = validate(&calc.spec(), &json!({"expression": nested})).unwrap();
        assert_eq!(
            calc.execute(args).await.unwrap_err().kind(),
            crate::model::ResultKind::ValidationError
        );

        let args = validate(&calc.spec(), &json!({"expression": "rm -rf"})).unwrap();
        assert!(matches!(
            calc.execute(args).await.unwrap_err(),
            ToolError::Validation { param, .. } if param == "expression"
        ));
    }
}
