//! Reading expressions from their s-expression form.
//!
//! This is the inverse of `Display for Expr`, used to pass path guards on the
//! command line. Free variables must be declared up front with their sorts.
//!
//! ```
//! use std::collections::BTreeMap;
//! use concolic_rs::sexpr::parse;
//! use concolic_rs::types::Sort;
//!
//! let sorts = BTreeMap::from([("x".to_string(), Sort::Int)]);
//! let e = parse("(and (> x 10) (not (= x 15)))", &sorts).unwrap();
//! assert_eq!(e.to_string(), "(and (> x 10) (not (= x 15)))");
//! ```

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_rational::BigRational;

use crate::error::{Error, Result};
use crate::expr::{ArithOp, CmpOp, Expr};
use crate::types::{Sort, Value};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Atom(String),
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut atom = String::new();
    for c in text.chars() {
        if c == '(' || c == ')' || c.is_whitespace() {
            if !atom.is_empty() {
                tokens.push(Token::Atom(std::mem::take(&mut atom)));
            }
            match c {
                '(' => tokens.push(Token::Open),
                ')' => tokens.push(Token::Close),
                _ => {}
            }
        } else {
            atom.push(c);
        }
    }
    if !atom.is_empty() {
        tokens.push(Token::Atom(atom));
    }
    tokens
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    sorts: &'a BTreeMap<String, Sort>,
}

/// Parses `text` into an expression. `sorts` gives the sort of every free variable.
pub fn parse(text: &str, sorts: &BTreeMap<String, Sort>) -> Result<Expr> {
    let mut parser = Parser {
        tokens: tokenize(text),
        pos: 0,
        sorts,
    };
    let expr = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(Error::Parse(format!("trailing input after `{}`", expr)));
    }
    Ok(expr)
}

impl Parser<'_> {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Atom(atom)) => self.atom(&atom),
            Some(Token::Open) => {
                let op = match self.next() {
                    Some(Token::Atom(op)) => op,
                    _ => return Err(Error::Parse("expected operator after `(`".to_string())),
                };
                let mut args = Vec::new();
                loop {
                    if let Some(Token::Close) = self.tokens.get(self.pos) {
                        self.pos += 1;
                        break;
                    }
                    if self.pos >= self.tokens.len() {
                        return Err(Error::Parse(format!("unclosed `({}`", op)));
                    }
                    args.push(self.expr()?);
                }
                apply(&op, args)
            }
            Some(Token::Close) => Err(Error::Parse("unexpected `)`".to_string())),
            None => Err(Error::Parse("unexpected end of input".to_string())),
        }
    }

    fn atom(&self, atom: &str) -> Result<Expr> {
        match atom {
            "true" => return Ok(Expr::bool(true)),
            "false" => return Ok(Expr::bool(false)),
            _ => {}
        }
        if let Ok(i) = atom.parse::<BigInt>() {
            return Ok(Expr::int(i));
        }
        if let Some((whole, frac)) = atom.split_once('.') {
            let digits = format!("{}{}", whole, frac);
            if let Ok(numer) = digits.parse::<BigInt>() {
                let denom = BigInt::from(10).pow(frac.len() as u32);
                return Ok(Expr::real(BigRational::new(numer, denom)));
            }
        }
        match self.sorts.get(atom) {
            Some(sort) => Ok(Expr::var(atom, *sort)),
            None => Err(Error::Parse(format!("undeclared variable `{}`", atom))),
        }
    }
}

fn arity(op: &str, args: &[Expr], n: usize) -> Result<()> {
    if args.len() != n {
        return Err(Error::Parse(format!("`{}` expects {} arguments, got {}", op, n, args.len())));
    }
    Ok(())
}

fn pair(op: &str, args: Vec<Expr>) -> Result<(Expr, Expr)> {
    match <[Expr; 2]>::try_from(args) {
        Ok([a, b]) => Ok((a, b)),
        Err(args) => Err(Error::Parse(format!("`{}` expects 2 arguments, got {}", op, args.len()))),
    }
}

fn apply(op: &str, mut args: Vec<Expr>) -> Result<Expr> {
    let cmp = |c: CmpOp, args: Vec<Expr>| -> Result<Expr> {
        let (lhs, rhs) = pair(op, args)?;
        Ok(Expr::cmp(c, lhs, rhs))
    };
    let arith = |a: ArithOp, args: Vec<Expr>| -> Result<Expr> {
        let (lhs, rhs) = pair(op, args)?;
        Ok(Expr::arith(a, lhs, rhs))
    };
    match op {
        "not" => {
            arity(op, &args, 1)?;
            Ok(Expr::not(args.swap_remove(0)))
        }
        "and" => Ok(Expr::and(args)),
        "or" => Ok(Expr::or(args)),
        "=" => cmp(CmpOp::Eq, args),
        "<" => cmp(CmpOp::Lt, args),
        "<=" => cmp(CmpOp::Le, args),
        ">" => cmp(CmpOp::Gt, args),
        ">=" => cmp(CmpOp::Ge, args),
        "distinct" => Ok(Expr::not(cmp(CmpOp::Eq, args)?)),
        "+" => arith(ArithOp::Add, args),
        "*" => arith(ArithOp::Mul, args),
        "div" => arith(ArithOp::Div, args),
        "mod" => arith(ArithOp::Mod, args),
        "-" if args.len() == 1 => Ok(Expr::neg(args.swap_remove(0))),
        "-" => arith(ArithOp::Sub, args),
        "/" => {
            arity(op, &args, 2)?;
            if let (Some(Value::Int(n)), Some(Value::Int(d))) = (args[0].as_const(), args[1].as_const()) {
                if d != &BigInt::from(0) {
                    return Ok(Expr::real(BigRational::new(n.clone(), d.clone())));
                }
            }
            let rhs = Expr::to_real(args.swap_remove(1));
            let lhs = Expr::to_real(args.swap_remove(0));
            Ok(Expr::div(lhs, rhs))
        }
        "to_real" => {
            arity(op, &args, 1)?;
            Ok(Expr::to_real(args.swap_remove(0)))
        }
        "ite" => {
            arity(op, &args, 3)?;
            let e = args.swap_remove(2);
            let t = args.swap_remove(1);
            Ok(Expr::ite(args.swap_remove(0), t, e))
        }
        _ => Err(Error::Parse(format!("unknown operator `{}`", op))),
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn sorts() -> BTreeMap<String, Sort> {
        BTreeMap::from([
            ("x".to_string(), Sort::Int),
            ("y".to_string(), Sort::Int),
            ("r".to_string(), Sort::Real),
            ("b".to_string(), Sort::Bool),
        ])
    }

    #[test]
    fn test_reads_back_display() {
        for text in [
            "(> x 10)",
            "(and (<= x y) (not b))",
            "(ite (= (mod x 2) 0) (div x 2) (- x))",
            "(< (/ r (/ 1 2)) 3.0)",
            "(or (>= (* x y) (- 4)) (= (+ x 1) y))",
        ] {
            let e = parse(text, &sorts()).unwrap();
            assert_eq!(e.to_string(), text);
        }
    }

    #[test]
    fn test_decimal_literal() {
        let e = parse("2.5", &sorts()).unwrap();
        assert_eq!(e.to_string(), "(/ 5 2)");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse("(> z 1)", &sorts()), Err(Error::Parse(_))));
        assert!(matches!(parse("(> x 1", &sorts()), Err(Error::Parse(_))));
        assert!(matches!(parse("(foo x)", &sorts()), Err(Error::Parse(_))));
        assert!(matches!(parse("(not x y)", &sorts()), Err(Error::Parse(_))));
        assert!(matches!(parse("x y", &sorts()), Err(Error::Parse(_))));
    }
}
