//! Expression reduction.
//!
//! Turns the flat run of data tokens between `=`/`(` and the closing
//! `;`/`)` into a single expression tree with a shunting-yard pass:
//! operands go straight to the operand stack, and an incoming operator
//! first reduces every stacked operator of equal or higher priority, so
//! operators of one priority associate to the left.

use crate::error::CoreError;
use crate::node::{BinaryOp, Expr, Slot};

enum Term {
    Operand(Expr),
    Operator(BinaryOp),
}

/// Reduce `terms` to one expression.
///
/// `resolve` maps a variable name to its slot if the name is visible
/// from the current scope.
pub fn reduce<S, F>(terms: &[S], resolve: F) -> Result<Expr, CoreError>
where
    S: AsRef<str>,
    F: Fn(&str) -> Option<Slot>,
{
    if terms.is_empty() {
        return Err(CoreError::MalformedExpression(
            "expression is empty".to_string(),
        ));
    }

    let mut operands: Vec<Expr> = Vec::new();
    let mut operators: Vec<BinaryOp> = Vec::new();

    for (index, text) in terms.iter().enumerate() {
        let text = text.as_ref();
        let term = classify(text, &resolve)?;
        let expects_operand = index % 2 == 0;
        match term {
            Term::Operand(expr) if expects_operand => operands.push(expr),
            Term::Operator(op) if !expects_operand => {
                while let Some(&top) = operators.last() {
                    if top.priority() < op.priority() {
                        break;
                    }
                    operators.pop();
                    apply(&mut operands, top)?;
                }
                operators.push(op);
            }
            Term::Operand(_) => {
                return Err(CoreError::MalformedExpression(format!(
                    "expected an operator before '{text}'"
                )));
            }
            Term::Operator(_) => {
                return Err(CoreError::MalformedExpression(format!(
                    "operator '{text}' is missing its left operand"
                )));
            }
        }
    }

    if terms.len() % 2 == 0 {
        return Err(CoreError::MalformedExpression(
            "expression ends with an operator".to_string(),
        ));
    }

    while let Some(op) = operators.pop() {
        apply(&mut operands, op)?;
    }

    match (operands.pop(), operands.is_empty()) {
        (Some(expr), true) => Ok(expr),
        _ => Err(CoreError::MalformedExpression(
            "operands and operators do not balance".to_string(),
        )),
    }
}

fn classify<F>(text: &str, resolve: &F) -> Result<Term, CoreError>
where
    F: Fn(&str) -> Option<Slot>,
{
    if let Some(op) = BinaryOp::from_symbol(text) {
        return Ok(Term::Operator(op));
    }
    if let Some(slot) = resolve(text) {
        return Ok(Term::Operand(Expr::Var(slot)));
    }
    if let Ok(value) = text.parse::<i32>() {
        return Ok(Term::Operand(Expr::Const(value)));
    }
    if is_name(text) {
        return Err(CoreError::UndeclaredVariable(text.to_string()));
    }
    Err(CoreError::UnknownSymbol(text.to_string()))
}

fn apply(operands: &mut Vec<Expr>, op: BinaryOp) -> Result<(), CoreError> {
    let (Some(rhs), Some(lhs)) = (operands.pop(), operands.pop()) else {
        return Err(CoreError::MalformedExpression(format!(
            "operator '{}' is missing an operand",
            op.symbol()
        )));
    };
    operands.push(Expr::binary(op, lhs, rhs));
    Ok(())
}

/// Whether `text` has the shape of a variable name.
pub fn is_name(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}
