//! WASM instruction emission for the node graph.
//!
//! Each node writes its own instruction bytes from nothing but its own
//! fields. Operands are always emitted before the operator that
//! consumes them, matching the evaluation order of the stack machine.

use crate::leb128::{write_signed, write_unsigned};
use crate::node::{BinaryOp, Chain, Expr, Stmt};

pub mod opcode {
    pub const BLOCK: u8 = 0x02;
    pub const LOOP: u8 = 0x03;
    pub const IF: u8 = 0x04;
    pub const ELSE: u8 = 0x05;
    pub const END: u8 = 0x0b;
    pub const BR: u8 = 0x0c;
    pub const BR_IF: u8 = 0x0d;
    pub const CALL: u8 = 0x10;
    pub const LOCAL_GET: u8 = 0x20;
    pub const LOCAL_SET: u8 = 0x21;
    pub const I32_CONST: u8 = 0x41;
    pub const I32_EQZ: u8 = 0x45;
    pub const I32_EQ: u8 = 0x46;
    pub const I32_NE: u8 = 0x47;
    pub const I32_LT_S: u8 = 0x48;
    pub const I32_GT_S: u8 = 0x4a;
    pub const I32_ADD: u8 = 0x6a;
    pub const I32_SUB: u8 = 0x6b;
    pub const I32_MUL: u8 = 0x6c;
    pub const I32_DIV_S: u8 = 0x6d;
}

/// Block type of structured instructions that produce no value.
pub const VOID_BLOCK: i64 = -0x40;

/// Function index of the host print import.
pub const PRINT_FUNCTION: u32 = 0;

pub fn binary_opcode(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Add => opcode::I32_ADD,
        BinaryOp::Sub => opcode::I32_SUB,
        BinaryOp::Mul => opcode::I32_MUL,
        BinaryOp::Div => opcode::I32_DIV_S,
        BinaryOp::Less => opcode::I32_LT_S,
        BinaryOp::Greater => opcode::I32_GT_S,
        BinaryOp::Equal => opcode::I32_EQ,
        BinaryOp::NotEqual => opcode::I32_NE,
    }
}

/// Trailer of an `if`: close the structured block.
const IF_TAIL: &[u8] = &[opcode::END];
/// Trailer of a `while`: `br 0` back to the loop head, then close the
/// loop and the enclosing block.
const WHILE_TAIL: &[u8] = &[opcode::BR, 0x00, opcode::END, opcode::END];

enum Pending<'a> {
    Stmt(&'a Stmt),
    Else(&'a Chain),
    Bytes(&'static [u8]),
}

/// Emit every statement of `chain` in order.
pub fn emit_chain(chain: &Chain, sink: &mut Vec<u8>) {
    let mut pending = Vec::new();
    schedule(&mut pending, chain);
    drain(pending, sink);
}

pub fn emit_stmt(stmt: &Stmt, sink: &mut Vec<u8>) {
    drain(vec![Pending::Stmt(stmt)], sink);
}

/// Queue `chain` so that its first statement is popped next.
fn schedule<'a>(pending: &mut Vec<Pending<'a>>, chain: &'a Chain) {
    pending.extend(chain.iter().rev().map(Pending::Stmt));
}

/// Nested chains go onto `pending` ahead of their trailing bytes, so the
/// nesting depth of the source never becomes call depth here.
fn drain<'a>(mut pending: Vec<Pending<'a>>, sink: &mut Vec<u8>) {
    while let Some(item) = pending.pop() {
        let stmt = match item {
            Pending::Stmt(stmt) => stmt,
            Pending::Else(chain) => {
                sink.push(opcode::ELSE);
                schedule(&mut pending, chain);
                continue;
            }
            Pending::Bytes(bytes) => {
                sink.extend_from_slice(bytes);
                continue;
            }
        };
        match stmt {
            Stmt::Declare { slot, init: value } | Stmt::Assign { slot, value } => {
                emit_expr(value, sink);
                sink.push(opcode::LOCAL_SET);
                write_unsigned(sink, u64::from(*slot));
            }
            Stmt::Print { slot } => {
                sink.push(opcode::LOCAL_GET);
                write_unsigned(sink, u64::from(*slot));
                sink.push(opcode::CALL);
                write_unsigned(sink, u64::from(PRINT_FUNCTION));
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                emit_expr(cond, sink);
                sink.push(opcode::IF);
                write_signed(sink, VOID_BLOCK);
                pending.push(Pending::Bytes(IF_TAIL));
                if let Some(else_branch) = else_branch {
                    pending.push(Pending::Else(else_branch));
                }
                schedule(&mut pending, then_branch);
            }
            Stmt::While { cond, body } => {
                sink.push(opcode::BLOCK);
                write_signed(sink, VOID_BLOCK);
                sink.push(opcode::LOOP);
                write_signed(sink, VOID_BLOCK);
                // Leave the outer block once the condition is false.
                emit_expr(cond, sink);
                sink.push(opcode::I32_EQZ);
                sink.push(opcode::BR_IF);
                write_unsigned(sink, 1);
                pending.push(Pending::Bytes(WHILE_TAIL));
                schedule(&mut pending, body);
            }
            Stmt::End => sink.push(opcode::END),
        }
    }
}

enum Step<'a> {
    Visit(&'a Expr),
    Apply(BinaryOp),
}

/// Emit `expr` in post-order: both operands, then the operator.
pub fn emit_expr(expr: &Expr, sink: &mut Vec<u8>) {
    let mut steps = vec![Step::Visit(expr)];
    while let Some(step) = steps.pop() {
        match step {
            Step::Visit(Expr::Const(value)) => {
                sink.push(opcode::I32_CONST);
                write_signed(sink, i64::from(*value));
            }
            Step::Visit(Expr::Var(slot)) => {
                sink.push(opcode::LOCAL_GET);
                write_unsigned(sink, u64::from(*slot));
            }
            Step::Visit(Expr::Binary { op, lhs, rhs }) => {
                steps.push(Step::Apply(*op));
                steps.push(Step::Visit(rhs));
                steps.push(Step::Visit(lhs));
            }
            Step::Apply(op) => sink.push(binary_opcode(op)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt_bytes(stmt: &Stmt) -> Vec<u8> {
        let mut sink = Vec::new();
        emit_stmt(stmt, &mut sink);
        sink
    }

    #[test]
    fn emits_binary_operands_before_operator() {
        let expr = Expr::binary(
            BinaryOp::Sub,
            Expr::Var(2),
            Expr::binary(BinaryOp::Mul, Expr::Const(3), Expr::Const(-1)),
        );
        let mut sink = Vec::new();
        emit_expr(&expr, &mut sink);
        assert_eq!(
            sink,
            vec![0x20, 0x02, 0x41, 0x03, 0x41, 0x7f, 0x6c, 0x6b]
        );
    }

    #[test]
    fn emits_declaration_as_store() {
        let stmt = Stmt::Declare {
            slot: 200,
            init: Expr::Const(64),
        };
        assert_eq!(stmt_bytes(&stmt), vec![0x41, 0xc0, 0x00, 0x21, 0xc8, 0x01]);
    }

    #[test]
    fn emits_print_as_load_and_call() {
        assert_eq!(
            stmt_bytes(&Stmt::Print { slot: 1 }),
            vec![0x20, 0x01, 0x10, 0x00]
        );
    }

    #[test]
    fn emits_if_else() {
        let stmt = Stmt::If {
            cond: Expr::Var(0),
            then_branch: [Stmt::Assign {
                slot: 0,
                value: Expr::Const(1),
            }]
            .into_iter()
            .collect(),
            else_branch: Some(
                [Stmt::Assign {
                    slot: 0,
                    value: Expr::Const(2),
                }]
                .into_iter()
                .collect(),
            ),
        };
        assert_eq!(
            stmt_bytes(&stmt),
            vec![
                0x20, 0x00, // local.get 0
                0x04, 0x40, // if (void)
                0x41, 0x01, 0x21, 0x00, // local.set 0 (1)
                0x05, // else
                0x41, 0x02, 0x21, 0x00, // local.set 0 (2)
                0x0b, // end
            ]
        );
    }

    #[test]
    fn emits_while_as_block_wrapped_loop() {
        let stmt = Stmt::While {
            cond: Expr::binary(BinaryOp::Less, Expr::Var(0), Expr::Const(5)),
            body: [Stmt::Assign {
                slot: 0,
                value: Expr::binary(BinaryOp::Add, Expr::Var(0), Expr::Const(1)),
            }]
            .into_iter()
            .collect(),
        };
        assert_eq!(
            stmt_bytes(&stmt),
            vec![
                0x02, 0x40, // block
                0x03, 0x40, // loop
                0x20, 0x00, 0x41, 0x05, 0x48, // i < 5
                0x45, 0x0d, 0x01, // br_if 1 unless condition
                0x20, 0x00, 0x41, 0x01, 0x6a, 0x21, 0x00, // i = i + 1
                0x0c, 0x00, // br 0
                0x0b, 0x0b, // end loop, end block
            ]
        );
    }

    #[test]
    fn nested_chains_keep_their_trailers_in_order() {
        let inner = Stmt::If {
            cond: Expr::Var(0),
            then_branch: [Stmt::Print { slot: 0 }].into_iter().collect(),
            else_branch: None,
        };
        let stmt = Stmt::While {
            cond: Expr::Var(0),
            body: [inner, Stmt::Print { slot: 1 }].into_iter().collect(),
        };
        assert_eq!(
            stmt_bytes(&stmt),
            vec![
                0x02, 0x40, 0x03, 0x40, // block, loop
                0x20, 0x00, 0x45, 0x0d, 0x01, // br_if 1 unless slot 0
                0x20, 0x00, 0x04, 0x40, // if slot 0
                0x20, 0x00, 0x10, 0x00, // print slot 0
                0x0b, // end if
                0x20, 0x01, 0x10, 0x00, // print slot 1
                0x0c, 0x00, 0x0b, 0x0b, // br 0, end loop, end block
            ]
        );
    }

    #[test]
    fn emits_very_deep_expressions() {
        const TERMS: usize = 100_000;
        let mut expr = Expr::Const(1);
        for _ in 0..TERMS {
            expr = Expr::binary(BinaryOp::Add, expr, Expr::Const(1));
        }
        let mut sink = Vec::new();
        emit_expr(&expr, &mut sink);

        let mut expected = vec![0x41, 0x01];
        for _ in 0..TERMS {
            expected.extend_from_slice(&[0x41, 0x01, 0x6a]);
        }
        assert_eq!(sink, expected);
    }

    #[test]
    fn emits_very_deep_nesting() {
        const DEPTH: usize = 100_000;
        let mut chain: Chain = [Stmt::Print { slot: 0 }].into_iter().collect();
        for _ in 0..DEPTH {
            chain = [Stmt::If {
                cond: Expr::Var(0),
                then_branch: chain,
                else_branch: None,
            }]
            .into_iter()
            .collect();
        }
        let mut sink = Vec::new();
        emit_chain(&chain, &mut sink);

        let opens = sink
            .windows(4)
            .filter(|window| window[..] == [0x20, 0x00, 0x04, 0x40])
            .count();
        assert_eq!(opens, DEPTH);
        assert_eq!(sink.len(), DEPTH * 5 + 4);
        assert!(sink.ends_with(&[0x20, 0x00, 0x10, 0x00, 0x0b, 0x0b]));
    }

    #[test]
    fn maps_every_operator_to_its_opcode() {
        let opcodes: Vec<u8> = BinaryOp::ALL.into_iter().map(binary_opcode).collect();
        assert_eq!(opcodes, vec![0x6a, 0x6b, 0x6c, 0x6d, 0x48, 0x4a, 0x46, 0x47]);
    }
}
