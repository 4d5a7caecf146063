//! Executable node graph.
//!
//! Statements form chains of straight-line code; `If` and `While` own
//! their nested chains outright. Every node is its own codegen unit, see
//! [`crate::codegen_wasm`].
//!
//! Long expressions produce trees as deep as they have terms, and nested
//! blocks produce chains as deep as the source nests them. Neither
//! [`Expr`] nor [`Chain`] is dropped recursively: nested subtrees are
//! detached onto a heap-allocated worklist first.

/// Index of a local variable in the compiled function.
pub type Slot = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    Greater,
    Equal,
    NotEqual,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 8] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Less,
        BinaryOp::Greater,
        BinaryOp::Equal,
        BinaryOp::NotEqual,
    ];

    pub fn from_symbol(symbol: &str) -> Option<BinaryOp> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn priority(self) -> u8 {
        match self {
            BinaryOp::Equal | BinaryOp::NotEqual => 0,
            BinaryOp::Less | BinaryOp::Greater => 1,
            BinaryOp::Add | BinaryOp::Sub => 2,
            BinaryOp::Mul | BinaryOp::Div => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Const(i32),
    Var(Slot),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_operands(self, &mut pending);
        while let Some(mut expr) = pending.pop() {
            detach_operands(&mut expr, &mut pending);
        }
    }
}

/// Move the binary operands of `expr` onto `pending`, leaving constants.
fn detach_operands(expr: &mut Expr, pending: &mut Vec<Expr>) {
    if let Expr::Binary { lhs, rhs, .. } = expr {
        for operand in [lhs, rhs] {
            if matches!(**operand, Expr::Binary { .. }) {
                pending.push(std::mem::replace(&mut **operand, Expr::Const(0)));
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `let` binding: initialise a freshly allocated slot.
    Declare { slot: Slot, init: Expr },
    Assign { slot: Slot, value: Expr },
    /// Hand the value of a slot to the host print import.
    Print { slot: Slot },
    If {
        cond: Expr,
        then_branch: Chain,
        else_branch: Option<Chain>,
    },
    While { cond: Expr, body: Chain },
    /// Terminates the function body.
    End,
}

/// Ordered straight-line statements of one lexical level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    stmts: Vec<Stmt>,
}

impl Chain {
    pub fn new() -> Self {
        Chain::default()
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.stmts.push(stmt);
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stmt> {
        self.stmts.iter()
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach_branches(&mut self.stmts, &mut pending);
        while let Some(mut chain) = pending.pop() {
            detach_branches(&mut chain.stmts, &mut pending);
        }
    }
}

fn detach_branches(stmts: &mut [Stmt], pending: &mut Vec<Chain>) {
    for stmt in stmts {
        match stmt {
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                pending.push(std::mem::take(then_branch));
                pending.extend(else_branch.take());
            }
            Stmt::While { body, .. } => pending.push(std::mem::take(body)),
            _ => {}
        }
    }
}

impl FromIterator<Stmt> for Chain {
    fn from_iter<I: IntoIterator<Item = Stmt>>(iter: I) -> Self {
        Chain {
            stmts: iter.into_iter().collect(),
        }
    }
}

/// The single function body produced by one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub body: Chain,
    /// Number of distinct slots allocated while building `body`.
    pub local_count: u32,
}
