//! Scope and block builder.
//!
//! Lexical levels live in an arena and are addressed by [`LevelId`];
//! `current` is the innermost open level. A level opened by `if` or
//! `while` carries its condition with it, so the condition and the
//! level are always closed together.
//!
//! An `else` level records which level holds its then-branch, but its
//! parent is the `if`'s enclosing level, not the then-level. The
//! then-level stays in the arena until the `if` closes, yet it is never
//! searched from the else-branch: names declared in the then-branch are
//! not visible there, and the else-branch may declare the same names
//! afresh. The two branches are siblings, never nested scopes.
//!
//! The builder also owns the slot counter, which makes one builder
//! equal to one compilation session.

use crate::error::CoreError;
use crate::expr::reduce;
use crate::node::{Chain, Expr, Program, Slot, Stmt};

pub type LevelId = usize;

const ROOT: LevelId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Condition,
    Loop,
}

#[derive(Debug)]
enum LevelKind {
    Root,
    Open { flow: Flow, cond: Expr },
    Else { then: LevelId },
    Closed,
}

#[derive(Debug)]
struct Level {
    /// Declarations in declaration order.
    names: Vec<(String, Slot)>,
    chain: Chain,
    kind: LevelKind,
    parent: Option<LevelId>,
}

impl Level {
    fn new(kind: LevelKind, parent: Option<LevelId>) -> Self {
        Level {
            names: Vec::new(),
            chain: Chain::new(),
            kind,
            parent,
        }
    }

    fn lookup(&self, name: &str) -> Option<Slot> {
        self.names
            .iter()
            .find_map(|(n, slot)| (n == name).then_some(*slot))
    }
}

#[derive(Debug)]
pub struct BlockBuilder {
    levels: Vec<Level>,
    current: LevelId,
    next_slot: Slot,
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockBuilder {
    pub fn new() -> Self {
        BlockBuilder {
            levels: vec![Level::new(LevelKind::Root, None)],
            current: ROOT,
            next_slot: 0,
        }
    }

    /// Find the slot bound to `name`, searching outward from the
    /// current level.
    pub fn resolve(&self, name: &str) -> Option<Slot> {
        let mut level = Some(self.current);
        while let Some(id) = level {
            let data = &self.levels[id];
            if let Some(slot) = data.lookup(name) {
                return Some(slot);
            }
            level = data.parent;
        }
        None
    }

    pub fn declare<S: AsRef<str>>(&mut self, name: &str, terms: &[S]) -> Result<(), CoreError> {
        if self.levels[self.current].lookup(name).is_some() {
            return Err(CoreError::RedeclaredVariable(name.to_string()));
        }
        let init = reduce(terms, |n| self.resolve(n))?;
        let slot = self.next_slot;
        self.next_slot += 1;
        let level = &mut self.levels[self.current];
        level.names.push((name.to_string(), slot));
        level.chain.push(Stmt::Declare { slot, init });
        Ok(())
    }

    pub fn assign<S: AsRef<str>>(&mut self, name: &str, terms: &[S]) -> Result<(), CoreError> {
        let slot = self
            .resolve(name)
            .ok_or_else(|| CoreError::UndeclaredVariable(name.to_string()))?;
        let value = reduce(terms, |n| self.resolve(n))?;
        self.push(Stmt::Assign { slot, value });
        Ok(())
    }

    pub fn print(&mut self, name: &str) -> Result<(), CoreError> {
        let slot = self
            .resolve(name)
            .ok_or_else(|| CoreError::UndeclaredVariable(name.to_string()))?;
        self.push(Stmt::Print { slot });
        Ok(())
    }

    pub fn enter_if<S: AsRef<str>>(&mut self, terms: &[S]) -> Result<(), CoreError> {
        self.open(Flow::Condition, terms)
    }

    pub fn enter_while<S: AsRef<str>>(&mut self, terms: &[S]) -> Result<(), CoreError> {
        self.open(Flow::Loop, terms)
    }

    /// Finish the then-branch of the innermost `if` and start its
    /// else-branch.
    pub fn enter_else(&mut self) -> Result<(), CoreError> {
        let then = self.current;
        if !self.in_then_branch() {
            return Err(CoreError::UnbalancedBlock(
                "'else' without a matching 'if'".to_string(),
            ));
        }
        let parent = self.levels[then].parent;
        self.current = self.levels.len();
        self.levels
            .push(Level::new(LevelKind::Else { then }, parent));
        Ok(())
    }

    /// Close the innermost block and append the resulting `If` or
    /// `While` node to the enclosing level.
    pub fn close_block(&mut self) -> Result<(), CoreError> {
        let closing = self.current;
        let (then_level, else_branch) = match self.levels[closing].kind {
            LevelKind::Else { then } => {
                let chain = self.take_level(closing).1;
                (then, (!chain.is_empty()).then_some(chain))
            }
            LevelKind::Open { .. } => (closing, None),
            LevelKind::Root | LevelKind::Closed => {
                return Err(CoreError::UnbalancedBlock(
                    "'}' without a matching block".to_string(),
                ));
            }
        };

        let parent = self.levels[then_level].parent.ok_or_else(|| {
            CoreError::UnbalancedBlock("block has no enclosing level".to_string())
        })?;
        let (kind, then_branch) = self.take_level(then_level);
        let LevelKind::Open { flow, cond } = kind else {
            return Err(CoreError::UnbalancedBlock(
                "'else' is not attached to an open 'if'".to_string(),
            ));
        };

        if then_branch.is_empty() {
            let construct = match flow {
                Flow::Condition => "'if'",
                Flow::Loop => "'while'",
            };
            return Err(CoreError::EmptyOrInvalidBlock(format!(
                "{construct} block has no statements"
            )));
        }

        let node = match flow {
            Flow::Condition => Stmt::If {
                cond,
                then_branch,
                else_branch,
            },
            Flow::Loop => Stmt::While {
                cond,
                body: then_branch,
            },
        };
        self.current = parent;
        self.push(node);
        Ok(())
    }

    /// Names declared at the top level, in declaration order.
    pub fn top_level_names(&self) -> Vec<String> {
        self.levels[ROOT]
            .names
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether the innermost open level is the then-branch of an `if`.
    pub fn in_then_branch(&self) -> bool {
        matches!(
            self.levels[self.current].kind,
            LevelKind::Open {
                flow: Flow::Condition,
                ..
            }
        )
    }

    /// Whether every opened block has been closed.
    pub fn is_balanced(&self) -> bool {
        self.current == ROOT
    }

    /// Terminate the top-level chain and hand out the finished program.
    pub fn finish(mut self) -> Result<Program, CoreError> {
        if !self.is_balanced() {
            return Err(CoreError::UnbalancedBlock(
                "end of input inside an open block".to_string(),
            ));
        }
        let root = &mut self.levels[ROOT];
        root.chain.push(Stmt::End);
        Ok(Program {
            body: std::mem::take(&mut root.chain),
            local_count: self.next_slot,
        })
    }

    fn open<S: AsRef<str>>(&mut self, flow: Flow, terms: &[S]) -> Result<(), CoreError> {
        let cond = reduce(terms, |n| self.resolve(n))?;
        let parent = Some(self.current);
        self.current = self.levels.len();
        self.levels
            .push(Level::new(LevelKind::Open { flow, cond }, parent));
        Ok(())
    }

    fn push(&mut self, stmt: Stmt) {
        self.levels[self.current].chain.push(stmt);
    }

    fn take_level(&mut self, id: LevelId) -> (LevelKind, Chain) {
        let level = &mut self.levels[id];
        let kind = std::mem::replace(&mut level.kind, LevelKind::Closed);
        (kind, std::mem::take(&mut level.chain))
    }
}
