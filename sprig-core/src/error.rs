use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("lex error at byte {position}: {message}")]
    LexError { position: usize, message: String },
    #[error("unexpected token at byte {position}: expected {expected}, found {found}")]
    UnexpectedToken {
        position: usize,
        expected: &'static str,
        found: String,
    },
    #[error("variable '{0}' is already declared in this block")]
    RedeclaredVariable(String),
    #[error("use of undeclared variable '{0}'")]
    UndeclaredVariable(String),
    #[error("unknown symbol '{0}' in expression")]
    UnknownSymbol(String),
    #[error("malformed expression: {0}")]
    MalformedExpression(String),
    #[error("unbalanced block: {0}")]
    UnbalancedBlock(String),
    #[error("empty or invalid block: {0}")]
    EmptyOrInvalidBlock(String),
    #[error("import '{module}.{field}' registered after an export")]
    ImportAfterExport { module: String, field: String },
    #[error("type index {0} is not registered")]
    UnknownTypeIndex(u32),
    #[error("function index {0} is not registered")]
    UnknownFunctionIndex(u32),
    #[error("malformed LEB128 value at byte {0}")]
    MalformedLeb128(usize),
}
