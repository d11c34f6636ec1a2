use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("line {line}: `{op}` expects {expected}, found `{found}`")]
    Arity {
        line: usize,
        op: String,
        expected: &'static str,
        found: String,
    },

    #[error("line {line}: `{token}` is not a valid {what} for `{op}`")]
    BadOperand {
        line: usize,
        op: String,
        what: &'static str,
        token: String,
    },

    #[error("line {line}: `{op}` operand can't be negative (got {value})")]
    Negative { line: usize, op: String, value: i64 },

    #[error("line {line}: cannot pop into the constant segment")]
    PopConstant { line: usize },

    #[error("invalid command: `{}`", .tokens.join(" "))]
    InvalidCommand { tokens: Vec<String> },

    #[error("`{command}` appears before any function declaration")]
    OutsideFunction { command: String },

    #[error("line {line}: {source}")]
    Located {
        line: usize,
        source: Box<VmError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
