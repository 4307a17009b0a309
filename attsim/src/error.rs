use thiserror::Error;

/// Category of a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    Nonsense,
    InvalidMnemonic,
    InvalidSuffix,
    InvalidRegister,
    InvalidLabel,
    DuplicateLabel,
    OperandMismatch,
    ConstantTooLarge,
    InvalidConstant,
    InvalidMemoryOperand,
    WrongOperandCount,
    DestinationIsConstant,
    TrailingGarbage,
}

/// A rejected line. `start..end` is the character range of the offending
/// text within the line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub start: usize,
    pub end: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            start,
            end,
        }
    }
}

/// A parse error tied to the source line it came from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {error}")]
pub struct SourceError {
    pub line: usize,
    pub text: String,
    pub error: ParseError,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Division overflow: quotient does not fit in the destination")]
    DivisionOverflow,

    #[error("Label '{0}' is not defined")]
    UnresolvedLabel(String),

    #[error("Stack underflow: no return address on the stack")]
    StackUnderflow,

    #[error("Invalid return address: {0}")]
    InvalidReturnAddress(i128),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error raised while evaluating the instruction on `line`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct RuntimeFault {
    pub line: usize,
    pub kind: FaultKind,
}

pub type Result<T, E = FaultKind> = std::result::Result<T, E>;
