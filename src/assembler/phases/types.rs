use crate::assembler::model::{DataItem, Operation};
use crate::spec::types::hw::Word;
use derive_more::Constructor;
use std::collections::HashMap;
use std::fmt::{self, Display};

/*
    Phases:

        1.  Tokenization: each source line is scanned into whitespace separated tokens, dropping
            line comments (`#`), inline comments (`/ ... /`) and word comments (`'word`). Tokens
            remember the line and column they came from.

        2.  Expansion: the token line is checked for the sugar shapes (alias declarations and
            calls). Aliases are substituted, calls are rewritten into their instruction sequence,
            and whatever remains is handed to the parser one instruction line at a time.

        3.  Parsing: a token line becomes a `Statement`, either a label definition, a block of
            data, or an operation whose operands have been validated against the wire format.
            Symbolic immediates are kept by name.

        4.  Resolution: walking the statements in order gives every label its address (the number
            of words before it). With the label map complete, every operation and data reference
            is encoded into its final words.

    Errors in the first three phases are recorded per line and do not stop the walk, so a
    single run reports every broken line. Resolution errors are gathered the same way. Any
    failure at all means no binary is produced.
*/

pub type LabelName = String;
pub type LabelMap = HashMap<LabelName, Word>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    LabelDef(LabelName),
    Data(Vec<DataItem>),
    Op(Operation),
}

impl Statement {
    pub fn words(&self) -> usize {
        match self {
            Statement::LabelDef(_) => 0,
            Statement::Data(items) => items.iter().map(DataItem::words).sum(),
            Statement::Op(_) => 1,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Eq, Constructor)]
pub struct Loc {
    line: usize,
    col: usize,
}

impl Loc {
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

impl Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(line: {}, col: {})", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located<T: Sized> {
    loc: Option<Loc>,
    val: T,
}

impl<T: Display> Display for Located<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.loc {
            None => write!(f, "@<unknown location>: {}", self.val),
            Some(loc) => write!(f, "@{}: {}", loc, self.val),
        }
    }
}

impl<T> Located<T> {
    fn new(loc: Option<Loc>, val: T) -> Self {
        Located { loc, val }
    }

    pub fn with_loc(loc: Loc, val: T) -> Self {
        Located::new(Some(loc), val)
    }

    pub fn loc(&self) -> Option<Loc> {
        self.loc
    }

    pub fn value(self) -> T {
        self.val
    }

    pub fn as_value(&self) -> &T {
        &self.val
    }

    pub fn proximate_to_option_loc(self, loc: Option<Loc>) -> Self {
        match self.loc {
            None => Self { loc, ..self },
            Some(_) => self,
        }
    }

    pub fn transfer<S>(&self, s: S) -> Located<S> {
        Located::new(self.loc, s)
    }
}

impl<T> From<T> for Located<T> {
    fn from(val: T) -> Self {
        Located { loc: None, val }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    Syntax(String, &'static str),
    InvalidOperand(String),
    InvalidRegister(String),
    InvalidDestination(String),
    ImmediateOutOfRange { min: i32, max: i32, value: i32 },
    UnresolvedLabel(LabelName),
    DuplicateModifier(String),
    UnbalancedLabelContext,
    InvalidStackOperand(String),
    DuplicateLabel(LabelName),
}

impl Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::Syntax(tk, msg) => write!(f, "Syntax error at '{}': {}", tk, msg),
            LineError::InvalidOperand(tk) => write!(f, "Invalid operand: '{}'", tk),
            LineError::InvalidRegister(tk) => write!(f, "Invalid register: '{}'", tk),
            LineError::InvalidDestination(tk) => write!(f, "Invalid destination: '{}'", tk),
            LineError::ImmediateOutOfRange { min, max, value } => write!(
                f,
                "Immediate {} out of range, must be between {} and {}",
                value, min, max
            ),
            LineError::UnresolvedLabel(label) => write!(f, "Unresolved label: '{}'", label),
            LineError::DuplicateModifier(tk) => write!(f, "Duplicate modifier: '{}'", tk),
            LineError::UnbalancedLabelContext => write!(f, "No open block for label context"),
            LineError::InvalidStackOperand(tk) => {
                write!(f, "Invalid stack operand, memory register expected: '{}'", tk)
            }
            LineError::DuplicateLabel(label) => write!(f, "Duplicate label: '{}'", label),
        }
    }
}

/// A broken source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub line: usize,
    pub source: String,
    pub error: Located<LineError>,
}

impl Failure {
    pub fn new(line: usize, source: &str, error: Located<LineError>) -> Self {
        Failure {
            line,
            source: source.to_owned(),
            error: error.proximate_to_option_loc(Some(Loc::new(line, 1))),
        }
    }
}

impl Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n    {}", self.error, self.source.trim_end())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    CompileFailed(Vec<Failure>),
}

impl Error {
    pub fn failures(&self) -> &[Failure] {
        match self {
            Error::CompileFailed(failures) => failures,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CompileFailed(failures) => {
                write!(f, "Assembly Error: {} line(s) failed to compile", failures.len())?;
                for failure in failures {
                    write!(f, "\n{}", failure)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {}
