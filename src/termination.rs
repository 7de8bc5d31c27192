use std::fmt::{self, Display};
use std::panic::Location;
use std::str::FromStr;

use crate::constants::{NAME_FATAL_ERROR, NAME_PRECONDITION, NAME_PRECONDITION_FAILURE};

//######################################################################################################################
// Kinds of termination points

/// Identifies one termination point, and with it one handler slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TerminationKind {
    /// Unconditional termination
    FatalError,
    /// Termination because a checked condition was false
    Precondition,
    /// Termination because a state the author considers unreachable was reached
    PreconditionFailure,
}

impl TerminationKind {
    pub const ALL: [TerminationKind; 3] = [
        TerminationKind::FatalError,
        TerminationKind::Precondition,
        TerminationKind::PreconditionFailure,
    ];

    pub(crate) fn slot(self) -> usize {
        match self {
            Self::FatalError => 0,
            Self::Precondition => 1,
            Self::PreconditionFailure => 2,
        }
    }

    /// Prefix used when the default handler prints the diagnostic
    pub fn label(self) -> &'static str {
        match self {
            Self::FatalError => "Fatal error",
            Self::Precondition | Self::PreconditionFailure => "Precondition failed",
        }
    }
}

impl AsRef<str> for TerminationKind {
    fn as_ref(&self) -> &str {
        match self {
            Self::FatalError => NAME_FATAL_ERROR,
            Self::Precondition => NAME_PRECONDITION,
            Self::PreconditionFailure => NAME_PRECONDITION_FAILURE,
        }
    }
}

impl Display for TerminationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError(String);

impl Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown termination kind `{}`, expected one of `{}`, `{}`, `{}`",
            self.0, NAME_FATAL_ERROR, NAME_PRECONDITION, NAME_PRECONDITION_FAILURE
        )
    }
}

impl std::error::Error for ParseKindError {}

impl FromStr for TerminationKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            NAME_FATAL_ERROR => Ok(Self::FatalError),
            NAME_PRECONDITION => Ok(Self::Precondition),
            NAME_PRECONDITION_FAILURE => Ok(Self::PreconditionFailure),
            _ => Err(ParseKindError(s.to_string())),
        }
    }
}

//######################################################################################################################
// Source locations

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    /// Location of the caller, following `#[track_caller]` frames upwards.
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }
}

impl From<&'static Location<'static>> for SourceLocation {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

//######################################################################################################################
// Payload handed to handlers

/// A termination point that was reached, with its message already evaluated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Termination {
    pub kind: TerminationKind,
    pub message: String,
    /// The evaluated condition, only present for `precondition`
    pub condition: Option<bool>,
    pub location: SourceLocation,
}

impl Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}: {}", self.location, self.kind.label())
        } else {
            write!(
                f,
                "{}: {}: {}",
                self.location,
                self.kind.label(),
                self.message
            )
        }
    }
}
