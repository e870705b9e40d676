//! Terminal result of resolving one mod reference

use super::classify::ModReference;
use crate::catalogs::{CatalogError, ResolvedMod, SelectedFile};

use std::fmt;

/// Why a lookup produced nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    /// The catalog has no matching record
    NoMatch,
    /// CurseForge lookup skipped: no API key configured
    MissingApiKey,
    TimedOut { attempts: u32 },
    Transport(String),
}

impl From<CatalogError> for LookupFailure {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::MissingApiKey => LookupFailure::MissingApiKey,
            CatalogError::TimedOut { attempts } => LookupFailure::TimedOut { attempts },
            other => LookupFailure::Transport(other.to_string()),
        }
    }
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupFailure::NoMatch => f.write_str("no match"),
            LookupFailure::MissingApiKey => f.write_str("CurseForge API key is not set"),
            LookupFailure::TimedOut { attempts } => {
                write!(f, "timed out after {} attempts", attempts)
            }
            LookupFailure::Transport(msg) => f.write_str(msg),
        }
    }
}

/// Exactly one of these is produced per input reference
#[derive(Debug, Clone)]
pub enum ResolutionOutcome {
    Success {
        reference: ModReference,
        resolved: ResolvedMod,
        file: SelectedFile,
    },
    ModNotFound {
        reference: ModReference,
        cause: LookupFailure,
    },
    FileNotFound {
        reference: ModReference,
        mod_name: String,
        cause: LookupFailure,
    },
    Unsupported {
        reference: ModReference,
    },
}

impl ResolutionOutcome {
    pub fn reference(&self) -> &ModReference {
        match self {
            ResolutionOutcome::Success { reference, .. }
            | ResolutionOutcome::ModNotFound { reference, .. }
            | ResolutionOutcome::FileNotFound { reference, .. }
            | ResolutionOutcome::Unsupported { reference } => reference,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResolutionOutcome::Success { .. })
    }

    /// Underlying cause for not-found outcomes
    pub fn cause(&self) -> Option<&LookupFailure> {
        match self {
            ResolutionOutcome::ModNotFound { cause, .. }
            | ResolutionOutcome::FileNotFound { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Human readable failure reason, `None` for successes
    pub fn failure_reason(&self) -> Option<String> {
        let host = self.reference().host;
        match self {
            ResolutionOutcome::Success { .. } => None,
            ResolutionOutcome::Unsupported { .. } => Some("URL is not supported".to_string()),
            ResolutionOutcome::ModNotFound { cause, .. } => Some(match cause {
                LookupFailure::NoMatch => format!("mod not found on {}", host),
                other => format!("could not look up mod: {}", other),
            }),
            ResolutionOutcome::FileNotFound { cause, .. } => Some(match cause {
                LookupFailure::NoMatch => {
                    format!("no file on {} for this version and loader", host)
                }
                other => format!("could not look up files: {}", other),
            }),
        }
    }
}
