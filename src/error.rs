//! Crate-wide error enums. No `thiserror` — the retrieval pack never reaches
//! for it, so these follow the teacher's plain-enum-plus-manual-impl style.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    NodeNotFound,
    DuplicateConnection,
    ConnectionNotFound,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::NodeNotFound => write!(f, "node not found in network"),
            NetworkError::DuplicateConnection => write!(f, "connection already exists between these nodes"),
            NetworkError::ConnectionNotFound => write!(f, "connection not found in network"),
        }
    }
}

impl std::error::Error for NetworkError {}

#[derive(Debug)]
pub enum ImportError {
    Xml(roxmltree::Error),
    UnsupportedVersion(String),
    MissingSection(&'static str),
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Xml(e) => write!(f, "xml parse error: {e}"),
            ImportError::UnsupportedVersion(v) => write!(f, "unsupported save version: {v}"),
            ImportError::MissingSection(s) => write!(f, "missing required section: {s}"),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<roxmltree::Error> for ImportError {
    fn from(e: roxmltree::Error) -> Self {
        ImportError::Xml(e)
    }
}
