use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum StoreError {
    /// A required attribute is blank.
    MissingValue { entity: &'static str, field: &'static str },
    /// Document does not match the structural schema.
    SchemaViolation { path: String, message: String },
    /// Schema or document file is absent.
    ResourceNotFound(PathBuf),
    /// An operation was handed a reference or value it cannot act on.
    ArgumentInvalid(String),
    /// Document text is not well-formed JSON.
    Parse(String),
    /// IO error (file read, write, rename).
    Io(String),
    /// Any of the above, raised at the load/save boundary.
    Repository {
        operation: &'static str,
        path: PathBuf,
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Innermost error, looking through repository wrapping.
    pub fn root(&self) -> &StoreError {
        match self {
            Self::Repository { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn at_boundary(self, operation: &'static str, path: PathBuf) -> Self {
        match self {
            wrapped @ Self::Repository { .. } => wrapped,
            other => Self::Repository {
                operation,
                path,
                source: Box::new(other),
            },
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue { entity, field } => {
                write!(f, "{entity}: required value '{field}' is blank")
            }
            Self::SchemaViolation { path, message } => {
                write!(f, "schema violation at '{path}': {message}")
            }
            Self::ResourceNotFound(path) => write!(f, "resource not found: {}", path.display()),
            Self::ArgumentInvalid(msg) => write!(f, "invalid argument: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Repository {
                operation,
                path,
                source,
            } => write!(f, "cannot {operation} '{}': {source}", path.display()),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Repository { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

pub(crate) fn require(
    value: &str,
    entity: &'static str,
    field: &'static str,
) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::MissingValue { entity, field });
    }
    Ok(())
}
