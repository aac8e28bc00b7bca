//! Error types for document parsing

/// Reason given when an object turns up where only scalars or arrays are accepted
pub const ENCOUNTERED_OBJECT: &str = "encountered object";

/// Reason given when a basic field query resolves to an object
pub const USE_OBJECT_SELECTION: &str = "use object selection instead";

/// Errors that can occur while turning a JSON document into metrics
///
/// Every variant is terminal for the parse call that produced it.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Input is not syntactically valid JSON
    #[error("Invalid JSON provided, unable to parse: {0}")]
    InvalidDocument(String),
    /// A selection resolved to a value of the wrong shape
    #[error("Unsupported shape for field '{field}': {reason}")]
    UnsupportedShape { field: String, reason: &'static str },
    /// A declared type coercion failed
    #[error("Unable to convert field '{field}': {reason}")]
    Conversion { field: String, reason: String },
    /// The requested entry point is not provided by this parser
    #[error("{0}")]
    UnsupportedOperation(String),
}

impl ParseError {
    pub fn encountered_object(field: &str) -> Self {
        Self::UnsupportedShape {
            field: field.to_string(),
            reason: ENCOUNTERED_OBJECT,
        }
    }

    pub fn use_object_selection(field: &str) -> Self {
        Self::UnsupportedShape {
            field: field.to_string(),
            reason: USE_OBJECT_SELECTION,
        }
    }

    pub fn conversion(field: &str, reason: impl Into<String>) -> Self {
        Self::Conversion {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_error_names_field() {
        let err = ParseError::conversion("temp", "cannot convert to bool");
        assert_eq!(
            err.to_string(),
            "Unable to convert field 'temp': cannot convert to bool"
        );
    }

    #[test]
    fn test_shape_error_message() {
        let err = ParseError::use_object_selection("station");
        assert_eq!(
            err.to_string(),
            "Unsupported shape for field 'station': use object selection instead"
        );
    }
}
