// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for the SDDS library.
//!
//! Every fallible operation returns [`SddsError`]. The variants follow the
//! layers of the library:
//! - Channel: opening, appending and decompressing byte streams
//! - Schema: header syntax, keywords, names and attributes
//! - Body: malformed page data, reported with file/page/field/row context
//! - Query: lookups and type coercion

use thiserror::Error;

/// Errors produced by dataset, schema, channel and query operations.
#[derive(Debug, Clone, Error)]
pub enum SddsError {
    /// The target could not be opened.
    #[error("Cannot open '{target}': {reason}")]
    ChannelOpen {
        /// Path or pipe designator
        target: String,
        /// Underlying failure
        reason: String,
    },

    /// Append was requested on a channel that cannot be appended to.
    #[error("Cannot append to '{target}': {reason}")]
    AppendNotSupported {
        /// Path or pipe designator
        target: String,
        /// Why append is impossible
        reason: String,
    },

    /// A compressed stream failed to decompress.
    #[error("Corrupt compressed stream '{target}': {reason}")]
    CorruptStream {
        /// Path or pipe designator
        target: String,
        /// Decoder message
        reason: String,
    },

    /// The textual header is malformed.
    #[error("Header syntax error at line {line}: {message}")]
    SchemaSyntax {
        /// 1-based header line where the offending block starts
        line: usize,
        /// Error message
        message: String,
    },

    /// A namelist block carries a keyword the format does not define.
    #[error("Unknown keyword '{keyword}' in &{group} block")]
    UnknownKeyword {
        /// Namelist group (parameter, column, data, ...)
        group: String,
        /// Offending keyword
        keyword: String,
    },

    /// A field name is already defined within its namespace.
    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName {
        /// Field kind
        kind: String,
        /// Field name
        name: String,
    },

    /// A field attribute is malformed.
    #[error("Invalid {attribute} for '{field}': {reason}")]
    InvalidAttribute {
        /// Field name (or pattern) the attribute belongs to
        field: String,
        /// Attribute name
        attribute: String,
        /// Validation message
        reason: String,
    },

    /// Page data does not match the schema.
    #[error("Data format error in {file}, page {page}, field '{field}', element {element}: {message}")]
    DataFormat {
        /// Channel name
        file: String,
        /// 1-based page number
        page: usize,
        /// Field being decoded
        field: String,
        /// Row (columns) or flat element (arrays) index
        element: usize,
        /// Error message
        message: String,
    },

    /// A value cannot be converted to the requested type without loss.
    #[error("Cannot coerce '{field}' from {from} to {to}")]
    TypeCoercion {
        /// Field name
        field: String,
        /// Stored type
        from: String,
        /// Requested type
        to: String,
    },

    /// A named field does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        /// Field kind
        kind: String,
        /// Field name
        name: String,
    },

    /// Two schemas do not describe the same layout.
    #[error("Schema mismatch: {reason}")]
    SchemaMismatch {
        /// First difference found
        reason: String,
    },

    /// An operation was called in the wrong lifecycle state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        /// Requested operation
        operation: String,
        /// Current state
        state: String,
    },

    /// Any other I/O failure.
    #[error("I/O error in {context}: {message}")]
    Io {
        /// What was being done
        context: String,
        /// Error message
        message: String,
    },
}

impl SddsError {
    /// Create a channel open error.
    pub fn channel_open(target: impl Into<String>, reason: impl Into<String>) -> Self {
        SddsError::ChannelOpen {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create an append not supported error.
    pub fn append_not_supported(target: impl Into<String>, reason: impl Into<String>) -> Self {
        SddsError::AppendNotSupported {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a corrupt stream error.
    pub fn corrupt_stream(target: impl Into<String>, reason: impl Into<String>) -> Self {
        SddsError::CorruptStream {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a header syntax error.
    pub fn schema_syntax(line: usize, message: impl Into<String>) -> Self {
        SddsError::SchemaSyntax {
            line,
            message: message.into(),
        }
    }

    /// Create an unknown keyword error.
    pub fn unknown_keyword(group: impl Into<String>, keyword: impl Into<String>) -> Self {
        SddsError::UnknownKeyword {
            group: group.into(),
            keyword: keyword.into(),
        }
    }

    /// Create a duplicate name error.
    pub fn duplicate_name(kind: impl Into<String>, name: impl Into<String>) -> Self {
        SddsError::DuplicateName {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an invalid attribute error.
    pub fn invalid_attribute(
        field: impl Into<String>,
        attribute: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SddsError::InvalidAttribute {
            field: field.into(),
            attribute: attribute.into(),
            reason: reason.into(),
        }
    }

    /// Create a data format error.
    pub fn data_format(
        file: impl Into<String>,
        page: usize,
        field: impl Into<String>,
        element: usize,
        message: impl Into<String>,
    ) -> Self {
        SddsError::DataFormat {
            file: file.into(),
            page,
            field: field.into(),
            element,
            message: message.into(),
        }
    }

    /// Create a type coercion error.
    pub fn type_coercion(
        field: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        SddsError::TypeCoercion {
            field: field.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a "not found" error.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        SddsError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a schema mismatch error.
    pub fn schema_mismatch(reason: impl Into<String>) -> Self {
        SddsError::SchemaMismatch {
            reason: reason.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(operation: impl Into<String>, state: impl Into<String>) -> Self {
        SddsError::InvalidState {
            operation: operation.into(),
            state: state.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, err: &std::io::Error) -> Self {
        SddsError::Io {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// True for errors raised while decoding page bodies.
    pub fn is_data_format(&self) -> bool {
        matches!(self, SddsError::DataFormat { .. })
    }

    /// True for errors raised while reading the header.
    pub fn is_header_error(&self) -> bool {
        matches!(
            self,
            SddsError::SchemaSyntax { .. }
                | SddsError::UnknownKeyword { .. }
                | SddsError::DuplicateName { .. }
                | SddsError::InvalidAttribute { .. }
        )
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            SddsError::ChannelOpen { target, reason }
            | SddsError::AppendNotSupported { target, reason }
            | SddsError::CorruptStream { target, reason } => {
                vec![("target", target.clone()), ("reason", reason.clone())]
            }
            SddsError::SchemaSyntax { line, message } => {
                vec![("line", line.to_string()), ("message", message.clone())]
            }
            SddsError::UnknownKeyword { group, keyword } => {
                vec![("group", group.clone()), ("keyword", keyword.clone())]
            }
            SddsError::DuplicateName { kind, name } | SddsError::NotFound { kind, name } => {
                vec![("kind", kind.clone()), ("name", name.clone())]
            }
            SddsError::InvalidAttribute {
                field,
                attribute,
                reason,
            } => vec![
                ("field", field.clone()),
                ("attribute", attribute.clone()),
                ("reason", reason.clone()),
            ],
            SddsError::DataFormat {
                file,
                page,
                field,
                element,
                message,
            } => vec![
                ("file", file.clone()),
                ("page", page.to_string()),
                ("field", field.clone()),
                ("element", element.to_string()),
                ("message", message.clone()),
            ],
            SddsError::TypeCoercion { field, from, to } => vec![
                ("field", field.clone()),
                ("from", from.clone()),
                ("to", to.clone()),
            ],
            SddsError::SchemaMismatch { reason } => vec![("reason", reason.clone())],
            SddsError::InvalidState { operation, state } => {
                vec![("operation", operation.clone()), ("state", state.clone())]
            }
            SddsError::Io { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
        }
    }
}

impl From<std::io::Error> for SddsError {
    fn from(err: std::io::Error) -> Self {
        SddsError::io("io", &err)
    }
}

/// Result type for SDDS operations.
pub type Result<T> = std::result::Result<T, SddsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_open_error() {
        let err = SddsError::channel_open("missing.sdds", "No such file or directory");
        assert!(matches!(err, SddsError::ChannelOpen { .. }));
        assert_eq!(
            err.to_string(),
            "Cannot open 'missing.sdds': No such file or directory"
        );
    }

    #[test]
    fn test_schema_syntax_error() {
        let err = SddsError::schema_syntax(3, "missing &end");
        assert!(err.is_header_error());
        assert_eq!(err.to_string(), "Header syntax error at line 3: missing &end");
    }

    #[test]
    fn test_unknown_keyword_error() {
        let err = SddsError::unknown_keyword("column", "colour");
        assert_eq!(
            err.to_string(),
            "Unknown keyword 'colour' in &column block"
        );
    }

    #[test]
    fn test_duplicate_name_error() {
        let err = SddsError::duplicate_name("column", "x");
        assert_eq!(err.to_string(), "Duplicate column name 'x'");
    }

    #[test]
    fn test_data_format_error() {
        let err = SddsError::data_format("run.sdds", 2, "doubleCol", 4, "bad number 'abc'");
        assert!(err.is_data_format());
        assert!(!err.is_header_error());
        assert_eq!(
            err.to_string(),
            "Data format error in run.sdds, page 2, field 'doubleCol', element 4: bad number 'abc'"
        );
    }

    #[test]
    fn test_type_coercion_error() {
        let err = SddsError::type_coercion("x", "double", "short");
        assert_eq!(err.to_string(), "Cannot coerce 'x' from double to short");
    }

    #[test]
    fn test_not_found_error() {
        let err = SddsError::not_found("parameter", "missing");
        assert_eq!(err.to_string(), "parameter 'missing' not found");
    }

    #[test]
    fn test_invalid_state_error() {
        let err = SddsError::invalid_state("end page", "no page is open");
        assert_eq!(err.to_string(), "Cannot end page while no page is open");
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SddsError = io.into();
        assert!(matches!(err, SddsError::Io { .. }));
        assert_eq!(err.to_string(), "I/O error in io: denied");
    }

    #[test]
    fn test_log_fields_data_format() {
        let err = SddsError::data_format("f", 1, "col", 7, "eof");
        let fields = err.log_fields();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0], ("file", "f".to_string()));
        assert_eq!(fields[1], ("page", "1".to_string()));
        assert_eq!(fields[3], ("element", "7".to_string()));
    }

    #[test]
    fn test_log_fields_shared_arms() {
        let err = SddsError::corrupt_stream("a.gz", "invalid gzip header");
        assert_eq!(
            err.log_fields(),
            vec![
                ("target", "a.gz".to_string()),
                ("reason", "invalid gzip header".to_string())
            ]
        );
        let err = SddsError::not_found("array", "a");
        assert_eq!(err.log_fields()[1], ("name", "a".to_string()));
    }

    #[test]
    fn test_error_clone() {
        let err = SddsError::schema_mismatch("column 'x' type differs");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
