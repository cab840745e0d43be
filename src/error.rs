use http::HeaderName;
use thiserror::Error;

/// A control header carried a value the limiter does not accept.
///
/// Raised before the wrapped service is invoked, so a rejected request
/// never reaches the application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidHeaderError {
    /// The enable flag was present but not `0` or `1`.
    #[error("invalid value {value:?} for header `{header}`: expected \"0\" or \"1\"")]
    Enable {
        /// Name of the offending header.
        header: HeaderName,
        /// The received value, lossily decoded.
        value: String,
    },
    /// The byte limit was present but not a positive integer.
    #[error("invalid value {value:?} for header `{header}`: expected a positive integer")]
    Limit {
        /// Name of the offending header.
        header: HeaderName,
        /// The received value, lossily decoded.
        value: String,
    },
}

impl InvalidHeaderError {
    /// Returns the name of the header that failed validation.
    pub fn header(&self) -> &HeaderName {
        match self {
            InvalidHeaderError::Enable { header, .. } | InvalidHeaderError::Limit { header, .. } => {
                header
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_header_and_value() {
        let err = InvalidHeaderError::Limit {
            header: HeaderName::from_static("x-agouti-limit"),
            value: "foobar".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value \"foobar\" for header `x-agouti-limit`: expected a positive integer"
        );
        assert_eq!(err.header(), "x-agouti-limit");
    }
}
