use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompanionError {
    /// Reading or writing a run file failed
    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing failed (request body, saved run file, model envelope)
    #[error("JSON parse error ({context}): {source}")]
    JsonParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization failed (run files, model requests)
    #[error("JSON serialize error ({context}): {source}")]
    JsonSerialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Model endpoint unreachable, timed out, or returned a malformed body
    #[error("model request to {endpoint} failed: {source}")]
    ModelRequest {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Model endpoint answered with a non-success status
    #[error("model endpoint {endpoint} returned {status}: {body}")]
    ModelStatus {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Writing a CSV record failed
    #[error("CSV error ({context}): {source}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },

    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl CompanionError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        CompanionError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json_parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        CompanionError::JsonParse {
            context: context.into(),
            source,
        }
    }

    pub fn json_serialize(context: impl Into<String>, source: serde_json::Error) -> Self {
        CompanionError::JsonSerialize {
            context: context.into(),
            source,
        }
    }

    pub fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        CompanionError::Csv {
            context: context.into(),
            source,
        }
    }
}
