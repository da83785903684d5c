use thiserror::Error;

/// Failures of the gateway, from composition at startup to planning and
/// forwarding a single request.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Upstream could not be reached or did not answer in time
    #[error("Failed to reach service '{service}': {source}")]
    Transport {
        service: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream answered with something that is not a GraphQL response
    #[error("Service '{service}' returned an invalid response: {message}")]
    InvalidResponse { service: String, message: String },

    /// Upstream SDL could not be parsed
    #[error("Failed to parse the schema of '{service}': {message}")]
    InvalidSchema { service: String, message: String },

    #[error("Field '{root}.{field}' is defined by both '{first}' and '{second}'")]
    FieldConflict {
        root: String,
        field: String,
        first: String,
        second: String,
    },

    #[error("Type '{name}' is defined with different kinds by '{first}' and '{second}'")]
    KindMismatch {
        name: String,
        first: String,
        second: String,
    },

    /// Request document does not parse
    #[error("{0}")]
    Syntax(String),

    #[error("Unknown operation named '{0}'.")]
    UnknownOperation(String),

    #[error("Operation name is required when the document contains several operations.")]
    OperationNameRequired,

    #[error("Subscriptions are not supported.")]
    SubscriptionUnsupported,

    #[error("Introspection is not supported, the composed schema is served at /sdl.")]
    IntrospectionUnsupported,

    #[error("Cannot query field '{field}' on type '{root}'.")]
    UnknownField { root: String, field: String },

    #[error("Unknown fragment '{0}'.")]
    UnknownFragment(String),

    #[error("Fragment on '{on}' cannot be spread on '{root}'.")]
    FragmentTypeMismatch { on: String, root: String },
}

impl GatewayError {
    /// Value of the `code` extension on the GraphQL error returned to the client.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Transport { .. } | GatewayError::InvalidResponse { .. } => {
                "UPSTREAM_ERROR"
            }
            GatewayError::InvalidSchema { .. }
            | GatewayError::FieldConflict { .. }
            | GatewayError::KindMismatch { .. } => "COMPOSITION_ERROR",
            GatewayError::Syntax(_) => "GRAPHQL_PARSE_FAILED",
            _ => "GRAPHQL_VALIDATION_FAILED",
        }
    }

    /// GraphQL error object for a response envelope.
    pub fn to_graphql_error(&self) -> serde_json::Value {
        let mut extensions = serde_json::Map::new();
        extensions.insert("code".to_string(), self.code().into());
        if let GatewayError::Transport { service, .. }
        | GatewayError::InvalidResponse { service, .. } = self
        {
            extensions.insert("service".to_string(), service.as_str().into());
        }
        serde_json::json!({
            "message": self.to_string(),
            "extensions": extensions,
        })
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
