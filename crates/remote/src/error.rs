use reqwest::Method;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum RemoteError {
    #[snafu(display("remote base url '{raw}' is invalid on `{stage}`: {source}"))]
    InvalidBaseUrl {
        stage: &'static str,
        raw: String,
        source: url::ParseError,
    },
    #[snafu(display("remote base url '{raw}' cannot carry request paths"))]
    UnsupportedBaseUrl { stage: &'static str, raw: String },
    #[snafu(display("conversation id '{raw}' is invalid"))]
    InvalidId { stage: &'static str, raw: String },
    #[snafu(display("failed to build request body on `{stage}`: {source}"))]
    EncodeBody {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("{method} {path} failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        method: Method,
        path: String,
        source: reqwest::Error,
    },
    #[snafu(display("{method} {path} returned status {status}: {body}"))]
    Status {
        stage: &'static str,
        method: Method,
        path: String,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode response of {method} {path} on `{stage}`: {source}"))]
    Decode {
        stage: &'static str,
        method: Method,
        path: String,
        body: String,
        source: serde_json::Error,
    },
}

/// Coarse failure class used by flows that react differently per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// The request never reached the store or the response never came back.
    Transport,
    /// The store answered with a non-success status.
    Status,
    /// The store answered with a body of unexpected shape.
    Decode,
    /// The request could not be formed locally.
    Configuration,
}

impl RemoteError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            Self::Transport { .. } => RemoteErrorKind::Transport,
            Self::Status { .. } => RemoteErrorKind::Status,
            Self::Decode { .. } => RemoteErrorKind::Decode,
            Self::InvalidBaseUrl { .. }
            | Self::UnsupportedBaseUrl { .. }
            | Self::InvalidId { .. }
            | Self::EncodeBody { .. } => RemoteErrorKind::Configuration,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidBaseUrl { stage, .. }
            | Self::UnsupportedBaseUrl { stage, .. }
            | Self::InvalidId { stage, .. }
            | Self::EncodeBody { stage, .. }
            | Self::Transport { stage, .. }
            | Self::Status { stage, .. }
            | Self::Decode { stage, .. } => stage,
        }
    }

    /// Returns the HTTP status when the store answered with a non-success code.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;
