//! Error types shared by every cubekit crate.
//!
//! A single [`CubeError`] carries the abstract failure kinds. Errors may be
//! wrapped with context, forming a cause chain that is rendered outermost
//! first; [`CubeError::kind`] always reports the kind of the root cause.

use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;

/// Abstract failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    User,
    Io,
    Parse,
    UnsupportedPixelType,
    BadArgument,
    Configuration,
    NotFound,
    Camera,
    SpiceUnknown,
    Cancelled,
}

impl ErrorKind {
    /// Process exit code reserved for this kind: `1` for user-facing
    /// failures, `2` for internal ones.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::User
            | Self::Io
            | Self::Parse
            | Self::UnsupportedPixelType
            | Self::NotFound
            | Self::Cancelled => 1,
            Self::BadArgument | Self::Configuration | Self::Camera | Self::SpiceUnknown => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Io => "io",
            Self::Parse => "parse",
            Self::UnsupportedPixelType => "unsupported-pixel-type",
            Self::BadArgument => "bad-argument",
            Self::Configuration => "configuration-error",
            Self::NotFound => "not-found",
            Self::Camera => "camera",
            Self::SpiceUnknown => "spice-unknown",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by cubekit operations.
#[derive(Error, Debug)]
pub enum CubeError {
    /// Invalid input from the user or an input file.
    #[error("{0}")]
    User(String),

    /// A read or write failed on a file.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Foreign label grammar violation.
    #[error("parse error: {0}")]
    Parse(String),

    /// A declared pixel type that the codec does not support.
    #[error("unsupported pixel type: {0}")]
    UnsupportedPixelType(String),

    /// Out-of-contract argument.
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// An object used before its required setup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A label lookup missed.
    #[error("not found: {0}")]
    NotFound(String),

    /// A camera could not be set to the requested pixel or ground point.
    #[error("camera error: {0}")]
    Camera(String),

    /// Failure reported by the ephemeris or shape toolkit.
    #[error("ephemeris/shape toolkit error: {0}")]
    SpiceUnknown(String),

    /// Cancellation was observed.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Context wrapped around a cause.
    #[error("{message}")]
    Context {
        message: String,
        location: Option<&'static Location<'static>>,
        #[source]
        source: Box<CubeError>,
    },
}

impl CubeError {
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn unsupported_pixel_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedPixelType(msg.into())
    }

    pub fn bad_argument(msg: impl Into<String>) -> Self {
        Self::BadArgument(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn camera(msg: impl Into<String>) -> Self {
        Self::Camera(msg.into())
    }

    pub fn spice(msg: impl Into<String>) -> Self {
        Self::SpiceUnknown(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Wrap this error with a message, recording the caller's location.
    #[track_caller]
    pub fn wrap(self, message: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            location: Some(Location::caller()),
            source: Box::new(self),
        }
    }

    /// Kind of the root cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::User(_) => ErrorKind::User,
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse(_) => ErrorKind::Parse,
            Self::UnsupportedPixelType(_) => ErrorKind::UnsupportedPixelType,
            Self::BadArgument(_) => ErrorKind::BadArgument,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Camera(_) => ErrorKind::Camera,
            Self::SpiceUnknown(_) => ErrorKind::SpiceUnknown,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error of the chain.
    pub fn root(&self) -> &CubeError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Messages of the cause chain, outermost first. Context entries carry
    /// their source location when one was recorded.
    pub fn chain(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = self;
        loop {
            match current {
                Self::Context {
                    message,
                    location,
                    source,
                } => {
                    match location {
                        Some(loc) => out.push(format!("{} [{}:{}]", message, loc.file(), loc.line())),
                        None => out.push(message.clone()),
                    }
                    current = source;
                }
                other => {
                    out.push(other.to_string());
                    break;
                }
            }
        }
        out
    }

    /// Render the cause chain, one message per line.
    pub fn render(&self) -> String {
        self.chain()
            .iter()
            .enumerate()
            .map(|(depth, msg)| format!("{}{}", "  ".repeat(depth), msg))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Exit code for the root cause.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }
}

impl From<std::io::Error> for CubeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_yaml::Error> for CubeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Adds context to fallible results.
pub trait ResultExt<T> {
    /// Wrap the error (if any) with a message and the caller's location.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Like [`ResultExt::context`] but builds the message lazily.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    #[track_caller]
    fn context(self, message: impl Into<String>) -> Result<T> {
        let location = Location::caller();
        self.map_err(|source| CubeError::Context {
            message: message.into(),
            location: Some(location),
            source: Box::new(source),
        })
    }

    #[track_caller]
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        let location = Location::caller();
        self.map_err(|source| CubeError::Context {
            message: f().into(),
            location: Some(location),
            source: Box::new(source),
        })
    }
}

/// Result type for cubekit operations.
pub type Result<T> = std::result::Result<T, CubeError>;
