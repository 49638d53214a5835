//! Common error types.
//!
//! See [`InstallerError`] and [`InstallerErrorKind`] for details.
use std::fmt::Display;

/// Main error type for this crate.
#[derive(Debug, thiserror::Error)]
pub struct InstallerError {
    kind: InstallerErrorKind,
    context: String,
    source: Option<Box<dyn std::error::Error + 'static + Send + Sync>>,
}

impl InstallerError {
    /// Creates a new error with the given error kind.
    pub fn new(kind: InstallerErrorKind) -> Self {
        Self {
            kind,
            context: String::new(),
            source: None,
        }
    }

    /// Adds a source error.
    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: std::error::Error + 'static + Send + Sync,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Adds a string with a contextual description of the error.
    pub fn with_context<C>(mut self, value: C) -> Self
    where
        C: AsRef<str>,
    {
        if !self.context.is_empty() {
            self.context.push_str(": ");
        }
        self.context.push_str(value.as_ref());
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> &InstallerErrorKind {
        &self.kind
    }

    /// Returns the contextual description.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Returns whether the error kind is [`InstallerErrorKind::Io`].
    pub fn is_io(&self) -> bool {
        self.as_io().is_some()
    }

    /// Returns a reference to the IO error when the kind is [`InstallerErrorKind::Io`].
    pub fn as_io(&self) -> Option<&std::io::Error> {
        if self.kind.is_io() {
            if let Some(source) = &self.source {
                if let Some(error) = source.downcast_ref() {
                    return Some(error);
                }
            }
        }
        None
    }
}

impl Display for InstallerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.context.is_empty() {
            f.write_str(&self.context)?;
            f.write_str(": ")?;
        }

        self.kind.fmt(f)?;

        Ok(())
    }
}

impl From<InstallerErrorKind> for InstallerError {
    fn from(value: InstallerErrorKind) -> Self {
        Self::new(value)
    }
}

impl From<std::io::Error> for InstallerError {
    fn from(value: std::io::Error) -> Self {
        Self::new(InstallerErrorKind::Io).with_source(value)
    }
}

impl From<AdditionalContext> for InstallerError {
    fn from(value: AdditionalContext) -> Self {
        Self::new(InstallerErrorKind::Other).with_source(value)
    }
}

/// Error category for [`InstallerError`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum InstallerErrorKind {
    /// Input/Output error usually from [`std::io::Error`].
    ///
    /// Filesystem failures are reported with this kind.
    #[error("input/output error")]
    Io,

    /// Invalid input or argument type to a function.
    #[error("invalid input or argument")]
    InvalidInput,

    /// Invalid data or value provided to a function.
    #[error("invalid data or value")]
    InvalidData,

    /// Unsupported OS family or platform.
    #[error("unsupported platform")]
    UnsupportedOsFamily,

    /// Environment variable was missing or malformed.
    #[error("invalid environment variable")]
    InvalidEnvironmentVariable,

    /// A program required by a step could not be found.
    #[error("missing dependency")]
    MissingDependency,

    /// An external program ran but reported failure.
    #[error("external command failed")]
    CommandFailed,

    /// A file could not be downloaded from any of its sources.
    #[error("download failed")]
    DownloadFailure,

    /// Could not locate the [`crate::manifest::DiskManifest`].
    #[error("disk manifest not found")]
    DiskManifestNotFound,

    /// [`crate::manifest::DiskManifest`] could not be parsed.
    ///
    /// It may be tampered, corrupted, or an incompatible version.
    #[error("malformed disk manifest")]
    MalformedDiskManifest,

    /// The [`crate::manifest::DiskManifest`] on disk belongs to another application.
    #[error("mismatched disk manifest")]
    MismatchedDiskManifest,

    /// A path the installer writes to is occupied by something it did not create.
    #[error("unknown file in destination")]
    UnknownFileInDestination,

    /// Internal console/terminal library returned an error.
    #[error("console/terminal error")]
    Terminal,

    /// Nothing belonging to the application was found on disk.
    #[error("application is not installed")]
    NotInstalled,

    /// A guided interactive session was aborted by the user.
    #[error("interrupted by user")]
    InterruptedByUser,

    /// The process received an interrupt signal.
    #[error("interrupted by signal")]
    Interrupted,

    /// Any other error.
    #[error("other")]
    Other,
}

impl InstallerErrorKind {
    /// Returns whether it is the Io variant.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io)
    }

    /// Returns whether the user or a signal stopped the operation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::InterruptedByUser | Self::Interrupted)
    }
}

/// Modify `Result<T, InstallerError>` with context.
pub trait AddInstallerContext<T> {
    /// Add context using the given string when Err.
    fn inst_context<C>(self, context: C) -> Result<T, InstallerError>
    where
        C: AsRef<str>;

    /// Add context using the evaluated function when Err.
    fn inst_contextc<C, CT>(self, context: C) -> Result<T, InstallerError>
    where
        C: FnOnce() -> CT,
        CT: AsRef<str>;
}

impl<T> AddInstallerContext<T> for Result<T, InstallerError> {
    fn inst_context<C>(self, context: C) -> Result<T, InstallerError>
    where
        C: AsRef<str>,
    {
        self.map_err(|error| error.with_context(context.as_ref()))
    }

    fn inst_contextc<C, CT>(self, context: C) -> Result<T, InstallerError>
    where
        C: FnOnce() -> CT,
        CT: AsRef<str>,
    {
        self.map_err(|error| error.with_context(context().as_ref()))
    }
}

/// Contains a contextual description of an error.
///
/// This isn't a real error, but allows injecting context in the error stack.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AdditionalContext {
    message: String,
    #[source]
    source: Box<dyn std::error::Error + Sync + Send + 'static>,
}

impl AdditionalContext {
    /// Creates a new context error with the given message and source error.
    pub fn new<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Sync + Send + 'static,
    {
        Self {
            message,
            source: Box::new(source),
        }
    }
}

/// Trait for wrapping errors in Result with descriptive context strings.
pub trait AddContext<T, E, A> {
    /// Map the error with an error containing the context string.
    fn with_context<C>(self, context: C) -> Result<T, A>
    where
        C: Into<String>;

    /// Map the error with an error containing the context string evaluated from a function.
    fn with_contextc<C, CT>(self, context: C) -> Result<T, A>
    where
        C: FnOnce(&E) -> CT,
        CT: Into<String>;
}

impl<T, E> AddContext<T, E, AdditionalContext> for Result<T, E>
where
    E: std::error::Error + Sync + Send + 'static,
{
    fn with_context<C>(self, context: C) -> Result<T, AdditionalContext>
    where
        C: Into<String>,
    {
        self.map_err(|error| AdditionalContext::new(context.into(), error))
    }

    fn with_contextc<C, CT>(self, context: C) -> Result<T, AdditionalContext>
    where
        C: FnOnce(&E) -> CT,
        CT: Into<String>,
    {
        self.map_err(|error| AdditionalContext::new(context(&error).into(), error))
    }
}

pub(crate) fn format_error<E>(error: E) -> String
where
    E: std::error::Error,
{
    let mut buf = error.to_string();

    let mut error: Box<&dyn std::error::Error> = Box::new(&error);

    while let Some(source) = error.source() {
        error = Box::new(source);
        buf.push_str("\n↳");
        buf.push_str(&error.to_string());
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_display() {
        let error = InstallerError::new(InstallerErrorKind::DownloadFailure)
            .with_context("model")
            .with_context("https://example.com/a.onnx");

        assert_eq!(
            error.to_string(),
            "model: https://example.com/a.onnx: download failed"
        );
    }

    #[test]
    fn test_as_io() {
        let error = InstallerError::from(std::io::Error::other("disk full"));

        assert!(error.is_io());
        assert_eq!(error.as_io().unwrap().to_string(), "disk full");

        let error = InstallerError::new(InstallerErrorKind::Other);
        assert!(!error.is_io());
    }

    #[test]
    fn test_format_error_chain() {
        let inner = std::io::Error::other("connection reset");
        let error = AdditionalContext::new("fetching release".to_string(), inner);

        assert_eq!(format_error(error), "fetching release\n↳connection reset");
    }

    #[test]
    fn test_cancellation_kinds() {
        assert!(InstallerErrorKind::InterruptedByUser.is_cancellation());
        assert!(InstallerErrorKind::Interrupted.is_cancellation());
        assert!(!InstallerErrorKind::MissingDependency.is_cancellation());
    }
}
