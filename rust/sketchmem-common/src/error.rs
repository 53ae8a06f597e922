use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    #[cold]
    pub fn out_of_bounds(offset: usize, width: usize, capacity: usize) -> Error {
        Error(
            ErrorKind::OutOfBounds {
                offset,
                width,
                capacity,
            }
            .into(),
        )
    }

    pub fn resize_refused(requested: usize, current: usize) -> Error {
        Error(ErrorKind::ResizeRefused { requested, current }.into())
    }

    pub fn allocation_failed(size: usize, source: std::io::Error) -> Error {
        Error(ErrorKind::AllocationFailed { size, source }.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// Returns `true` if this is an `OutOfBounds` error.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self.kind(), ErrorKind::OutOfBounds { .. })
    }

    /// Returns `true` if this is an `InvalidArgument` error.
    pub fn is_invalid_arg(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidArgument { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("access of {width} bytes at offset {offset} is out of bounds (capacity {capacity})")]
    OutOfBounds {
        offset: usize,
        width: usize,
        capacity: usize,
    },

    #[error("resize to {requested} bytes refused (current capacity {current})")]
    ResizeRefused { requested: usize, current: usize },

    #[error("failed to allocate {size} bytes: {source}")]
    AllocationFailed {
        size: usize,
        source: std::io::Error,
    },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_display() {
        let err = Error::out_of_bounds(64, 8, 64);
        assert!(err.is_out_of_bounds());
        assert_eq!(
            err.to_string(),
            "access of 8 bytes at offset 64 is out of bounds (capacity 64)"
        );
    }

    #[test]
    fn test_into_kind() {
        let err = Error::resize_refused(128, 64);
        match err.into_kind() {
            ErrorKind::ResizeRefused { requested, current } => {
                assert_eq!(requested, 128);
                assert_eq!(current, 64);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
