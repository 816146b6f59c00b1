use std::convert::Infallible;

use thiserror::Error;

use crate::runtime::{ErrorClass, IoRuntime};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Runtime error in {op}: {class}")]
    Runtime { op: &'static str, class: ErrorClass },
    #[error("Participant error: {0}")]
    Participant(String),
}

impl Error {
    pub fn runtime(op: &'static str, class: ErrorClass) -> Self {
        Error::Runtime { op, class }
    }

    /// Process exit status used when the group is aborted on this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Runtime { class, .. } => class.code(),
            Error::Config(_) | Error::Participant(_) => 1,
        }
    }

    /// Renders the diagnostic line, resolving runtime classes through the
    /// runtime's own description table.
    pub fn describe<R: IoRuntime + ?Sized>(&self, runtime: &R) -> String {
        match self {
            Error::Runtime { op, class } => format!("{op}: {}", runtime.error_string(*class)),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Turns a runtime status into a crate error tagged with the failing call.
pub(crate) trait Check<T> {
    fn check(self, op: &'static str) -> Result<T>;
}

impl<T> Check<T> for std::result::Result<T, ErrorClass> {
    fn check(self, op: &'static str) -> Result<T> {
        self.map_err(|class| Error::runtime(op, class))
    }
}

/// Fail-fast handling: any error is reported and the whole group is aborted.
pub trait OrAbort<T> {
    fn or_abort<R: IoRuntime + ?Sized>(self, runtime: &R) -> T;
}

impl<T> OrAbort<T> for Result<T> {
    fn or_abort<R: IoRuntime + ?Sized>(self, runtime: &R) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                let message = err.describe(runtime);
                tracing::error!(rank = runtime.group_rank(), %message, "aborting participant group");
                eprintln!("\nerror: {message}\n");
                let never: Infallible = runtime.abort(err.exit_code());
                match never {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::runtime::mock::MockRuntime;

    #[test]
    fn test_exit_codes_are_nonzero() {
        assert_eq!(Error::Config("bad".into()).exit_code(), 1);
        assert_eq!(Error::Participant("gone".into()).exit_code(), 1);
        for class in [ErrorClass::File, ErrorClass::NoSuchFile, ErrorClass::Io, ErrorClass::Other] {
            assert_ne!(Error::runtime("open", class).exit_code(), 0);
        }
    }

    #[test]
    fn test_describe_uses_runtime_description() {
        let mut runtime = MockRuntime::default();
        runtime
            .expect_error_string()
            .withf(|class| *class == ErrorClass::NoSuchFile)
            .times(1)
            .returning(|_| "no such file from runtime".to_string());

        let err = Error::runtime("open", ErrorClass::NoSuchFile);
        assert_eq!(err.describe(&runtime), "open: no such file from runtime");

        let err = Error::Config("group size must be positive".into());
        assert_eq!(
            err.describe(&runtime),
            "Configuration error: group size must be positive"
        );
    }

    #[test]
    fn test_check_tags_operation() {
        let status: std::result::Result<u64, ErrorClass> = Err(ErrorClass::BadOffset);
        match status.check("get_size") {
            Err(Error::Runtime { op, class }) => {
                assert_eq!(op, "get_size");
                assert_eq!(class, ErrorClass::BadOffset);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "aborted")]
    fn test_or_abort_reports_and_aborts_group() {
        let mut runtime = MockRuntime::default();
        runtime.expect_group_rank().return_const(2usize);
        runtime
            .expect_error_string()
            .with(eq(ErrorClass::NoSuchFile))
            .times(1)
            .returning(|_| "no such file from runtime".to_string());
        runtime
            .expect_abort()
            .with(eq(ErrorClass::NoSuchFile.code()))
            .times(1)
            .returning(|code| {
                assert_ne!(code, 0);
                panic!("aborted")
            });

        let failed: Result<u32> = Err(Error::runtime("open", ErrorClass::NoSuchFile));
        failed.or_abort(&runtime);
    }

    #[test]
    fn test_or_abort_passes_values_through() {
        let runtime = MockRuntime::default();
        let value: Result<u32> = Ok(7);
        assert_eq!(value.or_abort(&runtime), 7);
    }
}
