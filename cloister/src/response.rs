//! The outcome of running one request.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;

use crate::value::Values;

/// A panic captured while an operation ran inside the guard.
///
/// Keeps the original panic payload untouched so it can be re-raised with the
/// same identity on the caller, plus the trace taken when the panic happened.
pub struct Fault {
    cause: Box<dyn Any + Send>,
    trace: Backtrace,
    location: Option<String>,
}

impl Fault {
    pub(crate) fn new(
        cause: Box<dyn Any + Send>,
        trace: Backtrace,
        location: Option<String>,
    ) -> Self {
        Self {
            cause,
            trace,
            location,
        }
    }

    /// The value the operation panicked with.
    pub fn cause(&self) -> &(dyn Any + Send) {
        &*self.cause
    }

    pub fn cause_as<T: Any>(&self) -> Option<&T> {
        self.cause.downcast_ref::<T>()
    }

    /// The panic message, when the payload is a string.
    pub fn message(&self) -> Option<&str> {
        self.cause
            .downcast_ref::<&'static str>()
            .copied()
            .or_else(|| self.cause.downcast_ref::<String>().map(String::as_str))
    }

    pub fn trace(&self) -> &Backtrace {
        &self.trace
    }

    /// `file:line:column` of the panic, when it was observed.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn into_cause(self) -> Box<dyn Any + Send> {
        self.cause
    }

    /// Re-raise the captured panic on the current thread.
    pub fn resume(self) -> ! {
        std::panic::resume_unwind(self.cause)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("message", &self.message())
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.message(), &self.location) {
            (Some(message), Some(location)) => write!(f, "panicked at {location}: {message}"),
            (Some(message), None) => write!(f, "panicked: {message}"),
            (None, Some(location)) => write!(f, "panicked at {location}"),
            (None, None) => f.write_str("panicked"),
        }
    }
}

/// Result of running an operation: its return values, or the fault it raised.
#[derive(Debug)]
pub enum Response {
    Success(Values),
    Failure(Fault),
}

impl Response {
    pub fn is_failure(&self) -> bool {
        matches!(self, Response::Failure(_))
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Response::Failure(fault) => Some(fault),
            Response::Success(_) => None,
        }
    }

    /// Return the values, or re-raise the fault on this thread.
    pub fn interpret(self) -> Values {
        match self {
            Response::Success(values) => values,
            Response::Failure(fault) => fault.resume(),
        }
    }

    pub fn into_result(self) -> Result<Values, Fault> {
        match self {
            Response::Success(values) => Ok(values),
            Response::Failure(fault) => Err(fault),
        }
    }
}

impl From<Values> for Response {
    fn from(values: Values) -> Self {
        Response::Success(values)
    }
}
