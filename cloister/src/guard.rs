//! Guarded execution: run an operation and turn a panic into a failed [`Response`].
//!
//! The backtrace is taken by a process-wide panic hook at the moment the panic
//! starts, while the faulting frames are still on the stack. The hook only
//! acts while a guard scope is entered on the panicking thread; every other
//! panic is handed to whichever hook was installed before.

use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context as TaskContext, Poll};

use pin_project::pin_project;

use crate::response::{Fault, Response};
use crate::value::Values;

static INSTALL_HOOK: Once = Once::new();

thread_local! {
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
    static CAPTURED: RefCell<Option<(Backtrace, Option<String>)>> = const { RefCell::new(None) };
}

fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            if GUARD_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let location = info.location().map(|location| location.to_string());
            tracing::trace!(?location, "panic inside guarded operation");
            CAPTURED.with(|captured| {
                *captured.borrow_mut() = Some((Backtrace::force_capture(), location));
            });
        }));
    });
}

/// Marks the current thread as running guarded code for as long as it lives.
struct GuardScope;

impl GuardScope {
    fn enter() -> Self {
        install_hook();
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        GuardScope
    }
}

impl Drop for GuardScope {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

fn fault_from(cause: Box<dyn std::any::Any + Send>) -> Fault {
    // Missing when another hook replaced ours after installation.
    let (trace, location) = CAPTURED
        .with(|captured| captured.borrow_mut().take())
        .unwrap_or_else(|| (Backtrace::force_capture(), None));
    Fault::new(cause, trace, location)
}

/// Run `f`, converting a panic into [`Response::Failure`].
pub fn execute<F>(f: F) -> Response
where
    F: FnOnce() -> Values,
{
    let _scope = GuardScope::enter();
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(values) => Response::Success(values),
        Err(cause) => Response::Failure(fault_from(cause)),
    }
}

/// A future resolving to the [`Response`] of the wrapped future.
///
/// Each poll runs inside a guard scope. After a panic the inner future is
/// never polled again.
#[pin_project]
pub struct Guarded<F> {
    #[pin]
    inner: F,
    done: bool,
}

impl<F> Guarded<F>
where
    F: Future<Output = Values>,
{
    pub fn new(inner: F) -> Self {
        Self { inner, done: false }
    }
}

impl<F> Future for Guarded<F>
where
    F: Future<Output = Values>,
{
    type Output = Response;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.project();
        assert!(!*this.done, "guarded future polled after completion");

        let inner = this.inner;
        let _scope = GuardScope::enter();
        let response = match panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
            Ok(Poll::Pending) => return Poll::Pending,
            Ok(Poll::Ready(values)) => Response::Success(values),
            Err(cause) => Response::Failure(fault_from(cause)),
        };
        *this.done = true;
        Poll::Ready(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;
    use assert_matches::assert_matches;

    #[test]
    fn test_success_keeps_values_in_order() {
        let response = execute(|| values![1_i32, "two", 3.0_f64]);
        let values = response.into_result().expect("no fault");
        assert_eq!(values[0].downcast_ref::<i32>(), Some(&1));
        assert_eq!(values[1].downcast_ref::<&'static str>(), Some(&"two"));
        assert_eq!(values[2].downcast_ref::<f64>(), Some(&3.0));
    }

    #[test]
    fn test_panic_becomes_failure_with_trace() {
        let response = execute(|| std::panic::panic_any(3_i32));
        let fault = response.fault().expect("expected a failure");
        assert_eq!(fault.cause_as::<i32>(), Some(&3));
        assert!(fault.location().is_some_and(|l| l.contains("guard.rs")));
        assert!(!fault.trace().to_string().is_empty());
    }

    #[test]
    fn test_string_panics_expose_message() {
        let response = execute(|| panic!("boom {}", 42));
        assert_matches!(response, Response::Failure(ref fault) if fault.message() == Some("boom 42"));
    }

    #[test]
    fn test_interpret_reraises_same_payload() {
        let response = execute(|| std::panic::panic_any(String::from("original")));
        let raised = std::panic::catch_unwind(AssertUnwindSafe(|| response.interpret()))
            .expect_err("interpret should re-raise");
        assert_eq!(raised.downcast_ref::<String>().map(String::as_str), Some("original"));
    }

    #[test]
    fn test_scope_is_released_after_panic() {
        let _ = execute(|| panic!("first"));
        assert_eq!(GUARD_DEPTH.with(Cell::get), 0);
    }

    #[tokio::test]
    async fn test_guarded_future() {
        let ok = Guarded::new(async {
            tokio::task::yield_now().await;
            values![5_u32]
        })
        .await;
        assert_matches!(ok, Response::Success(ref v) if v[0].downcast_ref::<u32>() == Some(&5));

        async fn explode() -> Values {
            tokio::task::yield_now().await;
            std::panic::panic_any(9_u8)
        }
        let failed = Guarded::new(explode()).await;
        assert_eq!(failed.fault().and_then(|f| f.cause_as::<u8>()), Some(&9));
    }
}
