//! A single-process actor primitive.
//!
//! A receiver (any `Send` state) is moved onto its own worker thread. Every
//! request against it runs on that worker, one at a time, so the receiver is
//! mutated without locks. Operations are synchronous and may block; a busy
//! actor never holds up the others. Callers use an [`Endpoint`]:
//!
//! - `call`/`ask` wait for the response; a panic in the operation is re-raised
//!   on the caller with its original payload,
//! - `cast`/`tell` return once the request is admitted into the mailbox,
//! - operations may defer their reply through the [`Context`] and let another
//!   task answer later.
//!
//! Requests pass through a bounded mailbox (capacity 1 unless configured), so
//! fast senders are throttled to the pace of the worker.
mod actor;
mod context;
mod endpoint;
mod guard;
mod id;
mod mailbox;
mod operation;
pub mod prelude;
mod registry;
mod reply;
mod request;
mod response;
mod signature;
mod supervisor;
#[cfg(test)]
mod test_utils;
mod value;

pub use actor::{ActorConfig, ActorError, DEFAULT_MAILBOX_CAPACITY};
pub use context::Context;
pub use endpoint::Endpoint;
pub use guard::{Guarded, execute as guarded};
pub use id::Id;
pub use mailbox::{MailboxError, MailboxReceiver, MailboxSender, Sentinel, mailbox};
pub use operation::{Function, Operation};
pub use registry::Registry;
pub use reply::{Reply, ReplyError, ReplySink};
pub use response::{Fault, Response};
pub use signature::{DispatchError, Signature};
pub use supervisor::{Running, State, Supervisor, Uninitialized, start, start_with};
pub use value::{TypeInfo, Value, Values};

#[cfg(test)]
mod tests {
    use std::panic::AssertUnwindSafe;

    use futures::FutureExt;

    use super::prelude::*;
    use crate::test_utils::init_tracing;
    use crate::values;

    struct A {
        x: i32,
        y: i32,
    }

    fn get_x() -> Operation<A> {
        Operation::unary("get_x", |a: &mut A, _, n: i32| a.x + n)
    }

    fn do_panic() -> Operation<A> {
        Operation::nullary("do_panic", |a: &mut A, _| -> i32 { std::panic::panic_any(a.y) })
    }

    fn long_tricks() -> Function {
        Function::unary("long_tricks", |v: i32| v + 5)
    }

    fn tricks() -> Operation<A> {
        let long_tricks = long_tricks();
        Operation::nullary("tricks", move |a: &mut A, ctx| {
            ctx.defer_function(&long_tricks, values![a.x])
                .expect("long_tricks accepts an i32");
            a.x
        })
    }

    #[tokio::test]
    async fn test_call_returns_operation_result() {
        init_tracing();
        let actor = crate::start(A { x: 2, y: 3 });
        let values = actor.call(&get_x(), values![4_i32]).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].downcast_ref::<i32>(), Some(&6));
    }

    #[tokio::test]
    async fn test_call_reraises_fault_value() {
        init_tracing();
        let actor = crate::start(A { x: 2, y: 3 });
        let raised = AssertUnwindSafe(actor.call(&do_panic(), values![]))
            .catch_unwind()
            .await
            .expect_err("the fault should be re-raised on the caller");
        assert_eq!(raised.downcast_ref::<i32>(), Some(&3));

        // The worker survives and keeps serving requests.
        let values = actor.call(&get_x(), values![1_i32]).await.unwrap();
        assert_eq!(values[0].downcast_ref::<i32>(), Some(&3));
    }

    #[tokio::test]
    async fn test_try_call_exposes_fault_and_trace() {
        init_tracing();
        let actor = crate::start(A { x: 2, y: 3 });
        let response = actor.try_call(&do_panic(), values![]).await.unwrap();
        let fault = response.fault().expect("operation panicked");
        assert_eq!(fault.cause_as::<i32>(), Some(&3));
        assert!(fault.location().is_some_and(|l| l.contains("lib.rs:")));
        assert!(!fault.trace().to_string().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deferred_reply_replaces_direct_return() {
        init_tracing();
        let actor = crate::start(A { x: 3, y: 4 });
        let values = actor.call(&tricks(), values![]).await.unwrap();
        assert_eq!(values[0].downcast_ref::<i32>(), Some(&8));
    }

    #[tokio::test]
    async fn test_verification_fails_before_admission() {
        init_tracing();
        let actor = crate::start(A { x: 2, y: 3 });
        let err = actor.call(&get_x(), values!["four"]).await.unwrap_err();
        assert!(matches!(
            err,
            ActorError::Dispatch(DispatchError::ArgumentMismatch { index: 0, .. })
        ));
        assert_eq!(actor.buffered(), 0);
    }
}
