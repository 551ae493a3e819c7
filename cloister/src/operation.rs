//! Runtime-selectable operations.
//!
//! An [`Operation`] pairs a callable over the receiver with the [`Signature`]
//! the dispatch verifier checks before the operation is scheduled. The typed
//! constructors derive the signature from the closure's parameter types, so
//! the argument downcasts inside the body cannot fail once verification
//! passed. A [`Function`] is the receiver-less counterpart used to finish a
//! deferred request.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::request::Job;
use crate::signature::{self, DispatchError, Signature};
use crate::value::{TypeInfo, Value, Values};

type Body<R> = dyn Fn(&mut R, &mut Context<R>, Values) -> Values + Send + Sync;
type FunctionBody = dyn Fn(Values) -> Values + Send + Sync;

fn take_arg<T: Any>(args: &mut std::vec::IntoIter<Value>) -> T {
    args.next()
        .expect("argument count was verified, this is a bug.")
        .downcast::<T>()
        .unwrap_or_else(|value| {
            panic!(
                "argument type was verified but got {}, this is a bug.",
                value.type_info()
            )
        })
}

/// A named operation on receivers of type `R`.
pub struct Operation<R> {
    name: Arc<str>,
    signature: Signature,
    body: Option<Arc<Body<R>>>,
}

impl<R: Send + 'static> Operation<R> {
    /// Build an operation from a hand-written signature and an untyped body.
    pub fn from_parts<F>(name: impl Into<Arc<str>>, signature: Signature, body: F) -> Self
    where
        F: Fn(&mut R, &mut Context<R>, Values) -> Values + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            body: Some(Arc::new(body)),
        }
    }

    /// An operation known only by its signature; it cannot be dispatched.
    pub fn declared(name: impl Into<Arc<str>>, signature: Signature) -> Self {
        Self {
            name: name.into(),
            signature,
            body: None,
        }
    }

    pub fn nullary<T, F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        T: Any + Send,
        F: Fn(&mut R, &mut Context<R>) -> T + Send + Sync + 'static,
    {
        Self::from_parts(name, Signature::method::<R>(), move |receiver, ctx, _| {
            vec![Value::new(f(receiver, ctx))]
        })
    }

    pub fn unary<A, T, F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        A: Any,
        T: Any + Send,
        F: Fn(&mut R, &mut Context<R>, A) -> T + Send + Sync + 'static,
    {
        let signature = Signature::method::<R>().param::<A>();
        Self::from_parts(name, signature, move |receiver, ctx, args| {
            let mut args = args.into_iter();
            let a = take_arg::<A>(&mut args);
            vec![Value::new(f(receiver, ctx, a))]
        })
    }

    pub fn binary<A, B, T, F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        A: Any,
        B: Any,
        T: Any + Send,
        F: Fn(&mut R, &mut Context<R>, A, B) -> T + Send + Sync + 'static,
    {
        let signature = Signature::method::<R>().param::<A>().param::<B>();
        Self::from_parts(name, signature, move |receiver, ctx, args| {
            let mut args = args.into_iter();
            let a = take_arg::<A>(&mut args);
            let b = take_arg::<B>(&mut args);
            vec![Value::new(f(receiver, ctx, a, b))]
        })
    }

    /// An operation taking one or more arguments of type `A`.
    pub fn variadic<A, T, F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        A: Any,
        T: Any + Send,
        F: Fn(&mut R, &mut Context<R>, Vec<A>) -> T + Send + Sync + 'static,
    {
        let signature = Signature::method::<R>().variadic::<A>();
        Self::from_parts(name, signature, move |receiver, ctx, args| {
            let mut args = args.into_iter();
            let rest = (0..args.len()).map(|_| take_arg::<A>(&mut args)).collect();
            vec![Value::new(f(receiver, ctx, rest))]
        })
    }
}

impl<R: 'static> Operation<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn is_invocable(&self) -> bool {
        self.body.is_some()
    }

    /// Run the dispatch verifier for a receiver of type `R`.
    pub fn verify(&self, args: &[Value]) -> Result<(), DispatchError> {
        signature::verify(
            &self.name,
            self.is_invocable(),
            &self.signature,
            TypeInfo::of::<R>(),
            args,
        )
    }

    /// Verify `args` and bind them into a job for the worker.
    pub(crate) fn bind(&self, args: Values) -> Result<Job<R>, DispatchError> {
        self.verify(&args)?;
        let body = self.body.clone().ok_or_else(|| DispatchError::NotInvocable {
            operation: self.name.clone(),
        })?;
        Ok(Job::new(self.name.to_string(), move |receiver, ctx| {
            body(receiver, ctx, args)
        }))
    }
}

impl<R> Clone for Operation<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            signature: self.signature.clone(),
            body: self.body.clone(),
        }
    }
}

impl<R> fmt::Debug for Operation<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .field("invocable", &self.body.is_some())
            .finish()
    }
}

/// A named, receiver-less function used to complete deferred requests.
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    signature: Signature,
    body: Arc<FunctionBody>,
}

impl Function {
    pub fn from_parts<F>(name: impl Into<Arc<str>>, signature: Signature, body: F) -> Self
    where
        F: Fn(Values) -> Values + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            signature,
            body: Arc::new(body),
        }
    }

    pub fn unary<A, T, F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        A: Any,
        T: Any + Send,
        F: Fn(A) -> T + Send + Sync + 'static,
    {
        let signature = Signature::function().param::<A>();
        Self::from_parts(name, signature, move |args| {
            let mut args = args.into_iter();
            vec![Value::new(f(take_arg::<A>(&mut args)))]
        })
    }

    pub fn binary<A, B, T, F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        A: Any,
        B: Any,
        T: Any + Send,
        F: Fn(A, B) -> T + Send + Sync + 'static,
    {
        let signature = Signature::function().param::<A>().param::<B>();
        Self::from_parts(name, signature, move |args| {
            let mut args = args.into_iter();
            let a = take_arg::<A>(&mut args);
            let b = take_arg::<B>(&mut args);
            vec![Value::new(f(a, b))]
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn verify(&self, args: &[Value]) -> Result<(), DispatchError> {
        signature::verify_function(&self.name, &self.signature, args)
    }

    /// Verify `args` and bind them into a closure that runs the function.
    pub(crate) fn bind(
        &self,
        args: Values,
    ) -> Result<impl FnOnce() -> Values + Send + 'static, DispatchError> {
        self.verify(&args)?;
        let body = self.body.clone();
        Ok(move || body(args))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;
    use assert_matches::assert_matches;

    struct Counter;

    #[test]
    fn test_typed_constructors_derive_signatures() {
        let op = Operation::<Counter>::binary("add", |_, _, a: i32, b: u8| a + b as i32);
        assert_eq!(
            op.signature(),
            &Signature::method::<Counter>().param::<i32>().param::<u8>()
        );
        assert!(op.verify(&values![1_i32, 2_u8]).is_ok());
        assert_matches!(
            op.verify(&values![1_i32]),
            Err(DispatchError::NotEnoughArguments { .. })
        );
    }

    #[test]
    fn test_declared_operation_is_not_invocable() {
        let op = Operation::<Counter>::declared("later", Signature::method::<Counter>());
        assert!(!op.is_invocable());
        assert_matches!(
            op.bind(values![]).err(),
            Some(DispatchError::NotInvocable { .. })
        );
    }

    #[test]
    fn test_foreign_receiver_signature_is_rejected() {
        struct Other;
        let op = Operation::<Counter>::from_parts("wrong", Signature::method::<Other>(), |_, _, _| {
            values![]
        });
        assert_matches!(
            op.verify(&values![]),
            Err(DispatchError::ReceiverMismatch { .. })
        );
    }

    #[test]
    fn test_function_runs_bound_arguments() {
        let function = Function::binary("concat", |a: String, b: &'static str| a + b);
        let run = function
            .bind(values![String::from("ab"), "cd"])
            .expect("verified");
        let values = run();
        assert_eq!(values[0].downcast_ref::<String>().map(String::as_str), Some("abcd"));

        assert_matches!(
            function.bind(values![1_u8, "cd"]).err(),
            Some(DispatchError::ArgumentMismatch { index: 0, .. })
        );
    }
}
