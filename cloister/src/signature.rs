//! Signatures of runtime-selected operations and the dispatch verifier.
//!
//! Operations picked at runtime (for example by name from a
//! [`Registry`](crate::registry::Registry)) carry a [`Signature`]. Before a
//! request is admitted into a mailbox the caller checks the signature against
//! the actor's receiver type and the supplied arguments, so a malformed
//! request fails on the caller and never takes a mailbox slot.

use std::any::Any;
use std::sync::Arc;

use crate::value::{TypeInfo, Value};

/// Reasons an operation cannot be dispatched with a given receiver and arguments.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no operation named `{0}` is registered")]
    UnknownOperation(String),

    #[error("operation `{operation}` is declared but not bound to a callable")]
    NotInvocable { operation: Arc<str> },

    #[error("operation `{operation}` has no receiver parameter")]
    NoReceiver { operation: Arc<str> },

    #[error("cannot pass receiver of type {actual} to `{operation}`, which expects {expected}")]
    ReceiverMismatch {
        operation: Arc<str>,
        expected: TypeInfo,
        actual: TypeInfo,
    },

    #[error("not enough arguments for `{operation}` (needed {needed}, got {got})")]
    NotEnoughArguments {
        operation: Arc<str>,
        needed: usize,
        got: usize,
    },

    #[error("too many arguments for non-variadic `{operation}` (needed {needed}, got {got})")]
    TooManyArguments {
        operation: Arc<str>,
        needed: usize,
        got: usize,
    },

    #[error("cannot pass argument {index} of `{operation}` ({actual} -> {expected})")]
    ArgumentMismatch {
        operation: Arc<str>,
        index: usize,
        expected: TypeInfo,
        actual: TypeInfo,
    },
}

/// Formal parameter description of an operation.
///
/// When `variadic` is set, the last entry of `params` is the element type of
/// the trailing parameter and any number of extra arguments of that type may
/// follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    receiver: Option<TypeInfo>,
    params: Vec<TypeInfo>,
    variadic: bool,
}

impl Signature {
    /// A signature whose first formal parameter is a receiver of type `R`.
    pub fn method<R: Any>() -> Self {
        Self::with_receiver(TypeInfo::of::<R>())
    }

    pub fn with_receiver(receiver: TypeInfo) -> Self {
        Self {
            receiver: Some(receiver),
            params: Vec::new(),
            variadic: false,
        }
    }

    /// A signature without a receiver parameter.
    pub fn function() -> Self {
        Self {
            receiver: None,
            params: Vec::new(),
            variadic: false,
        }
    }

    pub fn param<T: Any>(self) -> Self {
        self.param_info(TypeInfo::of::<T>())
    }

    pub fn param_info(mut self, param: TypeInfo) -> Self {
        self.params.push(param);
        self
    }

    /// Append a trailing variadic parameter whose elements are `T`.
    pub fn variadic<T: Any>(self) -> Self {
        self.variadic_info(TypeInfo::of::<T>())
    }

    pub fn variadic_info(mut self, element: TypeInfo) -> Self {
        self.params.push(element);
        self.variadic = true;
        self
    }

    pub fn receiver(&self) -> Option<TypeInfo> {
        self.receiver
    }

    pub fn params(&self) -> &[TypeInfo] {
        &self.params
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    fn formal_for(&self, index: usize) -> Option<TypeInfo> {
        match self.params.get(index) {
            Some(param) => Some(*param),
            None if self.variadic => self.params.last().copied(),
            None => None,
        }
    }
}

/// Check that an operation can be applied to a receiver of type `receiver`
/// with `args`.
pub fn verify(
    operation: &Arc<str>,
    invocable: bool,
    signature: &Signature,
    receiver: TypeInfo,
    args: &[Value],
) -> Result<(), DispatchError> {
    if !invocable {
        return Err(DispatchError::NotInvocable {
            operation: operation.clone(),
        });
    }
    let Some(expected) = signature.receiver else {
        return Err(DispatchError::NoReceiver {
            operation: operation.clone(),
        });
    };
    if !expected.accepts(&receiver) {
        return Err(DispatchError::ReceiverMismatch {
            operation: operation.clone(),
            expected,
            actual: receiver,
        });
    }
    verify_arguments(operation, signature, args)
}

/// Check a receiver-less function against `args`.
pub fn verify_function(
    operation: &Arc<str>,
    signature: &Signature,
    args: &[Value],
) -> Result<(), DispatchError> {
    verify_arguments(operation, signature, args)
}

fn verify_arguments(
    operation: &Arc<str>,
    signature: &Signature,
    args: &[Value],
) -> Result<(), DispatchError> {
    let needed = signature.params.len();
    if args.len() < needed {
        return Err(DispatchError::NotEnoughArguments {
            operation: operation.clone(),
            needed,
            got: args.len(),
        });
    }
    if args.len() > needed && !signature.variadic {
        return Err(DispatchError::TooManyArguments {
            operation: operation.clone(),
            needed,
            got: args.len(),
        });
    }
    for (index, arg) in args.iter().enumerate() {
        let actual = arg.type_info();
        // Counts were checked above, so a formal exists for every index.
        let Some(expected) = signature.formal_for(index) else {
            continue;
        };
        if !expected.accepts(&actual) {
            return Err(DispatchError::ArgumentMismatch {
                operation: operation.clone(),
                index,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;
    use assert_matches::assert_matches;

    struct Receiver;
    struct Other;

    fn name() -> Arc<str> {
        Arc::from("op")
    }

    fn check(signature: &Signature, args: &[Value]) -> Result<(), DispatchError> {
        verify(&name(), true, signature, TypeInfo::of::<Receiver>(), args)
    }

    #[test]
    fn test_accepts_matching_arguments() {
        let signature = Signature::method::<Receiver>().param::<i32>().param::<String>();
        assert_eq!(check(&signature, &values![4_i32, String::from("x")]), Ok(()));
    }

    #[test]
    fn test_rejects_unbound_operation() {
        let signature = Signature::method::<Receiver>();
        let result = verify(&name(), false, &signature, TypeInfo::of::<Receiver>(), &[]);
        assert_matches!(result, Err(DispatchError::NotInvocable { .. }));
    }

    #[test]
    fn test_rejects_missing_receiver_slot() {
        let result = check(&Signature::function(), &[]);
        assert_matches!(result, Err(DispatchError::NoReceiver { .. }));
    }

    #[test]
    fn test_rejects_wrong_receiver_type() {
        let result = check(&Signature::method::<Other>(), &[]);
        assert_matches!(
            result,
            Err(DispatchError::ReceiverMismatch { expected, actual, .. })
                if expected == TypeInfo::of::<Other>() && actual == TypeInfo::of::<Receiver>()
        );
    }

    #[test]
    fn test_wildcard_receiver_accepts_any_receiver() {
        let signature = Signature::with_receiver(TypeInfo::any());
        assert_eq!(check(&signature, &[]), Ok(()));
    }

    #[test]
    fn test_argument_counts() {
        let signature = Signature::method::<Receiver>().param::<i32>();
        assert_matches!(
            check(&signature, &[]),
            Err(DispatchError::NotEnoughArguments { needed: 1, got: 0, .. })
        );
        assert_matches!(
            check(&signature, &values![1_i32, 2_i32]),
            Err(DispatchError::TooManyArguments { needed: 1, got: 2, .. })
        );
    }

    #[test]
    fn test_argument_type_mismatch_reports_index() {
        let signature = Signature::method::<Receiver>().param::<i32>().param::<u64>();
        let err = check(&signature, &values![1_i32, 2_i32]).unwrap_err();
        assert_matches!(err, DispatchError::ArgumentMismatch { index: 1, .. });
        assert_eq!(
            err.to_string(),
            "cannot pass argument 1 of `op` (i32 -> u64)"
        );
    }

    #[test]
    fn test_variadic_extra_arguments_use_element_type() {
        let signature = Signature::method::<Receiver>().param::<bool>().variadic::<i32>();
        assert_eq!(check(&signature, &values![true, 1_i32, 2_i32, 3_i32]), Ok(()));
        assert_matches!(
            check(&signature, &values![true, 1_i32, "nope"]),
            Err(DispatchError::ArgumentMismatch { index: 2, .. })
        );
        assert_matches!(
            check(&signature, &values![true]),
            Err(DispatchError::NotEnoughArguments { needed: 2, got: 1, .. })
        );
    }

    #[test]
    fn test_function_skips_receiver_check() {
        let signature = Signature::function().param::<i32>();
        assert_eq!(verify_function(&name(), &signature, &values![1_i32]), Ok(()));
    }
}
