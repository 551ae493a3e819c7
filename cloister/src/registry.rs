//! Name-keyed lookup of operations for runtime dispatch.
//!
//! The registry is the boundary where an operation is chosen by name instead
//! of by type. Whatever it resolves still goes through the dispatch verifier
//! when it is called, so a registered name with the wrong arguments is
//! rejected on the caller.
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::operation::Operation;
use crate::signature::{DispatchError, Signature};

/// A shared table of operations on receivers of type `R`. Cloning shares the table.
pub struct Registry<R> {
    operations: Arc<RwLock<HashMap<Arc<str>, Operation<R>>>>,
}

impl<R: Send + 'static> Registry<R> {
    pub fn new() -> Self {
        Self {
            operations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register `operation` under its own name, returning any operation it replaced.
    pub fn register(&self, operation: Operation<R>) -> Option<Operation<R>> {
        let name: Arc<str> = Arc::from(operation.name());
        tracing::trace!(operation = %name, "registering operation");
        self.operations.write().insert(name, operation)
    }

    /// Reserve `name` with a signature but no callable yet.
    ///
    /// Calls resolved before a later [`register`](Self::register) fail with
    /// [`DispatchError::NotInvocable`].
    pub fn declare(&self, name: impl Into<Arc<str>>, signature: Signature) {
        let name = name.into();
        let mut operations = self.operations.write();
        if !operations.contains_key(&name) {
            operations.insert(name.clone(), Operation::declared(name, signature));
        }
    }

    pub fn resolve(&self, name: &str) -> Result<Operation<R>, DispatchError> {
        self.operations
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownOperation(name.to_string()))
    }

    pub fn remove(&self, name: &str) -> Option<Operation<R>> {
        self.operations.write().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.operations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.read().is_empty()
    }
}

impl<R: Send + 'static> Default for Registry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for Registry<R> {
    fn clone(&self) -> Self {
        Self {
            operations: self.operations.clone(),
        }
    }
}

impl<R> std::fmt::Debug for Registry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let operations = self.operations.read();
        let mut names: Vec<&str> = operations.keys().map(|name| name.as_ref()).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("operations", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;
    use assert_matches::assert_matches;

    struct Account {
        balance: i64,
    }

    fn registry() -> Registry<Account> {
        let registry = Registry::new();
        registry.register(Operation::nullary("balance", |account: &mut Account, _| {
            account.balance
        }));
        registry.register(Operation::unary(
            "deposit",
            |account: &mut Account, _, amount: i64| {
                account.balance += amount;
                account.balance
            },
        ));
        registry
    }

    #[test]
    fn test_resolve_registered_operation() {
        let registry = registry();
        let deposit = registry.resolve("deposit").expect("registered");
        assert_eq!(deposit.name(), "deposit");
        assert!(deposit.verify(&values![10_i64]).is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_name() {
        assert_matches!(
            registry().resolve("withdraw"),
            Err(DispatchError::UnknownOperation(name)) if name == "withdraw"
        );
    }

    #[test]
    fn test_declared_name_is_not_invocable_until_registered() {
        let registry = registry();
        registry.declare("withdraw", Signature::method::<Account>().param::<i64>());
        let withdraw = registry.resolve("withdraw").expect("declared");
        assert_matches!(
            withdraw.verify(&values![5_i64]),
            Err(DispatchError::NotInvocable { .. })
        );

        registry.register(Operation::unary(
            "withdraw",
            |account: &mut Account, _, amount: i64| {
                account.balance -= amount;
                account.balance
            },
        ));
        assert!(registry.resolve("withdraw").expect("registered").is_invocable());
    }

    #[test]
    fn test_declare_keeps_existing_operation() {
        let registry = registry();
        registry.declare("balance", Signature::method::<Account>());
        assert!(registry.resolve("balance").expect("registered").is_invocable());
        assert!(registry.remove("balance").is_some());
        assert!(!registry.contains("balance"));
    }
}
