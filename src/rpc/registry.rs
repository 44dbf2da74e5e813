//! Procedure registry.
//!
//! Maps procedure names to handlers. Handlers come in three shapes, all
//! normalized into one future-returning [`Procedure`]:
//!
//! | Registration | Handler shape |
//! |--------------|---------------|
//! | [`ProcedureRegistry::register`] | `Fn(Value) -> Future<Result<Value>>` |
//! | [`ProcedureRegistry::register_callback`] | `Fn(Value, Completion)` |
//! | [`ProcedureRegistry::register_typed`] | `Fn(A) -> Future<Result<R>>` with serde `A`/`R` |

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Future returned by a procedure.
pub type ProcedureFuture = BoxFuture<'static, Result<Value>>;

/// A registered handler.
pub type Procedure = Arc<dyn Fn(Value) -> ProcedureFuture + Send + Sync>;

// ============================================================================
// Completion
// ============================================================================

/// Completion callback handed to callback-style procedures.
///
/// Dropping it without completing rejects the call.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<Result<Value>>,
}

impl Completion {
    /// Resolves the call with `value`.
    pub fn complete(self, value: Value) {
        let _ = self.tx.send(Ok(value));
    }

    /// Rejects the call with `message`.
    pub fn fail(self, procedure: &str, message: impl Into<String>) {
        let _ = self.tx.send(Err(Error::procedure(procedure, message)));
    }
}

// ============================================================================
// ProcedureRegistry
// ============================================================================

/// Name → handler map owned by one RPC server.
///
/// Cloning yields another handle to the same map. Registering a name twice
/// replaces the earlier handler.
#[derive(Clone, Default)]
pub struct ProcedureRegistry {
    procedures: Arc<RwLock<FxHashMap<String, Procedure>>>,
}

impl ProcedureRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a future-style procedure.
    pub fn register<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let procedure: Procedure = Arc::new(move |args| handler(args).boxed());
        self.insert(name.into(), procedure);
    }

    /// Registers a callback-style procedure.
    ///
    /// The handler signals completion through the [`Completion`] it is given.
    pub fn register_callback<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value, Completion) + Send + Sync + 'static,
    {
        let name = name.into();
        let procedure_name = name.clone();

        let procedure: Procedure = Arc::new(move |args| {
            let (tx, rx) = oneshot::channel();
            handler(args, Completion { tx });

            let procedure_name = procedure_name.clone();
            async move {
                rx.await.map_err(|_| {
                    Error::procedure(procedure_name, "completion dropped without a value")
                })?
            }
            .boxed()
        });
        self.insert(name, procedure);
    }

    /// Registers a procedure with typed arguments and result.
    ///
    /// Arguments that fail to deserialize reject the call.
    pub fn register_typed<A, R, F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let name = name.into();
        let procedure_name = name.clone();
        let handler = Arc::new(handler);

        let procedure: Procedure = Arc::new(move |args| {
            let handler = Arc::clone(&handler);
            let procedure_name = procedure_name.clone();
            async move {
                let args: A = serde_json::from_value(args).map_err(|e| {
                    Error::procedure(&procedure_name, format!("invalid arguments: {e}"))
                })?;
                let result = handler(args).await?;
                Ok(serde_json::to_value(result)?)
            }
            .boxed()
        });
        self.insert(name, procedure);
    }

    /// Returns `true` if `name` has a handler.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.procedures.read().contains_key(name)
    }

    /// Returns the number of registered procedures.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.procedures.read().len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.procedures.read().is_empty()
    }

    /// Invokes the handler registered for `name`.
    ///
    /// The returned future fails with [`Error::UnregisteredProcedure`] if no
    /// handler exists. That case is logged at error level here, since the
    /// caller may be several hops away and see nothing but silence.
    pub fn dispatch(&self, name: &str, args: Value) -> ProcedureFuture {
        let procedure = self.procedures.read().get(name).cloned();

        match procedure {
            Some(procedure) => {
                debug!(procedure = name, "Dispatching");
                procedure(args)
            }
            None => {
                error!(
                    procedure = name,
                    "This RPC request can't be executed. No procedure was registered with this name"
                );
                let err = Error::unregistered_procedure(name);
                async move { Err(err) }.boxed()
            }
        }
    }

    fn insert(&self, name: String, procedure: Procedure) {
        let replaced = self.procedures.write().insert(name.clone(), procedure);
        if replaced.is_some() {
            debug!(procedure = %name, "Replaced previously registered procedure");
        } else {
            debug!(procedure = %name, "Registered procedure");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
