
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// AttributeKey names a typed value stored in a session's `Attributes`
pub struct AttributeKey<T> {
    name: &'static str,
    _t: PhantomData<fn() -> T>,
}

impl <T> AttributeKey<T> {
    pub const fn new(name: &'static str) -> AttributeKey<T> {
        AttributeKey{ name, _t: PhantomData }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl <T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        AttributeKey::new(self.name)
    }
}

impl <T> Copy for AttributeKey<T> {}

impl <T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeKey({})", self.name)
    }
}

/// Attributes is a thread safe, typed value store attached to a session
#[derive(Default)]
pub struct Attributes {
    values: Mutex<HashMap<&'static str, Arc<dyn Any + Send + Sync>>>,
}

impl Attributes {
    pub fn new() -> Attributes {
        Self::default()
    }

    /// Fetch the value stored under `key`.
    /// A value stored under the same name with a different type is treated as missing.
    pub fn get<T>(&self, key: &AttributeKey<T>) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = self.lock().get(key.name)?.clone();
        value.downcast::<T>().ok()
    }

    /// Store a value under `key`, returning the previous value of the same type
    pub fn set<T>(&self, key: &AttributeKey<T>, value: T) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let prev = self.lock().insert(key.name, Arc::new(value))?;
        prev.downcast::<T>().ok()
    }

    /// Remove the value stored under `key`
    pub fn remove<T>(&self, key: &AttributeKey<T>) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let prev = self.lock().remove(key.name)?;
        prev.downcast::<T>().ok()
    }

    pub fn contains<T>(&self, key: &AttributeKey<T>) -> bool {
        self.lock().contains_key(key.name)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<&'static str, Arc<dyn Any + Send + Sync>>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.lock().keys()).finish()
    }
}

/// Session is the connection abstraction the engine is attached to.
///
/// The engine keeps its per-session state in the session's attributes,
/// implementations own everything else about the connection.
pub trait Session: Send + Sync {
    /// Identifier used for log context
    fn id(&self) -> u64;

    fn attributes(&self) -> &Attributes;
}

/// Transport is a session that outbound requests can be handed to
pub trait Transport<REQ>: Session {
    /// Queue a message for sending, this must not block
    fn write(&self, message: REQ);
}

impl <S> Session for Arc<S>
where
    S: Session + ?Sized,
{
    fn id(&self) -> u64 {
        (**self).id()
    }

    fn attributes(&self) -> &Attributes {
        (**self).attributes()
    }
}

impl <REQ, S> Transport<REQ> for Arc<S>
where
    S: Transport<REQ> + ?Sized,
{
    fn write(&self, message: REQ) {
        (**self).write(message)
    }
}
