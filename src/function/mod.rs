//! Function memoization.
//!
//! A [`FunctionCacher`] keeps one ledger of invocation records per function
//! identity (the digest of the function's descriptor text). Calling a
//! [`Memoized`] function binds its arguments, looks for a previous invocation
//! with matching arguments, and only runs the function on a miss.

pub mod signature;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::{Backend, RecordStore};
use crate::cacher::{Cacher, CacherConfig, CacherCore};
use crate::compare::{self, Comparators};
use crate::error::CacheError;
use crate::hashing::HashAlgorithm;
use crate::store::{Ledger, LedgerStore};
use crate::value::Value;

pub use signature::{BoundArguments, CallArgs, FunctionSignature, Param};

/// Values that can be cached: cloned out of the cache on every hit and
/// persisted through the backends.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + 'static {}

/// One observed call. `output` is `None` only while the call is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecord<V, O> {
    pub input: BoundArguments<V>,
    pub output: Option<O>,
}

impl<V, O> InvocationRecord<V, O> {
    pub fn is_pending(&self) -> bool {
        self.output.is_none()
    }
}

/// Outcome of [`FunctionCacher::lookup_function`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<O> {
    /// A previous invocation matched; holds a copy of its output.
    Hit(O),
    /// No match; a pending record now sits at the front of the ledger.
    Reserved,
}

pub type FunctionCache<V, O> = LedgerStore<String, InvocationRecord<V, O>>;
pub type FunctionStateCache<V, O> = BTreeMap<String, Ledger<InvocationRecord<V, O>>>;

/// Caches function invocations and persists them through backend `B`.
///
/// All functions wrapped by one cacher share the argument type `V` and result
/// type `O`; [`Value`] (the default for both) covers heterogeneous signatures.
pub struct FunctionCacher<V = Value, O = Value, B = RecordStore> {
    core: CacherCore,
    backend: B,
    cache: FunctionCache<V, O>,
    comparators: Comparators<String, V>,
    function_name_to_hash: HashMap<String, String>,
}

impl<V, O, B> FunctionCacher<V, O, B>
where
    V: CacheValue + PartialEq,
    O: CacheValue,
    B: Backend,
{
    pub fn new(config: CacherConfig) -> Result<Self, CacheError> {
        Self::with_backend(config, B::default())
    }

    pub fn with_backend(config: CacherConfig, backend: B) -> Result<Self, CacheError> {
        let core = CacherCore::new::<Self>(&config)?;
        let mut cacher = Self {
            core,
            backend,
            cache: LedgerStore::new(config.cache_size),
            comparators: Comparators::new(),
            function_name_to_hash: HashMap::new(),
        };

        if config.auto_load {
            cacher.try_auto_load()?;
        }

        Ok(cacher)
    }

    pub fn cache_size(&self) -> Option<usize> {
        self.cache.capacity()
    }

    /// Change the ledger capacity; longer ledgers are shrunk from the tail
    /// immediately.
    pub fn set_cache_size(&mut self, cache_size: Option<usize>) -> Result<(), CacheError> {
        let evicted = self.cache.set_capacity(cache_size);
        debug!(?cache_size, evicted, "function cache resized");
        self.save_if_auto()
    }

    /// Compare parameter `name` with `comparator` instead of `==` when
    /// looking for a previous invocation.
    pub fn set_comparator<F>(&mut self, name: impl Into<String>, comparator: F)
    where
        F: Fn(&V, &V) -> bool + 'static,
    {
        self.comparators.insert(name.into(), comparator);
    }

    pub fn remove_comparator(&mut self, name: &str) -> bool {
        self.comparators.remove(&name.to_string()).is_some()
    }

    pub fn hash_function(&self, signature: &FunctionSignature<V>) -> String {
        signature.identity(self.hash_algorithm())
    }

    /// Wrap `function` so calls through the returned handle are memoized.
    ///
    /// The name → identity index used by [`Self::get_cached_data`] is filled
    /// here, once; it does not follow later changes to the descriptor.
    pub fn wrap<F>(&mut self, signature: FunctionSignature<V>, function: F) -> Memoized<V, O, F>
    where
        F: FnMut(&BoundArguments<V>) -> anyhow::Result<O>,
    {
        let identity = self.hash_function(&signature);
        self.cache.get_or_create(identity.clone());
        self.function_name_to_hash
            .insert(signature.name().to_string(), identity.clone());

        debug!(function = signature.name(), %identity, "function wrapped");

        Memoized {
            signature,
            function,
            output: PhantomData,
        }
    }

    /// Ledger of the function registered under `function_name`, most recent
    /// invocation first.
    pub fn get_cached_data(&self, function_name: &str) -> Option<&Ledger<InvocationRecord<V, O>>> {
        let identity = self.function_name_to_hash.get(function_name)?;
        self.cache.get(identity)
    }

    pub fn cached_data_for<F>(
        &self,
        function: &Memoized<V, O, F>,
    ) -> Option<&Ledger<InvocationRecord<V, O>>> {
        self.get_cached_data(function.name())
    }

    /// Identity recorded for `function_name` when it was wrapped.
    pub fn identity_of(&self, function_name: &str) -> Option<&str> {
        self.function_name_to_hash
            .get(function_name)
            .map(String::as_str)
    }

    /// Look for a previous invocation of `identity` with arguments matching
    /// `input`, promoting it to most recently used. On a miss, reserve a
    /// pending record at the front of the ledger.
    pub fn lookup_function(&mut self, identity: &str, input: &BoundArguments<V>) -> CacheLookup<O> {
        let key = identity.to_string();

        if self.cache.contains_key(&key) {
            let comparators = &self.comparators;
            let found = self.cache.find(&key, |record| {
                !record.is_pending()
                    && compare::all_equal(input.iter(), |name| record.input.get(name), comparators)
            });
            match found {
                Ok(InvocationRecord {
                    output: Some(output),
                    ..
                }) => {
                    debug!(%identity, "cache hit");
                    return CacheLookup::Hit(output.clone());
                }
                _ => debug!(%identity, "no previous value found"),
            }
        }

        self.cache.get_or_create(key.clone());
        let reserved = InvocationRecord {
            input: input.clone(),
            output: None,
        };
        if let Ok(Some(evicted)) = self.cache.push_front(&key, reserved) {
            debug!(%identity, pending = evicted.is_pending(), "evicted least recently used record");
        }

        CacheLookup::Reserved
    }

    /// The full memoized call: hash, bind, look up, and on a miss run
    /// `function` and record its output.
    ///
    /// The caller receives `function`'s own output while the ledger keeps a
    /// copy. When `function` fails, its error is returned unchanged and the
    /// pending record is dropped.
    pub fn lookup_and_record<F>(
        &mut self,
        signature: &FunctionSignature<V>,
        args: CallArgs<V>,
        function: F,
    ) -> anyhow::Result<O>
    where
        F: FnOnce(&BoundArguments<V>) -> anyhow::Result<O>,
    {
        let identity = self.hash_function(signature);
        let input = signature.bind(args)?;

        if let CacheLookup::Hit(output) = self.lookup_function(&identity, &input) {
            // the hit was promoted to the front
            self.save_if_auto()?;
            return Ok(output);
        }

        match function(&input) {
            Ok(output) => {
                self.complete_pending(&identity, output.clone());
                self.save_if_auto()?;
                Ok(output)
            }
            Err(err) => {
                self.discard_pending(&identity);
                Err(err)
            }
        }
    }

    fn complete_pending(&mut self, identity: &str, output: O) {
        match self.cache.front_mut(&identity.to_string()) {
            Some(record) if record.is_pending() => record.output = Some(output),
            _ => debug!(%identity, "pending record already evicted, output not cached"),
        }
    }

    fn discard_pending(&mut self, identity: &str) {
        let removed = self
            .cache
            .remove_front_if(&identity.to_string(), InvocationRecord::is_pending);
        debug!(%identity, removed = removed.is_some(), "call failed, pending record dropped");
    }
}

impl<V, O, B> Cacher for FunctionCacher<V, O, B>
where
    V: CacheValue + PartialEq,
    O: CacheValue,
    B: Backend,
{
    const TYPE_NAME: &'static str = "FunctionCacher";

    type Cache = FunctionCache<V, O>;
    type StateCache = FunctionStateCache<V, O>;
    type Backend = B;

    fn core(&self) -> &CacherCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut CacherCore {
        &mut self.core
    }

    fn backend(&self) -> &B {
        &self.backend
    }

    fn cache(&self) -> &Self::Cache {
        &self.cache
    }

    fn replace_cache(&mut self, cache: Self::Cache) -> Self::Cache {
        std::mem::replace(&mut self.cache, cache)
    }

    fn new_cache(&self) -> Self::Cache {
        LedgerStore::new(self.cache.capacity())
    }

    /// Wrapped functions keep their (now empty) ledgers.
    fn reset_cache(&mut self) {
        self.cache.clear_all();
    }

    fn cache_to_state_cache(&self) -> Self::StateCache {
        self.cache
            .iter()
            .map(|(identity, ledger)| {
                let records: Ledger<_> = ledger
                    .iter()
                    .filter(|record| !record.is_pending())
                    .cloned()
                    .collect();
                (identity.clone(), records)
            })
            .collect()
    }

    fn state_cache_to_cache(&self, state_cache: Self::StateCache) -> Result<Self::Cache, CacheError> {
        let mut cache = self.new_cache();
        for (identity, ledger) in state_cache {
            let ledger: Ledger<_> = ledger
                .into_iter()
                .filter(|record| !record.is_pending())
                .collect();
            cache.insert_ledger(identity, ledger);
        }
        for identity in self.function_name_to_hash.values() {
            cache.get_or_create(identity.clone());
        }
        Ok(cache)
    }
}

impl<V, O, B: fmt::Debug> fmt::Debug for FunctionCacher<V, O, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCacher")
            .field("save_path", &self.core.save_path())
            .field("hash_algorithm", &self.core.hash_algorithm())
            .field("backend", &self.backend)
            .field("cache_size", &self.cache.capacity())
            .field("functions", &self.function_name_to_hash)
            .finish_non_exhaustive()
    }
}

/// A function whose calls go through a [`FunctionCacher`].
pub struct Memoized<V, O, F> {
    signature: FunctionSignature<V>,
    function: F,
    output: PhantomData<fn() -> O>,
}

impl<V, O, F> Memoized<V, O, F>
where
    V: CacheValue + PartialEq,
    O: CacheValue,
    F: FnMut(&BoundArguments<V>) -> anyhow::Result<O>,
{
    /// Call the function with `args`, serving the cached output when a
    /// previous call with equal arguments is recorded in `cacher`.
    pub fn call<B: Backend>(
        &mut self,
        cacher: &mut FunctionCacher<V, O, B>,
        args: CallArgs<V>,
    ) -> anyhow::Result<O> {
        let function = &mut self.function;
        cacher.lookup_and_record(&self.signature, args, |input| function(input))
    }
}

impl<V, O, F> Memoized<V, O, F> {
    pub fn name(&self) -> &str {
        self.signature.name()
    }

    pub fn signature(&self) -> &FunctionSignature<V> {
        &self.signature
    }

    /// Identity this function is cached under with `algorithm`.
    pub fn identity(&self, algorithm: HashAlgorithm) -> String {
        self.signature.identity(algorithm)
    }
}

impl<V: fmt::Debug, O, F> fmt::Debug for Memoized<V, O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
