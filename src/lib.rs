//! Persistent function memoization and file content hashing.
//!
//! The [`FunctionCacher`] memoizes calls to wrapped functions, keyed by a
//! digest of each function's descriptor text and by its bound arguments, and
//! keeps at most `cache_size` invocations per function in least recently used
//! order. The [`FileCacher`] maintains a table of file digests for change
//! detection. Both persist through a [`Backend`]: the binary [`RecordStore`]
//! or the [`JsonBackend`]/[`YamlBackend`] documents.
//!
//! ```no_run
//! use memocache::{CallArgs, CacherConfig, FunctionCacher, FunctionSignature, Value};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut cacher: FunctionCacher = FunctionCacher::new(CacherConfig::new().with_auto_save(true))?;
//! let signature = FunctionSignature::new("app::slow_square", "slow_square@v1").param("x");
//! let mut square = cacher.wrap(signature, |args| {
//!     let x = args.get("x").and_then(Value::as_int).unwrap_or_default();
//!     Ok(Value::from(x * x))
//! });
//!
//! assert_eq!(square.call(&mut cacher, CallArgs::new().arg(12_i64))?, Value::from(144_i64));
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod cacher;
pub mod compare;
pub mod error;
pub mod file;
pub mod function;
pub mod hashing;
pub mod store;
pub mod value;

pub use backend::{Backend, JsonBackend, RecordStore, YamlBackend};
pub use cacher::{AutoSaveOverride, Cacher, CacherConfig, CacherState, Metadata};
pub use error::{BindError, CacheError};
pub use file::{FileCacher, FileDigest, FileHashTable, HashFiles};
pub use function::{
    BoundArguments, CacheLookup, CallArgs, FunctionCacher, FunctionSignature, InvocationRecord,
    Memoized,
};
pub use hashing::HashAlgorithm;
pub use store::{Ledger, LedgerError, LedgerStore};
pub use value::Value;

pub use memocache_paths::PathPatterns;
pub use memocache_utils::init_logging;
