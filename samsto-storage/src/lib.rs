//! SAMSTO Storage - Cache Store Layer
//!
//! Everything that touches the cache store: the key codec, the backend
//! contract and its in-memory and Redis implementations, record encoding,
//! index sets, the object mirror and the lifecycle controller. The
//! relational source trait lives here too, since the mirror and lifecycle
//! are its only consumers.

pub mod backend;
pub mod index;
pub mod keys;
pub mod lifecycle;
pub mod mirror;
pub mod record;
pub mod source;

#[cfg(feature = "redis")]
pub use backend::RedisBackend;
pub use backend::{FieldMap, InMemoryBackend, ResilientBackend, RetryPolicy, StoreBackend};
pub use index::IndexSets;
pub use keys::{
    aspsubmap_key, namespace_prefix, parse_key, sample_key, to_key, ASPECT_INDEX_KEY, NAMESPACE,
    SAMPLE_INDEX_KEY, SUBJECT_INDEX_KEY,
};
pub use lifecycle::{InitReport, LifecycleController};
pub use mirror::ObjectMirror;
pub use record::HashRecord;
pub use source::{InMemoryRelationalStore, RelationalSource};
