//! Dense, reusable integer keys.
//!
//! [`KeyPool`] hands out the lowest free key and takes keys back for reuse,
//! keeping free keys as coalesced inclusive ranges. [`KeyPoolMap`] pairs a pool
//! with an ordered map, for containers where the key itself does not matter
//! as long as it is small, unique and stable.
//!
//! ```
//! use keypool::{KeyPoolMap, PoolConfig};
//!
//! let mut items = KeyPoolMap::with_config(PoolConfig::new().with_start(100));
//! let key = items.insert("hello, world").unwrap();
//! assert_eq!(key, 100);
//! assert_eq!(items.get(key), Ok(&"hello, world"));
//! ```
mod config;
mod error;
mod map;
mod pool;
mod range;

pub use config::{PoolConfig, ProbeStrategy};
pub use error::{Error, InvalidKeyReason, Result};
pub use map::{KeyPoolMap, VacantKey};
pub use pool::{AllocatedRanges, KeyPool};
pub use range::{KeyRange, SENTINEL};
