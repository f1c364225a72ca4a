pub mod friendship;
pub mod identity;
pub mod snapshot;

pub use friendship::{canonical_pair, FriendshipOracle};
pub use identity::IdentityCache;
pub use snapshot::SnapshotService;
