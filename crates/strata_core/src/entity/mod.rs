//! Entity model: base attributes, capabilities and the entity codec trait.

mod capability;
mod codec;
mod ids;
mod meta;

pub use capability::Capabilities;
pub use codec::Entity;
pub use ids::UuidGenerator;
pub use meta::{EntityMeta, SyncStatus};
