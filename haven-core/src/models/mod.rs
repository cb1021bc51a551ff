mod sync_item;
mod sync_kind;

pub use sync_item::SyncItem;
pub use sync_kind::{Endpoint, EndpointMethod, SyncKind};
