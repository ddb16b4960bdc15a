mod items;
mod schema;
mod seed;
mod sources;
mod types;

pub use schema::Database;
pub use seed::{SeedFile, SeedSource};
pub use types::{
    Item, ItemFilter, ItemFlag, ItemSummary, NormalizedItem, NotedItem, Source, SourceKind,
    SourceWithUnread, Stats, StoreError,
};
