mod retrieval;

pub use retrieval::{CollectionInfo, CollectionStats, QueryInput, QueryMatch, StoredDocument};
