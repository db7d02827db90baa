//! Document trait

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record that can be persisted in the [`DocumentStore`](crate::DocumentStore)
pub trait Document: Serialize + DeserializeOwned {
    /// Collection (logical table) name
    const COLLECTION: &'static str;

    /// Unique id within the collection
    fn id(&self) -> &str;

    /// Owning user, if the document belongs to one
    fn owner_id(&self) -> Option<&str>;
}
