//! Google Cloud resource schema definitions

pub mod serviceaccount;
pub mod storage;

use webstack_core::schema::ResourceSchema;

/// Returns all Google Cloud schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = Vec::new();
    schemas.extend(serviceaccount::schemas());
    schemas.extend(storage::schemas());
    schemas
}
