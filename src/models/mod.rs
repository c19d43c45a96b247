pub mod access;
pub mod group;
pub mod mission;
pub mod resource;
pub mod user;

/// Body of the get-many-by-ids operation.
#[derive(Debug, serde::Deserialize, utoipa::ToSchema)]
pub struct IdsRequest {
    pub ids: Vec<uuid::Uuid>,
}
