//! Resource business logic: creation, field updates, reads and the
//! membership workflow, each gated by the access check where required.

mod groups;
mod missions;
mod resources;
mod users;

pub use groups::GroupsService;
pub use missions::MissionsService;
pub use resources::{ResourceChanges, ResourceDraft, ResourceService};
pub use users::{IdentityLookup, UserDirectory};
