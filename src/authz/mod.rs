//! Resource-scoped authorization and membership lifecycle.
//!
//! This module implements:
//! - the access gate (`authorize`): resource lookup, grant lookup, ordinal check
//! - the membership primitives (`MembershipEngine`): join requests, grants,
//!   level revision and revocation, each a single atomic store update

mod engine;
mod guard;

pub use engine::{ensure_applied, MembershipEngine};
pub use guard::{authorize, check_level, grant_of, Grant};

/// Action names used in denial messages and activity events.
pub mod actions {
    pub const UPDATE: &str = "update";
    pub const EXPORT: &str = "export";
    pub const REQUEST_JOIN: &str = "request_join";
    pub const CANCEL_JOIN: &str = "cancel_join_request";
    pub const ACCEPT_JOIN: &str = "accept_join_request";
    pub const REJECT_JOIN: &str = "reject_join_request";
    pub const ADD_MEMBER: &str = "add_member";
    pub const CHANGE_LEVEL: &str = "change_member_level";
    pub const REMOVE_MEMBER: &str = "remove_member";
    pub const LEAVE: &str = "leave";
    pub const VIEW_ACCESS: &str = "view_access";
}
