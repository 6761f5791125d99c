//! Sharing transaction data between users.

mod core;
mod endpoints;

pub use core::{
    Share, SharePermissions, ShareStatus, ShareTarget, create_share, create_share_table,
    get_visible_user_ids, respond_to_share,
};
pub use endpoints::{
    accept_share_endpoint, create_share_endpoint, decline_share_endpoint, delete_share_endpoint,
    get_shares_endpoint,
};
