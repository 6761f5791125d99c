//! Users, their profiles and the endpoints for managing the current user's account.

mod core;
mod endpoints;

pub use core::{
    NewUser, User, UserID, UserUpdate, count_users, create_user, create_user_table,
    deactivate_user, get_active_user_ids, get_user_by_email, get_user_by_id, record_login,
    set_email_verified, set_password, update_user_profile, validate_email,
};
pub use endpoints::{
    change_password, deactivate_current_user, get_current_user, get_profile, update_current_user,
};
