//! Credit cards.

mod core;
mod endpoints;

pub use core::{Card, CardUpdate, NewCard, check_card_owner, create_card, create_card_table};
pub use endpoints::{
    create_card_endpoint, delete_card_endpoint, get_card_endpoint, get_cards_endpoint,
    update_card_endpoint,
};
