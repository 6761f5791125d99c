//! Income and expense categories.

mod core;
mod endpoints;

pub use core::{
    Category, CategoryKind, CategoryName, CategoryUpdate, NewCategory, check_category_visible,
    create_category, create_category_table,
};
pub use endpoints::{
    create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
    get_category_endpoint, update_category_endpoint,
};

#[cfg(test)]
pub use core::delete_category;
