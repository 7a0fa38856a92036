//! Domain models for the server.
//!
//! These mirror rows owned by the persistence collaborator. The in-memory
//! engines hold snapshots of them, never live references.

pub mod cart;
pub mod category;
pub mod order;
pub mod product;
pub mod user;

pub use cart::{CartItem, CartLine};
pub use category::{Category, NewCategory};
pub use order::{NewOrder, Order, OrderDetails, OrderItem, OrderLine, Payment, PlacedOrder};
pub use product::{NewProduct, Product, ProductUpdate};
pub use user::CurrentUser;
