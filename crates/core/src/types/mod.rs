//! Domain types shared by every Forkful component.
//!
//! Everything in here is plain data plus the rules that guard it. Nothing
//! touches a database, the network, or the clock on its own.

pub mod cart;
pub mod catalog;
pub mod id;
pub mod money;
pub mod order;
pub mod payment;
pub mod status;

pub use cart::{Cart, CartLine, parse_delta};
pub use catalog::CatalogItem;
pub use id::*;
pub use money::{CurrencyCode, Money};
pub use order::{DeliveryAddress, NewOrder, Order, OrderLine, SettleOutcome, order_total};
pub use payment::{PaymentCallback, PaymentIntent, PaymentMethod};
pub use status::{OrderStatus, SubjectRole};
