//! Storefront services.
//!
//! - `cart` - Priced cart views over the cart store and catalog
//! - `checkout` - Order placement, payment settlement and fulfilment status
//! - `identity` - Bearer token verification

pub mod cart;
pub mod checkout;
pub mod identity;

pub use cart::{CartService, CartView, CartViewLine};
pub use checkout::{CheckoutService, PlaceOrder, PlacedOrder, VerifiedPayment};
pub use identity::{Claims, JwtVerifier};
