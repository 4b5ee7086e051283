//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use forkful_core::ports::{CartStore, CatalogLookup, IdentityVerifier, OrderLedger, PaymentGateway};

use crate::config::CommerceConfig;
use crate::services::{CartService, CheckoutService};

/// The components a storefront is assembled from.
///
/// `main` fills this with the `PostgreSQL` stores and the configured gateway;
/// tests use the in-memory stores and the sandbox gateway.
pub struct Components {
    pub carts: Arc<dyn CartStore>,
    pub catalog: Arc<dyn CatalogLookup>,
    pub ledger: Arc<dyn OrderLedger>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub commerce: CommerceConfig,
    pub gateway_timeout: Duration,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cart: CartService,
    checkout: CheckoutService,
    catalog: Arc<dyn CatalogLookup>,
    ledger: Arc<dyn OrderLedger>,
    verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    /// Wire services over the given components.
    #[must_use]
    pub fn new(components: Components) -> Self {
        let Components {
            carts,
            catalog,
            ledger,
            gateway,
            verifier,
            commerce,
            gateway_timeout,
        } = components;

        let cart = CartService::new(Arc::clone(&carts), Arc::clone(&catalog), commerce);
        let checkout = CheckoutService::new(
            carts,
            Arc::clone(&catalog),
            Arc::clone(&ledger),
            gateway,
            commerce,
            gateway_timeout,
        );

        Self {
            inner: Arc::new(AppStateInner {
                cart,
                checkout,
                catalog,
                ledger,
                verifier,
            }),
        }
    }

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogLookup {
        self.inner.catalog.as_ref()
    }

    /// The order ledger, for readiness checks.
    #[must_use]
    pub fn ledger(&self) -> &dyn OrderLedger {
        self.inner.ledger.as_ref()
    }

    #[must_use]
    pub fn verifier(&self) -> &dyn IdentityVerifier {
        self.inner.verifier.as_ref()
    }
}
