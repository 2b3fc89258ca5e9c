//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::cart::CartService;
use crate::checkout::CheckoutService;
use crate::config::ShopConfig;
use crate::notify::{LogNotifier, Notifier};
use crate::payments::{PaymentGateway, SignatureVerifier, hosted::HostedGateway};
use crate::stores::{
    CartStore, CatalogStore, OrderStore,
    postgres::{PgCarts, PgCatalog, PgOrders},
};
use crate::webhook::WebhookProcessor;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like stores and services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    catalog: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
    cart: CartService,
    checkout: CheckoutService,
    webhook: WebhookProcessor,
}

impl AppState {
    /// Create the production state: Postgres-backed stores, the hosted
    /// payment gateway, and a log-only notifier.
    #[must_use]
    pub fn new(config: &ShopConfig, pool: PgPool) -> Self {
        let catalog: Arc<dyn CatalogStore> = Arc::new(PgCatalog::new(pool.clone()));
        let carts: Arc<dyn CartStore> = Arc::new(PgCarts::new(pool.clone()));
        let orders: Arc<dyn OrderStore> = Arc::new(PgOrders::new(pool));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(HostedGateway::new(&config.payment));
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
        let verifier = SignatureVerifier::new(config.payment.webhook_secret.clone());

        Self::from_parts(
            config.base_url.clone(),
            catalog,
            carts,
            orders,
            gateway,
            notifier,
            verifier,
        )
    }

    /// Assemble state from explicit parts. Lets tests swap in in-memory
    /// stores and gateway doubles.
    #[must_use]
    pub fn from_parts(
        base_url: String,
        catalog: Arc<dyn CatalogStore>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        verifier: SignatureVerifier,
    ) -> Self {
        let cart = CartService::new(Arc::clone(&carts), Arc::clone(&catalog));
        let checkout = CheckoutService::new(
            Arc::clone(&carts),
            Arc::clone(&catalog),
            Arc::clone(&gateway),
            base_url,
        );
        let webhook = WebhookProcessor::new(
            Arc::clone(&catalog),
            Arc::clone(&carts),
            Arc::clone(&orders),
            gateway,
            notifier,
            verifier,
        );

        Self {
            inner: Arc::new(AppStateInner {
                catalog,
                orders,
                cart,
                checkout,
                webhook,
            }),
        }
    }

    /// Get a reference to the catalog store.
    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogStore {
        self.inner.catalog.as_ref()
    }

    /// Get a reference to the order store.
    #[must_use]
    pub fn orders(&self) -> &dyn OrderStore {
        self.inner.orders.as_ref()
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    /// Get a reference to the checkout service.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    /// Get a reference to the webhook processor.
    #[must_use]
    pub fn webhook(&self) -> &WebhookProcessor {
        &self.inner.webhook
    }
}
