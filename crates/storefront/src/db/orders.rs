//! `PostgreSQL` order ledger.
//!
//! Mutations load the row `FOR UPDATE`, apply the rule on [`Order`] and write
//! the mutable columns back in the same transaction. Two concurrent
//! settlements of one order therefore run one after the other: the second
//! sees the first one's transaction id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use forkful_core::ports::OrderLedger;
use forkful_core::{
    CommerceError, DeliveryAddress, Money, NewOrder, Order, OrderId, OrderLine, OrderStatus,
    PaymentCallback, PaymentIntentId, SettleOutcome, Signature, SubjectId, TransactionId,
};

use super::{RepositoryError, map_unique_violation};

const ORDER_COLUMNS: &str = r"
    id, subject_id, lines, amount, delivery_fee, currency, address, status,
    payment_captured, payment_method, payment_intent_id, transaction_id, signature,
    created_at, updated_at
";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    subject_id: String,
    lines: Json<Vec<OrderLine>>,
    amount: i64,
    delivery_fee: i64,
    currency: String,
    address: Json<DeliveryAddress>,
    status: OrderStatus,
    payment_captured: bool,
    payment_method: String,
    payment_intent_id: Option<String>,
    transaction_id: Option<String>,
    signature: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn corrupt(field: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid {field} in customer_order: {err}"))
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            subject: SubjectId::parse(&row.subject_id).map_err(|e| corrupt("subject_id", e))?,
            lines: row.lines.0,
            amount: Money::from_minor(row.amount),
            delivery_fee: Money::from_minor(row.delivery_fee),
            currency: row.currency.parse().map_err(|e| corrupt("currency", e))?,
            address: row.address.0,
            status: row.status,
            payment_captured: row.payment_captured,
            payment_method: row
                .payment_method
                .parse()
                .map_err(|e| corrupt("payment_method", e))?,
            payment_intent_id: row
                .payment_intent_id
                .map(PaymentIntentId::parse)
                .transpose()
                .map_err(|e| corrupt("payment_intent_id", e))?,
            transaction_id: row
                .transaction_id
                .map(TransactionId::parse)
                .transpose()
                .map_err(|e| corrupt("transaction_id", e))?,
            signature: row
                .signature
                .map(Signature::parse)
                .transpose()
                .map_err(|e| corrupt("signature", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Orders in `storefront.customer_order`.
#[derive(Clone)]
pub struct PgOrderLedger {
    pool: PgPool,
}

impl PgOrderLedger {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_optional(
        query: sqlx::query::QueryAs<'_, Postgres, OrderRow, sqlx::postgres::PgArguments>,
        pool: &PgPool,
    ) -> Result<Option<Order>, RepositoryError> {
        query
            .fetch_optional(pool)
            .await?
            .map(Order::try_from)
            .transpose()
    }

    /// Lock an order row for the rest of the transaction.
    async fn lock(
        tx: &mut Transaction<'static, Postgres>,
        order_id: OrderId,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE id = $1 FOR UPDATE"
        );
        sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(RepositoryError::NotFound("order"))?
            .try_into()
    }

    /// Write back the columns that may change after creation.
    async fn save(
        tx: &mut Transaction<'static, Postgres>,
        order: &Order,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE storefront.customer_order
            SET status = $2,
                payment_captured = $3,
                payment_intent_id = $4,
                transaction_id = $5,
                signature = $6,
                updated_at = $7
            WHERE id = $1
            ",
        )
        .bind(order.id)
        .bind(order.status)
        .bind(order.payment_captured)
        .bind(order.payment_intent_id.as_ref().map(PaymentIntentId::as_str))
        .bind(order.transaction_id.as_ref().map(TransactionId::as_str))
        .bind(order.signature.as_ref().map(Signature::as_str))
        .bind(order.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_unique_violation(e, "payment intent is attached to another order"))?;
        Ok(())
    }

    /// Lock `order_id`, apply `change`, and persist the result.
    async fn mutate<T: Send>(
        &self,
        order_id: OrderId,
        change: impl FnOnce(&mut Order) -> Result<(T, bool), CommerceError> + Send,
    ) -> Result<(Order, T), CommerceError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let mut order = Self::lock(&mut tx, order_id).await?;
        let (value, dirty) = change(&mut order)?;
        if dirty {
            Self::save(&mut tx, &order).await?;
        }
        tx.commit().await.map_err(RepositoryError::from)?;
        Ok((order, value))
    }

    async fn list_where(
        &self,
        predicate: &str,
        subject: Option<&SubjectId>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order {predicate} ORDER BY created_at DESC, id"
        );
        let mut query = sqlx::query_as::<_, OrderRow>(&sql);
        if let Some(subject) = subject {
            query = query.bind(subject.as_str());
        }
        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Order::try_from)
            .collect()
    }
}

#[async_trait]
impl OrderLedger for PgOrderLedger {
    #[instrument(skip_all, fields(subject = %order.subject))]
    async fn create(&self, order: NewOrder) -> Result<Order, CommerceError> {
        let order = Order::open(order, Utc::now())?;
        let sql = format!(
            r"
            INSERT INTO storefront.customer_order ({ORDER_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "
        );
        sqlx::query(&sql)
            .bind(order.id)
            .bind(order.subject.as_str())
            .bind(Json(&order.lines))
            .bind(order.amount.minor())
            .bind(order.delivery_fee.minor())
            .bind(order.currency.code())
            .bind(Json(&order.address))
            .bind(order.status)
            .bind(order.payment_captured)
            .bind(order.payment_method.as_str())
            .bind(None::<String>)
            .bind(None::<String>)
            .bind(None::<String>)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        tracing::info!(order_id = %order.id, amount = %order.amount, "Order created");
        Ok(order)
    }

    #[instrument(skip_all, fields(order_id = %order_id, intent = %intent))]
    async fn attach_payment_intent(
        &self,
        order_id: OrderId,
        intent: PaymentIntentId,
    ) -> Result<Order, CommerceError> {
        let (order, ()) = self
            .mutate(order_id, |order| {
                order.attach_payment_intent(intent, Utc::now())?;
                Ok(((), true))
            })
            .await?;
        Ok(order)
    }

    #[instrument(skip_all, fields(order_id = %order_id, transaction = %callback.transaction_id))]
    async fn mark_settled(
        &self,
        order_id: OrderId,
        callback: &PaymentCallback,
    ) -> Result<(Order, SettleOutcome), CommerceError> {
        self.mutate(order_id, |order| {
            let outcome = order.settle(callback, Utc::now())?;
            Ok((outcome, outcome == SettleOutcome::Settled))
        })
        .await
    }

    #[instrument(skip_all, fields(order_id = %order_id, status = %status))]
    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, CommerceError> {
        let (order, ()) = self
            .mutate(order_id, |order| {
                order.advance(status, Utc::now())?;
                Ok(((), true))
            })
            .await?;
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn get(&self, order_id: OrderId) -> Result<Order, CommerceError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE id = $1");
        let query = sqlx::query_as::<_, OrderRow>(&sql).bind(order_id);
        Ok(Self::fetch_optional(query, &self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("order"))?)
    }

    #[instrument(skip_all, fields(intent = %intent))]
    async fn find_by_intent(&self, intent: &PaymentIntentId) -> Result<Order, CommerceError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE payment_intent_id = $1"
        );
        let query = sqlx::query_as::<_, OrderRow>(&sql).bind(intent.as_str());
        Ok(Self::fetch_optional(query, &self.pool)
            .await?
            .ok_or(RepositoryError::NotFound("order for payment intent"))?)
    }

    #[instrument(skip_all, fields(subject = %subject))]
    async fn list_by_subject(&self, subject: &SubjectId) -> Result<Vec<Order>, CommerceError> {
        Ok(self.list_where("WHERE subject_id = $1", Some(subject)).await?)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Order>, CommerceError> {
        Ok(self.list_where("", None).await?)
    }

    async fn ping(&self) -> Result<(), CommerceError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}
