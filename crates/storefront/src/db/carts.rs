//! `PostgreSQL` cart store.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use forkful_core::ports::CartStore;
use forkful_core::{Cart, CartLine, CommerceError, MenuItemId, SubjectId};

use super::RepositoryError;

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    item_id: MenuItemId,
    quantity: i32,
}

/// Carts in `storefront.cart` / `storefront.cart_line`.
#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction holding the subject's advisory lock.
    async fn begin_locked(
        &self,
        subject: &SubjectId,
    ) -> Result<Transaction<'static, Postgres>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(subject.as_str())
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

fn storage(err: sqlx::Error) -> CommerceError {
    RepositoryError::from(err).into()
}

async fn load_cart(
    conn: &mut sqlx::PgConnection,
    subject: &SubjectId,
) -> Result<Cart, RepositoryError> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        r"
        SELECT item_id, quantity
        FROM storefront.cart_line
        WHERE subject_id = $1
        ",
    )
    .bind(subject.as_str())
    .fetch_all(conn)
    .await?;

    let lines = rows
        .into_iter()
        .map(|row| {
            let quantity = u32::try_from(row.quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!(
                    "negative quantity for item {}",
                    row.item_id
                ))
            })?;
            Ok(CartLine {
                item_id: row.item_id,
                quantity,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

    Ok(Cart::from_lines(subject.clone(), lines))
}

/// Row changes needed to persist one line of a mutated cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineWrite {
    /// Ensure the cart row exists and store the line's quantity.
    Upsert(u32),
    /// Delete the line; `drop_cart` once no lines remain.
    Remove { drop_cart: bool },
}

impl LineWrite {
    fn plan(cart: &Cart, item: MenuItemId) -> Self {
        match cart.quantity(item) {
            0 => Self::Remove {
                drop_cart: cart.is_empty(),
            },
            quantity => Self::Upsert(quantity),
        }
    }
}

/// Persist one line of `cart` after a mutation.
///
/// The cart row is written only alongside a stored line and is deleted with
/// its last line, so an empty cart never has a row.
async fn write_line(
    tx: &mut Transaction<'static, Postgres>,
    cart: &Cart,
    item: MenuItemId,
) -> Result<(), CommerceError> {
    let subject = cart.subject().as_str();

    match LineWrite::plan(cart, item) {
        LineWrite::Remove { drop_cart } => {
            sqlx::query("DELETE FROM storefront.cart_line WHERE subject_id = $1 AND item_id = $2")
                .bind(subject)
                .bind(item)
                .execute(&mut **tx)
                .await
                .map_err(storage)?;
            if drop_cart {
                sqlx::query("DELETE FROM storefront.cart WHERE subject_id = $1")
                    .bind(subject)
                    .execute(&mut **tx)
                    .await
                    .map_err(storage)?;
            }
        }
        LineWrite::Upsert(quantity) => {
            let quantity = i32::try_from(quantity)
                .map_err(|_| CommerceError::invalid_argument("quantity is too large"))?;
            sqlx::query(
                r"
                INSERT INTO storefront.cart (subject_id)
                VALUES ($1)
                ON CONFLICT (subject_id) DO UPDATE SET updated_at = NOW()
                ",
            )
            .bind(subject)
            .execute(&mut **tx)
            .await
            .map_err(storage)?;
            sqlx::query(
                r"
                INSERT INTO storefront.cart_line (subject_id, item_id, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (subject_id, item_id) DO UPDATE SET quantity = EXCLUDED.quantity
                ",
            )
            .bind(subject)
            .bind(item)
            .bind(quantity)
            .execute(&mut **tx)
            .await
            .map_err(storage)?;
        }
    }
    Ok(())
}

#[async_trait]
impl CartStore for PgCartStore {
    #[instrument(skip_all, fields(subject = %subject))]
    async fn get(&self, subject: &SubjectId) -> Result<Cart, CommerceError> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        Ok(load_cart(&mut conn, subject).await?)
    }

    #[instrument(skip_all, fields(subject = %subject, item = %item))]
    async fn add(
        &self,
        subject: &SubjectId,
        item: MenuItemId,
        delta: u32,
    ) -> Result<Cart, CommerceError> {
        let mut tx = self.begin_locked(subject).await?;
        let mut cart = load_cart(&mut tx, subject).await?;
        cart.add(item, delta)?;
        write_line(&mut tx, &cart, item).await?;
        tx.commit().await.map_err(storage)?;
        Ok(cart)
    }

    #[instrument(skip_all, fields(subject = %subject, item = %item))]
    async fn set_quantity(
        &self,
        subject: &SubjectId,
        item: MenuItemId,
        quantity: i64,
    ) -> Result<Cart, CommerceError> {
        let mut tx = self.begin_locked(subject).await?;
        let mut cart = load_cart(&mut tx, subject).await?;
        cart.set_quantity(item, quantity)?;
        write_line(&mut tx, &cart, item).await?;
        tx.commit().await.map_err(storage)?;
        Ok(cart)
    }

    #[instrument(skip_all, fields(subject = %subject))]
    async fn clear(&self, subject: &SubjectId) -> Result<(), CommerceError> {
        let mut tx = self.begin_locked(subject).await?;
        sqlx::query("DELETE FROM storefront.cart WHERE subject_id = $1")
            .bind(subject.as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)?;
        Ok(())
    }
}
