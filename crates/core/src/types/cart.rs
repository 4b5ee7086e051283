//! Per-subject cart and its reconciliation rules.
//!
//! A cart maps menu items to quantities. Quantities are always at least one:
//! a line that would drop to zero is removed instead of stored. Stores load a
//! cart, apply one of these operations while holding the subject's lock, and
//! persist the result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CommerceError, MenuItemId, SubjectId};

/// One `{item, quantity}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub item_id: MenuItemId,
    pub quantity: u32,
}

/// A subject's pre-checkout selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    subject: SubjectId,
    lines: BTreeMap<MenuItemId, u32>,
}

impl Cart {
    /// An empty cart for `subject`.
    #[must_use]
    pub const fn empty(subject: SubjectId) -> Self {
        Self {
            subject,
            lines: BTreeMap::new(),
        }
    }

    /// Rebuild a cart from stored lines, dropping any zero quantities.
    #[must_use]
    pub fn from_lines(subject: SubjectId, lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::empty(subject);
        for line in lines.into_iter().filter(|l| l.quantity > 0) {
            let entry = cart.lines.entry(line.item_id).or_insert(0);
            *entry = entry.saturating_add(line.quantity);
        }
        cart
    }

    #[must_use]
    pub const fn subject(&self) -> &SubjectId {
        &self.subject
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Quantity of `item`, zero when absent.
    #[must_use]
    pub fn quantity(&self, item: MenuItemId) -> u32 {
        self.lines.get(&item).copied().unwrap_or(0)
    }

    /// Lines ordered by item id.
    pub fn lines(&self) -> impl Iterator<Item = CartLine> + '_ {
        self.lines.iter().map(|(item_id, quantity)| CartLine {
            item_id: *item_id,
            quantity: *quantity,
        })
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Add `delta` units of `item`, inserting the line if needed.
    ///
    /// Returns the new quantity of the line.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `delta` is zero or the quantity would overflow.
    pub fn add(&mut self, item: MenuItemId, delta: u32) -> Result<u32, CommerceError> {
        if delta == 0 {
            return Err(CommerceError::invalid_argument(
                "quantity must be at least 1",
            ));
        }
        let current = self.quantity(item);
        let next = current
            .checked_add(delta)
            .ok_or_else(|| CommerceError::invalid_argument("quantity is too large"))?;
        self.lines.insert(item, next);
        Ok(next)
    }

    /// Replace the quantity of an existing line; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a negative or oversized quantity and
    /// `NotFound` if the cart has no line for `item` and `quantity` is positive.
    /// Setting an absent line to zero is a no-op.
    pub fn set_quantity(&mut self, item: MenuItemId, quantity: i64) -> Result<(), CommerceError> {
        if quantity < 0 {
            return Err(CommerceError::invalid_argument(
                "quantity cannot be negative",
            ));
        }
        let quantity = u32::try_from(quantity)
            .map_err(|_| CommerceError::invalid_argument("quantity is too large"))?;
        if quantity == 0 {
            self.lines.remove(&item);
            return Ok(());
        }
        let Some(line) = self.lines.get_mut(&item) else {
            return Err(CommerceError::not_found("item not found in cart"));
        };
        *line = quantity;
        Ok(())
    }

    /// Whether a client-submitted selection describes exactly this cart.
    ///
    /// Duplicate entries in `selection` are summed; order does not matter.
    #[must_use]
    pub fn matches_selection(&self, selection: &[CartLine]) -> bool {
        let mut submitted: BTreeMap<MenuItemId, u64> = BTreeMap::new();
        for line in selection {
            *submitted.entry(line.item_id).or_insert(0) += u64::from(line.quantity);
        }
        submitted.retain(|_, q| *q > 0);

        submitted.len() == self.lines.len()
            && submitted
                .iter()
                .all(|(item, q)| self.lines.get(item).is_some_and(|held| u64::from(*held) == *q))
    }
}

/// Validate an optional add-to-cart quantity from the boundary (default 1).
///
/// # Errors
///
/// Returns `InvalidArgument` unless the value is between 1 and `u32::MAX`.
pub fn parse_delta(quantity: Option<i64>) -> Result<u32, CommerceError> {
    let raw = quantity.unwrap_or(1);
    if raw < 1 {
        return Err(CommerceError::invalid_argument(
            "quantity must be at least 1",
        ));
    }
    u32::try_from(raw).map_err(|_| CommerceError::invalid_argument("quantity is too large"))
}
