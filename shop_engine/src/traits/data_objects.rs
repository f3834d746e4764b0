use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shop_common::MinorUnits;

use crate::db_types::{OrderStatusType, OwnerId, ProductId};

/// The largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub product_id: ProductId,
    pub requested: i64,
    pub available: i64,
    pub shortfall: i64,
}

impl StockShortfall {
    pub fn new(product_id: ProductId, requested: i64, available: i64) -> Self {
        Self { product_id, requested, available, shortfall: requested - available }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockValidation {
    pub is_valid: bool,
    pub shortfalls: Vec<StockShortfall>,
}

impl StockValidation {
    pub fn new(shortfalls: Vec<StockShortfall>) -> Self {
        Self { is_valid: shortfalls.is_empty(), shortfalls }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    /// Creates a page request, clamping `page` to at least 1 and `limit` to `1..=100`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page: page.max(1), limit: limit.clamp(1, MAX_PAGE_SIZE) }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> i64 {
        let limit = i64::from(self.limit.max(1));
        (self.total + limit - 1) / limit
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Criteria for [`crate::traits::OrderManagement::search_orders`]. Criteria are combined with `AND`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub owner_id: Option<OwnerId>,
    pub status: Option<OrderStatusType>,
    pub created_before: Option<DateTime<Utc>>,
    pub sort: SortOrder,
    /// When `None`, every matching order is returned.
    pub pagination: Option<Pagination>,
}

impl OrderQueryFilter {
    pub fn with_owner_id(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_created_before(mut self, created_before: DateTime<Utc>) -> Self {
        self.created_before = Some(created_before);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.sort = SortOrder::NewestFirst;
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatistics {
    pub total_orders: i64,
    pub count_by_status: HashMap<OrderStatusType, i64>,
    /// Σ total of orders that have been paid and not cancelled
    pub revenue_minor: MinorUnits,
    pub average_order_minor: MinorUnits,
}

impl OrderStatistics {
    pub fn is_revenue_status(status: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(status, Paid | Processing | Shipped | Delivered)
    }

    /// Builds the statistics from `(status, count, Σ total)` rows.
    pub fn from_status_totals(rows: Vec<(OrderStatusType, i64, i64)>) -> Self {
        let mut result = Self::default();
        let mut revenue_orders = 0i64;
        let mut revenue = 0i64;
        for (status, count, total) in rows {
            result.total_orders += count;
            *result.count_by_status.entry(status).or_default() += count;
            if Self::is_revenue_status(status) {
                revenue_orders += count;
                revenue = revenue.saturating_add(total);
            }
        }
        result.revenue_minor = MinorUnits::from(revenue);
        result.average_order_minor =
            if revenue_orders > 0 { MinorUnits::from(revenue / revenue_orders) } else { MinorUnits::ZERO };
        result
    }
}
