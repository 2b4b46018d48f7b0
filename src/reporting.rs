//! Dashboard statistics. Everything here is read-only and recomputed on every call.
use std::collections::HashMap;

use chrono::{DateTime, Days, Local, NaiveDate, TimeDelta, TimeZone, Utc};
use tracing::{debug, warn};

use crate::catalog::{Product, ProductProvider, UserProvider};
use crate::config::DashboardConfig;
use crate::error::Result;
use crate::order::{Order, OrderDetail, saturating_total};
use crate::orders::{OrderStore, newest_first};

pub const UNCATEGORISED: &str = "Other";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayRevenue {
    pub day: NaiveDate,
    pub revenue: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub total_products: usize,
    pub total_users: usize,
    pub total_orders: usize,
    pub total_revenue: u64,
    pub revenue_chart: Vec<DayRevenue>,
    pub category_chart: Vec<CategoryCount>,
    pub recent_orders: Vec<OrderDetail>,
    pub top_products: Vec<Product>,
}

/// Gross revenue: `total_price` of every live order, whatever its status or payment state.
/// Pins at `u64::MAX` rather than overflowing.
pub fn total_revenue<O: AsRef<Order>>(orders: &[O]) -> u64 {
    saturating_total(
        orders
            .iter()
            .map(AsRef::as_ref)
            .filter(|order| !order.is_destroyed())
            .map(|order| order.total_price),
    )
}

/// Product count per category, in order of first appearance. Missing or blank categories
/// count as [`UNCATEGORISED`].
pub fn category_distribution(products: &[Product]) -> Vec<CategoryCount> {
    let mut chart: Vec<CategoryCount> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for product in products {
        let category = product
            .category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(UNCATEGORISED);

        match slots.get(category) {
            Some(&slot) => chart[slot].count += 1,
            None => {
                slots.insert(category, chart.len());
                chart.push(CategoryCount {
                    category: category.to_string(),
                    count: 1,
                });
            }
        }
    }
    chart
}

/// Revenue for each of the `days` calendar days ending with the day of `now`, oldest first.
///
/// A day covers `[local midnight, local midnight + 24h)` in the time zone of `now`.
pub fn daily_revenue_series<O, Tz>(orders: &[O], days: usize, now: &DateTime<Tz>) -> Vec<DayRevenue>
where
    O: AsRef<Order>,
    Tz: TimeZone,
{
    let today = now.date_naive();
    let tz = now.timezone();

    (0..days)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back as u64)))
        .map(|day| {
            let start = day_start(&tz, day);
            let end = start + TimeDelta::hours(24);
            let revenue = saturating_total(
                orders
                    .iter()
                    .map(AsRef::as_ref)
                    .filter(|order| !order.is_destroyed())
                    .filter(|order| {
                        let at = order.created_at.to_datetime_utc();
                        start <= at && at < end
                    })
                    .map(|order| order.total_price),
            );

            DayRevenue { day, revenue }
        })
        .collect()
}

// Local midnight as a UTC instant. Where midnight does not exist (DST gap) the day starts at
// the first instant after the gap.
fn day_start<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(chrono::NaiveTime::MIN);
    let mut candidate = midnight;

    for _ in 0..=24 {
        if let Some(start) = tz.from_local_datetime(&candidate).earliest() {
            return start.with_timezone(&Utc);
        }
        candidate += TimeDelta::hours(1);
    }

    warn!(%day, "No valid local midnight; falling back to UTC midnight");
    midnight.and_utc()
}

/// The `n` newest orders. Ties on creation time go to the later id.
pub fn recent_orders<O: AsRef<Order> + Clone>(orders: &[O], n: usize) -> Vec<O> {
    let mut sorted: Vec<O> = orders.to_vec();
    newest_first(&mut sorted);
    sorted.truncate(n);
    sorted
}

/// The first `n` products in listing order. There is no ranking.
pub fn top_products(products: &[Product], n: usize) -> Vec<Product> {
    products.iter().take(n).cloned().collect()
}

/// Builds the dashboard from the order store and the user and product collaborators.
pub struct ReportingAggregator<'a> {
    orders: &'a OrderStore,
    products: &'a dyn ProductProvider,
    users: &'a dyn UserProvider,
    config: DashboardConfig,
}

impl<'a> ReportingAggregator<'a> {
    pub fn new(
        orders: &'a OrderStore,
        products: &'a dyn ProductProvider,
        users: &'a dyn UserProvider,
        config: DashboardConfig,
    ) -> Self {
        Self {
            orders,
            products,
            users,
            config,
        }
    }

    /// Dashboard as of now, with day boundaries in the server's local time zone.
    pub fn dashboard(&self) -> Result<Dashboard> {
        self.dashboard_at(&Local::now())
    }

    #[tracing::instrument(skip(self, now))]
    pub fn dashboard_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Dashboard> {
        let products = self.products.get_all()?;
        let total_users = self.users.get_all()?.len();
        let orders = self.orders.list_all(self.users)?;

        let dashboard = Dashboard {
            total_products: products.len(),
            total_users,
            total_orders: orders.len(),
            total_revenue: total_revenue(&orders),
            revenue_chart: daily_revenue_series(&orders, self.config.revenue_days, now),
            category_chart: category_distribution(&products),
            recent_orders: recent_orders(&orders, self.config.recent_orders),
            top_products: top_products(&products, self.config.top_products),
        };

        debug!(
            orders = dashboard.total_orders,
            revenue = dashboard.total_revenue,
            "Dashboard computed"
        );
        Ok(dashboard)
    }
}
