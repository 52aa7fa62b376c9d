//! # CLI Commands
//!
//! One function per subcommand. Each returns the value to print or an
//! [`ApiError`].

use clap::ValueEnum;
use lustre_core::{Money, Order, OrderRequest, OrderStatus, PaymentStatus};
use lustre_db::{CodeCheck, OrderService};
use std::path::Path;
use tracing::{debug, info};

use crate::error::ApiError;

/// Fulfillment status as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl From<StatusArg> for OrderStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Processing => OrderStatus::Processing,
            StatusArg::Shipped => OrderStatus::Shipped,
            StatusArg::Delivered => OrderStatus::Delivered,
            StatusArg::Cancelled => OrderStatus::Cancelled,
        }
    }
}

/// Payment status as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PaymentArg {
    Pending,
    Paid,
    Failed,
}

impl From<PaymentArg> for PaymentStatus {
    fn from(arg: PaymentArg) -> Self {
        match arg {
            PaymentArg::Pending => PaymentStatus::Pending,
            PaymentArg::Paid => PaymentStatus::Paid,
            PaymentArg::Failed => PaymentStatus::Failed,
        }
    }
}

/// Reads a JSON order request from `path` (`-` for stdin).
pub fn read_request(path: &Path) -> Result<OrderRequest, ApiError> {
    let raw = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin())
    } else {
        std::fs::read_to_string(path)
    }
    .map_err(|e| ApiError::invalid_request(format!("Cannot read {}: {}", path.display(), e)))?;

    parse_request(&raw)
}

/// Parses a camelCase JSON order request.
pub fn parse_request(raw: &str) -> Result<OrderRequest, ApiError> {
    serde_json::from_str(raw)
        .map_err(|e| ApiError::invalid_request(format!("Malformed order request: {}", e)))
}

pub async fn place_order(service: &OrderService, request: &OrderRequest) -> Result<Order, ApiError> {
    debug!(customer_id = %request.customer_id, "place-order");
    let order = service.create_order(request).await?;
    info!(order_id = %order.id, "Placed order");
    Ok(order)
}

/// Lists one customer's orders, or every order when no customer is given.
pub async fn list_orders(
    service: &OrderService,
    customer: Option<&str>,
) -> Result<Vec<Order>, ApiError> {
    let orders = match customer {
        Some(customer_id) => service.list_orders_for_customer(customer_id).await?,
        None => service.list_all_orders().await?,
    };
    Ok(orders)
}

pub async fn show_order(service: &OrderService, order_id: &str) -> Result<Order, ApiError> {
    Ok(service.get_order(order_id).await?)
}

pub async fn set_status(
    service: &OrderService,
    order_id: &str,
    status: Option<StatusArg>,
    payment_status: Option<PaymentArg>,
) -> Result<Order, ApiError> {
    if status.is_none() && payment_status.is_none() {
        return Err(ApiError::invalid_request(
            "Nothing to update: pass --status and/or --payment-status",
        ));
    }

    Ok(service
        .update_order_status(order_id, status.map(Into::into), payment_status.map(Into::into))
        .await?)
}

/// Checks a discount code without redeeming it.
pub async fn check_code(
    service: &OrderService,
    code: &str,
    subtotal_cents: i64,
    customer: Option<&str>,
) -> Result<CodeCheck, ApiError> {
    debug!(code = %code, subtotal_cents, "check-code");
    Ok(service
        .check_discount_code(code, Money::from_cents(subtotal_cents), customer)
        .await?)
}
