//! Order status email content.

use chrono::{DateTime, Utc};

use merchstore_core::{Price, Size};
use merchstore_orders::{Order, OrderId};

/// Which lifecycle notification to render.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OrderEmailKind {
    /// Sent on placement; asks the customer to arrange pickup.
    Confirmed,
    /// Sent when the order was picked up.
    Processed,
    /// Sent when the order was cancelled (by an admin or the stale sweep).
    Cancelled,
}

/// Store identity woven into every email. Comes from configuration so the
/// templates stay free of deployment-specific text.
#[derive(Debug, Clone)]
pub struct EmailBranding {
    /// Display name of the store, e.g. "Club Merch".
    pub store_name: String,
    /// Discord handle customers should contact about pickup.
    pub contact_handle: String,
}

/// One rendered line of an order email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEmailLine {
    pub product_name: String,
    pub size: Option<Size>,
    pub quantity: u32,
    pub unit_price: Price,
}

/// Everything the templates need about one order.
///
/// Product names are resolved by the caller from the catalog read model;
/// the order itself only stores product ids.
#[derive(Debug, Clone)]
pub struct OrderEmailView {
    pub order_id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    pub discord: String,
    pub placed_at: DateTime<Utc>,
    pub lines: Vec<OrderEmailLine>,
    pub total: Price,
}

impl OrderEmailView {
    /// Assemble a view from an order plus a product-name resolver.
    pub fn from_order<F>(order: &Order, product_name: F) -> Self
    where
        F: Fn(merchstore_catalog::ProductId) -> Option<String>,
    {
        Self {
            order_id: order.id_typed(),
            customer_name: order.customer().name.clone(),
            customer_email: order.customer().email.clone(),
            discord: order.customer().discord.clone(),
            placed_at: order.placed_at(),
            lines: order
                .lines()
                .iter()
                .map(|line| OrderEmailLine {
                    product_name: product_name(line.product_id)
                        .unwrap_or_else(|| "(removed product)".to_string()),
                    size: line.size,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
            total: order.total(),
        }
    }
}

/// Subject line for a lifecycle notification.
pub fn subject(kind: OrderEmailKind, branding: &EmailBranding) -> String {
    match kind {
        OrderEmailKind::Confirmed => {
            format!("[ACTION REQUIRED] {} - Order Confirmation", branding.store_name)
        }
        OrderEmailKind::Processed => {
            format!("{} - Your Order Has Been Picked Up", branding.store_name)
        }
        OrderEmailKind::Cancelled => {
            format!("{} - Your Order Has Been Cancelled", branding.store_name)
        }
    }
}

fn heading(kind: OrderEmailKind, branding: &EmailBranding) -> (String, String) {
    match kind {
        OrderEmailKind::Confirmed => (
            format!("{} - Order Confirmed!", branding.store_name),
            format!(
                "Thank you for your order. Please contact <strong>@{}</strong> on Discord to arrange pickup.",
                branding.contact_handle
            ),
        ),
        OrderEmailKind::Processed => (
            format!("{} - Order Picked Up!", branding.store_name),
            format!(
                "Your order has been successfully picked up. Thank you for supporting {}!",
                branding.store_name
            ),
        ),
        OrderEmailKind::Cancelled => (
            format!("{} - Order Cancelled", branding.store_name),
            "Your order has been cancelled. If you still want these items, please place a new order."
                .to_string(),
        ),
    }
}

/// Render the HTML body for a lifecycle notification.
pub fn render(kind: OrderEmailKind, view: &OrderEmailView, branding: &EmailBranding) -> String {
    let (title, message) = heading(kind, branding);

    let mut items = String::new();
    for line in &view.lines {
        let size_label = line
            .size
            .map_or("No size".to_string(), |s| format!("Size: {}", s.as_str().to_uppercase()));
        items.push_str(&format!(
            "<tr>\
               <td style=\"padding: 12px 0;\">\
                 <span style=\"font-weight: 500;\">{name}</span> \
                 <span style=\"float: right;\">${price}</span><br/>\
                 <span style=\"color: #6b7280; font-size: 14px;\">{size_label} | Qty: {qty}</span>\
               </td>\
             </tr>",
            name = line.product_name,
            price = line.unit_price.format_major(),
            qty = line.quantity,
        ));
    }

    let next_steps = if kind == OrderEmailKind::Confirmed {
        format!(
            "<p style=\"font-size: 14px;\">Orders are held for pickup; message \
             <strong>@{}</strong> on Discord to arrange a time. If no attempt has been made \
             to pick up your order within 2 weeks, your order will be automatically \
             cancelled.</p>",
            branding.contact_handle
        )
    } else {
        String::new()
    };

    format!(
        "<!DOCTYPE html>\
         <html>\
         <body style=\"font-family: system-ui, sans-serif; color: #333; max-width: 600px; margin: 0 auto;\">\
           <h1 style=\"font-size: 24px; text-align: center;\">{title}</h1>\
           <p style=\"text-align: center; color: #4b5563;\">{message}</p>\
           {next_steps}\
           <h2 style=\"font-size: 18px;\">Order Details</h2>\
           <p><strong>Order ID:</strong> {order_id}</p>\
           <p><strong>Name:</strong> {name}</p>\
           <p><strong>Discord:</strong> {discord}</p>\
           <p><strong>Email:</strong> {email}</p>\
           <p><strong>Date:</strong> {date}</p>\
           <h3 style=\"font-size: 18px;\">Items Ordered</h3>\
           <table width=\"100%\" style=\"border-top: 1px solid #e2e8f0; border-bottom: 1px solid #e2e8f0;\">\
             {items}\
             <tr>\
               <td style=\"padding-top: 16px; border-top: 1px solid #e2e8f0; font-weight: 500;\">\
                 Total <span style=\"float: right;\">${total}</span>\
               </td>\
             </tr>\
           </table>\
           <p style=\"font-size: 14px; margin-top: 24px;\">If you have any questions, please contact us. \
           Thank you for supporting {store_name}!</p>\
         </body>\
         </html>",
        order_id = view.order_id,
        name = view.customer_name,
        discord = view.discord,
        email = view.customer_email,
        date = view.placed_at.format("%Y-%m-%d"),
        total = view.total.format_major(),
        store_name = branding.store_name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use merchstore_core::AggregateId;

    fn branding() -> EmailBranding {
        EmailBranding {
            store_name: "Club Merch".to_string(),
            contact_handle: "merch-exec".to_string(),
        }
    }

    fn view() -> OrderEmailView {
        OrderEmailView {
            order_id: OrderId::new(AggregateId::new()),
            customer_name: "Ada Lovelace".to_string(),
            customer_email: "ada@example.edu".to_string(),
            discord: "ada#0001".to_string(),
            placed_at: Utc::now(),
            lines: vec![OrderEmailLine {
                product_name: "Club Hoodie".to_string(),
                size: Some(Size::M),
                quantity: 2,
                unit_price: Price::from_minor_units(4500),
            }],
            total: Price::from_minor_units(9000),
        }
    }

    #[test]
    fn confirmed_subject_demands_action() {
        let s = subject(OrderEmailKind::Confirmed, &branding());
        assert!(s.starts_with("[ACTION REQUIRED]"));
        assert!(s.contains("Club Merch"));
    }

    #[test]
    fn confirmed_body_includes_pickup_instructions_and_totals() {
        let html = render(OrderEmailKind::Confirmed, &view(), &branding());
        assert!(html.contains("@merch-exec"));
        assert!(html.contains("Club Hoodie"));
        assert!(html.contains("$45.00"));
        assert!(html.contains("$90.00"));
        assert!(html.contains("Size: M | Qty: 2"));
    }

    #[test]
    fn cancelled_body_omits_pickup_instructions() {
        let html = render(OrderEmailKind::Cancelled, &view(), &branding());
        assert!(html.contains("has been cancelled"));
        assert!(!html.contains("automatically"));
    }
}
