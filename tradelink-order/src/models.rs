use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tradelink_core::{CoreError, CoreResult};
use tradelink_shared::Masked;
use uuid::Uuid;

/// Implements `as_str`, `Display` and `FromStr` over the wire names of a status enum
macro_rules! wire_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(CoreError::validation(format!(
                        "Unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

// ============================================================================
// Order
// ============================================================================

/// Fulfilment status of an order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

wire_names!(OrderStatus {
    Pending => "pending",
    Confirmed => "confirmed",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Allowed successors of each status
    pub fn next_states(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Confirmed, Cancelled],
            Confirmed => &[Shipped, Cancelled],
            Shipped => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.next_states().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }
}

/// Payment state as seen from the order. Written by the payment processor
/// (or a manual override) and tracked independently of `OrderStatus`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

wire_names!(OrderPaymentStatus {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingAddress {
    pub recipient: String,
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<Masked<String>>,
}

impl ShippingAddress {
    pub fn validate(&self) -> CoreResult<()> {
        let required = [
            ("recipient", &self.recipient),
            ("line1", &self.line1),
            ("city", &self.city),
            ("country", &self.country),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(CoreError::validation(format!(
                "Shipping address is missing: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

/// A validated request to place an order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub notes: Option<String>,
}

/// Largest unit price an order column can hold
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(99_999_999_999_999_u64 as u32, (99_999_999_999_999_u64 >> 32) as u32, 0, false, 2);
/// Largest total an order column can hold
pub const MAX_TOTAL: Decimal = Decimal::from_parts(9_999_999_999_999_999_u64 as u32, (9_999_999_999_999_999_u64 >> 32) as u32, 0, false, 2);

/// Price times quantity, rejected when it overflows or exceeds `MAX_TOTAL`
pub fn order_total(unit_price: Decimal, quantity: i32) -> CoreResult<Decimal> {
    unit_price
        .checked_mul(Decimal::from(quantity))
        .filter(|total| *total <= MAX_TOTAL)
        .ok_or_else(|| CoreError::validation(format!("Order total cannot exceed {}", MAX_TOTAL)))
}

impl NewOrder {
    pub fn validate(&self) -> CoreResult<()> {
        if self.quantity <= 0 {
            return Err(CoreError::validation("Quantity must be greater than zero"));
        }
        if self.unit_price <= Decimal::ZERO {
            return Err(CoreError::validation("Unit price must be greater than zero"));
        }
        if self.unit_price.normalize().scale() > 2 {
            return Err(CoreError::validation("Unit price cannot have more than two decimal places"));
        }
        if self.unit_price > MAX_UNIT_PRICE {
            return Err(CoreError::validation(format!("Unit price cannot exceed {}", MAX_UNIT_PRICE)));
        }
        order_total(self.unit_price, self.quantity)?;
        if self.payment_method.trim().is_empty() {
            return Err(CoreError::validation("Payment method is required"));
        }
        self.shipping_address.validate()
    }
}

/// One buyer's purchase of a quantity of one product from one seller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub product_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub notes: Option<String>,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(request: NewOrder, buyer_id: Uuid, seller_id: Uuid) -> CoreResult<Self> {
        let total_amount = order_total(request.unit_price, request.quantity)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            order_number: generate_order_number(now),
            product_id: request.product_id,
            buyer_id,
            seller_id,
            quantity: request.quantity,
            unit_price: request.unit_price,
            total_amount,
            shipping_address: request.shipping_address,
            payment_method: request.payment_method.trim().to_string(),
            notes: request.notes.filter(|n| !n.trim().is_empty()),
            status: OrderStatus::Pending,
            payment_status: OrderPaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move to `next`, rejecting anything outside the transition table
    pub fn transition_to(&mut self, next: OrderStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::validation(format!(
                "Invalid order status transition from {} to {}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_payment_status(&mut self, status: OrderPaymentStatus) {
        self.payment_status = status;
        self.updated_at = Utc::now();
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }
}

/// `ORD-<yyyymmddHHMMSS>-<6 random alphanumerics>`. Collisions are caught by
/// the storage unique constraint, not prevented here.
pub fn generate_order_number(at: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("ORD-{}-{}", at.format("%Y%m%d%H%M%S"), suffix)
}

/// An order joined with the catalog data shown next to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub product_name: Option<String>,
}

// ============================================================================
// Payment
// ============================================================================

/// Settlement status of a payment record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

wire_names!(PaymentStatus {
    Pending => "pending",
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
});

impl PaymentStatus {
    /// The order payment status this payment status implies, if any.
    /// In-flight payments say nothing about the order.
    pub fn implied_order_status(&self) -> Option<OrderPaymentStatus> {
        match self {
            PaymentStatus::Completed => Some(OrderPaymentStatus::Paid),
            PaymentStatus::Failed => Some(OrderPaymentStatus::Failed),
            PaymentStatus::Refunded => Some(OrderPaymentStatus::Refunded),
            PaymentStatus::Pending | PaymentStatus::Processing => None,
        }
    }

    /// Statuses from which a settlement attempt may start
    pub fn is_settleable(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Failed)
    }
}

/// A validated request to open a payment against an order
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub payment_details: Option<serde_json::Value>,
}

/// One settlement attempt against exactly one order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_details: Option<serde_json::Value>,
    pub refund_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(request: NewPayment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id: request.order_id,
            amount: request.amount,
            payment_method: request.payment_method.trim().to_string(),
            status: PaymentStatus::Pending,
            transaction_id: None,
            payment_details: request.payment_details,
            refund_reason: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the status. `processed_at` is stamped only on `Completed` and cleared
    /// otherwise; the transaction id is replaced only when one is supplied.
    pub fn apply_status(&mut self, status: PaymentStatus, transaction_id: Option<String>) {
        let now = Utc::now();
        self.status = status;
        self.processed_at = if status == PaymentStatus::Completed { Some(now) } else { None };
        if let Some(txn) = transaction_id {
            self.transaction_id = Some(txn);
        }
        self.updated_at = now;
    }
}

/// Fallback id for approved settlements that came back without one
pub fn generate_transaction_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("TXN-{}-{}", Utc::now().timestamp_millis(), suffix)
}

// ============================================================================
// Complaint
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

wire_names!(ComplaintStatus {
    Open => "open",
    InProgress => "in_progress",
    Resolved => "resolved",
    Closed => "closed",
});

impl ComplaintStatus {
    pub fn next_states(&self) -> &'static [ComplaintStatus] {
        use ComplaintStatus::*;
        match self {
            Open => &[InProgress, Resolved, Closed],
            InProgress => &[Resolved, Closed],
            Resolved => &[InProgress, Closed],
            Closed => &[],
        }
    }

    pub fn can_transition_to(&self, next: ComplaintStatus) -> bool {
        self.next_states().contains(&next)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ComplaintCategory {
    #[serde(rename = "Product Quality")]
    ProductQuality,
    #[serde(rename = "Shipping Delay")]
    ShippingDelay,
    #[serde(rename = "Damaged Product")]
    DamagedProduct,
    #[serde(rename = "Wrong Product")]
    WrongProduct,
    #[serde(rename = "Payment Issue")]
    PaymentIssue,
    Other,
}

wire_names!(ComplaintCategory {
    ProductQuality => "Product Quality",
    ShippingDelay => "Shipping Delay",
    DamagedProduct => "Damaged Product",
    WrongProduct => "Wrong Product",
    PaymentIssue => "Payment Issue",
    Other => "Other",
});

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ComplaintPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

wire_names!(ComplaintPriority {
    Low => "Low",
    Medium => "Medium",
    High => "High",
    Critical => "Critical",
});

#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub order_id: Uuid,
    pub subject: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: Option<ComplaintPriority>,
}

impl NewComplaint {
    pub fn validate(&self) -> CoreResult<()> {
        if self.subject.trim().is_empty() {
            return Err(CoreError::validation("Subject is required"));
        }
        if self.description.trim().is_empty() {
            return Err(CoreError::validation("Description is required"));
        }
        Ok(())
    }
}

/// Fields a seller or admin may change on a complaint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplaintPatch {
    pub status: Option<ComplaintStatus>,
    pub resolution: Option<String>,
    pub priority: Option<ComplaintPriority>,
}

impl ComplaintPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.resolution.is_none() && self.priority.is_none()
    }
}

/// A dispute raised by the buyer of an order against its seller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Complaint {
    pub id: Uuid,
    pub order_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub subject: String,
    pub description: String,
    pub category: ComplaintCategory,
    pub priority: ComplaintPriority,
    pub status: ComplaintStatus,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Complaint {
    /// Parties are copied from the order and never re-derived
    pub fn new(request: NewComplaint, order: &Order) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id: order.id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            subject: request.subject.trim().to_string(),
            description: request.description.trim().to_string(),
            category: request.category,
            priority: request.priority.unwrap_or_default(),
            status: ComplaintStatus::Open,
            resolution: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a patch, enforcing the status table and the resolution rule
    pub fn apply(&mut self, patch: ComplaintPatch) -> CoreResult<()> {
        if self.status == ComplaintStatus::Closed {
            return Err(CoreError::validation("Closed complaints cannot be changed"));
        }

        let resolution = match patch.resolution {
            Some(text) if text.trim().is_empty() => None,
            Some(text) => Some(text.trim().to_string()),
            None => self.resolution.clone(),
        };

        let next = patch.status.unwrap_or(self.status);
        if next != self.status && !self.status.can_transition_to(next) {
            return Err(CoreError::validation(format!(
                "Invalid complaint status transition from {} to {}",
                self.status, next
            )));
        }
        if next == ComplaintStatus::Resolved && resolution.is_none() {
            return Err(CoreError::validation(
                "A resolution is required before a complaint can be resolved",
            ));
        }

        self.status = next;
        self.resolution = resolution;
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
