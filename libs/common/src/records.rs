//! Request payloads posted to the expense and payment endpoints
//!
//! Both records are flat value objects built fresh for every request. Field
//! names match the JSON the target service expects.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current wall-clock time as epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Expense record posted to `/api/expense`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub expense_id: String,
    pub user_id: String,
    pub category: String,
    pub amount: f64,
    /// ISO 4217 code, e.g. "AUD"
    pub currency: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub description: String,
    pub receipt: String,
}

/// Payment method accepted by the payment endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    BankTransfer,
    Paypal,
    Cash,
}

/// Payment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

/// Payment record posted to `/api/payment`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub transaction_id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub status: PaymentStatus,
}

/// Every expense field except the timestamp, which is taken at send time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpenseTemplate {
    pub expense_id: String,
    pub user_id: String,
    pub category: String,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub receipt: String,
}

impl Default for ExpenseTemplate {
    fn default() -> Self {
        Self {
            expense_id: "test".to_string(),
            user_id: "10010".to_string(),
            category: "kafkaSync".to_string(),
            amount: 12.5,
            currency: "AUD".to_string(),
            description: "Any".to_string(),
            receipt: "newTest".to_string(),
        }
    }
}

impl ExpenseTemplate {
    /// Build an expense stamped with the current time
    pub fn stamp(&self) -> Expense {
        self.stamp_at(now_millis())
    }

    /// Build an expense with an explicit timestamp
    pub fn stamp_at(&self, timestamp: i64) -> Expense {
        Expense {
            expense_id: self.expense_id.clone(),
            user_id: self.user_id.clone(),
            category: self.category.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            timestamp,
            description: self.description.clone(),
            receipt: self.receipt.clone(),
        }
    }
}

/// Every payment field except the timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentTemplate {
    pub transaction_id: String,
    pub user_id: String,
    pub amount: f64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
}

impl Default for PaymentTemplate {
    fn default() -> Self {
        Self {
            transaction_id: "test".to_string(),
            user_id: "10010".to_string(),
            amount: 12.5,
            currency: "AUD".to_string(),
            payment_method: PaymentMethod::CreditCard,
            status: PaymentStatus::Completed,
        }
    }
}

impl PaymentTemplate {
    /// Build a payment stamped with the current time
    pub fn stamp(&self) -> Payment {
        self.stamp_at(now_millis())
    }

    pub fn stamp_at(&self, timestamp: i64) -> Payment {
        Payment {
            transaction_id: self.transaction_id.clone(),
            user_id: self.user_id.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            payment_method: self.payment_method,
            timestamp,
            status: self.status,
        }
    }
}
