//! BillPay Payments - bill-pay core
//!
//! - [`UserService`] - registration and login
//! - [`BillService`] - bills and overdue tracking
//! - [`PaymentMethodService`] - cards, bank accounts and bitcoin addresses
//! - [`PaymentService`] - AML-checked bill payments
//! - [`dashboard_metrics`] - per-user dashboard figures

pub mod bill;
pub mod dashboard;
pub mod error;
pub mod method;
pub mod payment;
pub mod user;

pub use bill::{Bill, BillService, BillStatus, BillType, BillUpdate, NewBill};
pub use dashboard::{dashboard_metrics, DashboardMetrics};
pub use error::{PaymentError, PaymentResult};
pub use method::{MethodType, NewPaymentMethod, PaymentMethod, PaymentMethodService};
pub use payment::{PaymentRequest, PaymentService, Transaction};
pub use user::{NewUser, User, UserProfile, UserService};
