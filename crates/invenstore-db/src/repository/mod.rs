//! # Repository Module
//!
//! Tenant-scoped repositories for InvenStore.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  axum handler (identity.tenant_id from the auth layer)                 │
//! │       │                                                                 │
//! │       │  db.sales().process_sale(&tenant_id, &user_id, &request)       │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── process_sale(tenant, user, request)   one transaction             │
//! │  ├── list(tenant, filter)                                              │
//! │  ├── get_detail(tenant, id)                                            │
//! │  └── cancel(tenant, id)                    one transaction             │
//! │       │                                                                 │
//! │       │  SQL (every statement filters on tenant_id)                    │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`TenantRepository`] - Stores, subscriptions, platform metrics
//! - [`UserRepository`] - Users and credentials
//! - [`InvitationRepository`] - Invitation codes and store registration
//! - [`CategoryRepository`] - Product categories
//! - [`ProductRepository`] - Product catalog
//! - [`CustomerRepository`] - Customers, balances, payments
//! - [`SaleRepository`] - Sale processor
//! - [`ReturnRepository`] - Return processor
//! - [`CashRegisterRepository`] - Daily summaries and closings
//! - [`ReportRepository`] - Read-only aggregations and exports
//! - [`PromotionRepository`] - Discounts

pub mod cash_register;
pub mod category;
pub mod customer;
pub mod invitation;
pub mod product;
pub mod promotion;
pub mod report;
pub mod sale;
pub mod sale_return;
pub mod tenant;
pub mod user;

pub use cash_register::{
    CashRegisterRepository, ClosingHistory, ClosingWithUser, DailySummary, HistoryFilter,
};
pub use category::{CategoryRepository, CategoryWithCount, NewCategory, UpdateCategory};
pub use customer::{CustomerRepository, NewCustomer, PaymentWithUser, UpdateCustomer};
pub use invitation::{
    InvitationFilter, InvitationPage, InvitationRepository, NewInvitation, StoreRegistration,
};
pub use product::{NewProduct, ProductRepository, UpdateProduct};
pub use promotion::{NewPromotion, PromotionRepository};
pub use report::{
    DailySales, DashboardStats, ExportSaleRow, ProfitReport, ReportRepository, TopDebtor,
    TopProduct,
};
pub use sale::{
    NewSale, NewSaleItem, SaleDetail, SaleFilter, SaleItemDetail, SaleReceipt, SaleRepository,
    SaleSummary,
};
pub use sale_return::{
    NewReturn, NewReturnItem, ReturnDetail, ReturnFilter, ReturnItemDetail, ReturnRepository,
    ReturnSummary, ReturnableItem, ReturnableSale, ReturnableSaleFilter,
};
pub use tenant::{
    PlatformMetrics, RecentSale, StoreActivity, StoreDetail, StoreOverview, TenantRepository,
    RECENT_SALES_LIMIT,
};
pub use user::{NewUser, UpdateUser, UserCredentials, UserRepository};
