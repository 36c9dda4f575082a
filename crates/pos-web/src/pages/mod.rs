//! Page Components

mod history;
mod pos;
mod pricing;

pub use history::HistoryPage;
pub use pos::PosPage;
pub use pricing::PricingPage;
