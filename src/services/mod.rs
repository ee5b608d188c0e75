//! External collaborators: price data in, alerts out.

pub mod market_data;
pub mod notifications;
pub mod yahoo;

pub use market_data::{FetchError, MarketDataProvider};
pub use notifications::{Delivery, DiscordNotifier, Notifier, NotifyError, RetryingNotifier};
pub use yahoo::YahooMarketDataProvider;
