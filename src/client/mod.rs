pub mod batch_fetcher;
pub mod transport;
pub mod url_builder;

pub use batch_fetcher::{BatchFetcher, FetchObserver, RetryPolicy};
pub use transport::{Credentials, HttpTransport, Transport};
pub use url_builder::UrlBuilder;
