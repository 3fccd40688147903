pub mod feed;
pub mod tcmb;
pub mod util;

pub use feed::parse_bulletin;
pub use tcmb::{FeedSource, TcmbClient};
pub use util::RetryPolicy;
