pub mod error;
pub mod provider;
pub mod query;
pub mod resolver;
pub mod types;
pub mod view;

pub use error::{ProviderError, ResolveError};
pub use provider::{ChainProvider, HttpProvider, HttpProviderConfig};
pub use query::{Query, QueryKind};
pub use resolver::Resolver;
pub use view::{ViewController, ViewSnapshot};
