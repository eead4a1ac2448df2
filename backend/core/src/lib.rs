pub mod cart;
pub mod credential;
pub mod error;
pub mod resource;
pub mod status;
pub mod traits;

pub use cart::{Cart, CartLine};
pub use credential::Credential;
pub use error::{BackendError, FetchError, RefreshCallbackError};
pub use resource::{matches_filter, record_id, Filter, Record, Resource, ORDER_CLOSED, ORDER_OPEN};
pub use status::{DisplayStatus, OpenItem, StatusLabel, StatusSnapshot};
pub use traits::{Backend, LocalOpenItems, RefreshAction, StatusSource};
