//! Session-scoped storage: versioned page maps, buffered responses and the
//! session table.

pub mod buffer;
pub mod page_map;
pub mod session;

pub use buffer::{BufferedResponse, BufferedResponseStore};
pub use page_map::{PageMap, PageStore};
pub use session::{Session, SessionAccess, SessionHandle, SessionStore, lock_session};
