//! Client-side state containers. Each one is cheap to clone and hands out
//! `watch` receivers so views can re-render on change.

pub mod session;
pub mod todo;

pub use session::SessionStore;
pub use todo::TodoStore;
