mod state;
mod session;

pub use state::{Author, Next, SharedState, Turn};
pub use session::{InMemorySessionStore, SessionStore};
