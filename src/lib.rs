// Library surface for the CLI and integration tests.
pub mod app_dirs;
pub mod config;
pub mod demo_page;
pub mod dom;
pub mod editing;
pub mod emitter;
pub mod error;
pub mod keys;
pub mod logging;
pub mod messages;
pub mod pacing;
pub mod picker;
pub mod request;
pub mod router;
pub mod runtime;
pub mod session;
pub mod shortcuts;
pub mod snippets;
pub mod target;
pub mod util;

pub use error::TypingError;
pub use request::TypingRequest;
pub use router::MessageRouter;
pub use session::TypingController;
