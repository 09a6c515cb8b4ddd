//! # pictor-browser
//!
//! The remote surface: everything that touches the externally-controlled web
//! application. The `RemoteSurface` trait is the only way the engine reaches
//! the browser; `ChromeSurface` implements it over Chrome DevTools Protocol,
//! and `MockSurface` implements it for tests. Session handling lives here
//! because the session file is consumed as browser cookies.

mod browser;
mod screenshot;
mod session;
mod surface;

pub use browser::ChromeSurface;
pub use session::SessionHandle;
pub use surface::{AttemptScript, ElementState, MockSurface, RemoteSurface};
