//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, reserved endpoints)
//!     → dispatch.rs (select backend, account the request)
//!     → forward.rs (rewrite onto the backend, send, stream back)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod forward;
pub mod request;
pub mod server;

pub use dispatch::{DispatchError, Dispatcher};
pub use forward::{ForwardError, Forwarder, HyperForwarder};
pub use request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
