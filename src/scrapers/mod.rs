//! Collaborators that talk to the outside world: the browser and HTTP.

pub mod browser;
mod http_client;
pub mod session;

pub use browser::ChromiumLauncher;
pub use http_client::{ByteStream, HttpClient, MediaFetcher, StreamResponse};
pub use session::{PageSession, ResponseLog, SessionLauncher};
