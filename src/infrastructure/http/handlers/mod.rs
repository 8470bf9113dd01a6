//! HTTP Handlers

mod ping;
mod story;
mod stream;

pub use ping::*;
pub use story::*;
pub use stream::*;
