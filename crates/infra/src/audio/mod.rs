//! Real-time plumbing around the effects engine
//!
//! - `lockfree_buffer`: bounded frame FIFO between a producer and the callback
//! - `stream`: fixed-size chunking and the callback renderer
//! - `session`: engine on a dedicated audio thread fed over channels
//! - `cpal_backend`: default output device playback (`device` feature)

pub mod lockfree_buffer;
pub mod session;
pub mod stream;

#[cfg(feature = "device")]
pub mod cpal_backend;

#[cfg(feature = "device")]
pub use cpal_backend::*;
pub use lockfree_buffer::*;
pub use session::*;
pub use stream::*;
