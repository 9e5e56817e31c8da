pub mod call;
pub mod channel;
pub mod framing;
pub mod shutdown;

pub use call::{CallReader, CallWriter};
pub use channel::Channel;
pub use framing::FrameCodec;
pub use shutdown::ShutdownCoordinator;
