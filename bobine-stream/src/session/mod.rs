pub mod args;
pub mod hwaccel;
pub mod manager;
pub mod process;

pub use hwaccel::{EncoderProbe, FfmpegEncoderProbe, HardwareEncoder, HardwareEncoderCache, HwAccelKind, TargetCodec};
pub use manager::{EncoderSession, SessionKey, SessionManager};
pub use process::{ScopedChild, StderrTail};
