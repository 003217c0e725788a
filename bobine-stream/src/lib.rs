//! Streaming delivery core: playback decision, encoder sessions, subtitle
//! pipeline and the HTTP response paths that serve media bytes.

pub mod compat;
pub mod error;
pub mod hls;
pub mod http;
pub mod playback;
pub mod probe;
pub mod quality;
pub mod session;
pub mod subtitle;

pub use error::{Result, StreamError};
pub use playback::{
    decide_playback, AudioDisposition, OutputContainer, PlaybackMode, PlaybackPlan,
    PlaybackRequest, VideoDisposition,
};
pub use quality::{QualityLevel, QualityProfile};
pub use session::{EncoderSession, SessionKey, SessionManager};
