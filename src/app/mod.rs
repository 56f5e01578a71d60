pub mod controller;
pub mod dto;
pub mod playback;
pub mod projection;
pub mod session;

pub use controller::{TransitionOutcome, ViewController};
pub use projection::RenderFrame;
pub use session::GraphSession;
