pub mod controller;
pub mod display;
pub mod errors;
pub mod recorder;
pub mod types;
pub mod window;

pub use controller::{ControlEvent, ControllerSettings, Flow, SessionController};
pub use display::DisplayState;
pub use errors::SessionError;
