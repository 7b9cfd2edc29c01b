pub mod instance;
pub mod time;
pub mod token;

pub use instance::InstanceDescriptor;
pub use time::{Clock, SystemClock};
pub use token::AccessToken;
