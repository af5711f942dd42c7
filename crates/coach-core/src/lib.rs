pub mod actions;
pub mod config;
pub mod directive;
pub mod form;
pub mod reducer;
pub mod state;

pub use actions::*;
pub use config::*;
pub use directive::*;
pub use form::*;
pub use reducer::*;
pub use state::*;
