pub mod card;
pub mod catalog;
pub mod room;
pub mod session;
pub mod util;
