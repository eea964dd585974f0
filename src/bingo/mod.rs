//! Card engine: extraction, constraint and mark tracking, the share-token
//! codec, and the glue that keeps cards in step with a shared room.

pub mod card;
pub mod codec;
pub mod extract;
pub mod rng;
pub mod room;
pub mod room_doc;
pub mod session;
pub mod sync;
