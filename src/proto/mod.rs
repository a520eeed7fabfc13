
pub use self::cast_channel::*;

mod cast_channel;
