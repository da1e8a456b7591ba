pub mod chat;
pub mod matches;
pub mod pool;
