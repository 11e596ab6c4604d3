pub mod account;
pub mod dispatch;
pub mod guest;
pub mod migrate;
pub mod parse;
pub mod serve;
pub mod session;
