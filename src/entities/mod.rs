pub mod prelude;

pub mod assembly;
pub mod attendance;
pub mod owner;
pub mod proxy;
pub mod question;
pub mod question_option;
pub mod unit;
pub mod vote;
