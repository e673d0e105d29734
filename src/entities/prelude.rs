#![allow(unused_imports)]

pub use super::assembly::Entity as Assembly;
pub use super::attendance::Entity as Attendance;
pub use super::owner::Entity as Owner;
pub use super::proxy::Entity as Proxy;
pub use super::question::Entity as Question;
pub use super::question_option::Entity as QuestionOption;
pub use super::unit::Entity as Unit;
pub use super::vote::Entity as Vote;
