pub mod audit;
pub mod flag;
pub mod identity;
pub mod mailbox;
pub mod message;
pub mod token;
