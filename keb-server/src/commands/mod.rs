pub mod broker;
pub mod worker;
