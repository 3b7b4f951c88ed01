pub mod dump;
pub mod run;
pub mod types;
