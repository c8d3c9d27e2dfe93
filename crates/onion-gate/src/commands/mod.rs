pub mod classify;
pub mod run;
pub mod torrc;
pub mod validate;
