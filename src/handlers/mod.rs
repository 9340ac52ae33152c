pub mod access;
pub mod commands;
pub mod responses;
