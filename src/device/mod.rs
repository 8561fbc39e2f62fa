pub mod command;
pub mod light;
pub mod rest;
pub mod status;
