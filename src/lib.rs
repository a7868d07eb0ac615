pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod decode;
pub mod output;
pub mod payload;
pub mod resources;
pub mod search;
pub mod table;

#[cfg(test)]
mod tests;
