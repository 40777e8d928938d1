pub mod app;
pub mod cli;
pub mod config;
pub mod output;
pub mod report;
pub mod service;
pub mod session;
pub mod view;

#[cfg(test)]
mod tests;
