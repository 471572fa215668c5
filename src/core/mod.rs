pub mod config;
pub mod state;
pub mod turn;
pub mod view;
