//! tokenboard: a terminal dashboard for ERC-20 `balanceOf` / `totalSupply`
//! reads over a user-curated list of contracts.

pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod infrastructure;
pub mod ui;
