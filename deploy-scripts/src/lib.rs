//! Scripts for deploying and upgrading the UKH contracts behind upgradeable proxies.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod calldata;
pub mod cli;
mod commands;
pub mod config;
pub mod constants;
pub mod deployer;
pub mod errors;
pub mod manifest;
pub mod migrations;
mod solidity;
pub mod utils;
