#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! ERC-3009 payment signing for the x402 MCP payment proxy.
//!
//! Provides the [`Wallet`] trait and two implementations: [`EoaWallet`] signs
//! directly with an externally-owned account key; [`SmartAccountWallet`]
//! signs with a session key and wraps the result in an ERC-4337 smart
//! account's ownable-validator / ERC-1271 envelope.
//!
//! # Modules
//!
//! - [`wallet`] - the `Wallet` trait and its EOA / smart-account implementations
//! - [`signing`] - the ERC-3009 `transferWithAuthorization` EIP-712 signing routine
//! - [`error`] - wallet error taxonomy

pub mod error;
pub mod signing;
pub mod wallet;

pub use error::WalletError;
pub use wallet::{BoxFuture, EoaWallet, SmartAccountWallet, Wallet};
