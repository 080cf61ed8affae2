//! `jasminctl`: the admin CLI client for §6.1's Unix-domain-socket
//! JSON-RPC surface. [`client::call`] is the one-request-one-reply
//! transport; [`commands`] wraps each operation for the binary's
//! subcommands.

pub mod client;
pub mod commands;
