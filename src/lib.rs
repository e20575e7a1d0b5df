//! A client library for driving the Mercurial (`hg`) command server.
//!
//! The command server is a long-lived `hg` subprocess that accepts framed
//! requests on stdin and emits framed responses on stdout, avoiding the
//! per-invocation startup cost of spawning a fresh `hg` process for every
//! operation. [`Session::open`](session::Session::open) spawns the server
//! for a repository and performs its handshake; the methods on
//! [`Session`](session::Session) (see the [`commands`] module) then drive
//! one command at a time over that pipe.
//!
//! Repository creation (`init`/`clone`) does not go through the command
//! server and is exposed separately as [`oneshot::init`]/[`oneshot::clone`].

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications,
    variant_size_differences
)]

pub mod args;
pub mod commands;
pub mod demux;
pub mod encoding;
pub mod error;
pub mod frame;
pub mod oneshot;
pub mod parsers;
pub mod session;
pub mod types;

pub use commands::*;
pub use error::{HgError, Result};
pub use session::{Session, SessionOptions};
