//! Test doubles for the tunsocks runtime traits.
//!
//! [`io::stream_pair`] makes two connected in-memory streams, and
//! [`net::MockNetwork`] wires a set of simulated hosts together so that
//! a SOCKS5 client, a scripted proxy, and a local application can all
//! talk without touching a real socket.  [`MockNetRuntime`] pairs one
//! of those hosts with an executor to get a full
//! [`Runtime`](tunsocks_rtcompat::Runtime).

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(noop_method_call)]
#![deny(unreachable_pub)]
#![deny(clippy::await_holding_lock)]
#![warn(clippy::clone_on_ref_ptr)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]

pub mod io;
pub mod net;

mod net_runtime;
pub use net_runtime::MockNetRuntime;
