//! Compatibility between different async runtimes for tunsocks
//!
//! We try to isolate these dependencies in a single place so that
//! we depend only on a minimal set of required features that our
//! runtime needs to give us.
//!
//! A tunsocks [`Runtime`] only needs to do two things: spawn tasks,
//! and make (or accept) TCP connections.  Everything that talks to the
//! network goes through the [`TcpProvider`] trait, so that tests can
//! swap in a simulated network.
//!
//! # Features
//!
//! * `tokio` (default): build with tokio support.
//! * `async-std`: build with async-std support.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![warn(noop_method_call)]
#![deny(unreachable_pub)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::cargo_common_metadata)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::cognitive_complexity)]
#![deny(clippy::debug_assert_with_mut_call)]
#![deny(clippy::exhaustive_enums)]
#![deny(clippy::exhaustive_structs)]
#![deny(clippy::expl_impl_clone_on_copy)]
#![deny(clippy::fallible_impl_from)]
#![deny(clippy::large_stack_arrays)]
#![warn(clippy::manual_ok_or)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_pass_by_value)]
#![warn(clippy::option_option)]
#![warn(clippy::rc_buffer)]
#![deny(clippy::ref_option_ref)]
#![warn(clippy::trait_duplication_in_bounds)]
#![warn(clippy::unseparated_literal_suffix)]

#[cfg(not(any(feature = "async-std", feature = "tokio")))]
compile_error!("Sorry: At least one of the tokio and async-std features must be specified.");

pub(crate) mod impls;
mod traits;

pub use traits::{Runtime, TcpListener, TcpProvider, Transport};

/// Entry points for use with Tokio runtimes.
#[cfg(feature = "tokio")]
pub mod tokio {
    pub use crate::impls::tokio::net::{TcpListener as TokioTcpListener, TcpStream as TokioTcpStream};
    pub use crate::impls::tokio::{create_runtime, TokioRuntimeHandle};

    use std::io::{Error as IoError, ErrorKind};

    /// Try to return an instance of the currently running tokio [`Runtime`](crate::Runtime).
    ///
    /// # Usage note
    ///
    /// This function is for users who want to wrap some existing Tokio
    /// runtime as a [`Runtime`](crate::Runtime).  Library code that
    /// wants to support multiple runtimes should take a runtime as an
    /// argument instead.
    pub fn current_runtime() -> std::io::Result<TokioRuntimeHandle> {
        let handle = tokio_crate::runtime::Handle::try_current()
            .map_err(|e| IoError::new(ErrorKind::Other, e))?;
        Ok(TokioRuntimeHandle::new(handle))
    }
}

/// Entry points for use with async-std runtimes.
#[cfg(feature = "async-std")]
pub mod async_std {
    pub use crate::impls::async_std::{block_on, create_runtime};
}

#[cfg(all(test, feature = "tokio"))]
mod test {
    use super::*;
    use futures::io::{AsyncReadExt, AsyncWriteExt};
    use std::io::Result as IoResult;

    #[test]
    fn no_current_runtime() {
        assert!(tokio::current_runtime().is_err());
    }

    #[test]
    fn tokio_loopback() -> IoResult<()> {
        let rt = tokio::create_runtime()?;
        let handle = tokio::TokioRuntimeHandle::new(rt.handle().clone());
        rt.block_on(async {
            let lis = handle.listen(&"127.0.0.1:0".parse().unwrap()).await?;
            let addr = lis.local_addr()?;
            let (r1, r2): (IoResult<()>, IoResult<()>) = futures::join!(
                async {
                    let mut conn = handle.connect(&addr).await?;
                    assert_eq!(conn.peer_addr()?, addr);
                    conn.write_all(b"loopback").await?;
                    conn.close().await?;
                    Ok(())
                },
                async {
                    let (mut conn, _) = lis.accept().await?;
                    let mut inp = Vec::new();
                    conn.read_to_end(&mut inp).await?;
                    assert_eq!(&inp[..], b"loopback");
                    Ok(())
                }
            );
            r1?;
            r2
        })
    }
}
