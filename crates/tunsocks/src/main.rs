//! Forward local TCP connections to a fixed destination through a
//! SOCKS5 proxy.
//!
//! `tunsocks` listens on a local address.  For every connection it
//! accepts, it asks a SOCKS5 proxy to connect to the configured target,
//! and then relays bytes between the two until both sides are done.
//!
//! Configuration comes from a built-in default, then any files given
//! with `-f`, then any `-c key=value` options, in that order.

#![warn(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::await_holding_lock)]
#![warn(clippy::needless_borrow)]

mod cmdline;
mod forward;

use cmdline::CmdLine;
use std::convert::TryFrom;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use tunsocks_client::{AuthConfig, AuthMethod, ConnectTarget, Credentials, Socks5Connector};
use tunsocks_rtcompat::Runtime;

use anyhow::{anyhow, Context, Result};
use argh::FromArgs;
use futures::future::FutureExt;
use serde::Deserialize;
use tracing::{info, Level};

#[derive(FromArgs, Debug, Clone)]
/// Forward local TCP connections to a fixed destination through a
/// SOCKS5 proxy.
struct Args {
    /// read configuration from this file (may be repeated)
    #[argh(option, short = 'f')]
    rc: Vec<String>,
    /// override a configuration option (uses toml syntax)
    #[argh(option, short = 'c')]
    cfg: Vec<String>,
}

/// Default options to use for our configuration.
const TUNSOCKS_DEFAULTS: &str = include_str!("./tunsocks_defaults.toml");

/// Structure to hold our configuration options, whether from a
/// configuration file or the command line.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct TunsocksConfig {
    /// Whether to log at trace level.
    trace: bool,
    /// How to reach the proxy.
    proxy: ProxyConfig,
    /// What to forward, and where.
    forward: ForwardConfig,
}

/// Configuration for reaching the SOCKS5 proxy.
#[derive(Deserialize, Clone)]
#[serde(deny_unknown_fields)]
struct ProxyConfig {
    /// Address of the proxy.
    address: SocketAddr,
    /// Whether to offer anonymous access.
    anonymous: bool,
    /// Username to offer, if any.
    username: Option<String>,
    /// Password to go with `username`.
    password: Option<String>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("address", &self.address)
            .field("anonymous", &self.anonymous)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ProxyConfig {
    /// Return the authentication methods to propose, most preferred first.
    fn auth(&self) -> Result<AuthConfig> {
        let mut methods = Vec::new();
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => methods.push(AuthMethod::UsernamePassword(
                Credentials::new(user.as_str(), pass.as_str())
                    .context("Unusable proxy credentials")?,
            )),
            (None, None) => {}
            _ => {
                return Err(anyhow!(
                    "proxy.username and proxy.password must be given together"
                ))
            }
        }
        if self.anonymous {
            methods.push(AuthMethod::Anonymous);
        }
        AuthConfig::new(methods).context("No way to authenticate to the proxy")
    }
}

/// Configuration for what we forward.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct ForwardConfig {
    /// Local address to accept connections on.
    listen: SocketAddr,
    /// Host that the proxy should connect to.
    target_host: Option<String>,
    /// Port that the proxy should connect to.
    ///
    /// Read as a wide integer so that out-of-range values are caught
    /// here instead of being narrowed on the way in.
    target_port: i64,
}

impl ForwardConfig {
    /// Return the target to forward to, if one is configured.
    fn target(&self) -> Result<Option<ConnectTarget>> {
        let port = u16::try_from(self.target_port).with_context(|| {
            format!("forward.target_port {} is not a TCP port", self.target_port)
        })?;
        match &self.target_host {
            Some(host) => Ok(Some(
                ConnectTarget::new(host, port)
                    .with_context(|| format!("Bad forward.target_host {:?}", host))?,
            )),
            None => Ok(None),
        }
    }
}

/// Build our configuration from the defaults, the files in `files`, and
/// the toml lines in `opts`.
fn load_config<P, S>(files: &[P], opts: &[S]) -> Result<TunsocksConfig>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let mut cfg = config::Config::new();
    cfg.merge(config::File::from_str(
        TUNSOCKS_DEFAULTS,
        config::FileFormat::Toml,
    ))?;
    for f in files {
        let path = f.as_ref();
        cfg.merge(config::File::from(path).format(config::FileFormat::Toml))
            .with_context(|| format!("Couldn't load configuration from {:?}", path))?;
    }
    let mut cmdline = CmdLine::new();
    for opt in opts {
        cmdline.push_toml_line(opt.as_ref());
    }
    cfg.merge(cmdline)?;

    Ok(cfg.try_into()?)
}

/// Wait until we're told to shut down with ctrl-c.
async fn wait_for_ctrl_c() -> Result<()> {
    #[cfg(feature = "tokio")]
    {
        tokio_crate::signal::ctrl_c()
            .await
            .context("Couldn't listen for ctrl-c")?;
    }
    #[cfg(all(feature = "async-std", not(feature = "tokio")))]
    {
        async_ctrlc::CtrlC::new()
            .context("Couldn't listen for ctrl-c")?
            .await;
    }
    Ok(())
}

/// Run the forwarder described by `config` on `runtime`, until ctrl-c.
async fn run<R: Runtime>(runtime: R, config: TunsocksConfig, target: ConnectTarget) -> Result<()> {
    let connector = Socks5Connector::new(
        runtime.clone(),
        config.proxy.address,
        config.proxy.auth()?,
    );
    let listen = config.forward.listen;
    let listener = runtime
        .listen(&listen)
        .await
        .with_context(|| format!("Can't listen on {}", listen))?;

    let forwarder = forward::run_forwarder(runtime, connector, listener, target).fuse();
    let ctrl_c = wait_for_ctrl_c().fuse();
    futures::pin_mut!(forwarder, ctrl_c);
    futures::select! {
        r = forwarder => r,
        r = ctrl_c => {
            info!("Received a ctrl-c; exiting.");
            r
        }
    }
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    let config = load_config(&args.rc, &args.cfg)?;

    let level = if config.trace {
        Level::TRACE
    } else {
        Level::DEBUG
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    // Fail early on a bad proxy configuration.
    let _ = config.proxy.auth()?;
    let target = match config.forward.target()? {
        Some(t) => t,
        None => {
            info!("Nothing to do: no forward.target_host configured.");
            return Ok(());
        }
    };

    #[cfg(feature = "tokio")]
    {
        let rt = tunsocks_rtcompat::tokio::create_runtime()?;
        let runtime = tunsocks_rtcompat::tokio::TokioRuntimeHandle::new(rt.handle().clone());
        rt.block_on(run(runtime, config, target))
    }
    #[cfg(all(feature = "async-std", not(feature = "tokio")))]
    {
        let runtime = tunsocks_rtcompat::async_std::create_runtime();
        tunsocks_rtcompat::async_std::block_on(run(runtime, config, target))
    }
}
