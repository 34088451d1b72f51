mod dto;
mod error;
mod routes;
pub mod state;

use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::str::FromStr as _;
use std::time::Duration;

use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use snafu::{ResultExt as _, Snafu};
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::{AppState, InstanceRegistry, SharedState};

pub struct Opts {
    pub listen: String,
    pub cors_origin: Option<String>,
    pub reuseport: bool,
}

impl Opts {
    pub fn new(listen: String, cors_origin: Option<String>, reuseport: bool) -> Self {
        Self { listen, cors_origin, reuseport }
    }
}

pub struct Server {
    listener: TcpListener,
    state: SharedState,
    opts: Opts,
}

#[derive(Debug, Snafu)]
pub enum WebUiServerError {
    #[snafu(transparent)]
    Io { source: io::Error },
    ListenAddr { source: AddrParseError },
    CorsOrigin { source: axum::http::header::InvalidHeaderValue },
}

pub type ServerResult<T> = std::result::Result<T, WebUiServerError>;

impl Server {
    pub async fn init(opts: Opts, state: SharedState) -> ServerResult<Server> {
        let listener = Self::get_listener(&opts).await?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(Self { listener, state, opts })
    }

    pub async fn get_listener(opts: &Opts) -> ServerResult<TcpListener> {
        let addr = SocketAddr::from_str(&opts.listen).context(ListenAddrSnafu)?;
        let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
        if opts.reuseport {
            #[cfg(unix)]
            socket.set_reuseport(true)?;
        }
        socket.set_nodelay(true)?;
        socket.bind(addr)?;
        Ok(socket.listen(1024)?)
    }

    pub async fn run(self) -> ServerResult<()> {
        let router = routes::router(self.state.clone()).layer(TraceLayer::new_for_http());

        info!("Starting server");
        let listen = self.addr()?;
        axum::serve(
            self.listener,
            router.layer(cors_layer(&self.opts, listen)?).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }

    pub fn addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

fn cors_layer(opts: &Opts, listen: SocketAddr) -> ServerResult<CorsLayer> {
    let origin: HeaderValue = opts.cors_origin.clone().unwrap_or_else(|| format!("http://{listen}")).parse().context(CorsOriginSnafu)?;
    Ok(CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400))
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS, Method::HEAD, Method::PATCH]))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate()).expect("failed to install signal handler").recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
