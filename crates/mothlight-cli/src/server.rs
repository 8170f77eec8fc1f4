//! The decoy HTTP server.
//!
//! A small hyper/http1 front end over two stateless collaborators (page
//! templating, client classification) and one stateful one (the telemetry
//! sink). Request handling never blocks on telemetry I/O: `record` is a
//! lock-and-increment, and all filesystem work happens on the sink's
//! background flusher.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HOST, SERVER, USER_AGENT};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use mothlight_decoy as decoy;
use mothlight_telemetry::{TelemetryConfig, TelemetrySink};

const DEFAULT_LISTEN: &str = "0.0.0.0:8070";
const DEFAULT_LEDGER_ROOT: &str = "./logs/mothlight";

#[derive(Debug, Clone)]
struct ServerConfig {
    listen: SocketAddr,
    /// Authority the generated decoy links point back into.
    domain: String,
    ready_file: Option<PathBuf>,
}

struct ServerState {
    config: ServerConfig,
    telemetry: Arc<TelemetrySink>,
}

/// CLI option, then environment, then built-in default. Empty values fall
/// through.
fn resolve_setting(arg: Option<&str>, env_key: &str, default: &str) -> String {
    if let Some(value) = arg {
        let value = value.trim();
        if !value.is_empty() {
            return value.to_string();
        }
    }
    if let Ok(value) = std::env::var(env_key) {
        let value = value.trim();
        if !value.is_empty() {
            return value.to_string();
        }
    }
    default.to_string()
}

/// Ledger root resolution differs from the other settings: an explicitly
/// empty value means "no persistence", not "use the default".
fn resolve_ledger_root(arg: Option<&str>) -> Option<PathBuf> {
    let raw = match arg {
        Some(value) => value.to_string(),
        None => std::env::var("MOTHLIGHT_LEDGER_ROOT")
            .unwrap_or_else(|_| DEFAULT_LEDGER_ROOT.to_string()),
    };
    let raw = raw.trim();
    if raw.is_empty() {
        None
    } else {
        Some(PathBuf::from(raw))
    }
}

pub(crate) fn run(args: crate::ServeArgs) -> Result<()> {
    let listen_raw = resolve_setting(args.listen.as_deref(), "MOTHLIGHT_LISTEN", DEFAULT_LISTEN);
    let listen: SocketAddr = listen_raw
        .parse()
        .map_err(|e| anyhow!("invalid listen address `{listen_raw}`: {e}"))?;
    let domain = resolve_setting(args.domain.as_deref(), "MOTHLIGHT_DOMAIN", &listen_raw);

    let telemetry = Arc::new(TelemetrySink::new(TelemetryConfig {
        ledger_root: resolve_ledger_root(args.ledger_root.as_deref()),
        flush_interval: Duration::from_secs(args.flush_interval_secs.max(1)),
    }));

    let config = ServerConfig {
        listen,
        domain,
        ready_file: args.ready_file,
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;

    rt.block_on(async move { serve_async(config, telemetry).await })
}

async fn serve_async(config: ServerConfig, telemetry: Arc<TelemetrySink>) -> Result<()> {
    let flusher = telemetry.spawn_flusher();
    match telemetry.config().ledger_root.as_ref() {
        Some(root) => eprintln!(
            "serve: persisting telemetry under {} every {}s",
            root.display(),
            telemetry.config().flush_interval.as_secs()
        ),
        None => eprintln!("serve: no ledger root configured; telemetry will not be persisted"),
    }

    let listener = TcpListener::bind(config.listen)
        .await
        .map_err(|e| anyhow!("serve: failed to bind {}: {e}", config.listen))?;
    let bound = listener
        .local_addr()
        .map_err(|e| anyhow!("serve: failed to read bound addr: {e}"))?;

    eprintln!("serve: listening on http://{bound}");
    if let Some(path) = config.ready_file.as_ref() {
        let payload = serde_json::json!({
            "version": "mothlight_server_ready_v1",
            "addr": bound.to_string(),
            "pid": std::process::id(),
        });
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        std::fs::write(path, serde_json::to_string_pretty(&payload).unwrap_or_default()).ok();
    }

    let state = Arc::new(ServerState {
        config,
        telemetry: Arc::clone(&telemetry),
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _peer) = accepted.map_err(|e| anyhow!("serve: accept failed: {e}"))?;
                let io = TokioIo::new(stream);
                let state = state.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req| handle_request(req, state.clone()));
                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        eprintln!("serve: connection error: {e}");
                    }
                });
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("serve: shutting down");
                break;
            }
        }
    }

    // Stop the scheduler, then persist whatever its last tick did not pick
    // up. The sink serializes flush cycles, so an in-flight tick and this
    // final flush cannot interleave on the partition file.
    if let Some(flusher) = flusher {
        flusher.abort();
    }
    if let Err(err) = telemetry.flush_now() {
        tracing::warn!(error = %err, "final flush failed; pending telemetry not persisted");
    }

    Ok(())
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let resp = match (req.method(), req.uri().path()) {
        (&Method::GET, "/robots.txt") => text_response(StatusCode::OK, "\n"),
        (&Method::GET, "/favicon.ico") => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "image/x-icon")
            .body(Full::new(Bytes::new()))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::new()))),
        (&Method::GET, "/healthz") => text_response(StatusCode::OK, "ok\n"),
        // Every other path is part of the decoy: the generated links walk
        // arbitrary subdomains and paths, and all of them must resolve.
        _ => decoy_response(&req, &state),
    };

    Ok(resp)
}

fn decoy_response(req: &Request<Incoming>, state: &ServerState) -> Response<Full<Bytes>> {
    let user_agent = req
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(&state.config.domain);

    tracing::debug!(host, user_agent, path = req.uri().path(), "request received");

    // The front end decides what counts; the sink just tallies.
    if decoy::signatures::is_crawler_signature(user_agent) {
        tracing::info!(user_agent, "crawler observed");
        state.telemetry.record(user_agent);
    }

    let page = decoy::render_page(host, &state.config.domain);

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html")
        .header("Keep-Alive", "timeout=5, max=1000")
        .header(CONNECTION, "Keep-Alive")
        .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(SERVER, decoy::random_server_banner())
        .body(Full::new(Bytes::from(page)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"internal error"))))
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"internal error"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_resolve_arg_env_default_in_order() {
        assert_eq!(
            resolve_setting(Some("1.2.3.4:80"), "MOTHLIGHT_TEST_UNSET", "fallback"),
            "1.2.3.4:80"
        );
        assert_eq!(
            resolve_setting(None, "MOTHLIGHT_TEST_UNSET", "fallback"),
            "fallback"
        );
        assert_eq!(
            resolve_setting(Some("  "), "MOTHLIGHT_TEST_UNSET", "fallback"),
            "fallback"
        );
    }

    #[test]
    fn empty_ledger_root_disables_persistence() {
        assert_eq!(resolve_ledger_root(Some("")), None);
        assert_eq!(resolve_ledger_root(Some("  ")), None);
        assert_eq!(
            resolve_ledger_root(Some("/var/ledger")),
            Some(PathBuf::from("/var/ledger"))
        );
    }
}
