//! Serving shell for the split view.
//!
//! A small HTTP/1.1 server: the parent page with the chat and dashboard
//! panes, the observer bootstrap script for the chat app, the wasm bundle
//! under `/pkg/`, and a health probe.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use colored::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};

/// Largest request head accepted before the connection is dropped.
const MAX_REQUEST_BYTES: usize = 8192;
const MAX_HEADERS: usize = 32;

/// Split-view parent page. The chat pane points at the configured chat app;
/// the dashboard pane is driven by `DashboardMount` from the wasm bundle.
pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Varro</title>
<style>
*{margin:0;padding:0;box-sizing:border-box}
body{height:100vh;display:flex;flex-direction:column;font-family:system-ui,-apple-system,sans-serif;background:#fff;color:#111}
header{padding:10px 20px;border-bottom:1px solid #e5e7eb;font-weight:600}
.split{flex:1;display:flex;min-height:0}
.pane{position:relative;min-width:25%;height:100%}
#chat-pane{flex:0 0 50%;max-width:75%;resize:horizontal;overflow:hidden;border-right:1px solid #e5e7eb}
#dashboard-pane{flex:1 1 50%}
.pane iframe{width:100%;height:100%;border:0;display:block}
.placeholder{display:flex;align-items:center;justify-content:center;height:100%;background:#f4f4f580}
.placeholder .card{width:24rem;padding:24px;border:1px solid #e5e7eb;border-radius:12px;background:#fff;text-align:center}
.placeholder .icon{font-size:2.25rem;margin-bottom:16px}
.placeholder h3{font-size:1.1rem;font-weight:500;margin-bottom:8px}
.placeholder p{font-size:.875rem;color:#6b7280}
</style>
</head>
<body>
<header>Varro</header>
<div class="split">
  <div class="pane" id="chat-pane">
    <iframe src="{{CHAT_URL}}" title="Chat" allow="clipboard-read; clipboard-write"></iframe>
  </div>
  <div class="pane" id="dashboard-pane" data-title="{{FRAME_TITLE}}"></div>
</div>
<script type="module">
import init, { DashboardMount } from '/pkg/dashboard_relay.js';
await init();
const pane = document.getElementById('dashboard-pane');
window.dashboardMount = new DashboardMount('dashboard-pane', pane.dataset.title);
</script>
</body>
</html>"##;

/// Module the chat app loads through its custom-script hook. Resolves the
/// wasm bundle relative to its own URL so it works cross-origin.
pub const OBSERVER_JS: &str = r#"// dashboard-relay marker observer bootstrap
const bundle = new URL('./pkg/dashboard_relay.js', import.meta.url);
const { default: init, start_marker_observer } = await import(bundle.href);
await init();
start_marker_observer();
"#;

/// Escape a value for use inside a double-quoted HTML attribute.
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Fill the parent page template from configuration.
pub fn render_index(config: &RelayConfig) -> String {
    INDEX_HTML
        .replace("{{CHAT_URL}}", &escape_attr(config.chat.url.trim()))
        .replace("{{FRAME_TITLE}}", &escape_attr(&config.dashboard.title))
}

/// Content type for a file served from the assets directory, `None` when the
/// extension is not one wasm-pack produces.
pub fn asset_content_type(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_str()?;
    if name.ends_with(".d.ts") {
        return Some("application/typescript");
    }
    match path.extension()?.to_str()? {
        "js" => Some("text/javascript; charset=utf-8"),
        "wasm" => Some("application/wasm"),
        "json" => Some("application/json"),
        _ => None,
    }
}

/// Resolve `/pkg/<rest>` inside `root`, refusing anything that is not a
/// plain relative path.
pub fn resolve_asset(root: &Path, rest: &str) -> Option<PathBuf> {
    if rest.is_empty() || rest.contains('\\') {
        return None;
    }
    let rel = Path::new(rest);
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(rel))
}

/// A fully buffered HTTP response.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Add `Access-Control-Allow-Origin: *` (resources loaded by the chat frame).
    pub cors: bool,
    /// Answering a `HEAD`: headers describe the body but it is not sent.
    pub head_only: bool,
}

impl Response {
    fn new(status: u16, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Response { status, content_type, body: body.into(), cors: false, head_only: false }
    }

    fn text(status: u16, body: &str) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body)
    }

    fn with_cors(mut self) -> Self {
        self.cors = true;
        self
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            405 => "Method Not Allowed",
            _ => "Internal Server Error",
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            self.reason(),
            self.content_type,
            self.body.len(),
        );
        if self.cors {
            head.push_str("Access-Control-Allow-Origin: *\r\n");
        }
        head.push_str("\r\n");
        let mut bytes = head.into_bytes();
        if !self.head_only {
            bytes.extend_from_slice(&self.body);
        }
        bytes
    }
}

/// Everything a connection needs, prepared once at startup.
pub struct Site {
    index_html: String,
    assets_dir: PathBuf,
}

impl Site {
    pub fn new(config: &RelayConfig) -> Self {
        Site { index_html: render_index(config), assets_dir: config.assets.dir.clone() }
    }

    pub async fn route(&self, method: &str, target: &str) -> Response {
        let path = target.split('?').next().unwrap_or("");
        debug!(method, path, "request");
        if method != "GET" && method != "HEAD" {
            return Response::text(405, "Method Not Allowed");
        }

        let mut response = match path {
            "/" | "/index.html" => Response::new(200, "text/html; charset=utf-8", self.index_html.clone()),
            "/observer.js" => Response::new(200, "text/javascript; charset=utf-8", OBSERVER_JS).with_cors(),
            "/healthz" => Response::text(200, "ok"),
            _ => match path.strip_prefix("/pkg/") {
                Some(rest) => self.asset(rest).await,
                None => Response::text(404, "Not Found"),
            },
        };
        if method == "HEAD" {
            response.head_only = true;
        }
        response
    }

    async fn asset(&self, rest: &str) -> Response {
        let Some(file) = resolve_asset(&self.assets_dir, rest) else {
            return Response::text(404, "Not Found");
        };
        let Some(content_type) = asset_content_type(&file) else {
            return Response::text(404, "Not Found");
        };
        match tokio::fs::read(&file).await {
            Ok(body) => Response::new(200, content_type, body).with_cors(),
            Err(e) => {
                debug!(file = %file.display(), error = %e, "asset not readable");
                Response::text(404, "Not Found").with_cors()
            }
        }
    }
}

/// Parse a request head. `Ok(None)` means more bytes are needed.
pub fn parse_request_line(buf: &[u8]) -> Result<Option<(String, String)>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    match req.parse(buf)? {
        httparse::Status::Partial => Ok(None),
        httparse::Status::Complete(_) => {
            let method = req.method.ok_or_else(|| RelayError::Request("missing method".into()))?;
            let path = req.path.ok_or_else(|| RelayError::Request("missing path".into()))?;
            Ok(Some((method.to_string(), path.to_string())))
        }
    }
}

/// Bind, print the banner, optionally open a browser, then serve forever.
pub async fn serve(config: &RelayConfig) -> Result<()> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| RelayError::Bind { addr: addr.clone(), source })?;
    let local = listener.local_addr()?;
    let url = format!("http://{}", local);

    eprintln!("{}", format!("  Parent page running at {}", url).bright_green());
    eprintln!("{}", format!("  Chat frame: {}", config.chat.url).bright_blue());
    eprintln!("{}", format!("  Observer script: {}/observer.js", url).bright_blue());
    eprintln!("{}", "  Press Ctrl+C to stop.".bright_blue());

    if config.server.open_browser {
        open_browser(&url);
    }

    serve_listener(listener, Arc::new(Site::new(config))).await
}

fn open_browser(url: &str) {
    #[cfg(target_os = "windows")]
    {
        let _ = std::process::Command::new("cmd").args(["/C", &format!("start {}", url)]).spawn();
    }
    #[cfg(target_os = "macos")]
    {
        let _ = std::process::Command::new("open").arg(url).spawn();
    }
    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("xdg-open").arg(url).spawn();
    }
}

/// Accept loop; each connection gets its own task.
pub async fn serve_listener(listener: TcpListener, site: Arc<Site>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let site = Arc::clone(&site);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, &site).await {
                warn!(%peer, error = %e, "connection error");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, peer: SocketAddr, site: &Site) -> Result<()> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    let (method, target) = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            debug!(%peer, "connection closed before a full request");
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        match parse_request_line(&buf) {
            Ok(Some(request)) => break request,
            Ok(None) if buf.len() < MAX_REQUEST_BYTES => continue,
            Ok(None) => {
                stream.write_all(&Response::text(400, "Bad Request").to_bytes()).await?;
                return Err(RelayError::Request("request head too large".into()));
            }
            Err(e) => {
                stream.write_all(&Response::text(400, "Bad Request").to_bytes()).await?;
                return Err(e);
            }
        }
    };

    let response = site.route(&method, &target).await;
    stream.write_all(&response.to_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}
