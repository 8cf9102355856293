#[cfg(not(target_arch = "wasm32"))]
use std::io::{self, BufRead, Write};

#[cfg(not(target_arch = "wasm32"))]
use clap::Parser;
#[cfg(not(target_arch = "wasm32"))]
use dashboard_relay::cli::{render_completions, Args, Command};
#[cfg(not(target_arch = "wasm32"))]
use dashboard_relay::config::RelayConfig;
#[cfg(not(target_arch = "wasm32"))]
use dashboard_relay::{web, MarkerObserver, Notification, NotificationSink};

/// Prints each notification as one JSON line.
#[cfg(not(target_arch = "wasm32"))]
struct StdoutSink<W: Write> {
    out: W,
}

#[cfg(not(target_arch = "wasm32"))]
impl<W: Write> NotificationSink for StdoutSink<W> {
    fn is_embedded(&self) -> bool {
        true
    }

    fn post(&mut self, notification: &Notification) {
        if let Err(e) = writeln!(self.out, "{}", notification.to_json()) {
            tracing::warn!(error = %e, "failed to write notification");
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn init_tracing() {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Run each line through an observer, as if the chat app rendered it.
#[cfg(not(target_arch = "wasm32"))]
fn scan(reader: impl BufRead, out: impl Write) -> io::Result<usize> {
    let mut observer = MarkerObserver::new(StdoutSink { out });
    for line in reader.lines() {
        observer.check_text(&line?);
    }
    Ok(observer.posted())
}

#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing();

    match args.command {
        Command::Serve(serve) => {
            let mut config = RelayConfig::load(serve.config.as_deref())?;
            config.apply_overrides(serve.overrides());
            config.validate()?;
            web::serve(&config).await?;
        }
        Command::Scan { file } => {
            let stdout = io::stdout().lock();
            let posted = match file {
                Some(path) => scan(io::BufReader::new(std::fs::File::open(path)?), stdout)?,
                None => scan(io::stdin().lock(), stdout)?,
            };
            tracing::debug!(posted, "scan finished");
        }
        Command::Completions { shell } => {
            render_completions(shell, io::stdout().lock())?;
        }
    }

    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn test_scan_prints_one_line_per_distinct_endpoint() {
        let transcript = "hello\n<!--DASHBOARD_PORT:9000-->\nagain <!--DASHBOARD_PORT:9000-->\n<!--DASHBOARD:10.0.0.5:8050-->\n";
        let mut out = Vec::new();
        let posted = scan(transcript.as_bytes(), &mut out).unwrap();
        assert_eq!(posted, 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"type":"DASHBOARD_PORT","port":9000}"#,
                r#"{"type":"DASHBOARD_PORT","host":"10.0.0.5","port":8050}"#,
            ]
        );
    }

    #[test]
    fn test_scan_ignores_malformed_markers() {
        let mut out = Vec::new();
        let posted = scan("<!--DASHBOARD_PORT:0-->\n<!--DASHBOARD::1-->\n".as_bytes(), &mut out).unwrap();
        assert_eq!(posted, 0);
        assert!(out.is_empty());
    }
}
