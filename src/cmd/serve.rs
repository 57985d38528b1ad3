//! The `serve` subcommand.

use std::{future, sync::Arc};

use clap::Args;
use tokio::net::TcpListener;

use crate::{config::AppConfig, pipeline::Pipeline, prelude::*, server::router};

/// Default limit on the size of a request body.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Serve the upload form's backend over HTTP.
#[derive(Args, Debug)]
pub struct ServeOpts {
    /// The address to listen on.
    #[clap(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// The port to listen on.
    #[clap(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Reject request bodies larger than this.
    #[clap(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    #[clap(flatten)]
    pub config: AppConfig,
}

/// Run the `serve` subcommand until interrupted.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_serve(opts: &ServeOpts) -> Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(&opts.config).await?);
    let app = router(pipeline, opts.max_upload_bytes);

    let addr = format!("{}:{}", opts.host, opts.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot listen on {addr}"))?;
    info!(%addr, model = %opts.config.llm.model, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;
    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C. If we can't listen for Ctrl-C, never resolves.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(err) => {
            error!(error = %err, "Cannot listen for Ctrl-C");
            future::pending::<()>().await;
        }
    }
}
