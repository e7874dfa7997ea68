//! `webqueue` sends HTTP requests through the `webqueue-lib` scheduler.
//!
//! Requests to the same host are spaced by a minimum interval, redirects
//! are followed by the scheduler and response bodies are decoded by the
//! requested parser. Every response is printed as one line of JSON.
//!
//! Look up two releases, one second apart:
//! ```sh
//! webqueue "https://musicbrainz.org/ws/2/release/1?inc=labels" \
//!          "https://musicbrainz.org/ws/2/release/2?inc=labels"
//! ```
//!
//! Fetch XML instead of JSON, with debug logging of the rate limiter:
//! ```sh
//! webqueue -vvv --type xml "https://musicbrainz.org/ws/2/artist?query=bjork"
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use log::{error, info};
use url::Url;
use webqueue_lib::{Pending, ServiceBuilder, StaticTokenProvider, WebService, url_port};

use crate::formatters::log::init_logging;
use crate::options::{HttpMethod, WebqueueOptions};

mod formatters;
mod options;
mod verbosity;

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`,
    // including configuration errors.
    #[allow(unused)]
    UnexpectedFailure = 1,
    RequestFailure = 2,
}

fn main() -> Result<()> {
    // std::process::exit doesn't run destructors, so the real work happens
    // in a separate function.
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

fn run_main() -> Result<i32> {
    let opts = WebqueueOptions::parse();
    init_logging(&opts.verbose);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(&opts))
}

async fn run(opts: &WebqueueOptions) -> Result<i32> {
    let config = opts.service_config()?;
    let service = match &opts.token {
        Some(token) => ServiceBuilder::builder()
            .config(config)
            .token_provider(Arc::new(StaticTokenProvider::new(token.clone())))
            .build(),
        None => ServiceBuilder::builder().config(config).build(),
    }
    .start()?;

    let mut pending = service.subscribe_pending();
    tokio::spawn(async move {
        while pending.changed().await.is_ok() {
            let count = *pending.borrow_and_update();
            info!("{count} requests pending");
        }
    });

    let calls = opts
        .urls
        .iter()
        .map(|url| submit(&service, opts, url))
        .collect::<Result<Vec<_>>>()?;

    let mut exit_code = ExitCode::Success;
    for (url, result) in opts.urls.iter().zip(join_all(calls).await) {
        match result {
            Ok(response) => {
                if !response.is_success() {
                    exit_code = ExitCode::RequestFailure;
                }
                println!("{}", formatters::response::to_json(&response));
            }
            Err(e) => {
                error!("{url}: {e}");
                exit_code = ExitCode::RequestFailure;
            }
        }
    }
    Ok(exit_code as i32)
}

fn submit(service: &WebService, opts: &WebqueueOptions, url: &Url) -> Result<Pending> {
    let host = url
        .host_str()
        .with_context(|| format!("URL has no host: {url}"))?;
    let port = url_port(url);
    let path = url.path();
    let body = opts.data.clone().unwrap_or_default();

    let mut call = match opts.method {
        HttpMethod::Get => service.get(host, port, path),
        HttpMethod::Post => service.post(host, port, path, body),
        HttpMethod::Put => service.put(host, port, path, body),
        HttpMethod::Delete => service.delete(host, port, path),
    };
    call = call.queries(url.query_pairs().into_owned());

    if let Some(parse_type) = &opts.parse_type {
        call = call.parse_type(parse_type);
    }
    if opts.raw {
        call = call.raw();
    }
    if let Some(priority) = opts.priority {
        call = call.priority(priority.into());
    }
    Ok(call
        .important(opts.important)
        .refresh(opts.refresh)
        .submit())
}
