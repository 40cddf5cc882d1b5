//! Retrying transient provider failures with exponential backoff.

use super::{Cursor, Document, Error, Provider, Query, Response, Result};
use rand::Rng;
use serde::Deserialize;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// How many times to retry a failed provider call, and how long to wait in
/// between. Only [`Error::is_transient`] failures are retried.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry, in milliseconds.
    pub initial_backoff_ms: u64,

    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,

    /// Factor applied to the delay after each retry.
    pub backoff_multiplier: f64,

    /// Adds up to 50% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that fails on the first error.
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        }
    }

    /// Runs `op` until it succeeds, fails with a permanent error, or the
    /// retries run out. `what` names the operation in log output.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut backoff_ms = self.initial_backoff_ms;
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    let sleep_ms = if self.jitter && backoff_ms > 1 {
                        backoff_ms + rand::thread_rng().gen_range(0..=(backoff_ms / 2))
                    } else {
                        backoff_ms
                    };
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {}ms: {}",
                        what,
                        attempt + 1,
                        self.max_retries + 1,
                        sleep_ms,
                        err
                    );
                    thread::sleep(Duration::from_millis(sleep_ms));
                    backoff_ms = std::cmp::min(
                        (backoff_ms as f64 * self.backoff_multiplier) as u64,
                        self.max_backoff_ms,
                    );
                    attempt += 1;
                }
                Err(err) if attempt > 0 => {
                    return Err(Error::Annotated(
                        format!("{} failed after {} attempts", what, attempt + 1),
                        Box::new(err),
                    ))
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Wraps a [`Provider`], retrying its calls according to a [`RetryPolicy`].
pub struct Retrying<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: Provider> Retrying<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Retrying<P> {
        Retrying { inner, policy }
    }
}

impl<P: Provider> Provider for Retrying<P> {
    fn query(&self, query: &Query) -> Result<Response> {
        self.policy.run("query", || self.inner.query(query))
    }

    fn fetch(&self, cursor: &Cursor) -> Result<Response> {
        self.policy.run("fetching next page", || self.inner.fetch(cursor))
    }

    fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<Document> {
        self.policy
            .run(&format!("fetching `{}`", uid), || {
                self.inner.get_by_uid(document_type, uid)
            })
    }
}
