// src/transport/pool.rs
// =============================================================================
// A pool of HTTP clients that all share one cookie store.
//
// - acquire() hands out an idle client, or builds a new one when none is
//   idle (the pool grows with load instead of making fetches wait)
// - the returned PooledClient gives the client back when it is dropped,
//   so every exit path of a fetch releases it
// - every client is built with the same cookie Jar, so a session cookie
//   set by one response is sent on later requests to that site
//
// A client is only ever held by one fetch at a time; reuse is sequential.
// =============================================================================

use reqwest::cookie::Jar;
use reqwest::Client;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::error::FetchError;

// Idle clients kept around for reuse; extra releases are dropped
pub const MAX_IDLE_CLIENTS: usize = 100;

const USER_AGENT: &str = concat!("site-spider/", env!("CARGO_PKG_VERSION"));
const MAX_REDIRECTS: usize = 10;

pub struct ClientPool {
    jar: Arc<Jar>,
    timeout: Option<Duration>,
    idle: Mutex<Vec<Client>>,
    created: AtomicUsize,
}

impl ClientPool {
    // Creates an empty pool; `timeout` applies to every fetch when set
    pub fn new(timeout: Option<Duration>) -> Self {
        ClientPool {
            jar: Arc::new(Jar::default()),
            timeout,
            idle: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
        }
    }

    // Lends a client until the returned guard is dropped
    pub fn acquire(self: &Arc<Self>) -> Result<PooledClient, FetchError> {
        let reused = self.idle_clients().pop();
        let client = match reused {
            Some(client) => client,
            None => self.build_client()?,
        };

        Ok(PooledClient {
            client,
            pool: Arc::clone(self),
        })
    }

    // Number of clients waiting for reuse
    pub fn idle_len(&self) -> usize {
        self.idle_clients().len()
    }

    // Number of clients built over the pool's lifetime
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    fn release(&self, client: Client) {
        let mut idle = self.idle_clients();
        if idle.len() < MAX_IDLE_CLIENTS {
            idle.push(client);
        }
    }

    fn build_client(&self) -> Result<Client, FetchError> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_provider(Arc::clone(&self.jar))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(FetchError::ClientBuild)?;
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(client)
    }

    // A poisoned lock only means another fetch panicked; the Vec is fine
    fn idle_clients(&self) -> std::sync::MutexGuard<'_, Vec<Client>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// A client on loan from the pool
pub struct PooledClient {
    client: Client,
    pool: Arc<ClientPool>,
}

impl Deref for PooledClient {
    type Target = Client;

    fn deref(&self) -> &Client {
        &self.client
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        // Client is a handle around shared state, so the clone is the same client
        self.pool.release(self.client.clone());
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What is Drop?
//    - A trait whose drop() runs when a value goes out of scope
//    - PooledClient uses it to put the client back, even on early returns
//
// 2. What is Deref?
//    - Lets a PooledClient be used like a &Client (pooled.get(url) works)
//
// 3. Why `self: &Arc<Self>` in acquire()?
//    - The guard needs its own handle on the pool to release into
//    - Arc::clone(self) gives it one without copying the pool
// -----------------------------------------------------------------------------
