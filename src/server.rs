//! Single-threaded command harness: owns the keyspace, the clients, the
//! blocking-waiter registry and the replication log, and serialises
//! command execution the way the (external) event loop would.

use tracing::trace;

use crate::blocking::BlockingEngine;
use crate::commands;
use crate::config::Config;
use crate::db::{ClientId, Db, Event};
use crate::reply::Reply;

pub(crate) struct Client {
    /// Replies delivered asynchronously (blocking-pop wakeups/timeouts).
    pub replies: Vec<Reply>,
    /// Inside a transaction batch: blocking commands must not block.
    pub in_multi: bool,
}

/// What a command handler produced: an immediate reply, or a suspension
/// (the reply arrives later through the blocking engine).
pub(crate) enum Outcome {
    Reply(Reply),
    Blocked,
}

pub struct Server {
    pub config: Config,
    pub db: Db,
    pub(crate) clients: std::collections::HashMap<ClientId, Client>,
    pub(crate) blocking: BlockingEngine,
    repl_log: Vec<Vec<Vec<u8>>>,
    pub(crate) now_ms: u64,
    next_client: ClientId,
}

impl Default for Server {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Server {
    pub fn new(config: Config) -> Self {
        Server {
            config,
            db: Db::new(),
            clients: std::collections::HashMap::new(),
            blocking: BlockingEngine::new(),
            repl_log: Vec::new(),
            now_ms: 0,
            next_client: 1,
        }
    }

    /// Register a new client connection.
    pub fn connect(&mut self) -> ClientId {
        let id = self.next_client;
        self.next_client += 1;
        self.clients.insert(id, Client { replies: Vec::new(), in_multi: false });
        id
    }

    /// Drop a client; a blocked client is scrubbed from every waiter
    /// queue it sits in.
    pub fn disconnect(&mut self, client: ClientId) {
        self.blocking.deregister(&mut self.db, client);
        self.clients.remove(&client);
    }

    /// Mark a client as running inside a transaction batch.
    pub fn set_in_multi(&mut self, client: ClientId, in_multi: bool) {
        if let Some(c) = self.clients.get_mut(&client) {
            c.in_multi = in_multi;
        }
    }

    pub(crate) fn in_multi(&self, client: ClientId) -> bool {
        self.clients.get(&client).is_some_and(|c| c.in_multi)
    }

    /// Execute one command for one client. Returns the reply, or `None`
    /// when the client suspended (its reply will arrive via
    /// `take_replies` once a wakeup or timeout serves it). Any waiters
    /// this command made servable are served before it returns.
    pub fn execute(&mut self, client: ClientId, argv: Vec<Vec<u8>>) -> Option<Reply> {
        assert!(self.clients.contains_key(&client), "unknown client {client}");
        trace!(client, cmd = ?argv.first().map(|c| String::from_utf8_lossy(c).into_owned()), "execute");

        let reply = match commands::dispatch(self, client, &argv) {
            Ok(Outcome::Reply(r)) => Some(r),
            Ok(Outcome::Blocked) => None,
            Err(e) => Some(Reply::from_error(&e)),
        };
        self.process_ready_keys();
        reply
    }

    /// Drain the asynchronously delivered replies of a client.
    pub fn take_replies(&mut self, client: ClientId) -> Vec<Reply> {
        self.clients
            .get_mut(&client)
            .map(|c| std::mem::take(&mut c.replies))
            .unwrap_or_default()
    }

    pub(crate) fn deliver(&mut self, client: ClientId, reply: Reply) {
        if let Some(c) = self.clients.get_mut(&client) {
            c.replies.push(reply);
        }
    }

    /// Append the effective form of a mutation to the replication log.
    pub(crate) fn propagate(&mut self, argv: Vec<Vec<u8>>) {
        self.repl_log.push(argv);
    }

    /// The replication log so far, in propagation order.
    pub fn repl_log(&self) -> &[Vec<Vec<u8>>] {
        &self.repl_log
    }

    /// Keyspace events fired so far, in order.
    pub fn events(&self) -> &[Event] {
        &self.db.events
    }

    /// The engine's logical clock, in milliseconds. Advanced only by
    /// `tick`, which keeps deadline behaviour deterministic under test.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Lifecycle rule: a mutation that empties a value drops its key.
    pub(crate) fn delete_if_empty(&mut self, key: &[u8]) {
        if self.db.lookup_read(key).is_some_and(|v| v.is_empty()) {
            self.db.remove(key);
            self.db
                .notify_event(crate::db::EventClass::Generic, "del", key);
        }
    }
}
