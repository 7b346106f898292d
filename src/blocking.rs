//! Blocking-pop protocol: registration of suspended clients, wakeup on
//! ready keys, timeout sweeps, and rewriting of the served operation into
//! its non-blocking replication form.

use tracing::debug;

use crate::db::{ClientId, Db, EventClass};
use crate::dict::{Xxh3Map, new_map};
use crate::list::{End, List};
use crate::reply::Reply;
use crate::server::Server;
use crate::value::Value;

/// What the suspended command will do once its key has elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitKind {
    ListPop(End),
    ZSetPop { min: bool },
}

/// Everything a suspended command needs to resume. No other state is
/// held anywhere while the client waits.
pub(crate) struct Waiter {
    pub keys: Vec<Vec<u8>>,
    pub kind: WaitKind,
    /// BRPOPLPUSH: where the popped element goes.
    pub push_target: Option<Vec<u8>>,
    /// Absolute deadline on the engine clock; None waits forever.
    pub deadline_ms: Option<u64>,
    /// Global arrival order, the tie-breaker across keys.
    pub seq: u64,
}

/// Registry of all suspended clients. Per-key arrival queues live in the
/// keyspace (`Db::blocking_keys`); this owns the waiter records.
pub(crate) struct BlockingEngine {
    waiters: Xxh3Map<ClientId, Waiter>,
    next_seq: u64,
}

impl BlockingEngine {
    pub fn new() -> Self {
        BlockingEngine { waiters: new_map(), next_seq: 0 }
    }

    pub fn get(&self, client: ClientId) -> Option<&Waiter> {
        self.waiters.get(&client)
    }

    /// Suspend a client on a set of keys, enqueueing it on each in
    /// arrival order.
    pub fn register(
        &mut self,
        db: &mut Db,
        client: ClientId,
        keys: Vec<Vec<u8>>,
        kind: WaitKind,
        push_target: Option<Vec<u8>>,
        deadline_ms: Option<u64>,
    ) {
        for key in &keys {
            db.enqueue_waiter(key, client);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(client, keys = keys.len(), seq, "client suspended on keys");
        self.waiters.insert(client, Waiter { keys, kind, push_target, deadline_ms, seq });
    }

    /// Remove a client from the registry and from every key it waits on.
    /// Used by wakeup, timeout and disconnect alike.
    pub fn deregister(&mut self, db: &mut Db, client: ClientId) -> Option<Waiter> {
        let waiter = self.waiters.remove(&client)?;
        for key in &waiter.keys {
            db.dequeue_waiter(key, client);
        }
        Some(waiter)
    }

    /// Clients whose deadline has passed, earliest arrival first.
    fn expired(&self, now_ms: u64) -> Vec<ClientId> {
        let mut due: Vec<(u64, ClientId)> = self
            .waiters
            .iter()
            .filter(|(_, w)| w.deadline_ms.is_some_and(|d| d <= now_ms))
            .map(|(c, w)| (w.seq, *c))
            .collect();
        due.sort_unstable();
        due.into_iter().map(|(_, c)| c).collect()
    }
}

impl Server {
    /// Advance the engine clock and time out overdue waiters. A timed-out
    /// waiter leaves every queue and receives the null reply.
    pub fn tick(&mut self, ms: u64) {
        self.now_ms += ms;
        let now = self.now_ms;
        for client in self.blocking.expired(now) {
            if self.blocking.deregister(&mut self.db, client).is_some() {
                debug!(client, "blocking wait timed out");
                self.deliver(client, Reply::NullArray);
            }
        }
    }

    /// Serve every waiter made servable by the command that just ran.
    ///
    /// Keys signalled ready are consumed in batches; within a batch the
    /// earliest-arrival servable waiter across all ready keys goes first,
    /// and each serve re-checks type and emptiness against the current
    /// keyspace. Serving may signal further keys (a push into a
    /// BRPOPLPUSH destination), which the outer loop picks up.
    pub(crate) fn process_ready_keys(&mut self) {
        loop {
            let ready = self.db.take_ready();
            if ready.is_empty() {
                return;
            }
            loop {
                let Some((client, key)) = self.pick_earliest_servable(&ready) else {
                    break;
                };
                self.serve_waiter(client, &key);
            }
        }
    }

    /// For each ready key, the first servable waiter in arrival order is
    /// a candidate; the candidate with the globally smallest arrival
    /// sequence wins.
    fn pick_earliest_servable(&self, ready: &[Vec<u8>]) -> Option<(ClientId, Vec<u8>)> {
        let mut best: Option<(u64, ClientId, &[u8])> = None;
        for key in ready {
            for client in self.db.waiters_on(key) {
                let Some(waiter) = self.blocking.get(client) else { continue };
                if !self.waiter_servable(waiter, key) {
                    // Stays registered; later arrivals may still be
                    // servable (a wrong-typed push destination must not
                    // wedge the whole queue).
                    continue;
                }
                if best.is_none_or(|(seq, _, _)| waiter.seq < seq) {
                    best = Some((waiter.seq, client, key));
                }
                break;
            }
        }
        best.map(|(_, client, key)| (client, key.to_vec()))
    }

    fn waiter_servable(&self, waiter: &Waiter, key: &[u8]) -> bool {
        let source_ok = match (self.db.lookup_read(key), waiter.kind) {
            (Some(Value::List(l)), WaitKind::ListPop(_)) => !l.is_empty(),
            (Some(Value::SortedSet(z)), WaitKind::ZSetPop { .. }) => !z.is_empty(),
            _ => false,
        };
        if !source_ok {
            return false;
        }
        match &waiter.push_target {
            None => true,
            Some(target) => {
                matches!(self.db.lookup_read(target), None | Some(Value::List(_)))
            }
        }
    }

    /// Pop on behalf of a suspended client and deliver its reply. The
    /// replication log records the effective non-blocking command.
    fn serve_waiter(&mut self, client: ClientId, key: &[u8]) {
        let Some(waiter) = self.blocking.deregister(&mut self.db, client) else {
            return;
        };
        debug!(client, key = ?String::from_utf8_lossy(key), "serving blocked client");

        match waiter.kind {
            WaitKind::ListPop(side) => {
                if let Some(target) = waiter.push_target {
                    self.serve_push_transfer(client, key, &target);
                } else {
                    let value = self
                        .list_pop_for_waiter(key, side)
                        .expect("servable list had no element");
                    let (event, effective): (_, &[u8]) = match side {
                        End::Head => ("lpop", b"lpop"),
                        End::Tail => ("rpop", b"rpop"),
                    };
                    self.db.notify_event(EventClass::List, event, key);
                    self.db.signal_modified(key);
                    self.delete_if_empty(key);
                    self.propagate(vec![effective.to_vec(), key.to_vec()]);
                    self.deliver(
                        client,
                        Reply::Array(vec![Reply::bulk(key.to_vec()), Reply::Bulk(value)]),
                    );
                }
            }
            WaitKind::ZSetPop { min } => {
                let popped = match self.db.lookup_write(key) {
                    Some(Value::SortedSet(z)) => z.pop_extreme(min, 1),
                    _ => panic!("servable key changed type mid-serve"),
                };
                let (member, score) = popped
                    .into_iter()
                    .next()
                    .expect("servable sorted set had no element");
                let (event, effective): (_, &[u8]) =
                    if min { ("zpopmin", b"zpopmin") } else { ("zpopmax", b"zpopmax") };
                self.db.notify_event(EventClass::SortedSet, event, key);
                self.db.signal_modified(key);
                self.delete_if_empty(key);
                self.propagate(vec![effective.to_vec(), key.to_vec()]);
                self.deliver(
                    client,
                    Reply::Array(vec![
                        Reply::bulk(key.to_vec()),
                        Reply::Bulk(member),
                        Reply::Double(score),
                    ]),
                );
            }
        }
    }

    /// The BRPOPLPUSH wake path: tail-pop the source, head-push the
    /// destination (creating it if needed), replicate as RPOPLPUSH.
    fn serve_push_transfer(&mut self, client: ClientId, source: &[u8], target: &[u8]) {
        let value = self
            .list_pop_for_waiter(source, End::Tail)
            .expect("servable list had no element");
        self.db.notify_event(EventClass::List, "rpop", source);
        self.db.signal_modified(source);
        self.delete_if_empty(source);

        if self.db.lookup_read(target).is_none() {
            let list = List::new(&self.config);
            self.db.add(target.to_vec(), Value::List(list));
        }
        match self.db.lookup_write(target) {
            Some(Value::List(l)) => l.push(End::Head, &value),
            _ => panic!("push target changed type mid-serve"),
        }
        self.db.notify_event(EventClass::List, "lpush", target);
        self.db.signal_modified(target);
        self.db.signal_ready(target);

        self.propagate(vec![b"rpoplpush".to_vec(), source.to_vec(), target.to_vec()]);
        self.deliver(client, Reply::Bulk(value));
    }

    fn list_pop_for_waiter(&mut self, key: &[u8], side: End) -> Option<Vec<u8>> {
        match self.db.lookup_write(key) {
            Some(Value::List(l)) => l.pop(side),
            _ => panic!("servable key changed type mid-serve"),
        }
    }
}
