//! Test utilities: a scripted block-engine and canned relay responses.
//!
//! [`ScriptedEngine`] answers each JSON-RPC method from a per-method queue,
//! optionally after a delay, and counts calls so tests can assert what
//! reached the relay.  Only compiled for tests.

#![cfg(test)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use solana_sdk::{
    hash::Hash,
    message::{v0, VersionedMessage},
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    system_instruction,
    transaction::VersionedTransaction,
};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::relay::{BlockEngine, RelayConnection, RelayHandle};

type Reply = std::result::Result<Value, String>;

#[derive(Default)]
struct Script {
    queue: VecDeque<(Duration, Reply)>,
    fallback: Option<(Duration, Reply)>,
}

impl Script {
    fn next(&mut self) -> Option<(Duration, Reply)> {
        self.queue.pop_front().or_else(|| self.fallback.clone())
    }
}

/// Mock [`BlockEngine`] driven by scripted replies.
///
/// Replies are consumed in order; once a method's queue is empty its
/// `always` reply (if any) repeats forever.  With neither, the call fails
/// with a transport error.  `Err` replies become [`RelayError::Transport`].
#[derive(Default)]
pub struct ScriptedEngine {
    scripts: Mutex<HashMap<&'static str, Script>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    completed: Mutex<HashMap<&'static str, usize>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, method: &'static str, delay: Duration, reply: Reply) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .queue
            .push_back((delay, reply));
        self
    }

    /// Queue one reply.
    pub fn respond(self, method: &'static str, value: Value) -> Self {
        self.push(method, Duration::ZERO, Ok(value))
    }

    /// Queue one reply, delivered after `delay`.
    pub fn respond_after(self, method: &'static str, delay: Duration, value: Value) -> Self {
        self.push(method, delay, Ok(value))
    }

    /// Queue one transport failure.
    pub fn fail(self, method: &'static str, message: &str) -> Self {
        self.push(method, Duration::ZERO, Err(message.to_string()))
    }

    /// Reply used whenever the queue is empty.
    pub fn always(self, method: &'static str, value: Value) -> Self {
        self.always_after(method, Duration::ZERO, value)
    }

    pub fn always_after(self, method: &'static str, delay: Duration, value: Value) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(method)
            .or_default()
            .fallback = Some((delay, Ok(value)));
        self
    }

    /// Calls started for `method`.
    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    /// Calls for `method` that ran to completion (delay included).
    pub fn completed(&self, method: &str) -> usize {
        self.completed.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    async fn reply(&self, method: &'static str) -> Result<Value> {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(Script::next);

        let Some((delay, reply)) = next else {
            return Err(RelayError::Transport {
                method,
                message: "no scripted response".into(),
            });
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        *self.completed.lock().unwrap().entry(method).or_default() += 1;
        reply.map_err(|message| RelayError::Transport { method, message })
    }
}

#[async_trait]
impl BlockEngine for ScriptedEngine {
    async fn send_bundle(&self, _encoded_txs: Vec<String>) -> Result<Value> {
        self.reply("sendBundle").await
    }

    async fn get_bundle_statuses(&self, _bundle_ids: Vec<String>) -> Result<Value> {
        self.reply("getBundleStatuses").await
    }

    async fn get_in_flight_bundle_statuses(&self, _bundle_ids: Vec<String>) -> Result<Value> {
        self.reply("getInflightBundleStatuses").await
    }

    async fn get_tip_accounts(&self) -> Result<Value> {
        self.reply("getTipAccounts").await
    }
}

// ─── Connections ────────────────────────────────────────────────────────────

/// Connection whose connector always hands out `engine`.
pub fn shared_connection(engine: Arc<ScriptedEngine>, config: RelayConfig) -> Arc<RelayConnection> {
    Arc::new(RelayConnection::with_connector(
        config,
        move |_: &RelayConfig| -> Result<RelayHandle> { Ok(engine.clone() as RelayHandle) },
    ))
}

pub fn connection(engine: ScriptedEngine, config: RelayConfig) -> Arc<RelayConnection> {
    shared_connection(Arc::new(engine), config)
}

// ─── Canned responses ───────────────────────────────────────────────────────

pub fn send_ok(bundle_id: &str) -> Value {
    json!({ "jsonrpc": "2.0", "result": bundle_id, "id": 1 })
}

pub fn rpc_error(message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "error": { "code": -32602, "message": message }, "id": 1 })
}

pub fn tip_accounts(accounts: &[&str]) -> Value {
    json!({ "jsonrpc": "2.0", "result": accounts, "id": 1 })
}

/// `getBundleStatuses` reply with one entry.
pub fn statuses(bundle_id: &str, tag: &str, slot: Option<u64>, err: Option<Value>) -> Value {
    json!({ "jsonrpc": "2.0", "result": {
        "context": { "slot": slot.unwrap_or_default() + 1 },
        "value": [{
            "bundle_id": bundle_id,
            "transactions": [],
            "slot": slot,
            "confirmation_status": tag,
            "err": err.unwrap_or_else(|| json!({ "Ok": null }))
        }]
    }, "id": 1 })
}

/// `getBundleStatuses` reply for a bundle the relay has not indexed.
pub fn no_statuses() -> Value {
    json!({ "jsonrpc": "2.0", "result": { "context": { "slot": 1 }, "value": [] }, "id": 1 })
}

/// `getInflightBundleStatuses` reply with one entry.
pub fn inflight(bundle_id: &str, status: &str) -> Value {
    json!({ "jsonrpc": "2.0", "result": {
        "context": { "slot": 1 },
        "value": [{ "bundle_id": bundle_id, "status": status, "landed_slot": null }]
    }, "id": 1 })
}

// ─── Transactions ───────────────────────────────────────────────────────────

/// Signed V0 transfer from `payer` referencing `blockhash`.
pub fn signed_transfer(payer: &Keypair, blockhash: Hash) -> VersionedTransaction {
    let ix = system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 5_000);
    let msg = v0::Message::try_compile(&payer.pubkey(), &[ix], &[], blockhash).unwrap();
    VersionedTransaction::try_new(VersionedMessage::V0(msg), &[payer]).unwrap()
}
