//! In-memory fakes for the sync engine's collaborators.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;

use crate::errors::{DatabaseError, Error, Result};
use crate::items::{Item, ItemPatch, ItemRepositoryTrait};
use crate::sync::{
    AggregatorGateway, SessionLedger, SessionPatch, SyncConfig, SyncService, SyncSession,
    SyncSessionRepositoryTrait,
};
use crate::transactions::{
    RemovedTransaction, Transaction, TransactionPage, TransactionRecord,
    TransactionRepositoryTrait,
};

pub struct InMemoryItemRepository {
    items: Mutex<HashMap<(String, String), Item>>,
}

impl InMemoryItemRepository {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, item: Item) {
        self.items
            .lock()
            .unwrap()
            .insert((item.id.clone(), item.user_id.clone()), item);
    }
}

#[async_trait]
impl ItemRepositoryTrait for InMemoryItemRepository {
    fn get(&self, item_id: &str, user_id: &str) -> Result<Option<Item>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .get(&(item_id.to_string(), user_id.to_string()))
            .cloned())
    }

    fn get_by_provider_id(&self, provider_item_id: &str, user_id: &str) -> Result<Option<Item>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .values()
            .find(|item| item.provider_item_id == provider_item_id && item.user_id == user_id)
            .cloned())
    }

    async fn insert(&self, item: Item) -> Result<Item> {
        self.seed(item.clone());
        Ok(item)
    }

    async fn update(&self, item_id: &str, user_id: &str, patch: ItemPatch) -> Result<Item> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(&(item_id.to_string(), user_id.to_string()))
            .ok_or_else(|| {
                Error::Database(DatabaseError::NotFound(format!("item {}", item_id)))
            })?;
        patch.apply_to(item);
        Ok(item.clone())
    }
}

pub struct InMemoryTransactionRepository {
    rows: Mutex<HashMap<String, Transaction>>,
    failing_provider_ids: Mutex<HashSet<String>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            failing_provider_ids: Mutex::new(HashSet::new()),
        }
    }

    /// Make every write touching this provider id fail until cleared.
    pub fn fail_writes_for(&self, provider_transaction_id: &str) {
        self.failing_provider_ids
            .lock()
            .unwrap()
            .insert(provider_transaction_id.to_string());
    }

    pub fn clear_write_failures(&self) {
        self.failing_provider_ids.lock().unwrap().clear();
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn check_injected_failure(&self, provider_transaction_id: &str) -> Result<()> {
        if self
            .failing_provider_ids
            .lock()
            .unwrap()
            .contains(provider_transaction_id)
        {
            return Err(Error::Database(DatabaseError::QueryFailed(format!(
                "injected write failure for {}",
                provider_transaction_id
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionRepositoryTrait for InMemoryTransactionRepository {
    fn get_by_provider_id(
        &self,
        user_id: &str,
        provider_transaction_id: &str,
    ) -> Result<Option<Transaction>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|tx| {
                tx.user_id == user_id && tx.provider_transaction_id == provider_transaction_id
            })
            .cloned())
    }

    fn find_synced_at_or_after(
        &self,
        item_id: &str,
        user_id: &str,
        sync_time: i64,
    ) -> Result<Vec<Transaction>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|tx| {
                tx.item_id == item_id && tx.user_id == user_id && tx.sync_time >= sync_time
            })
            .cloned()
            .collect())
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, transaction: Transaction) -> Result<Transaction> {
        self.check_injected_failure(&transaction.provider_transaction_id)?;
        let mut rows = self.rows.lock().unwrap();
        let existing_id = rows
            .values()
            .find(|tx| {
                tx.user_id == transaction.user_id
                    && tx.provider_transaction_id == transaction.provider_transaction_id
            })
            .map(|tx| tx.id.clone());

        let mut row = transaction;
        if let Some(id) = existing_id {
            row.id = id;
        }
        rows.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn delete_by_provider_id(
        &self,
        user_id: &str,
        provider_transaction_id: &str,
    ) -> Result<bool> {
        self.check_injected_failure(provider_transaction_id)?;
        let mut rows = self.rows.lock().unwrap();
        let existing_id = rows
            .values()
            .find(|tx| {
                tx.user_id == user_id && tx.provider_transaction_id == provider_transaction_id
            })
            .map(|tx| tx.id.clone());
        if let Some(id) = existing_id {
            rows.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<String, SyncSession>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn all(&self) -> Vec<SyncSession> {
        self.sessions.lock().unwrap().values().cloned().collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn seed(&self, session: SyncSession) {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session);
    }
}

#[async_trait]
impl SyncSessionRepositoryTrait for InMemorySessionRepository {
    fn get(&self, session_id: &str) -> Result<Option<SyncSession>> {
        Ok(self.sessions.lock().unwrap().get(session_id).cloned())
    }

    fn get_for_item(&self, item_id: &str, limit: Option<i64>) -> Result<Vec<SyncSession>> {
        let mut sessions: Vec<SyncSession> = self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.item_id == item_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            b.sync_time
                .cmp(&a.sync_time)
                .then(b.sync_number.total_cmp(&a.sync_number))
        });
        if let Some(limit) = limit {
            sessions.truncate(limit as usize);
        }
        Ok(sessions)
    }

    async fn insert(&self, session: SyncSession) -> Result<SyncSession> {
        self.seed(session.clone());
        Ok(session)
    }

    async fn update(&self, session_id: &str, patch: SessionPatch) -> Result<SyncSession> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(session_id).ok_or_else(|| {
            Error::Database(DatabaseError::NotFound(format!("session {}", session_id)))
        })?;
        patch.apply_to(session);
        Ok(session.clone())
    }
}

/// Gateway returning a scripted sequence of responses and recording the
/// cursor of every call.
pub struct ScriptedGateway {
    responses: Mutex<VecDeque<Result<TransactionPage>>>,
    pub calls: Mutex<Vec<Option<String>>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push_page(&self, page: TransactionPage) {
        self.responses.lock().unwrap().push_back(Ok(page));
    }

    pub fn push_error(&self, err: Error) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn cursors_seen(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AggregatorGateway for ScriptedGateway {
    async fn fetch_page(
        &self,
        _access_token: &str,
        cursor: Option<&str>,
    ) -> Result<TransactionPage> {
        self.calls
            .lock()
            .unwrap()
            .push(cursor.map(str::to_string));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(TransactionPage::default()))
    }
}

pub fn record(id: &str) -> TransactionRecord {
    TransactionRecord {
        transaction_id: id.to_string(),
        account_id: "acct-1".to_string(),
        amount: dec!(19.99),
        currency: "USD".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
        name: format!("PURCHASE {}", id),
        merchant_name: None,
        pending: false,
        category: None,
    }
}

pub fn page_of(
    added: &[&str],
    modified: &[&str],
    removed: &[&str],
    next_cursor: &str,
    has_more: bool,
) -> TransactionPage {
    TransactionPage {
        added: added.iter().map(|id| record(id)).collect(),
        modified: modified.iter().map(|id| record(id)).collect(),
        removed: removed
            .iter()
            .map(|id| RemovedTransaction {
                transaction_id: id.to_string(),
            })
            .collect(),
        next_cursor: Some(next_cursor.to_string()),
        has_more,
    }
}

/// Fully wired engine over the in-memory fakes, with one seeded item.
pub struct TestEngine {
    pub items: Arc<InMemoryItemRepository>,
    pub transactions: Arc<InMemoryTransactionRepository>,
    pub sessions: Arc<InMemorySessionRepository>,
    pub gateway: Arc<ScriptedGateway>,
    pub service: SyncService,
    pub item: Item,
}

impl TestEngine {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let items = Arc::new(InMemoryItemRepository::new());
        let transactions = Arc::new(InMemoryTransactionRepository::new());
        let sessions = Arc::new(InMemorySessionRepository::new());
        let gateway = Arc::new(ScriptedGateway::new());

        let item = Item::new("provider-item-1", "user-1", "access-token");
        items.seed(item.clone());

        let ledger = SessionLedger::new(sessions.clone());
        let service = SyncService::new(
            items.clone(),
            transactions.clone(),
            gateway.clone(),
            ledger,
            config,
        );

        Self {
            items,
            transactions,
            sessions,
            gateway,
            service,
            item,
        }
    }

    pub fn reload_item(&self) -> Item {
        self.items
            .get(&self.item.id, &self.item.user_id)
            .unwrap()
            .expect("seeded item present")
    }

    pub fn session(&self, session_id: &str) -> SyncSession {
        self.sessions
            .get(session_id)
            .unwrap()
            .expect("session present")
    }
}
