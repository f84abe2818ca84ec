//! In-memory table client
//!
//! Records every call it receives so tests can assert on what reached the
//! table service. Failures can be injected per operation. Items are keyed by
//! the table's hash and range attributes; a put with an existing key replaces
//! the stored item.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::event::{HASH_KEY, RANGE_KEY};
use super::table::{AttributeValue, Item, TableClient, TableError, TableSchema, TableStatus};

#[derive(Debug)]
struct MemoryTable {
    hash_key: String,
    range_key: String,
    items: Vec<Item>,
}

impl MemoryTable {
    fn new(hash_key: &str, range_key: &str) -> Self {
        Self {
            hash_key: hash_key.to_string(),
            range_key: range_key.to_string(),
            items: Vec::new(),
        }
    }

    fn key_of<'a>(&self, item: &'a Item) -> (Option<&'a AttributeValue>, Option<&'a AttributeValue>) {
        (item.get(&self.hash_key), item.get(&self.range_key))
    }

    fn put(&mut self, item: Item) -> Result<(), TableError> {
        let key = self.key_of(&item);
        if key.0.is_none() || key.1.is_none() {
            return Err(TableError::Other(format!(
                "item is missing key attribute {} or {}",
                self.hash_key, self.range_key
            )));
        }

        match self.items.iter().position(|stored| self.key_of(stored) == key) {
            Some(index) => self.items[index] = item,
            None => self.items.push(item),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, MemoryTable>,
    /// Describes still reporting a freshly created table as pending
    pending_polls: HashMap<String, u32>,
    creation_delay_polls: u32,
    describe_calls: usize,
    created: Vec<TableSchema>,
    put_calls: usize,
    describe_failure: Option<String>,
    create_failure: Option<String>,
    put_failure: Option<String>,
}

/// [`TableClient`] keeping tables and items in process memory
#[derive(Debug, Default)]
pub struct InMemoryTableClient {
    state: Mutex<MemoryState>,
}

impl InMemoryTableClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `table` already present and active, keyed like the events table.
    pub fn with_table(table: &str) -> Self {
        let client = Self::default();
        client
            .lock()
            .tables
            .insert(table.to_string(), MemoryTable::new(HASH_KEY, RANGE_KEY));
        client
    }

    /// Keeps newly created tables pending for `polls` describe calls.
    pub fn with_creation_delay(self, polls: u32) -> Self {
        self.lock().creation_delay_polls = polls;
        self
    }

    /// Makes every describe call fail with `message`.
    pub fn fail_describe(&self, message: &str) {
        self.lock().describe_failure = Some(message.to_string());
    }

    /// Makes every create call fail with `message`.
    pub fn fail_create(&self, message: &str) {
        self.lock().create_failure = Some(message.to_string());
    }

    /// Makes every put call fail with `message`.
    pub fn fail_put(&self, message: &str) {
        self.lock().put_failure = Some(message.to_string());
    }

    pub fn describe_calls(&self) -> usize {
        self.lock().describe_calls
    }

    /// Schemas passed to create-table, in call order.
    pub fn created_tables(&self) -> Vec<TableSchema> {
        self.lock().created.clone()
    }

    /// Number of put calls, including rejected ones.
    pub fn put_calls(&self) -> usize {
        self.lock().put_calls
    }

    /// Items stored in `table`, in first-insertion order.
    pub fn items(&self, table: &str) -> Vec<Item> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.items.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

#[async_trait]
impl TableClient for InMemoryTableClient {
    async fn describe_table(&self, table: &str) -> Result<TableStatus, TableError> {
        let mut state = self.lock();
        state.describe_calls += 1;

        if let Some(message) = &state.describe_failure {
            return Err(TableError::Other(message.clone()));
        }
        if !state.tables.contains_key(table) {
            return Err(TableError::NotFound {
                table: table.to_string(),
            });
        }

        match state.pending_polls.get_mut(table) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(TableStatus::Pending)
            }
            _ => Ok(TableStatus::Active),
        }
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<(), TableError> {
        let mut state = self.lock();
        state.created.push(schema.clone());

        if let Some(message) = &state.create_failure {
            return Err(TableError::Other(message.clone()));
        }
        if state.tables.contains_key(&schema.table_name) {
            return Err(TableError::Other(format!(
                "table already exists: {}",
                schema.table_name
            )));
        }

        let delay = state.creation_delay_polls;
        state.tables.insert(
            schema.table_name.clone(),
            MemoryTable::new(&schema.hash_key.name, &schema.range_key.name),
        );
        state.pending_polls.insert(schema.table_name.clone(), delay);
        Ok(())
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), TableError> {
        let mut state = self.lock();
        state.put_calls += 1;

        if let Some(message) = &state.put_failure {
            return Err(TableError::Other(message.clone()));
        }

        match state.tables.get_mut(table) {
            Some(stored) => stored.put(item),
            None => Err(TableError::NotFound {
                table: table.to_string(),
            }),
        }
    }
}
