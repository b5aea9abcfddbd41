//! In-memory reference database.
//!
//! Keeps documents in a `BTreeMap` keyed by `_id` and re-evaluates every open
//! live query after each write. Revisions are `"<n>-<hash>"` with a single
//! winning branch; there is no persistence and no replication.
//!
//! Names starting with `http://` or `https://` produce remote handles backed
//! by a [`MemorySession`], which is enough to exercise session flows.
//!
//! The changes feed keeps the latest change per document, ordered by
//! sequence number. Indexes are recorded but never used for planning.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};

use crate::{
    error::{DatabaseError, LiveFeedError, Result},
    query::{execute_live_query, LiveQuery, SelectorMatcher},
    types::{DatabaseInfo, DocResponse, Document, UserContext, UserProfile},
};

use super::changes::{ChangesFeedEvent, ChangesOptions, ChangesSink};
use super::traits::{
    is_remote_name, Database, DatabaseFactory, FeedEvent, FeedHandle, FeedSink, SessionProvider,
};

// ============================================================================
// Feed
// ============================================================================

struct MemoryFeed {
    id: u64,
    query: LiveQuery,
    sink: FeedSink,
    cancelled: AtomicBool,
    /// Last aggregate delivered, to suppress no-op updates.
    last: Mutex<Vec<Value>>,
}

struct MemoryFeedHandle {
    feed: Arc<MemoryFeed>,
    state: Arc<Mutex<MemoryState>>,
}

impl FeedHandle for MemoryFeedHandle {
    fn cancel(&self) {
        if self.feed.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.lock().feeds.retain(|f| f.id != self.feed.id);
        (self.feed.sink)(FeedEvent::Cancelled);
    }

    fn is_cancelled(&self) -> bool {
        self.feed.cancelled.load(Ordering::SeqCst)
    }
}

struct ChangesFeed {
    id: u64,
    include_docs: bool,
    selector: Option<Value>,
    sink: ChangesSink,
    cancelled: AtomicBool,
}

impl ChangesFeed {
    /// The change as this feed reports it, or `None` when filtered out.
    fn render(&self, record: &ChangeRecord) -> Result<Option<Value>> {
        if let Some(selector) = &self.selector {
            if !SelectorMatcher::new().matches(&record.doc, selector)? {
                return Ok(None);
            }
        }
        Ok(Some(record.to_json(self.include_docs)))
    }
}

struct ChangesFeedHandle {
    feed: Arc<ChangesFeed>,
    state: Arc<Mutex<MemoryState>>,
}

impl FeedHandle for ChangesFeedHandle {
    fn cancel(&self) {
        if self.feed.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let last_seq = {
            let mut st = self.state.lock();
            st.change_feeds.retain(|f| f.id != self.feed.id);
            st.update_seq
        };
        (self.feed.sink)(ChangesFeedEvent::Complete(
            json!({ "status": "cancelled", "last_seq": last_seq }),
        ));
    }

    fn is_cancelled(&self) -> bool {
        self.feed.cancelled.load(Ordering::SeqCst)
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
struct ChangeRecord {
    seq: u64,
    id: String,
    rev: String,
    deleted: bool,
    doc: Value,
}

impl ChangeRecord {
    fn to_json(&self, include_docs: bool) -> Value {
        let mut change = json!({
            "id": self.id,
            "seq": self.seq,
            "changes": [{ "rev": self.rev }],
        });
        if self.deleted {
            change["deleted"] = Value::Bool(true);
        }
        if include_docs {
            change["doc"] = self.doc.clone();
        }
        change
    }
}

struct StoredDoc {
    generation: u64,
    rev: String,
    body: Value,
}

#[derive(Default)]
struct MemoryState {
    docs: BTreeMap<String, StoredDoc>,
    feeds: Vec<Arc<MemoryFeed>>,
    /// Latest change per document, ascending by `seq`.
    changes: Vec<ChangeRecord>,
    change_feeds: Vec<Arc<ChangesFeed>>,
    indexes: Vec<Value>,
    update_seq: u64,
    closed: bool,
    next_feed_id: u64,
    next_post_id: u64,
}

impl MemoryState {
    fn bodies(&self) -> Vec<Value> {
        self.docs.values().map(|d| d.body.clone()).collect()
    }
}

// ============================================================================
// MemoryDatabase
// ============================================================================

pub struct MemoryDatabase {
    name: String,
    state: Arc<Mutex<MemoryState>>,
    session: Option<Arc<MemorySession>>,
    options: Value,
}

impl MemoryDatabase {
    /// A local (non-remote) database.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MemoryState::default())),
            session: None,
            options: Value::Null,
        }
    }

    /// A remote database whose server sessions are handled by `session`.
    pub fn remote(name: impl Into<String>, session: Arc<MemorySession>) -> Self {
        Self {
            session: Some(session),
            ..Self::new(name)
        }
    }

    /// Record the creation options this handle was opened with.
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &Value {
        &self.options
    }

    /// Number of live queries currently open.
    pub fn open_feeds(&self) -> usize {
        self.state.lock().feeds.len()
    }

    pub fn doc_count(&self) -> usize {
        self.state.lock().docs.len()
    }

    fn ensure_open(&self, st: &MemoryState) -> Result<()> {
        if st.closed {
            return Err(DatabaseError::Closed(self.name.clone()).into());
        }
        Ok(())
    }

    /// Write `body` under `id`, checking `_rev` against the stored revision.
    fn write(&self, id: String, mut body: Value, deleted: bool) -> Result<DocResponse> {
        let supplied_rev = body.get("_rev").and_then(Value::as_str).map(str::to_string);

        let (response, changed) = {
            let mut st = self.state.lock();
            self.ensure_open(&st)?;

            let current = st.docs.get(&id);
            let conflict = match (current, &supplied_rev) {
                (Some(doc), Some(rev)) => &doc.rev != rev,
                (Some(_), None) => true,
                (None, Some(_)) => true,
                (None, None) => deleted,
            };
            if conflict {
                return Err(if deleted && current.is_none() {
                    DatabaseError::NotFound {
                        database: self.name.clone(),
                        id,
                    }
                } else {
                    DatabaseError::Conflict {
                        database: self.name.clone(),
                        id,
                    }
                }
                .into());
            }

            let generation = current.map(|d| d.generation).unwrap_or(0) + 1;
            let rev = make_rev(generation, &body);
            if let Some(obj) = body.as_object_mut() {
                obj.insert("_id".to_string(), Value::String(id.clone()));
                obj.insert("_rev".to_string(), Value::String(rev.clone()));
            }

            if deleted {
                st.docs.remove(&id);
            } else {
                st.docs.insert(
                    id.clone(),
                    StoredDoc {
                        generation,
                        rev: rev.clone(),
                        body: body.clone(),
                    },
                );
            }

            st.update_seq += 1;
            let record = ChangeRecord {
                seq: st.update_seq,
                id: id.clone(),
                rev: rev.clone(),
                deleted,
                doc: body.clone(),
            };
            st.changes.retain(|c| c.id != id);
            st.changes.push(record.clone());

            let response = DocResponse { ok: true, id, rev };
            (response, (body, record))
        };

        let (body, record) = changed;
        self.notify_feeds(body);
        self.notify_changes(&record);
        Ok(response)
    }

    /// Report one change to every open changes feed.
    fn notify_changes(&self, record: &ChangeRecord) {
        let feeds: Vec<Arc<ChangesFeed>> = self.state.lock().change_feeds.clone();
        for feed in feeds {
            if feed.cancelled.load(Ordering::SeqCst) {
                continue;
            }
            match feed.render(record) {
                Ok(Some(change)) => (feed.sink)(ChangesFeedEvent::Change(change)),
                Ok(None) => {}
                Err(e) => (feed.sink)(ChangesFeedEvent::Error(e.to_string())),
            }
        }
    }

    /// Re-run every open feed and deliver changed aggregates.
    ///
    /// Results are computed under the lock; sinks are called after it is
    /// released so they may re-enter the database.
    fn notify_feeds(&self, change: Value) {
        let deliveries: Vec<(Arc<MemoryFeed>, FeedEvent)> = {
            let st = self.state.lock();
            let docs = st.bodies();
            st.feeds
                .iter()
                .filter_map(|feed| {
                    let event = match execute_live_query(&docs, &feed.query) {
                        Ok(aggregate) => {
                            let mut last = feed.last.lock();
                            if *last == aggregate {
                                return None;
                            }
                            *last = aggregate.clone();
                            FeedEvent::Update {
                                change: Some(change.clone()),
                                aggregate,
                            }
                        }
                        Err(e) => FeedEvent::Error(e.to_string()),
                    };
                    Some((Arc::clone(feed), event))
                })
                .collect()
        };

        for (feed, event) in deliveries {
            if !feed.cancelled.load(Ordering::SeqCst) {
                (feed.sink)(event);
            }
        }
    }
}

fn make_rev(generation: u64, body: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    body.to_string().hash(&mut hasher);
    generation.hash(&mut hasher);
    format!("{generation}-{:016x}", hasher.finish())
}

fn doc_id(doc: &Value) -> Option<String> {
    doc.get("_id").and_then(Value::as_str).map(str::to_string)
}

/// Keep only the listed top-level fields.
fn project_fields(doc: Value, fields: &[Value]) -> Value {
    let Value::Object(mut obj) = doc else {
        return doc;
    };
    let mut out = Map::new();
    for field in fields.iter().filter_map(Value::as_str) {
        if let Some(v) = obj.remove(field) {
            out.insert(field.to_string(), v);
        }
    }
    Value::Object(out)
}

impl Database for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_remote(&self) -> bool {
        self.session.is_some()
    }

    fn live_find(&self, query: &LiveQuery, sink: FeedSink) -> Result<Box<dyn FeedHandle>> {
        // Reject bad sort specifications up front rather than on first write.
        query.sort_entries()?;

        let (feed, initial) = {
            let mut st = self.state.lock();
            self.ensure_open(&st)?;
            let initial = execute_live_query(&st.bodies(), query)?;
            st.next_feed_id += 1;
            let feed = Arc::new(MemoryFeed {
                id: st.next_feed_id,
                query: query.clone(),
                sink,
                cancelled: AtomicBool::new(false),
                last: Mutex::new(initial.clone()),
            });
            st.feeds.push(Arc::clone(&feed));
            (feed, initial)
        };

        if !initial.is_empty() {
            (feed.sink)(FeedEvent::Update {
                change: None,
                aggregate: initial,
            });
        }
        if !feed.cancelled.load(Ordering::SeqCst) {
            (feed.sink)(FeedEvent::Ready);
        }

        Ok(Box::new(MemoryFeedHandle {
            feed,
            state: Arc::clone(&self.state),
        }))
    }

    fn get(&self, id: &str, _opts: &Value) -> Result<Document> {
        let st = self.state.lock();
        self.ensure_open(&st)?;
        st.docs
            .get(id)
            .map(|d| d.body.clone())
            .ok_or_else(|| {
                DatabaseError::NotFound {
                    database: self.name.clone(),
                    id: id.to_string(),
                }
                .into()
            })
    }

    fn put(&self, doc: Document, _opts: &Value) -> Result<DocResponse> {
        let id = doc_id(&doc)
            .ok_or_else(|| DatabaseError::Backend("document must have an _id".to_string()))?;
        self.write(id, doc, false)
    }

    fn post(&self, doc: Document, _opts: &Value) -> Result<DocResponse> {
        let id = {
            let mut st = self.state.lock();
            st.next_post_id += 1;
            format!("{}-{:08}", self.name.replace('/', "_"), st.next_post_id)
        };
        self.write(id, doc, false)
    }

    fn remove(&self, doc: &Document, _opts: &Value) -> Result<DocResponse> {
        let id = doc_id(doc)
            .ok_or_else(|| DatabaseError::Backend("document must have an _id".to_string()))?;
        let mut tombstone = Map::new();
        if let Some(rev) = doc.get("_rev") {
            tombstone.insert("_rev".to_string(), rev.clone());
        }
        tombstone.insert("_deleted".to_string(), Value::Bool(true));
        self.write(id, Value::Object(tombstone), true)
    }

    fn all_docs(&self, opts: &Value) -> Result<Value> {
        let include_docs = opts
            .get("include_docs")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let st = self.state.lock();
        self.ensure_open(&st)?;
        let rows: Vec<Value> = st
            .docs
            .iter()
            .map(|(id, doc)| {
                let mut row = json!({ "id": id, "key": id, "value": { "rev": doc.rev } });
                if include_docs {
                    row["doc"] = doc.body.clone();
                }
                row
            })
            .collect();
        Ok(json!({ "total_rows": rows.len(), "offset": 0, "rows": rows }))
    }

    fn find(&self, request: &Value) -> Result<Value> {
        let selector = request
            .get("selector")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let query = LiveQuery {
            selector,
            sort: request.get("sort").filter(|s| !s.is_null()).cloned(),
            skip: request.get("skip").and_then(Value::as_u64).map(|n| n as usize),
            limit: request.get("limit").and_then(Value::as_u64).map(|n| n as usize),
        };
        let docs = {
            let st = self.state.lock();
            self.ensure_open(&st)?;
            execute_live_query(&st.bodies(), &query)?
        };
        let docs = match request.get("fields").and_then(Value::as_array) {
            Some(fields) => docs.into_iter().map(|doc| project_fields(doc, fields)).collect(),
            None => docs,
        };
        Ok(json!({ "docs": docs }))
    }

    fn create_index(&self, index: &Value) -> Result<Value> {
        let fields: Vec<String> = index
            .pointer("/index/fields")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(|f| match f {
                        Value::String(name) => Some(name.clone()),
                        Value::Object(obj) => obj.keys().next().cloned(),
                        _ => None,
                    })
                    .collect()
            })
            .filter(|fields: &Vec<String>| !fields.is_empty())
            .ok_or_else(|| DatabaseError::Backend("index.fields is required".to_string()))?;
        let name = index
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("idx-{}", fields.join("-")));

        let mut st = self.state.lock();
        self.ensure_open(&st)?;
        let exists = st.indexes.iter().any(|i| i["name"] == json!(name));
        if !exists {
            st.indexes.push(json!({ "name": name, "fields": fields }));
        }
        Ok(json!({
            "result": if exists { "exists" } else { "created" },
            "id": format!("_design/{name}"),
            "name": name,
        }))
    }

    fn changes(&self, options: &ChangesOptions, sink: ChangesSink) -> Result<Box<dyn FeedHandle>> {
        let live = options.is_live();
        let (feed, backlog, last_seq) = {
            let mut st = self.state.lock();
            self.ensure_open(&st)?;
            let since = match &options.since {
                None => 0,
                Some(Value::String(s)) if s == "now" => st.update_seq,
                Some(v) => v.as_u64().ok_or_else(|| {
                    DatabaseError::Backend(format!("invalid since value: {v}"))
                })?,
            };
            st.next_feed_id += 1;
            let feed = Arc::new(ChangesFeed {
                id: st.next_feed_id,
                include_docs: options.include_docs,
                selector: options.selector.clone(),
                sink,
                cancelled: AtomicBool::new(false),
            });
            let mut backlog = Vec::new();
            for record in st.changes.iter().filter(|c| c.seq > since) {
                if let Some(change) = feed.render(record)? {
                    backlog.push(change);
                }
            }
            if live {
                st.change_feeds.push(Arc::clone(&feed));
            }
            (feed, backlog, st.update_seq)
        };

        for change in &backlog {
            (feed.sink)(ChangesFeedEvent::Change(change.clone()));
        }
        if !live {
            feed.cancelled.store(true, Ordering::SeqCst);
            (feed.sink)(ChangesFeedEvent::Complete(
                json!({ "results": backlog, "last_seq": last_seq }),
            ));
        }

        Ok(Box::new(ChangesFeedHandle {
            feed,
            state: Arc::clone(&self.state),
        }))
    }

    fn info(&self) -> Result<DatabaseInfo> {
        let st = self.state.lock();
        self.ensure_open(&st)?;
        Ok(DatabaseInfo {
            db_name: self.name.clone(),
            doc_count: st.docs.len(),
            update_seq: st.update_seq,
        })
    }

    fn compact(&self, _opts: &Value) -> Result<Value> {
        let st = self.state.lock();
        self.ensure_open(&st)?;
        Ok(json!({ "ok": true }))
    }

    fn view_cleanup(&self) -> Result<Value> {
        let st = self.state.lock();
        self.ensure_open(&st)?;
        Ok(json!({ "ok": true }))
    }

    fn close(&self) -> Result<()> {
        let (feeds, change_feeds, last_seq) = {
            let mut st = self.state.lock();
            st.closed = true;
            let feeds: Vec<Arc<MemoryFeed>> = st.feeds.drain(..).collect();
            let change_feeds: Vec<Arc<ChangesFeed>> = st.change_feeds.drain(..).collect();
            (feeds, change_feeds, st.update_seq)
        };
        for feed in feeds {
            if !feed.cancelled.swap(true, Ordering::SeqCst) {
                (feed.sink)(FeedEvent::Cancelled);
            }
        }
        for feed in change_feeds {
            if !feed.cancelled.swap(true, Ordering::SeqCst) {
                (feed.sink)(ChangesFeedEvent::Complete(
                    json!({ "status": "cancelled", "last_seq": last_seq }),
                ));
            }
        }
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        {
            let mut st = self.state.lock();
            st.docs.clear();
            st.changes.clear();
            st.indexes.clear();
        }
        self.close()
    }

    fn session(&self) -> Option<Arc<dyn SessionProvider>> {
        self.session
            .as_ref()
            .map(|s| Arc::clone(s) as Arc<dyn SessionProvider>)
    }
}

// ============================================================================
// MemorySession
// ============================================================================

struct MemoryUser {
    password: String,
    display_name: Option<String>,
    roles: Vec<String>,
    metadata: Map<String, Value>,
    generation: u64,
}

impl MemoryUser {
    fn new(password: &str, display_name: Option<String>) -> Self {
        Self {
            password: password.to_string(),
            display_name,
            roles: Vec::new(),
            metadata: Map::new(),
            generation: 1,
        }
    }

    /// Bump the record's revision and describe the write.
    fn touch(&mut self, name: &str) -> DocResponse {
        self.generation += 1;
        let body = json!({
            "name": name,
            "roles": self.roles,
            "metadata": self.metadata,
        });
        DocResponse {
            ok: true,
            id: user_doc_id(name),
            rev: make_rev(self.generation, &body),
        }
    }
}

fn user_doc_id(name: &str) -> String {
    format!("org.couchdb.user:{name}")
}

fn user_not_found(name: &str) -> LiveFeedError {
    DatabaseError::NotFound {
        database: "_users".to_string(),
        id: user_doc_id(name),
    }
    .into()
}

fn user_conflict(name: &str) -> LiveFeedError {
    DatabaseError::Conflict {
        database: "_users".to_string(),
        id: user_doc_id(name),
    }
    .into()
}

/// A user table, server admins and a single current session.
#[derive(Default)]
pub struct MemorySession {
    users: Mutex<HashMap<String, MemoryUser>>,
    admins: Mutex<HashMap<String, String>>,
    current: Mutex<Option<UserContext>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user directly (bypassing `signup`).
    pub fn add_user(&self, name: &str, password: &str, display_name: Option<&str>) {
        self.users.lock().insert(
            name.to_string(),
            MemoryUser::new(password, display_name.map(str::to_string)),
        );
    }

    pub fn logged_in_as(&self) -> Option<String> {
        self.current.lock().as_ref().and_then(|c| c.name.clone())
    }

    pub fn has_user(&self, name: &str) -> bool {
        self.users.lock().contains_key(name)
    }

    pub fn is_admin(&self, name: &str) -> bool {
        self.admins.lock().contains_key(name)
    }

    /// Extra metadata stored on a user record by `put_user`.
    pub fn user_metadata(&self, name: &str) -> Option<Map<String, Value>> {
        self.users.lock().get(name).map(|u| u.metadata.clone())
    }
}

#[async_trait]
impl SessionProvider for MemorySession {
    async fn login(&self, username: &str, password: &str) -> Result<UserContext> {
        let admin = self.admins.lock().get(username).cloned();
        let ctx = {
            let users = self.users.lock();
            match users.get(username) {
                Some(user) if user.password == password => UserContext {
                    name: Some(username.to_string()),
                    roles: user.roles.clone(),
                },
                _ if admin.as_deref() == Some(password) => UserContext {
                    name: Some(username.to_string()),
                    roles: vec!["_admin".to_string()],
                },
                _ => {
                    return Err(DatabaseError::Unauthorized(
                        "Name or password is incorrect.".to_string(),
                    )
                    .into())
                }
            }
        };
        *self.current.lock() = Some(ctx.clone());
        Ok(ctx)
    }

    async fn logout(&self) -> Result<()> {
        *self.current.lock() = None;
        Ok(())
    }

    async fn get_session(&self) -> Result<UserContext> {
        Ok(self.current.lock().clone().unwrap_or_default())
    }

    async fn get_user(&self, name: &str) -> Result<UserProfile> {
        let users = self.users.lock();
        users
            .get(name)
            .map(|u| UserProfile {
                name: name.to_string(),
                display_name: u.display_name.clone(),
            })
            .ok_or_else(|| user_not_found(name))
    }

    async fn signup(&self, username: &str, password: &str) -> Result<()> {
        let mut users = self.users.lock();
        if users.contains_key(username) {
            return Err(user_conflict(username));
        }
        users.insert(username.to_string(), MemoryUser::new(password, None));
        Ok(())
    }

    async fn put_user(&self, username: &str, metadata: Value) -> Result<DocResponse> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(username)
            .ok_or_else(|| user_not_found(username))?;
        if let Value::Object(fields) = metadata {
            for (key, value) in fields {
                if key == "displayname" {
                    user.display_name = value.as_str().map(str::to_string);
                }
                user.metadata.insert(key, value);
            }
        }
        Ok(user.touch(username))
    }

    async fn delete_user(&self, username: &str) -> Result<DocResponse> {
        let mut user = self
            .users
            .lock()
            .remove(username)
            .ok_or_else(|| user_not_found(username))?;
        let mut current = self.current.lock();
        if current.as_ref().and_then(|c| c.name.as_deref()) == Some(username) {
            *current = None;
        }
        Ok(user.touch(username))
    }

    async fn change_password(&self, username: &str, password: &str) -> Result<DocResponse> {
        let mut users = self.users.lock();
        let user = users
            .get_mut(username)
            .ok_or_else(|| user_not_found(username))?;
        user.password = password.to_string();
        Ok(user.touch(username))
    }

    async fn change_username(&self, old: &str, new: &str) -> Result<DocResponse> {
        let mut users = self.users.lock();
        if users.contains_key(new) {
            return Err(user_conflict(new));
        }
        let mut user = users.remove(old).ok_or_else(|| user_not_found(old))?;
        let response = user.touch(new);
        users.insert(new.to_string(), user);
        Ok(response)
    }

    async fn sign_up_admin(&self, username: &str, password: &str) -> Result<()> {
        let mut admins = self.admins.lock();
        if admins.contains_key(username) {
            return Err(user_conflict(username));
        }
        admins.insert(username.to_string(), password.to_string());
        Ok(())
    }

    async fn delete_admin(&self, username: &str) -> Result<()> {
        self.admins
            .lock()
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| user_not_found(username))
    }
}

// ============================================================================
// MemoryFactory
// ============================================================================

/// Creates [`MemoryDatabase`] handles; remote names share one session.
#[derive(Default)]
pub struct MemoryFactory {
    session: Arc<MemorySession>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The session shared by every remote handle this factory creates.
    pub fn session(&self) -> Arc<MemorySession> {
        Arc::clone(&self.session)
    }
}

impl DatabaseFactory for MemoryFactory {
    fn open(&self, name: &str) -> Result<Arc<dyn Database>> {
        self.open_with_options(name, &Value::Null)
    }

    fn open_with_options(&self, name: &str, options: &Value) -> Result<Arc<dyn Database>> {
        let db = if is_remote_name(name) {
            MemoryDatabase::remote(name, Arc::clone(&self.session))
        } else {
            MemoryDatabase::new(name)
        };
        Ok(Arc::new(db.with_options(options.clone())))
    }
}
