//! DatabaseApi: the per-component database handle.
//!
//! CRUD calls are forwarded to the named database, which is opened through
//! the registry on first use. Session and user-admin calls go to the default
//! database's server and require it to be remote.

use std::sync::{Arc, Weak};

use serde_json::{Map, Value};

use crate::{
    database::{
        BulkResult, ChangesEvent, ChangesFeedEvent, ChangesHandle, ChangesOptions, ChangesSink,
        Database, DatabaseRegistry, SessionProvider,
    },
    error::{DatabaseError, Result},
    reactive::ReactiveHost,
    replication::{
        start_replication, ReplicationDirection, ReplicationHandle, ReplicationOptions, Replicator,
    },
    types::{
        Credentials, DatabaseInfo, DocResponse, Document, SessionInfo, SessionUser, UserContext,
    },
};

pub struct DatabaseApi {
    registry: Arc<DatabaseRegistry>,
    replicator: Option<Arc<dyn Replicator>>,
    host: Weak<dyn ReactiveHost>,
}

impl DatabaseApi {
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    pub fn new(
        registry: Arc<DatabaseRegistry>,
        replicator: Option<Arc<dyn Replicator>>,
        host: Weak<dyn ReactiveHost>,
    ) -> Self {
        Self {
            registry,
            replicator,
            host,
        }
    }

    pub fn registry(&self) -> &Arc<DatabaseRegistry> {
        &self.registry
    }

    /// Names of every database opened so far.
    pub fn databases(&self) -> Vec<String> {
        self.registry.names()
    }

    fn db(&self, name: &str) -> Result<Arc<dyn Database>> {
        self.registry.database(name)
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    pub fn put(&self, db: &str, doc: Document, opts: &Value) -> Result<DocResponse> {
        self.db(db)?.put(doc, opts)
    }

    pub fn post(&self, db: &str, doc: Document, opts: &Value) -> Result<DocResponse> {
        self.db(db)?.post(doc, opts)
    }

    pub fn remove(&self, db: &str, doc: &Document, opts: &Value) -> Result<DocResponse> {
        self.db(db)?.remove(doc, opts)
    }

    pub fn get(&self, db: &str, id: &str, opts: &Value) -> Result<Document> {
        self.db(db)?.get(id, opts)
    }

    pub fn query(&self, db: &str, view: &str, opts: &Value) -> Result<Value> {
        self.db(db)?.query(view, opts)
    }

    /// All documents, with their bodies unless `include_docs` is given.
    pub fn all_docs(&self, db: &str, opts: &Value) -> Result<Value> {
        let mut opts = match opts {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        opts.entry("include_docs").or_insert(Value::Bool(true));
        self.db(db)?.all_docs(&Value::Object(opts))
    }

    pub fn find(&self, db: &str, request: &Value) -> Result<Value> {
        self.db(db)?.find(request)
    }

    pub fn create_index(&self, db: &str, index: &Value) -> Result<Value> {
        self.db(db)?.create_index(index)
    }

    /// Write several documents; each gets its own result.
    pub fn bulk_docs(
        &self,
        db: &str,
        docs: Vec<Document>,
        opts: &Value,
    ) -> Result<Vec<BulkResult>> {
        self.db(db)?.bulk_docs(docs, opts)
    }

    pub fn info(&self, db: &str) -> Result<DatabaseInfo> {
        self.db(db)?.info()
    }

    pub fn compact(&self, db: &str, opts: &Value) -> Result<Value> {
        self.db(db)?.compact(opts)
    }

    pub fn view_cleanup(&self, db: &str) -> Result<Value> {
        self.db(db)?.view_cleanup()
    }

    /// Follow a database's changes feed. Live and retrying unless `options`
    /// say otherwise; each event reaches the component as
    /// [`HostEvent::Changes`](crate::reactive::HostEvent::Changes).
    pub fn changes(&self, db: &str, options: ChangesOptions) -> Result<ChangesHandle> {
        let options = options.continuous();
        let database = self.db(db)?;
        let host = self.host.clone();
        let name = db.to_string();
        let sink: ChangesSink = Arc::new(move |event: ChangesFeedEvent| {
            if let Some(host) = host.upgrade() {
                host.emit(ChangesEvent::from_feed(&name, event).into());
            }
        });
        tracing::debug!(database = db, live = options.is_live(), "following changes");
        let handle = database.changes(&options, sink)?;
        Ok(ChangesHandle::new(db, handle))
    }

    pub fn cancel_changes(&self, handle: &ChangesHandle) {
        handle.cancel();
    }

    pub fn close(&self, db: &str) -> Result<()> {
        self.registry.close(db)
    }

    pub fn destroy(&self, db: &str) -> Result<()> {
        self.registry.destroy(db)
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// The default database's session, or `NotRemote` for a local default.
    fn remote_session(&self) -> Result<Arc<dyn SessionProvider>> {
        let db = self.registry.default_database()?;
        if !db.is_remote() {
            return Err(DatabaseError::NotRemote(db.name().to_string()).into());
        }
        db.session().ok_or_else(|| {
            DatabaseError::Unsupported {
                database: db.name().to_string(),
                operation: "session".to_string(),
            }
            .into()
        })
    }

    /// Log in to the default database's server.
    ///
    /// The credentials are kept even when the login fails; they are reused
    /// for remote databases opened later.
    pub async fn connect(&self, username: &str, password: &str) -> Result<SessionInfo> {
        self.registry
            .set_credentials(Credentials::new(username, password));
        let session = self.remote_session()?;
        let user = session.login(username, password).await?;
        tracing::debug!(user = ?user.name, "connected");
        with_profile(session.as_ref(), user).await
    }

    pub async fn disconnect(&self) -> Result<SessionInfo> {
        self.registry.clear_credentials();
        let session = self.remote_session()?;
        session.logout().await?;
        Ok(SessionInfo {
            user: None,
            has_access: false,
        })
    }

    /// Sign up, then log in as the new user.
    pub async fn create_user(&self, username: &str, password: &str) -> Result<SessionInfo> {
        let session = self.remote_session()?;
        session.signup(username, password).await?;
        self.connect(username, password).await
    }

    pub async fn get_session(&self) -> Result<SessionInfo> {
        let session = self.remote_session()?;
        let user = session.get_session().await?;
        if user.name.is_none() {
            return Ok(SessionInfo::default());
        }
        with_profile(session.as_ref(), user).await
    }

    // -----------------------------------------------------------------------
    // User administration
    // -----------------------------------------------------------------------

    /// Merge `metadata` into a user record.
    pub async fn put_user(&self, username: &str, metadata: Value) -> Result<DocResponse> {
        self.remote_session()?.put_user(username, metadata).await
    }

    pub async fn delete_user(&self, username: &str) -> Result<DocResponse> {
        self.remote_session()?.delete_user(username).await
    }

    pub async fn change_password(&self, username: &str, password: &str) -> Result<DocResponse> {
        self.remote_session()?
            .change_password(username, password)
            .await
    }

    pub async fn change_username(&self, old: &str, new: &str) -> Result<DocResponse> {
        self.remote_session()?.change_username(old, new).await
    }

    pub async fn sign_up_admin(&self, username: &str, password: &str) -> Result<()> {
        self.remote_session()?.sign_up_admin(username, password).await
    }

    pub async fn delete_admin(&self, username: &str) -> Result<()> {
        self.remote_session()?.delete_admin(username).await
    }

    // -----------------------------------------------------------------------
    // Replication
    // -----------------------------------------------------------------------

    /// Continuous, retrying, bidirectional replication.
    pub fn sync(
        &self,
        local: &str,
        remote: &str,
        options: ReplicationOptions,
    ) -> Result<ReplicationHandle> {
        self.replicate(local, remote, ReplicationDirection::Sync, options.continuous())
    }

    pub fn push(
        &self,
        local: &str,
        remote: &str,
        options: ReplicationOptions,
    ) -> Result<ReplicationHandle> {
        self.replicate(local, remote, ReplicationDirection::Push, options)
    }

    pub fn pull(
        &self,
        local: &str,
        remote: &str,
        options: ReplicationOptions,
    ) -> Result<ReplicationHandle> {
        self.replicate(local, remote, ReplicationDirection::Pull, options)
    }

    pub fn cancel_sync(&self, handle: &ReplicationHandle) {
        handle.cancel();
    }

    fn replicate(
        &self,
        local: &str,
        remote: &str,
        direction: ReplicationDirection,
        options: ReplicationOptions,
    ) -> Result<ReplicationHandle> {
        start_replication(
            &self.registry,
            self.replicator.as_ref(),
            self.host.clone(),
            local,
            remote,
            direction,
            &options,
        )
    }
}

/// Merge a session user with its profile's display name.
async fn with_profile(session: &dyn SessionProvider, user: UserContext) -> Result<SessionInfo> {
    let name = user.name.unwrap_or_default();
    let profile = session.get_user(&name).await?;
    Ok(SessionInfo {
        user: Some(SessionUser {
            name,
            roles: user.roles,
            display_name: profile.display_name,
        }),
        has_access: true,
    })
}
