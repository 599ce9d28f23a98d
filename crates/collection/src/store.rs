use std::sync::Arc;

use foundation::PointId;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use protocol::collection::{
    AddItemRequest, CancelColumnRequest, ClassItemsPage, ClassItemsRequest, Collection,
    CollectionClass, CollectionItem, CollectionRequest, GetCollectionsRequest, ProcessColumnRequest,
    RemoveItemRequest,
};
use protocol::{CodecError, Encoding, FieldType, paths};
use runtime::{EventBus, RefreshSlot, ScheduleDecision, Signal};
use serde::Serialize;
use tracing::{debug, info, warn};
use transport::{ClientConfig, Transport, TransportError, post_json};

use crate::error::CollectionError;

/// Class used when a collection is opened without naming one.
pub const DEFAULT_CLASS: &str = "_default";

/// Runs once after the next successful collection refresh.
pub type Continuation = Box<dyn FnOnce(&Collection) + Send + 'static>;

/// Which page of the open class is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub offset: usize,
    pub limit: usize,
    pub order_by: String,
    pub is_positive: Option<bool>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 10,
            order_by: "-date_added".to_string(),
            is_positive: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectionState {
    pub available_collections: Vec<Collection>,
    pub collection_id: Option<String>,
    pub class_name: Option<String>,
    pub collection: Option<Collection>,
    pub items: Vec<CollectionItem>,
    pub total_items: Option<u64>,
    pub page: PageQuery,
    /// Bumped on every open and close; responses for an older value are dropped.
    generation: u64,
}

impl CollectionState {
    pub fn is_open(&self) -> bool {
        self.collection_id.is_some()
    }

    fn class_or_default(&self) -> String {
        self.class_name.clone().unwrap_or_else(|| DEFAULT_CLASS.to_string())
    }
}

struct Shared<T> {
    transport: T,
    config: ClientConfig,
    events: EventBus,
    state: RwLock<CollectionState>,
    refresh: Mutex<RefreshSlot<Continuation>>,
}

pub struct CollectionStore<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for CollectionStore<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport> CollectionStore<T> {
    pub fn new(transport: T, config: ClientConfig, events: EventBus) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                events,
                state: RwLock::new(CollectionState::default()),
                refresh: Mutex::new(RefreshSlot::new()),
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.shared.transport
    }

    pub fn state(&self) -> RwLockReadGuard<'_, CollectionState> {
        self.shared.state.read()
    }

    pub fn collection(&self) -> Option<Collection> {
        self.shared.state.read().collection.clone()
    }

    /// True while a delayed refresh is waiting to run.
    pub fn refresh_pending(&self) -> bool {
        self.shared.refresh.lock().is_scheduled()
    }

    async fn post_ok<B: Serialize>(&self, path: &str, body: &B) -> Result<(), CollectionError> {
        let bytes = serde_json::to_vec(body).map_err(|e| TransportError::from(CodecError::from(e)))?;
        let response = self.shared.transport.post(path, bytes, Encoding::Json).await?;
        if !response.is_success() {
            return Err(TransportError::Status {
                path: path.to_string(),
                status: response.status,
            }
            .into());
        }
        Ok(())
    }

    pub async fn get_available_collections(
        &self,
        organization_id: Option<&str>,
    ) -> Result<Vec<Collection>, CollectionError> {
        self.shared.state.write().available_collections.clear();
        let body = GetCollectionsRequest {
            related_organization_id: organization_id.map(str::to_string),
        };
        let collections: Option<Vec<Collection>> =
            post_json(&self.shared.transport, paths::GET_COLLECTIONS, &body).await?;
        let collections = collections.unwrap_or_default();
        self.shared.state.write().available_collections = collections.clone();
        Ok(collections)
    }

    /// Opens a collection, closing the current one first.
    pub fn open_collection(&self, collection_id: &str, class_name: Option<&str>) {
        if self.shared.state.read().is_open() {
            self.close_collection();
        }
        {
            let mut state = self.shared.state.write();
            state.generation += 1;
            state.collection_id = Some(collection_id.to_string());
            state.class_name = class_name.map(str::to_string);
            state.items.clear();
            state.total_items = None;
            state.page = PageQuery::default();
            state.collection = state
                .available_collections
                .iter()
                .find(|c| c.id == collection_id)
                .cloned();
        }
        info!(collection_id, "collection opened");
        self.shared.events.emit(Signal::CollectionChanged {
            collection_id: Some(collection_id.to_string()),
            class_name: class_name.map(str::to_string),
        });
    }

    pub fn close_collection(&self) {
        {
            let mut state = self.shared.state.write();
            state.generation += 1;
            state.collection_id = None;
            state.class_name = None;
            state.collection = None;
            state.items.clear();
            state.total_items = None;
        }
        self.shared.refresh.lock().clear();
        self.shared.events.emit(Signal::CollectionChanged {
            collection_id: None,
            class_name: None,
        });
    }

    /// Fetches the open collection and replaces the local copy wholesale.
    ///
    /// Returns `None` when no collection is open or it was closed meanwhile.
    /// While the server reports background work, another refresh is scheduled.
    pub async fn update_collection(
        &self,
        continuation: Option<Continuation>,
    ) -> Result<Option<Collection>, CollectionError> {
        let Some(fresh) = self.replace_from_server().await? else {
            return Ok(None);
        };
        if let Some(continuation) = continuation {
            continuation(&fresh);
        }
        if fresh.has_background_work() {
            self.schedule_update_collection(None);
        }
        Ok(Some(fresh))
    }

    async fn replace_from_server(&self) -> Result<Option<Collection>, CollectionError> {
        let (collection_id, generation) = {
            let state = self.shared.state.read();
            match &state.collection_id {
                Some(id) => (id.clone(), state.generation),
                None => return Ok(None),
            }
        };
        let body = CollectionRequest {
            collection_id: collection_id.clone(),
        };
        let fresh: Collection = post_json(&self.shared.transport, paths::GET_COLLECTION, &body).await?;
        {
            let mut state = self.shared.state.write();
            if state.generation != generation {
                debug!(collection_id, "collection changed while refreshing");
                return Ok(None);
            }
            if let Some(listed) = state.available_collections.iter_mut().find(|c| c.id == fresh.id) {
                *listed = fresh.clone();
            }
            state.collection = Some(fresh.clone());
        }
        self.shared.events.emit(Signal::CollectionUpdated { collection_id });
        Ok(Some(fresh))
    }

    /// Refreshes after the configured interval. At most one refresh is
    /// pending; a continuation given while one is pending runs with it.
    ///
    /// A failed refresh keeps its continuations and retries while the same
    /// collection stays open.
    pub fn schedule_update_collection(&self, continuation: Option<Continuation>) {
        if self.shared.refresh.lock().request(continuation) == ScheduleDecision::Schedule {
            self.spawn_refresh();
        }
    }

    fn spawn_refresh(&self) {
        let store = self.clone();
        let delay = self.shared.config.collection_refresh_interval;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let generation = store.shared.state.read().generation;
            let continuations = store.shared.refresh.lock().complete();
            match store.replace_from_server().await {
                Ok(Some(fresh)) => {
                    for continuation in continuations {
                        continuation(&fresh);
                    }
                    if fresh.has_background_work() {
                        store.schedule_update_collection(None);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    let still_open = {
                        let state = store.shared.state.read();
                        state.collection_id.is_some() && state.generation == generation
                    };
                    if !still_open {
                        warn!(%err, "collection refresh failed after close");
                        return;
                    }
                    warn!(%err, "collection refresh failed, retrying");
                    if store.shared.refresh.lock().requeue(continuations) == ScheduleDecision::Schedule {
                        store.spawn_refresh();
                    }
                }
            }
        });
    }

    pub async fn delete_collection(&self, collection_id: &str) -> Result<(), CollectionError> {
        let body = CollectionRequest {
            collection_id: collection_id.to_string(),
        };
        self.post_ok(paths::DELETE_COLLECTION, &body).await?;
        let was_open = {
            let mut state = self.shared.state.write();
            state.available_collections.retain(|c| c.id != collection_id);
            state.collection_id.as_deref() == Some(collection_id)
        };
        if was_open {
            self.close_collection();
        }
        Ok(())
    }

    /// Changes the shown page and reloads it.
    pub async fn set_page(&self, page: PageQuery) -> Result<(), CollectionError> {
        self.shared.state.write().page = page;
        self.load_class_items().await
    }

    /// Loads the current page of the open class, replacing the shown items.
    pub async fn load_class_items(&self) -> Result<(), CollectionError> {
        let (request, generation) = {
            let state = self.shared.state.read();
            let collection_id = state.collection_id.clone().ok_or(CollectionError::NotOpen)?;
            let request = ClassItemsRequest {
                collection_id,
                class_name: state.class_or_default(),
                is_positive: state.page.is_positive,
                offset: state.page.offset,
                limit: state.page.limit,
                order_by: state.page.order_by.clone(),
            };
            (request, state.generation)
        };
        let page: ClassItemsPage =
            post_json(&self.shared.transport, paths::GET_COLLECTION_CLASS_ITEMS, &request).await?;
        let mut state = self.shared.state.write();
        if state.generation == generation {
            state.items = page.items;
            state.total_items = page.total_count;
        }
        Ok(())
    }

    /// Adds a map item to a class of the open collection.
    ///
    /// The class count is raised right away; the next refresh brings the
    /// server's numbers.
    pub async fn add_item_to_collection(
        &self,
        item: PointId,
        class_name: &str,
        is_positive: bool,
    ) -> Result<CollectionItem, CollectionError> {
        let collection_id = self
            .shared
            .state
            .read()
            .collection_id
            .clone()
            .ok_or(CollectionError::NotOpen)?;
        let body = AddItemRequest {
            collection_id: collection_id.clone(),
            class_name: class_name.to_string(),
            is_positive,
            field_type: FieldType::Identifier,
            value: item,
            weight: 1.0,
        };
        let created: CollectionItem =
            post_json(&self.shared.transport, paths::ADD_ITEM_TO_COLLECTION, &body).await?;
        {
            let mut state = self.shared.state.write();
            if let Some(collection) = state.collection.as_mut() {
                if collection.class_mut(class_name).is_none() {
                    collection.actual_classes.push(CollectionClass {
                        name: class_name.to_string(),
                        ..CollectionClass::default()
                    });
                }
                if let Some(class) = collection.class_mut(class_name) {
                    if is_positive {
                        class.positive_count += 1;
                    } else {
                        class.negative_count += 1;
                    }
                }
            }
        }
        self.shared.events.emit(Signal::CollectionUpdated { collection_id });
        Ok(created)
    }

    /// Removes an item and lowers its class count if the item is on the shown page.
    pub async fn remove_collection_item(&self, collection_item_id: &str) -> Result<(), CollectionError> {
        let body = RemoveItemRequest {
            collection_item_id: collection_item_id.to_string(),
        };
        self.post_ok(paths::REMOVE_COLLECTION_ITEM, &body).await?;
        let collection_id = {
            let mut state = self.shared.state.write();
            let position = state.items.iter().position(|i| i.id == collection_item_id);
            if let Some(removed) = position.map(|p| state.items.remove(p)) {
                state.total_items = state.total_items.map(|t| t.saturating_sub(1));
                if let Some(class) = state
                    .collection
                    .as_mut()
                    .and_then(|c| c.class_mut(&removed.class_name))
                {
                    let count = if removed.is_positive {
                        &mut class.positive_count
                    } else {
                        &mut class.negative_count
                    };
                    *count = count.saturating_sub(1);
                }
            }
            state.collection_id.clone()
        };
        if let Some(collection_id) = collection_id {
            self.shared.events.emit(Signal::CollectionUpdated { collection_id });
        }
        Ok(())
    }

    fn column_identifier(&self, column_id: &str) -> Result<String, CollectionError> {
        let state = self.shared.state.read();
        let collection = state.collection.as_ref().ok_or(CollectionError::NotOpen)?;
        collection
            .columns
            .iter()
            .find(|c| c.id == column_id)
            .map(|c| c.identifier.clone())
            .ok_or_else(|| CollectionError::UnknownColumn(column_id.to_string()))
    }

    /// Starts computing a column for the shown page and watches its progress.
    pub async fn process_column(&self, column_id: &str) -> Result<(), CollectionError> {
        let identifier = self.column_identifier(column_id)?;
        let body = {
            let state = self.shared.state.read();
            ProcessColumnRequest {
                column_id: column_id.to_string(),
                class_name: state.class_or_default(),
                offset: state.page.offset,
                limit: state.page.limit,
                order_by: state.page.order_by.clone(),
            }
        };
        self.post_ok(paths::PROCESS_COLUMN, &body).await?;
        {
            let mut state = self.shared.state.write();
            if let Some(collection) = state.collection.as_mut() {
                if !collection.columns_with_running_processes.contains(&identifier) {
                    collection.columns_with_running_processes.push(identifier);
                }
            }
        }
        self.schedule_update_collection(None);
        Ok(())
    }

    pub async fn cancel_column_processing(&self, column_id: &str) -> Result<(), CollectionError> {
        let identifier = self.column_identifier(column_id)?;
        let body = CancelColumnRequest {
            column_id: column_id.to_string(),
        };
        self.post_ok(paths::CANCEL_COLUMN_PROCESSING, &body).await?;
        {
            let mut state = self.shared.state.write();
            if let Some(collection) = state.collection.as_mut() {
                collection.columns_with_running_processes.retain(|c| *c != identifier);
            }
        }
        self.schedule_update_collection(None);
        Ok(())
    }
}
