//! Catalog operations with input validation and per-viewer favorite flags.

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    Event, EventFilter, EventUpdate, EventView, NewEvent, NewTicketClass, TicketClass,
    TicketClassUpdate,
};
use crate::store::{CatalogStore, StoreError, UserStore};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn CatalogStore>,
    users: Arc<dyn UserStore>,
}

impl Catalog {
    pub fn new(store: Arc<dyn CatalogStore>, users: Arc<dyn UserStore>) -> Self {
        Self { store, users }
    }

    pub async fn create_event(&self, payload: NewEvent) -> CatalogResult<Event> {
        payload.validate().map_err(CatalogError::Validation)?;
        let event = self.store.insert_event(payload.into_event()).await?;
        info!(event_id = %event.id, topic = %event.topic, "Event created");
        Ok(event)
    }

    pub async fn update_event(&self, id: Uuid, update: EventUpdate) -> CatalogResult<Event> {
        update.validate().map_err(CatalogError::Validation)?;
        Ok(self.store.update_event(id, update).await?)
    }

    pub async fn delete_event(&self, id: Uuid) -> CatalogResult<Event> {
        let event = self.store.delete_event(id).await?;
        info!(event_id = %event.id, "Event deleted with its ticket classes");
        Ok(event)
    }

    pub async fn event(&self, id: Uuid, viewer: Option<Uuid>) -> CatalogResult<EventView> {
        let event = self.store.get_event(id).await?;
        let favorites = self.favorites_of(viewer).await?;
        Ok(EventView {
            favorite: favorites.contains(&event.id),
            event,
        })
    }

    pub async fn events(
        &self,
        filter: &EventFilter,
        viewer: Option<Uuid>,
    ) -> CatalogResult<Vec<EventView>> {
        let events = self.store.list_events(filter).await?;
        let favorites = self.favorites_of(viewer).await?;
        Ok(events
            .into_iter()
            .map(|event| EventView {
                favorite: favorites.contains(&event.id),
                event,
            })
            .collect())
    }

    pub async fn count_events(&self) -> CatalogResult<i64> {
        Ok(self.store.count_events().await?)
    }

    pub async fn create_ticket_class(
        &self,
        event_id: Uuid,
        payload: NewTicketClass,
    ) -> CatalogResult<TicketClass> {
        payload.validate().map_err(CatalogError::Validation)?;
        self.store.get_event(event_id).await?;
        let class = self
            .store
            .insert_ticket_class(payload.into_ticket_class(event_id))
            .await?;
        info!(
            ticket_class_id = %class.id,
            event_id = %event_id,
            capacity = class.capacity,
            "Ticket class created"
        );
        Ok(class)
    }

    pub async fn update_ticket_class(
        &self,
        id: Uuid,
        update: TicketClassUpdate,
    ) -> CatalogResult<TicketClass> {
        update.validate().map_err(CatalogError::Validation)?;
        Ok(self.store.update_ticket_class(id, update).await?)
    }

    pub async fn delete_ticket_class(&self, id: Uuid) -> CatalogResult<TicketClass> {
        Ok(self.store.delete_ticket_class(id).await?)
    }

    pub async fn ticket_class(&self, id: Uuid) -> CatalogResult<TicketClass> {
        Ok(self.store.get_ticket_class(id).await?)
    }

    pub async fn ticket_classes(&self, event_id: Uuid) -> CatalogResult<Vec<TicketClass>> {
        self.store.get_event(event_id).await?;
        Ok(self.store.list_ticket_classes(event_id).await?)
    }

    /// Loads the classes referenced by an order, failing on the first unknown id.
    pub async fn ticket_classes_by_id(&self, ids: &[Uuid]) -> CatalogResult<Vec<TicketClass>> {
        let mut classes = Vec::with_capacity(ids.len());
        for id in ids {
            classes.push(self.store.get_ticket_class(*id).await?);
        }
        Ok(classes)
    }

    pub async fn favorite_events(&self, user_id: Uuid) -> CatalogResult<Vec<EventView>> {
        let ids = self.users.favorite_event_ids(user_id).await?;
        let mut views = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.get_event(id).await {
                Ok(event) => views.push(EventView {
                    event,
                    favorite: true,
                }),
                Err(StoreError::NotFound { .. }) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(views)
    }

    async fn favorites_of(&self, viewer: Option<Uuid>) -> CatalogResult<HashSet<Uuid>> {
        match viewer {
            Some(user_id) => Ok(self
                .users
                .favorite_event_ids(user_id)
                .await?
                .into_iter()
                .collect()),
            None => Ok(HashSet::new()),
        }
    }
}
