//! Room inventory served by a remote service.

use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::types::RoomType;
use crate::http::client::ServiceClient;
use crate::resilience::{CallError, CallOptions};
use crate::storage::{RoomInventory, StorageError};

/// `RoomInventory` over `GET {service}/room-types/{id}`.
///
/// Successful lookups are cached under `roomType:<id>` and served degraded
/// while the service is failing.
#[derive(Clone)]
pub struct RemoteRoomInventory {
    client: ServiceClient,
    service: String,
}

impl RemoteRoomInventory {
    pub fn new(client: ServiceClient, service: impl Into<String>) -> Self {
        Self {
            client,
            service: service.into(),
        }
    }
}

#[async_trait]
impl RoomInventory for RemoteRoomInventory {
    async fn room_type(&self, id: Uuid) -> Result<Option<RoomType>, StorageError> {
        let options = CallOptions::new().with_fallback_key(format!("roomType:{}", id));
        let path = format!("room-types/{}", id);

        match self.client.get_json::<RoomType>(&self.service, &path, options).await {
            Ok(outcome) => {
                if outcome.is_degraded() {
                    tracing::warn!(room_type_id = %id, service = %self.service, "Using cached room type");
                }
                Ok(Some(outcome.into_inner()))
            }
            Err(CallError::Terminal { status: Some(404), .. }) => Ok(None),
            Err(e) => Err(StorageError::Unavailable(e)),
        }
    }
}
