//! The transport seam between the client core and the network.

use async_trait::async_trait;
use std::sync::Arc;

use crate::client::HttpError;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Executes one HTTP request.
///
/// Implementations must report connection-level failures as
/// [`HttpError::Connection`] and return every received response, whatever its
/// status, as `Ok`. Status handling belongs to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        (**self).send(request).await
    }
}
