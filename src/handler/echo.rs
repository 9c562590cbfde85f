use tracing::trace;

use super::{HandlerResult, RequestHandler};
use crate::protocol::Payload;

/// Replies with the request unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl RequestHandler for EchoHandler {
    fn handle_request(&mut self, sender: &str, request: Payload) -> HandlerResult {
        trace!(sender, frames = request.len(), "Echoing request");
        Ok(request)
    }
}
