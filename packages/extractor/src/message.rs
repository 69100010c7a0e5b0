//! Request/response contract between the popup and the page-side
//! extractor.

use notion_map_location_models::LocationData;
use serde::{Deserialize, Serialize};

use crate::ExtractError;
use crate::host::PageHost;
use crate::registry::ExtractorRegistry;

/// Requests the page-side extractor understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ContentMessage {
    /// Extract the location shown on the current page.
    #[serde(rename = "getLocationData")]
    GetLocationData,
}

/// Replies sent back to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageResponse {
    /// Successful extraction.
    LocationData(LocationData),
    /// The request was not recognised.
    UnknownMessageType {
        /// Always `"Unknown message type"`.
        error: String,
    },
}

impl MessageResponse {
    fn unknown() -> Self {
        Self::UnknownMessageType {
            error: "Unknown message type".to_owned(),
        }
    }
}

/// Answers one message from the popup.
///
/// Anything that is not a recognised request yields
/// [`MessageResponse::UnknownMessageType`] rather than an error.
///
/// # Errors
///
/// Returns the [`ExtractError`] from a failed extraction.
pub async fn handle_message(
    registry: &ExtractorRegistry,
    page: &dyn PageHost,
    message: &serde_json::Value,
) -> Result<MessageResponse, ExtractError> {
    let Ok(request) = serde_json::from_value::<ContentMessage>(message.clone()) else {
        log::debug!("Ignoring unrecognised message: {message}");
        return Ok(MessageResponse::unknown());
    };

    match request {
        ContentMessage::GetLocationData => {
            let data = registry.extract(page).await?;
            Ok(MessageResponse::LocationData(data))
        }
    }
}
