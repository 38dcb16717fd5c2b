use serde::{Deserialize, Serialize};

/// Request body for profile updates.
#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct PictureResponse {
    pub picture: String,
}
