use serde::{Deserialize, Serialize};

/// Request body for both registration and login.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// `{"message":"success"}`, the body of every bodiless success.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn success() -> Self {
        Self { message: "success" }
    }
}
