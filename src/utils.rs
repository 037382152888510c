use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub fn des_from_str<T: DeserializeOwned>(string: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(string)
}

pub fn ser_to_str<T: Serialize>(t: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(t)
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub path: String,
    pub message: String,
    pub status_code: u16,
}

pub fn api_error(path: &str, message: impl Into<String>, status_code: u16) -> String {
    let error = ApiError {
        path: path.to_string(),
        message: message.into(),
        status_code,
    };
    ser_to_str(&error).unwrap_or_default()
}
