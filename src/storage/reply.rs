//! Backend reply normalization
//!
//! The storage API answers in several shapes: a bare value, a value wrapped
//! in `{"data": ...}`, or an error object whose `error` key is either a
//! string (with a sibling `message`) or a nested `{"message": ...}` map.
//! `BackendReply` decodes all of them once so call sites only see `Result`.

use serde::Deserialize;

use crate::error::{Error, Result};

/// Error payload carried under the `error` key
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ErrorBody {
    Detailed { message: String },
    Code(String),
}

/// A decoded backend response
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BackendReply<T> {
    Failure {
        error: ErrorBody,
        #[serde(default)]
        message: Option<String>,
    },
    Wrapped {
        data: T,
    },
    Bare(T),
}

impl<T> BackendReply<T> {
    /// Convert into the payload or a backend error carrying the message text
    pub fn into_result(self) -> Result<T> {
        match self {
            BackendReply::Failure { error, message } => {
                let text = match error {
                    ErrorBody::Detailed { message } => message,
                    ErrorBody::Code(code) => message.unwrap_or(code),
                };
                Err(Error::Backend(text))
            }
            BackendReply::Wrapped { data } => Ok(data),
            BackendReply::Bare(value) => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ObjectEntry;

    fn decode<T: serde::de::DeserializeOwned>(json: &str) -> BackendReply<T> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_bare_and_wrapped_lists_agree() {
        let bare: Vec<ObjectEntry> = decode(r#"[{"name": "a.txt", "metadata": {"size": 3}}]"#)
            .into_result()
            .unwrap();
        let wrapped: Vec<ObjectEntry> =
            decode(r#"{"data": [{"name": "a.txt", "metadata": {"size": 3}}]}"#)
                .into_result()
                .unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare[0].size(), 3);
    }

    #[test]
    fn test_nested_error_message() {
        let reply: BackendReply<serde_json::Value> =
            decode(r#"{"error": {"message": "Bucket not found"}}"#);
        assert!(matches!(reply, BackendReply::Failure { .. }));
        let err = reply.into_result().unwrap_err();
        assert_eq!(err.to_string(), "Bucket not found");
    }

    #[test]
    fn test_flat_error_prefers_message() {
        let reply: BackendReply<serde_json::Value> = decode(
            r#"{"statusCode": "409", "error": "Duplicate", "message": "The resource already exists"}"#,
        );
        let err = reply.into_result().unwrap_err();
        assert_eq!(err.to_string(), "The resource already exists");

        let reply: BackendReply<serde_json::Value> = decode(r#"{"error": "not_found"}"#);
        assert_eq!(reply.into_result().unwrap_err().to_string(), "not_found");
    }

    #[test]
    fn test_null_error_is_not_a_failure() {
        let reply: BackendReply<serde_json::Value> = decode(r#"{"error": null, "name": "b"}"#);
        assert!(matches!(reply, BackendReply::Bare(_)));
        assert_eq!(reply.into_result().unwrap()["name"], "b");
    }

    #[test]
    fn test_error_list_shape_rejected_for_typed_payload() {
        let reply = serde_json::from_str::<BackendReply<Vec<ObjectEntry>>>(r#"{"unexpected": 1}"#);
        assert!(reply.is_err());
    }
}
