//! Change records: the wire format exchanged between peers.
//!
//! A change record describes one applied put or delete together with the
//! before/after revisions, so the receiver can CAS against its own state:
//!
//! ```json
//! {"op":"put", "_id":"x", "prevRev":"1-aa", "rev":"2-bb", "doc":{...}}
//! {"op":"del", "_id":"x", "prevRev":"2-bb"}
//! ```

use serde::{Deserialize, Serialize};

use crate::doc::Document;
use crate::error::{InvalidPayloadSnafu, Result};
use crate::rev;

/// Operation carried by a change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    /// Store the attached document verbatim.
    Put,
    /// Delete the document.
    Del,
}

/// One replicated mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// The operation.
    pub op: ChangeOp,
    /// Document identifier.
    #[serde(rename = "_id")]
    pub id: String,
    /// Revision the sender observed before the mutation; absent for a
    /// freshly created document.
    #[serde(rename = "prevRev", default, skip_serializing_if = "Option::is_none")]
    pub prev_rev: Option<String>,
    /// Revision assigned by the mutation (put only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Full document after the mutation (put only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,
}

impl ChangeRecord {
    /// Builds a put record from a stored document, which must carry both
    /// `_id` and `_rev` (engine output always does).
    pub fn for_put(doc: Document, prev_rev: Option<String>) -> Result<Self> {
        let id = doc
            .id()
            .ok_or_else(|| {
                InvalidPayloadSnafu { message: "stored document is missing _id".to_string() }
                    .build()
            })?
            .to_string();
        let rev = doc
            .rev()
            .ok_or_else(|| {
                InvalidPayloadSnafu { message: "stored document is missing _rev".to_string() }
                    .build()
            })?
            .to_string();
        Ok(Self { op: ChangeOp::Put, id, prev_rev, rev: Some(rev), doc: Some(doc) })
    }

    /// Builds a delete record.
    pub fn for_del(id: String, prev_rev: Option<String>) -> Self {
        Self { op: ChangeOp::Del, id, prev_rev, rev: None, doc: None }
    }

    /// Receiver-side validation.
    ///
    /// Enforces a non-empty `_id`, well-formed revisions, and for puts
    /// the doc/record consistency invariant (`doc._id == _id`,
    /// `doc._rev == rev`).
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return InvalidPayloadSnafu { message: "_id must be non-empty".to_string() }.fail();
        }
        if let Some(prev) = &self.prev_rev {
            if !rev::is_well_formed(prev) {
                return InvalidPayloadSnafu { message: format!("malformed prevRev: {prev}") }
                    .fail();
            }
        }
        match self.op {
            ChangeOp::Put => {
                let doc = self.doc.as_ref().ok_or_else(|| {
                    InvalidPayloadSnafu { message: "put requires doc".to_string() }.build()
                })?;
                let rev_token = self.rev.as_deref().ok_or_else(|| {
                    InvalidPayloadSnafu { message: "put requires rev".to_string() }.build()
                })?;
                if !rev::is_well_formed(rev_token) {
                    return InvalidPayloadSnafu { message: format!("malformed rev: {rev_token}") }
                        .fail();
                }
                if doc.id() != Some(self.id.as_str()) {
                    return InvalidPayloadSnafu {
                        message: "doc._id must match _id".to_string(),
                    }
                    .fail();
                }
                if doc.rev() != Some(rev_token) {
                    return InvalidPayloadSnafu {
                        message: "doc._rev must match rev".to_string(),
                    }
                    .fail();
                }
            },
            ChangeOp::Del => {},
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::StoreError;

    fn put_record() -> ChangeRecord {
        let doc = Document::from_value(json!({
            "_id": "x",
            "_rev": "2-bbbbbbbb",
            "title": "t",
        }))
        .expect("object");
        ChangeRecord::for_put(doc, Some("1-aaaaaaaa".to_string())).expect("valid doc")
    }

    #[test]
    fn test_put_wire_shape() {
        let json = serde_json::to_value(put_record()).expect("serialize");
        assert_eq!(
            json,
            json!({
                "op": "put",
                "_id": "x",
                "prevRev": "1-aaaaaaaa",
                "rev": "2-bbbbbbbb",
                "doc": {"_id": "x", "_rev": "2-bbbbbbbb", "title": "t"},
            })
        );
    }

    #[test]
    fn test_del_wire_shape_omits_absent_fields() {
        let record = ChangeRecord::for_del("x".to_string(), None);
        let json = serde_json::to_value(record).expect("serialize");
        assert_eq!(json, json!({"op": "del", "_id": "x"}));
    }

    #[test]
    fn test_round_trip() {
        let record = put_record();
        let json = serde_json::to_string(&record).expect("serialize");
        let back: ChangeRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.op, ChangeOp::Put);
        assert_eq!(back.id, "x");
        assert_eq!(back.prev_rev.as_deref(), Some("1-aaaaaaaa"));
        assert!(back.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_mismatched_doc() {
        let mut record = put_record();
        record.rev = Some("3-cccccccc".to_string());
        let err = record.validate().unwrap_err();
        assert!(matches!(err, StoreError::InvalidPayload { .. }));
    }

    #[test]
    fn test_validate_rejects_put_without_doc() {
        let mut record = put_record();
        record.doc = None;
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_malformed_revisions() {
        let mut record = put_record();
        record.prev_rev = Some("bogus".to_string());
        assert!(record.validate().is_err());

        let mut record = ChangeRecord::for_del("x".to_string(), Some("0-00000000".to_string()));
        assert!(record.validate().is_err());
        record.prev_rev = None;
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        let record = ChangeRecord::for_del(String::new(), None);
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_unknown_op_fails_to_decode() {
        let err = serde_json::from_value::<ChangeRecord>(json!({"op": "merge", "_id": "x"}));
        assert!(err.is_err());
    }
}
