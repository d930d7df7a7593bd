//! Resource parsing: flat `token → id` maps and nested tokenizer descriptors.

use serde_json::{Map, Value as Json};

use crate::error::ResourceError;

/// Raw entries pulled out of a resource, before any invariant checks.
#[derive(Debug, Default)]
pub(super) struct RawVocab {
    pub(super) base: Vec<(String, i32)>,
    pub(super) added: Vec<(String, i32)>,
}

/// Decide the shape structurally: a flat map first, then `model.vocab`.
pub(super) fn extract(root: &Json) -> Result<RawVocab, ResourceError> {
    let obj = root
        .as_object()
        .ok_or_else(|| ResourceError::Shape("top level is not a JSON object".into()))?;

    if obj.values().all(is_integer) {
        tracing::debug!("📖 [vocab] flat map ({} entries)", obj.len());
        return Ok(RawVocab {
            base: read_id_map(obj)?,
            added: Vec::new(),
        });
    }

    if let Some(model) = obj.get("model") {
        let vocab = model
            .get("vocab")
            .ok_or_else(|| ResourceError::Shape("descriptor has no model.vocab".into()))?
            .as_object()
            .ok_or_else(|| ResourceError::Shape("model.vocab is not a token→id object".into()))?;
        tracing::debug!("📖 [vocab] descriptor model.vocab ({} entries)", vocab.len());
        return Ok(RawVocab {
            base: read_id_map(vocab)?,
            added: read_added_tokens(obj.get("added_tokens"))?,
        });
    }

    // Neither shape: surface the first offending flat entry.
    read_id_map(obj).map(|base| RawVocab {
        base,
        added: Vec::new(),
    })
}

fn is_integer(v: &Json) -> bool {
    v.is_i64() || v.is_u64()
}

fn read_id_map(map: &Map<String, Json>) -> Result<Vec<(String, i32)>, ResourceError> {
    map.iter()
        .map(|(token, v)| Ok((token.clone(), read_id(token, v)?)))
        .collect()
}

fn read_id(token: &str, v: &Json) -> Result<i32, ResourceError> {
    if let Some(big) = v.as_u64().filter(|_| v.as_i64().is_none()) {
        return Err(ResourceError::Shape(format!(
            "id {big} for {token:?} does not fit in i32"
        )));
    }
    let Some(id) = v.as_i64() else {
        return Err(ResourceError::NonIntegerId {
            token: token.to_string(),
        });
    };
    if id < 0 {
        return Err(ResourceError::NegativeId {
            token: token.to_string(),
            id,
        });
    }
    i32::try_from(id)
        .map_err(|_| ResourceError::Shape(format!("id {id} for {token:?} does not fit in i32")))
}

/// `added_tokens: [{ "id": 0, "content": "<unk>", ... }, ...]`; absent means none.
fn read_added_tokens(v: Option<&Json>) -> Result<Vec<(String, i32)>, ResourceError> {
    let Some(v) = v else {
        return Ok(Vec::new());
    };
    let arr = v
        .as_array()
        .ok_or_else(|| ResourceError::Shape("added_tokens is not an array".into()))?;

    arr.iter()
        .map(|entry| {
            let content = entry
                .get("content")
                .and_then(Json::as_str)
                .ok_or_else(|| ResourceError::Shape("added token without string content".into()))?;
            let id = entry.get("id").ok_or_else(|| {
                ResourceError::Shape(format!("added token {content:?} has no id"))
            })?;
            Ok((content.to_string(), read_id(content, id)?))
        })
        .collect()
}
