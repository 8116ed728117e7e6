use crate::types::{SearchResultItem, ServiceError};
use serde_json::Value;
use std::collections::HashMap;

/// 解析搜尋結果陣列
///
/// 缺少 `item_id` 或 `score` 的元素會被跳過，不會讓整批解析失敗。
/// 結果順序與輸入一致，空陣列是合法的空結果。
pub fn parse_search_results(raw: &Value) -> Vec<SearchResultItem> {
    raw.as_array()
        .map(|items| items.iter().filter_map(parse_search_item).collect())
        .unwrap_or_default()
}

fn parse_search_item(json: &Value) -> Option<SearchResultItem> {
    let item_id = json.get("item_id")?.as_str()?.to_string();
    let score = json.get("score")?.as_i64()?;

    // metadata 可有可無；值一律攤平成字串
    let mut metadata = HashMap::new();
    if let Some(raw_metadata) = json.get("metadata").and_then(Value::as_object) {
        for (key, value) in raw_metadata {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            metadata.insert(key.clone(), text);
        }
    }

    Some(SearchResultItem {
        item_id,
        score,
        metadata,
    })
}

/// 解析服務端錯誤回應；缺少 `message` 欄位時回傳 None，
/// 呼叫端應將該情況視為傳輸層失敗
pub fn parse_service_error(json: &Value, status_code: u16, status_phrase: &str) -> Option<ServiceError> {
    let message = json.get("message")?.as_str()?.to_string();

    Some(ServiceError {
        status_code,
        status_phrase: status_phrase.to_string(),
        message,
    })
}

/// 解析 `timestamp` 欄位（64 位元整數，原樣保留，不解讀秒/毫秒）
pub fn parse_timestamp(json: &Value) -> Option<i64> {
    json.get("timestamp")?.as_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_search_results() {
        let raw = json!([
            { "item_id": "a", "score": 9, "metadata": { "k": "v" } },
            { "score": 5 }
        ]);

        let items = parse_search_results(&raw);

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_id, "a");
        assert_eq!(items[0].score, 9);
        assert_eq!(items[0].metadata.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_parse_search_results_empty_array() {
        let items = parse_search_results(&json!([]));
        assert!(items.is_empty());
    }

    #[test]
    fn test_parse_search_results_preserves_order() {
        let raw = json!([
            { "item_id": "first", "score": 3 },
            { "item_id": "second", "score": 1 }
        ]);

        let items = parse_search_results(&raw);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_id, "first");
        assert_eq!(items[1].item_id, "second");
    }

    #[test]
    fn test_parse_search_item_without_metadata() {
        let raw = json!([{ "item_id": "a", "score": 0 }]);

        let items = parse_search_results(&raw);

        assert_eq!(items.len(), 1);
        assert!(items[0].metadata.is_empty());
    }

    #[test]
    fn test_metadata_values_are_stringified() {
        let raw = json!([
            { "item_id": "a", "score": 1, "metadata": { "count": 42, "flag": true } }
        ]);

        let items = parse_search_results(&raw);

        assert_eq!(items[0].metadata.get("count").map(String::as_str), Some("42"));
        assert_eq!(items[0].metadata.get("flag").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_parse_service_error() {
        let raw = json!({ "message": "invalid token" });

        let error = parse_service_error(&raw, 401, "Unauthorized").unwrap();

        assert_eq!(error.status_code, 401);
        assert_eq!(error.status_phrase, "Unauthorized");
        assert_eq!(error.message, "invalid token");
    }

    #[test]
    fn test_parse_service_error_missing_message() {
        let raw = json!({ "detail": "something else" });
        assert!(parse_service_error(&raw, 500, "Internal Server Error").is_none());
    }

    #[test]
    fn test_parse_timestamp() {
        let raw = json!({ "timestamp": 1_700_000_000_i64 });
        assert_eq!(parse_timestamp(&raw), Some(1_700_000_000));
    }

    #[test]
    fn test_parse_timestamp_missing() {
        assert_eq!(parse_timestamp(&json!({})), None);
        assert_eq!(parse_timestamp(&json!({ "timestamp": "not a number" })), None);
    }
}
