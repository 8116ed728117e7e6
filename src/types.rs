use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 單筆搜尋命中結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    /// 目錄項目 ID
    pub item_id: String,
    /// 相似度分數（由服務端定義，客戶端不設上下限）
    pub score: i64,
    /// 扁平化的 metadata（值一律為字串）
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// 服務端回報的錯誤（非 2xx 回應且帶有可解析的 JSON body）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    /// HTTP 狀態碼
    pub status_code: u16,
    /// HTTP 狀態描述
    pub status_phrase: String,
    /// 服務端錯誤訊息（僅供除錯參考）
    pub message: String,
}

/// 請求種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// 連線 / 時間同步檢查
    Connect,
    /// 以圖搜尋
    Search,
}

/// 成功回應的內容
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// 服務端時間戳（原樣保留的整數，不解讀單位）
    Timestamp(i64),
    /// 搜尋命中列表（可為空）
    Matches(Vec<SearchResultItem>),
}

/// 單一請求的最終結果，三種變體恰好產生其一
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// 請求成功
    Success(ResponsePayload),
    /// 服務端回報錯誤
    ServiceFailure(ServiceError),
    /// 傳輸層失敗（連線失敗、body 無法解析等），沒有結構化錯誤可用
    TransportFailure,
}
