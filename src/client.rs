use crate::parser;
use crate::preprocess::{DEFAULT_MIN_EDGE, ImagePreprocessor, ImageSource};
use crate::types::{RequestKind, RequestOutcome, ResponsePayload, ServiceError};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::multipart;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// 回呼介面：每個已發出的請求恰好觸發其中一個方法一次
#[async_trait::async_trait]
pub trait ResponseHandler: Send + Sync {
    /// 請求成功完成
    async fn on_request_completed(&self, kind: RequestKind, payload: ResponsePayload);

    /// 請求失敗；`error` 為 None 表示傳輸層失敗，沒有結構化錯誤可用
    async fn on_request_failed(&self, error: Option<ServiceError>);
}

/// 客戶端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 上傳前縮圖的最短邊長度（像素）
    pub min_edge: u32,
    /// 請求超時（秒）
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            min_edge: DEFAULT_MIN_EDGE,
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_edge(mut self, min_edge: u32) -> Self {
        self.min_edge = min_edge;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// 視覺搜尋客戶端
///
/// 兩種請求（connect、search）都在獨立的背景任務中執行，
/// 呼叫端立即返回；完成後透過 [`ResponseHandler`] 回呼通知。
/// 同一個實例共用一個 HTTP 連線池，多個請求可並行、完成順序不保證。
pub struct RequestClient {
    http: reqwest::Client,
    base_url: String,
    preprocessor: Arc<ImagePreprocessor>,
    handler: Option<Arc<dyn ResponseHandler>>,
}

impl RequestClient {
    /// 建立新的客戶端；`base_url` 為服務端點，對此實例固定不變
    pub fn new(base_url: impl Into<String>, config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("無法建立 HTTP 客戶端")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            preprocessor: Arc::new(ImagePreprocessor::new(config.min_edge)),
            handler: None,
        })
    }

    /// 設定回呼處理器；必須在發出任何請求之前呼叫
    pub fn set_response_handler(&mut self, handler: Arc<dyn ResponseHandler>) {
        self.handler = Some(handler);
    }

    /// 連線檢查：以 URL-encoded form 送出 token，成功時服務端回傳時間戳
    ///
    /// 未設定回呼處理器時不發出請求。
    pub fn connect(&self, token: &str) {
        let Some(handler) = self.handler.clone() else {
            log::warn!("尚未設定回呼處理器，略過 connect 請求");
            return;
        };

        let http = self.http.clone();
        let url = format!("{}/timestamp", self.base_url);
        let token = token.to_string();

        tokio::spawn(async move {
            let outcome = perform_connect(&http, &url, &token).await;
            dispatch(handler, RequestKind::Connect, outcome).await;
        });
    }

    /// 以圖搜尋：先前處理圖片，再以 multipart 上傳
    ///
    /// 前處理失敗時不會發出網路請求，直接以失敗回呼收場。
    /// 未設定回呼處理器時不發出請求。
    pub fn search(&self, token: &str, source: ImageSource) {
        let Some(handler) = self.handler.clone() else {
            log::warn!("尚未設定回呼處理器，略過 search 請求");
            return;
        };

        let http = self.http.clone();
        let url = format!("{}/search", self.base_url);
        let token = token.to_string();
        let preprocessor = Arc::clone(&self.preprocessor);

        tokio::spawn(async move {
            let outcome = perform_search(&http, &url, &token, preprocessor, source).await;
            dispatch(handler, RequestKind::Search, outcome).await;
        });
    }
}

/// 派送回呼：三種結果恰好對應一次呼叫
async fn dispatch(handler: Arc<dyn ResponseHandler>, kind: RequestKind, outcome: RequestOutcome) {
    match outcome {
        RequestOutcome::Success(payload) => handler.on_request_completed(kind, payload).await,
        RequestOutcome::ServiceFailure(error) => handler.on_request_failed(Some(error)).await,
        RequestOutcome::TransportFailure => handler.on_request_failed(None).await,
    }
}

async fn perform_connect(http: &reqwest::Client, url: &str, token: &str) -> RequestOutcome {
    let response = match http.post(url).form(&[("token", token)]).send().await {
        Ok(response) => response,
        Err(e) => {
            log::error!("connect 請求失敗: {}", e);
            return RequestOutcome::TransportFailure;
        }
    };

    let (status, json) = match read_json_body(response).await {
        Some(parsed) => parsed,
        None => return RequestOutcome::TransportFailure,
    };

    if status == StatusCode::OK {
        match parser::parse_timestamp(&json) {
            Some(timestamp) => RequestOutcome::Success(ResponsePayload::Timestamp(timestamp)),
            None => {
                log::error!("回應缺少 timestamp 欄位");
                RequestOutcome::TransportFailure
            }
        }
    } else {
        classify_error(&json, status)
    }
}

async fn perform_search(
    http: &reqwest::Client,
    url: &str,
    token: &str,
    preprocessor: Arc<ImagePreprocessor>,
    source: ImageSource,
) -> RequestOutcome {
    // 圖片解碼 / 縮放是 CPU 密集工作，移到 blocking 執行緒
    let processed =
        match tokio::task::spawn_blocking(move || preprocessor.process(&source)).await {
            Ok(Ok(processed)) => processed,
            Ok(Err(e)) => {
                log::error!("圖片前處理失敗: {:#}", e);
                return RequestOutcome::TransportFailure;
            }
            Err(e) => {
                log::error!("前處理任務中斷: {}", e);
                return RequestOutcome::TransportFailure;
            }
        };

    let image_part = match multipart::Part::bytes(processed.bytes)
        .file_name("image.jpg")
        .mime_str("image/jpeg")
    {
        Ok(part) => part,
        Err(e) => {
            log::error!("建立 multipart 圖片欄位失敗: {}", e);
            return RequestOutcome::TransportFailure;
        }
    };

    let form = multipart::Form::new()
        .text("token", token.to_string())
        .part("image", image_part);

    let response = match http.post(url).multipart(form).send().await {
        Ok(response) => response,
        Err(e) => {
            log::error!("search 請求失敗: {}", e);
            return RequestOutcome::TransportFailure;
        }
    };

    let (status, json) = match read_json_body(response).await {
        Some(parsed) => parsed,
        None => return RequestOutcome::TransportFailure,
    };

    if status == StatusCode::OK {
        if json.is_array() {
            // 空陣列是合法的成功結果
            RequestOutcome::Success(ResponsePayload::Matches(parser::parse_search_results(&json)))
        } else {
            log::error!("搜尋回應不是 JSON 陣列");
            RequestOutcome::TransportFailure
        }
    } else {
        classify_error(&json, status)
    }
}

/// 讀取回應 body 並解析成 JSON；失敗時回傳 None（視為傳輸層失敗）
async fn read_json_body(response: reqwest::Response) -> Option<(StatusCode, Value)> {
    let status = response.status();

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            log::error!("讀取回應失敗: {}", e);
            return None;
        }
    };

    match serde_json::from_str(&body) {
        Ok(json) => Some((status, json)),
        Err(e) => {
            log::error!("回應不是合法 JSON (HTTP {}): {}", status, e);
            None
        }
    }
}

/// 非 200 回應的分類：有 message 欄位則為服務端錯誤，否則視為傳輸層失敗
fn classify_error(json: &Value, status: StatusCode) -> RequestOutcome {
    let phrase = status.canonical_reason().unwrap_or("");

    match parser::parse_service_error(json, status.as_u16(), phrase) {
        Some(error) => RequestOutcome::ServiceFailure(error),
        None => {
            log::error!("錯誤回應缺少 message 欄位 (HTTP {})", status);
            RequestOutcome::TransportFailure
        }
    }
}
