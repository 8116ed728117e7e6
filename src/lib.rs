// 宣告子模組
pub mod client;
pub mod parser;
pub mod preprocess;
pub mod types;

// 重新導出常用項目（讓外部可以用 visual_search_client::XXX 直接存取）
pub use client::{ClientConfig, RequestClient, ResponseHandler};
pub use preprocess::{ImagePreprocessor, ImageSource, ProcessedImage};
pub use types::{RequestKind, RequestOutcome, ResponsePayload, SearchResultItem, ServiceError};
