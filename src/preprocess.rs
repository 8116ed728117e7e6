use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// JPEG 壓縮品質（百分比）
const PICTURE_COMPRESSION_QUALITY: u8 = 75;

/// 預設的最短邊長度（像素）
pub const DEFAULT_MIN_EDGE: u32 = 240;

/// 圖片來源：檔案路徑或記憶體中的編碼位元組
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// 檔案路徑
    Path(PathBuf),
    /// 記憶體中的編碼圖片（PNG / JPEG 等）
    Bytes(Vec<u8>),
}

/// 前處理完成的圖片：JPEG 位元組加上最終尺寸
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// JPEG 編碼後的位元組
    pub bytes: Vec<u8>,
    /// 最終寬度
    pub width: u32,
    /// 最終高度
    pub height: u32,
}

impl ProcessedImage {
    /// 將處理後的圖片寫入檔案
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.bytes)
            .with_context(|| format!("無法寫入圖片: {}", path.display()))
    }
}

/// 圖片前處理器：上傳前縮小並重新壓縮圖片
///
/// 最短邊會被縮放到 `min_edge`，另一邊依原始比例四捨五入。
pub struct ImagePreprocessor {
    min_edge: u32,
}

impl ImagePreprocessor {
    pub fn new(min_edge: u32) -> Self {
        Self { min_edge }
    }

    /// 處理單張圖片：探測尺寸 → 粗略採樣縮小 → 精確縮放 → JPEG 壓縮
    ///
    /// 解碼失敗（路徑不存在、資料損毀）時整個操作失敗，不會回傳部分結果。
    pub fn process(&self, source: &ImageSource) -> Result<ProcessedImage> {
        // 只讀取邊界，不配置完整像素
        let (width, height) = probe_bounds(source)?;

        let sample_size = resolve_sample_size(width, height, self.min_edge);

        let picture = decode(source)?;

        // 先依採樣因子粗略縮小，降低精確縮放前的像素量
        let coarse = picture.resize_exact(
            (width / sample_size).max(1),
            (height / sample_size).max(1),
            FilterType::Nearest,
        );

        let (desired_width, desired_height) =
            resolve_desired_size(coarse.width(), coarse.height(), self.min_edge);
        let resized = coarse.resize_exact(desired_width, desired_height, FilterType::Triangle);

        let mut bytes = Vec::new();
        let mut encoder =
            JpegEncoder::new_with_quality(Cursor::new(&mut bytes), PICTURE_COMPRESSION_QUALITY);
        encoder
            .encode_image(&resized.to_rgb8())
            .context("JPEG 編碼失敗")?;

        log::debug!(
            "圖片前處理完成: {}x{} -> {}x{} ({} bytes)",
            width,
            height,
            desired_width,
            desired_height,
            bytes.len()
        );

        Ok(ProcessedImage {
            bytes,
            width: desired_width,
            height: desired_height,
        })
    }
}

/// 只讀取圖片尺寸，不做完整解碼
fn probe_bounds(source: &ImageSource) -> Result<(u32, u32)> {
    match source {
        ImageSource::Path(path) => ImageReader::open(path)
            .with_context(|| format!("無法開啟圖片: {}", path.display()))?
            .with_guessed_format()
            .context("無法判斷圖片格式")?
            .into_dimensions()
            .context("無法讀取圖片尺寸"),
        ImageSource::Bytes(bytes) => ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .context("無法判斷圖片格式")?
            .into_dimensions()
            .context("無法讀取圖片尺寸"),
    }
}

fn decode(source: &ImageSource) -> Result<DynamicImage> {
    match source {
        ImageSource::Path(path) => ImageReader::open(path)
            .with_context(|| format!("無法開啟圖片: {}", path.display()))?
            .with_guessed_format()
            .context("無法判斷圖片格式")?
            .decode()
            .context("圖片解碼失敗"),
        ImageSource::Bytes(bytes) => image::load_from_memory(bytes).context("圖片解碼失敗"),
    }
}

/// 依最短邊挑選採樣因子
///
/// 以 2 為步進遞增，直到 `shortest_edge / (sample_size + 2) <= min_edge`。
/// 迴圈至少執行一次，因此即使圖片最短邊已小於 `min_edge`，
/// 採樣因子仍為 2；後續的精確縮放會把尺寸修正回 `min_edge`。
fn resolve_sample_size(width: u32, height: u32, min_edge: u32) -> u32 {
    let shortest_edge = width.min(height);
    let mut sample_size = 0;

    loop {
        sample_size += 2;
        if shortest_edge / (sample_size + 2) <= min_edge {
            break;
        }
    }

    sample_size
}

/// 依最短邊計算目標尺寸，維持原始長寬比
///
/// 較短的一邊固定為 `min_edge`，另一邊依比例四捨五入到整數像素。
fn resolve_desired_size(width: u32, height: u32, min_edge: u32) -> (u32, u32) {
    if width < height {
        let resize_factor = width as f32 / min_edge as f32;
        (min_edge, (height as f32 / resize_factor).round() as u32)
    } else {
        let resize_factor = height as f32 / min_edge as f32;
        ((width as f32 / resize_factor).round() as u32, min_edge)
    }
}
