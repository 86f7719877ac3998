mod http_api;
mod tesseract_cli;

pub use http_api::HttpOcrProvider;
pub use tesseract_cli::TesseractCliProvider;
