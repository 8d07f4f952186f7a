use async_trait::async_trait;
use vision::{VisionClient, VisionError};

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, image: &[u8], target_language: &str) -> Result<String, VisionError>;
}

#[async_trait]
impl Translator for VisionClient {
    async fn translate(&self, image: &[u8], target_language: &str) -> Result<String, VisionError> {
        VisionClient::translate(self, image, target_language).await
    }
}

/// Canned replies for running the server without model credentials.
pub struct DemoTranslator;

#[async_trait]
impl Translator for DemoTranslator {
    async fn translate(&self, image: &[u8], target_language: &str) -> Result<String, VisionError> {
        Ok(format!(
            "[demo] {} byte menu image translated into {}.\nHouse Salad .......... 8.50\nGrilled Fish [UNCERTAIN] .......... 19.00",
            image.len(),
            target_language
        ))
    }
}
