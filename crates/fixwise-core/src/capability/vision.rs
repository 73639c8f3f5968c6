//! Vision classifier capability.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use fixwise_types::assessment::ItemAssessment;
use fixwise_types::error::VisionError;

/// Classifies a photo of a broken item.
///
/// Implementations live in fixwise-infra (e.g. `HttpVisionClassifier`).
pub trait VisionClassifier: Send + Sync {
    /// Human-readable classifier name for logs.
    fn name(&self) -> &str;

    fn classify(
        &self,
        image: &[u8],
    ) -> impl Future<Output = Result<ItemAssessment, VisionError>> + Send;
}

/// Object-safe version of [`VisionClassifier`].
pub trait VisionClassifierDyn: Send + Sync {
    fn name(&self) -> &str;

    fn classify_boxed<'a>(
        &'a self,
        image: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<ItemAssessment, VisionError>> + Send + 'a>>;
}

impl<T: VisionClassifier> VisionClassifierDyn for T {
    fn name(&self) -> &str {
        VisionClassifier::name(self)
    }

    fn classify_boxed<'a>(
        &'a self,
        image: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = Result<ItemAssessment, VisionError>> + Send + 'a>> {
        Box::pin(self.classify(image))
    }
}

/// Type-erased vision classifier shared by the coordinator and the guide.
#[derive(Clone)]
pub struct BoxVisionClassifier {
    inner: Arc<dyn VisionClassifierDyn>,
}

impl BoxVisionClassifier {
    pub fn new<T: VisionClassifier + 'static>(classifier: T) -> Self {
        Self {
            inner: Arc::new(classifier),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub async fn classify(&self, image: &[u8]) -> Result<ItemAssessment, VisionError> {
        self.inner.classify_boxed(image).await
    }
}

impl std::fmt::Debug for BoxVisionClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxVisionClassifier")
            .field("name", &self.name())
            .finish()
    }
}
