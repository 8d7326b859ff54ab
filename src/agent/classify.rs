//! Image classifiers that name an insect or leaf disease from a photo.
//!
//! Models run outside this crate. [`HttpImageClassifier`] talks to a
//! classification service exposing `POST /insects` and
//! `POST /leaf_disease` (multipart `file`, plus `crop_name` for leaves);
//! other backends implement [`ImageClassifier`] directly.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::debug;

use crate::core::Crop;
use crate::error::AgentError;

/// Names what an image shows.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Returns the predicted label for `image`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if the image cannot be classified.
    async fn classify(&self, image: &[u8]) -> Result<String, AgentError>;
}

/// One insect classifier and a leaf-disease classifier per crop.
#[derive(Clone)]
pub struct Classifiers {
    /// Insect classifier.
    pub insect: Arc<dyn ImageClassifier>,
    /// Corn leaf disease classifier.
    pub corn: Arc<dyn ImageClassifier>,
    /// Cotton leaf disease classifier.
    pub cotton: Arc<dyn ImageClassifier>,
    /// Soybean leaf disease classifier.
    pub soybean: Arc<dyn ImageClassifier>,
}

impl Classifiers {
    /// Classifiers served by the classification service at `base_url`.
    #[must_use]
    pub fn http(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let client = Client::new();
        let leaf = |crop: Crop| -> Arc<dyn ImageClassifier> {
            Arc::new(
                HttpImageClassifier::new(client.clone(), format!("{base}/leaf_disease"), "Disease")
                    .with_field("crop_name", crop.display_name()),
            )
        };
        Self {
            insect: Arc::new(HttpImageClassifier::new(
                client.clone(),
                format!("{base}/insects"),
                "Insect",
            )),
            corn: leaf(Crop::Corn),
            cotton: leaf(Crop::Cotton),
            soybean: leaf(Crop::Soybean),
        }
    }

    /// Classifiers that fail on use, for when no service is configured.
    #[must_use]
    pub fn disabled() -> Self {
        let disabled: Arc<dyn ImageClassifier> = Arc::new(DisabledClassifier);
        Self {
            insect: Arc::clone(&disabled),
            corn: Arc::clone(&disabled),
            cotton: Arc::clone(&disabled),
            soybean: disabled,
        }
    }

    /// Leaf-disease classifier for `crop`.
    #[must_use]
    pub fn leaf(&self, crop: Crop) -> &dyn ImageClassifier {
        match crop {
            Crop::Corn => self.corn.as_ref(),
            Crop::Cotton => self.cotton.as_ref(),
            Crop::Soybean => self.soybean.as_ref(),
        }
    }
}

impl std::fmt::Debug for Classifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifiers").finish_non_exhaustive()
    }
}

/// Labels resolved from field photos.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observations {
    /// Insect name, if an insect photo was given.
    pub insect: Option<String>,
    /// Leaf disease name, if a leaf photo was given.
    pub leaf: Option<String>,
}

/// Classifies the optional insect and leaf photos.
///
/// # Errors
///
/// Propagates classifier errors.
pub async fn resolve_observations(
    crop: Crop,
    insect_image: Option<&[u8]>,
    leaf_image: Option<&[u8]>,
    classifiers: &Classifiers,
) -> Result<Observations, AgentError> {
    let insect = match insect_image {
        Some(image) => Some(classifiers.insect.classify(image).await?),
        None => None,
    };
    let leaf = match leaf_image {
        Some(image) => Some(classifiers.leaf(crop).classify(image).await?),
        None => None,
    };
    debug!(?insect, ?leaf, crop = crop.as_str(), "resolved observations");
    Ok(Observations { insect, leaf })
}

/// Classifier behind a multipart upload endpoint.
///
/// The image goes in the `file` part; the label is read from the
/// `label_key` field of the JSON reply.
#[derive(Clone)]
pub struct HttpImageClassifier {
    client: Client,
    url: String,
    label_key: &'static str,
    fields: Vec<(&'static str, String)>,
}

impl HttpImageClassifier {
    /// Creates a classifier posting to `url`.
    #[must_use]
    pub fn new(client: Client, url: impl Into<String>, label_key: &'static str) -> Self {
        Self {
            client,
            url: url.into(),
            label_key,
            fields: Vec::new(),
        }
    }

    /// Adds a text field sent with every upload.
    #[must_use]
    pub fn with_field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, value.into()));
        self
    }
}

impl std::fmt::Debug for HttpImageClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpImageClassifier")
            .field("url", &self.url)
            .field("label_key", &self.label_key)
            .finish_non_exhaustive()
    }
}

/// Guesses the upload content type from the file signature.
fn image_mime(image: &[u8]) -> &'static str {
    match image {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "image/jpeg",
    }
}

fn parse_label(body: &str, key: &str) -> Result<String, AgentError> {
    let value: Value = serde_json::from_str(body).map_err(|e| AgentError::ResponseParse {
        message: format!("invalid classifier response: {e}"),
        content: body.chars().take(500).collect(),
    })?;
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AgentError::Classifier {
            message: format!("response has no '{key}' label"),
        })
}

#[async_trait]
impl ImageClassifier for HttpImageClassifier {
    async fn classify(&self, image: &[u8]) -> Result<String, AgentError> {
        let classifier_err = |e: reqwest::Error| AgentError::Classifier {
            message: e.to_string(),
        };
        let part = Part::bytes(image.to_vec())
            .file_name("upload")
            .mime_str(image_mime(image))
            .map_err(classifier_err)?;
        let form = self
            .fields
            .iter()
            .fold(Form::new().part("file", part), |form, (name, value)| {
                form.text(*name, value.clone())
            });

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(classifier_err)?;
        let status = response.status();
        let text = response.text().await.map_err(classifier_err)?;
        if !status.is_success() {
            return Err(AgentError::Classifier {
                message: format!("HTTP {status}: {}", text.chars().take(200).collect::<String>()),
            });
        }

        let label = parse_label(&text, self.label_key)?;
        debug!(url = %self.url, label = %label, "classified image");
        Ok(label)
    }
}

/// Stand-in used when no classification service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledClassifier;

#[async_trait]
impl ImageClassifier for DisabledClassifier {
    async fn classify(&self, _image: &[u8]) -> Result<String, AgentError> {
        Err(AgentError::Classifier {
            message: "a photo was given but CROPWISE_CLASSIFIER_URL is not set".to_string(),
        })
    }
}
