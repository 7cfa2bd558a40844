/// Public URL layout of the object storage bucket that holds activity images.
#[derive(Debug, Clone)]
pub struct ObjectStorage {
    endpoint: String,
    bucket: String,
}

impl ObjectStorage {
    pub fn new(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into().trim_matches('/').to_string(),
        }
    }

    /// `{endpoint}/{bucket}/{object}`
    pub fn public_url(&self, object: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            self.bucket,
            object.trim_start_matches('/')
        )
    }

    /// Display URL for a stored image reference. Empty references stay empty and
    /// absolute URLs are passed through untouched.
    pub fn display_url(&self, image_ref: &str) -> String {
        if image_ref.is_empty()
            || image_ref.starts_with("http://")
            || image_ref.starts_with("https://")
        {
            return image_ref.to_string();
        }
        self.public_url(image_ref)
    }
}
