use std::collections::HashMap;

use actix_multipart::Multipart;
use futures_util::TryStreamExt;

use crate::{auth::new_id, error::ApiError};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const UPLOAD_DIR: &str = "./uploads";

const ALLOWED_TYPES: [(&str, &str); 4] = [
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

/// Pure check applied before the blob is persisted: mime allow-list plus a
/// hard size ceiling. Returns the extension used for the stored file.
pub fn validate_image(content_type: &str, size: usize) -> Result<&'static str, String> {
    if size > MAX_IMAGE_BYTES {
        return Err("Dosya boyutu çok büyük. Maksimum 5MB olmalıdır.".to_string());
    }
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| "Sadece resim dosyaları yüklenebilir".to_string())
}

#[derive(Debug, Default)]
pub struct ItemForm {
    pub fields: HashMap<String, String>,
    pub image: Option<String>,
}

impl ItemForm {
    pub fn get(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn get_opt(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }
}

/// Collects a menu-item multipart form: text fields into a map, the optional
/// `image` part validated and written under `./uploads`.
pub async fn read_item_form(mut payload: Multipart) -> Result<ItemForm, ApiError> {
    let mut form = ItemForm::default();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|err| ApiError::BadRequest(format!("Dosya yükleme hatası: {err}")))?
    {
        let name = field
            .content_disposition()
            .get_name()
            .unwrap_or_default()
            .to_string();

        let content_type = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|err| ApiError::BadRequest(format!("Dosya yükleme hatası: {err}")))?
        {
            if data.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(ApiError::bad_request(
                    "Dosya boyutu çok büyük. Maksimum 5MB olmalıdır.",
                ));
            }
            data.extend_from_slice(&chunk);
        }

        if name == "image" {
            if data.is_empty() {
                continue;
            }
            let ext = validate_image(&content_type, data.len()).map_err(ApiError::BadRequest)?;
            form.image = Some(store_image(&data, ext)?);
        } else {
            form.fields
                .insert(name, String::from_utf8_lossy(&data).to_string());
        }
    }

    Ok(form)
}

fn store_image(data: &[u8], ext: &str) -> Result<String, ApiError> {
    let filename = format!("{}.{ext}", new_id());
    let path = format!("{UPLOAD_DIR}/{filename}");
    std::fs::create_dir_all(UPLOAD_DIR)
        .and_then(|_| std::fs::write(&path, data))
        .map_err(|err| ApiError::Internal(format!("upload write failed: {err}")))?;
    Ok(format!("/uploads/{filename}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_types_pass() {
        assert_eq!(validate_image("image/jpeg", 1024).unwrap(), "jpg");
        assert_eq!(validate_image("image/png", 1024).unwrap(), "png");
        assert_eq!(validate_image("image/webp", 1024).unwrap(), "webp");
    }

    #[test]
    fn non_image_types_are_rejected() {
        assert!(validate_image("application/pdf", 1024).is_err());
        assert!(validate_image("text/html", 12).is_err());
        assert!(validate_image("", 12).is_err());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        assert!(validate_image("image/png", MAX_IMAGE_BYTES + 1).is_err());
        assert!(validate_image("image/png", MAX_IMAGE_BYTES).is_ok());
    }
}
