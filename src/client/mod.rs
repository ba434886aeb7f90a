//! HTTP client for the pixxor API, used by the `pixxor` CLI.

pub mod paginator;

use reqwest::{multipart, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

use crate::api::format::{AlbumDetail, AlbumSummary, AuthToken, ImageDetail, MemberView, UploadResult, UserProfile};
use crate::database::models::{Album, AlbumRole, Image};
use crate::effects::Effects;
use crate::pagination::Page;

pub use paginator::Paginator;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} ({code}, HTTP {status})")]
    Api {
        status: u16,
        code: String,
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Not logged in. Run `pixxor auth login` first")]
    NotLoggedIn,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
    code: Option<String>,
    field_errors: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct CreatedAlbum {
    album_id: Uuid,
}

#[derive(Serialize)]
struct EffectsBody {
    #[serde(flatten)]
    effects: Effects,
    #[serde(skip_serializing_if = "Option::is_none")]
    album_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        if self.token.is_none() {
            return Err(ClientError::NotLoggedIn);
        }
        Ok(self.request(method, path))
    }

    /// Send and unwrap the `{success, data}` envelope
    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        let envelope: Envelope<T> = serde_json::from_slice(&body).map_err(|e| {
            ClientError::Decode(format!("HTTP {}: {} ({})", status, String::from_utf8_lossy(&body), e))
        })?;

        if !envelope.success || !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                code: envelope.code.unwrap_or_else(|| "UNKNOWN".to_string()),
                message: envelope.error.unwrap_or_else(|| status.to_string()),
                field_errors: envelope.field_errors,
            });
        }

        envelope
            .data
            .ok_or_else(|| ClientError::Decode("response has no data".to_string()))
    }

    /// For 204 responses
    async fn send_empty(builder: RequestBuilder) -> Result<(), ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await?;
        let envelope: Envelope<serde_json::Value> = serde_json::from_slice(&body)
            .map_err(|_| ClientError::Decode(format!("HTTP {}: {}", status, String::from_utf8_lossy(&body))))?;
        Err(ClientError::Api {
            status: status.as_u16(),
            code: envelope.code.unwrap_or_else(|| "UNKNOWN".to_string()),
            message: envelope.error.unwrap_or_else(|| status.to_string()),
            field_errors: envelope.field_errors,
        })
    }

    fn page_path(path: &str, cursor: Option<&str>, limit: Option<u32>) -> String {
        let mut url = match url::Url::parse("http://localhost") {
            Ok(base) => base,
            Err(_) => return path.to_string(),
        };
        url.set_path(path);
        {
            let mut query = url.query_pairs_mut();
            if let Some(cursor) = cursor {
                query.append_pair("cursor", cursor);
            }
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
        }
        match url.query() {
            Some(q) if !q.is_empty() => format!("{}?{}", path, q),
            _ => path.to_string(),
        }
    }

    // Auth & account

    pub async fn register(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let builder = self
            .request(Method::POST, "/auth/register")
            .json(&json!({ "email": email, "password": password }));
        Self::send(builder).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthToken, ClientError> {
        let builder = self
            .request(Method::POST, "/auth/login")
            .json(&json!({ "email": email, "password": password }));
        Self::send(builder).await
    }

    pub async fn whoami(&self) -> Result<UserProfile, ClientError> {
        Self::send(self.authed(Method::GET, "/api/auth/whoami")?).await
    }

    pub async fn onboard(&self, name: &str, avatar_url: Option<&str>) -> Result<UserProfile, ClientError> {
        let builder = self
            .authed(Method::PUT, "/api/account/onboarding")?
            .json(&json!({ "name": name, "avatar_url": avatar_url }));
        Self::send(builder).await
    }

    // Albums

    pub async fn list_albums(&self, cursor: Option<&str>, limit: Option<u32>) -> Result<Page<AlbumSummary>, ClientError> {
        let path = Self::page_path("/api/albums", cursor, limit);
        Self::send(self.authed(Method::GET, &path)?).await
    }

    /// Every album of the current user, page by page
    pub fn albums_paginator(&self, limit: u32) -> Paginator<AlbumSummary, ClientError> {
        let client = self.clone();
        Paginator::new(limit as usize, move |cursor: Option<String>| {
            let client = client.clone();
            async move { client.list_albums(cursor.as_deref(), Some(limit)).await }
        })
    }

    pub async fn create_album(&self, name: &str, user_ids: &[Uuid]) -> Result<Uuid, ClientError> {
        let builder = self
            .authed(Method::POST, "/api/albums")?
            .json(&json!({ "name": name, "user_ids": user_ids }));
        let created: CreatedAlbum = Self::send(builder).await?;
        Ok(created.album_id)
    }

    pub async fn get_album(&self, album_id: Uuid) -> Result<AlbumDetail, ClientError> {
        Self::send(self.authed(Method::GET, &format!("/api/albums/{}", album_id))?).await
    }

    pub async fn rename_album(&self, album_id: Uuid, name: &str) -> Result<Album, ClientError> {
        let builder = self
            .authed(Method::PATCH, &format!("/api/albums/{}", album_id))?
            .json(&json!({ "name": name }));
        Self::send(builder).await
    }

    pub async fn delete_album(&self, album_id: Uuid) -> Result<(), ClientError> {
        Self::send_empty(self.authed(Method::DELETE, &format!("/api/albums/{}", album_id))?).await
    }

    pub async fn invite_members(&self, album_id: Uuid, names: &[String]) -> Result<Vec<MemberView>, ClientError> {
        let builder = self
            .authed(Method::POST, &format!("/api/albums/{}/members", album_id))?
            .json(&json!({ "names": names }));
        Self::send(builder).await
    }

    pub async fn set_member_role(&self, album_id: Uuid, user_id: Uuid, role: AlbumRole) -> Result<MemberView, ClientError> {
        let builder = self
            .authed(Method::PUT, &format!("/api/albums/{}/members/{}", album_id, user_id))?
            .json(&json!({ "role": role }));
        Self::send(builder).await
    }

    pub async fn remove_member(&self, album_id: Uuid, user_id: Uuid) -> Result<(), ClientError> {
        let path = format!("/api/albums/{}/members/{}", album_id, user_id);
        Self::send_empty(self.authed(Method::DELETE, &path)?).await
    }

    // Images

    pub async fn list_album_images(
        &self,
        album_id: Uuid,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<Image>, ClientError> {
        let path = Self::page_path(&format!("/api/albums/{}/images", album_id), cursor, limit);
        Self::send(self.authed(Method::GET, &path)?).await
    }

    pub fn images_paginator(&self, album_id: Uuid, limit: u32) -> Paginator<Image, ClientError> {
        let client = self.clone();
        Paginator::new(limit as usize, move |cursor: Option<String>| {
            let client = client.clone();
            async move { client.list_album_images(album_id, cursor.as_deref(), Some(limit)).await }
        })
    }

    /// Upload a file; without an album it lands in "Unsorted"
    pub async fn upload(&self, album_id: Option<Uuid>, path: &Path) -> Result<UploadResult, ClientError> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes).file_name(filename));

        let builder = match album_id {
            Some(album_id) => self
                .authed(Method::POST, "/api/uploads")?
                .header("x-album-id", album_id.to_string()),
            None => self.authed(Method::POST, "/api/uploads/unsorted")?,
        };
        Self::send(builder.multipart(form)).await
    }

    pub async fn get_image(&self, image_id: Uuid) -> Result<ImageDetail, ClientError> {
        Self::send(self.authed(Method::GET, &format!("/api/images/{}", image_id))?).await
    }

    pub async fn delete_image(&self, image_id: Uuid) -> Result<(), ClientError> {
        Self::send_empty(self.authed(Method::DELETE, &format!("/api/images/{}", image_id))?).await
    }

    pub async fn apply_effects(
        &self,
        image_id: Uuid,
        effects: Effects,
        album_id: Option<Uuid>,
    ) -> Result<UploadResult, ClientError> {
        let builder = self
            .authed(Method::POST, &format!("/api/images/{}/effects", image_id))?
            .json(&EffectsBody { effects, album_id });
        Self::send(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_paths_encode_cursor() {
        assert_eq!(ApiClient::page_path("/api/albums", None, None), "/api/albums");
        assert_eq!(
            ApiClient::page_path("/api/albums", Some("ab=c"), Some(5)),
            "/api/albums?cursor=ab%3Dc&limit=5"
        );
    }

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::new("http://localhost:3000/", None);
        assert_eq!(client.base_url(), "http://localhost:3000");
    }

    #[tokio::test]
    async fn protected_calls_need_a_token() {
        let client = ApiClient::new("http://localhost:9", None);
        assert!(matches!(client.whoami().await, Err(ClientError::NotLoggedIn)));
    }
}
