#![allow(dead_code)]

use std::io::Cursor;
use std::path::PathBuf;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgb, RgbImage};
use pixxor_api::client::ApiClient;
use pixxor_api::{app, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse-42";

/// A server on an ephemeral port backed by in-memory stores.
///
/// Every test gets its own instance, so state never leaks between tests.
pub struct TestServer {
    pub base_url: String,
    pub http: reqwest::Client,
    files: TempDir,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await.context("failed to bind test listener")?;
        let addr = listener.local_addr()?;
        let router = app(AppState::in_memory());

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                eprintln!("test server stopped: {e}");
            }
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            http: reqwest::Client::new(),
            files: tempfile::tempdir()?,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn client(&self, token: Option<String>) -> ApiClient {
        ApiClient::new(self.base_url.clone(), token)
    }

    /// Register and log in, returning the token
    pub async fn login_new(&self, email: &str) -> Result<String> {
        let client = self.client(None);
        client.register(email, PASSWORD).await?;
        Ok(client.login(email, PASSWORD).await?.token)
    }

    /// Register, log in and pick a username
    pub async fn user(&self, name: &str) -> Result<TestUser> {
        let token = self.login_new(&format!("{}@example.com", name)).await?;
        let client = self.client(Some(token.clone()));
        let profile = client.onboard(name, None).await?;
        Ok(TestUser {
            id: profile.id,
            name: name.to_string(),
            token,
            client,
        })
    }

    /// Write a PNG into the temp dir, for uploads through `ApiClient`
    pub fn png_file(&self, filename: &str, width: u32, height: u32) -> Result<PathBuf> {
        let path = self.files.path().join(filename);
        std::fs::write(&path, png_bytes(width, height))?;
        Ok(path)
    }

    pub async fn get(&self, path: &str, token: &str) -> Result<(u16, Value)> {
        let res = self.http.get(self.url(path)).bearer_auth(token).send().await?;
        Ok((res.status().as_u16(), res.json().await?))
    }

    /// POST a single-file multipart body to `path`
    pub async fn upload_raw(
        &self,
        path: &str,
        token: &str,
        album_id: Option<&str>,
        parts: Vec<(&str, Vec<u8>)>,
    ) -> Result<(u16, Value)> {
        let mut form = reqwest::multipart::Form::new();
        for (filename, bytes) in parts {
            form = form.part("file", reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()));
        }
        let mut builder = self.http.post(self.url(path)).bearer_auth(token).multipart(form);
        if let Some(album_id) = album_id {
            builder = builder.header("x-album-id", album_id);
        }
        let res = builder.send().await?;
        Ok((res.status().as_u16(), res.json().await?))
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub name: String,
    pub token: String,
    pub client: ApiClient,
}

/// A small PNG: left half red, right half blue
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([255, 0, 0])
        } else {
            Rgb([0, 0, 255])
        }
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).expect("encode test png");
    out.into_inner()
}

/// `/files/<key>` path of a returned image url
pub fn file_path(url: &str) -> String {
    let key = url.rsplit("/files/").next().unwrap_or_default();
    format!("/files/{}", key)
}
