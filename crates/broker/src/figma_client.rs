//! A small REST client for the design-file comment/reaction API. Bearer-
//! token auth only; a refresh token is accepted and stored but never used
//! to retry an expired access token, so a non-2xx response, 401 included,
//! always surfaces uniformly as an `upstream` error.

use bridge_protocol::{ErrorKind, ErrorShape};
use secrecy::ExposeSecret;
use serde_json::Value;

use crate::state::FigmaAuth;

const API_BASE: &str = "https://api.figma.com/v1";

pub struct FigmaClient<'a> {
    http: &'a reqwest::Client,
    auth: &'a FigmaAuth,
}

impl<'a> FigmaClient<'a> {
    pub fn new(http: &'a reqwest::Client, auth: &'a FigmaAuth) -> Self {
        Self { http, auth }
    }

    fn access_token(&self) -> Result<&str, ErrorShape> {
        self.auth
            .access_token
            .as_ref()
            .map(|token| token.expose_secret().as_str())
            .ok_or_else(|| ErrorShape::new(ErrorKind::Unauthenticated, "no Figma access token configured"))
    }

    fn resolve_file_key(&self, file_key: Option<&str>) -> Result<String, ErrorShape> {
        file_key
            .map(str::to_string)
            .or_else(|| self.auth.default_file_key.clone())
            .ok_or_else(|| ErrorShape::new(ErrorKind::BadRequest, "fileKey required: none provided and no default configured"))
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ErrorShape> {
        let token = self.access_token()?;
        let url = format!("{API_BASE}{path}");
        let mut builder = self.http.request(method, &url).bearer_auth(token);
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ErrorShape::new(ErrorKind::Upstream, format!("request to {url} failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let excerpt = response.text().await.unwrap_or_default();
            let excerpt: String = excerpt.chars().take(500).collect();
            return Err(ErrorShape::upstream(status, excerpt));
        }

        response
            .json()
            .await
            .map_err(|err| ErrorShape::new(ErrorKind::Upstream, format!("malformed response body: {err}")))
    }

    pub async fn get_comments(&self, file_key: Option<&str>) -> Result<Value, ErrorShape> {
        let file_key = self.resolve_file_key(file_key)?;
        self.request(reqwest::Method::GET, &format!("/files/{file_key}/comments"), None).await
    }

    pub async fn post_comment(
        &self,
        file_key: Option<&str>,
        message: &str,
        client_meta: Option<Value>,
    ) -> Result<Value, ErrorShape> {
        let file_key = self.resolve_file_key(file_key)?;
        let mut body = serde_json::json!({ "message": message });
        if let Some(client_meta) = client_meta {
            body["client_meta"] = client_meta;
        }
        self.request(reqwest::Method::POST, &format!("/files/{file_key}/comments"), Some(body)).await
    }

    pub async fn reply_comment(
        &self,
        file_key: Option<&str>,
        comment_id: &str,
        message: &str,
    ) -> Result<Value, ErrorShape> {
        let file_key = self.resolve_file_key(file_key)?;
        let body = serde_json::json!({ "message": message, "comment_id": comment_id });
        self.request(reqwest::Method::POST, &format!("/files/{file_key}/comments"), Some(body)).await
    }

    pub async fn post_reaction(
        &self,
        file_key: Option<&str>,
        comment_id: &str,
        emoji: &str,
    ) -> Result<Value, ErrorShape> {
        let file_key = self.resolve_file_key(file_key)?;
        let body = serde_json::json!({ "emoji": emoji });
        self.request(
            reqwest::Method::POST,
            &format!("/files/{file_key}/comments/{comment_id}/reactions"),
            Some(body),
        )
        .await
    }

    pub async fn get_reactions(&self, file_key: Option<&str>, comment_id: &str) -> Result<Value, ErrorShape> {
        let file_key = self.resolve_file_key(file_key)?;
        self.request(
            reqwest::Method::GET,
            &format!("/files/{file_key}/comments/{comment_id}/reactions"),
            None,
        )
        .await
    }

    pub async fn delete_reaction(
        &self,
        file_key: Option<&str>,
        comment_id: &str,
        emoji: &str,
    ) -> Result<Value, ErrorShape> {
        let file_key = self.resolve_file_key(file_key)?;
        self.request(
            reqwest::Method::DELETE,
            &format!("/files/{file_key}/comments/{comment_id}/reactions?emoji={emoji}"),
            None,
        )
        .await
    }
}
