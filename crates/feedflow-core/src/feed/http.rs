//! HTTP feed.
//!
//! Serves the same layout as a directory feed, plus an `index.json` per
//! package listing its versions. A 404 is treated as "this feed does not
//! have it" rather than as an error.

use std::fmt;

use async_trait::async_trait;
use feedflow_schema::{PackageIdentity, PackageManifest, PackageName, Version, VersionIndex};
use futures::TryStreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use super::{FeedClient, FeedError, PackageMetadata, PackageStream, parse_versions};

#[derive(Clone)]
pub struct HttpFeed {
    client: Client,
    base_url: String,
    credentials: Option<(String, Option<String>)>,
}

impl HttpFeed {
    /// Request headers such as the user agent come from `client`.
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: None,
        }
    }

    /// Authenticate every request with HTTP basic auth.
    pub fn with_credentials(mut self, username: &str, password: Option<&str>) -> Self {
        self.credentials = Some((username.to_string(), password.map(str::to_string)));
        self
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let req = self.client.get(format!("{}/{path}", self.base_url));
        match &self.credentials {
            Some((user, pass)) => req.basic_auth(user, pass.as_ref()),
            None => req,
        }
    }

    /// Send `path`, returning `None` on 404.
    async fn fetch(&self, path: &str) -> Result<Option<Response>, FeedError> {
        let resp = self.get(path).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?))
    }

    fn version_path(identity: &PackageIdentity) -> String {
        format!(
            "{}/{}",
            identity.name.key(),
            identity.version.normalized()
        )
    }
}

impl fmt::Debug for HttpFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFeed")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl FeedClient for HttpFeed {
    fn source(&self) -> &str {
        &self.base_url
    }

    async fn list_versions(&self, name: &PackageName) -> Result<Vec<Version>, FeedError> {
        let Some(resp) = self.fetch(&format!("{}/index.json", name.key())).await? else {
            return Ok(Vec::new());
        };
        let index: VersionIndex = resp.json().await?;
        Ok(parse_versions(
            &self.base_url,
            index.versions.iter().map(String::as_str),
        ))
    }

    async fn metadata(
        &self,
        identity: &PackageIdentity,
        platform: &str,
    ) -> Result<Option<PackageMetadata>, FeedError> {
        let path = format!("{}/package.json", Self::version_path(identity));
        let Some(resp) = self.fetch(&path).await? else {
            return Ok(None);
        };
        let body = resp.bytes().await?;
        let manifest: PackageManifest =
            serde_json::from_slice(&body).map_err(|source| FeedError::Manifest {
                location: format!("{}/{path}", self.base_url),
                source,
            })?;
        let dependencies =
            manifest
                .dependencies_for(platform)
                .map_err(|source| FeedError::Metadata {
                    package: identity.to_string(),
                    source,
                })?;

        Ok(Some(PackageMetadata {
            dependencies,
            listed: manifest.listed,
        }))
    }

    async fn download(&self, identity: &PackageIdentity) -> Result<PackageStream, FeedError> {
        let path = format!(
            "{}/{}",
            Self::version_path(identity),
            identity.archive_name()
        );
        let resp = self
            .fetch(&path)
            .await?
            .ok_or_else(|| FeedError::MissingContent(identity.to_string()))?;
        Ok(Box::pin(resp.bytes_stream().map_err(FeedError::Http)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_list_versions_from_index() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/lib-a/index.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"versions":["1.0.0","2.0.0","1.5.0"]}"#)
            .create_async()
            .await;

        let feed = HttpFeed::new(Client::new(), &server.url());
        let versions = feed.list_versions(&PackageName::new("Lib-A")).await.unwrap();
        assert_eq!(versions.len(), 3);
        assert!(versions.contains(&Version::new(1, 5, 0)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _index = server
            .mock("GET", "/ghost/index.json")
            .with_status(404)
            .create_async()
            .await;
        let _meta = server
            .mock("GET", "/ghost/1.0.0/package.json")
            .with_status(404)
            .create_async()
            .await;

        let feed = HttpFeed::new(Client::new(), &server.url());
        assert!(
            feed.list_versions(&PackageName::new("ghost"))
                .await
                .unwrap()
                .is_empty()
        );
        let id = PackageIdentity::new("ghost", Version::new(1, 0, 0));
        assert!(feed.metadata(&id, "any").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_propagates() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/lib-a/index.json")
            .with_status(500)
            .create_async()
            .await;

        let feed = HttpFeed::new(Client::new(), &server.url());
        assert!(matches!(
            feed.list_versions(&PackageName::new("lib-a")).await,
            Err(FeedError::Http(_))
        ));
    }

    #[tokio::test]
    async fn test_credentials_and_download() {
        let mut server = mockito::Server::new_async().await;
        // "user:secret"
        let mock = server
            .mock("GET", "/lib-a/1.0.0/lib-a.1.0.0.zip")
            .match_header("authorization", "Basic dXNlcjpzZWNyZXQ=")
            .with_status(200)
            .with_body("zipbytes")
            .create_async()
            .await;

        let feed =
            HttpFeed::new(Client::new(), &format!("{}/", server.url())).with_credentials("user", Some("secret"));
        let id = PackageIdentity::new("lib-a", Version::new(1, 0, 0));
        let mut stream = feed.download(&id).await.unwrap();
        let mut body = Vec::new();
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, b"zipbytes");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_user_agent_is_kept() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/lib-a/index.json")
            .match_header("user-agent", "plugin-host/3.1")
            .with_status(200)
            .with_body(r#"{"versions":["1.0.0"]}"#)
            .create_async()
            .await;

        let client = Client::builder().user_agent("plugin-host/3.1").build().unwrap();
        let feed = HttpFeed::new(client, &server.url());
        assert_eq!(feed.list_versions(&PackageName::new("lib-a")).await.unwrap().len(), 1);
        mock.assert_async().await;
    }

    #[test]
    fn test_debug_hides_credentials() {
        let feed = HttpFeed::new(Client::new(), "https://feed.example.com")
            .with_credentials("user", Some("hunter2"));
        assert!(!format!("{feed:?}").contains("hunter2"));
    }
}
