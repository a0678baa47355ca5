//! Report persistence
//!
//! Saves the serialized report to the local file system or to an Azure Blob
//! Storage container.

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::http::{HttpClient, HttpRequest, HttpResponse};

type HmacSha256 = Hmac<Sha256>;

/// Blob service REST API version used for requests
const STORAGE_API_VERSION: &str = "2021-08-06";

/// Write `text` to `dir/file_name`, creating `dir` if needed
pub async fn save_to_file(dir: impl AsRef<Path>, file_name: &str, text: &str) -> Result<PathBuf> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let path = dir.join(file_name);
    tokio::fs::write(&path, text)
        .await
        .with_context(|| format!("Failed to write results file: {}", path.display()))?;

    info!("Results saved to file: {}", path.display());
    Ok(path)
}

/// Azure Blob Storage account credentials
#[derive(Clone)]
pub struct BlobStorage {
    account: String,
    key: Vec<u8>,
    endpoint: String,
    client: HttpClient,
}

impl std::fmt::Debug for BlobStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStorage")
            .field("account", &self.account)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl BlobStorage {
    /// `key` is the base64 account key as shown in the Azure portal
    pub fn new(account: impl Into<String>, key: &str) -> Result<Self> {
        let account = account.into();
        let key = STANDARD
            .decode(key.trim())
            .context("Storage account key is not valid base64")?;
        let endpoint = format!("https://{account}.blob.core.windows.net");

        Ok(Self {
            account,
            key,
            endpoint,
            client: HttpClient::with_timeout(60)?,
        })
    }

    /// Use a custom blob endpoint, e.g. an Azurite emulator
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Create `container` if needed and upload `text` as block blob `blob`
    pub async fn save(&self, container: &str, blob: &str, text: &str) -> Result<()> {
        self.create_container_if_not_exists(container).await?;
        self.put_block_blob(container, blob, text).await?;

        info!("Results saved to blob storage: {}/{}", container, blob);
        Ok(())
    }

    async fn create_container_if_not_exists(&self, container: &str) -> Result<()> {
        let request = self.signed_request(
            HttpRequest::put(format!("{}/{}?restype=container", self.endpoint, container))
                .body(""),
            &format!("/{container}"),
            &[("restype", "container")],
            Utc::now(),
        )?;

        let response = self.client.send(request).await?;
        match response.status_code {
            201 => debug!("Created container {}", container),
            409 => debug!("Container {} already exists", container),
            _ => return Err(storage_error("create container", &response)),
        }
        Ok(())
    }

    async fn put_block_blob(&self, container: &str, blob: &str, text: &str) -> Result<()> {
        let request = self.signed_request(
            HttpRequest::put(format!("{}/{}/{}", self.endpoint, container, blob))
                .header("Content-Type", "application/xml")
                .header("x-ms-blob-type", "BlockBlob")
                .body(text),
            &format!("/{container}/{blob}"),
            &[],
            Utc::now(),
        )?;

        let response = self.client.send(request).await?;
        if response.status_code != 201 {
            return Err(storage_error("upload blob", &response));
        }
        Ok(())
    }

    /// Path prefix of a path-style endpoint such as Azurite's
    /// `http://127.0.0.1:10000/devstoreaccount1`; empty for the public one
    fn endpoint_path(&self) -> &str {
        let without_scheme = self
            .endpoint
            .split_once("://")
            .map_or(self.endpoint.as_str(), |(_, rest)| rest);
        without_scheme
            .find('/')
            .map_or("", |slash| &without_scheme[slash..])
    }

    /// Add date, version and SharedKey authorization headers to `request`
    fn signed_request(
        &self,
        request: HttpRequest,
        resource_path: &str,
        query: &[(&str, &str)],
        now: DateTime<Utc>,
    ) -> Result<HttpRequest> {
        let request = request
            .header("x-ms-date", now.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
            .header("x-ms-version", STORAGE_API_VERSION);

        let string_to_sign = self.string_to_sign(&request, resource_path, query);
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| anyhow::anyhow!("Invalid storage account key length"))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        Ok(request.header(
            "Authorization",
            format!("SharedKey {}:{}", self.account, signature),
        ))
    }

    fn string_to_sign(
        &self,
        request: &HttpRequest,
        resource_path: &str,
        query: &[(&str, &str)],
    ) -> String {
        let header = |name: &str| {
            request
                .headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
                .unwrap_or("")
        };

        let content_length = match request.body.as_deref().map(str::len) {
            None | Some(0) => String::new(),
            Some(len) => len.to_string(),
        };

        let mut ms_headers: Vec<(String, &str)> = request
            .headers
            .iter()
            .filter(|(k, _)| k.to_ascii_lowercase().starts_with("x-ms-"))
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
            .collect();
        ms_headers.sort();

        let mut canonical_query: Vec<(String, &str)> =
            query.iter().map(|(k, v)| (k.to_ascii_lowercase(), *v)).collect();
        canonical_query.sort();

        let mut out = String::new();
        for part in [
            request.method.as_str(),
            header("Content-Encoding"),
            header("Content-Language"),
            content_length.as_str(),
            header("Content-MD5"),
            header("Content-Type"),
            "", // Date, superseded by x-ms-date
            header("If-Modified-Since"),
            header("If-Match"),
            header("If-None-Match"),
            header("If-Unmodified-Since"),
            header("Range"),
        ] {
            out.push_str(part);
            out.push('\n');
        }
        for (name, value) in &ms_headers {
            out.push_str(&format!("{name}:{value}\n"));
        }
        out.push_str(&format!(
            "/{}{}{}",
            self.account,
            self.endpoint_path(),
            resource_path
        ));
        for (name, value) in &canonical_query {
            out.push_str(&format!("\n{name}:{value}"));
        }
        out
    }
}

fn storage_error(action: &str, response: &HttpResponse) -> anyhow::Error {
    anyhow::anyhow!(
        "Blob storage failed to {}: HTTP {}: {}",
        action,
        response.status_code,
        response.body.chars().take(500).collect::<String>()
    )
}

/// Where the final report goes
#[derive(Clone, Debug, Default)]
pub struct ReportTargets {
    pub results_dir: Option<PathBuf>,
    pub blob: Option<BlobTarget>,
    pub file_name: String,
}

#[derive(Clone, Debug)]
pub struct BlobTarget {
    pub storage: BlobStorage,
    pub container: String,
}

impl ReportTargets {
    pub fn is_empty(&self) -> bool {
        self.results_dir.is_none() && self.blob.is_none()
    }

    /// Save `text` to every configured target, returns whether anything was saved
    pub async fn save(&self, text: &str) -> Result<bool> {
        if self.file_name.trim().is_empty() {
            bail!("Results file name is empty");
        }

        if let Some(dir) = &self.results_dir {
            save_to_file(dir, &self.file_name, text).await?;
        }
        if let Some(target) = &self.blob {
            target
                .storage
                .save(&target.container, &self.file_name, text)
                .await?;
        }

        Ok(!self.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn storage() -> BlobStorage {
        BlobStorage::new("myaccount", &STANDARD.encode(b"secret-key")).unwrap()
    }

    #[tokio::test]
    async fn test_save_to_file_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("reports/nightly");

        let path = save_to_file(&nested, "tests-results.xml", "<testsuite/>")
            .await
            .unwrap();

        assert_eq!(path, nested.join("tests-results.xml"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<testsuite/>");
    }

    #[test]
    fn test_rejects_invalid_key() {
        assert!(BlobStorage::new("myaccount", "not base64!").is_err());
    }

    #[test]
    fn test_string_to_sign_for_container_create() {
        let storage = storage();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let request = storage
            .signed_request(
                HttpRequest::put("https://myaccount.blob.core.windows.net/results?restype=container")
                    .body(""),
                "/results",
                &[("restype", "container")],
                now,
            )
            .unwrap();

        let expected = "PUT\n\n\n\n\n\n\n\n\n\n\n\n\
            x-ms-date:Tue, 02 Jan 2024 03:04:05 GMT\n\
            x-ms-version:2021-08-06\n\
            /myaccount/results\n\
            restype:container";
        assert_eq!(
            storage.string_to_sign(&request, "/results", &[("restype", "container")]),
            expected
        );

        let authorization = request.headers.get("Authorization").unwrap();
        assert!(authorization.starts_with("SharedKey myaccount:"));
    }

    #[test]
    fn test_path_style_endpoint_is_part_of_the_signed_resource() {
        let storage = BlobStorage::new("devstoreaccount1", &STANDARD.encode(b"secret-key"))
            .unwrap()
            .with_endpoint("http://127.0.0.1:10000/devstoreaccount1/");
        let request = HttpRequest::put("http://127.0.0.1:10000/devstoreaccount1/results/r.xml")
            .body("<testsuite/>");

        let signed = storage.string_to_sign(&request, "/results/r.xml", &[]);

        assert_eq!(
            signed.lines().last(),
            Some("/devstoreaccount1/devstoreaccount1/results/r.xml")
        );
        assert_eq!(self::storage().endpoint_path(), "");
    }

    #[test]
    fn test_string_to_sign_for_blob_upload() {
        let storage = storage();
        let request = HttpRequest::put("https://x/results/tests-results.xml")
            .header("Content-Type", "application/xml")
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", STORAGE_API_VERSION)
            .body("<testsuite/>");

        let signed = storage.string_to_sign(&request, "/results/tests-results.xml", &[]);
        let lines: Vec<_> = signed.lines().collect();

        assert_eq!(lines[0], "PUT");
        assert_eq!(lines[3], "12");
        assert_eq!(lines[5], "application/xml");
        assert_eq!(lines[12], "x-ms-blob-type:BlockBlob");
        assert_eq!(lines[13], "x-ms-version:2021-08-06");
        assert_eq!(lines[14], "/myaccount/results/tests-results.xml");
    }

    #[test]
    fn test_custom_endpoint() {
        let storage = storage().with_endpoint("http://127.0.0.1:10000/devstoreaccount1/");
        assert_eq!(storage.endpoint, "http://127.0.0.1:10000/devstoreaccount1");
    }

    #[tokio::test]
    async fn test_report_targets() {
        let dir = tempfile::tempdir().unwrap();
        let none = ReportTargets {
            file_name: "r.xml".to_string(),
            ..Default::default()
        };
        assert!(none.is_empty());
        assert!(!none.save("<x/>").await.unwrap());

        let file = ReportTargets {
            results_dir: Some(dir.path().to_path_buf()),
            blob: None,
            file_name: "r.xml".to_string(),
        };
        assert!(file.save("<x/>").await.unwrap());
        assert!(dir.path().join("r.xml").exists());
    }
}
