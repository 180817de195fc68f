use std::io;

use bytes::Bytes;
use chrono::Utc;
use framework::exception;
use framework::exception::CoreRsResult;
use framework::http::HttpClient;
use framework::http::HttpMethod::DELETE;
use framework::http::HttpMethod::GET;
use framework::http::HttpMethod::POST;
use framework::http::HttpRequest;
use framework::http::HttpResponse;
use framework::json;
use futures::StreamExt;
use futures::future;
use futures::stream;
use serde::Deserialize;
use serde::Serialize;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::auth::AuthorizedClient;
use crate::auth::TokenExchange;
use crate::error_code::PROVIDER_REQUEST_FAILED;

#[cfg(test)]
pub mod fake;

const GOOGLE_API_URL: &str = "https://www.googleapis.com";
const LIST_FIELDS: &str = "nextPageToken, files(id, createdTime)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    // RFC 3339, parsed on use so one odd entry does not fail the whole listing
    pub created_time: Option<String>,
}

#[derive(Debug, Serialize)]
struct FileMetadata<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

pub trait DriveApi: Send + Sync {
    // returns the id assigned by the provider
    fn create_file(
        &self,
        name: &str,
        content_type: &str,
        file: File,
        length: u64,
    ) -> impl Future<Output = CoreRsResult<String>> + Send;

    // single page, next_page_token is never followed
    fn list_files(&self, page_size: u32, query: Option<&str>) -> impl Future<Output = CoreRsResult<FileList>> + Send;

    fn delete_file(&self, id: &str) -> impl Future<Output = CoreRsResult<()>> + Send;
}

// builds the drive a branch works on once it holds an authorized client
pub trait DriveConnector<E>: Send + Sync {
    type Drive: DriveApi + 'static;

    fn connect(&self, client: AuthorizedClient<E>) -> Self::Drive;
}

pub struct GoogleDriveConnector {
    http_client: HttpClient,
}

impl GoogleDriveConnector {
    pub fn new(http_client: HttpClient) -> Self {
        GoogleDriveConnector { http_client }
    }
}

impl<E> DriveConnector<E> for GoogleDriveConnector
where
    E: TokenExchange + 'static,
{
    type Drive = GoogleDrive<E>;

    fn connect(&self, client: AuthorizedClient<E>) -> GoogleDrive<E> {
        GoogleDrive::new(client, self.http_client.clone(), GOOGLE_API_URL.to_owned())
    }
}

pub struct GoogleDrive<E> {
    client: AuthorizedClient<E>,
    http_client: HttpClient,
    base_url: String,
}

impl<E> GoogleDrive<E>
where
    E: TokenExchange,
{
    pub fn new(client: AuthorizedClient<E>, http_client: HttpClient, base_url: String) -> Self {
        GoogleDrive {
            client,
            http_client,
            base_url,
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.base_url)
    }

    async fn execute(&self, action: &str, mut request: HttpRequest) -> CoreRsResult<HttpResponse> {
        request.bearer_auth(&self.client.access_token().await?);
        let response = self.http_client.execute(request).await.map_err(|err| {
            exception!(
                code = PROVIDER_REQUEST_FAILED,
                message = format!("failed to {action}"),
                source = err
            )
        })?;
        if !response.is_success() {
            return Err(exception!(
                code = PROVIDER_REQUEST_FAILED,
                message = format!(
                    "failed to {action}, status={}, body={}",
                    response.status, response.body
                )
            ));
        }
        Ok(response)
    }
}

impl<E> DriveApi for GoogleDrive<E>
where
    E: TokenExchange,
{
    async fn create_file(&self, name: &str, content_type: &str, file: File, length: u64) -> CoreRsResult<String> {
        let boundary = format!("drive_backup_{}", Utc::now().timestamp_micros());
        let metadata = json::to_json(&FileMetadata { name })?;
        let head = format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: {content_type}\r\n\r\n"
        );
        let tail = format!("\r\n--{boundary}--\r\n");
        let content_length = head.len() as u64 + length + tail.len() as u64;

        let body = stream::once(future::ready(Ok::<Bytes, io::Error>(Bytes::from(head))))
            .chain(ReaderStream::new(file))
            .chain(stream::once(future::ready(Ok(Bytes::from(tail)))));

        let mut request = HttpRequest::new(POST, format!("{}/upload/drive/v3/files", self.base_url));
        request.query("uploadType", "multipart");
        request.query("fields", "id");
        request.stream_body(
            body,
            format!("multipart/related; boundary={boundary}"),
            Some(content_length),
        );

        let response = self.execute("upload file", request).await?;
        let file: CreatedFile = json::from_json(&response.body)?;
        Ok(file.id)
    }

    async fn list_files(&self, page_size: u32, query: Option<&str>) -> CoreRsResult<FileList> {
        let mut request = HttpRequest::new(GET, self.files_url());
        request.query("pageSize", page_size.to_string());
        request.query("fields", LIST_FIELDS);
        if let Some(query) = query {
            request.query("q", query);
        }

        let response = self.execute("list files", request).await?;
        json::from_json(&response.body)
    }

    async fn delete_file(&self, id: &str) -> CoreRsResult<()> {
        let request = HttpRequest::new(DELETE, format!("{}/{id}", self.files_url()));
        self.execute("delete file", request).await?;
        Ok(())
    }
}
