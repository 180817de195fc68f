use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use framework::exception;
use framework::exception::CoreRsResult;
use tokio::fs::File;

use super::DriveApi;
use super::DriveConnector;
use super::DriveFile;
use super::FileList;
use crate::auth::AuthorizedClient;
use crate::auth::TokenExchange;
use crate::error_code::PROVIDER_REQUEST_FAILED;

pub struct CreatedFile {
    pub name: String,
    pub content_type: String,
    pub length: u64,
}

// records every request it receives
#[derive(Default)]
pub struct FakeDrive {
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
    pub fail_list: bool,
    pub fail_deletes: HashSet<String>,
    pub created: Mutex<Vec<CreatedFile>>,
    pub listed: Mutex<Vec<(u32, Option<String>)>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeDrive {
    pub fn with_files(files: Vec<DriveFile>) -> Self {
        FakeDrive {
            files,
            ..FakeDrive::default()
        }
    }

    pub fn created_names(&self) -> Vec<String> {
        self.created.lock().unwrap().iter().map(|file| file.name.clone()).collect()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        let mut ids = self.deleted.lock().unwrap().clone();
        ids.sort();
        ids
    }
}

impl DriveApi for FakeDrive {
    async fn create_file(&self, name: &str, content_type: &str, _file: File, length: u64) -> CoreRsResult<String> {
        self.created.lock().unwrap().push(CreatedFile {
            name: name.to_owned(),
            content_type: content_type.to_owned(),
            length,
        });
        Ok(format!("id-{name}"))
    }

    async fn list_files(&self, page_size: u32, query: Option<&str>) -> CoreRsResult<FileList> {
        self.listed.lock().unwrap().push((page_size, query.map(str::to_owned)));
        if self.fail_list {
            return Err(exception!(code = PROVIDER_REQUEST_FAILED, message = "failed to list files, status=500"));
        }
        Ok(FileList {
            files: self.files.clone(),
            next_page_token: self.next_page_token.clone(),
        })
    }

    async fn delete_file(&self, id: &str) -> CoreRsResult<()> {
        self.deleted.lock().unwrap().push(id.to_owned());
        if self.fail_deletes.contains(id) {
            return Err(exception!(code = PROVIDER_REQUEST_FAILED, message = "failed to delete file, status=404"));
        }
        Ok(())
    }
}

impl<D> DriveApi for Arc<D>
where
    D: DriveApi,
{
    fn create_file(
        &self,
        name: &str,
        content_type: &str,
        file: File,
        length: u64,
    ) -> impl Future<Output = CoreRsResult<String>> + Send {
        self.as_ref().create_file(name, content_type, file, length)
    }

    fn list_files(&self, page_size: u32, query: Option<&str>) -> impl Future<Output = CoreRsResult<FileList>> + Send {
        self.as_ref().list_files(page_size, query)
    }

    fn delete_file(&self, id: &str) -> impl Future<Output = CoreRsResult<()>> + Send {
        self.as_ref().delete_file(id)
    }
}

// hands out the same drive to every branch and counts the connects
pub struct FakeConnector {
    pub drive: Arc<FakeDrive>,
    pub connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(drive: FakeDrive) -> Self {
        FakeConnector {
            drive: Arc::new(drive),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl<E> DriveConnector<E> for FakeConnector
where
    E: TokenExchange,
{
    type Drive = Arc<FakeDrive>;

    fn connect(&self, _client: AuthorizedClient<E>) -> Arc<FakeDrive> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.drive.clone()
    }
}
